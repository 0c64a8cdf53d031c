use std::ffi::OsStr;
use std::path::PathBuf;
use std::process::Output;

use tracing::debug;

use crate::error::{Error, Result};

/// Longest stderr excerpt carried into an error message.
const STDERR_LIMIT: usize = 1000;

/// Location of the yt-dlp executable.
#[derive(Debug, Clone)]
pub struct YtDlp {
    binary: PathBuf,
}

impl Default for YtDlp {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("yt-dlp"),
        }
    }
}

impl YtDlp {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Run yt-dlp to completion. Arguments are passed without a shell.
    /// A non-zero exit becomes `Err(Error::Provider)` carrying stderr.
    pub(crate) async fn run<I, S>(&self, args: I) -> Result<Output>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut cmd = tokio::process::Command::new(&self.binary);
        cmd.args(args).kill_on_drop(true);
        debug!(command = ?cmd.as_std(), "running yt-dlp");

        let output = cmd.output().await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::YtDlpNotFound
            } else {
                Error::Io(e)
            }
        })?;

        if !output.status.success() {
            return Err(Error::Provider(format!(
                "yt-dlp exited with {}: {}",
                output.status,
                stderr_excerpt(&output.stderr)
            )));
        }

        Ok(output)
    }
}

fn stderr_excerpt(stderr: &[u8]) -> String {
    String::from_utf8_lossy(stderr)
        .trim()
        .chars()
        .take(STDERR_LIMIT)
        .collect()
}
