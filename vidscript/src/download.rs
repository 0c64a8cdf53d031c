use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::reference::VideoId;
use crate::ytdlp::YtDlp;

/// Puts a video's audio track on local disk.
#[async_trait]
pub trait AudioMaterializer: Send + Sync {
    /// Download audio for `video` into `output_dir` and return the file path.
    async fn materialize(&self, video: &VideoId, output_dir: &Path) -> Result<PathBuf>;
}

/// Audio extraction through yt-dlp (and the ffmpeg it drives).
#[derive(Debug, Clone)]
pub struct YtDlpDownloader {
    ytdlp: YtDlp,
    audio_format: String,
    audio_quality: String,
    ffmpeg_location: Option<PathBuf>,
}

impl Default for YtDlpDownloader {
    fn default() -> Self {
        Self {
            ytdlp: YtDlp::default(),
            audio_format: "mp3".into(),
            audio_quality: "128K".into(),
            ffmpeg_location: None,
        }
    }
}

impl YtDlpDownloader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ytdlp(mut self, ytdlp: YtDlp) -> Self {
        self.ytdlp = ytdlp;
        self
    }

    /// Target codec passed to `--audio-format`. Also the extension expected on disk.
    pub fn audio_format(mut self, format: impl Into<String>) -> Self {
        self.audio_format = format.into();
        self
    }

    pub fn audio_quality(mut self, quality: impl Into<String>) -> Self {
        self.audio_quality = quality.into();
        self
    }

    /// Directory holding ffmpeg/ffprobe, or the ffmpeg binary itself.
    pub fn ffmpeg_location(mut self, location: PathBuf) -> Self {
        self.ffmpeg_location = Some(location);
        self
    }

    fn build_args(&self, video: &VideoId, output_template: &str) -> Vec<OsString> {
        let mut args: Vec<OsString> = [
            "-f",
            "bestaudio/best",
            "--extract-audio",
            "--audio-format",
            self.audio_format.as_str(),
            "--audio-quality",
            self.audio_quality.as_str(),
            "--no-playlist",
            "--no-exec",
            "--output",
            output_template,
            "--print",
            "after_move:filepath",
        ]
        .into_iter()
        .map(OsString::from)
        .collect();

        if let Some(location) = &self.ffmpeg_location {
            args.push("--ffmpeg-location".into());
            args.push(location.as_os_str().to_owned());
        }

        args.push(video.watch_url().into());
        args
    }

    async fn download(&self, video: &VideoId, output_dir: &Path) -> Result<PathBuf> {
        tokio::fs::create_dir_all(output_dir).await?;

        let output_template = output_dir
            .join(format!("{video}.%(ext)s"))
            .to_str()
            .ok_or_else(|| {
                Error::DownloadFailed("output directory path contains invalid UTF-8".into())
            })?
            .to_string();

        info!(video_id = %video, dir = %output_dir.display(), "downloading audio");

        let output = self.ytdlp.run(self.build_args(video, &output_template)).await?;
        let printed = String::from_utf8_lossy(&output.stdout);

        let audio_path = resolve_output(&printed, output_dir, video, &self.audio_format)?;
        if !audio_path.exists() {
            return Err(Error::DownloadFailed(format!(
                "downloaded file not found at {}",
                audio_path.display()
            )));
        }

        let audio_path = audio_path.canonicalize()?;
        debug!(path = %audio_path.display(), "audio downloaded");
        Ok(audio_path)
    }
}

#[async_trait]
impl AudioMaterializer for YtDlpDownloader {
    async fn materialize(&self, video: &VideoId, output_dir: &Path) -> Result<PathBuf> {
        self.download(video, output_dir)
            .await
            .map_err(Error::into_download_failure)
    }
}

/// Pick the final path from yt-dlp's `after_move:filepath` output, falling
/// back to `{dir}/{id}.{codec}` when nothing was printed.
fn resolve_output(printed: &str, output_dir: &Path, video: &VideoId, codec: &str) -> Result<PathBuf> {
    match printed.lines().map(str::trim).filter(|l| !l.is_empty()).last() {
        Some(line) => {
            let candidate = PathBuf::from(line);
            validate_path_in_dir(&candidate, output_dir)?;
            Ok(candidate)
        }
        None => Ok(output_dir.join(format!("{video}.{codec}"))),
    }
}

/// Normalize a path by resolving `.` and `..` components without touching the filesystem.
fn normalize_path(path: &Path) -> PathBuf {
    let mut parts = Vec::new();
    for component in path.components() {
        match component {
            Component::ParentDir => {
                parts.pop();
            }
            Component::CurDir => {}
            other => parts.push(other),
        }
    }
    parts.iter().collect()
}

/// Reject paths outside `expected_dir`.
fn validate_path_in_dir(path: &Path, expected_dir: &Path) -> Result<()> {
    let canonical_dir = expected_dir
        .canonicalize()
        .unwrap_or_else(|_| normalize_path(expected_dir));
    let canonical_path = path
        .canonicalize()
        .unwrap_or_else(|_| normalize_path(path));

    if canonical_path.starts_with(&canonical_dir) {
        Ok(())
    } else {
        warn!(
            path = %path.display(),
            expected_dir = %expected_dir.display(),
            "downloaded file path outside expected directory"
        );
        Err(Error::DownloadFailed(
            "downloaded file path is outside the output directory".into(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn video() -> VideoId {
        VideoId::new("abc123").unwrap()
    }

    #[test]
    fn test_build_args_defaults() {
        let args = YtDlpDownloader::new().build_args(&video(), "/tmp/out/abc123.%(ext)s");
        let args: Vec<String> = args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();

        let pos = |flag: &str| args.iter().position(|a| a == flag).unwrap();
        assert_eq!(args[pos("--audio-format") + 1], "mp3");
        assert_eq!(args[pos("--audio-quality") + 1], "128K");
        assert_eq!(args[pos("--output") + 1], "/tmp/out/abc123.%(ext)s");
        assert!(args.contains(&"--no-exec".to_string()));
        assert!(!args.contains(&"--ffmpeg-location".to_string()));
        assert_eq!(
            args.last().map(String::as_str),
            Some("https://www.youtube.com/watch?v=abc123")
        );
    }

    #[test]
    fn test_build_args_with_ffmpeg_location() {
        let downloader = YtDlpDownloader::new()
            .audio_format("wav")
            .ffmpeg_location(PathBuf::from("/opt/ffmpeg/bin"));
        let args = downloader.build_args(&video(), "t");
        let args: Vec<String> = args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();

        let pos = args.iter().position(|a| a == "--ffmpeg-location").unwrap();
        assert_eq!(args[pos + 1], "/opt/ffmpeg/bin");
        assert!(args.contains(&"wav".to_string()));
    }

    #[test]
    fn test_resolve_output_uses_printed_path() {
        let tmp = tempfile::tempdir().unwrap();
        let printed = format!("{}\n", tmp.path().join("abc123.mp3").display());
        let path = resolve_output(&printed, tmp.path(), &video(), "mp3").unwrap();
        assert_eq!(path, tmp.path().join("abc123.mp3"));
    }

    #[test]
    fn test_resolve_output_falls_back_to_expected_name() {
        let path = resolve_output("  \n", Path::new("downloads"), &video(), "mp3").unwrap();
        assert_eq!(path, PathBuf::from("downloads/abc123.mp3"));
    }

    #[test]
    fn test_resolve_output_rejects_escape() {
        let tmp = tempfile::tempdir().unwrap();
        let result = resolve_output("/etc/passwd\n", tmp.path(), &video(), "mp3");
        assert!(matches!(result, Err(Error::DownloadFailed(_))));
    }

    #[test]
    fn test_validate_path_in_dir_parent_traversal() {
        let dir = std::env::temp_dir().join("vidscript_test");
        let path = dir.join("..").join("..").join("etc").join("passwd");
        assert!(validate_path_in_dir(&path, &dir).is_err());
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(
            normalize_path(Path::new("/a/./b/../c")),
            PathBuf::from("/a/c")
        );
    }

    #[tokio::test]
    async fn test_missing_ytdlp_is_reported() {
        let tmp = tempfile::tempdir().unwrap();
        let downloader =
            YtDlpDownloader::new().ytdlp(YtDlp::new("/nonexistent/yt-dlp-binary"));
        let err = downloader
            .materialize(&video(), &tmp.path().join("out"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::YtDlpNotFound));
        // The output directory is created before yt-dlp runs.
        assert!(tmp.path().join("out").is_dir());
    }
}
