use std::path::PathBuf;

/// All errors that can occur in vidscript.
///
/// Only [`Error::InvalidReference`] ever escapes
/// [`Acquirer::acquire`](crate::acquire::Acquirer::acquire); the other
/// variants are produced by individual stages and folded into the
/// acquisition result.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid video reference: \"{0}\"")]
    InvalidReference(String),

    #[error("no subtitle track available")]
    NoSubtitleAvailable,

    #[error("audio download failed: {0}")]
    DownloadFailed(String),

    #[error("speech recognition failed: {0}")]
    RecognitionFailed(String),

    #[error("caption provider error: {0}")]
    Provider(String),

    #[error("model error: {0}")]
    Model(String),

    #[error("model not found: {path}")]
    ModelNotFound { path: PathBuf },

    #[error("model download failed: {0}")]
    ModelDownload(String),

    #[error("audio decoding error: {0}")]
    AudioDecode(String),

    #[error("audio file not found: {path}")]
    AudioNotFound { path: PathBuf },

    #[error("unsupported language: \"{0}\", use Language::supported() to list valid codes")]
    UnsupportedLanguage(String),

    #[error("invalid option: {0}")]
    InvalidOption(String),

    #[error("yt-dlp not found, install with: pip install yt-dlp")]
    YtDlpNotFound,

    #[error("whisper error: {0}")]
    Whisper(#[from] whisper_rs::WhisperError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Collapse any stage error into [`Error::DownloadFailed`], keeping
    /// variants that already say what went wrong.
    pub(crate) fn into_download_failure(self) -> Self {
        match self {
            e @ (Error::DownloadFailed(_) | Error::YtDlpNotFound) => e,
            other => Error::DownloadFailed(other.to_string()),
        }
    }

    /// Collapse any stage error into [`Error::RecognitionFailed`].
    pub(crate) fn into_recognition_failure(self) -> Self {
        match self {
            e @ Error::RecognitionFailed(_) => e,
            other => Error::RecognitionFailed(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_invalid_reference() {
        let e = Error::InvalidReference("not a link".into());
        assert_eq!(e.to_string(), "invalid video reference: \"not a link\"");
    }

    #[test]
    fn test_error_display_model_not_found() {
        let e = Error::ModelNotFound {
            path: PathBuf::from("/tmp/model.bin"),
        };
        assert!(e.to_string().contains("/tmp/model.bin"));
    }

    #[test]
    fn test_error_display_unsupported_language() {
        let e = Error::UnsupportedLanguage("klingon".into());
        let msg = e.to_string();
        assert!(msg.contains("klingon"));
        assert!(msg.contains("Language::supported()"));
    }

    #[test]
    fn test_download_failure_keeps_specific_variants() {
        assert!(matches!(
            Error::YtDlpNotFound.into_download_failure(),
            Error::YtDlpNotFound
        ));
        let io = Error::Io(std::io::Error::new(std::io::ErrorKind::Other, "disk full"));
        match io.into_download_failure() {
            Error::DownloadFailed(msg) => assert!(msg.contains("disk full")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_recognition_failure_wraps_decode_errors() {
        let e = Error::AudioDecode("ffmpeg failed".into()).into_recognition_failure();
        match e {
            Error::RecognitionFailed(msg) => assert!(msg.contains("ffmpeg failed")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_error_from_json() {
        let json_err = serde_json::from_str::<String>("invalid json").unwrap_err();
        let e: Error = json_err.into();
        assert!(matches!(e, Error::Json(_)));
    }
}
