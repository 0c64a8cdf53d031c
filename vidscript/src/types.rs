use std::fmt;

use serde::{Deserialize, Serialize};

use crate::reference::VideoId;

/// Which strategy produced a transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TranscriptSource {
    Subtitle,
    SpeechRecognition,
    None,
}

impl fmt::Display for TranscriptSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TranscriptSource::Subtitle => write!(f, "subtitle"),
            TranscriptSource::SpeechRecognition => write!(f, "speech-recognition"),
            TranscriptSource::None => write!(f, "none"),
        }
    }
}

/// Outcome of one acquisition call.
///
/// `text` is present exactly when `source` is not [`TranscriptSource::None`].
/// Serialize-only: results are built by the pipeline, never parsed back.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TranscriptResult {
    video_id: VideoId,
    text: Option<String>,
    source: TranscriptSource,
    detected_language: Option<String>,
}

impl TranscriptResult {
    pub(crate) fn subtitle(video_id: VideoId, text: String, language: String) -> Self {
        Self {
            video_id,
            text: Some(text),
            source: TranscriptSource::Subtitle,
            detected_language: Some(language),
        }
    }

    pub(crate) fn recognized(video_id: VideoId, text: String, language: Option<String>) -> Self {
        Self {
            video_id,
            text: Some(text),
            source: TranscriptSource::SpeechRecognition,
            detected_language: language,
        }
    }

    pub(crate) fn none(video_id: VideoId) -> Self {
        Self {
            video_id,
            text: None,
            source: TranscriptSource::None,
            detected_language: None,
        }
    }

    pub fn video_id(&self) -> &VideoId {
        &self.video_id
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    pub fn source(&self) -> TranscriptSource {
        self.source
    }

    pub fn detected_language(&self) -> Option<&str> {
        self.detected_language.as_deref()
    }

    pub fn has_transcript(&self) -> bool {
        self.text.is_some()
    }

    /// Format as pretty-printed JSON.
    pub fn to_json_pretty(&self) -> crate::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Whether a caption track was produced by speech recognition on the
/// provider side or authored by a person.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Generated,
    Manual,
}

impl fmt::Display for TrackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackKind::Generated => write!(f, "generated"),
            TrackKind::Manual => write!(f, "manual"),
        }
    }
}

/// A provider-hosted caption track.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptionTrack {
    pub language_code: String,
    pub language_name: Option<String>,
    pub kind: TrackKind,
    /// Where the caption body can be fetched from.
    pub url: String,
}

/// One time-stamped caption line. Times are in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptionEntry {
    pub text: String,
    pub start: f64,
    pub duration: f64,
}

/// Join caption entries into plain text: trimmed, blanks dropped, single-space separated.
pub fn join_entries(entries: &[CaptionEntry]) -> String {
    entries
        .iter()
        .map(|e| e.text.trim())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Output of a speech recognizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recognition {
    pub text: String,
    /// Detected language, or the hint that was used.
    pub language: Option<String>,
}

/// Video metadata as reported by the provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoInfo {
    pub video_id: String,
    pub title: Option<String>,
    pub description: Option<String>,
    /// Seconds.
    pub duration: Option<f64>,
    pub thumbnail_url: Option<String>,
    pub channel: Option<String>,
    pub view_count: Option<u64>,
    /// `YYYYMMDD`.
    pub upload_date: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(text: &str) -> CaptionEntry {
        CaptionEntry {
            text: text.into(),
            start: 0.0,
            duration: 1.0,
        }
    }

    #[test]
    fn test_join_entries_trims_and_skips_blanks() {
        let entries = [entry(" hello "), entry("\n"), entry("world"), entry("")];
        assert_eq!(join_entries(&entries), "hello world");
    }

    #[test]
    fn test_join_entries_empty() {
        assert_eq!(join_entries(&[]), "");
    }

    #[test]
    fn test_source_serializes_kebab_case() {
        let json = serde_json::to_string(&TranscriptSource::SpeechRecognition).unwrap();
        assert_eq!(json, "\"speech-recognition\"");
        assert_eq!(TranscriptSource::None.to_string(), "none");
    }

    #[test]
    fn test_none_result_has_no_text() {
        let id = VideoId::new("abc123").unwrap();
        let result = TranscriptResult::none(id);
        assert!(!result.has_transcript());
        assert_eq!(result.text(), None);
        assert_eq!(result.source(), TranscriptSource::None);

        let json: serde_json::Value =
            serde_json::from_str(&result.to_json_pretty().unwrap()).unwrap();
        assert_eq!(json["video_id"], "abc123");
        assert_eq!(json["source"], "none");
        assert!(json["text"].is_null());
    }
}
