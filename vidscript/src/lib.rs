//! Video transcript acquisition: published captions first, speech recognition second.
//!
//! **vidscript** resolves a YouTube link to its video id, looks for a usable
//! caption track (generated, then manual, then anything), and when none is
//! found downloads the audio track (via yt-dlp) and recognizes it locally
//! (via whisper.cpp). Downloaded audio never outlives the call.
//!
//! # Quick start
//!
//! ```rust,no_run
//! # #[tokio::main]
//! # async fn main() -> vidscript::Result<()> {
//! let result = vidscript::acquire_transcript("https://youtu.be/dQw4w9WgXcQ", true).await?;
//! match result.text() {
//!     Some(text) => println!("[{}] {text}", result.source()),
//!     None => eprintln!("no transcript for {}", result.video_id()),
//! }
//! # Ok(())
//! # }
//! ```
//!
//! For custom collaborators or options, build an [`Acquirer`] directly.

pub mod acquire;
pub(crate) mod audio;
pub mod config;
pub mod download;
pub mod error;
pub mod model;
pub mod recognize;
pub mod reference;
pub mod subtitle;
pub mod types;
pub mod youtube;
pub mod ytdlp;

pub use acquire::Acquirer;
pub use config::{AcquireOptions, Language, Model, RecognizerOptions, DEFAULT_LANGUAGES};
pub use download::{AudioMaterializer, YtDlpDownloader};
pub use error::{Error, Result};
pub use model::ModelHandle;
pub use recognize::{SpeechRecognizer, WhisperRecognizer};
pub use reference::{extract_video_id, VideoId};
pub use subtitle::{fetch_subtitles, CaptionProvider, SubtitleHit, SubtitleMiss};
pub use types::{
    CaptionEntry, CaptionTrack, Recognition, TrackKind, TranscriptResult, TranscriptSource,
    VideoInfo,
};
pub use youtube::YtDlpCaptions;
pub use ytdlp::YtDlp;

use std::sync::OnceLock;

static DEFAULT_MODEL: OnceLock<ModelHandle> = OnceLock::new();

/// Process-wide model used by [`acquire_transcript`]. Loaded on first recognition.
pub fn default_model() -> &'static ModelHandle {
    DEFAULT_MODEL.get_or_init(|| ModelHandle::new(RecognizerOptions::default()))
}

/// Acquire a transcript with default collaborators and options.
///
/// `use_fallback` controls whether speech recognition runs when no caption
/// track is usable. Errors only when `reference` contains no video id.
/// Every call recognizes with [`default_model`].
pub async fn acquire_transcript(reference: &str, use_fallback: bool) -> Result<TranscriptResult> {
    extract_video_id(reference)?;
    let acquirer = Acquirer::with_model(AcquireOptions::default(), default_model().clone())?;
    acquirer.acquire_with_fallback(reference, use_fallback).await
}

/// Fetch title, channel and other metadata for the referenced video.
pub async fn video_info(reference: &str) -> Result<VideoInfo> {
    let video = extract_video_id(reference)?;
    YtDlpCaptions::new()?.video_info(&video).await
}
