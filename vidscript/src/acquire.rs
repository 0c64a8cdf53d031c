//! The acquisition pipeline.
//!
//! ```text
//! Start -> IdentifierResolved -> SubtitleAttempted -> Done(subtitle)
//!                                                  \-> AudioMaterialized -> RecognitionAttempted
//!                                                        -> Done(speech-recognition) | Done(none)
//! ```
//!
//! Only an unparseable reference is an error. Every later failure is logged
//! and ends in `Done(none)`. Audio that reached the disk is removed before
//! [`Acquirer::acquire`] returns, and also when its future is dropped.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::{AcquireOptions, RecognizerOptions};
use crate::download::{AudioMaterializer, YtDlpDownloader};
use crate::error::{Error, Result};
use crate::model::ModelHandle;
use crate::recognize::{SpeechRecognizer, WhisperRecognizer};
use crate::reference::{extract_video_id, VideoId};
use crate::subtitle::{fetch_subtitles, CaptionProvider};
use crate::types::TranscriptResult;
use crate::youtube::YtDlpCaptions;

static CALL_COUNTER: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    IdentifierResolved,
    SubtitleAttempted,
    AudioMaterialized,
    RecognitionAttempted,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::IdentifierResolved => "identifier-resolved",
            Stage::SubtitleAttempted => "subtitle-attempted",
            Stage::AudioMaterialized => "audio-materialized",
            Stage::RecognitionAttempted => "recognition-attempted",
        };
        f.write_str(name)
    }
}

/// Turns a video reference into a transcript, subtitles first.
pub struct Acquirer {
    captions: Arc<dyn CaptionProvider>,
    materializer: Arc<dyn AudioMaterializer>,
    recognizer: Arc<dyn SpeechRecognizer>,
    options: AcquireOptions,
}

impl Acquirer {
    pub fn new(
        captions: Arc<dyn CaptionProvider>,
        materializer: Arc<dyn AudioMaterializer>,
        recognizer: Arc<dyn SpeechRecognizer>,
        options: AcquireOptions,
    ) -> Self {
        Self {
            captions,
            materializer,
            recognizer,
            options,
        }
    }

    /// yt-dlp captions, yt-dlp audio download and whisper.cpp recognition.
    pub fn with_defaults(options: AcquireOptions, recognizer: RecognizerOptions) -> Result<Self> {
        Self::with_model(options, ModelHandle::new(recognizer))
    }

    /// Like [`Acquirer::with_defaults`], recognizing with an existing model handle.
    pub fn with_model(options: AcquireOptions, model: ModelHandle) -> Result<Self> {
        Ok(Self::new(
            Arc::new(YtDlpCaptions::new()?),
            Arc::new(YtDlpDownloader::new()),
            Arc::new(WhisperRecognizer::with_handle(model)),
            options,
        ))
    }

    pub fn options(&self) -> &AcquireOptions {
        &self.options
    }

    /// Acquire a transcript, falling back to speech recognition per the options.
    pub async fn acquire(&self, reference: &str) -> Result<TranscriptResult> {
        self.acquire_with_fallback(reference, self.options.use_fallback)
            .await
    }

    /// Acquire a transcript with an explicit fallback choice for this call.
    ///
    /// Returns `Err` only for a reference no video id can be extracted from.
    pub async fn acquire_with_fallback(
        &self,
        reference: &str,
        use_fallback: bool,
    ) -> Result<TranscriptResult> {
        let video = extract_video_id(reference)?;
        debug!(video_id = %video, stage = %Stage::IdentifierResolved, "video id extracted");

        match fetch_subtitles(self.captions.as_ref(), &video, &self.options.languages).await {
            Ok(hit) => {
                info!(
                    video_id = %video,
                    stage = %Stage::SubtitleAttempted,
                    language = %hit.track.language_code,
                    kind = %hit.track.kind,
                    "transcript taken from subtitles"
                );
                return Ok(TranscriptResult::subtitle(
                    video,
                    hit.text,
                    hit.track.language_code,
                ));
            }
            Err(miss) => {
                for failure in &miss.failures {
                    debug!(video_id = %video, %failure, "subtitle candidate rejected");
                }
                let had_candidates = miss.had_candidates();
                let failures = miss.failures.len();
                let reason = Error::from(miss);
                info!(
                    video_id = %video,
                    stage = %Stage::SubtitleAttempted,
                    had_candidates,
                    failures,
                    reason = %reason,
                    "no usable subtitles"
                );
            }
        }

        if !use_fallback {
            info!(video_id = %video, "speech recognition fallback disabled");
            return Ok(TranscriptResult::none(video));
        }

        Ok(self.recognize_audio(video).await)
    }

    async fn recognize_audio(&self, video: VideoId) -> TranscriptResult {
        let (output_dir, _dir_guard) = if self.options.isolate_downloads {
            let dir = call_dir(&self.options.download_dir, &video);
            (dir.clone(), Some(TempDirGuard(dir)))
        } else {
            (self.options.download_dir.clone(), None)
        };

        let audio_path = match self.materializer.materialize(&video, &output_dir).await {
            Ok(path) => path,
            Err(e) => {
                warn!(
                    video_id = %video,
                    stage = %Stage::AudioMaterialized,
                    error = %e,
                    "audio download failed"
                );
                return TranscriptResult::none(video);
            }
        };
        let _file_guard = CleanupGuard(audio_path.clone());
        info!(
            video_id = %video,
            stage = %Stage::AudioMaterialized,
            path = %audio_path.display(),
            "audio ready for recognition"
        );

        let hint = self.options.recognition_language.code();
        match self.recognizer.recognize(&audio_path, hint).await {
            Ok(recognition) => {
                let text = recognition.text.trim();
                if text.is_empty() {
                    warn!(
                        video_id = %video,
                        stage = %Stage::RecognitionAttempted,
                        "recognition produced no text"
                    );
                    return TranscriptResult::none(video);
                }
                info!(
                    video_id = %video,
                    stage = %Stage::RecognitionAttempted,
                    language = recognition.language.as_deref().unwrap_or("unknown"),
                    chars = text.len(),
                    "transcript taken from speech recognition"
                );
                TranscriptResult::recognized(video, text.to_string(), recognition.language)
            }
            Err(e) => {
                warn!(
                    video_id = %video,
                    stage = %Stage::RecognitionAttempted,
                    error = %e,
                    "speech recognition failed"
                );
                TranscriptResult::none(video)
            }
        }
    }
}

/// `{root}/{id}-{pid}-{nanos}-{counter}`: distinct across concurrent calls and processes.
fn call_dir(root: &Path, video: &VideoId) -> PathBuf {
    root.join(format!(
        "{video}-{}-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos(),
        CALL_COUNTER.fetch_add(1, Ordering::Relaxed)
    ))
}

/// RAII guard that removes a file when dropped.
struct CleanupGuard(PathBuf);

impl Drop for CleanupGuard {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.0) {
            Ok(()) => debug!(path = %self.0.display(), "temp audio removed"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                warn!(path = %self.0.display(), error = %e, "failed to clean up temp file")
            }
        }
    }
}

/// RAII guard that removes an entire temp directory when dropped.
struct TempDirGuard(PathBuf);

impl Drop for TempDirGuard {
    fn drop(&mut self) {
        if self.0.exists() {
            if let Err(e) = std::fs::remove_dir_all(&self.0) {
                warn!(path = %self.0.display(), error = %e, "failed to clean up temp dir");
            }
        }
    }
}
