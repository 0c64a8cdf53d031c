use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext};

use crate::audio;
use crate::config::{Language, RecognizerOptions};
use crate::error::{Error, Result};
use crate::model::ModelHandle;
use crate::types::Recognition;

/// Speech-to-text over a local audio file.
#[async_trait]
pub trait SpeechRecognizer: Send + Sync {
    /// Recognize speech in `audio_path`. Without a hint the language is detected.
    async fn recognize(&self, audio_path: &Path, language_hint: Option<&str>) -> Result<Recognition>;
}

/// whisper.cpp recognizer. Cloning shares the loaded model.
#[derive(Clone)]
pub struct WhisperRecognizer {
    model: ModelHandle,
}

impl WhisperRecognizer {
    pub fn new(options: RecognizerOptions) -> Self {
        Self {
            model: ModelHandle::new(options),
        }
    }

    /// Build on an existing handle, e.g. one already shared with another recognizer.
    pub fn with_handle(model: ModelHandle) -> Self {
        Self { model }
    }

    pub fn handle(&self) -> &ModelHandle {
        &self.model
    }

    async fn run(&self, audio_path: &Path, language_hint: Option<&str>) -> Result<Recognition> {
        let language = match language_hint {
            Some(hint) => Language::new(hint)?,
            None => Language::Auto,
        };

        let samples = audio::load_audio(audio_path).await?;
        let ctx = self.model.get().await?;
        let options = self.model.options().clone();

        info!(
            path = %audio_path.display(),
            language = %language,
            samples = samples.len(),
            "running speech recognition"
        );

        tokio::task::spawn_blocking(move || run_whisper(&ctx, &samples, &language, &options))
            .await
            .map_err(|e| Error::RecognitionFailed(format!("recognition task failed: {e}")))?
    }
}

#[async_trait]
impl SpeechRecognizer for WhisperRecognizer {
    async fn recognize(&self, audio_path: &Path, language_hint: Option<&str>) -> Result<Recognition> {
        self.run(audio_path, language_hint)
            .await
            .map_err(Error::into_recognition_failure)
    }
}

/// Blocking whisper.cpp inference over 16 kHz mono samples.
fn run_whisper(
    ctx: &Arc<WhisperContext>,
    samples: &[f32],
    language: &Language,
    options: &RecognizerOptions,
) -> Result<Recognition> {
    let mut state = ctx.create_state()?;

    let mut params = match options.beam_size {
        Some(beam_size) => FullParams::new(SamplingStrategy::BeamSearch {
            beam_size: beam_size as i32,
            patience: -1.0,
        }),
        None => FullParams::new(SamplingStrategy::Greedy { best_of: 5 }),
    };

    match language {
        // "auto" makes whisper.cpp detect the language and still transcribe.
        Language::Auto => params.set_language(Some("auto")),
        Language::Code { code, .. } => params.set_language(Some(code.as_str())),
    }

    params.set_translate(false);
    params.set_temperature(options.temperature);
    if let Some(n) = options.n_threads {
        params.set_n_threads(n as i32);
    }

    params.set_print_progress(false);
    params.set_print_realtime(false);
    params.set_print_timestamps(false);
    params.set_print_special(false);

    state.full(params, samples)?;

    let num_segments = state.full_n_segments();
    debug!(num_segments, "recognition complete");

    let mut parts = Vec::with_capacity(num_segments as usize);
    for i in 0..num_segments {
        let segment = state
            .get_segment(i)
            .ok_or_else(|| Error::RecognitionFailed(format!("segment {i} not found")))?;
        let text = segment
            .to_str_lossy()
            .map_err(|e| Error::RecognitionFailed(format!("segment text error: {e}")))?;
        let text = text.trim();
        if !text.is_empty() {
            parts.push(text.to_string());
        }
    }

    let detected = match language {
        Language::Code { code, .. } => Some(code.clone()),
        Language::Auto => whisper_rs::get_lang_str(state.full_lang_id_from_state())
            .map(str::to_string),
    };

    Ok(Recognition {
        text: parts.join(" "),
        language: detected,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Model;
    use std::path::PathBuf;

    fn recognizer_without_model() -> WhisperRecognizer {
        WhisperRecognizer::new(
            RecognizerOptions::new().model(Model::Custom(PathBuf::from("/nonexistent/model.bin"))),
        )
    }

    #[tokio::test]
    async fn test_unsupported_hint_is_a_recognition_failure() {
        let recognizer = recognizer_without_model();
        let err = recognizer
            .recognize(Path::new("/nonexistent/audio.mp3"), Some("klingon"))
            .await
            .unwrap_err();
        match err {
            Error::RecognitionFailed(msg) => assert!(msg.contains("klingon")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_audio_fails_before_model_load() {
        let recognizer = recognizer_without_model();
        let err = recognizer
            .recognize(Path::new("/nonexistent/audio.mp3"), None)
            .await
            .unwrap_err();
        match err {
            Error::RecognitionFailed(msg) => assert!(msg.contains("audio file not found")),
            other => panic!("unexpected {other:?}"),
        }
        assert!(!recognizer.handle().is_loaded());
    }

    #[test]
    fn test_clones_share_handle() {
        let a = recognizer_without_model();
        let b = a.clone();
        assert!(a.handle().shares_with(b.handle()));
        let c = recognizer_without_model();
        assert!(!a.handle().shares_with(c.handle()));
    }
}
