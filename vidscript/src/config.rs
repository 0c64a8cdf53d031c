use std::fmt;
use std::path::PathBuf;

use crate::error::Error;

/// Subtitle languages tried in order when no preference is given.
pub const DEFAULT_LANGUAGES: &[&str] = &[
    "en", "ko", "ja", "zh-Hans", "zh-Hant", "es", "fr", "de", "ru", "pt", "it", "ar",
];

/// A validated language for speech recognition.
///
/// Wraps a code that whisper.cpp knows about. Accepts short codes ("en")
/// and full names ("english"); `Language::Auto` lets the model detect it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Language {
    #[default]
    Auto,
    Code {
        /// Short code as whisper expects it.
        code: String,
        /// Whisper internal language ID.
        id: i32,
    },
}

impl Language {
    pub fn new(lang: &str) -> Result<Self, Error> {
        let lower = lang.trim().to_lowercase();
        if lower.is_empty() || lower == "auto" {
            return Ok(Language::Auto);
        }

        match whisper_rs::get_lang_id(&lower) {
            Some(id) => {
                let code = whisper_rs::get_lang_str(id).unwrap_or(&lower).to_string();
                Ok(Language::Code { code, id })
            }
            None => Err(Error::UnsupportedLanguage(lang.to_string())),
        }
    }

    /// Short code, or None for auto-detection.
    pub fn code(&self) -> Option<&str> {
        match self {
            Language::Auto => None,
            Language::Code { code, .. } => Some(code),
        }
    }

    pub fn is_auto(&self) -> bool {
        matches!(self, Language::Auto)
    }

    /// All supported languages as (code, full_name) pairs.
    pub fn supported() -> Vec<(&'static str, &'static str)> {
        let max = whisper_rs::get_lang_max_id();
        (0..=max)
            .filter_map(|id| {
                let code = whisper_rs::get_lang_str(id)?;
                let name = whisper_rs::get_lang_str_full(id)?;
                Some((code, name))
            })
            .collect()
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Language::Auto => write!(f, "auto"),
            Language::Code { code, .. } => write!(f, "{code}"),
        }
    }
}

/// Whisper model sizes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Model {
    Tiny,
    TinyEn,
    Base,
    BaseEn,
    Small,
    SmallEn,
    Medium,
    MediumEn,
    LargeV3,
    LargeV3Turbo,
    /// User-provided ggml file.
    Custom(PathBuf),
}

impl Model {
    /// Every downloadable model, smallest first.
    pub const CATALOG: &'static [(&'static str, &'static str)] = &[
        ("tiny", "75 MB"),
        ("tiny.en", "75 MB"),
        ("base", "142 MB"),
        ("base.en", "142 MB"),
        ("small", "466 MB"),
        ("small.en", "466 MB"),
        ("medium", "1.5 GB"),
        ("medium.en", "1.5 GB"),
        ("large-v3", "2.9 GB"),
        ("large-v3-turbo", "~1.6 GB"),
    ];

    /// File name as published in the whisper.cpp model repository.
    pub fn filename(&self) -> String {
        match self {
            Model::Custom(path) => path
                .file_name()
                .map(|f| f.to_string_lossy().into_owned())
                .unwrap_or_else(|| "custom-model".into()),
            named => format!("ggml-{}.bin", named.name()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Model::Tiny => "tiny",
            Model::TinyEn => "tiny.en",
            Model::Base => "base",
            Model::BaseEn => "base.en",
            Model::Small => "small",
            Model::SmallEn => "small.en",
            Model::Medium => "medium",
            Model::MediumEn => "medium.en",
            Model::LargeV3 => "large-v3",
            Model::LargeV3Turbo => "large-v3-turbo",
            Model::Custom(_) => "custom",
        }
    }

    pub fn parse_name(s: &str) -> Option<Self> {
        match s {
            "tiny" => Some(Model::Tiny),
            "tiny.en" => Some(Model::TinyEn),
            "base" => Some(Model::Base),
            "base.en" => Some(Model::BaseEn),
            "small" => Some(Model::Small),
            "small.en" => Some(Model::SmallEn),
            "medium" => Some(Model::Medium),
            "medium.en" => Some(Model::MediumEn),
            "large-v3" => Some(Model::LargeV3),
            "large-v3-turbo" => Some(Model::LargeV3Turbo),
            _ => None,
        }
    }
}

/// Options for the whisper.cpp recognizer.
#[derive(Debug, Clone)]
pub struct RecognizerOptions {
    pub model: Model,
    pub cache_dir: Option<PathBuf>,
    pub gpu: bool,
    pub gpu_device: u32,
    pub n_threads: Option<u32>,
    pub temperature: f32,
    pub beam_size: Option<u32>,
}

impl Default for RecognizerOptions {
    fn default() -> Self {
        Self {
            // Small enough to load quickly on a CPU-only host.
            model: Model::Tiny,
            cache_dir: None,
            gpu: true,
            gpu_device: 0,
            n_threads: None,
            temperature: 0.0,
            beam_size: None,
        }
    }
}

impl RecognizerOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn model(mut self, model: Model) -> Self {
        self.model = model;
        self
    }

    pub fn cache_dir(mut self, dir: PathBuf) -> Self {
        self.cache_dir = Some(dir);
        self
    }

    pub fn gpu(mut self, enabled: bool) -> Self {
        self.gpu = enabled;
        self
    }

    pub fn gpu_device(mut self, device: u32) -> Self {
        self.gpu_device = device;
        self
    }

    pub fn n_threads(mut self, n: u32) -> Result<Self, Error> {
        if n == 0 {
            return Err(Error::InvalidOption("thread count must be at least 1".into()));
        }
        self.n_threads = Some(n);
        Ok(self)
    }

    pub fn temperature(mut self, temp: f32) -> Result<Self, Error> {
        if !(0.0..=1.0).contains(&temp) {
            return Err(Error::InvalidOption(format!(
                "temperature must be within 0.0..=1.0, got {temp}"
            )));
        }
        self.temperature = temp;
        Ok(self)
    }

    pub fn beam_size(mut self, size: u32) -> Result<Self, Error> {
        if size == 0 {
            return Err(Error::InvalidOption("beam size must be at least 1".into()));
        }
        self.beam_size = Some(size);
        Ok(self)
    }

    /// Resolve the model cache directory, defaulting to ~/.cache/vidscript/models.
    pub fn resolve_cache_dir(&self) -> PathBuf {
        self.cache_dir.clone().unwrap_or_else(|| {
            dirs::cache_dir()
                .unwrap_or_else(|| PathBuf::from(".cache"))
                .join("vidscript")
                .join("models")
        })
    }
}

/// Options for one [`Acquirer`](crate::acquire::Acquirer).
#[derive(Debug, Clone)]
pub struct AcquireOptions {
    /// Subtitle language preference, most preferred first.
    pub languages: Vec<String>,
    /// Download audio and run speech recognition when no subtitles are found.
    pub use_fallback: bool,
    /// Root directory for temporary audio.
    pub download_dir: PathBuf,
    /// Give every call its own directory under `download_dir`.
    pub isolate_downloads: bool,
    /// Language hint passed to the recognizer.
    pub recognition_language: Language,
}

impl Default for AcquireOptions {
    fn default() -> Self {
        Self {
            languages: DEFAULT_LANGUAGES.iter().map(|s| s.to_string()).collect(),
            use_fallback: true,
            download_dir: std::env::temp_dir().join("vidscript"),
            isolate_downloads: true,
            recognition_language: Language::Auto,
        }
    }
}

impl AcquireOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the language preference list. An empty list keeps only the
    /// "any track" step of the subtitle search.
    pub fn languages<I, S>(mut self, languages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.languages = languages
            .into_iter()
            .map(Into::into)
            .map(|s: String| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        self
    }

    pub fn use_fallback(mut self, enabled: bool) -> Self {
        self.use_fallback = enabled;
        self
    }

    pub fn download_dir(mut self, dir: PathBuf) -> Self {
        self.download_dir = dir;
        self
    }

    pub fn isolate_downloads(mut self, enabled: bool) -> Self {
        self.isolate_downloads = enabled;
        self
    }

    /// Set the recognition hint. Accepts codes, full names, or "auto".
    pub fn recognition_language(mut self, lang: &str) -> Result<Self, Error> {
        self.recognition_language = Language::new(lang)?;
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_filename_matches_repository_layout() {
        assert_eq!(Model::Tiny.filename(), "ggml-tiny.bin");
        assert_eq!(Model::BaseEn.filename(), "ggml-base.en.bin");
        assert_eq!(Model::LargeV3Turbo.filename(), "ggml-large-v3-turbo.bin");
        assert_eq!(
            Model::Custom(PathBuf::from("/models/my.bin")).filename(),
            "my.bin"
        );
    }

    #[test]
    fn test_model_catalog_round_trips_through_parse_name() {
        for (name, _) in Model::CATALOG {
            let model = Model::parse_name(name).unwrap();
            assert_eq!(model.name(), *name);
        }
        assert_eq!(Model::parse_name("huge"), None);
    }

    #[test]
    fn test_language_auto() {
        assert!(Language::new("auto").unwrap().is_auto());
        assert!(Language::new("").unwrap().is_auto());
        assert_eq!(Language::Auto.code(), None);
    }

    #[test]
    fn test_language_rejects_unknown() {
        assert!(matches!(
            Language::new("klingon"),
            Err(Error::UnsupportedLanguage(_))
        ));
    }

    #[test]
    fn test_recognizer_option_validation() {
        assert!(RecognizerOptions::new().n_threads(0).is_err());
        assert!(RecognizerOptions::new().beam_size(0).is_err());
        assert!(RecognizerOptions::new().temperature(1.5).is_err());
        let opts = RecognizerOptions::new().n_threads(4).unwrap();
        assert_eq!(opts.n_threads, Some(4));
    }

    #[test]
    fn test_resolve_cache_dir_prefers_explicit() {
        let opts = RecognizerOptions::new().cache_dir(PathBuf::from("/tmp/models"));
        assert_eq!(opts.resolve_cache_dir(), PathBuf::from("/tmp/models"));
        let default = RecognizerOptions::new().resolve_cache_dir();
        assert!(default.ends_with("vidscript/models"));
    }

    #[test]
    fn test_acquire_defaults() {
        let opts = AcquireOptions::default();
        assert!(opts.use_fallback);
        assert!(opts.isolate_downloads);
        assert_eq!(opts.languages.first().map(String::as_str), Some("en"));
        assert_eq!(opts.languages.len(), DEFAULT_LANGUAGES.len());
    }

    #[test]
    fn test_languages_builder_drops_blanks() {
        let opts = AcquireOptions::new().languages(["ko", " ", " en "]);
        assert_eq!(opts.languages, vec!["ko".to_string(), "en".to_string()]);
    }
}
