use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use vidscript::{
    AcquireOptions, Acquirer, CaptionProvider, Model, RecognizerOptions, WhisperRecognizer,
    YtDlpCaptions, YtDlpDownloader,
};

#[derive(Parser)]
#[command(
    name = "vidscript",
    about = "Get a video's transcript from its captions, or by recognizing its audio"
)]
struct Cli {
    /// Video link (watch, youtu.be, embed, shorts, live).
    #[arg(required_unless_present_any = ["list_models", "download_model"])]
    reference: Option<String>,

    /// Only use published captions; never download audio.
    #[arg(long)]
    no_fallback: bool,

    /// Caption languages in order of preference.
    #[arg(long, value_delimiter = ',')]
    languages: Option<Vec<String>>,

    /// Output format.
    #[arg(short, long, default_value = "text")]
    format: OutputFormat,

    /// Write output to file instead of stdout.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Whisper model name or path to a ggml file.
    #[arg(short, long, default_value = "tiny")]
    model: String,

    /// Spoken language hint for recognition, or "auto".
    #[arg(short, long, default_value = "auto")]
    language: String,

    /// Disable GPU acceleration.
    #[arg(long)]
    no_gpu: bool,

    /// Number of recognition threads (default: auto).
    #[arg(long)]
    threads: Option<u32>,

    /// Directory for temporary audio.
    #[arg(long)]
    download_dir: Option<PathBuf>,

    /// Model cache directory.
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    /// Print video metadata instead of a transcript.
    #[arg(long)]
    info: bool,

    /// List the caption tracks the video offers.
    #[arg(long)]
    list_tracks: bool,

    /// List available models.
    #[arg(long)]
    list_models: bool,

    /// Download a model without acquiring anything.
    #[arg(long)]
    download_model: Option<String>,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

fn fail(msg: impl std::fmt::Display) -> ! {
    eprintln!("Error: {msg}");
    std::process::exit(1);
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("vidscript=info".parse().unwrap()),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut recognizer_opts = RecognizerOptions::new();
    if let Some(dir) = &cli.cache_dir {
        recognizer_opts = recognizer_opts.cache_dir(dir.clone());
    }

    if cli.list_models {
        println!("{:<16} {}", "MODEL", "SIZE");
        println!("{:<16} {}", "-----", "----");
        for (name, size) in Model::CATALOG {
            println!("{name:<16} {size}");
        }

        let cache_dir = recognizer_opts.resolve_cache_dir();
        let cached = vidscript::model::list_cached_models(&cache_dir);
        if !cached.is_empty() {
            println!("\nCached models in {}:", cache_dir.display());
            for path in cached {
                let size = std::fs::metadata(&path)
                    .map(|m| format_bytes(m.len()))
                    .unwrap_or_default();
                println!(
                    "  {} ({})",
                    path.file_name()
                        .map(|f| f.to_string_lossy().into_owned())
                        .unwrap_or_default(),
                    size
                );
            }
        }
        return;
    }

    if let Some(model_name) = &cli.download_model {
        let Some(model) = Model::parse_name(model_name) else {
            eprintln!("Unknown model: {model_name}");
            eprintln!("Use --list-models to see available models");
            std::process::exit(1);
        };
        let cache_dir = recognizer_opts.resolve_cache_dir();
        match vidscript::model::ensure_model(&model, &cache_dir).await {
            Ok(path) => println!("Model ready: {}", path.display()),
            Err(e) => fail(e),
        }
        return;
    }

    let Some(reference) = cli.reference.as_deref() else {
        fail("a video reference is required");
    };
    let video = vidscript::extract_video_id(reference).unwrap_or_else(|e| fail(e));

    let captions = YtDlpCaptions::new().unwrap_or_else(|e| fail(e));

    if cli.info {
        let info = captions.video_info(&video).await.unwrap_or_else(|e| fail(e));
        let json = serde_json::to_string_pretty(&info).unwrap_or_else(|e| fail(e));
        emit(&cli.output, &format!("{json}\n"));
        return;
    }

    if cli.list_tracks {
        let tracks = captions.list_tracks(&video).await.unwrap_or_else(|e| fail(e));
        if tracks.is_empty() {
            eprintln!("No caption tracks for {video}");
            std::process::exit(1);
        }
        println!("{:<10} {:<10} {}", "LANGUAGE", "KIND", "NAME");
        println!("{:<10} {:<10} {}", "--------", "----", "----");
        for track in tracks {
            println!(
                "{:<10} {:<10} {}",
                track.language_code,
                track.kind.to_string(),
                track.language_name.unwrap_or_default()
            );
        }
        return;
    }

    let model = match Model::parse_name(&cli.model) {
        Some(m) => m,
        None => {
            let path = PathBuf::from(&cli.model);
            if path.exists() {
                Model::Custom(path)
            } else {
                eprintln!("Unknown model: {}", cli.model);
                eprintln!("Use --list-models to see available models, or provide a path to a ggml file");
                std::process::exit(1);
            }
        }
    };

    recognizer_opts = recognizer_opts.model(model).gpu(!cli.no_gpu);
    if let Some(n) = cli.threads {
        recognizer_opts = recognizer_opts.n_threads(n).unwrap_or_else(|e| fail(e));
    }

    let mut acquire_opts = AcquireOptions::new()
        .use_fallback(!cli.no_fallback)
        .recognition_language(&cli.language)
        .unwrap_or_else(|e| fail(e));
    if let Some(languages) = cli.languages {
        acquire_opts = acquire_opts.languages(languages);
    }
    if let Some(dir) = cli.download_dir {
        acquire_opts = acquire_opts.download_dir(dir);
    }

    let acquirer = Acquirer::new(
        Arc::new(captions),
        Arc::new(YtDlpDownloader::new()),
        Arc::new(WhisperRecognizer::new(recognizer_opts)),
        acquire_opts,
    );

    let result = acquirer.acquire(reference).await.unwrap_or_else(|e| fail(e));

    eprintln!(
        "Source: {}, language: {}",
        result.source(),
        result.detected_language().unwrap_or("unknown"),
    );

    let output_text = match cli.format {
        OutputFormat::Text => match result.text() {
            Some(text) => format!("{text}\n"),
            None => String::new(),
        },
        OutputFormat::Json => match result.to_json_pretty() {
            Ok(j) => format!("{j}\n"),
            Err(e) => fail(format!("JSON error: {e}")),
        },
    };

    if !output_text.is_empty() {
        emit(&cli.output, &output_text);
    }

    if !result.has_transcript() {
        eprintln!("No transcript available for {}", result.video_id());
        std::process::exit(1);
    }
}

fn emit(output: &Option<PathBuf>, text: &str) {
    match output {
        Some(path) => {
            if let Err(e) = std::fs::write(path, text) {
                fail(format!("writing to {}: {e}", path.display()));
            }
            eprintln!("Written to {}", path.display());
        }
        None => print!("{text}"),
    }
}

fn format_bytes(bytes: u64) -> String {
    if bytes >= 1_000_000_000 {
        format!("{:.1} GB", bytes as f64 / 1_000_000_000.0)
    } else if bytes >= 1_000_000 {
        format!("{:.0} MB", bytes as f64 / 1_000_000.0)
    } else {
        format!("{:.0} KB", bytes as f64 / 1_000.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(75_000_000), "75 MB");
        assert_eq!(format_bytes(2_900_000_000), "2.9 GB");
        assert_eq!(format_bytes(512_000), "512 KB");
    }

    #[test]
    fn test_cli_parses_language_list() {
        let cli = Cli::try_parse_from([
            "vidscript",
            "https://youtu.be/abc123",
            "--languages",
            "ko,en",
            "--no-fallback",
            "--format",
            "json",
        ])
        .unwrap();
        assert_eq!(
            cli.languages,
            Some(vec!["ko".to_string(), "en".to_string()])
        );
        assert!(cli.no_fallback);
        assert!(matches!(cli.format, OutputFormat::Json));
    }

    #[test]
    fn test_cli_requires_reference() {
        assert!(Cli::try_parse_from(["vidscript"]).is_err());
        assert!(Cli::try_parse_from(["vidscript", "--list-models"]).is_ok());
    }
}
