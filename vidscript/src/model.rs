use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures_util::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};
use whisper_rs::{WhisperContext, WhisperContextParameters};

use crate::config::{Model, RecognizerOptions};
use crate::error::{Error, Result};

const HUGGINGFACE_BASE: &str = "https://huggingface.co/ggerganov/whisper.cpp/resolve/main";

/// Anything smaller is an HTML error page, not a ggml model.
const MIN_MODEL_BYTES: u64 = 1_000_000;

/// Ensure a model is available locally, downloading if necessary.
/// Returns the path to the model file.
pub async fn ensure_model(model: &Model, cache_dir: &Path) -> Result<PathBuf> {
    if let Model::Custom(path) = model {
        return if path.exists() {
            Ok(path.clone())
        } else {
            Err(Error::ModelNotFound { path: path.clone() })
        };
    }

    let model_path = cache_dir.join(model.filename());
    if model_path.exists() {
        debug!(path = %model_path.display(), "model already cached");
        return Ok(model_path);
    }

    tokio::fs::create_dir_all(cache_dir).await.map_err(|e| {
        Error::Model(format!(
            "failed to create cache dir {}: {e}",
            cache_dir.display()
        ))
    })?;

    let url = format!("{HUGGINGFACE_BASE}/{}", model.filename());
    info!(%url, "downloading model");
    download_model(&url, &model_path).await?;

    Ok(model_path)
}

async fn download_model(url: &str, dest: &Path) -> Result<()> {
    let response = reqwest::Client::new()
        .get(url)
        .send()
        .await?
        .error_for_status()
        .map_err(|e| Error::ModelDownload(format!("HTTP error: {e}")))?;

    let total_size = response.content_length().unwrap_or(0);

    let pb = ProgressBar::new(total_size);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{msg}\n{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})")
            .expect("valid template")
            .progress_chars("#>-"),
    );
    pb.set_message(format!(
        "Downloading {}",
        dest.file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_default()
    ));

    // Stream into a .part file and rename once complete, so an interrupted
    // download never looks like a cached model.
    let tmp_path = dest.with_extension("bin.part");
    let mut file = std::fs::File::create(&tmp_path)?;
    let mut stream = response.bytes_stream();

    use std::io::Write;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk)?;
        pb.inc(chunk.len() as u64);
    }
    file.flush()?;
    drop(file);

    let file_size = std::fs::metadata(&tmp_path)?.len();
    if file_size < MIN_MODEL_BYTES {
        std::fs::remove_file(&tmp_path).ok();
        return Err(Error::ModelDownload(format!(
            "downloaded file too small ({file_size} bytes), likely an error page"
        )));
    }

    std::fs::rename(&tmp_path, dest)?;
    pb.finish_with_message("Download complete");

    if total_size > 0 && file_size != total_size {
        warn!(
            expected = total_size,
            actual = file_size,
            "file size mismatch, model may be corrupt"
        );
    }

    info!(path = %dest.display(), size = file_size, "model saved");
    Ok(())
}

/// List all cached models.
pub fn list_cached_models(cache_dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(cache_dir) else {
        return Vec::new();
    };

    entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "bin"))
        .collect()
}

/// A value built at most once and shared by every clone.
///
/// Concurrent first callers wait on the single in-flight initialization.
/// A failed initialization stores nothing, so a later call tries again.
pub(crate) struct SharedOnce<T> {
    cell: Arc<OnceCell<T>>,
}

impl<T> Clone for SharedOnce<T> {
    fn clone(&self) -> Self {
        Self {
            cell: Arc::clone(&self.cell),
        }
    }
}

impl<T> SharedOnce<T> {
    pub(crate) fn new() -> Self {
        Self {
            cell: Arc::new(OnceCell::new()),
        }
    }

    pub(crate) fn shares_with(&self, other: &SharedOnce<T>) -> bool {
        Arc::ptr_eq(&self.cell, &other.cell)
    }

    pub(crate) fn is_initialized(&self) -> bool {
        self.cell.initialized()
    }

    pub(crate) async fn get_or_try_init<F, Fut>(&self, init: F) -> Result<&T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.cell.get_or_try_init(init).await
    }
}

/// Lazily loaded whisper context shared by every clone of the handle.
///
/// The first caller of [`ModelHandle::get`] resolves the model file and
/// loads it; concurrent first callers wait for that single load. A failed
/// load leaves the handle empty so the next call retries.
#[derive(Clone)]
pub struct ModelHandle {
    options: Arc<RecognizerOptions>,
    context: SharedOnce<Arc<WhisperContext>>,
}

impl ModelHandle {
    pub fn new(options: RecognizerOptions) -> Self {
        Self {
            options: Arc::new(options),
            context: SharedOnce::new(),
        }
    }

    pub fn options(&self) -> &RecognizerOptions {
        &self.options
    }

    /// Whether both handles refer to the same (possibly not yet loaded) model.
    pub fn shares_with(&self, other: &ModelHandle) -> bool {
        self.context.shares_with(&other.context)
    }

    pub fn is_loaded(&self) -> bool {
        self.context.is_initialized()
    }

    /// Return the loaded context, loading it on first use.
    pub async fn get(&self) -> Result<Arc<WhisperContext>> {
        let ctx = self
            .context
            .get_or_try_init(|| load_context(Arc::clone(&self.options)))
            .await?;
        Ok(Arc::clone(ctx))
    }
}

async fn load_context(options: Arc<RecognizerOptions>) -> Result<Arc<WhisperContext>> {
    let model_path = ensure_model(&options.model, &options.resolve_cache_dir()).await?;
    info!(model = %model_path.display(), "loading whisper model");

    tokio::task::spawn_blocking(move || -> Result<Arc<WhisperContext>> {
        let mut ctx_params = WhisperContextParameters::new();
        ctx_params.use_gpu(options.gpu);
        ctx_params.gpu_device(options.gpu_device as i32);

        let path = model_path
            .to_str()
            .ok_or_else(|| Error::Model("model path contains invalid UTF-8".into()))?;
        let ctx = WhisperContext::new_with_params(path, ctx_params)?;
        info!(model = options.model.name(), "whisper model loaded");
        Ok(Arc::new(ctx))
    })
    .await
    .map_err(|e| Error::Model(format!("model loader task failed: {e}")))?
}
