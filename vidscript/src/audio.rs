use std::path::Path;

use tracing::{debug, info};

use crate::error::{Error, Result};

/// whisper.cpp only accepts 16 kHz mono.
pub(crate) const WHISPER_SAMPLE_RATE: u32 = 16_000;

/// Upper bound on decoded duration (8 hours, ~1.8 GB of f32 samples).
const MAX_AUDIO_DURATION_SECS: f64 = 8.0 * 3600.0;

/// Below this RMS the file is treated as silence.
const MIN_RMS: f32 = 1e-6;

/// Decode an audio file into 16 kHz mono f32 samples via an ffmpeg subprocess.
///
/// ffmpeg does the container/codec work, the downmix and the resampling in
/// one pass; whatever yt-dlp produced (mp3, m4a, opus, wav …) is accepted.
pub(crate) async fn load_audio(path: &Path) -> Result<Vec<f32>> {
    info!(path = %path.display(), "decoding audio");

    if !path.exists() {
        return Err(Error::AudioNotFound {
            path: path.to_path_buf(),
        });
    }

    let output = tokio::process::Command::new("ffmpeg")
        .args(["-nostdin", "-threads", "0", "-i"])
        .arg(path)
        .args(["-f", "s16le", "-ac", "1", "-acodec", "pcm_s16le", "-ar"])
        .arg(WHISPER_SAMPLE_RATE.to_string())
        .arg("-")
        .output()
        .await
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::AudioDecode("ffmpeg not found, install with: apt install ffmpeg".into())
            } else {
                Error::AudioDecode(format!("failed to run ffmpeg: {e}"))
            }
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let stderr: String = stderr.chars().take(1000).collect();
        return Err(Error::AudioDecode(format!("ffmpeg failed: {stderr}")));
    }

    let samples = pcm_s16le_to_f32(&output.stdout);
    check_samples(&samples)?;

    debug!(
        samples = samples.len(),
        duration_secs = format!("{:.1}", duration_secs(&samples)),
        "audio ready"
    );
    Ok(samples)
}

/// Convert little-endian signed 16-bit PCM into f32 in [-1.0, 1.0).
/// A trailing odd byte is ignored.
fn pcm_s16le_to_f32(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]) as f32 / 32768.0)
        .collect()
}

fn check_samples(samples: &[f32]) -> Result<()> {
    if samples.is_empty() {
        return Err(Error::AudioDecode("ffmpeg produced no audio".into()));
    }

    let duration = duration_secs(samples);
    if duration > MAX_AUDIO_DURATION_SECS {
        return Err(Error::AudioDecode(format!(
            "audio too long ({duration:.0}s), maximum supported duration is {MAX_AUDIO_DURATION_SECS:.0}s"
        )));
    }

    if rms(samples) < MIN_RMS {
        return Err(Error::AudioDecode("audio is silent".into()));
    }

    Ok(())
}

fn duration_secs(samples: &[f32]) -> f64 {
    samples.len() as f64 / WHISPER_SAMPLE_RATE as f64
}

fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f32 = samples.iter().map(|&s| s * s).sum();
    (sum_sq / samples.len() as f32).sqrt()
}
