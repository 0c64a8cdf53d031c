//! Acquire with a Korean-first caption preference and a larger recognition model.
//!
//! Usage: cargo run --example options -- https://youtu.be/VIDEO_ID

use vidscript::{AcquireOptions, Acquirer, Model, RecognizerOptions};

#[tokio::main]
async fn main() -> vidscript::Result<()> {
    let reference = std::env::args()
        .nth(1)
        .expect("usage: options <video-link>");

    let acquire = AcquireOptions::new()
        .languages(["ko", "en"])
        .recognition_language("ko")?
        .download_dir(std::env::temp_dir().join("vidscript-demo"));

    let recognizer = RecognizerOptions::new().model(Model::Small).beam_size(5)?;

    let acquirer = Acquirer::with_defaults(acquire, recognizer)?;
    let result = acquirer.acquire(&reference).await?;

    println!("{}", result.to_json_pretty()?);

    Ok(())
}
