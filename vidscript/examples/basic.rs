//! Acquire a transcript and print it.
//!
//! Usage: cargo run --example basic -- https://youtu.be/VIDEO_ID

#[tokio::main]
async fn main() -> vidscript::Result<()> {
    let reference = std::env::args()
        .nth(1)
        .expect("usage: basic <video-link>");

    let result = vidscript::acquire_transcript(&reference, true).await?;

    match result.text() {
        Some(text) => println!("{text}"),
        None => eprintln!("no transcript for {}", result.video_id()),
    }

    Ok(())
}
