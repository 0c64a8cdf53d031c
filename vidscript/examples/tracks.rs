//! List a video's caption tracks and show which one the search would pick.
//!
//! Usage: cargo run --example tracks -- https://youtu.be/VIDEO_ID

use vidscript::{CaptionProvider, YtDlpCaptions, DEFAULT_LANGUAGES};

#[tokio::main]
async fn main() -> vidscript::Result<()> {
    let reference = std::env::args()
        .nth(1)
        .expect("usage: tracks <video-link>");

    let video = vidscript::extract_video_id(&reference)?;
    let captions = YtDlpCaptions::new()?;

    for track in captions.list_tracks(&video).await? {
        println!("{:<8} {}", track.language_code, track.kind);
    }

    let languages: Vec<String> = DEFAULT_LANGUAGES.iter().map(|s| s.to_string()).collect();
    match vidscript::fetch_subtitles(&captions, &video, &languages).await {
        Ok(hit) => println!(
            "\nselected {} ({}): {} chars",
            hit.track.language_code,
            hit.track.kind,
            hit.text.len()
        ),
        Err(miss) => {
            println!("\nno usable track");
            for failure in miss.failures {
                println!("  {failure}");
            }
        }
    }

    Ok(())
}
