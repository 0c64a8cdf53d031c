//! Caption-track search.
//!
//! Tracks are tried in a fixed priority order: generated tracks in each
//! preferred language, then manual tracks in each preferred language, then
//! whatever else the provider lists. A track that fails to fetch is noted
//! and skipped; only running out of candidates ends the search.

use std::collections::HashSet;
use std::fmt;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::reference::VideoId;
use crate::types::{join_entries, CaptionEntry, CaptionTrack, TrackKind};

/// Source of caption tracks for a video.
#[async_trait]
pub trait CaptionProvider: Send + Sync {
    /// All tracks the provider lists for `video`, in provider order.
    async fn list_tracks(&self, video: &VideoId) -> Result<Vec<CaptionTrack>>;

    /// Download the entries of one track.
    async fn fetch_track(&self, track: &CaptionTrack) -> Result<Vec<CaptionEntry>>;
}

/// A usable caption track and its joined text.
#[derive(Debug, Clone)]
pub struct SubtitleHit {
    pub text: String,
    pub track: CaptionTrack,
}

/// Why a single track (or the listing itself) did not produce text.
#[derive(Debug, Clone)]
pub struct TrackFailure {
    /// None when the track listing failed.
    pub track: Option<(String, TrackKind)>,
    pub reason: String,
}

impl fmt::Display for TrackFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.track {
            Some((lang, kind)) => write!(f, "{lang} ({kind}): {}", self.reason),
            None => write!(f, "listing: {}", self.reason),
        }
    }
}

/// No track produced text. Carries every failure seen along the way.
#[derive(Debug, Clone, Default)]
pub struct SubtitleMiss {
    pub failures: Vec<TrackFailure>,
}

impl SubtitleMiss {
    /// Listed tracks existed but none could be used.
    pub fn had_candidates(&self) -> bool {
        self.failures.iter().any(|f| f.track.is_some())
    }
}

impl From<SubtitleMiss> for Error {
    fn from(_: SubtitleMiss) -> Self {
        Error::NoSubtitleAvailable
    }
}

/// Search `video`'s caption tracks for usable text, honoring `languages` order.
pub async fn fetch_subtitles(
    provider: &dyn CaptionProvider,
    video: &VideoId,
    languages: &[String],
) -> std::result::Result<SubtitleHit, SubtitleMiss> {
    let mut miss = SubtitleMiss::default();

    let tracks = match provider.list_tracks(video).await {
        Ok(tracks) => tracks,
        Err(e) => {
            miss.failures.push(TrackFailure {
                track: None,
                reason: e.to_string(),
            });
            return Err(miss);
        }
    };

    let available: Vec<String> = tracks
        .iter()
        .map(|t| format!("{}:{}", t.language_code, t.kind))
        .collect();
    info!(video_id = %video, tracks = ?available, "caption tracks listed");

    let mut attempted: HashSet<usize> = HashSet::new();

    for kind in [TrackKind::Generated, TrackKind::Manual] {
        for lang in languages {
            let Some(idx) = tracks
                .iter()
                .position(|t| t.kind == kind && t.language_code == *lang)
            else {
                continue;
            };
            attempted.insert(idx);
            if let Some(hit) = try_track(provider, &tracks[idx], &mut miss).await {
                return Ok(hit);
            }
        }
    }

    for (idx, track) in tracks.iter().enumerate() {
        if attempted.contains(&idx) {
            continue;
        }
        if let Some(hit) = try_track(provider, track, &mut miss).await {
            return Ok(hit);
        }
    }

    Err(miss)
}

async fn try_track(
    provider: &dyn CaptionProvider,
    track: &CaptionTrack,
    miss: &mut SubtitleMiss,
) -> Option<SubtitleHit> {
    let failure = |reason: String| TrackFailure {
        track: Some((track.language_code.clone(), track.kind)),
        reason,
    };

    match provider.fetch_track(track).await {
        Ok(entries) => {
            let text = join_entries(&entries);
            if text.is_empty() {
                debug!(language = %track.language_code, kind = %track.kind, "caption track is empty");
                miss.failures.push(failure("track has no text".into()));
                return None;
            }
            info!(
                language = %track.language_code,
                kind = %track.kind,
                chars = text.len(),
                "caption track selected"
            );
            Some(SubtitleHit {
                text,
                track: track.clone(),
            })
        }
        Err(e) => {
            debug!(language = %track.language_code, kind = %track.kind, error = %e, "caption fetch failed");
            miss.failures.push(failure(e.to_string()));
            None
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// In-memory provider. Tracks whose URL has no body configured fail to fetch.
    #[derive(Default)]
    pub(crate) struct FakeCaptions {
        pub tracks: Vec<CaptionTrack>,
        pub bodies: HashMap<String, Vec<CaptionEntry>>,
        pub list_error: bool,
        pub fetched: Mutex<Vec<String>>,
    }

    impl FakeCaptions {
        pub(crate) fn with_track(mut self, lang: &str, kind: TrackKind, text: Option<&str>) -> Self {
            let url = format!("fake://{lang}/{kind}");
            if let Some(text) = text {
                let entries = text
                    .split('|')
                    .enumerate()
                    .map(|(i, t)| CaptionEntry {
                        text: t.to_string(),
                        start: i as f64,
                        duration: 1.0,
                    })
                    .collect();
                self.bodies.insert(url.clone(), entries);
            }
            self.tracks.push(CaptionTrack {
                language_code: lang.to_string(),
                language_name: None,
                kind,
                url,
            });
            self
        }

        pub(crate) fn fetched(&self) -> Vec<String> {
            self.fetched.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CaptionProvider for FakeCaptions {
        async fn list_tracks(&self, _video: &VideoId) -> Result<Vec<CaptionTrack>> {
            if self.list_error {
                return Err(Error::Provider("listing unavailable".into()));
            }
            Ok(self.tracks.clone())
        }

        async fn fetch_track(&self, track: &CaptionTrack) -> Result<Vec<CaptionEntry>> {
            self.fetched.lock().unwrap().push(track.url.clone());
            self.bodies
                .get(&track.url)
                .cloned()
                .ok_or_else(|| Error::Provider(format!("HTTP 429 for {}", track.url)))
        }
    }

    fn video() -> VideoId {
        VideoId::new("abc123").unwrap()
    }

    fn langs(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_generated_track_preferred_over_manual() {
        let provider = FakeCaptions::default()
            .with_track("en", TrackKind::Manual, Some("manual text"))
            .with_track("en", TrackKind::Generated, Some("hello|world"));

        let hit = fetch_subtitles(&provider, &video(), &langs(&["en"])).await.unwrap();
        assert_eq!(hit.text, "hello world");
        assert_eq!(hit.track.kind, TrackKind::Generated);
        assert_eq!(provider.fetched(), vec!["fake://en/generated"]);
    }

    #[tokio::test]
    async fn test_generated_in_any_preferred_language_beats_manual_in_first() {
        let provider = FakeCaptions::default()
            .with_track("en", TrackKind::Manual, Some("english manual"))
            .with_track("ko", TrackKind::Generated, Some("korean auto"));

        let hit = fetch_subtitles(&provider, &video(), &langs(&["en", "ko"]))
            .await
            .unwrap();
        assert_eq!(hit.track.language_code, "ko");
        assert_eq!(hit.track.kind, TrackKind::Generated);
    }

    #[tokio::test]
    async fn test_language_order_is_respected() {
        let provider = FakeCaptions::default()
            .with_track("en", TrackKind::Generated, Some("english"))
            .with_track("ja", TrackKind::Generated, Some("japanese"));

        let hit = fetch_subtitles(&provider, &video(), &langs(&["ja", "en"]))
            .await
            .unwrap();
        assert_eq!(hit.text, "japanese");
    }

    #[tokio::test]
    async fn test_failed_fetch_is_skipped() {
        let provider = FakeCaptions::default()
            .with_track("en", TrackKind::Generated, None)
            .with_track("en", TrackKind::Manual, Some("from manual"));

        let hit = fetch_subtitles(&provider, &video(), &langs(&["en"])).await.unwrap();
        assert_eq!(hit.text, "from manual");
        assert_eq!(
            provider.fetched(),
            vec!["fake://en/generated", "fake://en/manual"]
        );
    }

    #[tokio::test]
    async fn test_any_language_fallback_skips_already_attempted() {
        let provider = FakeCaptions::default()
            .with_track("en", TrackKind::Generated, None)
            .with_track("de", TrackKind::Manual, Some("guten tag"));

        let hit = fetch_subtitles(&provider, &video(), &langs(&["en"])).await.unwrap();
        assert_eq!(hit.text, "guten tag");
        assert_eq!(hit.track.language_code, "de");
        assert_eq!(
            provider.fetched(),
            vec!["fake://en/generated", "fake://de/manual"]
        );
    }

    #[tokio::test]
    async fn test_empty_track_counts_as_miss() {
        let provider = FakeCaptions::default()
            .with_track("en", TrackKind::Generated, Some(" |\n"))
            .with_track("fr", TrackKind::Generated, Some("bonjour"));

        let hit = fetch_subtitles(&provider, &video(), &langs(&["en"])).await.unwrap();
        assert_eq!(hit.text, "bonjour");
    }

    #[tokio::test]
    async fn test_all_failures_are_collected() {
        let provider = FakeCaptions::default()
            .with_track("en", TrackKind::Generated, None)
            .with_track("fr", TrackKind::Manual, None);

        let miss = fetch_subtitles(&provider, &video(), &langs(&["en"]))
            .await
            .unwrap_err();
        assert_eq!(miss.failures.len(), 2);
        assert!(miss.had_candidates());
        assert!(miss.failures[0].to_string().starts_with("en (generated)"));
        assert!(miss.failures[1].reason.contains("HTTP 429"));
    }

    #[tokio::test]
    async fn test_no_tracks_is_a_clean_miss() {
        let provider = FakeCaptions::default();
        let miss = fetch_subtitles(&provider, &video(), &langs(&["en"]))
            .await
            .unwrap_err();
        assert!(miss.failures.is_empty());
        assert!(!miss.had_candidates());
        assert!(matches!(Error::from(miss), Error::NoSubtitleAvailable));
    }

    #[tokio::test]
    async fn test_listing_error_is_a_miss() {
        let provider = FakeCaptions {
            list_error: true,
            ..Default::default()
        };
        let miss = fetch_subtitles(&provider, &video(), &langs(&["en"]))
            .await
            .unwrap_err();
        assert_eq!(miss.failures.len(), 1);
        assert!(miss.failures[0].track.is_none());
        assert!(!miss.had_candidates());
        assert!(miss.failures[0].to_string().starts_with("listing: "));
        assert!(provider.fetched().is_empty());
    }
}
