use std::collections::{BTreeMap, HashSet};
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::reference::VideoId;
use crate::subtitle::CaptionProvider;
use crate::types::{CaptionEntry, CaptionTrack, TrackKind, VideoInfo};
use crate::ytdlp::YtDlp;

const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// The only caption body format we parse.
const CAPTION_FORMAT: &str = "json3";

#[derive(Debug, Deserialize)]
struct YtDlpInfo {
    id: String,
    title: Option<String>,
    description: Option<String>,
    duration: Option<f64>,
    thumbnail: Option<String>,
    channel: Option<String>,
    uploader: Option<String>,
    view_count: Option<u64>,
    upload_date: Option<String>,
    #[serde(default)]
    subtitles: BTreeMap<String, Vec<YtDlpSubtitle>>,
    #[serde(default)]
    automatic_captions: BTreeMap<String, Vec<YtDlpSubtitle>>,
}

#[derive(Debug, Deserialize)]
struct YtDlpSubtitle {
    ext: Option<String>,
    url: Option<String>,
    name: Option<String>,
}

impl From<&YtDlpInfo> for VideoInfo {
    fn from(info: &YtDlpInfo) -> Self {
        VideoInfo {
            video_id: info.id.clone(),
            title: info.title.clone(),
            description: info.description.clone(),
            duration: info.duration,
            thumbnail_url: info.thumbnail.clone(),
            channel: info.channel.clone().or_else(|| info.uploader.clone()),
            view_count: info.view_count,
            upload_date: info.upload_date.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct Json3 {
    #[serde(default)]
    events: Vec<Json3Event>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Json3Event {
    #[serde(default)]
    t_start_ms: u64,
    #[serde(default)]
    d_duration_ms: u64,
    segs: Option<Vec<Json3Segment>>,
}

#[derive(Debug, Deserialize)]
struct Json3Segment {
    #[serde(default)]
    utf8: String,
}

/// YouTube caption tracks and metadata, listed by yt-dlp and fetched over HTTP.
#[derive(Debug, Clone)]
pub struct YtDlpCaptions {
    ytdlp: YtDlp,
    client: reqwest::Client,
}

impl YtDlpCaptions {
    pub fn new() -> Result<Self> {
        Self::with_options(YtDlp::default(), DEFAULT_HTTP_TIMEOUT)
    }

    pub fn with_options(ytdlp: YtDlp, http_timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(http_timeout)
            .user_agent(concat!("vidscript/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { ytdlp, client })
    }

    /// Title, channel, duration and friends for `video`.
    pub async fn video_info(&self, video: &VideoId) -> Result<VideoInfo> {
        let info = self.dump(video).await?;
        Ok(VideoInfo::from(&info))
    }

    async fn dump(&self, video: &VideoId) -> Result<YtDlpInfo> {
        let output = self
            .ytdlp
            .run([
                "--dump-json",
                "--skip-download",
                "--no-exec",
                "--no-warnings",
                "--no-playlist",
                &video.watch_url(),
            ])
            .await?;
        Ok(serde_json::from_slice(&output.stdout)?)
    }
}

#[async_trait]
impl CaptionProvider for YtDlpCaptions {
    async fn list_tracks(&self, video: &VideoId) -> Result<Vec<CaptionTrack>> {
        let info = self.dump(video).await?;
        let tracks = collect_tracks(&info);
        debug!(video_id = %video, count = tracks.len(), "caption tracks collected");
        Ok(tracks)
    }

    async fn fetch_track(&self, track: &CaptionTrack) -> Result<Vec<CaptionEntry>> {
        let body = self
            .client
            .get(&track.url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        let entries = parse_json3(&body)?;
        info!(language = %track.language_code, entries = entries.len(), "caption track fetched");
        Ok(entries)
    }
}

/// Manual tracks first, then generated ones, each in language-code order.
///
/// Machine translations of the generated track (`tlang=` URLs) are not
/// tracks of their own and are left out, as is the live-chat replay.
fn collect_tracks(info: &YtDlpInfo) -> Vec<CaptionTrack> {
    let mut seen: HashSet<(String, TrackKind)> = HashSet::new();
    let mut tracks = Vec::new();

    let groups = [
        (TrackKind::Manual, &info.subtitles),
        (TrackKind::Generated, &info.automatic_captions),
    ];

    for (kind, group) in groups {
        for (key, formats) in group {
            if key == "live_chat" {
                continue;
            }
            let Some(format) = formats
                .iter()
                .find(|f| f.ext.as_deref() == Some(CAPTION_FORMAT))
            else {
                continue;
            };
            let Some(url) = format.url.as_deref() else {
                continue;
            };
            if kind == TrackKind::Generated && url.contains("tlang=") {
                continue;
            }

            let language_code = key.strip_suffix("-orig").unwrap_or(key).to_string();
            if !seen.insert((language_code.clone(), kind)) {
                continue;
            }

            tracks.push(CaptionTrack {
                language_code,
                language_name: format.name.clone(),
                kind,
                url: url.to_string(),
            });
        }
    }

    tracks
}

fn parse_json3(body: &str) -> Result<Vec<CaptionEntry>> {
    let doc: Json3 = serde_json::from_str(body)
        .map_err(|e| Error::Provider(format!("malformed json3 caption body: {e}")))?;

    Ok(doc
        .events
        .into_iter()
        .filter_map(|event| {
            let text: String = event.segs?.into_iter().map(|s| s.utf8).collect();
            if text.trim().is_empty() {
                return None;
            }
            Some(CaptionEntry {
                text,
                start: event.t_start_ms as f64 / 1000.0,
                duration: event.d_duration_ms as f64 / 1000.0,
            })
        })
        .collect())
}
