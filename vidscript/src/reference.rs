use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Canonical identifier of a video in the provider's namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VideoId(String);

impl TryFrom<String> for VideoId {
    type Error = Error;

    fn try_from(id: String) -> Result<Self> {
        VideoId::new(id)
    }
}

impl From<VideoId> for String {
    fn from(id: VideoId) -> Self {
        id.0
    }
}

impl VideoId {
    /// Wrap an already-extracted token, rejecting anything outside `[A-Za-z0-9_-]`.
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if !id.is_empty() && id.chars().all(is_id_char) {
            Ok(Self(id))
        } else {
            Err(Error::InvalidReference(id))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Canonical watch link, used whenever an external tool needs a URL.
    pub fn watch_url(&self) -> String {
        format!("https://www.youtube.com/watch?v={}", self.0)
    }
}

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn is_id_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

// Recognized reference shapes, tried in order.
static PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"youtube\.com/watch\?(?:[^#\s]*&)?v=([A-Za-z0-9_-]+)",
        r"youtu\.be/([A-Za-z0-9_-]+)",
        r"youtube\.com/embed/([A-Za-z0-9_-]+)",
        r"youtube\.com/v/([A-Za-z0-9_-]+)",
        r"youtube\.com/shorts/([A-Za-z0-9_-]+)",
        r"youtube\.com/live/([A-Za-z0-9_-]+)",
    ]
    .iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect()
});

/// Parse a video reference (watch, short, embed, shorts or live link) into a [`VideoId`].
///
/// Pure function: no network, no filesystem.
pub fn extract_video_id(reference: &str) -> Result<VideoId> {
    let trimmed = reference.trim();

    PATTERNS
        .iter()
        .find_map(|re| re.captures(trimmed))
        .and_then(|caps| caps.get(1))
        .map(|m| VideoId(m.as_str().to_string()))
        .ok_or_else(|| Error::InvalidReference(trimmed.to_string()))
}
