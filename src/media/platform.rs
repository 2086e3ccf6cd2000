//! Source platform detection from video URLs.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

static TIKTOK_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"^https?://(?:www\.)?tiktok\.com/@[\w.-]+/video/\d+",
        r"^https?://(?:vm|vt)\.tiktok\.com/[\w.-]+",
        r"^https?://(?:www\.)?tiktok\.com/t/[\w.-]+",
    ]
    .iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect()
});

static YOUTUBE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"^https?://(?:www\.)?youtube\.com/shorts/[\w-]+",
        r"^https?://youtu\.be/[\w-]+",
        r"^https?://(?:www\.)?youtube\.com/watch\?v=[\w-]+",
    ]
    .iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect()
});

/// Platform a downloadable video lives on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourcePlatform {
    Tiktok,
    Youtube,
    Unknown,
}

impl SourcePlatform {
    /// Classify a URL.
    pub fn detect(url: &str) -> Self {
        let url = url.trim();
        if TIKTOK_PATTERNS.iter().any(|re| re.is_match(url)) {
            SourcePlatform::Tiktok
        } else if YOUTUBE_PATTERNS.iter().any(|re| re.is_match(url)) {
            SourcePlatform::Youtube
        } else {
            SourcePlatform::Unknown
        }
    }
}

impl std::fmt::Display for SourcePlatform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourcePlatform::Tiktok => write!(f, "tiktok"),
            SourcePlatform::Youtube => write!(f, "youtube"),
            SourcePlatform::Unknown => write!(f, "unknown"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_platforms() {
        assert_eq!(
            SourcePlatform::detect("https://www.tiktok.com/@chef.mia/video/7301234567890"),
            SourcePlatform::Tiktok
        );
        assert_eq!(
            SourcePlatform::detect("https://vm.tiktok.com/ZMabc123/"),
            SourcePlatform::Tiktok
        );
        assert_eq!(SourcePlatform::detect("https://tiktok.com/t/ZTabc/"), SourcePlatform::Tiktok);
        assert_eq!(
            SourcePlatform::detect("https://www.youtube.com/shorts/rqLEUxeOQWo"),
            SourcePlatform::Youtube
        );
        assert_eq!(SourcePlatform::detect("https://youtu.be/dQw4w9WgXcQ"), SourcePlatform::Youtube);
        assert_eq!(
            SourcePlatform::detect("https://youtube.com/watch?v=dQw4w9WgXcQ"),
            SourcePlatform::Youtube
        );
        assert_eq!(SourcePlatform::detect("https://vimeo.com/12345"), SourcePlatform::Unknown);
        assert_eq!(SourcePlatform::detect("youtube.com/shorts/abc"), SourcePlatform::Unknown);
    }
}
