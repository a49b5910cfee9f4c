//! Well-known URY endpoints.
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Prefix shared by every stream URL.
pub const STREAM_PREFIX: &str = "http://ury.york.ac.uk/audio/";

pub const HIGH_STREAM: &str = "http://ury.york.ac.uk/audio/live-high";
pub const LOW_STREAM: &str = "http://ury.york.ac.uk/audio/live-low";
/// Ultra-low bitrate stream for phones.
pub const MOBILE_STREAM: &str = "http://ury.york.ac.uk/audio/live-mobile";

pub const WEBCAM_URL: &str = "http://ury.york.ac.uk/webcam/getcam.php";
pub const WEBCAM_INTERVAL: Duration = Duration::from_millis(2000);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    #[default]
    High,
    Low,
    Mobile,
}

impl Quality {
    pub const ALL: [Quality; 3] = [Quality::High, Quality::Low, Quality::Mobile];

    pub fn url(self) -> &'static str {
        match self {
            Quality::High => HIGH_STREAM,
            Quality::Low => LOW_STREAM,
            Quality::Mobile => MOBILE_STREAM,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Quality::High => "High quality",
            Quality::Low => "Low quality",
            Quality::Mobile => "Mobile",
        }
    }

    /// Maps a configured endpoint back to its quality, if it is one of ours.
    pub fn from_url(url: &str) -> Option<Quality> {
        Self::ALL.into_iter().find(|q| q.url() == url)
    }

    pub fn from_name(name: &str) -> Option<Quality> {
        match name.trim().to_ascii_lowercase().as_str() {
            "high" => Some(Quality::High),
            "low" => Some(Quality::Low),
            "mobile" => Some(Quality::Mobile),
            _ => None,
        }
    }

    pub fn next(self) -> Quality {
        match self {
            Quality::High => Quality::Low,
            Quality::Low => Quality::Mobile,
            Quality::Mobile => Quality::High,
        }
    }

    pub fn previous(self) -> Quality {
        match self {
            Quality::High => Quality::Mobile,
            Quality::Low => Quality::High,
            Quality::Mobile => Quality::Low,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urls_share_prefix() {
        for quality in Quality::ALL {
            assert!(quality.url().starts_with(STREAM_PREFIX));
        }
    }

    #[test]
    fn test_from_url() {
        assert_eq!(Quality::from_url(LOW_STREAM), Some(Quality::Low));
        assert_eq!(Quality::from_url("http://example.com/other.mp3"), None);
    }

    #[test]
    fn test_from_name_is_case_insensitive() {
        assert_eq!(Quality::from_name(" Mobile "), Some(Quality::Mobile));
        assert_eq!(Quality::from_name("ultra"), None);
    }

    #[test]
    fn test_cycle_wraps() {
        assert_eq!(Quality::Mobile.next(), Quality::High);
        assert_eq!(Quality::High.previous(), Quality::Mobile);
    }
}
