//! Bilibili video URL recognition

use regex::Regex;
use std::sync::OnceLock;

fn video_url_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)https?://(?:www\.)?bilibili\.com/video/(BV\w+)")
            .expect("video url pattern is a valid regex")
    })
}

/// Check whether a string contains a Bilibili video page URL.
///
/// This is a search, not a full match: surrounding text (share messages,
/// query strings) is allowed.
pub fn is_supported_video_url(url: &str) -> bool {
    video_url_pattern().is_match(url)
}

/// Extract the `BV...` identifier from a video page URL
pub fn video_id(url: &str) -> Option<&str> {
    video_url_pattern()
        .captures(url)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}
