//! Error types for bilimusic-core

use std::path::PathBuf;
use thiserror::Error;

/// Failures of a single extraction request. None of these are retried.
#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("Not a valid Bilibili video link (expected https://www.bilibili.com/video/BV...): {0}")]
    InvalidUrl(String),

    #[error("Cannot prepare output directory {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Could not get video information")]
    NoVideoInfo,

    #[error("Output file for {video_id} not found in {}", dir.display())]
    OutputNotFound { video_id: String, dir: PathBuf },

    #[error("yt-dlp not found. Install with: pip install yt-dlp")]
    ExtractorNotFound,

    #[error("yt-dlp failed: {0}")]
    Extractor(String),
}

impl ExtractionError {
    /// Whether the caller can fix this by changing its input.
    pub fn is_user_error(&self) -> bool {
        matches!(self, ExtractionError::InvalidUrl(_))
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load config: {0}")]
    LoadError(String),

    #[error("Invalid config value: {0}")]
    InvalidValue(String),
}
