//! bilimusic-core: Bilibili video to audio extraction
//!
//! Validates video links, finds a working ffmpeg, and drives yt-dlp to
//! produce one audio file per request.

pub mod config;
pub mod error;
pub mod extractor;
pub mod format;
pub mod locator;
pub mod url;
pub mod workflow;

pub use config::Config;
pub use error::{ConfigError, ExtractionError};
pub use format::AudioFormat;
pub use locator::BinaryLocator;
pub use url::is_supported_video_url;
pub use workflow::{ExtractionRequest, ExtractionResult, Workflow};
