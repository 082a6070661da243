//! End-to-end audio extraction for one request

use crate::config::Config;
use crate::error::ExtractionError;
use crate::extractor::{ExtractorOptions, MediaExtractor, PostProcessor, VideoInfo, YtDlp};
use crate::format::AudioFormat;
use crate::locator::{normalize, BinaryLocator};
use crate::url::{is_supported_video_url, video_id};

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Instant, SystemTime};
use tracing::{debug, info, warn};

/// Filename layout: title (at most 100 chars) plus the video id, which keeps
/// names unique and lets the output be found again by id.
pub const OUTPUT_TEMPLATE: &str = "%(title).100s [%(id)s].%(ext)s";

/// Best audio-only stream, or the best combined stream if there is none
pub const FORMAT_SELECTOR: &str = "bestaudio/best";

pub const MAX_QUALITY: u8 = 9;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionRequest {
    pub url: String,
    pub output_dir: PathBuf,
    pub format: AudioFormat,
    /// 0 (best) to 9 (smallest)
    pub quality: u8,
}

impl ExtractionRequest {
    pub fn new(url: impl Into<String>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            url: url.into(),
            output_dir: output_dir.into(),
            format: AudioFormat::default(),
            quality: 0,
        }
    }

    pub fn with_format(mut self, format: AudioFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_quality(mut self, quality: u8) -> Self {
        self.quality = quality.min(MAX_QUALITY);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionResult {
    /// Absolute path of an existing audio file
    pub path: PathBuf,
}

/// Runs extractions with a fixed locator and backend
pub struct Workflow {
    locator: BinaryLocator,
    extractor: Arc<dyn MediaExtractor>,
}

impl Workflow {
    pub fn new(locator: BinaryLocator, extractor: Arc<dyn MediaExtractor>) -> Self {
        Self { locator, extractor }
    }

    /// ffmpeg locator and yt-dlp backend as configured
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            BinaryLocator::ffmpeg(&config.locator),
            Arc::new(YtDlp::from_config(config)),
        )
    }

    pub fn locator(&self) -> &BinaryLocator {
        &self.locator
    }

    pub fn extractor(&self) -> &dyn MediaExtractor {
        self.extractor.as_ref()
    }

    /// Download `request.url` and convert it to a single audio file.
    pub async fn extract_audio(
        &self,
        request: &ExtractionRequest,
    ) -> Result<ExtractionResult, ExtractionError> {
        // Nothing may touch the disk or spawn before the URL is accepted
        if !is_supported_video_url(&request.url) {
            return Err(ExtractionError::InvalidUrl(request.url.clone()));
        }

        let start_time = Instant::now();
        info!("Extracting {} audio from: {}", request.format, request.url);

        tokio::fs::create_dir_all(&request.output_dir)
            .await
            .map_err(|source| ExtractionError::Io {
                path: request.output_dir.clone(),
                source,
            })?;

        let ffmpeg = self.locator.locate().await;
        if ffmpeg.is_none() {
            warn!("No working ffmpeg found, leaving discovery to {}", self.extractor.name());
        }

        let options = extractor_options(request, ffmpeg);
        let info = self
            .extractor
            .extract(&request.url, &options)
            .await?
            .ok_or(ExtractionError::NoVideoInfo)?;

        let path = resolve_output(&info, request).await?;
        let path = absolute(&path);

        info!(
            "Saved \"{}\" to {} ({:.1}s)",
            info.title.as_deref().unwrap_or("untitled"),
            path.display(),
            start_time.elapsed().as_secs_f32()
        );
        Ok(ExtractionResult { path })
    }
}

/// Backend settings for one request
pub fn extractor_options(request: &ExtractionRequest, ffmpeg: Option<PathBuf>) -> ExtractorOptions {
    ExtractorOptions {
        format: FORMAT_SELECTOR.to_string(),
        output_template: request.output_dir.join(OUTPUT_TEMPLATE),
        restrict_filenames: true,
        postprocessors: vec![PostProcessor::ExtractAudio {
            codec: request.format,
            quality: request.quality.min(MAX_QUALITY),
        }],
        ffmpeg_location: ffmpeg,
    }
}

/// Trust the reported path only if the file is there, otherwise look for it by id.
async fn resolve_output(
    info: &VideoInfo,
    request: &ExtractionRequest,
) -> Result<PathBuf, ExtractionError> {
    if let Some(reported) = info.reported_path() {
        if is_file(reported).await {
            return Ok(reported.clone());
        }
        warn!("Reported output {} does not exist, scanning {}", reported.display(), request.output_dir.display());
    } else {
        warn!("No output path reported, scanning {}", request.output_dir.display());
    }

    // Metadata without an id still came from this URL
    let Some(id) = info.id.as_deref().or_else(|| video_id(&request.url)) else {
        return Err(ExtractionError::OutputNotFound {
            video_id: "unknown".to_string(),
            dir: request.output_dir.clone(),
        });
    };
    if let Some(found) = scan_output_dir(&request.output_dir, id, request.format).await {
        return Ok(found);
    }

    Err(ExtractionError::OutputNotFound {
        video_id: id.to_string(),
        dir: request.output_dir.clone(),
    })
}

/// Newest regular file directly in `dir` whose name contains `video_id` and
/// ends with the format's extension.
pub async fn scan_output_dir(dir: &Path, video_id: &str, format: AudioFormat) -> Option<PathBuf> {
    let suffix = format!(".{}", format.extension());
    let mut entries = tokio::fs::read_dir(dir).await.ok()?;
    let mut newest: Option<(SystemTime, PathBuf)> = None;

    while let Ok(Some(entry)) = entries.next_entry().await {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if !name.contains(video_id) || !name.ends_with(&suffix) {
            continue;
        }
        let Ok(metadata) = entry.metadata().await else {
            continue;
        };
        if !metadata.is_file() {
            continue;
        }
        let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
        debug!("Output candidate: {}", name);
        if newest.as_ref().map_or(true, |(time, _)| modified >= *time) {
            newest = Some((modified, entry.path()));
        }
    }

    newest.map(|(_, path)| path)
}

async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false)
}

fn absolute(path: &Path) -> PathBuf {
    let cwd = std::env::current_dir().unwrap_or_default();
    normalize(path, &cwd)
}
