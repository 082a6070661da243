//! Video extraction backend (yt-dlp)

use crate::config::Config;
use crate::error::ExtractionError;
use crate::format::AudioFormat;
use async_trait::async_trait;
use serde::Deserialize;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info};

/// Post-processing steps the backend runs after download
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostProcessor {
    ExtractAudio { codec: AudioFormat, quality: u8 },
}

#[derive(Debug, Clone)]
pub struct ExtractorOptions {
    /// Format selection expression, e.g. `bestaudio/best`
    pub format: String,
    /// Output path template including the directory
    pub output_template: PathBuf,
    /// Keep filenames to a portable ASCII subset
    pub restrict_filenames: bool,
    pub postprocessors: Vec<PostProcessor>,
    /// Exact ffmpeg binary to use instead of the backend's own lookup
    pub ffmpeg_location: Option<PathBuf>,
}

/// Metadata reported by the backend after the final file is in place
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VideoInfo {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub filepath: Option<PathBuf>,
    #[serde(default)]
    pub requested_downloads: Option<Vec<RequestedDownload>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RequestedDownload {
    #[serde(default)]
    pub filepath: Option<PathBuf>,
}

impl VideoInfo {
    /// Where the backend says the converted file ended up.
    /// Not always accurate after post-processing; callers must check it exists.
    pub fn reported_path(&self) -> Option<&PathBuf> {
        self.requested_downloads
            .as_ref()
            .and_then(|downloads| downloads.first())
            .and_then(|download| download.filepath.as_ref())
            .or(self.filepath.as_ref())
    }
}

#[async_trait]
pub trait MediaExtractor: Send + Sync {
    /// Name of the backend (for logging)
    fn name(&self) -> &'static str;

    /// Download and convert `url`. `Ok(None)` means the backend produced no metadata.
    async fn extract(
        &self,
        url: &str,
        options: &ExtractorOptions,
    ) -> Result<Option<VideoInfo>, ExtractionError>;

    /// Version string of the backend, `None` if it cannot run
    async fn version(&self) -> Option<String> {
        None
    }
}

/// Drives the `yt-dlp` command line
#[derive(Debug, Clone)]
pub struct YtDlp {
    binary: PathBuf,
}

impl YtDlp {
    pub fn new(binary: PathBuf) -> Self {
        Self { binary }
    }

    /// Configured path, then `PATH`, then the bare name (resolved at spawn time)
    pub fn from_config(config: &Config) -> Self {
        let binary = config
            .yt_dlp_path()
            .unwrap_or_else(|_| PathBuf::from("yt-dlp"));
        Self::new(binary)
    }

    pub fn binary(&self) -> &PathBuf {
        &self.binary
    }

    /// Command line for one download
    pub fn build_args(url: &str, options: &ExtractorOptions) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "--format".into(),
            options.format.clone().into(),
            "--output".into(),
            options.output_template.clone().into(),
            "--no-playlist".into(),
        ];

        if options.restrict_filenames {
            args.push("--restrict-filenames".into());
        }

        for postprocessor in &options.postprocessors {
            match postprocessor {
                PostProcessor::ExtractAudio { codec, quality } => {
                    args.push("--extract-audio".into());
                    args.push("--audio-format".into());
                    args.push(codec.extension().into());
                    args.push("--audio-quality".into());
                    args.push(quality.to_string().into());
                }
            }
        }

        if let Some(ref ffmpeg) = options.ffmpeg_location {
            args.push("--ffmpeg-location".into());
            args.push(ffmpeg.clone().into());
        }

        // Print metadata once the file has reached its final location
        args.extend([
            "--no-simulate".into(),
            "--print".into(),
            "after_move:%(.{id,title,filepath,requested_downloads})j".into(),
            "--".into(),
            url.into(),
        ]);
        args
    }
}

#[async_trait]
impl MediaExtractor for YtDlp {
    fn name(&self) -> &'static str {
        "yt-dlp"
    }

    async fn extract(
        &self,
        url: &str,
        options: &ExtractorOptions,
    ) -> Result<Option<VideoInfo>, ExtractionError> {
        info!("Running yt-dlp for: {}", url);

        let args = Self::build_args(url, options);
        debug!("yt-dlp args: {:?}", args);

        let output = command(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => ExtractionError::ExtractorNotFound,
                _ => ExtractionError::Extractor(format!("could not start yt-dlp: {e}")),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            debug!("yt-dlp stderr: {}", stderr);
            return Err(ExtractionError::Extractor(failure_message(
                &stderr,
                output.status.code(),
            )));
        }

        parse_video_info(&String::from_utf8_lossy(&output.stdout))
    }

    async fn version(&self) -> Option<String> {
        let output = command(&self.binary).arg("--version").output().await.ok()?;
        if !output.status.success() {
            return None;
        }
        let version = String::from_utf8_lossy(&output.stdout).trim().to_string();
        (!version.is_empty()).then_some(version)
    }
}

fn command(binary: &Path) -> Command {
    let mut cmd = Command::new(binary);
    // A dropped future (e.g. a front-end timeout) must not leave yt-dlp running
    cmd.kill_on_drop(true);
    cmd
}

/// The last `--print` line is the metadata of the finished download
pub fn parse_video_info(stdout: &str) -> Result<Option<VideoInfo>, ExtractionError> {
    let Some(line) = stdout.lines().map(str::trim).filter(|l| !l.is_empty()).last() else {
        return Ok(None);
    };
    serde_json::from_str::<Option<VideoInfo>>(line)
        .map_err(|e| ExtractionError::Extractor(format!("unreadable metadata from yt-dlp: {e}")))
}

/// Prefer yt-dlp's own `ERROR:` line over the full stderr dump
fn failure_message(stderr: &str, code: Option<i32>) -> String {
    let lines: Vec<&str> = stderr.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
    let message = lines
        .iter()
        .rev()
        .find(|l| l.starts_with("ERROR:"))
        .or(lines.last())
        .map(|l| l.trim_start_matches("ERROR:").trim().to_string());

    match (message, code) {
        (Some(message), _) => message,
        (None, Some(code)) => format!("exited with code {code}"),
        (None, None) => "terminated by signal".to_string(),
    }
}
