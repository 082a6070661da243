//! Configuration management for bili-music

use crate::error::ConfigError;
use crate::format::AudioFormat;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Directory name used under the platform config directory
pub const APP_DIR: &str = "bili-music";

/// Prefix for environment overrides, e.g. `BILI_MUSIC_SERVER__PORT`
pub const ENV_PREFIX: &str = "BILI_MUSIC_";

/// Older deployments set the web download directory through this variable
pub const LEGACY_DOWNLOAD_DIR_VAR: &str = "BILI_MUSIC_DOWNLOAD_DIR";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub paths: PathsConfig,
    pub output: OutputConfig,
    pub locator: LocatorConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Path to yt-dlp binary (auto-detected if not set)
    pub yt_dlp: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Default output directory for the CLI
    pub directory: PathBuf,
    /// Default audio format
    pub format: AudioFormat,
    /// Default audio quality, 0 (best) to 9
    pub quality: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocatorConfig {
    /// Environment variables naming an ffmpeg override, highest precedence first
    pub override_vars: Vec<String>,
    /// Timeout for each `ffmpeg -version` probe
    pub probe_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Where the web front end stores extracted audio
    pub download_dir: PathBuf,
    /// Upper bound for a single web extraction (unbounded if not set)
    pub extract_timeout_secs: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            paths: PathsConfig { yt_dlp: None },
            output: OutputConfig {
                directory: PathBuf::from("."),
                format: AudioFormat::Mp3,
                quality: 0,
            },
            locator: LocatorConfig::default(),
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 5000,
                download_dir: PathBuf::from("downloads"),
                extract_timeout_secs: None,
            },
        }
    }
}

impl Default for LocatorConfig {
    fn default() -> Self {
        Self {
            override_vars: vec!["FFMPEG_PATH".to_string(), "BILI_MUSIC_FFMPEG".to_string()],
            probe_timeout_ms: 2000,
        }
    }
}

impl LocatorConfig {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }
}

impl Config {
    /// Load configuration from file and environment
    pub fn load(config_file: Option<&Path>) -> Result<Self, ConfigError> {
        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));

        // Load from default config directory
        if let Some(default_config) = Self::default_config_file() {
            if default_config.exists() {
                figment = figment.merge(Toml::file(&default_config));
            }
        }

        // Load from specified config file
        if let Some(path) = config_file {
            figment = figment.merge(Toml::file(path));
        }

        // Load from environment. The legacy variable is taken verbatim: a
        // figment env provider would read a name like `2024` as an integer.
        if let Some(dir) = std::env::var_os(LEGACY_DOWNLOAD_DIR_VAR).filter(|v| !v.is_empty()) {
            figment = figment.merge(Serialized::default(
                "server.download_dir",
                PathBuf::from(dir),
            ));
        }
        figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));

        Self::from_figment(figment)
    }

    /// Extract and validate a config from an already assembled figment
    pub fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        let config: Config = figment
            .extract()
            .map_err(|e| ConfigError::LoadError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.output.quality > 9 {
            return Err(ConfigError::InvalidValue(format!(
                "output.quality must be between 0 and 9, got {}",
                self.output.quality
            )));
        }
        if self.locator.probe_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue(
                "locator.probe_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.server.extract_timeout_secs == Some(0) {
            return Err(ConfigError::InvalidValue(
                "server.extract_timeout_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// `<config dir>/bili-music/config.toml`, if the platform has a config dir
    pub fn default_config_file() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR).join("config.toml"))
    }

    /// Get yt-dlp path, auto-detecting if not configured
    pub fn yt_dlp_path(&self) -> Result<PathBuf, ConfigError> {
        if let Some(ref path) = self.paths.yt_dlp {
            Ok(path.clone())
        } else {
            which::which("yt-dlp")
                .map_err(|_| ConfigError::InvalidValue("yt-dlp not found in PATH".to_string()))
        }
    }

    /// Render the effective configuration as TOML
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::InvalidValue(e.to_string()))
    }
}
