//! Discovery of a working ffmpeg binary
//!
//! Desktop launches often inherit a minimal `PATH`, so the locator looks in
//! several places and only trusts a candidate after it answers
//! `ffmpeg -version`. Candidates are rebuilt on every call since installs can
//! change while the server is running.

mod platform;
mod probe;

pub use platform::{all_providers, HomebrewPaths, LinuxPaths, Platform, WellKnownPaths, WindowsPaths};
pub use probe::{probe, ProbeOutcome};

use crate::config::LocatorConfig;
use std::collections::HashSet;
use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Environment variable reader, swappable so lookups can be pinned in tests
pub type EnvLookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

fn process_env() -> EnvLookup {
    Arc::new(|key: &str| std::env::var(key).ok())
}

pub struct BinaryLocator {
    binary_name: String,
    override_vars: Vec<String>,
    probe_timeout: Duration,
    platform: Platform,
    exe_dir: Option<PathBuf>,
    providers: Vec<Box<dyn WellKnownPaths>>,
    env: EnvLookup,
}

impl std::fmt::Debug for BinaryLocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BinaryLocator")
            .field("binary_name", &self.binary_name)
            .field("override_vars", &self.override_vars)
            .field("probe_timeout", &self.probe_timeout)
            .field("platform", &self.platform)
            .field("exe_dir", &self.exe_dir)
            .finish_non_exhaustive()
    }
}

impl BinaryLocator {
    /// Locator for ffmpeg using the process environment
    pub fn ffmpeg(config: &LocatorConfig) -> Self {
        Self {
            binary_name: "ffmpeg".to_string(),
            override_vars: config.override_vars.clone(),
            probe_timeout: config.probe_timeout(),
            platform: Platform::current(),
            exe_dir: std::env::current_exe()
                .ok()
                .and_then(|exe| exe.parent().map(Path::to_path_buf)),
            providers: all_providers(),
            env: process_env(),
        }
    }

    pub fn with_env(mut self, env: EnvLookup) -> Self {
        self.env = env;
        self
    }

    /// Directory treated as "next to the running program"
    pub fn with_exe_dir(mut self, exe_dir: Option<PathBuf>) -> Self {
        self.exe_dir = exe_dir;
        self
    }

    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    pub fn with_providers(mut self, providers: Vec<Box<dyn WellKnownPaths>>) -> Self {
        self.providers = providers;
        self
    }

    pub fn executable_name(&self) -> String {
        self.platform.executable_name(&self.binary_name)
    }

    /// First non-empty override variable, trimmed of whitespace and quotes
    fn override_value(&self) -> Option<(String, String)> {
        self.override_vars.iter().find_map(|var| {
            let raw = (self.env)(var)?;
            let value = raw
                .trim()
                .trim_matches(|c: char| c == '"' || c == '\'')
                .trim()
                .to_string();
            (!value.is_empty()).then(|| (var.clone(), value))
        })
    }

    fn raw_candidates(&self) -> Vec<PathBuf> {
        let executable = self.executable_name();
        let mut candidates = Vec::new();

        // 1. Explicit override
        if let Some((var, value)) = self.override_value() {
            debug!("{} override from {}: {}", self.binary_name, var, value);
            let path = PathBuf::from(&value);
            if path.is_dir() {
                candidates.push(path.join(&executable));
            }
            candidates.push(path);
        }

        // 2. PATH search
        let cwd = std::env::current_dir().unwrap_or_default();
        if let Ok(found) = which::which_in(&self.binary_name, (self.env)("PATH"), cwd) {
            candidates.push(found);
        }

        // 3. Bundled next to the program
        if let Some(ref dir) = self.exe_dir {
            candidates.push(dir.join(&executable));
            candidates.push(dir.join("bin").join(&executable));
        }

        // 4. Platform install locations
        for provider in self.providers.iter().filter(|p| p.applies_to(self.platform)) {
            candidates.extend(provider.well_known_paths(&executable, &self.env));
        }

        candidates
    }

    /// Normalized, de-duplicated probe order
    pub fn candidates(&self) -> Vec<PathBuf> {
        let cwd = std::env::current_dir().unwrap_or_default();
        let mut seen = HashSet::new();
        let mut ordered = Vec::new();

        for candidate in self.raw_candidates() {
            if candidate.as_os_str().is_empty() {
                continue;
            }
            let normalized = normalize(&candidate, &cwd);
            if seen.insert(dedup_key(&normalized, self.platform)) {
                ordered.push(normalized);
            }
        }
        ordered
    }

    /// Probe candidates in order and return the first that runs.
    pub async fn locate(&self) -> Option<PathBuf> {
        for candidate in self.candidates() {
            let outcome = probe(&candidate, self.probe_timeout).await;
            if outcome.is_healthy() {
                info!("Using {}: {}", self.binary_name, candidate.display());
                return Some(candidate);
            }
            debug!("Skipping {} candidate {}: {}", self.binary_name, candidate.display(), outcome);
        }
        debug!("No working {} found", self.binary_name);
        None
    }
}

/// Make absolute and resolve `.` and `..` without touching the filesystem
pub(crate) fn normalize(path: &Path, cwd: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        cwd.join(path)
    };

    let mut out = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

fn dedup_key(path: &Path, platform: Platform) -> OsString {
    match platform {
        Platform::Windows => path
            .to_string_lossy()
            .replace('/', "\\")
            .to_lowercase()
            .into(),
        _ => path.as_os_str().to_os_string(),
    }
}
