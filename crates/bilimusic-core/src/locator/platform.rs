//! Per-platform well-known install locations

use super::EnvLookup;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Windows,
    MacOs,
    Linux,
    Other,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(windows) {
            Platform::Windows
        } else if cfg!(target_os = "macos") {
            Platform::MacOs
        } else if cfg!(target_os = "linux") {
            Platform::Linux
        } else {
            Platform::Other
        }
    }

    /// `ffmpeg` -> `ffmpeg.exe` on Windows
    pub fn executable_name(&self, name: &str) -> String {
        match self {
            Platform::Windows => format!("{name}.exe"),
            _ => name.to_string(),
        }
    }
}

/// Source of conventional install locations for one platform
pub trait WellKnownPaths: Send + Sync {
    fn applies_to(&self, platform: Platform) -> bool;

    fn well_known_paths(&self, executable: &str, env: &EnvLookup) -> Vec<PathBuf>;
}

/// Providers for every supported platform; the locator filters by platform
pub fn all_providers() -> Vec<Box<dyn WellKnownPaths>> {
    vec![
        Box::new(WindowsPaths),
        Box::new(HomebrewPaths),
        Box::new(LinuxPaths),
    ]
}

/// Registry App Paths, winget/Store links, then common manual install dirs
pub struct WindowsPaths;

const WINDOWS_INSTALL_DIRS: [&str; 6] = [
    r"C:\ffmpeg\bin",
    r"C:\Program Files\ffmpeg\bin",
    r"C:\Program Files\FFmpeg\bin",
    r"C:\Program Files (x86)\ffmpeg\bin",
    r"C:\Program Files (x86)\FFmpeg\bin",
    r"C:\ProgramData\chocolatey\bin",
];

impl WellKnownPaths for WindowsPaths {
    fn applies_to(&self, platform: Platform) -> bool {
        platform == Platform::Windows
    }

    fn well_known_paths(&self, executable: &str, env: &EnvLookup) -> Vec<PathBuf> {
        let mut paths = registry_app_paths(executable);

        if let Some(local_appdata) = env("LOCALAPPDATA").filter(|v| !v.is_empty()) {
            let microsoft = PathBuf::from(local_appdata).join("Microsoft");
            paths.push(microsoft.join("WinGet").join("Links").join(executable));
            paths.push(microsoft.join("WindowsApps").join(executable));
        }

        paths.extend(
            WINDOWS_INSTALL_DIRS
                .iter()
                .map(|dir| PathBuf::from(format!(r"{dir}\{executable}"))),
        );
        paths
    }
}

#[cfg(windows)]
fn registry_app_paths(executable: &str) -> Vec<PathBuf> {
    use winreg::enums::{HKEY_CURRENT_USER, HKEY_LOCAL_MACHINE};
    use winreg::RegKey;

    let subkey = format!(r"SOFTWARE\Microsoft\Windows\CurrentVersion\App Paths\{executable}");
    let mut paths = Vec::new();

    for root in [HKEY_CURRENT_USER, HKEY_LOCAL_MACHINE] {
        let Ok(key) = RegKey::predef(root).open_subkey(&subkey) else {
            continue;
        };
        // The default value holds the full executable path
        if let Ok(full) = key.get_value::<String, _>("") {
            if !full.is_empty() {
                paths.push(PathBuf::from(full));
            }
        }
        if let Ok(dir) = key.get_value::<String, _>("Path") {
            if !dir.is_empty() {
                paths.push(PathBuf::from(dir).join(executable));
            }
        }
    }
    paths
}

#[cfg(not(windows))]
fn registry_app_paths(_executable: &str) -> Vec<PathBuf> {
    Vec::new()
}

/// Homebrew (Apple Silicon and Intel) and MacPorts prefixes
pub struct HomebrewPaths;

impl WellKnownPaths for HomebrewPaths {
    fn applies_to(&self, platform: Platform) -> bool {
        platform == Platform::MacOs
    }

    fn well_known_paths(&self, executable: &str, _env: &EnvLookup) -> Vec<PathBuf> {
        ["/opt/homebrew/bin", "/usr/local/bin", "/opt/local/bin"]
            .iter()
            .map(|dir| PathBuf::from(dir).join(executable))
            .collect()
    }
}

/// Distro packages, snaps and user-local installs
pub struct LinuxPaths;

impl WellKnownPaths for LinuxPaths {
    fn applies_to(&self, platform: Platform) -> bool {
        platform == Platform::Linux
    }

    fn well_known_paths(&self, executable: &str, env: &EnvLookup) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = ["/usr/bin", "/usr/local/bin", "/snap/bin"]
            .iter()
            .map(|dir| PathBuf::from(dir).join(executable))
            .collect();
        if let Some(home) = env("HOME").filter(|v| !v.is_empty()) {
            paths.push(PathBuf::from(home).join(".local/bin").join(executable));
        }
        paths
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn env_with(vars: &'static [(&'static str, &'static str)]) -> EnvLookup {
        Arc::new(move |key: &str| {
            vars.iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.to_string())
        })
    }

    #[test]
    fn test_providers_only_apply_to_their_platform() {
        for platform in [Platform::Windows, Platform::MacOs, Platform::Linux, Platform::Other] {
            let applicable = all_providers()
                .iter()
                .filter(|p| p.applies_to(platform))
                .count();
            let expected = if platform == Platform::Other { 0 } else { 1 };
            assert_eq!(applicable, expected, "{platform:?}");
        }
    }

    #[test]
    fn test_windows_paths_order() {
        let env = env_with(&[("LOCALAPPDATA", "/users/me/AppData/Local")]);
        let paths = WindowsPaths.well_known_paths("ffmpeg.exe", &env);

        let local = PathBuf::from("/users/me/AppData/Local").join("Microsoft");
        let winget = local.join("WinGet").join("Links").join("ffmpeg.exe");
        let store = local.join("WindowsApps").join("ffmpeg.exe");

        let winget_at = paths.iter().position(|p| *p == winget).unwrap();
        let store_at = paths.iter().position(|p| *p == store).unwrap();
        let choco_at = paths
            .iter()
            .position(|p| *p == PathBuf::from(r"C:\ProgramData\chocolatey\bin\ffmpeg.exe"))
            .unwrap();
        assert!(winget_at < store_at);
        assert!(store_at < choco_at);
        assert_eq!(paths.last(), Some(&PathBuf::from(r"C:\ProgramData\chocolatey\bin\ffmpeg.exe")));
        assert!(paths.contains(&PathBuf::from(r"C:\ffmpeg\bin\ffmpeg.exe")));
    }

    #[test]
    fn test_windows_paths_without_localappdata() {
        let env = env_with(&[]);
        let paths = WindowsPaths.well_known_paths("ffmpeg.exe", &env);
        assert!(paths.iter().all(|p| !p.to_string_lossy().contains("WinGet")));
        assert!(paths.len() >= WINDOWS_INSTALL_DIRS.len());
    }

    #[test]
    fn test_executable_name() {
        assert_eq!(Platform::Windows.executable_name("ffmpeg"), "ffmpeg.exe");
        assert_eq!(Platform::Linux.executable_name("ffmpeg"), "ffmpeg");
        assert_eq!(Platform::MacOs.executable_name("ffmpeg"), "ffmpeg");
    }
}
