use anyhow::Result;
use std::path::Path;
use bilimusic_core::config::{Config, ENV_PREFIX, LEGACY_DOWNLOAD_DIR_VAR};

pub async fn run(config_path: Option<&Path>) -> Result<()> {
    let config = Config::load(config_path)?;

    println!("bilimusic configuration\n");
    println!("{}", config.to_toml()?);

    if config.paths.yt_dlp.is_none() {
        println!("# paths.yt_dlp not set: auto-detected from PATH");
    }

    // Show config file locations
    println!("\nConfig sources (later entries win):");
    if let Some(default_config) = Config::default_config_file() {
        println!("  1. {}", default_config.display());
    }
    if let Some(p) = config_path {
        println!("  2. {} (specified)", p.display());
    }
    println!("  3. {LEGACY_DOWNLOAD_DIR_VAR} (server.download_dir)");
    println!("  4. Environment variables ({ENV_PREFIX}*, e.g. {ENV_PREFIX}SERVER__PORT)");

    println!("\nffmpeg override variables: {}", config.locator.override_vars.join(", "));

    Ok(())
}
