use anyhow::Result;
use std::path::Path;
use tokio::process::Command;

use bilimusic_core::config::Config;
use bilimusic_core::extractor::{MediaExtractor, YtDlp};
use bilimusic_core::BinaryLocator;

pub async fn run(config_path: Option<&Path>) -> Result<()> {
    let config = Config::load(config_path)?;

    println!("bilimusic dependency check\n");

    let mut all_ok = true;

    // Check yt-dlp
    print!("yt-dlp:  ");
    let yt_dlp = YtDlp::from_config(&config);
    match yt_dlp.version().await {
        Some(version) => println!("OK ({}, {})", version, yt_dlp.binary().display()),
        None => {
            println!("NOT FOUND");
            println!("         Install with: pip install yt-dlp");
            all_ok = false;
        }
    }

    // Check FFmpeg
    print!("ffmpeg:  ");
    let locator = BinaryLocator::ffmpeg(&config.locator);
    match locator.locate().await {
        Some(path) => {
            let version = ffmpeg_version(&path).await.unwrap_or_else(|| "unknown".to_string());
            println!("OK ({}, {})", version, path.display());
        }
        None => {
            println!("NOT FOUND");
            println!(
                "         Install ffmpeg or point {} at it",
                config.locator.override_vars.join(" / ")
            );
            all_ok = false;
        }
    }

    println!("\nffmpeg search order:");
    for (idx, candidate) in locator.candidates().iter().enumerate() {
        let marker = if candidate.is_file() { "found" } else { "-" };
        println!("  {:>2}. {} ({})", idx + 1, candidate.display(), marker);
    }

    println!();
    if all_ok {
        println!("All dependencies OK!");
    } else {
        println!("Some dependencies are missing. See above for installation instructions.");
    }

    Ok(())
}

/// Version number from the first line of `ffmpeg -version`
async fn ffmpeg_version(path: &Path) -> Option<String> {
    let output = Command::new(path).arg("-version").output().await.ok()?;
    let stdout = String::from_utf8_lossy(&output.stdout);
    let first_line = stdout.lines().next()?;
    first_line.split_whitespace().nth(2).map(str::to_string)
}
