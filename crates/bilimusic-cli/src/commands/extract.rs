use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::time::Duration;

use crate::args::ExtractOptions;
use bilimusic_core::{config::Config, Workflow};

pub async fn run(url: &str, options: &ExtractOptions, config_path: Option<&Path>) -> Result<()> {
    let config = Config::load(config_path)?;
    let request = options.to_request(url, &config);
    let workflow = Workflow::from_config(&config);

    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::with_template(
        "{spinner:.cyan} [{elapsed_precise}] {msg}",
    )?);
    pb.set_message(format!("Extracting {}: {}", request.format, truncate(url, 50)));
    pb.enable_steady_tick(Duration::from_millis(100));

    let result = workflow.extract_audio(&request).await;

    match result {
        Ok(result) => {
            pb.finish_and_clear();
            println!("Saved: {}", result.path.display());
            Ok(())
        }
        Err(e) => {
            pb.abandon();
            if e.is_user_error() {
                Err(e.into())
            } else {
                Err(anyhow::Error::new(e).context("Extraction failed"))
            }
        }
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{head}...")
    }
}
