use anyhow::Result;
use std::path::{Path, PathBuf};

use crate::server;
use bilimusic_core::config::Config;

pub async fn run(
    host: Option<String>,
    port: Option<u16>,
    download_dir: Option<PathBuf>,
    config_path: Option<&Path>,
) -> Result<()> {
    let mut config = Config::load(config_path)?;

    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }
    if let Some(dir) = download_dir {
        config.server.download_dir = dir;
    }

    server::run(config).await
}
