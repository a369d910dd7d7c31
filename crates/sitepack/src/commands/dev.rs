//! Development server command.

use std::path::Path;

use anyhow::Result;
use sitepack_server::{DevServer, DevServerConfig};

use crate::config::ConfigFile;

/// Run the dev server.
pub async fn run(config_path: &Path, port: Option<u16>, open: bool) -> Result<()> {
    let file_config = ConfigFile::load(config_path)?;

    let config = DevServerConfig {
        build: file_config.build_config(),
        port: port.unwrap_or(file_config.server.port),
        host: file_config.server.host.clone(),
        open: open && file_config.server.open,
    };

    tracing::info!("Starting development server on port {}", config.port);

    DevServer::new(config).start().await?;

    Ok(())
}
