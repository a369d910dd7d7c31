//! Static site build command.

use std::path::{Path, PathBuf};

use anyhow::Result;
use sitepack_static::{Mode, StaticBuilder};

use crate::config::ConfigFile;

/// Run the build command.
pub async fn run(config_path: &Path, output: Option<PathBuf>, mode: Option<Mode>) -> Result<()> {
    let file_config = ConfigFile::load(config_path)?;

    let mut config = file_config.build_config();
    if let Some(output) = output {
        config.output_dir = output;
    }
    if let Some(mode) = mode {
        config.mode = mode;
    }

    tracing::info!("Building site ({})...", config.mode);

    let result = StaticBuilder::new(config).build()?;

    tracing::info!(
        "Built {} pages and {} assets in {}ms",
        result.pages,
        result.assets,
        result.duration_ms
    );

    tracing::info!("Output: {}", result.output_dir.display());

    Ok(())
}
