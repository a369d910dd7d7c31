//! List discovered pages.

use std::path::Path;

use anyhow::Result;
use sitepack_pages::discover_pages;

use crate::config::ConfigFile;

/// Print every page mapping as `source -> output`.
pub fn run(config_path: &Path) -> Result<()> {
    let config = ConfigFile::load(config_path)?.build_config();

    let pages = discover_pages(&config.source_dir, &config.discovery_options())?;

    for page in &pages {
        println!("{} -> {}", page.source_path.display(), page.output_url());
    }

    tracing::info!("{} pages", pages.len());

    Ok(())
}
