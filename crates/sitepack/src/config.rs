//! Configuration file (site.toml).

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use sitepack_static::{BuildConfig, CopyPattern, EntryConfig, Mode};

/// Configuration file structure.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    #[serde(default)]
    pub site: SiteConfig,
    #[serde(default = "default_style")]
    pub style: EntrySection,
    #[serde(default = "default_script")]
    pub script: EntrySection,
    #[serde(default = "default_assets")]
    pub assets: Vec<AssetSection>,
    #[serde(default)]
    pub server: ServerSection,
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            site: SiteConfig::default(),
            style: default_style(),
            script: default_script(),
            assets: default_assets(),
            server: ServerSection::default(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SiteConfig {
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default = "default_src")]
    pub src: PathBuf,
    #[serde(default = "default_output")]
    pub output: PathBuf,
    /// Falls back to development when unset
    pub mode: Option<Mode>,
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
    #[serde(default = "default_partial_prefix")]
    pub partial_prefix: char,
    #[serde(default = "default_true")]
    pub clean: bool,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            title: default_title(),
            src: default_src(),
            output: default_output(),
            mode: None,
            extensions: default_extensions(),
            partial_prefix: default_partial_prefix(),
            clean: true,
        }
    }
}

/// A stylesheet or script entry.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EntrySection {
    pub entry: PathBuf,
    pub output: PathBuf,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl EntrySection {
    fn to_entry(&self) -> Option<EntryConfig> {
        self.enabled.then(|| EntryConfig {
            source: self.entry.clone(),
            output: self.output.clone(),
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AssetSection {
    pub from: PathBuf,
    pub to: PathBuf,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerSection {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_true")]
    pub open: bool,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            open: true,
        }
    }
}

fn default_title() -> String {
    "Site".to_string()
}
fn default_src() -> PathBuf {
    PathBuf::from("src")
}
fn default_output() -> PathBuf {
    PathBuf::from("dist")
}
fn default_extensions() -> Vec<String> {
    vec!["jinja".to_string()]
}
fn default_partial_prefix() -> char {
    '_'
}
fn default_true() -> bool {
    true
}
fn default_style() -> EntrySection {
    EntrySection {
        entry: PathBuf::from("src/style/style.scss"),
        output: PathBuf::from("style/style.css"),
        enabled: true,
    }
}
fn default_script() -> EntrySection {
    EntrySection {
        entry: PathBuf::from("src/script/index.js"),
        output: PathBuf::from("script/main.js"),
        enabled: true,
    }
}
fn default_assets() -> Vec<AssetSection> {
    vec![AssetSection {
        from: PathBuf::from("src/image"),
        to: PathBuf::from("image"),
    }]
}
fn default_port() -> u16 {
    8080
}
fn default_host() -> String {
    "127.0.0.1".to_string()
}

impl ConfigFile {
    /// Parse configuration from TOML text.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse config")
    }

    /// Load configuration from `path` if it exists.
    /// Returns an error if the config file exists but is malformed.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("No {} found, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config =
            Self::parse(&content).with_context(|| format!("Invalid {}", path.display()))?;

        tracing::info!("Loaded config from {}", path.display());

        Ok(config)
    }

    /// Build settings described by this file.
    pub fn build_config(&self) -> BuildConfig {
        BuildConfig {
            source_dir: self.site.src.clone(),
            output_dir: self.site.output.clone(),
            mode: self.site.mode.unwrap_or_default(),
            title: self.site.title.clone(),
            template_extensions: self.site.extensions.clone(),
            partial_marker: self.site.partial_prefix,
            stylesheet: self.style.to_entry(),
            script: self.script.to_entry(),
            assets: self
                .assets
                .iter()
                .map(|a| CopyPattern {
                    from: a.from.clone(),
                    to: a.to.clone(),
                })
                .collect(),
            clean: self.site.clean,
            live_reload: None,
        }
    }
}
