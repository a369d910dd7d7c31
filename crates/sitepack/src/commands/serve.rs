//! Preview server command.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use axum::Router;
use tower_http::services::ServeDir;

use crate::config::ConfigFile;

/// Run the serve command.
///
/// Serves `dir`, or the configured output directory, without rebuilding.
pub async fn run(config_path: &Path, port: u16, dir: Option<PathBuf>, open: bool) -> Result<()> {
    let file_config = ConfigFile::load(config_path)?;
    let dir = preview_dir(dir, &file_config)?;

    let addr: SocketAddr = format!("{}:{}", file_config.server.host, port)
        .parse()
        .context("Invalid address")?;

    tracing::info!("Serving {} at http://{}", dir.display(), addr);

    let app = Router::new().fallback_service(ServeDir::new(&dir));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    if open && file_config.server.open {
        let url = format!("http://{}", addr);
        let _ = open::that(&url);
    }

    axum::serve(listener, app).await?;

    Ok(())
}

/// Directory to preview: the explicit one, else the configured output.
fn preview_dir(dir: Option<PathBuf>, config: &ConfigFile) -> Result<PathBuf> {
    let dir = dir.unwrap_or_else(|| config.site.output.clone());

    if !dir.is_dir() {
        anyhow::bail!(
            "Directory not found: {}. Run 'sitepack build' first.",
            dir.display()
        );
    }

    Ok(dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn defaults_to_configured_output() {
        let temp = tempdir().unwrap();
        let output = temp.path().join("public");
        std::fs::create_dir_all(&output).unwrap();

        let mut config = ConfigFile::default();
        config.site.output = output.clone();

        assert_eq!(preview_dir(None, &config).unwrap(), output);
    }

    #[test]
    fn explicit_directory_wins() {
        let temp = tempdir().unwrap();
        let config = ConfigFile::default();

        assert_eq!(
            preview_dir(Some(temp.path().to_path_buf()), &config).unwrap(),
            temp.path()
        );
    }

    #[test]
    fn missing_directory_is_an_error() {
        let temp = tempdir().unwrap();
        let config = ConfigFile::default();

        let err = preview_dir(Some(temp.path().join("dist")), &config).unwrap_err();

        assert!(err.to_string().contains("sitepack build"));
    }
}
