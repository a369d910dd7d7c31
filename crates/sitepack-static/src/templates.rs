//! Page rendering.

use std::fs;
use std::path::{Path, PathBuf};

use minijinja::{context, AutoEscape, Environment, Value};
use sitepack_pages::PageMapping;

use crate::mode::Mode;

/// Values exposed to a page template.
#[derive(Debug, Clone, serde::Serialize)]
pub struct PageContext {
    /// Output path of the page, `/` separated
    pub page: String,
    /// Relative prefix from the page back to the output root
    pub root: String,
    /// Build mode
    pub mode: Mode,
    /// Stylesheet URL relative to the page
    pub stylesheet: Option<String>,
    /// Script URL relative to the page
    pub script: Option<String>,
    /// Live reload client script URL, set by the dev server
    pub live_reload: Option<String>,
}

/// Errors that can occur while rendering a page.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("Failed to read template {path}: {message}")]
    ReadError { path: String, message: String },

    #[error("Failed to render {path}: {message}")]
    TemplateError { path: String, message: String },
}

/// Renders a page template to HTML.
pub trait PageRenderer: Send + Sync {
    fn render(&self, page: &PageMapping, context: &PageContext) -> Result<String, RenderError>;
}

/// Template engine using minijinja.
///
/// Templates can `{% include %}` and `{% extends %}` any file under the
/// source directory by its relative path, which is how partials are used.
pub struct TemplateEngine {
    env: Environment<'static>,
    source_dir: PathBuf,
}

impl TemplateEngine {
    /// Create an engine loading templates from `source_dir`.
    pub fn new(source_dir: &Path, site_title: &str) -> Self {
        let source_dir = fs::canonicalize(source_dir).unwrap_or_else(|_| source_dir.to_path_buf());

        let mut env = Environment::new();
        env.set_loader(minijinja::path_loader(&source_dir));
        env.set_auto_escape_callback(|_: &str| AutoEscape::Html);
        env.add_global("site_title", site_title.to_string());

        Self { env, source_dir }
    }

    fn template_name(&self, source: &Path) -> String {
        source
            .strip_prefix(&self.source_dir)
            .unwrap_or(source)
            .to_string_lossy()
            .replace('\\', "/")
    }
}

impl PageRenderer for TemplateEngine {
    fn render(&self, page: &PageMapping, ctx: &PageContext) -> Result<String, RenderError> {
        let name = self.template_name(&page.source_path);

        let source = fs::read_to_string(&page.source_path).map_err(|e| RenderError::ReadError {
            path: name.clone(),
            message: e.to_string(),
        })?;

        let html = self
            .env
            .render_named_str(
                &name,
                &source,
                context! {
                    page => &ctx.page,
                    root => Value::from_safe_string(ctx.root.clone()),
                    mode => ctx.mode.as_str(),
                    production => ctx.mode == Mode::Production,
                    stylesheet => url_value(&ctx.stylesheet),
                    script => url_value(&ctx.script),
                    live_reload => ctx.live_reload.is_some(),
                },
            )
            .map_err(|e| RenderError::TemplateError {
                path: name.clone(),
                message: e.to_string(),
            })?;

        Ok(match &ctx.live_reload {
            Some(url) => inject_script(&html, url),
            None => html,
        })
    }
}

// Generated URLs are trusted and must not have their slashes escaped.
fn url_value(url: &Option<String>) -> Value {
    url.clone()
        .map(Value::from_safe_string)
        .unwrap_or_else(|| Value::from(()))
}

/// Insert a script tag before the closing `</body>`, or append it.
pub fn inject_script(html: &str, url: &str) -> String {
    let tag = format!(r#"<script src="{}"></script>"#, url);

    match html.rfind("</body>") {
        Some(pos) => format!("{}{}\n{}", &html[..pos], tag, &html[pos..]),
        None => format!("{}\n{}", html, tag),
    }
}
