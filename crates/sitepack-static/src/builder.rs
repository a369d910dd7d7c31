//! Static site builder.

use std::fs;
use std::path::{Component, Path, PathBuf};
use std::time::Instant;

use rayon::prelude::*;

use sitepack_pages::{discover_pages, DiscoveryError, DiscoveryOptions, PageMapping, PARTIAL_MARKER};

use crate::assets::{copy_dir, AssetTransform, ScriptTransform, StyleTransform, TransformError};
use crate::mode::Mode;
use crate::templates::{PageContext, PageRenderer, RenderError, TemplateEngine};

/// An entry file and where its artifact lands in the output tree.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryConfig {
    /// Entry file
    pub source: PathBuf,

    /// Output path relative to the output directory
    pub output: PathBuf,
}

/// A directory copied verbatim into the output tree.
#[derive(Debug, Clone, PartialEq)]
pub struct CopyPattern {
    /// Source directory
    pub from: PathBuf,

    /// Destination relative to the output directory
    pub to: PathBuf,
}

/// Configuration for building a site.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    /// Directory holding page templates and partials
    pub source_dir: PathBuf,

    /// Output directory
    pub output_dir: PathBuf,

    /// Development or production
    pub mode: Mode,

    /// Site title, exposed to templates as `site_title`
    pub title: String,

    /// Template extensions, without the leading dot
    pub template_extensions: Vec<String>,

    /// Filename prefix marking partials
    pub partial_marker: char,

    /// Stylesheet entry
    pub stylesheet: Option<EntryConfig>,

    /// Script entry
    pub script: Option<EntryConfig>,

    /// Asset directories to copy
    pub assets: Vec<CopyPattern>,

    /// Empty the output directory before writing
    pub clean: bool,

    /// Live reload client URL injected into every page
    pub live_reload: Option<String>,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            source_dir: PathBuf::from("src"),
            output_dir: PathBuf::from("dist"),
            mode: Mode::Development,
            title: "Site".to_string(),
            template_extensions: vec!["jinja".to_string()],
            partial_marker: PARTIAL_MARKER,
            stylesheet: Some(EntryConfig {
                source: PathBuf::from("src/style/style.scss"),
                output: PathBuf::from("style/style.css"),
            }),
            script: Some(EntryConfig {
                source: PathBuf::from("src/script/index.js"),
                output: PathBuf::from("script/main.js"),
            }),
            assets: vec![CopyPattern {
                from: PathBuf::from("src/image"),
                to: PathBuf::from("image"),
            }],
            clean: true,
            live_reload: None,
        }
    }
}

impl BuildConfig {
    /// Discovery options derived from this configuration.
    pub fn discovery_options(&self) -> DiscoveryOptions {
        DiscoveryOptions {
            extensions: self.template_extensions.clone(),
            partial_marker: self.partial_marker,
            ..DiscoveryOptions::default()
        }
    }
}

/// Result of a build operation.
#[derive(Debug)]
pub struct BuildResult {
    /// Number of pages generated
    pub pages: usize,

    /// Number of asset files written or copied
    pub assets: usize,

    /// Total build time in milliseconds
    pub duration_ms: u64,

    /// Output directory
    pub output_dir: PathBuf,
}

/// Errors that can occur during build.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Transform(#[from] TransformError),

    #[error("Failed to copy assets from {path}: {message}")]
    CopyError { path: String, message: String },

    #[error("Failed to write output: {0}")]
    WriteError(String),
}

/// Static site builder.
pub struct StaticBuilder {
    config: BuildConfig,
    renderer: Box<dyn PageRenderer>,
    style: Box<dyn AssetTransform>,
    script: Box<dyn AssetTransform>,
}

impl StaticBuilder {
    /// Create a builder with the default template engine and transforms.
    pub fn new(config: BuildConfig) -> Self {
        let renderer = TemplateEngine::new(&config.source_dir, &config.title);

        Self {
            config,
            renderer: Box::new(renderer),
            style: Box::new(StyleTransform::default()),
            script: Box::new(ScriptTransform),
        }
    }

    /// Replace the page renderer.
    pub fn with_renderer(mut self, renderer: impl PageRenderer + 'static) -> Self {
        self.renderer = Box::new(renderer);
        self
    }

    /// Replace the stylesheet transform.
    pub fn with_style_transform(mut self, transform: impl AssetTransform + 'static) -> Self {
        self.style = Box::new(transform);
        self
    }

    /// Replace the script transform.
    pub fn with_script_transform(mut self, transform: impl AssetTransform + 'static) -> Self {
        self.script = Box::new(transform);
        self
    }

    /// Discover the pages this build would generate.
    pub fn pages(&self) -> Result<Vec<PageMapping>, BuildError> {
        Ok(discover_pages(
            &self.config.source_dir,
            &self.config.discovery_options(),
        )?)
    }

    /// Build the site.
    ///
    /// Discovery runs before anything is written, so a bad source tree
    /// leaves the output directory untouched.
    pub fn build(&self) -> Result<BuildResult, BuildError> {
        let start = Instant::now();

        let pages = self.pages()?;

        self.prepare_output()?;

        // Render pages in parallel
        let results: Vec<Result<(), BuildError>> =
            pages.par_iter().map(|page| self.build_page(page)).collect();

        for result in results {
            result?;
        }

        let mut assets = 0;

        if let Some(entry) = &self.config.stylesheet {
            assets += self.emit_entry(self.style.as_ref(), entry)?;
        }

        if let Some(entry) = &self.config.script {
            assets += self.emit_entry(self.script.as_ref(), entry)?;
        }

        for pattern in &self.config.assets {
            assets += self.copy_assets(pattern)?;
        }

        let duration = start.elapsed();

        Ok(BuildResult {
            pages: pages.len(),
            assets,
            duration_ms: duration.as_millis() as u64,
            output_dir: self.config.output_dir.clone(),
        })
    }

    /// Create the output directory, emptying it first when `clean` is set.
    ///
    /// Refuses an output directory that holds any build input, since
    /// cleaning it would delete the input before it is read.
    fn prepare_output(&self) -> Result<(), BuildError> {
        let output_dir = &self.config.output_dir;

        if output_dir.exists() {
            let output =
                fs::canonicalize(output_dir).map_err(|e| BuildError::Config(e.to_string()))?;

            for input in self.inputs() {
                let Ok(canonical) = fs::canonicalize(input) else {
                    continue;
                };

                if canonical.starts_with(&output) {
                    return Err(BuildError::Config(format!(
                        "output directory {} contains build input {}",
                        output_dir.display(),
                        input.display()
                    )));
                }
            }

            if self.config.clean {
                tracing::debug!("Cleaning {}", output_dir.display());
                fs::remove_dir_all(output_dir)
                    .map_err(|e| BuildError::WriteError(e.to_string()))?;
            }
        }

        fs::create_dir_all(output_dir).map_err(|e| BuildError::WriteError(e.to_string()))
    }

    /// Every path the build reads from.
    fn inputs(&self) -> impl Iterator<Item = &Path> {
        let entries = [&self.config.stylesheet, &self.config.script]
            .into_iter()
            .flatten()
            .map(|entry| entry.source.as_path());

        std::iter::once(self.config.source_dir.as_path())
            .chain(entries)
            .chain(self.config.assets.iter().map(|pattern| pattern.from.as_path()))
    }

    /// Render a single page.
    fn build_page(&self, page: &PageMapping) -> Result<(), BuildError> {
        let root = page.root_prefix();
        let entry_url = |entry: &Option<EntryConfig>| {
            entry
                .as_ref()
                .map(|e| format!("{}{}", root, url_path(&e.output)))
        };

        let context = PageContext {
            page: page.output_url(),
            root: root.clone(),
            mode: self.config.mode,
            stylesheet: entry_url(&self.config.stylesheet),
            script: entry_url(&self.config.script),
            live_reload: self.config.live_reload.clone(),
        };

        let html = self.renderer.render(page, &context)?;

        write_file(&self.config.output_dir.join(&page.output_path), html)?;

        tracing::debug!("Rendered {}", page.output_url());

        Ok(())
    }

    /// Run a transform over an entry and write its artifact.
    ///
    /// Returns the number of files written.
    fn emit_entry(
        &self,
        transform: &dyn AssetTransform,
        entry: &EntryConfig,
    ) -> Result<usize, BuildError> {
        if !entry.source.exists() {
            tracing::warn!(
                "{} entry not found: {}",
                transform.name(),
                entry.source.display()
            );
            return Ok(0);
        }

        let output_name = entry
            .output
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                BuildError::Config(format!("invalid output path {}", entry.output.display()))
            })?;

        let artifact = transform.transform(&entry.source, output_name, self.config.mode)?;

        let target = self.config.output_dir.join(&entry.output);
        write_file(&target, artifact.code)?;

        let mut written = 1;

        if let Some(map) = artifact.source_map {
            write_file(&target.with_file_name(format!("{}.map", output_name)), map)?;
            written += 1;
        }

        tracing::debug!(
            "Compiled {} -> {}",
            entry.source.display(),
            target.display()
        );

        Ok(written)
    }

    /// Copy an asset directory into the output tree.
    fn copy_assets(&self, pattern: &CopyPattern) -> Result<usize, BuildError> {
        if !pattern.from.exists() {
            tracing::warn!("Asset directory not found: {}", pattern.from.display());
            return Ok(0);
        }

        let count = copy_dir(&pattern.from, &self.config.output_dir.join(&pattern.to)).map_err(
            |e| BuildError::CopyError {
                path: pattern.from.display().to_string(),
                message: e.to_string(),
            },
        )?;

        tracing::debug!("Copied {} files from {}", count, pattern.from.display());

        Ok(count)
    }
}

/// Write a file, creating parent directories.
fn write_file(path: &Path, contents: impl AsRef<[u8]>) -> Result<(), BuildError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| BuildError::WriteError(e.to_string()))?;
    }

    fs::write(path, contents)
        .map_err(|e| BuildError::WriteError(format!("{}: {}", path.display(), e)))
}

/// Join path components with `/`.
fn url_path(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::Artifact;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    struct Site {
        _temp: tempfile::TempDir,
        root: PathBuf,
    }

    impl Site {
        fn new() -> Self {
            let temp = tempdir().unwrap();
            let root = temp.path().to_path_buf();
            Self { _temp: temp, root }
        }

        fn write(&self, relative: &str, contents: &str) {
            let path = self.root.join(relative);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, contents).unwrap();
        }

        fn config(&self, mode: Mode) -> BuildConfig {
            BuildConfig {
                source_dir: self.root.join("src"),
                output_dir: self.root.join("dist"),
                mode,
                stylesheet: Some(EntryConfig {
                    source: self.root.join("src/style/style.css"),
                    output: PathBuf::from("style/style.css"),
                }),
                script: Some(EntryConfig {
                    source: self.root.join("src/script/index.js"),
                    output: PathBuf::from("script/main.js"),
                }),
                assets: vec![CopyPattern {
                    from: self.root.join("src/image"),
                    to: PathBuf::from("image"),
                }],
                ..Default::default()
            }
        }

        fn dist(&self, relative: &str) -> PathBuf {
            self.root.join("dist").join(relative)
        }
    }

    fn standard_site() -> Site {
        let site = Site::new();
        site.write(
            "src/_layout.jinja",
            r#"<html><head><link rel="stylesheet" href="{{ stylesheet }}"></head><body>{% block body %}{% endblock %}<script src="{{ script }}"></script></body></html>"#,
        );
        site.write("src/_header.jinja", "<header>{{ site_title }}</header>");
        site.write(
            "src/index.jinja",
            r#"{% extends "_layout.jinja" %}{% block body %}{% include "_header.jinja" %}<h1>Home</h1>{% endblock %}"#,
        );
        site.write(
            "src/about/team.jinja",
            r#"{% extends "_layout.jinja" %}{% block body %}<h1>Team</h1>{% endblock %}"#,
        );
        site.write("src/style/style.css", ".box { display: flex; }\n");
        site.write("src/script/index.js", "console.log('hi');\n");
        site.write("src/image/logo.svg", "<svg/>");
        site
    }

    #[test]
    fn builds_simple_site() {
        let site = standard_site();

        let result = StaticBuilder::new(site.config(Mode::Production))
            .build()
            .unwrap();

        assert_eq!(result.pages, 2);
        assert!(site.dist("index.html").exists());
        assert!(site.dist("about/team.html").exists());
        assert!(!site.dist("_header.html").exists());
        assert!(!site.dist("_layout.html").exists());
        assert!(site.dist("style/style.css").exists());
        assert!(site.dist("script/main.js").exists());
        assert!(site.dist("image/logo.svg").exists());

        let index = fs::read_to_string(site.dist("index.html")).unwrap();
        assert!(index.contains("<header>Site</header>"));
        assert!(index.contains("<h1>Home</h1>"));
    }

    #[test]
    fn nested_pages_link_assets_relatively() {
        let site = standard_site();

        StaticBuilder::new(site.config(Mode::Production))
            .build()
            .unwrap();

        let index = fs::read_to_string(site.dist("index.html")).unwrap();
        let team = fs::read_to_string(site.dist("about/team.html")).unwrap();

        assert!(index.contains(r#"href="style/style.css""#));
        assert!(team.contains(r#"href="../style/style.css""#));
        assert!(team.contains(r#"src="../script/main.js""#));
    }

    #[test]
    fn writes_source_maps_in_development() {
        let site = standard_site();

        let result = StaticBuilder::new(site.config(Mode::Development))
            .build()
            .unwrap();

        assert!(site.dist("style/style.css.map").exists());
        assert!(site.dist("script/main.js.map").exists());
        // css + map, js + map, one image
        assert_eq!(result.assets, 5);
    }

    #[test]
    fn omits_source_maps_in_production() {
        let site = standard_site();

        let result = StaticBuilder::new(site.config(Mode::Production))
            .build()
            .unwrap();

        assert!(!site.dist("style/style.css.map").exists());
        assert!(!site.dist("script/main.js.map").exists());
        assert_eq!(result.assets, 3);
    }

    #[test]
    fn missing_source_dir_aborts_before_output() {
        let site = Site::new();

        let result = StaticBuilder::new(site.config(Mode::Production)).build();

        assert!(matches!(result, Err(BuildError::Discovery(DiscoveryError::SourceRoot { .. }))));
        assert!(!site.dist("").exists());
    }

    #[test]
    fn collision_aborts_before_output() {
        let site = Site::new();
        site.write("src/page.jinja", "a");
        site.write("src/page.j2", "b");

        let mut config = site.config(Mode::Production);
        config.template_extensions = vec!["jinja".to_string(), "j2".to_string()];

        let result = StaticBuilder::new(config).build();

        assert!(matches!(result, Err(BuildError::Discovery(DiscoveryError::Collision { .. }))));
        assert!(!site.dist("").exists());
    }

    #[test]
    fn cleans_stale_output() {
        let site = standard_site();
        site.write("dist/stale.html", "old");

        StaticBuilder::new(site.config(Mode::Production))
            .build()
            .unwrap();

        assert!(!site.dist("stale.html").exists());
        assert!(site.dist("index.html").exists());
    }

    #[test]
    fn keeps_output_when_clean_disabled() {
        let site = standard_site();
        site.write("dist/keep.txt", "keep");

        let mut config = site.config(Mode::Production);
        config.clean = false;
        StaticBuilder::new(config).build().unwrap();

        assert!(site.dist("keep.txt").exists());
    }

    #[test]
    fn refuses_output_containing_source() {
        let site = standard_site();

        let mut config = site.config(Mode::Production);
        config.output_dir = site.root.clone();

        let result = StaticBuilder::new(config).build();

        assert!(matches!(result, Err(BuildError::Config(_))));
        assert!(site.root.join("src/index.jinja").exists());
    }

    #[test]
    fn refuses_output_containing_entries_or_assets() {
        let site = standard_site();
        site.write("public/style.css", ".a { color: red; }");
        site.write("public/image/logo.svg", "<svg/>");

        let mut config = site.config(Mode::Production);
        config.output_dir = site.root.join("public");
        config.stylesheet = Some(EntryConfig {
            source: site.root.join("public/style.css"),
            output: PathBuf::from("style.css"),
        });

        let result = StaticBuilder::new(config).build();

        assert!(matches!(result, Err(BuildError::Config(_))));
        assert!(site.root.join("public/style.css").exists());

        let mut config = site.config(Mode::Production);
        config.output_dir = site.root.join("public");
        config.assets = vec![CopyPattern {
            from: site.root.join("public/image"),
            to: PathBuf::from("image"),
        }];

        let result = StaticBuilder::new(config).build();

        assert!(matches!(result, Err(BuildError::Config(_))));
        assert!(site.root.join("public/image/logo.svg").exists());
    }

    #[test]
    fn skips_missing_entries_and_assets() {
        let site = Site::new();
        site.write("src/index.jinja", "<p>bare</p>");

        let result = StaticBuilder::new(site.config(Mode::Development))
            .build()
            .unwrap();

        assert_eq!(result.pages, 1);
        assert_eq!(result.assets, 0);
    }

    #[test]
    fn injects_live_reload_client() {
        let site = standard_site();

        let mut config = site.config(Mode::Development);
        config.live_reload = Some("/__reload.js".to_string());
        StaticBuilder::new(config).build().unwrap();

        let team = fs::read_to_string(site.dist("about/team.html")).unwrap();
        assert!(team.contains(r#"<script src="/__reload.js"></script>"#));
    }

    struct PathRenderer;

    impl PageRenderer for PathRenderer {
        fn render(&self, page: &PageMapping, ctx: &PageContext) -> Result<String, RenderError> {
            Ok(format!("{}|{}", ctx.page, page.source_path.display()))
        }
    }

    struct UpperStyle;

    impl AssetTransform for UpperStyle {
        fn name(&self) -> &'static str {
            "upper"
        }

        fn transform(
            &self,
            entry: &Path,
            _output_name: &str,
            _mode: Mode,
        ) -> Result<Artifact, TransformError> {
            Ok(Artifact {
                code: fs::read_to_string(entry).unwrap().to_uppercase(),
                source_map: None,
            })
        }
    }

    #[test]
    fn uses_injected_capabilities() {
        let site = standard_site();

        StaticBuilder::new(site.config(Mode::Development))
            .with_renderer(PathRenderer)
            .with_style_transform(UpperStyle)
            .build()
            .unwrap();

        let index = fs::read_to_string(site.dist("index.html")).unwrap();
        assert!(index.starts_with("index.html|"));
        assert!(index.ends_with("index.jinja"));

        let css = fs::read_to_string(site.dist("style/style.css")).unwrap();
        assert_eq!(css, ".BOX { DISPLAY: FLEX; }\n");
    }

    #[test]
    fn lists_pages_without_building() {
        let site = standard_site();

        let pages = StaticBuilder::new(site.config(Mode::Production))
            .pages()
            .unwrap();

        let outputs: Vec<String> = pages.iter().map(|p| p.output_url()).collect();
        assert_eq!(outputs, vec!["about/team.html", "index.html"]);
        assert!(!site.dist("").exists());
    }
}
