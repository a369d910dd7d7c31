//! Asset pipeline: stylesheet and script transforms plus directory copies.

use std::fs;
use std::path::Path;

use lightningcss::bundler::{Bundler, FileProvider};
use lightningcss::stylesheet::{MinifyOptions, ParserOptions, PrinterOptions, StyleSheet};
use lightningcss::targets::{Browsers, Targets};
use parcel_sourcemap::SourceMap;
use walkdir::WalkDir;

use crate::mode::Mode;

/// Output of a transform.
#[derive(Debug, Clone, PartialEq)]
pub struct Artifact {
    /// Transformed file contents
    pub code: String,

    /// Source map JSON, when the mode asks for one
    pub source_map: Option<String>,
}

/// Errors that can occur in an asset transform.
#[derive(Debug, thiserror::Error)]
pub enum TransformError {
    #[error("Failed to read {path}: {message}")]
    ReadError { path: String, message: String },

    #[error("Failed to compile stylesheet {path}: {message}")]
    StyleError { path: String, message: String },

    #[error("Failed to generate source map for {path}: {message}")]
    SourceMapError { path: String, message: String },
}

/// Turns one entry file into one output artifact.
pub trait AssetTransform: Send + Sync {
    /// Transform identifier used in logs
    fn name(&self) -> &'static str;

    /// Transform `entry` for the given mode.
    ///
    /// `output_name` is the file name the artifact is written under, used
    /// for the source map reference.
    fn transform(
        &self,
        entry: &Path,
        output_name: &str,
        mode: Mode,
    ) -> Result<Artifact, TransformError>;
}

/// Stylesheet pipeline using grass and lightningcss.
///
/// `.scss` and `.sass` entries are compiled with grass first. Plain CSS
/// entries get their `@import`s inlined. Either way lightningcss then adds
/// vendor prefixes for the configured browsers and minifies in production.
/// `url()` references are left as written.
pub struct StyleTransform {
    browsers: Browsers,
}

impl StyleTransform {
    pub fn new(browsers: Browsers) -> Self {
        Self { browsers }
    }
}

impl Default for StyleTransform {
    fn default() -> Self {
        Self::new(default_browsers())
    }
}

/// Browser versions encoded as `major << 16 | minor << 8`.
fn default_browsers() -> Browsers {
    Browsers {
        chrome: Some(80 << 16),
        edge: Some(88 << 16),
        firefox: Some(78 << 16),
        safari: Some(12 << 16),
        ios_saf: Some(12 << 16),
        ..Browsers::default()
    }
}

impl AssetTransform for StyleTransform {
    fn name(&self) -> &'static str {
        "style"
    }

    fn transform(
        &self,
        entry: &Path,
        output_name: &str,
        mode: Mode,
    ) -> Result<Artifact, TransformError> {
        let path = entry.display().to_string();
        let style_error = |message: String| TransformError::StyleError {
            path: path.clone(),
            message,
        };

        let provider = FileProvider::new();
        let compiled: String;
        let mut source_map = mode.source_maps().then(|| SourceMap::new("/"));

        let mut stylesheet = if is_sass(entry) {
            compiled = grass::from_path(entry, &grass::Options::default())
                .map_err(|e| style_error(e.to_string()))?;

            // Maps point at the compiled Sass output
            if let Some(map) = source_map.as_mut() {
                let index = map.add_source(&path);
                map.set_source_content(index as usize, &compiled)
                    .map_err(|e| TransformError::SourceMapError {
                        path: path.clone(),
                        message: e.to_string(),
                    })?;
            }

            let options = ParserOptions {
                filename: path.clone(),
                ..ParserOptions::default()
            };
            StyleSheet::parse(&compiled, options).map_err(|e| style_error(e.to_string()))?
        } else {
            let mut bundler = Bundler::new(&provider, source_map.as_mut(), ParserOptions::default());
            bundler
                .bundle(entry)
                .map_err(|e| style_error(e.to_string()))?
        };

        stylesheet
            .minify(MinifyOptions {
                targets: Targets::from(self.browsers),
                ..MinifyOptions::default()
            })
            .map_err(|e| style_error(e.to_string()))?;

        let printed = stylesheet
            .to_css(PrinterOptions {
                minify: mode.minify(),
                source_map: source_map.as_mut(),
                targets: Targets::from(self.browsers),
                ..PrinterOptions::default()
            })
            .map_err(|e| style_error(e.to_string()))?;

        let mut code = printed.code;

        let source_map = match source_map.as_mut() {
            Some(map) => {
                let json = map.to_json(None).map_err(|e| TransformError::SourceMapError {
                    path: path.clone(),
                    message: e.to_string(),
                })?;
                code.push_str(&format!("\n/*# sourceMappingURL={}.map */\n", output_name));
                Some(json)
            }
            None => None,
        };

        Ok(Artifact { code, source_map })
    }
}

/// Whether `entry` is Sass source, by extension.
fn is_sass(entry: &Path) -> bool {
    matches!(
        entry.extension().and_then(|e| e.to_str()),
        Some("scss") | Some("sass")
    )
}

/// Script pipeline that emits the entry unchanged.
///
/// Development builds get a line-for-line source map pointing back at the
/// entry.
#[derive(Debug, Default)]
pub struct ScriptTransform;

impl AssetTransform for ScriptTransform {
    fn name(&self) -> &'static str {
        "script"
    }

    fn transform(
        &self,
        entry: &Path,
        output_name: &str,
        mode: Mode,
    ) -> Result<Artifact, TransformError> {
        let source = fs::read_to_string(entry).map_err(|e| TransformError::ReadError {
            path: entry.display().to_string(),
            message: e.to_string(),
        })?;

        if !mode.source_maps() {
            return Ok(Artifact {
                code: source,
                source_map: None,
            });
        }

        let source_name = entry
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("index.js");

        let map = identity_source_map(output_name, source_name, &source);
        let json = serde_json::to_string(&map).map_err(|e| TransformError::SourceMapError {
            path: entry.display().to_string(),
            message: e.to_string(),
        })?;

        let mut code = source;
        if !code.ends_with('\n') {
            code.push('\n');
        }
        code.push_str(&format!("//# sourceMappingURL={}.map\n", output_name));

        Ok(Artifact {
            code,
            source_map: Some(json),
        })
    }
}

/// Build a v3 source map mapping every line to the same line of `source`.
fn identity_source_map(file: &str, source_name: &str, source: &str) -> serde_json::Value {
    let lines = source.lines().count().max(1);

    // First segment is absolute, every following line advances one source line.
    let mut mappings = String::from("AAAA");
    for _ in 1..lines {
        mappings.push_str(";AACA");
    }

    serde_json::json!({
        "version": 3,
        "file": file,
        "sources": [source_name],
        "sourcesContent": [source],
        "names": [],
        "mappings": mappings,
    })
}

/// Copy every file under `from` into `to`, keeping the directory layout.
///
/// Returns the number of files copied.
pub fn copy_dir(from: &Path, to: &Path) -> std::io::Result<usize> {
    let mut count = 0;

    for entry in WalkDir::new(from).follow_links(true) {
        let entry = entry.map_err(std::io::Error::other)?;
        let relative = entry.path().strip_prefix(from).unwrap_or(entry.path());
        let target = to.join(relative);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else if entry.file_type().is_file() {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(entry.path(), &target)?;
            count += 1;
        }
    }

    Ok(count)
}
