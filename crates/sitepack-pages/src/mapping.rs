//! Template files and the pages they map to.

use std::path::{Component, Path, PathBuf};

/// Filename prefix marking a template as a partial.
pub const PARTIAL_MARKER: char = '_';

/// Extension given to every generated page.
pub const PAGE_EXTENSION: &str = "html";

/// A template found under the source root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateFile {
    /// Path relative to the source root
    pub path: PathBuf,
}

impl TemplateFile {
    /// Create a template from a path relative to the source root.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Whether the filename (not any parent directory) starts with `marker`.
    ///
    /// Partials are fragments pulled in by other templates and never become
    /// standalone pages.
    pub fn is_partial(&self, marker: char) -> bool {
        let mut buf = [0; 4];
        let marker = marker.encode_utf8(&mut buf).as_bytes();

        // Raw bytes, so names that are not valid UTF-8 are still checked
        self.path
            .file_name()
            .is_some_and(|name| name.as_encoded_bytes().starts_with(marker))
    }

    /// Whether the file's final extension is one of `extensions`.
    pub fn has_extension(&self, extensions: &[String]) -> bool {
        self.path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| extensions.iter().any(|e| e == ext))
    }
}

/// A template paired with the page it renders to.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PageMapping {
    /// Absolute path of the template
    pub source_path: PathBuf,

    /// Output path relative to the output root
    pub output_path: PathBuf,
}

impl PageMapping {
    /// Number of directories between the output root and this page.
    pub fn depth(&self) -> usize {
        self.output_path
            .parent()
            .map(|p| {
                p.components()
                    .filter(|c| matches!(c, Component::Normal(_)))
                    .count()
            })
            .unwrap_or(0)
    }

    /// Relative prefix leading from this page back to the output root.
    ///
    /// `index.html` gets `""`, `about/team.html` gets `"../"`.
    pub fn root_prefix(&self) -> String {
        "../".repeat(self.depth())
    }

    /// Output path with `/` separators, for logs and templates.
    pub fn output_url(&self) -> String {
        self.output_path
            .components()
            .filter_map(|c| match c {
                Component::Normal(part) => Some(part.to_string_lossy()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("/")
    }
}

/// Map a template path relative to the source root to its page path.
///
/// Only the final extension changes: `about/team.jinja` becomes
/// `about/team.html` and `index.html.jinja` becomes `index.html.html`.
pub fn output_path_for(relative: &Path) -> PathBuf {
    relative.with_extension(PAGE_EXTENSION)
}
