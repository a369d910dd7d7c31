//! Source tree scanning.

use std::collections::HashMap;
use std::ffi::OsStr;
use std::fs;
use std::path::{Component, Path, PathBuf};

use walkdir::WalkDir;

use crate::mapping::{output_path_for, PageMapping, TemplateFile, PARTIAL_MARKER};

/// Options controlling which files become pages.
#[derive(Debug, Clone)]
pub struct DiscoveryOptions {
    /// Template extensions, without the leading dot
    pub extensions: Vec<String>,

    /// Filename prefix that marks a partial
    pub partial_marker: char,

    /// Follow symlinks while walking
    pub follow_links: bool,
}

impl Default for DiscoveryOptions {
    fn default() -> Self {
        Self {
            extensions: vec!["jinja".to_string()],
            partial_marker: PARTIAL_MARKER,
            follow_links: true,
        }
    }
}

/// Errors that can occur during discovery.
#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    #[error("Source directory {path} is not readable: {message}")]
    SourceRoot { path: PathBuf, message: String },

    #[error("Failed to scan source directory: {0}")]
    Walk(String),

    #[error("Templates {first} and {second} both render to {output}")]
    Collision {
        output: PathBuf,
        first: PathBuf,
        second: PathBuf,
    },
}

/// Whether a file or directory name is hidden (starts with `.`).
fn is_hidden(name: &OsStr) -> bool {
    name.as_encoded_bytes().starts_with(b".")
}

/// Whether any component of a path relative to the source root is hidden.
fn has_hidden_component(relative: &Path) -> bool {
    relative.components().any(|c| match c {
        Component::Normal(name) => is_hidden(name),
        _ => false,
    })
}

/// Discover every page template under `root`.
///
/// Hidden files and directories are never visited, so editor lock files
/// and dot-directories cannot break a build. Partials are skipped. The
/// result is sorted by output path, and no two mappings share an output
/// path.
pub fn discover_pages(
    root: &Path,
    options: &DiscoveryOptions,
) -> Result<Vec<PageMapping>, DiscoveryError> {
    let root_error = |message: String| DiscoveryError::SourceRoot {
        path: root.to_path_buf(),
        message,
    };

    let root = fs::canonicalize(root).map_err(|e| root_error(e.to_string()))?;
    if !root.is_dir() {
        return Err(root_error("not a directory".to_string()));
    }
    fs::read_dir(&root).map_err(|e| root_error(e.to_string()))?;

    let mut pages = Vec::new();
    let mut partials = 0usize;

    let walker = WalkDir::new(&root)
        .follow_links(options.follow_links)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_hidden(e.file_name()));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            // Links are resolved before filtering, so a dangling hidden link
            // surfaces here
            Err(e)
                if e.path()
                    .and_then(|p| p.strip_prefix(&root).ok())
                    .is_some_and(has_hidden_component) =>
            {
                continue;
            }
            Err(e) => return Err(DiscoveryError::Walk(e.to_string())),
        };

        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(&root).unwrap_or(path);
        let template = TemplateFile::new(relative);

        if !template.has_extension(&options.extensions) {
            continue;
        }

        if template.is_partial(options.partial_marker) {
            tracing::debug!("Skipping partial {}", relative.display());
            partials += 1;
            continue;
        }

        pages.push(PageMapping {
            source_path: path.to_path_buf(),
            output_path: output_path_for(&template.path),
        });
    }

    ensure_unique(&pages)?;
    pages.sort_by(|a, b| a.output_path.cmp(&b.output_path));

    tracing::debug!(
        "Discovered {} pages and {} partials in {}",
        pages.len(),
        partials,
        root.display()
    );

    Ok(pages)
}

/// Fail if two mappings render to the same output path.
pub fn ensure_unique(pages: &[PageMapping]) -> Result<(), DiscoveryError> {
    let mut seen: HashMap<&Path, &Path> = HashMap::with_capacity(pages.len());

    for page in pages {
        if let Some(first) = seen.insert(&page.output_path, &page.source_path) {
            return Err(DiscoveryError::Collision {
                output: page.output_path.clone(),
                first: first.to_path_buf(),
                second: page.source_path.clone(),
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashSet;
    use tempfile::tempdir;

    fn touch(root: &Path, relative: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "<p>page</p>").unwrap();
    }

    fn outputs(pages: &[PageMapping]) -> Vec<String> {
        pages.iter().map(|p| p.output_url()).collect()
    }

    #[test]
    fn maps_pages_and_skips_partials() {
        let temp = tempdir().unwrap();
        touch(temp.path(), "index.jinja");
        touch(temp.path(), "_header.jinja");
        touch(temp.path(), "about/team.jinja");

        let pages = discover_pages(temp.path(), &DiscoveryOptions::default()).unwrap();

        assert_eq!(outputs(&pages), vec!["about/team.html", "index.html"]);

        let root = fs::canonicalize(temp.path()).unwrap();
        assert_eq!(pages[0].source_path, root.join("about/team.jinja"));
        assert_eq!(pages[1].source_path, root.join("index.jinja"));
    }

    #[test]
    fn source_paths_are_absolute() {
        let temp = tempdir().unwrap();
        touch(temp.path(), "index.jinja");

        let pages = discover_pages(temp.path(), &DiscoveryOptions::default()).unwrap();

        assert!(pages[0].source_path.is_absolute());
        assert!(pages[0].output_path.is_relative());
    }

    #[test]
    fn skips_nested_partials() {
        let temp = tempdir().unwrap();
        touch(temp.path(), "blog/_card.jinja");
        touch(temp.path(), "blog/post.jinja");
        touch(temp.path(), "_layouts/base.jinja");

        let pages = discover_pages(temp.path(), &DiscoveryOptions::default()).unwrap();

        assert_eq!(outputs(&pages), vec!["_layouts/base.html", "blog/post.html"]);
    }

    #[test]
    fn ignores_other_files() {
        let temp = tempdir().unwrap();
        touch(temp.path(), "index.jinja");
        touch(temp.path(), "style/style.css");
        touch(temp.path(), "image/logo.png");
        touch(temp.path(), "notes.jinja.bak");

        let pages = discover_pages(temp.path(), &DiscoveryOptions::default()).unwrap();

        assert_eq!(outputs(&pages), vec!["index.html"]);
    }

    #[test]
    fn every_page_keeps_its_directory() {
        let temp = tempdir().unwrap();
        let sources = ["a.jinja", "x/b.jinja", "x/y/c.jinja", "x/y/z/d.jinja"];
        for s in sources {
            touch(temp.path(), s);
        }

        let pages = discover_pages(temp.path(), &DiscoveryOptions::default()).unwrap();
        let root = fs::canonicalize(temp.path()).unwrap();

        assert_eq!(pages.len(), sources.len());
        for page in &pages {
            let relative = page.source_path.strip_prefix(&root).unwrap();
            assert_eq!(page.output_path, relative.with_extension("html"));
            assert_eq!(page.output_path.parent(), relative.parent());
        }
    }

    #[test]
    fn discovery_is_idempotent() {
        let temp = tempdir().unwrap();
        touch(temp.path(), "index.jinja");
        touch(temp.path(), "contact.jinja");
        touch(temp.path(), "about/team.jinja");
        touch(temp.path(), "_footer.jinja");

        let options = DiscoveryOptions::default();
        let first = discover_pages(temp.path(), &options).unwrap();
        let second = discover_pages(temp.path(), &options).unwrap();

        let a: HashSet<_> = first.iter().cloned().collect();
        let b: HashSet<_> = second.iter().cloned().collect();
        assert_eq!(a, b);
        assert_eq!(first, second);
    }

    #[test]
    fn missing_root_is_an_error() {
        let temp = tempdir().unwrap();
        let missing = temp.path().join("nope");

        let result = discover_pages(&missing, &DiscoveryOptions::default());

        assert!(matches!(result, Err(DiscoveryError::SourceRoot { .. })));
    }

    #[test]
    fn file_root_is_an_error() {
        let temp = tempdir().unwrap();
        touch(temp.path(), "index.jinja");

        let result = discover_pages(&temp.path().join("index.jinja"), &DiscoveryOptions::default());

        assert!(matches!(result, Err(DiscoveryError::SourceRoot { .. })));
    }

    #[test]
    fn similar_names_in_different_directories_do_not_collide() {
        let temp = tempdir().unwrap();
        touch(temp.path(), "a/page.jinja");
        touch(temp.path(), "a_page.jinja");

        let pages = discover_pages(temp.path(), &DiscoveryOptions::default()).unwrap();

        assert_eq!(outputs(&pages), vec!["a/page.html", "a_page.html"]);
    }

    #[test]
    fn colliding_outputs_fail_fast() {
        let temp = tempdir().unwrap();
        touch(temp.path(), "page.jinja");
        touch(temp.path(), "page.j2");

        let options = DiscoveryOptions {
            extensions: vec!["jinja".to_string(), "j2".to_string()],
            ..Default::default()
        };

        match discover_pages(temp.path(), &options) {
            Err(DiscoveryError::Collision {
                output,
                first,
                second,
            }) => {
                assert_eq!(output, PathBuf::from("page.html"));
                assert_ne!(first, second);
            }
            other => panic!("expected collision, got {:?}", other),
        }
    }

    #[test]
    fn custom_partial_marker() {
        let temp = tempdir().unwrap();
        touch(temp.path(), "index.jinja");
        touch(temp.path(), "~nav.jinja");
        touch(temp.path(), "_kept.jinja");

        let options = DiscoveryOptions {
            partial_marker: '~',
            ..Default::default()
        };
        let pages = discover_pages(temp.path(), &options).unwrap();

        assert_eq!(outputs(&pages), vec!["_kept.html", "index.html"]);
    }

    #[cfg(unix)]
    #[test]
    fn skips_partials_with_non_utf8_names() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let temp = tempdir().unwrap();
        touch(temp.path(), "index.jinja");
        fs::write(
            temp.path().join(OsStr::from_bytes(b"_\xffnav.jinja")),
            "<nav></nav>",
        )
        .unwrap();

        let pages = discover_pages(temp.path(), &DiscoveryOptions::default()).unwrap();

        assert_eq!(outputs(&pages), vec!["index.html"]);
    }

    #[test]
    fn skips_hidden_files_and_directories() {
        let temp = tempdir().unwrap();
        touch(temp.path(), "index.jinja");
        touch(temp.path(), ".drafts/post.jinja");
        touch(temp.path(), "blog/.wip.jinja");
        touch(temp.path(), "blog/post.jinja");

        let pages = discover_pages(temp.path(), &DiscoveryOptions::default()).unwrap();

        assert_eq!(outputs(&pages), vec!["blog/post.html", "index.html"]);
    }

    #[cfg(unix)]
    #[test]
    fn dangling_editor_lock_link_is_ignored() {
        let temp = tempdir().unwrap();
        touch(temp.path(), "index.jinja");
        std::os::unix::fs::symlink("user@host.1234:1", temp.path().join(".#index.jinja"))
            .unwrap();

        let pages = discover_pages(temp.path(), &DiscoveryOptions::default()).unwrap();

        assert_eq!(outputs(&pages), vec!["index.html"]);
    }

    #[cfg(unix)]
    #[test]
    fn dangling_visible_link_is_an_error() {
        let temp = tempdir().unwrap();
        touch(temp.path(), "index.jinja");
        std::os::unix::fs::symlink("missing.jinja", temp.path().join("broken.jinja")).unwrap();

        let result = discover_pages(temp.path(), &DiscoveryOptions::default());

        assert!(matches!(result, Err(DiscoveryError::Walk(_))));
    }

    #[test]
    fn ensure_unique_accepts_distinct_outputs() {
        let pages = vec![
            PageMapping {
                source_path: PathBuf::from("/src/a.jinja"),
                output_path: PathBuf::from("a.html"),
            },
            PageMapping {
                source_path: PathBuf::from("/src/b.jinja"),
                output_path: PathBuf::from("b.html"),
            },
        ];

        assert!(ensure_unique(&pages).is_ok());
    }
}
