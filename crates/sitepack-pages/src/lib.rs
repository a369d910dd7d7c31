//! Page discovery and output path mapping.
//!
//! Scans a source tree for page templates, skips partials (templates whose
//! filename starts with `_`), and maps every remaining template to the HTML
//! file it produces in the output directory.

pub mod discovery;
pub mod mapping;

pub use discovery::{discover_pages, ensure_unique, DiscoveryError, DiscoveryOptions};
pub use mapping::{output_path_for, PageMapping, TemplateFile, PAGE_EXTENSION, PARTIAL_MARKER};
