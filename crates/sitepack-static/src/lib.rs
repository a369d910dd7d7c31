//! Static site builder for sitepack.
//!
//! Renders every discovered page template to HTML, compiles the stylesheet
//! entry, emits the script entry and copies asset directories into the
//! output tree.

pub mod assets;
pub mod builder;
pub mod mode;
pub mod templates;

pub use assets::{copy_dir, Artifact, AssetTransform, ScriptTransform, StyleTransform, TransformError};
pub use builder::{BuildConfig, BuildError, BuildResult, CopyPattern, EntryConfig, StaticBuilder};
pub use mode::Mode;
pub use templates::{PageContext, PageRenderer, RenderError, TemplateEngine};
