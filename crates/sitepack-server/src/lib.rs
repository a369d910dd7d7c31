//! Development server with live reload for sitepack.
//!
//! Builds the site to disk, serves the output directory, watches the source
//! tree and tells connected browsers to reload after every rebuild.

pub mod server;
pub mod watcher;
pub mod websocket;

pub use server::{DevServer, DevServerConfig, ServerError, RELOAD_SCRIPT_PATH, RELOAD_SOCKET_PATH};
pub use watcher::{FileWatcher, WatchEvent, WatchFilter};
pub use websocket::{ReloadHub, ReloadMessage};
