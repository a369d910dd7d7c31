//! Development server implementation.

use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use tower_http::services::ServeDir;

use sitepack_static::{BuildConfig, BuildError, BuildResult, Mode, StaticBuilder};

use crate::watcher::{FileWatcher, WatchEvent, WatchFilter};
use crate::websocket::{reload_client_script, ReloadHub, ReloadMessage};

/// WebSocket endpoint browsers connect to.
pub const RELOAD_SOCKET_PATH: &str = "/__reload";

/// Live reload client script injected into every page.
pub const RELOAD_SCRIPT_PATH: &str = "/__reload.js";

/// Configuration for the development server.
#[derive(Debug, Clone)]
pub struct DevServerConfig {
    /// Site build settings; mode is forced to development
    pub build: BuildConfig,

    /// Port to listen on
    pub port: u16,

    /// Host to bind to
    pub host: String,

    /// Open browser on start
    pub open: bool,
}

impl Default for DevServerConfig {
    fn default() -> Self {
        Self {
            build: BuildConfig::default(),
            port: 8080,
            host: "127.0.0.1".to_string(),
            open: true,
        }
    }
}

/// Errors that can occur with the server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Invalid address {0}")]
    InvalidAddress(String),

    #[error("Failed to bind to {0}: {1}")]
    BindError(SocketAddr, String),

    #[error("File watch error: {0}")]
    WatchError(String),

    #[error(transparent)]
    Build(#[from] BuildError),

    #[error("Build task failed: {0}")]
    TaskError(String),
}

/// Shared server state.
struct ServerState {
    hub: ReloadHub,
}

/// Development server.
pub struct DevServer {
    config: DevServerConfig,
}

impl DevServer {
    /// Create a new development server.
    pub fn new(config: DevServerConfig) -> Self {
        Self { config }
    }

    /// Build settings used by the server: development mode with the live
    /// reload client injected.
    pub fn build_config(&self) -> BuildConfig {
        BuildConfig {
            mode: Mode::Development,
            live_reload: Some(RELOAD_SCRIPT_PATH.to_string()),
            ..self.config.build.clone()
        }
    }

    /// Start the development server.
    ///
    /// The first build must succeed; later rebuild failures are reported to
    /// the browser and the last good output keeps being served.
    pub async fn start(self) -> Result<(), ServerError> {
        let host_port = format!("{}:{}", self.config.host, self.config.port);
        let addr: SocketAddr = host_port
            .parse()
            .map_err(|_| ServerError::InvalidAddress(host_port.clone()))?;

        let build_config = self.build_config();
        let output_dir = build_config.output_dir.clone();

        let result = rebuild(build_config.clone()).await?;
        tracing::info!(
            "Built {} pages and {} assets in {}ms",
            result.pages,
            result.assets,
            result.duration_ms
        );

        let state = Arc::new(ServerState {
            hub: ReloadHub::new(),
        });

        // Set up file watcher
        let filter = WatchFilter {
            template_extensions: build_config.template_extensions.clone(),
            ignored: vec![fs::canonicalize(&output_dir).unwrap_or_else(|_| output_dir.clone())],
        };

        let (watcher, mut rx) = FileWatcher::new(&watch_paths(&build_config), filter)
            .map_err(|e| ServerError::WatchError(e.to_string()))?;

        // Spawn file watch handler
        let state_clone = Arc::clone(&state);
        tokio::spawn(async move {
            while let Some(batch) = rx.recv().await {
                handle_watch_events(&state_clone, &build_config, &batch).await;
            }
            // Keep watcher alive
            drop(watcher);
        });

        let app = router(state, &output_dir);

        tracing::info!("Starting dev server at http://{}", addr);

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::BindError(addr, e.to_string()))?;

        if self.config.open {
            let url = format!("http://{}", addr);
            let _ = open::that(&url);
        }

        axum::serve(listener, app)
            .await
            .map_err(|e| ServerError::BindError(addr, e.to_string()))?;

        Ok(())
    }
}

fn router(state: Arc<ServerState>, output_dir: &Path) -> Router {
    Router::new()
        .route(RELOAD_SOCKET_PATH, get(ws_handler))
        .route(RELOAD_SCRIPT_PATH, get(reload_script_handler))
        .fallback_service(ServeDir::new(output_dir))
        .with_state(state)
}

/// Directories that feed the build: the template root plus any entry or
/// asset directory outside it.
pub fn watch_paths(config: &BuildConfig) -> Vec<PathBuf> {
    let mut paths = vec![config.source_dir.clone()];

    let entry_dirs = [&config.stylesheet, &config.script]
        .into_iter()
        .flatten()
        .filter_map(|entry| entry.source.parent().map(Path::to_path_buf));
    let asset_dirs = config.assets.iter().map(|pattern| pattern.from.clone());

    for dir in entry_dirs.chain(asset_dirs) {
        if !paths.iter().any(|p| dir.starts_with(p)) {
            paths.push(dir);
        }
    }

    paths
}

/// Run a build on the blocking pool.
async fn rebuild(config: BuildConfig) -> Result<BuildResult, ServerError> {
    let result = tokio::task::spawn_blocking(move || StaticBuilder::new(config).build())
        .await
        .map_err(|e| ServerError::TaskError(e.to_string()))?;

    Ok(result?)
}

/// Message for a batch of changes: a stylesheet swap when only styles
/// changed, a full reload otherwise.
pub fn reload_message(batch: &[WatchEvent]) -> ReloadMessage {
    if batch
        .iter()
        .all(|e| matches!(e, WatchEvent::StyleModified(_)))
    {
        ReloadMessage::UpdateStyle
    } else {
        ReloadMessage::Reload
    }
}

/// Rebuild once for a batch of file watch events.
async fn handle_watch_events(state: &ServerState, config: &BuildConfig, batch: &[WatchEvent]) {
    for event in batch {
        tracing::info!("Changed: {}", event.path().display());
    }

    match rebuild(config.clone()).await {
        Ok(result) => {
            tracing::info!(
                "Rebuilt {} pages in {}ms",
                result.pages,
                result.duration_ms
            );
            state.hub.send(reload_message(batch));
        }
        Err(e) => {
            tracing::warn!("Rebuild failed: {}", e);
            state.hub.send(ReloadMessage::BuildFailed {
                message: e.to_string(),
            });
        }
    }
}

/// Handler for the live reload WebSocket endpoint.
async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<ServerState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws(socket, state))
}

/// Handle a WebSocket connection.
async fn handle_ws(mut socket: WebSocket, state: Arc<ServerState>) {
    let mut rx = state.hub.subscribe();

    if send_message(&mut socket, &ReloadMessage::Connected)
        .await
        .is_err()
    {
        return;
    }

    // Forward reload messages to the client
    while let Ok(msg) = rx.recv().await {
        if send_message(&mut socket, &msg).await.is_err() {
            break;
        }
    }
}

async fn send_message(socket: &mut WebSocket, msg: &ReloadMessage) -> Result<(), ()> {
    let json = serde_json::to_string(msg).map_err(|_| ())?;
    socket
        .send(Message::Text(json.into()))
        .await
        .map_err(|_| ())
}

/// Handler for the live reload client script.
async fn reload_script_handler() -> impl IntoResponse {
    let script = reload_client_script(RELOAD_SOCKET_PATH);
    ([("content-type", "application/javascript")], script)
}
