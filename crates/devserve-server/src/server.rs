//! The dev server: router assembly, listen and close.

use crate::client::CLIENT_RUNTIME;
use crate::error::ServerError;
use crate::fallback::{fallback_handler, html_middleware, HistoryFallback};
use crate::middleware::{log_request, script_content_type, transform_middleware};
use crate::watch::FileWatcher;
use crate::ws::ws_handler;
use crate::{CLIENT_PATH, WS_PATH};
use axum::{
    handler::Handler,
    http::header,
    middleware::{from_fn, from_fn_with_state},
    response::IntoResponse,
    routing::get,
    Router,
};
use devserve_core::hmr::{UpdateChannel, UpdateDispatcher};
use devserve_core::{DevConfig, ModuleTransformer, PluginContainer, ResolvedConfig};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

/// How long `close` waits for in-flight requests.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// State shared by every handler.
#[derive(Debug, Clone)]
pub(crate) struct ServerState {
    pub(crate) root: PathBuf,
    pub(crate) plugins: Arc<PluginContainer>,
    pub(crate) transformer: Arc<ModuleTransformer>,
    pub(crate) channel: Arc<UpdateChannel>,
    pub(crate) history: HistoryFallback,
}

pub(crate) type SharedState = Arc<ServerState>;

struct Running {
    addr: SocketAddr,
    watcher: FileWatcher,
    dispatcher: JoinHandle<()>,
    shutdown: oneshot::Sender<()>,
    server: JoinHandle<std::io::Result<()>>,
}

/// A development server instance.
///
/// Owns the plugin pipeline, the update channel, the file watcher and the
/// HTTP listener. Nothing is process-global: [`close`](Self::close) tears
/// everything down together.
pub struct DevServer {
    config: DevConfig,
    state: SharedState,
    prebundled: bool,
    running: Option<Running>,
}

impl std::fmt::Debug for DevServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DevServer")
            .field("root", &self.state.root)
            .field("addr", &self.local_addr())
            .finish_non_exhaustive()
    }
}

impl DevServer {
    pub fn new(resolved: ResolvedConfig) -> Self {
        let ResolvedConfig { config, plugins } = resolved;
        let state = Arc::new(ServerState {
            history: HistoryFallback::new(&config.root),
            root: config.root.clone(),
            plugins,
            transformer: Arc::new(ModuleTransformer::new()),
            channel: UpdateChannel::new(),
        });
        Self {
            config,
            state,
            prebundled: false,
            running: None,
        }
    }

    /// Replace the history fallback rewrite for paths ending in `/`.
    pub fn with_history_rewrite<F>(mut self, rewrite: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        let mut state = (*self.state).clone();
        state.history = HistoryFallback::with_rewrite(rewrite);
        self.state = Arc::new(state);
        self
    }

    pub fn root(&self) -> &Path {
        &self.state.root
    }

    pub fn config(&self) -> &DevConfig {
        &self.config
    }

    pub fn channel(&self) -> &Arc<UpdateChannel> {
        &self.state.channel
    }

    pub fn transformer(&self) -> &Arc<ModuleTransformer> {
        &self.state.transformer
    }

    /// Bound address, while listening.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.running.as_ref().map(|r| r.addr)
    }

    /// Build the request chain.
    ///
    /// Layers run outermost first: trace, request log, transform, HTML,
    /// script content type; then the routes, then static files with the
    /// history/404 fallback.
    pub fn router(&self) -> Router {
        let state = Arc::clone(&self.state);

        let static_files = ServeDir::new(&state.root)
            .append_index_html_on_directories(false)
            .fallback(fallback_handler.with_state(Arc::clone(&state)));

        Router::new()
            .route(WS_PATH, get(ws_handler))
            .route(CLIENT_PATH, get(serve_client))
            .fallback_service(static_files)
            .layer(from_fn(script_content_type))
            .layer(from_fn_with_state(Arc::clone(&state), html_middleware))
            .layer(from_fn_with_state(Arc::clone(&state), transform_middleware))
            .layer(from_fn(log_request))
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }

    /// Bind `port` on the configured host and start serving and watching.
    ///
    /// Port `0` picks a free port. Returns the bound address.
    pub async fn listen(&mut self, port: u16) -> Result<SocketAddr, ServerError> {
        if let Some(running) = &self.running {
            return Err(ServerError::AlreadyListening { addr: running.addr });
        }

        self.prebundle();

        let host = if self.config.host == "localhost" {
            "127.0.0.1"
        } else {
            self.config.host.as_str()
        };
        let listener = tokio::net::TcpListener::bind((host, port))
            .await
            .map_err(|source| ServerError::Bind {
                addr: format!("{host}:{port}"),
                source,
            })?;
        let addr = listener.local_addr()?;

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let watcher = FileWatcher::start(&self.state.root, self.config.ignored.clone(), events_tx)?;
        let dispatcher = UpdateDispatcher::new(&self.state.root, Arc::clone(&self.state.channel))
            .with_transformer(Arc::clone(&self.state.transformer));
        let dispatcher = tokio::spawn(dispatcher.run(events_rx));

        let (shutdown, shutdown_rx) = oneshot::channel::<()>();
        let app = self.router();
        let server = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.await;
                })
                .await
        });

        info!(addr = %addr, root = %self.state.root.display(), "Dev server listening");

        self.running = Some(Running {
            addr,
            watcher,
            dispatcher,
            shutdown,
            server,
        });
        Ok(addr)
    }

    /// Stop the watcher, close every WebSocket and shut the listener down.
    ///
    /// Later `send` calls on the channel are no-ops. Safe to call when not
    /// listening.
    pub async fn close(&mut self) {
        let Some(running) = self.running.take() else {
            self.state.channel.close().await;
            return;
        };
        debug!(addr = %running.addr, "closing dev server");

        running.watcher.stop();
        running.dispatcher.abort();

        let closed = self.state.channel.close().await;
        debug!(connections = closed, "websocket connections closed");

        let _ = running.shutdown.send(());
        match tokio::time::timeout(SHUTDOWN_TIMEOUT, running.server).await {
            Ok(Ok(Ok(()))) => {}
            Ok(Ok(Err(e))) => warn!(error = %e, "HTTP server exited with error"),
            Ok(Err(e)) => warn!(error = %e, "HTTP server task failed"),
            Err(_) => warn!("HTTP server did not shut down in time"),
        }

        info!("Dev server closed");
    }

    /// Dependency pre-bundling hook. Runs once, before the first bind.
    fn prebundle(&mut self) {
        if self.prebundled {
            return;
        }
        self.prebundled = true;
        debug!("dependency pre-bundling skipped");
    }
}

async fn serve_client() -> impl IntoResponse {
    (
        [
            (header::CONTENT_TYPE, "application/javascript"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        CLIENT_RUNTIME,
    )
}
