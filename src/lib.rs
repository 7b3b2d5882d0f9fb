use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tokio_util::sync::CancellationToken;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tracing::{error, info};

pub mod config;
pub mod dispatcher;
pub mod errors;
pub mod http;
pub mod logging;

use config::Config;
use dispatcher::ToolDispatcher;
use http::sse::{ServerInfo, StreamSession};

#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<dyn ToolDispatcher>,
    pub server_info: Arc<ServerInfo>,
    pub heartbeat_interval: Duration,
    shutdown: CancellationToken,
    open_sessions: Arc<AtomicUsize>,
}

impl AppState {
    pub fn new(config: &Config, dispatcher: Arc<dyn ToolDispatcher>) -> Self {
        Self {
            dispatcher,
            server_info: Arc::new(ServerInfo {
                name: config.server_name.clone(),
                version: config.server_version.clone(),
                capabilities: config.capabilities.clone(),
            }),
            heartbeat_interval: config.heartbeat_interval,
            shutdown: CancellationToken::new(),
            open_sessions: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Starts a new event-stream session tied to the server's shutdown token.
    pub fn open_session(&self) -> StreamSession {
        StreamSession::open(
            Arc::clone(&self.server_info),
            self.heartbeat_interval,
            self.shutdown.child_token(),
            Arc::clone(&self.open_sessions),
        )
    }

    pub fn open_sessions(&self) -> usize {
        self.open_sessions.load(Ordering::SeqCst)
    }

    /// Cancels every open event stream. New sessions close right after `ready`.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }
}

/// Cross-origin policy for a local, trusted-network tool: every origin, method
/// and header is accepted with credentials. Credentials rule out `*`, so the
/// request's own values are mirrored back.
pub fn permissive_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/sse", get(http::sse::sse_get).post(http::sse::sse_post))
        .route("/call_tool", post(http::handlers::call_tool))
        .route("/list_tools", get(http::handlers::list_tools))
        .layer(permissive_cors())
        .layer(middleware::from_fn(logging::request_logging_middleware))
        .with_state(state)
}

/// Binds `config`'s host and port and serves until Ctrl-C or SIGTERM.
pub async fn serve(config: &Config, state: AppState) -> std::io::Result<()> {
    let listener =
        tokio::net::TcpListener::bind((config.bind_addr.as_str(), config.bind_port)).await?;

    info!(
        bind_addr = %config.bind_addr,
        bind_port = config.bind_port,
        server_name = %state.server_info.name,
        heartbeat_secs = state.heartbeat_interval.as_secs(),
        "server starting"
    );

    let shutdown_state = state.clone();
    axum::serve(listener, build_app(state))
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            info!(
                open_sessions = shutdown_state.open_sessions(),
                "shutting down, closing event streams"
            );
            shutdown_state.shutdown();
        })
        .await
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
