//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (tracing, timeout, request ID)
//! - Mount the admin API behind bearer auth
//! - Serve until the shutdown signal fires

use std::sync::Arc;
use std::time::Duration;

use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::admin;
use crate::cache::{CacheStore, PlaylistCache};
use crate::clock::Clock;
use crate::config::{AdminConfig, ServerConfig};
use crate::http::handlers;
use crate::lifecycle::Shutdown;
use crate::poller::Poller;
use crate::resilience::CircuitBreaker;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub breaker: Arc<CircuitBreaker>,
    pub cache: Arc<dyn CacheStore>,
    pub playlists: Arc<PlaylistCache>,
    pub poller: Arc<Poller>,
    pub clock: Arc<dyn Clock>,
    pub admin: AdminConfig,
}

/// HTTP server for the cached FPP API.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    pub fn new(state: AppState, config: &ServerConfig) -> Self {
        let router = build_router(state, Duration::from_secs(config.request_timeout_secs));
        Self { router }
    }

    /// Run the server until `shutdown` fires. In-flight requests drain first.
    pub async fn run(self, listener: TcpListener, shutdown: Shutdown) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown.wait())
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Build the Axum router with all middleware layers.
#[allow(deprecated)]
pub fn build_router(state: AppState, request_timeout: Duration) -> Router {
    let mut router = Router::new()
        .route("/api/fpp/status", get(handlers::get_status))
        .route("/api/fpp/now-playing", get(handlers::get_now_playing))
        .route("/api/fpp/playlist/{name}", get(handlers::get_playlist))
        .route("/api/fpp/history", get(handlers::get_history));

    if state.admin.enabled {
        router = router.merge(admin::setup_admin_router(state.clone()));
    } else {
        tracing::info!("Admin API disabled");
    }

    router
        .with_state(state)
        .layer(TimeoutLayer::new(request_timeout))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}
