//! REST API and WebSocket server for the monitoring engine
//!
//! A thin rendering of the [`EngineHandle`](crate::actors::EngineHandle)
//! command surface over HTTP, plus a WebSocket stream of snapshot events.
//!
//! ## Endpoints
//!
//! - `GET /api/v1/health` - Health check (never requires a token)
//! - `GET|POST /api/v1/hosts` - List / add hosts
//! - `PUT|DELETE /api/v1/hosts/:id` - Edit / remove a host
//! - `POST /api/v1/hosts/:id/start|stop` - Per-host monitoring
//! - `GET /api/v1/hosts/:id/snapshot` - Latest statistics
//! - `GET /api/v1/hosts/:id/history` - Recency window
//! - `POST /api/v1/monitoring/start|stop` - All hosts
//! - `GET|PUT /api/v1/settings` - Settings document
//! - `GET /api/v1/summary` - Aggregate view
//! - `WS /api/v1/stream` - Real-time snapshot streaming

pub mod error;
pub mod middleware;
pub mod routes;
pub mod state;
pub mod types;
pub mod websocket;

pub use error::{ApiError, ApiResult};
pub use state::ApiState;

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post, put},
};
use tracing::{error, info};

pub const HEALTH_PATH: &str = "/api/v1/health";

/// API server configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Bind address (e.g., "127.0.0.1:8080")
    pub bind_addr: SocketAddr,

    /// Optional bearer token
    pub auth_token: Option<String>,

    /// Enable CORS for browser dashboards
    pub enable_cors: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, 8080)),
            auth_token: None,
            enable_cors: true,
        }
    }
}

pub fn router(config: &ApiConfig, state: ApiState) -> Router {
    use tower_http::cors::{Any, CorsLayer};
    use tower_http::trace::TraceLayer;

    let mut app = Router::new()
        .route(HEALTH_PATH, get(routes::health::health_check))
        .route(
            "/api/v1/hosts",
            get(routes::hosts::list_hosts).post(routes::hosts::create_host),
        )
        .route(
            "/api/v1/hosts/:id",
            put(routes::hosts::update_host).delete(routes::hosts::delete_host),
        )
        .route("/api/v1/hosts/:id/start", post(routes::hosts::start_host))
        .route("/api/v1/hosts/:id/stop", post(routes::hosts::stop_host))
        .route("/api/v1/hosts/:id/snapshot", get(routes::hosts::get_snapshot))
        .route("/api/v1/hosts/:id/history", get(routes::hosts::get_history))
        .route("/api/v1/monitoring/start", post(routes::monitoring::start_all))
        .route("/api/v1/monitoring/stop", post(routes::monitoring::stop_all))
        .route(
            "/api/v1/settings",
            get(routes::settings::get_settings).put(routes::settings::put_settings),
        )
        .route("/api/v1/summary", get(routes::monitoring::get_summary))
        .route("/api/v1/stream", get(websocket::websocket_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    if let Some(token) = &config.auth_token {
        let token: Arc<str> = Arc::from(token.as_str());
        app = app.layer(axum::middleware::from_fn_with_state(
            token,
            middleware::auth::require_bearer_token,
        ));
    }

    // outermost, so preflight requests never hit the token check
    if config.enable_cors {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
        app = app.layer(cors);
    }

    app
}

/// Spawn the API server
///
/// This starts an Axum HTTP server in a background task and returns the
/// address it is listening on.
pub async fn spawn_api_server(config: ApiConfig, state: ApiState) -> anyhow::Result<SocketAddr> {
    info!("starting API server on {}", config.bind_addr);

    let app = router(&config, state);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    let addr = listener.local_addr()?;

    info!("API server listening on {addr}");

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!("API server error: {e}");
        }
    });

    Ok(addr)
}
