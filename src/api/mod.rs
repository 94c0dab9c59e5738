//! Read API and WebSocket event stream
//!
//! ## Endpoints
//!
//! - `GET /api/v1/health` - liveness plus storage health
//! - `GET /api/v1/status` - latest status snapshot
//! - `GET /api/v1/services` - checked services in configuration order
//! - `GET /api/v1/services/:name/checks?limit=` - recent checks
//! - `GET /api/v1/services/:name/hourly?hours=` - hourly aggregates
//! - `GET /api/v1/services/:name/uptime?hours=` - uptime summary
//! - `GET /api/v1/incidents` - incident ledger
//! - `GET /api/v1/stats` - storage and monitor statistics
//! - `WS /api/v1/stream` - check events as they are processed
//!
//! There is no authentication; bind to a trusted interface.

pub mod error;
pub mod routes;
pub mod state;
pub mod types;
pub mod websocket;

pub use error::{ApiError, ApiResult};
pub use state::ApiState;

use std::net::SocketAddr;

use axum::{Router, routing::get};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::config::ApiSettings;

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub bind_addr: SocketAddr,

    /// Allow any origin, for dashboards served elsewhere
    pub enable_cors: bool,
}

impl From<&ApiSettings> for ApiConfig {
    fn from(settings: &ApiSettings) -> Self {
        Self {
            bind_addr: settings.bind,
            enable_cors: settings.enable_cors,
        }
    }
}

pub fn router(state: ApiState, enable_cors: bool) -> Router {
    let mut app = Router::new()
        .route("/api/v1/health", get(routes::health::health_check))
        .route("/api/v1/status", get(routes::status::get_status))
        .route("/api/v1/stats", get(routes::stats::get_stats))
        .route("/api/v1/incidents", get(routes::incidents::list_incidents))
        .route("/api/v1/services", get(routes::services::list_services))
        .route(
            "/api/v1/services/:name/checks",
            get(routes::services::get_service_checks),
        )
        .route(
            "/api/v1/services/:name/hourly",
            get(routes::services::get_hourly),
        )
        .route(
            "/api/v1/services/:name/uptime",
            get(routes::services::get_uptime),
        )
        .route("/api/v1/stream", get(websocket::websocket_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    if enable_cors {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
        app = app.layer(cors);
    }

    app
}

/// Bind and serve the API in a background task, returning the bound address
pub async fn spawn_api_server(config: ApiConfig, state: ApiState) -> anyhow::Result<SocketAddr> {
    info!("starting API server on {}", config.bind_addr);

    let app = router(state, config.enable_cors);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    let addr = listener.local_addr()?;

    info!("API server listening on {}", addr);

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!("API server error: {}", e);
        }
    });

    Ok(addr)
}
