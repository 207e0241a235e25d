//! HTTP API server for the tableside gateway

mod auth;
pub mod health;
pub mod menu;
pub mod orders;
pub mod websocket;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::Router;
use serde::Serialize;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

use crate::db::{DbPool, MenuRepo, OrderRepo};
use crate::session::{SessionConfig, SessionServices};
use crate::Result;

/// Shared state for API handlers
#[derive(Clone)]
pub struct ApiState {
    pub db: DbPool,
    pub api_key: Option<String>,
    pub menu: MenuRepo,
    pub orders: OrderRepo,
    /// Adapters handed to every audio session
    pub services: SessionServices,
    pub session_config: SessionConfig,
}

impl ApiState {
    #[must_use]
    pub fn new(
        db: DbPool,
        api_key: Option<String>,
        services: SessionServices,
        session_config: SessionConfig,
    ) -> Self {
        Self {
            menu: MenuRepo::new(db.clone()),
            orders: OrderRepo::new(db.clone()),
            db,
            api_key,
            services,
            session_config,
        }
    }
}

/// Error body shared by the REST endpoints
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

fn error_response(code: &str, message: &str) -> axum::Json<ErrorResponse> {
    axum::Json(ErrorResponse {
        error: ErrorDetail {
            code: code.to_string(),
            message: message.to_string(),
        },
    })
}

/// Build the router with all routes
pub fn build_router(state: Arc<ApiState>, static_dir: Option<&Path>) -> Router {
    let mut router = Router::new()
        .nest("/api/menu", menu::router(state.clone()))
        .nest("/api/orders", orders::router(state.clone()))
        .nest("/ws", websocket::router(state.clone()))
        .merge(health::router())
        .merge(health::ready_router(state));

    // Ordering UI
    if let Some(static_dir) = static_dir {
        let index_file = static_dir.join("index.html");
        let serve_dir = ServeDir::new(static_dir).not_found_service(ServeFile::new(&index_file));

        router = router.fallback_service(serve_dir);
        tracing::info!(path = %static_dir.display(), "serving static files");
    }

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    router.layer(cors).layer(TraceLayer::new_for_http())
}

/// API server
pub struct ApiServer {
    state: Arc<ApiState>,
    port: u16,
    static_dir: Option<PathBuf>,
}

impl ApiServer {
    #[must_use]
    pub fn new(state: ApiState, port: u16, static_dir: Option<PathBuf>) -> Self {
        Self {
            state: Arc::new(state),
            port,
            static_dir,
        }
    }

    /// Build the router with all routes
    #[must_use]
    pub fn router(&self) -> Router {
        build_router(self.state.clone(), self.static_dir.as_deref())
    }

    /// Run the API server
    ///
    /// # Errors
    ///
    /// Returns error if server fails to bind or run
    pub async fn run(self) -> Result<()> {
        if self.state.api_key.is_none() {
            tracing::warn!("no API key configured, kitchen endpoints are open");
        }

        let addr = format!("0.0.0.0:{}", self.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| crate::Error::Config(format!("failed to bind API server: {e}")))?;

        tracing::info!(port = self.port, "API server listening");

        axum::serve(listener, self.router())
            .await
            .map_err(|e| crate::Error::Config(format!("API server error: {e}")))?;

        Ok(())
    }
}
