// Web boundary - axum router, shared state, error responses

mod handlers;
mod pages;

use crate::auth::SessionStore;
use crate::certificate::QrEncoder;
use crate::config::Config;
use crate::error::{CertError, Result};
use crate::store::Stores;
use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Redirect, Response},
    routing::{any, get},
    Json, Router,
};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

pub const SESSION_COOKIE: &str = "sessionid";

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub stores: Arc<Stores>,
    pub sessions: Arc<SessionStore>,
    pub encoder: Arc<dyn QrEncoder>,
    /// Overrides the `Host`-derived base for absolute links
    pub public_url: Option<String>,
}

impl AppState {
    pub fn new(stores: Stores, sessions: SessionStore, encoder: Arc<dyn QrEncoder>) -> Self {
        Self {
            stores: Arc::new(stores),
            sessions: Arc::new(sessions),
            encoder,
            public_url: None,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let stores = Stores::open(
            &config.primary_db,
            &config.secondary_db,
            config.routing.clone(),
        )?;
        let sessions = SessionStore::new(chrono::Duration::minutes(config.session_ttl_minutes));

        let mut state = Self::new(stores, sessions, Arc::new(config.qr_encoder()));
        state.public_url = config.public_url.clone();
        Ok(state)
    }
}

/// API Response wrapper
#[derive(Serialize)]
pub struct ApiResponse<T> {
    success: bool,
    data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
            error: None,
        }
    }
}

impl ApiResponse<()> {
    pub fn err(message: String) -> Self {
        Self {
            success: false,
            data: (),
            error: Some(message),
        }
    }
}

impl IntoResponse for CertError {
    fn into_response(self) -> Response {
        if let CertError::MethodNotAllowed { allowed } = &self {
            return (StatusCode::METHOD_NOT_ALLOWED, [(header::ALLOW, *allowed)]).into_response();
        }

        if !self.is_recoverable() {
            error!("request failed: {}", self);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::err("Internal server error".to_string())),
            )
                .into_response();
        }

        let status = match &self {
            CertError::NotFound { .. } => StatusCode::NOT_FOUND,
            CertError::AuthFailure => StatusCode::UNAUTHORIZED,
            _ => StatusCode::BAD_REQUEST,
        };
        (status, Json(ApiResponse::err(self.to_string()))).into_response()
    }
}

pub fn router(state: AppState, static_dir: &Path) -> Router {
    let api_routes = Router::new()
        .route("/health", get(handlers::health_check))
        .route("/owners", get(handlers::api_owners))
        .route("/owners/:id", get(handlers::api_owner));

    Router::new()
        .route("/", get(|| async { Redirect::to("/login/") }))
        .route("/login/", get(handlers::login_page).post(handlers::login_submit))
        .route("/home/", get(handlers::home_page).post(handlers::home_submit))
        .route("/success/", get(handlers::success_page))
        .route("/logout/", any(handlers::logout))
        .route("/search/", get(handlers::search_page).post(handlers::search_submit))
        .route("/certificate/:id/", get(handlers::certificate_page))
        .route("/user_data/:user_id/", get(handlers::user_data_page))
        .nest("/api", api_routes)
        .nest_service("/static", ServeDir::new(static_dir))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind and serve until Ctrl+C / SIGTERM
pub async fn serve(config: Config) -> Result<()> {
    info!("Initializing state...");
    let state = AppState::from_config(&config)?;
    let app = router(state, &config.static_dir);

    let address = config.bind_address();
    let listener = TcpListener::bind(&address).await?;
    info!("Server running on http://{address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                error!("Failed to install signal handler: {e}");
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
