//! bizdesk library
//!
//! Business management backend: customers, suppliers, products and stock,
//! sales and point of sale, quotes, CRM, finance, projects and the desktop
//! shell bridge, served over one axum router.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod health;
pub mod logging;
pub mod metrics;
pub mod migrator;
pub mod models;
pub mod openapi;
pub mod services;
pub mod shell;
pub mod store;
pub mod tracing;
pub mod validation;

use axum::{response::Json, routing::get, Extension, Router};
use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};
use slog::Logger;
use std::sync::Arc;
use tokio::sync::mpsc;
use utoipa::ToSchema;

use crate::auth::{AuthConfig, AuthService};
use crate::config::AppConfig;
use crate::events::{Event, EventSender};
use crate::services::Services;
use crate::shell::Shell;
use crate::store::SharedStore;
use crate::validation::PostalCodeLookup;

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: SharedStore,
    pub services: Services,
    pub auth: Arc<AuthService>,
    pub shell: Arc<Shell>,
    pub event_sender: Arc<EventSender>,
}

impl AppState {
    /// Wires every service over one store. The returned receiver must be
    /// drained, normally by spawning [`events::process_events`].
    pub fn new(
        config: AppConfig,
        store: SharedStore,
        postal_lookup: Arc<dyn PostalCodeLookup>,
        shell: Arc<Shell>,
        logger: &Logger,
    ) -> (Self, mpsc::Receiver<Event>) {
        let (event_tx, event_rx) = mpsc::channel(config.event_channel_capacity);
        let event_sender = Arc::new(EventSender::new(event_tx));
        let services = Services::new(store.clone(), event_sender.clone(), postal_lookup, logger);
        let auth = Arc::new(AuthService::new(
            AuthConfig::from(&config),
            services.users.clone(),
        ));

        let state = Self {
            config: Arc::new(config),
            store,
            services,
            auth,
            shell,
            event_sender,
        };
        (state, event_rx)
    }
}

// Common response wrappers
#[derive(Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
    pub errors: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<ResponseMeta>,
}

#[derive(Serialize, ToSchema)]
pub struct ResponseMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub timestamp: String,
}

impl ResponseMeta {
    fn capture() -> Self {
        Self {
            request_id: crate::tracing::current_request_id().map(|rid| rid.as_str().to_string()),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            errors: None,
            meta: Some(ResponseMeta::capture()),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message),
            errors: None,
            meta: Some(ResponseMeta::capture()),
        }
    }
}

#[cfg(test)]
mod response_tests {
    use super::*;
    use chrono::DateTime;

    #[tokio::test]
    async fn success_response_includes_request_metadata() {
        let response =
            crate::tracing::scope_request_id(crate::tracing::RequestId::new("meta-123"), async {
                ApiResponse::success("ok")
            })
            .await;

        let meta = response.meta.expect("metadata expected");
        assert_eq!(meta.request_id.as_deref(), Some("meta-123"));
        DateTime::parse_from_rfc3339(&meta.timestamp).expect("timestamp should parse");
    }

    #[tokio::test]
    async fn error_response_includes_request_metadata() {
        let response =
            crate::tracing::scope_request_id(crate::tracing::RequestId::new("meta-err"), async {
                ApiResponse::<()>::error("oops".into())
            })
            .await;

        let meta = response.meta.expect("metadata expected");
        assert_eq!(meta.request_id.as_deref(), Some("meta-err"));
        assert!(!meta.timestamp.is_empty());
    }
}

/// Every `/api/v1` resource, each gated by its own permissions
pub fn api_v1_routes() -> Router<AppState> {
    Router::new()
        .route("/status", get(api_status))
        .merge(handlers::customers::routes())
        .merge(handlers::suppliers::routes())
        .merge(handlers::products::routes())
        .merge(handlers::stock::routes())
        .merge(handlers::orders::routes())
        .merge(handlers::pos::routes())
        .merge(handlers::quotes::routes())
        .merge(handlers::crm::routes())
        .merge(handlers::finance::routes())
        .merge(handlers::projects::routes())
        .merge(handlers::dashboard::routes())
}

/// The whole application minus the transport layers (CORS, compression,
/// timeouts) that `main` adds from configuration.
pub fn app_router(state: AppState) -> Router {
    let mut app = Router::<AppState>::new()
        .route("/", get(|| async { "bizdesk up" }))
        .route("/metrics", get(metrics::metrics_handler))
        .nest("/api/v1", api_v1_routes())
        .nest(
            "/auth",
            auth::auth_routes().with_state(state.auth.clone()),
        )
        .nest(
            "/health",
            health::health_routes_with_state(state.store.clone()),
        );

    if state.config.shell_enabled {
        app = app.nest("/shell", handlers::shell::routes());
    }

    app.merge(openapi::swagger_ui())
        .layer(axum::middleware::from_fn(shell::write_feedback_middleware))
        .layer(axum::middleware::from_fn(metrics::track_http_metrics))
        .layer(crate::tracing::configure_http_tracing())
        // Inject AuthService and Shell into request extensions for the middleware
        .layer(Extension(state.auth.clone()))
        .layer(Extension(state.shell.clone()))
        // Ensure every request carries a request id for traceability
        .layer(axum::middleware::from_fn(
            crate::tracing::request_id_middleware,
        ))
        .with_state(state)
}

async fn api_status() -> Json<ApiResponse<Value>> {
    let status_data = json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "git": option_env!("GIT_HASH").unwrap_or("unknown"),
        "service": "bizdesk",
        "timestamp": Utc::now().to_rfc3339(),
    });

    Json(ApiResponse::success(status_data))
}
