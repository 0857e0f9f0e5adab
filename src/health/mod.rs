/*!
 * # Health Check Module
 *
 * - Basic health check (`/health`) - cached up/down status
 * - Readiness check (`/health/ready`) - pings the document store
 * - Liveness check (`/health/live`) - process is alive
 * - Detailed health check (`/health/details`) - per component status
 */

use crate::store::SharedStore;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::RwLock;
use tracing::{debug, error, warn};

const CHECK_INTERVAL: Duration = Duration::from_secs(30);

/// Basic health status
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Up,
    Down,
    Degraded,
}

impl HealthStatus {
    fn status_code(self) -> StatusCode {
        match self {
            HealthStatus::Up | HealthStatus::Degraded => StatusCode::OK,
            HealthStatus::Down => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

/// Health check detail
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct HealthDetail {
    pub status: HealthStatus,
    pub message: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Overall health information
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct HealthInfo {
    pub status: HealthStatus,
    pub version: String,
    pub timestamp: DateTime<Utc>,
    pub uptime_seconds: u64,
    pub details: HashMap<String, HealthDetail>,
}

/// Health check state
#[derive(Clone)]
pub struct HealthState {
    pub store: SharedStore,
    pub health_cache: Arc<RwLock<HealthInfo>>,
    pub start_time: SystemTime,
}

impl HealthState {
    pub fn new(store: SharedStore) -> Self {
        Self {
            store,
            health_cache: Arc::new(RwLock::new(HealthInfo {
                status: HealthStatus::Up,
                version: env!("CARGO_PKG_VERSION").to_string(),
                timestamp: Utc::now(),
                uptime_seconds: 0,
                details: HashMap::new(),
            })),
            start_time: SystemTime::now(),
        }
    }

    /// Calculate system uptime
    pub fn uptime(&self) -> u64 {
        SystemTime::now()
            .duration_since(self.start_time)
            .unwrap_or(Duration::from_secs(0))
            .as_secs()
    }

    /// Update health status
    pub async fn update_health(&self) {
        let store_detail = match self.store.ping().await {
            Ok(()) => HealthDetail {
                status: HealthStatus::Up,
                message: Some(self.store.backend().to_string()),
                timestamp: Utc::now(),
            },
            Err(e) => {
                error!("Document store health check failed: {}", e);
                HealthDetail {
                    status: HealthStatus::Down,
                    message: Some(e.to_string()),
                    timestamp: Utc::now(),
                }
            }
        };

        let mut health = self.health_cache.write().await;
        health.timestamp = Utc::now();
        health.uptime_seconds = self.uptime();
        health.details.insert("store".to_string(), store_detail);

        let any_down = health
            .details
            .values()
            .any(|detail| detail.status == HealthStatus::Down);
        let any_degraded = health
            .details
            .values()
            .any(|detail| detail.status == HealthStatus::Degraded);

        health.status = if any_down {
            HealthStatus::Down
        } else if any_degraded {
            HealthStatus::Degraded
        } else {
            HealthStatus::Up
        };
    }
}

/// Returns build and version information
pub async fn version_info() -> impl IntoResponse {
    Json(json!({
        "version": env!("CARGO_PKG_VERSION"),
        "commit": option_env!("GIT_HASH").unwrap_or("unknown"),
        "built": option_env!("BUILD_TIME").unwrap_or("unknown"),
    }))
}

/// Basic health check endpoint
pub async fn health_check(State(state): State<Arc<HealthState>>) -> impl IntoResponse {
    debug!("Health check endpoint called");
    let health = state.health_cache.read().await;

    (
        health.status.status_code(),
        Json(json!({
            "status": health.status,
            "version": health.version,
            "timestamp": health.timestamp,
        })),
    )
}

/// Readiness check endpoint
pub async fn readiness_check(State(state): State<Arc<HealthState>>) -> impl IntoResponse {
    state.update_health().await;
    let health = state.health_cache.read().await;

    (
        health.status.status_code(),
        Json(json!({
            "ready": health.status == HealthStatus::Up,
            "timestamp": health.timestamp,
        })),
    )
}

/// Liveness check endpoint
pub async fn liveness_check(State(state): State<Arc<HealthState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({
            "alive": true,
            "uptime_seconds": state.uptime(),
            "timestamp": Utc::now(),
        })),
    )
}

/// Detailed health check endpoint
pub async fn detailed_health(State(state): State<Arc<HealthState>>) -> impl IntoResponse {
    state.update_health().await;
    let health = state.health_cache.read().await;
    (health.status.status_code(), Json(health.clone()))
}

/// Run periodic health checks
pub async fn run_health_checker(state: Arc<HealthState>) {
    let mut interval = tokio::time::interval(CHECK_INTERVAL);

    loop {
        interval.tick().await;
        state.update_health().await;

        let health = state.health_cache.read().await;
        if health.status != HealthStatus::Up {
            warn!("System health is not optimal: {:?}", health.status);

            for (name, detail) in &health.details {
                if detail.status != HealthStatus::Up {
                    warn!("Component {name} is not healthy: {:?}", detail.status);
                }
            }
        }
    }
}

/// Health endpoints; also starts the background checker
pub fn health_routes_with_state<S>(store: SharedStore) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    let state = Arc::new(HealthState::new(store));
    tokio::spawn(run_health_checker(state.clone()));

    Router::new()
        .route("/", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/live", get(liveness_check))
        .route("/details", get(detailed_health))
        .route("/version", get(version_info))
        .with_state(state)
}
