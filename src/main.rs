use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Context;
use axum::http::HeaderValue;
use tokio::signal;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
};
use tracing::{error, info};

use bizdesk as app;
use app::store::{MemoryStore, SharedStore, SqlStore};
use app::validation::{DisabledLookup, PostalCodeLookup, ViaCepLookup};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = app::config::load_config().context("failed to load configuration")?;
    app::config::init_tracing(cfg.log_level(), cfg.log_json);
    let base_logger = app::logging::setup_logger(app::logging::LoggerConfig::default());

    // Document store
    let store: SharedStore = if cfg.uses_memory_store() {
        info!("Using in-memory document store; data is lost on exit");
        Arc::new(MemoryStore::new())
    } else {
        let db_pool = app::db::establish_connection_from_app_config(&cfg)
            .await
            .context("failed to connect to the database")?;
        if cfg.auto_migrate {
            app::db::run_migrations(&db_pool).await.map_err(|e| {
                error!("Failed running migrations: {}", e);
                e
            })?;
        }
        Arc::new(SqlStore::new(Arc::new(db_pool)))
    };

    // Postal code lookup
    let postal_lookup: Arc<dyn PostalCodeLookup> = match cfg.postal_code_lookup_url.as_deref() {
        Some(url) if !url.trim().is_empty() => Arc::new(ViaCepLookup::new(
            url,
            Duration::from_secs(cfg.postal_code_lookup_timeout_secs),
        )?),
        _ => {
            info!("Postal code lookup not configured; lookups will be rejected");
            Arc::new(DisabledLookup)
        }
    };

    let shell = Arc::new(app::shell::Shell::headless());
    let (state, event_rx) = app::AppState::new(
        cfg.clone(),
        store,
        postal_lookup,
        shell.clone(),
        &base_logger,
    );
    tokio::spawn(app::events::process_events(event_rx, Some(shell)));

    // Build CORS layer from config
    let configured_origins: Option<Vec<HeaderValue>> = cfg
        .cors_allowed_origins
        .as_ref()
        .map(|raw| {
            raw.split(',')
                .filter_map(|origin| {
                    let trimmed = origin.trim();
                    if trimmed.is_empty() {
                        None
                    } else {
                        HeaderValue::from_str(trimmed).ok()
                    }
                })
                .collect::<Vec<_>>()
        })
        .filter(|origins| !origins.is_empty());

    let cors_layer = if let Some(origins) = configured_origins {
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    } else if cfg.should_allow_permissive_cors() {
        info!(
            "Using permissive CORS because explicit origins were not configured ({})",
            if cfg.is_development() {
                "development environment"
            } else {
                "explicit override enabled"
            }
        );
        CorsLayer::permissive()
    } else {
        anyhow::bail!(
            "Missing CORS configuration: set APP__CORS_ALLOWED_ORIGINS or APP__CORS_ALLOW_ANY_ORIGIN=true"
        );
    };

    let app = app::app_router(state)
        .layer(TimeoutLayer::new(Duration::from_secs(cfg.request_timeout_secs)))
        .layer(CompressionLayer::new())
        .layer(cors_layer);

    // Bind and serve
    let addr: SocketAddr = format!("{}:{}", cfg.host, cfg.port)
        .parse()
        .with_context(|| format!("invalid listen address {}:{}", cfg.host, cfg.port))?;
    info!("bizdesk listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm =
            signal(SignalKind::terminate()).expect("failed to install signal handler");
        sigterm.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
