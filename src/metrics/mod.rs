//! Prometheus metrics.
//!
//! Exposed in text format at `/metrics`:
//! - HTTP requests by method, route and status class
//! - document store operations by collection
//! - domain writes (sales, stock movements, payments)

use axum::{
    extract::{MatchedPath, Request},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use once_cell::sync::Lazy;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::time::Instant;
use tracing::error;

pub static REGISTRY: Lazy<Registry> = Lazy::new(|| Registry::new_custom(Some("bizdesk".into()), None)
    .expect("registry can be created"));

static HTTP_REQUESTS: Lazy<IntCounterVec> = Lazy::new(|| {
    register(IntCounterVec::new(
        Opts::new("http_requests_total", "HTTP requests served"),
        &["method", "route", "status"],
    ))
});

static HTTP_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register(HistogramVec::new(
        HistogramOpts::new("http_request_duration_seconds", "HTTP request latency"),
        &["method", "route"],
    ))
});

static STORE_OPERATIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    register(IntCounterVec::new(
        Opts::new("store_operations_total", "Document store operations"),
        &["collection", "operation"],
    ))
});

static SALES_COMPLETED: Lazy<IntCounter> = Lazy::new(|| {
    register(IntCounter::new(
        "sales_completed_total",
        "Orders moved to completed (including point-of-sale checkouts)",
    ))
});

static STOCK_MOVEMENTS: Lazy<IntCounterVec> = Lazy::new(|| {
    register(IntCounterVec::new(
        Opts::new("stock_movements_total", "Stock movements recorded"),
        &["kind"],
    ))
});

static TRANSACTIONS_PAID: Lazy<IntCounter> = Lazy::new(|| {
    register(IntCounter::new(
        "financial_transactions_paid_total",
        "Financial transactions marked as paid",
    ))
});

fn register<C>(collector: prometheus::Result<C>) -> C
where
    C: prometheus::core::Collector + Clone + 'static,
{
    let collector = collector.expect("metric can be created");
    if let Err(e) = REGISTRY.register(Box::new(collector.clone())) {
        error!("failed to register metric: {}", e);
    }
    collector
}

pub fn record_store_operation(collection: &str, operation: &str) {
    STORE_OPERATIONS
        .with_label_values(&[collection, operation])
        .inc();
}

pub fn record_sale_completed() {
    SALES_COMPLETED.inc();
}

pub fn record_stock_movement(kind: &str) {
    STOCK_MOVEMENTS.with_label_values(&[kind]).inc();
}

pub fn record_transaction_paid() {
    TRANSACTIONS_PAID.inc();
}

fn status_class(status: StatusCode) -> &'static str {
    match status.as_u16() {
        100..=199 => "1xx",
        200..=299 => "2xx",
        300..=399 => "3xx",
        400..=499 => "4xx",
        _ => "5xx",
    }
}

/// Middleware recording request count and latency per matched route
pub async fn track_http_metrics(request: Request, next: Next) -> Response {
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());
    let method = request.method().to_string();
    let start = Instant::now();

    let response = next.run(request).await;

    HTTP_DURATION
        .with_label_values(&[&method, &route])
        .observe(start.elapsed().as_secs_f64());
    HTTP_REQUESTS
        .with_label_values(&[&method, &route, status_class(response.status())])
        .inc();

    response
}

/// Renders the registry in Prometheus text format
pub fn render() -> Result<String, prometheus::Error> {
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&REGISTRY.gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}

pub async fn metrics_handler() -> Response {
    match render() {
        Ok(body) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => {
            error!("failed to encode metrics: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_operations_show_up_in_output() {
        record_store_operation("customers", "insert");
        record_stock_movement("entry");
        let text = render().unwrap();
        assert!(text.contains("bizdesk_store_operations_total"));
        assert!(text.contains("collection=\"customers\""));
        assert!(text.contains("bizdesk_stock_movements_total"));
    }

    #[test]
    fn status_classes() {
        assert_eq!(status_class(StatusCode::OK), "2xx");
        assert_eq!(status_class(StatusCode::NOT_FOUND), "4xx");
        assert_eq!(status_class(StatusCode::BAD_GATEWAY), "5xx");
    }
}
