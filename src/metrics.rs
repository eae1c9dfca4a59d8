//! Prometheus metrics for the webhook
//!
//! A single histogram tracks upstream OpenFGA `Check` latency; the registry
//! is exposed in text format on the metrics bind address.

use axum::routing::get;
use axum::Router;
use once_cell::sync::Lazy;
use prometheus::{Encoder, Histogram, HistogramOpts, Registry, TextEncoder};
use tracing::error;

/// Registry backing the `/metrics` endpoint
pub static REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

/// Histogram of OpenFGA `Check` RPC durations, default buckets
pub static OPENFGA_LATENCY: Lazy<Histogram> = Lazy::new(|| {
    let histogram = Histogram::with_opts(HistogramOpts::new(
        "openfga_request_duration_seconds",
        "A histogram of the gRPC request durations to OpenFGA in seconds.",
    ))
    .expect("valid histogram opts");
    REGISTRY
        .register(Box::new(histogram.clone()))
        .expect("histogram registers once");
    histogram
});

/// Create the metrics router serving `GET /metrics`
pub fn metrics_router() -> Router {
    // registration happens on first use; force it so the histogram shows up
    // before the first check
    Lazy::force(&OPENFGA_LATENCY);
    Router::new().route("/metrics", get(metrics_handler))
}

async fn metrics_handler() -> String {
    let mut buf = Vec::new();
    if let Err(e) = TextEncoder::new().encode(&REGISTRY.gather(), &mut buf) {
        error!(error = %e, "Failed to encode metrics");
        return String::new();
    }
    String::from_utf8(buf).unwrap_or_default()
}
