//! Prometheus metrics endpoint and request instrumentation

use std::time::Instant;

use axum::{
    Router,
    extract::Request,
    http::{StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
    routing::get,
};
use prometheus::{Encoder, TextEncoder};

use crate::metrics::{HTTP_REQUEST_DURATION_SECONDS, HTTP_REQUESTS_TOTAL, REGISTRY};

/// Returns all metrics in Prometheus text format.
async fn metrics_handler() -> Response {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();

    match encoder.encode_to_string(&metric_families) {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, encoder.format_type().to_string())],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to encode metrics").into_response()
        }
    }
}

/// Exposes `/metrics`
pub fn metrics_router<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new().route("/metrics", get(metrics_handler))
}

/// Middleware recording request count and latency
pub async fn track_http_metrics(request: Request, next: Next) -> Response {
    let method = request.method().as_str().to_string();
    let started = Instant::now();

    let response = next.run(request).await;

    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[method.as_str()])
        .observe(started.elapsed().as_secs_f64());
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method.as_str(), response.status().as_str()])
        .inc();
    response
}
