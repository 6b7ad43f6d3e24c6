//! Prometheus metrics registry and instruments.
//!
//! This module is framework-agnostic and can be used from any layer.

use std::sync::Once;

use lazy_static::lazy_static;
use prometheus::{HistogramOpts, IntCounterVec, IntGauge, Opts, Registry, core::Collector};

lazy_static! {
    /// Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // HTTP Metrics
    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("cinedash_http_requests_total", "Total number of HTTP requests"),
        &["method", "status"]
    ).expect("metric can be created");
    pub static ref HTTP_REQUEST_DURATION_SECONDS: prometheus::HistogramVec = prometheus::HistogramVec::new(
        HistogramOpts::new(
            "cinedash_http_request_duration_seconds",
            "HTTP request duration in seconds"
        ).buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
        &["method"]
    ).expect("metric can be created");

    // Cache Metrics
    pub static ref CACHE_HITS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("cinedash_cache_hits_total", "Total number of cache hits"),
        &["namespace"]
    ).expect("metric can be created");
    pub static ref CACHE_MISSES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("cinedash_cache_misses_total", "Total number of cache misses"),
        &["namespace"]
    ).expect("metric can be created");
    pub static ref CACHE_ERRORS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("cinedash_cache_errors_total", "Total number of swallowed cache failures"),
        &["namespace", "operation"]
    ).expect("metric can be created");
    pub static ref CACHE_INVALIDATIONS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("cinedash_cache_invalidations_total", "Total number of cache invalidation targets applied"),
        &["namespace", "scope"]
    ).expect("metric can be created");

    // Notification Metrics
    pub static ref PUSH_DELIVERIES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("cinedash_push_deliveries_total", "Total number of push delivery attempts"),
        &["outcome"]
    ).expect("metric can be created");
    pub static ref REALTIME_EMITS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("cinedash_realtime_emits_total", "Total number of realtime events emitted"),
        &["scope"]
    ).expect("metric can be created");
    pub static ref REALTIME_LISTENERS: IntGauge = IntGauge::new(
        "cinedash_realtime_listeners",
        "Current number of connected realtime listeners"
    ).expect("metric can be created");

    // Error Metrics
    pub static ref ERRORS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("cinedash_errors_total", "Total number of errors"),
        &["error_type"]
    ).expect("metric can be created");
}

static INIT: Once = Once::new();

/// Initialize metrics registry.
///
/// Safe to call more than once; registration happens on the first call.
pub fn init_metrics() {
    INIT.call_once(|| {
        let collectors: Vec<(&str, Box<dyn Collector>)> = vec![
            ("HTTP_REQUESTS_TOTAL", Box::new(HTTP_REQUESTS_TOTAL.clone())),
            (
                "HTTP_REQUEST_DURATION_SECONDS",
                Box::new(HTTP_REQUEST_DURATION_SECONDS.clone()),
            ),
            ("CACHE_HITS_TOTAL", Box::new(CACHE_HITS_TOTAL.clone())),
            ("CACHE_MISSES_TOTAL", Box::new(CACHE_MISSES_TOTAL.clone())),
            ("CACHE_ERRORS_TOTAL", Box::new(CACHE_ERRORS_TOTAL.clone())),
            (
                "CACHE_INVALIDATIONS_TOTAL",
                Box::new(CACHE_INVALIDATIONS_TOTAL.clone()),
            ),
            ("PUSH_DELIVERIES_TOTAL", Box::new(PUSH_DELIVERIES_TOTAL.clone())),
            ("REALTIME_EMITS_TOTAL", Box::new(REALTIME_EMITS_TOTAL.clone())),
            ("REALTIME_LISTENERS", Box::new(REALTIME_LISTENERS.clone())),
            ("ERRORS_TOTAL", Box::new(ERRORS_TOTAL.clone())),
        ];

        for (name, collector) in collectors {
            if let Err(e) = REGISTRY.register(collector) {
                tracing::warn!(metric = name, error = %e, "Failed to register metric");
            }
        }

        tracing::info!("Metrics registry initialized");
    });
}
