//! Prometheus metrics registry and instruments.
//!
//! This module is framework-agnostic and can be used from any layer.

use lazy_static::lazy_static;
use prometheus::{HistogramOpts, IntCounter, IntCounterVec, Opts, Registry};
use std::sync::Once;
use std::time::Duration;

lazy_static! {
    /// Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // Auth Metrics
    pub static ref AUTH_CALLBACKS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("foliopage_auth_callbacks_total", "OAuth callbacks by terminal outcome"),
        &["outcome"]
    ).expect("metric can be created");
    pub static ref SIGNUPS_TOTAL: IntCounter = IntCounter::new(
        "foliopage_signups_total",
        "Total number of identities created"
    ).expect("metric can be created");
    pub static ref PROVIDER_REQUEST_DURATION_SECONDS: prometheus::HistogramVec = prometheus::HistogramVec::new(
        HistogramOpts::new(
            "foliopage_provider_request_duration_seconds",
            "Identity provider request duration in seconds"
        ).buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
        &["operation", "status"]
    ).expect("metric can be created");

    // Session Metrics
    pub static ref SESSIONS_PURGED_TOTAL: IntCounter = IntCounter::new(
        "foliopage_sessions_purged_total",
        "Total number of expired sessions removed"
    ).expect("metric can be created");

    // Image Metrics
    pub static ref IMAGE_UPLOADS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("foliopage_image_uploads_total", "Stored image uploads by format"),
        &["format"]
    ).expect("metric can be created");

    // Error Metrics
    pub static ref ERRORS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("foliopage_errors_total", "Total number of errors"),
        &["error_type"]
    ).expect("metric can be created");
}

static INIT: Once = Once::new();

/// Initialize metrics registry.
///
/// Safe to call more than once; registration happens on the first call.
pub fn init_metrics() {
    INIT.call_once(|| {
        REGISTRY
            .register(Box::new(AUTH_CALLBACKS_TOTAL.clone()))
            .expect("AUTH_CALLBACKS_TOTAL can be registered");
        REGISTRY
            .register(Box::new(SIGNUPS_TOTAL.clone()))
            .expect("SIGNUPS_TOTAL can be registered");
        REGISTRY
            .register(Box::new(PROVIDER_REQUEST_DURATION_SECONDS.clone()))
            .expect("PROVIDER_REQUEST_DURATION_SECONDS can be registered");
        REGISTRY
            .register(Box::new(SESSIONS_PURGED_TOTAL.clone()))
            .expect("SESSIONS_PURGED_TOTAL can be registered");
        REGISTRY
            .register(Box::new(IMAGE_UPLOADS_TOTAL.clone()))
            .expect("IMAGE_UPLOADS_TOTAL can be registered");
        REGISTRY
            .register(Box::new(ERRORS_TOTAL.clone()))
            .expect("ERRORS_TOTAL can be registered");

        tracing::info!("Metrics registry initialized");
    });
}

/// Record one identity provider round trip.
pub fn observe_provider_request(operation: &str, status: &str, elapsed: Duration) {
    PROVIDER_REQUEST_DURATION_SECONDS
        .with_label_values(&[operation, status])
        .observe(elapsed.as_secs_f64());
}
