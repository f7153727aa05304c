//! Metrics definitions for the grain host.
//!
//! All metrics follow Prometheus naming conventions:
//! - `grain_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded:
//! - `outcome`: `accepted` or one `AuthError` label (9 values)
//! - `result`: `hit`, `miss`, `stale`, `invalidated` (4 values)
//! - `status`: `active`, `inactive`, `transport_error`, `authority_error` (4 values)
//! - `method`: bounded by message types compiled into the host

use metrics::{counter, histogram};
use std::time::Duration;

/// Record the outcome of one `validate` call.
///
/// Metric: `grain_token_validations_total`
/// Labels: `outcome`
pub fn record_token_validation(outcome: &'static str) {
    counter!("grain_token_validations_total", "outcome" => outcome).increment(1);
}

/// Record a validation cache lookup or invalidation.
///
/// Metric: `grain_token_cache_total`
/// Labels: `result`
pub fn record_cache_event(result: &'static str) {
    counter!("grain_token_cache_total", "result" => result).increment(1);
}

/// Record one introspection round trip.
///
/// Metric: `grain_introspection_requests_total`, `grain_introspection_duration_seconds`
/// Labels: `status`
pub fn record_introspection(status: &'static str, duration: Duration) {
    histogram!("grain_introspection_duration_seconds", "status" => status)
        .record(duration.as_secs_f64());
    counter!("grain_introspection_requests_total", "status" => status).increment(1);
}

/// Record a call that went through the access-token filter.
///
/// Metric: `grain_filtered_calls_total`
/// Labels: `method`, `outcome`
pub fn record_filtered_call(method: &'static str, outcome: &'static str) {
    counter!("grain_filtered_calls_total", "method" => method, "outcome" => outcome)
        .increment(1);
}
