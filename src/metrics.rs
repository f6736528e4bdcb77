//! Gateway Metrics
//!
//! Call, failure and latency metrics for every gateway operation. Emitted
//! through the `metrics` facade; installing a recorder/exporter is left to
//! the embedding application.

use std::time::Duration;

pub const CALLS_TOTAL: &str = "sena_geo_gateway_calls_total";
pub const FAILURES_TOTAL: &str = "sena_geo_gateway_failures_total";
pub const CALL_DURATION_SECONDS: &str = "sena_geo_gateway_call_duration_seconds";

/// Metrics collection for the Remote Data Gateway
pub struct GatewayMetrics;

impl GatewayMetrics {
    /// Register metric descriptions with the installed recorder
    pub fn register_metrics() {
        ::metrics::describe_counter!(CALLS_TOTAL, "Gateway operations started, by operation");
        ::metrics::describe_counter!(
            FAILURES_TOTAL,
            "Gateway operations that returned an error, by operation and error kind"
        );
        ::metrics::describe_histogram!(
            CALL_DURATION_SECONDS,
            ::metrics::Unit::Seconds,
            "Wall time of gateway operations, by operation"
        );
    }

    pub fn record_call(operation: &'static str, elapsed: Duration) {
        ::metrics::counter!(CALLS_TOTAL, "operation" => operation).increment(1);
        ::metrics::histogram!(CALL_DURATION_SECONDS, "operation" => operation)
            .record(elapsed.as_secs_f64());
    }

    pub fn record_failure(operation: &'static str, kind: &'static str) {
        ::metrics::counter!(FAILURES_TOTAL, "operation" => operation, "kind" => kind).increment(1);
    }
}
