use crate::model::{AttemptOutcome, CorrelationOutcome, ExecutionStatus};
use tracing::{info, warn};

pub struct CorrelationTelemetry;

impl CorrelationTelemetry {
    #[inline]
    pub fn primary_completed(
        identifier: &str,
        status: ExecutionStatus,
        duration_ms: Option<u64>,
        row_count: Option<u64>,
    ) {
        info!(
            target: "parallax_correlation",
            identifier = %identifier,
            status = ?status,
            duration_ms = duration_ms,
            row_count = row_count,
            "primary_execution_completed"
        );
    }

    /// Log a lookup being issued
    #[inline]
    pub fn attempt_issued(identifier: &str, attempt: u32, max_attempts: u32, delay_ms: u64) {
        info!(
            target: "parallax_correlation",
            identifier = %identifier,
            attempt = attempt,
            max_attempts = max_attempts,
            delay_ms = delay_ms,
            "correlation_attempt_issued"
        );
    }

    #[inline]
    pub fn attempt_outcome(identifier: &str, attempt: u32, outcome: AttemptOutcome, latency_ms: u64) {
        info!(
            target: "parallax_correlation",
            identifier = %identifier,
            attempt = attempt,
            outcome = ?outcome,
            latency_ms = latency_ms,
            "correlation_attempt_outcome"
        );
    }

    /// Log the end of the correlation loop
    #[inline]
    pub fn finished(identifier: &str, outcome: CorrelationOutcome, attempts: u32, elapsed_ms: u64) {
        info!(
            target: "parallax_correlation",
            identifier = %identifier,
            outcome = ?outcome,
            attempts = attempts,
            elapsed_ms = elapsed_ms,
            "correlation_finished"
        );
    }

    /// Server-reported duration disagrees with end - start
    #[inline]
    pub fn duration_mismatch(identifier: &str, computed_ms: u64, reported_ms: u64) {
        warn!(
            target: "parallax_correlation",
            identifier = %identifier,
            computed_ms = computed_ms,
            reported_ms = reported_ms,
            "telemetry_duration_mismatch"
        );
    }

    #[inline]
    pub fn telemetry_api_call(operation: &str, latency_ms: u64, success: bool) {
        info!(
            target: "parallax_correlation",
            operation = %operation,
            latency_ms = latency_ms,
            success = success,
            "telemetry_api_call"
        );
    }
}
