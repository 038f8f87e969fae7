//! Correlation of a primary execution with its telemetry record.
//!
//! The primary channel and the telemetry API identify an execution independently, and
//! the telemetry record usually becomes visible some time after the primary call has
//! returned. The engine runs the primary query, takes the identifier captured by the
//! hook, and polls the telemetry API with a bounded delay schedule until a terminal
//! record appears, attempts run out, or the caller deadline expires.

use crate::compare::{compare, Comparison};
use crate::events::CorrelationTelemetry;
use crate::model::{
    AttemptOutcome, ComparisonResult, CorrelationAttempt, CorrelationOutcome, ExecutionRecord,
    QueryRequest,
};
use crate::primary::PrimaryExecutionClient;
use crate::telemetry::{Lookup, TelemetryApi};
use chrono::Utc;
use parallax_common::config::CorrelationSettings;
use parallax_common::retry::RetrySchedule;
use parallax_error::{ErrorCode, ErrorContext, ParallaxError, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Correlated run plus an independent submit-and-wait execution of the same query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SideBySideReport {
    pub correlated: ComparisonResult,
    pub independent: Option<ExecutionRecord>,
    pub independent_comparison: Option<Comparison>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub independent_error: Option<ParallaxError>,
}

/// Runs one logical query at a time. Create one engine per concurrent flow.
pub struct CorrelationEngine {
    primary: PrimaryExecutionClient,
    telemetry: Arc<dyn TelemetryApi>,
    settings: CorrelationSettings,
    schedule: RetrySchedule,
    cancel: CancellationToken,
}

enum LoopEnd {
    Matched(ExecutionRecord),
    Exhausted(Option<ExecutionRecord>),
    DeadlineExceeded,
}

impl CorrelationEngine {
    pub fn new(
        primary: PrimaryExecutionClient,
        telemetry: Arc<dyn TelemetryApi>,
        settings: CorrelationSettings,
    ) -> Self {
        let schedule = RetrySchedule::from_settings(&settings.backoff);
        Self {
            primary,
            telemetry,
            settings,
            schedule,
            cancel: CancellationToken::new(),
        }
    }

    /// Share a cancellation token with the caller. Cancelling interrupts the primary call,
    /// in-flight lookups and the delays between them.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn settings(&self) -> &CorrelationSettings {
        &self.settings
    }

    /// Execute `request` on the primary channel and correlate it within the configured deadline.
    pub async fn run(&self, request: &QueryRequest) -> Result<ComparisonResult> {
        self.run_with_deadline(request, self.settings.deadline()).await
    }

    #[tracing::instrument(skip_all, fields(channel = %self.primary.channel_name()))]
    pub async fn run_with_deadline(
        &self,
        request: &QueryRequest,
        deadline: Duration,
    ) -> Result<ComparisonResult> {
        self.run_until(request, Instant::now() + deadline).await
    }

    async fn run_until(&self, request: &QueryRequest, deadline: Instant) -> Result<ComparisonResult> {
        let execution = self
            .primary
            .execute_until(request, deadline, &self.cancel)
            .await;

        if let Some(failure) = execution.failure {
            let interrupted = matches!(
                failure.code,
                ErrorCode::DeadlineExceeded | ErrorCode::QueryCancelled
            );
            if interrupted
                || !execution.record.has_identifier()
                || !self.settings.lookup_failed_executions
            {
                return Err(failure);
            }
            info!(
                identifier = %execution.record.identifier,
                "Primary execution failed; looking up its telemetry record"
            );
        }

        self.correlate(execution.record, deadline).await
    }

    /// Poll the telemetry API for the record matching `primary.identifier`.
    pub async fn correlate(
        &self,
        primary: ExecutionRecord,
        deadline: Instant,
    ) -> Result<ComparisonResult> {
        let identifier = primary.identifier.clone();
        if identifier.is_empty() {
            CorrelationTelemetry::finished("", CorrelationOutcome::SkippedNoIdentifier, 0, 0);
            return Ok(ComparisonResult::assemble(
                primary,
                None,
                0,
                CorrelationOutcome::SkippedNoIdentifier,
            ));
        }

        let started = Instant::now();
        let mut attempts: Vec<CorrelationAttempt> = Vec::new();
        let end = self
            .poll_until_terminal(&identifier, deadline, &mut attempts)
            .await;
        let attempt_count = attempts.len() as u32;
        let elapsed_ms = started.elapsed().as_millis() as u64;
        debug!(identifier = %identifier, attempts = ?attempts, "Correlation attempts");

        let (telemetry, outcome) = match end {
            Ok(LoopEnd::Matched(record)) => (Some(record), CorrelationOutcome::Matched),
            Ok(LoopEnd::Exhausted(latest)) => (latest, CorrelationOutcome::Exhausted),
            Ok(LoopEnd::DeadlineExceeded) => (None, CorrelationOutcome::DeadlineExceeded),
            Err(e) => {
                warn!(identifier = %identifier, attempts = attempt_count, error = %e, "Correlation aborted");
                return Err(with_correlation_context(e, &identifier, attempt_count, elapsed_ms));
            }
        };

        CorrelationTelemetry::finished(&identifier, outcome, attempt_count, elapsed_ms);
        Ok(ComparisonResult::assemble(primary, telemetry, attempt_count, outcome))
    }

    async fn poll_until_terminal(
        &self,
        identifier: &str,
        deadline: Instant,
        attempts: &mut Vec<CorrelationAttempt>,
    ) -> Result<LoopEnd> {
        let max_attempts = self.settings.max_attempts.max(1);
        let mut latest: Option<ExecutionRecord> = None;

        for attempt in 1..=max_attempts {
            let delay = self.schedule.delay_before(attempt);
            if Instant::now() + delay >= deadline {
                info!(
                    identifier = %identifier,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "Next lookup would start after the deadline"
                );
                return Ok(LoopEnd::DeadlineExceeded);
            }
            if !delay.is_zero() {
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = self.cancel.cancelled() => {
                        return Err(ParallaxError::new(
                            ErrorCode::QueryCancelled,
                            "Correlation cancelled between lookups",
                        ));
                    }
                }
            }

            CorrelationTelemetry::attempt_issued(
                identifier,
                attempt,
                max_attempts,
                delay.as_millis() as u64,
            );
            let issued_at_ms = Utc::now().timestamp_millis();
            let issued = Instant::now();
            let call_deadline = (issued + self.settings.per_call_timeout()).min(deadline);

            let result = tokio::select! {
                result = tokio::time::timeout_at(
                    call_deadline,
                    self.telemetry.lookup_by_identifier(identifier),
                ) => result,
                _ = self.cancel.cancelled() => {
                    return Err(ParallaxError::new(
                        ErrorCode::QueryCancelled,
                        "Correlation cancelled during a lookup",
                    ));
                }
            };

            let (outcome, step) = match result {
                Err(_) if call_deadline >= deadline => {
                    (AttemptOutcome::TransientError, Some(Ok(LoopEnd::DeadlineExceeded)))
                }
                Err(_) => {
                    warn!(identifier = %identifier, attempt, "Telemetry lookup timed out");
                    (AttemptOutcome::TransientError, None)
                }
                Ok(Ok(Lookup::NotFound)) => (AttemptOutcome::NotFound, None),
                Ok(Ok(Lookup::Found(record))) if record.status.is_terminal() => {
                    (AttemptOutcome::Found, Some(Ok(LoopEnd::Matched(record))))
                }
                Ok(Ok(Lookup::Found(record))) => {
                    debug!(identifier = %identifier, status = ?record.status, "Telemetry record not terminal yet");
                    latest = Some(record);
                    (AttemptOutcome::Found, None)
                }
                Ok(Err(e)) if e.is_transient() => {
                    warn!(identifier = %identifier, attempt, error = %e, "Transient telemetry error");
                    (AttemptOutcome::TransientError, None)
                }
                Ok(Err(e)) => (AttemptOutcome::FatalError, Some(Err(e))),
            };

            CorrelationTelemetry::attempt_outcome(
                identifier,
                attempt,
                outcome,
                issued.elapsed().as_millis() as u64,
            );
            attempts.push(CorrelationAttempt {
                attempt_number: attempt,
                issued_at_ms,
                outcome,
            });

            if let Some(step) = step {
                return step;
            }
        }

        Ok(LoopEnd::Exhausted(latest))
    }

    /// Run the correlated flow and an independent submit-and-wait execution concurrently.
    pub async fn run_side_by_side(&self, request: &QueryRequest) -> Result<SideBySideReport> {
        let deadline_after = self.settings.deadline();
        let deadline = Instant::now() + deadline_after;

        let independent_call = async {
            tokio::select! {
                result = tokio::time::timeout_at(
                    deadline,
                    self.telemetry.submit_and_wait(request, deadline_after),
                ) => result.unwrap_or_else(|_| {
                    Err(ParallaxError::deadline_exceeded(
                        "Independent execution did not finish before the deadline",
                    ))
                }),
                _ = self.cancel.cancelled() => Err(ParallaxError::new(
                    ErrorCode::QueryCancelled,
                    "Independent execution cancelled",
                )),
            }
        };

        let (correlated, independent) = tokio::join!(self.run_until(request, deadline), independent_call);
        let correlated = correlated?;

        let report = match independent {
            Ok(record) => SideBySideReport {
                independent_comparison: Some(compare(&correlated.primary, Some(&record))),
                independent: Some(record),
                independent_error: None,
                correlated,
            },
            Err(e) => {
                warn!(error = %e, "Independent execution failed");
                SideBySideReport {
                    correlated,
                    independent: None,
                    independent_comparison: None,
                    independent_error: Some(e),
                }
            }
        };
        Ok(report)
    }
}

fn with_correlation_context(
    error: ParallaxError,
    identifier: &str,
    attempts: u32,
    elapsed_ms: u64,
) -> ParallaxError {
    // Keep the HTTP detail of telemetry failures; only bare errors get correlation context.
    if error.context.is_some() {
        return error;
    }
    error.with_context(ErrorContext::Correlation {
        identifier: identifier.to_string(),
        attempts,
        elapsed_ms,
    })
}
