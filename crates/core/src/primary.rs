//! Primary execution through a client-driver channel.
//!
//! The channel is abstracted behind [`PrimaryChannel`] so the engine does not depend on
//! any particular wire protocol. Implementations must fire the [`IdentifierHook`] at most
//! once, before or while `submit` returns.

use crate::events::CorrelationTelemetry;
use crate::hook::{IdentifierHook, IdentifierSlot};
use crate::model::{ExecutionRecord, ExecutionStatus, Origin, QueryRequest, TimingBasis};
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use chrono::Utc;
use parallax_error::{ErrorCode, ErrorContext, ParallaxError, Result};
use std::sync::Arc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Stream of result batches for a submitted query.
#[async_trait]
pub trait ResultHandle: Send {
    /// Column count if known before the first batch.
    fn column_count(&self) -> Option<usize> {
        None
    }

    async fn next_batch(&mut self) -> Result<Option<RecordBatch>>;
}

#[async_trait]
pub trait PrimaryChannel: Send + Sync {
    fn name(&self) -> &str;

    async fn submit(
        &self,
        request: &QueryRequest,
        hook: IdentifierHook,
    ) -> Result<Box<dyn ResultHandle>>;
}

/// Outcome of one primary execution. The record is present even on failure so that a
/// captured identifier is never lost.
#[derive(Debug, Clone)]
pub struct PrimaryExecution {
    pub record: ExecutionRecord,
    pub failure: Option<ParallaxError>,
}

impl PrimaryExecution {
    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }
}

pub struct PrimaryExecutionClient {
    channel: Arc<dyn PrimaryChannel>,
}

impl PrimaryExecutionClient {
    pub fn new(channel: Arc<dyn PrimaryChannel>) -> Self {
        Self { channel }
    }

    pub fn channel_name(&self) -> &str {
        self.channel.name()
    }

    /// Submit, time and fully drain a query.
    pub async fn execute(&self, request: &QueryRequest) -> PrimaryExecution {
        self.run(request, None, None).await
    }

    /// Like [`execute`](Self::execute), but gives up at `deadline` or when `cancel` fires.
    /// An identifier captured before the interruption is kept on the record and the failure.
    pub async fn execute_until(
        &self,
        request: &QueryRequest,
        deadline: Instant,
        cancel: &CancellationToken,
    ) -> PrimaryExecution {
        self.run(request, Some(deadline), Some(cancel)).await
    }

    #[tracing::instrument(skip_all, fields(channel = %self.channel.name()))]
    async fn run(
        &self,
        request: &QueryRequest,
        deadline: Option<Instant>,
        cancel: Option<&CancellationToken>,
    ) -> PrimaryExecution {
        let (hook, slot) = IdentifierHook::new();

        let mut record = ExecutionRecord::new(Origin::Primary, "", ExecutionStatus::Running);
        record.timing_basis = TimingBasis::ClientClock;
        record.observed_start_ms = Some(Utc::now().timestamp_millis());
        let started = Instant::now();

        let (failure, interrupted) = tokio::select! {
            failure = self.submit_and_drain(request, hook, &slot, &mut record, started) => (failure, false),
            err = interruption(deadline, cancel) => (Some(err), true),
        };

        if record.observed_end_ms.is_none() {
            record.observed_end_ms = Some(Utc::now().timestamp_millis());
        }
        record.drain_end_ms = Some(Utc::now().timestamp_millis());
        record.drain_duration_ms = Some(started.elapsed().as_millis() as u64);
        // Some channels only learn the identifier while streaming.
        if record.identifier.is_empty() {
            record.identifier = slot.identifier();
        }

        let failure = failure.map(|e| {
            record.status = match e.code {
                ErrorCode::QueryCancelled => ExecutionStatus::Cancelled,
                ErrorCode::DeadlineExceeded if interrupted => ExecutionStatus::Unknown,
                _ => ExecutionStatus::Failed,
            };
            record.error_detail = Some(e.message.clone());
            warn!(identifier = %record.identifier, error = %e, "Primary execution failed");
            execution_failure(e, &record.identifier, self.channel.name())
        });

        CorrelationTelemetry::primary_completed(
            &record.identifier,
            record.status,
            record.duration_ms,
            record.row_count,
        );

        PrimaryExecution { record, failure }
    }

    async fn submit_and_drain(
        &self,
        request: &QueryRequest,
        hook: IdentifierHook,
        slot: &IdentifierSlot,
        record: &mut ExecutionRecord,
        started: Instant,
    ) -> Option<ParallaxError> {
        let submitted = self.channel.submit(request, hook).await;

        record.observed_end_ms = Some(Utc::now().timestamp_millis());
        record.duration_ms = Some(started.elapsed().as_millis() as u64);
        record.identifier = slot.identifier();

        let mut handle = match submitted {
            Ok(handle) => handle,
            Err(e) => return Some(e),
        };
        match drain(handle.as_mut()).await {
            Ok((rows, columns)) => {
                record.row_count = Some(rows);
                record.column_count = columns.or(handle.column_count()).map(|c| c as u64);
                record.status = ExecutionStatus::Succeeded;
                None
            }
            Err(e) => Some(e),
        }
    }
}

async fn interruption(deadline: Option<Instant>, cancel: Option<&CancellationToken>) -> ParallaxError {
    let expired = async {
        match deadline {
            Some(deadline) => tokio::time::sleep_until(deadline).await,
            None => std::future::pending().await,
        }
    };
    let cancelled = async {
        match cancel {
            Some(cancel) => cancel.cancelled().await,
            None => std::future::pending().await,
        }
    };
    tokio::select! {
        _ = expired => ParallaxError::deadline_exceeded(
            "Deadline expired before the primary execution completed",
        ),
        _ = cancelled => ParallaxError::new(
            ErrorCode::QueryCancelled,
            "Primary execution cancelled",
        ),
    }
}

async fn drain(handle: &mut dyn ResultHandle) -> Result<(u64, Option<usize>)> {
    let mut rows = 0u64;
    let mut columns = handle.column_count();
    let mut batches = 0usize;
    while let Some(batch) = handle.next_batch().await? {
        rows += batch.num_rows() as u64;
        columns.get_or_insert(batch.num_columns());
        batches += 1;
    }
    debug!(rows, batches, "Drained primary result set");
    Ok((rows, columns))
}

/// Channel failures surface as `ExecutionFailed`, keeping the channel's own code in the
/// message. Cancellation and deadline expiry keep their codes.
fn execution_failure(source: ParallaxError, identifier: &str, engine: &str) -> ParallaxError {
    let (code, message) = match source.code {
        ErrorCode::QueryCancelled | ErrorCode::DeadlineExceeded | ErrorCode::ExecutionFailed => {
            (source.code, source.message)
        }
        other => (
            ErrorCode::ExecutionFailed,
            format!("{} ({})", source.message, other),
        ),
    };
    let mut error = ParallaxError::new(code, message).with_context(ErrorContext::Execution {
        identifier: identifier.to_string(),
        engine: Some(engine.to_string()),
    });
    error.hint = source.hint;
    error.trace_id = source.trace_id;
    error
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::Int64Array;
    use arrow::datatypes::{DataType, Field, Schema};
    use std::collections::VecDeque;

    struct VecHandle {
        batches: VecDeque<Result<RecordBatch>>,
    }

    #[async_trait]
    impl ResultHandle for VecHandle {
        async fn next_batch(&mut self) -> Result<Option<RecordBatch>> {
            self.batches.pop_front().transpose()
        }
    }

    struct ScriptedChannel {
        identifier: Option<&'static str>,
        batches: Vec<Result<RecordBatch>>,
        submit_error: Option<ParallaxError>,
    }

    #[async_trait]
    impl PrimaryChannel for ScriptedChannel {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn submit(
            &self,
            _request: &QueryRequest,
            hook: IdentifierHook,
        ) -> Result<Box<dyn ResultHandle>> {
            if let Some(id) = self.identifier {
                hook.capture(id);
            }
            if let Some(e) = &self.submit_error {
                return Err(e.clone());
            }
            Ok(Box::new(VecHandle {
                batches: self.batches.clone().into_iter().collect(),
            }))
        }
    }

    fn batch(rows: i64) -> RecordBatch {
        let schema = Arc::new(Schema::new(vec![
            Field::new("a", DataType::Int64, false),
            Field::new("b", DataType::Int64, false),
        ]));
        RecordBatch::try_new(
            schema,
            vec![
                Arc::new(Int64Array::from_iter_values(0..rows)),
                Arc::new(Int64Array::from_iter_values(0..rows)),
            ],
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_execute_counts_rows_and_columns() {
        let client = PrimaryExecutionClient::new(Arc::new(ScriptedChannel {
            identifier: Some("q-1"),
            batches: vec![Ok(batch(3)), Ok(batch(4))],
            submit_error: None,
        }));

        let execution = client.execute(&QueryRequest::new("SELECT 1")).await;

        assert!(execution.is_success());
        let record = execution.record;
        assert_eq!(record.identifier, "q-1");
        assert_eq!(record.status, ExecutionStatus::Succeeded);
        assert_eq!(record.row_count, Some(7));
        assert_eq!(record.column_count, Some(2));
        assert!(record.observed_start_ms <= record.observed_end_ms);
        assert!(record.duration_ms <= record.drain_duration_ms);
    }

    #[tokio::test]
    async fn test_drain_failure_keeps_identifier() {
        let client = PrimaryExecutionClient::new(Arc::new(ScriptedChannel {
            identifier: Some("q-2"),
            batches: vec![
                Ok(batch(1)),
                Err(ParallaxError::execution_failed("stream reset")),
            ],
            submit_error: None,
        }));

        let execution = client.execute(&QueryRequest::new("SELECT 1")).await;

        let failure = execution.failure.expect("drain failure");
        assert_eq!(failure.code, ErrorCode::ExecutionFailed);
        assert_eq!(execution.record.identifier, "q-2");
        assert_eq!(execution.record.status, ExecutionStatus::Failed);
        assert_eq!(execution.record.error_detail.as_deref(), Some("stream reset"));
    }

    #[tokio::test]
    async fn test_submit_failure_before_assignment() {
        let client = PrimaryExecutionClient::new(Arc::new(ScriptedChannel {
            identifier: None,
            batches: vec![],
            submit_error: Some(ParallaxError::execution_failed("syntax error")),
        }));

        let execution = client.execute(&QueryRequest::new("SELEC 1")).await;

        assert!(!execution.is_success());
        assert_eq!(execution.record.identifier, "");
        assert_eq!(execution.record.row_count, None);
    }

    #[tokio::test]
    async fn test_channel_codes_surface_as_execution_failed() {
        let client = PrimaryExecutionClient::new(Arc::new(ScriptedChannel {
            identifier: Some("q-3"),
            batches: vec![],
            submit_error: Some(ParallaxError::new(
                ErrorCode::ChannelUnavailable,
                "transport reset mid-stream",
            )),
        }));

        let execution = client.execute(&QueryRequest::new("SELECT 1")).await;

        let failure = execution.failure.expect("submit failure");
        assert_eq!(failure.code, ErrorCode::ExecutionFailed);
        assert!(failure.message.contains("transport reset mid-stream"));
        assert!(failure.message.contains("PLX-1003"), "{}", failure.message);
        assert_eq!(execution.record.status, ExecutionStatus::Failed);
    }

    struct SlowChannel;

    #[async_trait]
    impl PrimaryChannel for SlowChannel {
        fn name(&self) -> &str {
            "slow"
        }

        async fn submit(
            &self,
            _request: &QueryRequest,
            hook: IdentifierHook,
        ) -> Result<Box<dyn ResultHandle>> {
            hook.capture("q-slow");
            tokio::time::sleep(std::time::Duration::from_secs(60)).await;
            Ok(Box::new(VecHandle {
                batches: VecDeque::new(),
            }))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_keeps_captured_identifier() {
        let client = PrimaryExecutionClient::new(Arc::new(SlowChannel));
        let deadline = Instant::now() + std::time::Duration::from_secs(1);

        let execution = client
            .execute_until(&QueryRequest::new("SELECT 1"), deadline, &CancellationToken::new())
            .await;

        let failure = execution.failure.expect("deadline failure");
        assert_eq!(failure.code, ErrorCode::DeadlineExceeded);
        assert_eq!(
            failure.context,
            Some(ErrorContext::Execution {
                identifier: "q-slow".to_string(),
                engine: Some("slow".to_string()),
            })
        );
        assert_eq!(execution.record.identifier, "q-slow");
        assert_eq!(execution.record.status, ExecutionStatus::Unknown);
        assert_eq!(execution.record.duration_ms, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_interrupts_submit() {
        let client = PrimaryExecutionClient::new(Arc::new(SlowChannel));
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(200)).await;
            trigger.cancel();
        });

        let started = Instant::now();
        let execution = client
            .execute_until(
                &QueryRequest::new("SELECT 1"),
                Instant::now() + std::time::Duration::from_secs(30),
                &cancel,
            )
            .await;

        assert!(started.elapsed() < std::time::Duration::from_secs(1));
        let failure = execution.failure.expect("cancel failure");
        assert_eq!(failure.code, ErrorCode::QueryCancelled);
        assert_eq!(execution.record.identifier, "q-slow");
        assert_eq!(execution.record.status, ExecutionStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_empty_result_uses_handle_column_count() {
        struct Described;

        #[async_trait]
        impl ResultHandle for Described {
            fn column_count(&self) -> Option<usize> {
                Some(5)
            }
            async fn next_batch(&mut self) -> Result<Option<RecordBatch>> {
                Ok(None)
            }
        }

        struct EmptyChannel;

        #[async_trait]
        impl PrimaryChannel for EmptyChannel {
            fn name(&self) -> &str {
                "empty"
            }
            async fn submit(
                &self,
                _request: &QueryRequest,
                hook: IdentifierHook,
            ) -> Result<Box<dyn ResultHandle>> {
                hook.capture("q-empty");
                Ok(Box::new(Described))
            }
        }

        let client = PrimaryExecutionClient::new(Arc::new(EmptyChannel));
        let record = client.execute(&QueryRequest::new("SELECT 1 WHERE false")).await.record;
        assert_eq!(record.row_count, Some(0));
        assert_eq!(record.column_count, Some(5));
    }
}
