//! Normalization of heterogeneous telemetry responses into [`ExecutionRecord`]s.
//!
//! Durations are always derived from server timestamps. A separately reported duration
//! is kept in `reported_duration_ms` and only cross-checked.

use super::wire::{QueryInfo, StatementResponse};
use crate::events::CorrelationTelemetry;
use crate::model::{ExecutionRecord, ExecutionStatus, Origin, TimingBasis};
use parallax_error::{ErrorCode, ErrorContext, ParallaxError, Result};

/// Largest tolerated gap between computed and reported durations.
pub const DURATION_TOLERANCE_MS: u64 = 1;

pub fn from_query_info(info: &QueryInfo) -> Result<ExecutionRecord> {
    if info.query_id.is_empty() {
        return Err(malformed("history response without query_id", "lookup_history"));
    }

    let status = ExecutionStatus::from_remote(info.status.as_deref().unwrap_or_default());
    let mut record = ExecutionRecord::new(Origin::Telemetry, info.query_id.clone(), status);

    let (end, basis) = match (info.query_end_time_ms, info.execution_end_time_ms) {
        (Some(end), _) => (Some(end), TimingBasis::HistoryQueryEnd),
        (None, Some(end)) => (Some(end), TimingBasis::HistoryExecutionEnd),
        (None, None) => (None, TimingBasis::Unavailable),
    };

    record.observed_start_ms = info.query_start_time_ms;
    record.observed_end_ms = end;
    record.timing_basis = if info.query_start_time_ms.is_some() {
        basis
    } else {
        TimingBasis::Unavailable
    };
    record.duration_ms = match (info.query_start_time_ms, end) {
        (Some(start), Some(end)) if end >= start => Some((end - start) as u64),
        _ => None,
    };
    record.reported_duration_ms = info.duration;
    record.row_count = info.rows_produced;
    record.error_detail = info.error_message.clone();

    if let (Some(computed), Some(reported)) = (record.duration_ms, record.reported_duration_ms) {
        if computed.abs_diff(reported) > DURATION_TOLERANCE_MS {
            CorrelationTelemetry::duration_mismatch(&record.identifier, computed, reported);
        }
    }

    Ok(record)
}

pub fn from_statement(response: &StatementResponse) -> Result<ExecutionRecord> {
    if response.statement_id.is_empty() {
        return Err(malformed("statement response without statement_id", "get_statement"));
    }

    let status = ExecutionStatus::from_remote(response.state());
    let mut record = ExecutionRecord::new(Origin::Telemetry, response.statement_id.clone(), status);

    if let Some(manifest) = &response.manifest {
        record.row_count = manifest.total_row_count;
        record.column_count = manifest.schema.as_ref().and_then(|s| s.column_count);
        record.chunk_count = manifest.total_chunk_count;
    }
    record.error_detail = response.error_message().map(str::to_string);

    Ok(record)
}

fn malformed(message: &str, operation: &str) -> ParallaxError {
    ParallaxError::new(ErrorCode::MalformedResponse, message).with_context(ErrorContext::Telemetry {
        operation: operation.to_string(),
        http_status: None,
        error_code: None,
        identifier: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::wire::{Manifest, ManifestSchema, StatementStatus};

    fn info() -> QueryInfo {
        QueryInfo {
            query_id: "01f0-abc".to_string(),
            status: Some("FINISHED".to_string()),
            query_start_time_ms: Some(1_700_000_000_000),
            query_end_time_ms: Some(1_700_000_000_115),
            execution_end_time_ms: Some(1_700_000_000_110),
            duration: Some(115),
            rows_produced: Some(1),
            ..Default::default()
        }
    }

    #[test]
    fn test_history_prefers_query_end() {
        let record = from_query_info(&info()).unwrap();
        assert_eq!(record.status, ExecutionStatus::Succeeded);
        assert_eq!(record.duration_ms, Some(115));
        assert_eq!(record.timing_basis, TimingBasis::HistoryQueryEnd);
        assert_eq!(record.row_count, Some(1));
        assert_eq!(record.column_count, None);
    }

    #[test]
    fn test_history_falls_back_to_execution_end() {
        let mut info = info();
        info.query_end_time_ms = None;
        let record = from_query_info(&info).unwrap();
        assert_eq!(record.duration_ms, Some(110));
        assert_eq!(record.timing_basis, TimingBasis::HistoryExecutionEnd);
        assert_eq!(record.reported_duration_ms, Some(115));
    }

    #[test]
    fn test_history_without_timestamps_has_no_duration() {
        let info = QueryInfo {
            query_id: "01f0-running".to_string(),
            status: Some("RUNNING".to_string()),
            query_start_time_ms: Some(1_700_000_000_000),
            duration: Some(40),
            ..Default::default()
        };
        let record = from_query_info(&info).unwrap();
        assert_eq!(record.status, ExecutionStatus::Running);
        assert_eq!(record.duration_ms, None);
        assert_eq!(record.reported_duration_ms, Some(40));
    }

    #[test]
    fn test_missing_query_id_is_malformed() {
        let err = from_query_info(&QueryInfo::default()).unwrap_err();
        assert_eq!(err.code, ErrorCode::MalformedResponse);
        assert!(!err.is_transient());
    }

    #[test]
    fn test_statement_manifest_counts() {
        let response = StatementResponse {
            statement_id: "stmt-1".to_string(),
            status: Some(StatementStatus {
                state: "SUCCEEDED".to_string(),
                error: None,
            }),
            manifest: Some(Manifest {
                schema: Some(ManifestSchema {
                    column_count: Some(2),
                }),
                total_row_count: Some(1),
                total_chunk_count: Some(1),
            }),
            result: None,
        };
        let record = from_statement(&response).unwrap();
        assert_eq!(record.identifier, "stmt-1");
        assert_eq!(record.column_count, Some(2));
        assert_eq!(record.row_count, Some(1));
        assert_eq!(record.chunk_count, Some(1));
        assert_eq!(record.timing_basis, TimingBasis::Unavailable);
    }
}
