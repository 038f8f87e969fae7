//! Out-of-band telemetry API: submit-and-wait execution and lookup by identifier.

mod client;
pub mod normalize;
pub mod wire;

pub use client::{history_search_sql, TelemetryClient};

use crate::model::{ExecutionRecord, ExecutionStatus, QueryRequest};
use async_trait::async_trait;
use parallax_error::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// Result of looking up an identifier.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    /// The record exists; its status says whether it is terminal.
    Found(ExecutionRecord),
    /// Not visible yet. Expected shortly after execution, not a fault.
    NotFound,
}

/// The telemetry operations the correlation engine depends on.
#[async_trait]
pub trait TelemetryApi: Send + Sync {
    /// Execute `request` independently through the telemetry API, waiting up to `timeout`.
    async fn submit_and_wait(&self, request: &QueryRequest, timeout: Duration)
        -> Result<ExecutionRecord>;

    async fn lookup_by_identifier(&self, identifier: &str) -> Result<Lookup>;
}

/// One row of a statement-text search over the query history table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub statement_id: String,
    pub executed_by: Option<String>,
    pub execution_status: ExecutionStatus,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub total_duration_ms: Option<u64>,
    pub produced_rows: Option<u64>,
    pub statement_text: Option<String>,
}

impl HistoryEntry {
    /// Parse a `data_array` row in the column order of [`history_search_sql`].
    pub fn from_row(row: &[Value]) -> Option<Self> {
        let statement_id = cell_str(row, 0)?;
        Some(Self {
            statement_id,
            executed_by: cell_str(row, 1),
            execution_status: ExecutionStatus::from_remote(
                cell_str(row, 2).as_deref().unwrap_or_default(),
            ),
            start_time: cell_str(row, 3),
            end_time: cell_str(row, 4),
            total_duration_ms: cell_u64(row, 5),
            produced_rows: cell_u64(row, 6),
            statement_text: cell_str(row, 7),
        })
    }
}

fn cell_str(row: &[Value], idx: usize) -> Option<String> {
    match row.get(idx)? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

// JSON_ARRAY results encode every cell as a string.
fn cell_u64(row: &[Value], idx: usize) -> Option<u64> {
    match row.get(idx)? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}
