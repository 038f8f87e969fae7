//! JSON shapes of the statements and query-history APIs.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize)]
pub struct StatementRequest<'a> {
    pub statement: &'a str,
    pub warehouse_id: &'a str,
    pub wait_timeout: String,
    pub format: &'a str,
    pub disposition: &'a str,
    pub on_wait_timeout: &'a str,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatementResponse {
    #[serde(default)]
    pub statement_id: String,
    #[serde(default)]
    pub status: Option<StatementStatus>,
    #[serde(default)]
    pub manifest: Option<Manifest>,
    #[serde(default)]
    pub result: Option<ResultData>,
}

impl StatementResponse {
    pub fn state(&self) -> &str {
        self.status
            .as_ref()
            .map(|s| s.state.as_str())
            .unwrap_or_default()
    }

    pub fn error_message(&self) -> Option<&str> {
        self.status.as_ref()?.error.as_ref()?.message.as_deref()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatementStatus {
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub error: Option<ServiceError>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServiceError {
    #[serde(default)]
    pub error_code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub schema: Option<ManifestSchema>,
    #[serde(default)]
    pub total_row_count: Option<u64>,
    #[serde(default)]
    pub total_chunk_count: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ManifestSchema {
    #[serde(default)]
    pub column_count: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResultData {
    #[serde(default)]
    pub data_array: Option<Vec<Vec<Value>>>,
}

/// `GET /api/2.0/sql/history/queries/{id}`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QueryInfo {
    #[serde(default)]
    pub query_id: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub query_start_time_ms: Option<i64>,
    #[serde(default)]
    pub query_end_time_ms: Option<i64>,
    #[serde(default)]
    pub execution_end_time_ms: Option<i64>,
    #[serde(default)]
    pub duration: Option<u64>,
    #[serde(default)]
    pub rows_produced: Option<u64>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub query_text: Option<String>,
}

/// Error body returned by the workspace API on non-2xx responses.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub error_code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}
