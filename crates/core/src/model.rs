//! Records exchanged between the primary client, the telemetry client and the comparator.

use serde::{Deserialize, Serialize};

/// How the telemetry API should return statement results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Disposition {
    #[default]
    Inline,
    ExternalLinks,
}

impl Disposition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Disposition::Inline => "INLINE",
            Disposition::ExternalLinks => "EXTERNAL_LINKS",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResultFormat {
    #[default]
    JsonArray,
    ArrowStream,
    Csv,
}

impl ResultFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResultFormat::JsonArray => "JSON_ARRAY",
            ResultFormat::ArrowStream => "ARROW_STREAM",
            ResultFormat::Csv => "CSV",
        }
    }
}

/// Optional execution hints carried with a query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionContext {
    /// Target compute resource (warehouse id).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warehouse_id: Option<String>,
    /// Server-side wait preference in seconds for submit-and-wait.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wait_timeout_secs: Option<u32>,
    #[serde(default)]
    pub disposition: Disposition,
    #[serde(default)]
    pub format: ResultFormat,
    /// Client-chosen tag forwarded by channels that support it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_tag: Option<String>,
}

/// A query as submitted by the caller. Read-only once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryRequest {
    statement: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    context: Option<ExecutionContext>,
}

impl QueryRequest {
    pub fn new(statement: impl Into<String>) -> Self {
        Self {
            statement: statement.into(),
            context: None,
        }
    }

    pub fn with_context(mut self, context: ExecutionContext) -> Self {
        self.context = Some(context);
        self
    }

    pub fn statement(&self) -> &str {
        &self.statement
    }

    pub fn context(&self) -> Option<&ExecutionContext> {
        self.context.as_ref()
    }

    pub fn correlation_tag(&self) -> Option<&str> {
        self.context.as_ref()?.correlation_tag.as_deref()
    }
}

/// Which channel produced an [`ExecutionRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Origin {
    Primary,
    Telemetry,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
    Cancelled,
    Unknown,
}

impl ExecutionStatus {
    /// Map a remote state string (statement or history API) onto the local status set.
    pub fn from_remote(state: &str) -> Self {
        match state.trim().to_ascii_uppercase().as_str() {
            "QUEUED" | "PENDING" => ExecutionStatus::Pending,
            "RUNNING" => ExecutionStatus::Running,
            "FINISHED" | "SUCCEEDED" | "CLOSED" => ExecutionStatus::Succeeded,
            "FAILED" => ExecutionStatus::Failed,
            "CANCELED" | "CANCELLED" => ExecutionStatus::Cancelled,
            _ => ExecutionStatus::Unknown,
        }
    }

    /// Terminal states never change again on the server.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ExecutionStatus::Succeeded | ExecutionStatus::Failed | ExecutionStatus::Cancelled
        )
    }
}

/// Which clock and which endpoint fields produced the timing of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimingBasis {
    /// Client wall clock around the primary call.
    ClientClock,
    /// Client wall clock around a telemetry API round trip.
    ApiRoundTrip,
    /// Server `query_start_time_ms` .. `query_end_time_ms`.
    HistoryQueryEnd,
    /// Server `query_start_time_ms` .. `execution_end_time_ms`.
    HistoryExecutionEnd,
    /// The endpoint exposes no usable timestamps.
    Unavailable,
}

/// One channel's view of one execution. Never merged with the other channel's record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub origin: Origin,
    /// Empty when the channel failed before assigning one.
    pub identifier: String,
    pub status: ExecutionStatus,
    /// Epoch milliseconds.
    pub observed_start_ms: Option<i64>,
    /// Epoch milliseconds.
    pub observed_end_ms: Option<i64>,
    pub duration_ms: Option<u64>,
    pub row_count: Option<u64>,
    pub column_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
    pub timing_basis: TimingBasis,
    /// Duration as reported by the server, kept only for cross-checking.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reported_duration_ms: Option<u64>,
    /// Primary only: epoch ms when the result set was fully drained.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drain_end_ms: Option<i64>,
    /// Primary only: submission to full drain.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drain_duration_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_count: Option<u64>,
}

impl ExecutionRecord {
    pub fn new(origin: Origin, identifier: impl Into<String>, status: ExecutionStatus) -> Self {
        Self {
            origin,
            identifier: identifier.into(),
            status,
            observed_start_ms: None,
            observed_end_ms: None,
            duration_ms: None,
            row_count: None,
            column_count: None,
            error_detail: None,
            timing_basis: TimingBasis::Unavailable,
            reported_duration_ms: None,
            drain_end_ms: None,
            drain_duration_ms: None,
            chunk_count: None,
        }
    }

    pub fn has_identifier(&self) -> bool {
        !self.identifier.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttemptOutcome {
    NotFound,
    Found,
    TransientError,
    FatalError,
}

/// A single telemetry lookup issued by the correlation loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrelationAttempt {
    /// 1-based.
    pub attempt_number: u32,
    /// Epoch milliseconds.
    pub issued_at_ms: i64,
    pub outcome: AttemptOutcome,
}

/// How the correlation loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CorrelationOutcome {
    /// A terminal telemetry record was found for the primary identifier.
    Matched,
    /// All attempts were used without a terminal record.
    Exhausted,
    /// The caller deadline expired before the loop finished.
    DeadlineExceeded,
    /// The primary channel never assigned an identifier.
    SkippedNoIdentifier,
}

/// Final report of one correlated run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComparisonResult {
    pub primary: ExecutionRecord,
    pub telemetry: Option<ExecutionRecord>,
    /// `None` when either side has no duration.
    pub duration_delta_ms: Option<u64>,
    /// `None` when either side has no row count.
    pub row_count_agreement: Option<bool>,
    /// `None` when either side has no column count.
    pub column_count_agreement: Option<bool>,
    pub correlation_attempts: u32,
    pub correlation_succeeded: bool,
    pub outcome: CorrelationOutcome,
}
