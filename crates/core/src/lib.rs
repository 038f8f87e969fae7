//! Parallax Core: dual-channel query execution and telemetry correlation.
//!
//! A query runs through a primary client channel (e.g. Flight SQL) that assigns it an
//! opaque identifier, while a separate telemetry API reports server-measured timing for
//! the same execution. This crate captures the identifier, polls the telemetry API until
//! the record exists, and reconciles the two views.
//!
//! # Architecture
//!
//! ```text
//!            ┌─────────────────────┐
//! caller ──▶ │  CorrelationEngine  │ ──▶ ComparisonResult
//!            └──────────┬──────────┘
//!          ┌────────────┴────────────┐
//!   ┌──────┴───────┐         ┌───────┴────────┐
//!   │ PrimaryClient│         │ TelemetryClient│
//!   │  (+ hook)    │         │ (REST lookups) │
//!   └──────────────┘         └────────────────┘
//! ```

pub mod compare;
pub mod correlation;
pub mod events;
pub mod hook;
pub mod model;
pub mod primary;
pub mod telemetry;

pub use compare::{compare, Comparison};
pub use correlation::{CorrelationEngine, SideBySideReport};
pub use hook::{IdentifierHook, IdentifierSlot};
pub use model::{
    AttemptOutcome, ComparisonResult, CorrelationAttempt, CorrelationOutcome, Disposition,
    ExecutionContext, ExecutionRecord, ExecutionStatus, Origin, QueryRequest, ResultFormat,
    TimingBasis,
};
pub use primary::{PrimaryChannel, PrimaryExecution, PrimaryExecutionClient, ResultHandle};
pub use telemetry::{HistoryEntry, Lookup, TelemetryApi, TelemetryClient};
