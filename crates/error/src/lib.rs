//! # parallax-error
//!
//! Unified error types for the Parallax correlation engine.
//!
//! Every error carries:
//! - A stable numeric code (PLX-XXXX)
//! - Optional structured JSON context
//! - An optional actionable hint

mod code;
mod context;
mod convert;

pub use code::{ErrorCategory, ErrorCode};
pub use context::ErrorContext;

use serde::{Deserialize, Serialize};
use std::fmt;

/// The unified error type for all Parallax operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParallaxError {
    /// Numeric error code (e.g., "PLX-2001")
    pub code: ErrorCode,

    /// Human-readable error message
    pub message: String,

    /// Structured context for programmatic handling
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<ErrorContext>,

    /// Suggestion for the operator
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,

    /// Correlation tag of the flow that produced the error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
}

impl ParallaxError {
    /// Create a new error with code and message
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            context: None,
            hint: None,
            trace_id: None,
        }
    }

    pub fn execution_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ExecutionFailed, message)
    }

    pub fn telemetry_transient(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::TelemetryTransient, message)
    }

    pub fn telemetry_fatal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::TelemetryFatal, message)
    }

    pub fn deadline_exceeded(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::DeadlineExceeded, message)
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidConfig, message)
    }

    /// Add structured context
    pub fn with_context(mut self, context: ErrorContext) -> Self {
        self.context = Some(context);
        self
    }

    /// Add an operator hint
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    /// Add trace ID for correlation
    pub fn with_trace_id(mut self, trace_id: impl Into<String>) -> Self {
        self.trace_id = Some(trace_id.into());
        self
    }

    /// Whether retrying the same call may succeed.
    pub fn is_transient(&self) -> bool {
        self.code.is_transient()
    }

    pub fn category(&self) -> ErrorCategory {
        self.code.category()
    }

    /// Serialize to JSON for API/CLI responses
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            tracing::warn!("Failed to serialize ParallaxError: {}", e);
            format!(
                r#"{{"code":"{}","message":"Serialization failed"}}"#,
                self.code
            )
        })
    }

    /// Serialize to pretty JSON for logging
    pub fn to_json_pretty(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| self.to_json())
    }
}

impl fmt::Display for ParallaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)?;
        if let Some(hint) = &self.hint {
            write!(f, " (Hint: {})", hint)?;
        }
        Ok(())
    }
}

impl std::error::Error for ParallaxError {}

/// Result type alias for Parallax operations
pub type Result<T> = std::result::Result<T, ParallaxError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parallax_error_builder() {
        let err = ParallaxError::new(ErrorCode::TelemetryFatal, "Unauthorized")
            .with_hint("Check the bearer token")
            .with_trace_id("run-42");

        assert_eq!(err.code, ErrorCode::TelemetryFatal);
        assert_eq!(err.message, "Unauthorized");
        assert_eq!(err.hint, Some("Check the bearer token".to_string()));
        assert_eq!(err.trace_id, Some("run-42".to_string()));
        assert!(err.context.is_none());
    }

    #[test]
    fn test_display_implementation() {
        let err = ParallaxError::execution_failed("stream reset").with_hint("Retry the query");

        assert_eq!(
            err.to_string(),
            "[PLX-1001] stream reset (Hint: Retry the query)"
        );

        let err_no_hint = ParallaxError::new(ErrorCode::InternalPanic, "Crash");
        assert_eq!(err_no_hint.to_string(), "[PLX-9002] Crash");
    }

    #[test]
    fn test_transient_classification() {
        assert!(ParallaxError::telemetry_transient("503").is_transient());
        assert!(ParallaxError::new(ErrorCode::ConnectionTimeout, "slow").is_transient());
        assert!(!ParallaxError::telemetry_fatal("401").is_transient());
        assert!(!ParallaxError::deadline_exceeded("late").is_transient());
    }

    #[test]
    fn test_json_output() {
        let err = ParallaxError::deadline_exceeded("Deadline of 1000ms elapsed");
        let json = err.to_json();

        assert!(json.contains("\"code\":\"PLX-3002\""));
        assert!(json.contains("\"message\":\"Deadline of 1000ms elapsed\""));
        assert!(!json.contains("hint"));
    }
}
