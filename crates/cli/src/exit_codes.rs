//! Structured exit codes for machine-readable error handling.
//!
//! These codes let scripts distinguish a failed query from an unreachable telemetry API
//! or a correlation that simply ran out of attempts.

use parallax_error::{ErrorCategory, ErrorCode, ParallaxError};

/// Success (standard convention)
#[allow(dead_code)]
pub const SUCCESS: i32 = 0;

/// General error (fallback for unknown errors)
pub const GENERAL_ERROR: i32 = 1;

/// CLI usage error (invalid arguments, missing flags)
pub const USAGE_ERROR: i32 = 2;

/// Configuration error (YAML parse failure, failed validation, missing endpoint)
pub const CONFIG_ERROR: i32 = 3;

/// Connection error (engine unreachable, connect timeout)
pub const CONNECTION_ERROR: i32 = 4;

/// Primary execution failed or was cancelled
pub const EXECUTION_ERROR: i32 = 5;

/// Telemetry API rejected or failed a call
pub const TELEMETRY_ERROR: i32 = 6;

/// Permission error (authentication or authorization failure)
pub const PERMISSION_ERROR: i32 = 7;

/// Partial failure (query ran but no terminal telemetry record was matched)
pub const PARTIAL_FAILURE: i32 = 8;

/// Caller deadline expired
pub const DEADLINE_ERROR: i32 = 9;

pub fn for_error(err: &ParallaxError) -> i32 {
    match err.code {
        ErrorCode::ChannelUnavailable | ErrorCode::ConnectionTimeout => CONNECTION_ERROR,
        ErrorCode::DeadlineExceeded => DEADLINE_ERROR,
        _ => match err.category() {
            ErrorCategory::Execution => EXECUTION_ERROR,
            ErrorCategory::Telemetry => TELEMETRY_ERROR,
            ErrorCategory::Correlation => PARTIAL_FAILURE,
            ErrorCategory::Config => CONFIG_ERROR,
            ErrorCategory::Auth => PERMISSION_ERROR,
            ErrorCategory::Internal => GENERAL_ERROR,
            _ => GENERAL_ERROR,
        },
    }
}

pub fn map_error_to_exit_code(e: &anyhow::Error) -> i32 {
    if let Some(err) = e.downcast_ref::<ParallaxError>() {
        return for_error(err);
    }

    // Fallback: string heuristics for errors raised outside the library crates
    let s = e.to_string().to_lowercase();
    if s.contains("usage") || s.contains("argument") {
        return USAGE_ERROR;
    }
    if s.contains("config") || s.contains("yaml") {
        return CONFIG_ERROR;
    }
    if s.contains("connect") || s.contains("timeout") {
        return CONNECTION_ERROR;
    }
    if s.contains("permission") || s.contains("unauthorized") {
        return PERMISSION_ERROR;
    }
    GENERAL_ERROR
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structured_errors_map_by_category() {
        let cases = [
            (ErrorCode::ExecutionFailed, EXECUTION_ERROR),
            (ErrorCode::QueryCancelled, EXECUTION_ERROR),
            (ErrorCode::ChannelUnavailable, CONNECTION_ERROR),
            (ErrorCode::TelemetryFatal, TELEMETRY_ERROR),
            (ErrorCode::TelemetryTransient, TELEMETRY_ERROR),
            (ErrorCode::DeadlineExceeded, DEADLINE_ERROR),
            (ErrorCode::CorrelationExhausted, PARTIAL_FAILURE),
            (ErrorCode::MissingRequiredField, CONFIG_ERROR),
            (ErrorCode::AuthenticationFailed, PERMISSION_ERROR),
            (ErrorCode::InternalPanic, GENERAL_ERROR),
        ];
        for (code, expected) in cases {
            let err = anyhow::Error::new(ParallaxError::new(code, "x"));
            assert_eq!(map_error_to_exit_code(&err), expected, "{:?}", code);
        }
    }

    #[test]
    fn test_unstructured_errors_fall_back_to_message() {
        assert_eq!(
            map_error_to_exit_code(&anyhow::anyhow!("Failed to parse config file")),
            CONFIG_ERROR
        );
        assert_eq!(
            map_error_to_exit_code(&anyhow::anyhow!("something odd")),
            GENERAL_ERROR
        );
    }
}
