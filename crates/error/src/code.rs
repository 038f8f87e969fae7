use serde::{Deserialize, Serialize};
use std::fmt;

/// Numeric error codes following PLX-XXXX format.
///
/// ## Code Ranges
/// - **1000-1999**: Primary execution errors
/// - **2000-2999**: Telemetry API errors
/// - **3000-3999**: Correlation errors
/// - **4000-4999**: Configuration errors
/// - **5000-5999**: Authentication/Authorization errors
/// - **9000-9999**: Internal/System errors
///
/// Codes are stable across versions (semver contract).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
#[non_exhaustive]
pub enum ErrorCode {
    // === Execution Errors (1000-1999) ===
    /// PLX-1001: Primary channel could not complete the query
    ExecutionFailed = 1001,
    /// PLX-1002: Network connection timeout on the primary channel
    ConnectionTimeout = 1002,
    /// PLX-1003: Primary channel endpoint unreachable
    ChannelUnavailable = 1003,
    /// PLX-1004: Query cancelled before completion
    QueryCancelled = 1004,

    // === Telemetry Errors (2000-2999) ===
    /// PLX-2001: Telemetry call failed in a way expected to resolve on retry
    TelemetryTransient = 2001,
    /// PLX-2002: Telemetry call failed permanently (auth, bad request)
    TelemetryFatal = 2002,
    /// PLX-2003: Telemetry response could not be decoded
    MalformedResponse = 2003,
    /// PLX-2004: Statement identifier unknown to the telemetry API
    StatementNotFound = 2004,

    // === Correlation Errors (3000-3999) ===
    /// PLX-3001: Lookup attempts ran out without a terminal record
    CorrelationExhausted = 3001,
    /// PLX-3002: Caller-supplied deadline elapsed
    DeadlineExceeded = 3002,

    // === Configuration Errors (4000-4999) ===
    /// PLX-4001: Configuration failed validation
    InvalidConfig = 4001,
    /// PLX-4002: Missing required field in config
    MissingRequiredField = 4002,
    /// PLX-4003: Endpoint URL could not be parsed
    InvalidUrl = 4003,

    // === Auth Errors (5000-5999) ===
    /// PLX-5001: Authentication failed
    AuthenticationFailed = 5001,
    /// PLX-5002: Authorization denied
    AuthorizationDenied = 5002,

    // === Internal Errors (9000-9999) ===
    /// PLX-9001: Serialization/deserialization failed
    SerializationFailed = 9001,
    /// PLX-9002: Unexpected internal state
    InternalPanic = 9002,

    /// PLX-9999: Unknown/unclassified error
    Unknown = 9999,
}

impl ErrorCode {
    /// Get the numeric code value
    pub fn as_u16(&self) -> u16 {
        *self as u16
    }

    /// Get the formatted code string (e.g., "PLX-2001")
    pub fn as_str(&self) -> String {
        format!("PLX-{:04}", self.as_u16())
    }

    /// Get the error category
    pub fn category(&self) -> ErrorCategory {
        match self.as_u16() {
            1000..=1999 => ErrorCategory::Execution,
            2000..=2999 => ErrorCategory::Telemetry,
            3000..=3999 => ErrorCategory::Correlation,
            4000..=4999 => ErrorCategory::Config,
            5000..=5999 => ErrorCategory::Auth,
            _ => ErrorCategory::Internal,
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ErrorCode::TelemetryTransient
                | ErrorCode::ConnectionTimeout
                | ErrorCode::ChannelUnavailable
        )
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<ErrorCode> for String {
    fn from(code: ErrorCode) -> String {
        code.as_str()
    }
}

impl TryFrom<String> for ErrorCode {
    type Error = String;

    fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
        let num: u16 = s
            .strip_prefix("PLX-")
            .and_then(|n| n.parse().ok())
            .ok_or_else(|| "Invalid format".to_string())?;
        Self::try_from(num).map_err(|_| "Unknown code".to_string())
    }
}

impl TryFrom<u16> for ErrorCode {
    type Error = String;

    fn try_from(n: u16) -> std::result::Result<Self, Self::Error> {
        match n {
            1001 => Ok(Self::ExecutionFailed),
            1002 => Ok(Self::ConnectionTimeout),
            1003 => Ok(Self::ChannelUnavailable),
            1004 => Ok(Self::QueryCancelled),
            2001 => Ok(Self::TelemetryTransient),
            2002 => Ok(Self::TelemetryFatal),
            2003 => Ok(Self::MalformedResponse),
            2004 => Ok(Self::StatementNotFound),
            3001 => Ok(Self::CorrelationExhausted),
            3002 => Ok(Self::DeadlineExceeded),
            4001 => Ok(Self::InvalidConfig),
            4002 => Ok(Self::MissingRequiredField),
            4003 => Ok(Self::InvalidUrl),
            5001 => Ok(Self::AuthenticationFailed),
            5002 => Ok(Self::AuthorizationDenied),
            9001 => Ok(Self::SerializationFailed),
            9002 => Ok(Self::InternalPanic),
            9999 => Ok(Self::Unknown),
            _ => Err(format!("Unknown error code: {}", n)),
        }
    }
}

/// High-level error category, used for CLI exit codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum ErrorCategory {
    Execution,
    Telemetry,
    Correlation,
    Config,
    Auth,
    Internal,
}
