use crate::{ErrorCode, ErrorContext, ParallaxError};
use arrow_flight::error::FlightError;

impl ErrorCode {
    /// Classify an HTTP status returned by the telemetry API.
    ///
    /// 404 is reported separately because lookups treat it as "not yet visible".
    pub fn from_http_status(status: u16) -> ErrorCode {
        match status {
            404 => ErrorCode::StatementNotFound,
            408 | 425 | 429 => ErrorCode::TelemetryTransient,
            500..=599 => ErrorCode::TelemetryTransient,
            _ => ErrorCode::TelemetryFatal,
        }
    }

    /// Classify a gRPC status code returned by the primary channel.
    pub fn from_grpc(code: tonic::Code) -> ErrorCode {
        use tonic::Code;

        match code {
            Code::Unauthenticated => ErrorCode::AuthenticationFailed,
            Code::PermissionDenied => ErrorCode::AuthorizationDenied,
            Code::DeadlineExceeded => ErrorCode::ConnectionTimeout,
            Code::Unavailable => ErrorCode::ChannelUnavailable,
            Code::Cancelled => ErrorCode::QueryCancelled,
            _ => ErrorCode::ExecutionFailed,
        }
    }
}

impl From<reqwest::Error> for ParallaxError {
    fn from(err: reqwest::Error) -> Self {
        let http_status = err.status().map(|s| s.as_u16());
        let code = if let Some(status) = http_status {
            ErrorCode::from_http_status(status)
        } else if err.is_timeout() || err.is_connect() || err.is_request() || err.is_body() {
            ErrorCode::TelemetryTransient
        } else if err.is_decode() {
            ErrorCode::MalformedResponse
        } else if err.is_builder() {
            ErrorCode::InvalidUrl
        } else {
            ErrorCode::TelemetryTransient
        };

        ParallaxError::new(code, err.to_string()).with_context(ErrorContext::Telemetry {
            operation: "http".to_string(),
            http_status,
            error_code: None,
            identifier: None,
        })
    }
}

impl From<tonic::Status> for ParallaxError {
    fn from(status: tonic::Status) -> Self {
        ParallaxError::new(
            ErrorCode::from_grpc(status.code()),
            format!("{}: {}", status.code(), status.message()),
        )
    }
}

impl From<FlightError> for ParallaxError {
    fn from(err: FlightError) -> Self {
        match &err {
            FlightError::Tonic(status) => ParallaxError::new(
                ErrorCode::from_grpc(status.code()),
                format!("{}: {}", status.code(), status.message()),
            ),
            _ => ParallaxError::execution_failed(err.to_string()),
        }
    }
}

impl From<arrow::error::ArrowError> for ParallaxError {
    fn from(err: arrow::error::ArrowError) -> Self {
        ParallaxError::execution_failed(err.to_string())
    }
}

impl From<std::io::Error> for ParallaxError {
    fn from(err: std::io::Error) -> Self {
        ParallaxError::new(ErrorCode::Unknown, err.to_string())
    }
}

impl From<serde_json::Error> for ParallaxError {
    fn from(err: serde_json::Error) -> Self {
        ParallaxError::new(ErrorCode::SerializationFailed, err.to_string())
    }
}

impl From<serde_yaml::Error> for ParallaxError {
    fn from(err: serde_yaml::Error) -> Self {
        ParallaxError::new(ErrorCode::InvalidConfig, err.to_string())
    }
}
