use arrow::error::ArrowError;
use arrow_flight::error::FlightError;
use parallax_error::{ErrorCode, ErrorContext, ParallaxError};
use thiserror::Error;

/// Structured errors for Flight SQL channel operations
#[derive(Error, Debug)]
pub enum FlightChannelError {
    #[error("Invalid Flight SQL endpoint '{endpoint}': {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    #[error("Failed to connect to Flight SQL endpoint '{endpoint}'")]
    Connect {
        endpoint: String,
        #[source]
        source: tonic::transport::Error,
    },

    #[error("Statement execution failed: {0}")]
    Execute(#[source] ArrowError),

    #[error("Result stream failed: {0}")]
    Stream(#[from] FlightError),
}

impl From<FlightChannelError> for ParallaxError {
    fn from(err: FlightChannelError) -> Self {
        let message = err.to_string();
        match err {
            FlightChannelError::InvalidEndpoint { .. } => {
                ParallaxError::new(ErrorCode::InvalidUrl, message)
            }
            FlightChannelError::Connect { endpoint, source } => {
                ParallaxError::new(ErrorCode::ChannelUnavailable, format!("{}: {}", message, source))
                    .with_context(ErrorContext::Execution {
                        identifier: String::new(),
                        engine: Some(endpoint),
                    })
                    .with_hint("Check that the engine endpoint is reachable")
            }
            FlightChannelError::Execute(_) => ParallaxError::execution_failed(message),
            FlightChannelError::Stream(source) => {
                let code = ParallaxError::from(source).code;
                ParallaxError::new(code, message)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_error_keeps_grpc_classification() {
        let err = FlightChannelError::Stream(FlightError::from(tonic::Status::unauthenticated(
            "bad token",
        )));
        let converted = ParallaxError::from(err);
        assert_eq!(converted.code, ErrorCode::AuthenticationFailed);
        assert!(converted.message.starts_with("Result stream failed"));
    }

    #[test]
    fn test_execute_error_is_execution_failed() {
        let err = FlightChannelError::Execute(ArrowError::IpcError("boom".to_string()));
        assert_eq!(ParallaxError::from(err).code, ErrorCode::ExecutionFailed);
    }
}
