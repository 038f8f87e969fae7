//! Structured output handling for CLI commands.

use serde::Serialize;

#[derive(clap::ValueEnum, Clone, Debug, Default, PartialEq, Eq, Copy)]
pub enum OutputFormat {
    #[default]
    Human,
    Json,
    Yaml,
}

impl OutputFormat {
    /// Returns true if the output format is intended for machine consumption
    pub fn is_machine_readable(&self) -> bool {
        match self {
            OutputFormat::Human => false,
            OutputFormat::Json | OutputFormat::Yaml => true,
        }
    }
}

/// Envelope for machine-readable responses
#[derive(Serialize)]
pub struct CommandResponse<T> {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<parallax_error::ParallaxError>,
    #[serde(flatten)]
    pub data: T,
}

impl<T> CommandResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            status: "success".to_string(),
            message: None,
            exit_code: Some(0),
            error: None,
            data,
        }
    }

    /// Completed command whose result still warrants a non-zero exit
    pub fn partial(message: String, exit_code: i32, data: T) -> Self {
        Self {
            status: "partial".to_string(),
            message: Some(message),
            exit_code: Some(exit_code),
            error: None,
            data,
        }
    }

    pub fn error(
        message: String,
        exit_code: i32,
        error: Option<parallax_error::ParallaxError>,
        data: T,
    ) -> Self {
        Self {
            status: "error".to_string(),
            message: Some(message),
            exit_code: Some(exit_code),
            error,
            data,
        }
    }
}

/// Render `data` in the requested machine format
pub fn render<T: Serialize>(format: OutputFormat, data: &T) -> anyhow::Result<String> {
    match format {
        // Human output is printed by the commands themselves.
        OutputFormat::Human => Ok(String::new()),
        OutputFormat::Json => Ok(serde_json::to_string_pretty(data)?),
        OutputFormat::Yaml => Ok(serde_yaml::to_string(data)?),
    }
}

/// Print the output to stdout in the requested format
pub fn print_output<T: Serialize>(format: OutputFormat, data: T) -> anyhow::Result<()> {
    if format == OutputFormat::Human {
        return Ok(());
    }
    println!("{}", render(format, &data)?);
    Ok(())
}

/// Print a structured success response for machine outputs
pub fn print_success<T: Serialize>(format: OutputFormat, data: T) -> anyhow::Result<()> {
    print_output(format, CommandResponse::success(data))
}

/// Print a structured partial response for machine outputs
pub fn print_partial<T: Serialize>(
    format: OutputFormat,
    message: &str,
    exit_code: i32,
    data: T,
) -> anyhow::Result<()> {
    print_output(
        format,
        CommandResponse::partial(message.to_string(), exit_code, data),
    )
}

/// Print a structured error response for machine outputs
/// Note: In Human mode, errors are printed to stderr by main's error handler.
pub fn print_error(format: OutputFormat, err: &anyhow::Error, exit_code: i32) -> anyhow::Result<()> {
    let structured = err.downcast_ref::<parallax_error::ParallaxError>().cloned();
    print_output(
        format,
        CommandResponse::error(err.to_string(), exit_code, structured, Empty {}),
    )
}

#[derive(Serialize, Default)]
pub struct Empty {}

#[cfg(test)]
mod tests {
    use super::*;
    use parallax_error::{ErrorCode, ParallaxError};
    use serde_json::Value;

    #[derive(Serialize)]
    struct Payload {
        identifier: String,
    }

    #[test]
    fn test_success_envelope_flattens_data() {
        let response = CommandResponse::success(Payload {
            identifier: "01f0".to_string(),
        });
        let json: Value =
            serde_json::from_str(&render(OutputFormat::Json, &response).unwrap()).unwrap();
        assert_eq!(json["status"], "success");
        assert_eq!(json["exit_code"], 0);
        assert_eq!(json["identifier"], "01f0");
        assert!(json.get("message").is_none());
        assert!(json.get("error").is_none());
    }

    #[test]
    fn test_error_envelope_carries_structured_error() {
        let err = ParallaxError::new(ErrorCode::TelemetryFatal, "denied");
        let response = CommandResponse::error("denied".to_string(), 6, Some(err), Empty {});
        let yaml = render(OutputFormat::Yaml, &response).unwrap();
        let value: serde_yaml::Value = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(value["status"], serde_yaml::Value::from("error"));
        assert_eq!(value["error"]["code"], serde_yaml::Value::from("PLX-2002"));
    }

    #[test]
    fn test_human_render_is_empty() {
        assert_eq!(render(OutputFormat::Human, &Empty {}).unwrap(), "");
        assert!(!OutputFormat::Human.is_machine_readable());
        assert!(OutputFormat::Json.is_machine_readable());
    }
}
