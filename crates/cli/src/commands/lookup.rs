//! `lookup`: fetch the telemetry record for a known statement identifier.

use super::helpers::{print_record, telemetry_client};
use crate::exit_codes;
use crate::output::{self, OutputFormat};
use anyhow::Result;
use owo_colors::OwoColorize;
use parallax_common::config::AppConfig;
use parallax_core::{ExecutionRecord, Lookup, TelemetryApi};
use serde::Serialize;
use tracing::info;

#[derive(Serialize)]
pub struct LookupResult {
    pub identifier: String,
    pub found: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record: Option<ExecutionRecord>,
}

pub async fn lookup(identifier: &str, format: OutputFormat, config: &AppConfig) -> Result<i32> {
    let client = telemetry_client(config)?;
    info!(identifier, endpoint = ?config.telemetry.lookup_endpoint, "Looking up telemetry record");
    let result = match client.lookup_by_identifier(identifier).await? {
        Lookup::Found(record) => LookupResult {
            identifier: identifier.to_string(),
            found: true,
            record: Some(record),
        },
        Lookup::NotFound => LookupResult {
            identifier: identifier.to_string(),
            found: false,
            record: None,
        },
    };

    let code = if result.found {
        exit_codes::SUCCESS
    } else {
        exit_codes::PARTIAL_FAILURE
    };

    if format.is_machine_readable() {
        if result.found {
            output::print_success(format, &result)?;
        } else {
            output::print_partial(format, "Statement not found in telemetry", code, &result)?;
        }
        return Ok(code);
    }

    match &result.record {
        Some(record) => print_record("Telemetry record", record),
        None => println!(
            "{} statement '{}' is not visible in telemetry yet",
            "✘".red(),
            identifier.bold()
        ),
    }
    Ok(code)
}
