//! `submit`: run a statement directly through the telemetry API and wait for it.

use super::helpers::{build_request, print_record, telemetry_client};
use crate::exit_codes;
use crate::output::{self, OutputFormat};
use anyhow::Result;
use parallax_common::config::AppConfig;
use parallax_core::{ExecutionStatus, TelemetryApi};
use std::time::Duration;
use tracing::info;

pub async fn submit(
    sql: &str,
    timeout: Option<Duration>,
    tag: Option<&str>,
    format: OutputFormat,
    config: &AppConfig,
) -> Result<i32> {
    let client = telemetry_client(config)?;
    let request = build_request(sql, tag, config);
    let timeout = timeout.unwrap_or_else(|| config.correlation.deadline());

    info!(timeout_ms = timeout.as_millis() as u64, "Submitting statement to the telemetry API");
    let record = client.submit_and_wait(&request, timeout).await?;
    info!(identifier = %record.identifier, status = ?record.status, "Statement returned");
    let code = match record.status {
        ExecutionStatus::Succeeded => exit_codes::SUCCESS,
        ExecutionStatus::Failed | ExecutionStatus::Cancelled => exit_codes::EXECUTION_ERROR,
        _ => exit_codes::PARTIAL_FAILURE,
    };

    if format.is_machine_readable() {
        if code == exit_codes::SUCCESS {
            output::print_success(format, &record)?;
        } else {
            let message = format!("Statement finished as {:?}", record.status);
            output::print_partial(format, &message, code, &record)?;
        }
        return Ok(code);
    }

    print_record("Submitted statement", &record);
    Ok(code)
}
