//! `history`: search the query history for statements containing a text fragment.

use super::helpers::{format_ms, parse_since, telemetry_client};
use crate::output::{self, OutputFormat};
use anyhow::Result;
use chrono::Utc;
use owo_colors::OwoColorize;
use parallax_common::config::AppConfig;
use parallax_common::scrubber::scrub_truncated;
use parallax_core::HistoryEntry;
use serde::Serialize;
use tracing::{debug, info};

const STATEMENT_PREVIEW_CHARS: usize = 80;

#[derive(Serialize)]
pub struct HistoryResult {
    pub entries: Vec<HistoryEntry>,
}

pub async fn history(
    text: &str,
    since: Option<&str>,
    limit: Option<u32>,
    format: OutputFormat,
    config: &AppConfig,
) -> Result<i32> {
    let since = since.map(|s| parse_since(s, Utc::now())).transpose()?;
    let client = telemetry_client(config)?;
    debug!(since = ?since, limit = ?limit, "Searching query history");
    let entries = client.search_history(text, since, limit).await?;
    info!(matches = entries.len(), "History search finished");

    if format.is_machine_readable() {
        output::print_success(format, HistoryResult { entries })?;
        return Ok(0);
    }

    if entries.is_empty() {
        println!("No matching statements.");
        return Ok(0);
    }

    for entry in &entries {
        println!(
            "{} {} {:?}",
            "•".cyan(),
            entry.statement_id.bold(),
            entry.execution_status
        );
        println!(
            "    {} {}  {} {}  {} {}",
            "started".dimmed(),
            entry.start_time.as_deref().unwrap_or("n/a"),
            "duration".dimmed(),
            format_ms(entry.total_duration_ms),
            "rows".dimmed(),
            entry
                .produced_rows
                .map(|r| r.to_string())
                .unwrap_or_else(|| "n/a".to_string())
        );
        if let Some(user) = &entry.executed_by {
            println!("    {} {}", "by".dimmed(), user);
        }
        if let Some(statement) = &entry.statement_text {
            println!(
                "    {}",
                scrub_truncated(statement, STATEMENT_PREVIEW_CHARS).dimmed()
            );
        }
    }
    Ok(0)
}
