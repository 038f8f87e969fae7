use anyhow::{Context, Result};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use owo_colors::OwoColorize;
use parallax_common::config::AppConfig;
use parallax_connectors::sources::default_registry;
use parallax_core::model::{ComparisonResult, CorrelationOutcome, ExecutionRecord};
use parallax_core::{
    Comparison, CorrelationEngine, ExecutionContext, PrimaryExecutionClient, QueryRequest,
    TelemetryClient,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub fn telemetry_client(config: &AppConfig) -> Result<TelemetryClient> {
    Ok(TelemetryClient::new(config.telemetry.clone())?)
}

/// Connect the primary channel and wire it to the telemetry client.
///
/// Ctrl-C cancels the returned engine, including a primary call or lookup in flight.
pub async fn correlation_engine(config: &AppConfig) -> Result<CorrelationEngine> {
    let telemetry = telemetry_client(config)?;
    let channel = default_registry().connect(&config.engine).await?;
    info!(endpoint = %config.engine.endpoint, "Primary channel connected");

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted; cancelling the correlated run");
            on_interrupt.cancel();
        }
    });

    Ok(CorrelationEngine::new(
        PrimaryExecutionClient::new(channel),
        Arc::new(telemetry),
        config.correlation.clone(),
    )
    .with_cancellation(cancel))
}

pub fn build_request(sql: &str, tag: Option<&str>, config: &AppConfig) -> QueryRequest {
    QueryRequest::new(sql).with_context(ExecutionContext {
        warehouse_id: config.telemetry.warehouse_id.clone(),
        correlation_tag: tag.map(|t| t.to_string()),
        ..Default::default()
    })
}

/// Parse `--since`: RFC 3339 timestamps or a relative window such as `30m`, `6h`, `2d`.
pub fn parse_since(value: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Ok(ts.with_timezone(&Utc));
    }

    let value = value.trim();
    let split = value
        .find(|c: char| !c.is_ascii_digit())
        .context("usage: --since needs a unit (s, m, h, d) or an RFC 3339 timestamp")?;
    let (amount, unit) = value.split_at(split);
    let amount: i64 = amount
        .parse()
        .with_context(|| format!("usage: invalid --since value '{}'", value))?;

    let window = match unit {
        "s" => ChronoDuration::seconds(amount),
        "m" => ChronoDuration::minutes(amount),
        "h" => ChronoDuration::hours(amount),
        "d" => ChronoDuration::days(amount),
        other => anyhow::bail!("usage: unknown --since unit '{}'", other),
    };
    Ok(now - window)
}

pub fn format_ms(value: Option<u64>) -> String {
    match value {
        Some(ms) => format!("{} ms", ms),
        None => "n/a".to_string(),
    }
}

pub fn format_count(value: Option<u64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "n/a".to_string())
}

pub fn format_agreement(value: Option<bool>) -> &'static str {
    match value {
        Some(true) => "agree",
        Some(false) => "DIFFER",
        None => "n/a",
    }
}

pub fn outcome_label(outcome: CorrelationOutcome) -> &'static str {
    match outcome {
        CorrelationOutcome::Matched => "matched",
        CorrelationOutcome::Exhausted => "exhausted",
        CorrelationOutcome::DeadlineExceeded => "deadline exceeded",
        CorrelationOutcome::SkippedNoIdentifier => "skipped (no identifier)",
    }
}

/// One-line summary used as the machine-output message and the human headline.
pub fn summary_line(result: &ComparisonResult) -> String {
    format!(
        "{} after {} attempt(s); duration delta {}",
        outcome_label(result.outcome),
        result.correlation_attempts,
        format_ms(result.duration_delta_ms)
    )
}

pub fn print_record(title: &str, record: &ExecutionRecord) {
    println!("{}", title.bold().cyan());
    let identifier = if record.identifier.is_empty() {
        "(none)".dimmed().to_string()
    } else {
        record.identifier.bold().to_string()
    };
    println!("  {} {}", "Identifier:".dimmed(), identifier);
    println!("  {} {:?}", "Status:".dimmed(), record.status);
    println!(
        "  {} {} {}",
        "Duration:".dimmed(),
        format_ms(record.duration_ms),
        format!("({:?})", record.timing_basis).dimmed()
    );
    if record.drain_duration_ms.is_some() {
        println!(
            "  {} {}",
            "Drain duration:".dimmed(),
            format_ms(record.drain_duration_ms)
        );
    }
    if record.reported_duration_ms.is_some() {
        println!(
            "  {} {}",
            "Reported duration:".dimmed(),
            format_ms(record.reported_duration_ms)
        );
    }
    println!("  {} {}", "Rows:".dimmed(), format_count(record.row_count));
    println!("  {} {}", "Columns:".dimmed(), format_count(record.column_count));
    if let Some(detail) = &record.error_detail {
        println!("  {} {}", "Error:".red(), detail);
    }
}

pub fn print_comparison(comparison: &Comparison) {
    println!("{}", "Comparison".bold().cyan());
    println!(
        "  {} {}",
        "Duration delta:".dimmed(),
        format_ms(comparison.duration_delta_ms)
    );
    println!(
        "  {} {}",
        "Row count:".dimmed(),
        format_agreement(comparison.row_count_agreement)
    );
    println!(
        "  {} {}",
        "Column count:".dimmed(),
        format_agreement(comparison.column_count_agreement)
    );
}
