//! `run`: execute a query on the primary engine and correlate its telemetry record.
//!
//! With `--side-by-side` the same statement is also submitted directly to the telemetry
//! API and both executions are compared against the primary record.

use super::helpers::{
    build_request, correlation_engine, print_comparison, print_record, summary_line,
};
use crate::exit_codes;
use crate::output::{self, OutputFormat};
use anyhow::Result;
use owo_colors::OwoColorize;
use parallax_common::config::AppConfig;
use parallax_core::model::{ComparisonResult, CorrelationOutcome};
use tracing::info;

pub async fn run(
    sql: &str,
    side_by_side: bool,
    tag: Option<&str>,
    format: OutputFormat,
    config: &AppConfig,
) -> Result<i32> {
    let engine = correlation_engine(config).await?;
    let request = build_request(sql, tag, config);
    info!(side_by_side, tag = tag.unwrap_or_default(), "Starting correlated run");

    if !format.is_machine_readable() {
        println!(
            "{} {}",
            "Running on".dimmed(),
            config.engine.endpoint.yellow()
        );
    }

    if side_by_side {
        let report = engine.run_side_by_side(&request).await?;
        info!(
            outcome = ?report.correlated.outcome,
            independent_failed = report.independent_error.is_some(),
            "Side-by-side run finished"
        );
        let code = exit_code_for(&report.correlated);
        let message = summary_line(&report.correlated);

        if format.is_machine_readable() {
            emit(format, code, &message, &report)?;
            return Ok(code);
        }

        print_result(&report.correlated);
        println!();
        match (&report.independent, &report.independent_error) {
            (Some(record), _) => {
                print_record("Independent execution", record);
                if let Some(comparison) = &report.independent_comparison {
                    print_comparison(comparison);
                }
            }
            (None, Some(err)) => {
                println!("{} {}", "Independent execution failed:".red(), err);
            }
            (None, None) => {}
        }
        return Ok(code);
    }

    let result = engine.run(&request).await?;
    info!(
        identifier = %result.primary.identifier,
        outcome = ?result.outcome,
        attempts = result.correlation_attempts,
        "Correlated run finished"
    );
    let code = exit_code_for(&result);

    if format.is_machine_readable() {
        emit(format, code, &summary_line(&result), &result)?;
    } else {
        print_result(&result);
    }
    Ok(code)
}

fn exit_code_for(result: &ComparisonResult) -> i32 {
    if result.correlation_succeeded {
        exit_codes::SUCCESS
    } else {
        exit_codes::PARTIAL_FAILURE
    }
}

fn emit<T: serde::Serialize>(format: OutputFormat, code: i32, message: &str, data: T) -> Result<()> {
    if code == exit_codes::SUCCESS {
        output::print_success(format, data)
    } else {
        output::print_partial(format, message, code, data)
    }
}

fn print_result(result: &ComparisonResult) {
    print_record("Primary execution", &result.primary);
    println!();
    match &result.telemetry {
        Some(record) => print_record("Telemetry record", record),
        None => println!("{}", "Telemetry record: not available".yellow()),
    }
    println!();
    print_comparison(&result.comparison());
    println!();

    let headline = format!("Correlation {}", summary_line(result));
    if result.correlation_succeeded {
        println!("{} {}", "✔".green(), headline.bold());
    } else {
        println!("{} {}", "✘".red(), headline.bold());
        if result.outcome == CorrelationOutcome::SkippedNoIdentifier {
            println!(
                "  {}",
                "The engine did not report a statement identifier".dimmed()
            );
        }
    }
}
