//! Parallax CLI: run a query on the primary engine and reconcile it with workspace telemetry.
//!
//! # Commands
//!
//! - `run`: Execute through the primary channel, correlate the telemetry record, compare.
//! - `lookup`: Fetch the telemetry record of a known statement identifier.
//! - `submit`: Execute directly through the telemetry API and wait for completion.
//! - `history`: Search the query history by statement text.
//!
//! Configuration comes from `config/parallax.yaml` (or `--config`), `PARALLAX__*`
//! environment variables, and the flags below, in increasing priority.

use clap::{Parser, Subcommand};
use dotenv::dotenv;
use owo_colors::OwoColorize;
use std::time::Duration;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry};

mod commands;
mod config;
mod exit_codes;
mod output;

use output::OutputFormat;

#[derive(Parser)]
#[command(name = "parallax")]
#[command(about = "Run queries on a primary engine and correlate them with workspace telemetry", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format (human, json, yaml)
    #[arg(long, global = true, value_enum, default_value = "human")]
    output: OutputFormat,

    /// Path to the configuration file
    #[arg(long, global = true, env = "PARALLAX_CONFIG")]
    config: Option<String>,

    /// Primary engine endpoint (grpc://, grpc+tls://)
    #[arg(long, global = true, env = "PARALLAX_ENGINE_ENDPOINT")]
    engine: Option<String>,

    /// Bearer token for the primary engine
    #[arg(long, global = true, env = "PARALLAX_ENGINE_TOKEN", hide_env_values = true)]
    engine_token: Option<String>,

    /// Workspace host of the telemetry API
    #[arg(long, global = true, env = "PARALLAX_HOST")]
    host: Option<String>,

    /// Bearer token for the telemetry API
    #[arg(long, global = true, env = "PARALLAX_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Warehouse used for statement execution
    #[arg(long, global = true, env = "PARALLAX_WAREHOUSE_ID")]
    warehouse_id: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a query on the primary engine and correlate its telemetry record
    Run {
        /// SQL statement to execute
        sql: String,
        /// Also submit the statement directly to the telemetry API and compare
        #[arg(long, default_value_t = false)]
        side_by_side: bool,
        /// Client correlation tag forwarded to the engine
        #[arg(long)]
        tag: Option<String>,
    },
    /// Look up the telemetry record for a statement identifier
    Lookup {
        /// Statement identifier reported by the engine
        identifier: String,
    },
    /// Execute a statement through the telemetry API and wait for it
    Submit {
        /// SQL statement to execute
        sql: String,
        /// Give up after this many seconds (defaults to the correlation deadline)
        #[arg(long)]
        timeout_secs: Option<u64>,
        /// Client correlation tag
        #[arg(long)]
        tag: Option<String>,
    },
    /// Search the query history for statements containing a text fragment
    History {
        /// Text to search for
        text: String,
        /// Only statements started after this point (RFC 3339 or 30m, 6h, 2d)
        #[arg(long)]
        since: Option<String>,
        /// Maximum number of entries
        #[arg(long)]
        limit: Option<u32>,
    },
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    dotenv().ok();

    let cli = Cli::parse();

    let overrides = config::Overrides {
        engine_endpoint: cli.engine.clone(),
        engine_token: cli.engine_token.clone(),
        telemetry_host: cli.host.clone(),
        telemetry_token: cli.token.clone(),
        warehouse_id: cli.warehouse_id.clone(),
    };

    let result = match config::load(cli.config.as_deref(), &overrides) {
        Ok(app_config) => {
            init_tracing(&app_config)?;
            tracing::debug!(output = ?cli.output, "Configuration loaded");
            let result = run_cli(&cli, &app_config).await;
            parallax_common::telemetry::shutdown_telemetry();
            result
        }
        Err(e) => Err(e),
    };

    match result {
        Ok(code) if code == exit_codes::SUCCESS => Ok(()),
        Ok(code) => std::process::exit(code),
        Err(e) => {
            let exit_code = exit_codes::map_error_to_exit_code(&e);
            if cli.output.is_machine_readable() {
                output::print_error(cli.output, &e, exit_code).ok();
            } else {
                eprintln!("{} {}", "Error:".red().bold(), e);
            }
            std::process::exit(exit_code);
        }
    }
}

fn init_tracing(app_config: &parallax_common::config::AppConfig) -> Result<(), anyhow::Error> {
    let otel_layer = parallax_common::telemetry::init_telemetry::<Registry>(&app_config.observability)?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(otel_layer)
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init()?;
    Ok(())
}

async fn run_cli(
    cli: &Cli,
    app_config: &parallax_common::config::AppConfig,
) -> Result<i32, anyhow::Error> {
    match &cli.command {
        Commands::Run {
            sql,
            side_by_side,
            tag,
        } => commands::run(sql, *side_by_side, tag.as_deref(), cli.output, app_config).await,
        Commands::Lookup { identifier } => {
            commands::lookup(identifier, cli.output, app_config).await
        }
        Commands::Submit {
            sql,
            timeout_secs,
            tag,
        } => {
            commands::submit(
                sql,
                timeout_secs.map(Duration::from_secs),
                tag.as_deref(),
                cli.output,
                app_config,
            )
            .await
        }
        Commands::History { text, since, limit } => {
            commands::history(text, since.as_deref(), *limit, cli.output, app_config).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_run_side_by_side() {
        let cli = Cli::try_parse_from([
            "parallax",
            "--output",
            "json",
            "run",
            "SELECT 1",
            "--side-by-side",
        ])
        .unwrap();
        assert_eq!(cli.output, OutputFormat::Json);
        match cli.command {
            Commands::Run {
                sql, side_by_side, ..
            } => {
                assert_eq!(sql, "SELECT 1");
                assert!(side_by_side);
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_parse_history_flags() {
        let cli =
            Cli::try_parse_from(["parallax", "history", "marker", "--since", "6h", "--limit", "5"])
                .unwrap();
        match cli.command {
            Commands::History { text, since, limit } => {
                assert_eq!(text, "marker");
                assert_eq!(since.as_deref(), Some("6h"));
                assert_eq!(limit, Some(5));
            }
            _ => panic!("expected history"),
        }
    }
}
