//! Common utilities, types, and configurations shared across Parallax crates.
//!
//! This crate contains the base building blocks for the Parallax system, including:
//! - **Configuration**: Strongly typed application configuration (`config`).
//! - **Resilience**: Retry policies and delay schedules (`retry`).
//! - **Telemetry**: OTLP tracing setup (`telemetry`).
//! - **Logging**: Credential and PII scrubbing for log lines (`scrubber`).
pub mod config;
pub mod retry;
pub mod scrubber;
pub mod telemetry;
