//! # Error Contexts
//!
//! Structured metadata attached to errors for programmatic analysis.

use serde::{Deserialize, Serialize};

/// Structured context for errors.
///
/// Each variant provides the fields relevant to one failure area.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ErrorContext {
    /// Context for PLX-1xxx (primary execution)
    Execution {
        /// Identifier captured before the failure, empty if none was assigned
        identifier: String,
        engine: Option<String>,
    },

    /// Context for PLX-2xxx (telemetry API)
    Telemetry {
        operation: String,
        http_status: Option<u16>,
        /// Error code reported by the telemetry service body
        error_code: Option<String>,
        identifier: Option<String>,
    },

    /// Context for PLX-3xxx (correlation)
    Correlation {
        identifier: String,
        attempts: u32,
        elapsed_ms: u64,
    },

    /// Context for PLX-4xxx (config errors)
    Config {
        field: Option<String>,
        file_path: Option<String>,
    },

    /// Generic key-value context for extensibility
    Generic {
        #[serde(flatten)]
        data: std::collections::HashMap<String, serde_json::Value>,
    },
}
