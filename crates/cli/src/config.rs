use anyhow::Result;
use parallax_common::config::{AppConfig, DEFAULT_CONFIG_FILE};
use std::env;

/// Values supplied on the command line; they win over the file and `PARALLAX__*` variables.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub engine_endpoint: Option<String>,
    pub engine_token: Option<String>,
    pub telemetry_host: Option<String>,
    pub telemetry_token: Option<String>,
    pub warehouse_id: Option<String>,
}

/// Resolve the config file path.
/// Priority: Arg > `PARALLAX_CONFIG` > default location.
pub fn config_path(path_arg: Option<&str>) -> String {
    path_arg
        .map(|s| s.to_string())
        .or_else(|| env::var("PARALLAX_CONFIG").ok())
        .unwrap_or_else(|| DEFAULT_CONFIG_FILE.to_string())
}

pub fn load(path_arg: Option<&str>, overrides: &Overrides) -> Result<AppConfig> {
    let path = config_path(path_arg);
    let mut config = AppConfig::from_file(&path)?;
    apply_overrides(&mut config, overrides);
    Ok(config)
}

pub fn apply_overrides(config: &mut AppConfig, overrides: &Overrides) {
    if let Some(endpoint) = &overrides.engine_endpoint {
        config.engine.endpoint = endpoint.clone();
    }
    if let Some(token) = &overrides.engine_token {
        config.engine.token = Some(token.clone());
    }
    if let Some(host) = &overrides.telemetry_host {
        config.telemetry.host = host.clone();
    }
    if let Some(token) = &overrides.telemetry_token {
        config.telemetry.token = Some(token.clone());
    }
    if let Some(warehouse) = &overrides.warehouse_id {
        config.telemetry.warehouse_id = Some(warehouse.clone());
    }
}
