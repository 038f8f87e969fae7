use parallax_error::{ErrorCode, ErrorContext, ParallaxError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use validator::{Validate, ValidationError};

// Default constants
pub const DEFAULT_ENV_PREFIX: &str = "PARALLAX";
pub const DEFAULT_CONFIG_FILE: &str = "config/parallax.yaml";

pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 5000;
pub const DEFAULT_ENGINE_CALL_TIMEOUT_MS: u64 = 300_000;

pub const DEFAULT_TELEMETRY_CALL_TIMEOUT_MS: u64 = 60_000;
pub const DEFAULT_SUBMIT_WAIT_TIMEOUT_SECS: u32 = 30;
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_FIXED_DELAYS_MS: [u64; 3] = [0, 2000, 5000];
pub const DEFAULT_PER_CALL_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_DEADLINE_MS: u64 = 60_000;

pub const DEFAULT_OBSERVABILITY_ENABLED: bool = false;
pub const DEFAULT_OTLP_ENDPOINT: &str = "http://localhost:4317";
pub const DEFAULT_SERVICE_NAME: &str = "parallax";

#[derive(Debug, Deserialize, Serialize, Default, Clone, Validate)]
pub struct AppConfig {
    #[serde(default)]
    #[validate(nested)]
    pub engine: EngineSettings,
    #[serde(default)]
    #[validate(nested)]
    pub telemetry: TelemetryApiSettings,
    #[serde(default)]
    #[validate(nested)]
    pub correlation: CorrelationSettings,
    #[serde(default)]
    #[validate(nested)]
    pub observability: ObservabilityConfig,
}

/// Connection settings for the primary (Flight SQL) channel.
#[derive(Debug, Deserialize, Serialize, Clone, Validate)]
pub struct EngineSettings {
    #[serde(default)]
    #[validate(custom(function = "validate_optional_url"))]
    pub endpoint: String,

    #[serde(default, skip_serializing)]
    pub token: Option<String>,

    #[serde(default = "default_connect_timeout_ms")]
    #[validate(range(min = 1))]
    pub connect_timeout_ms: u64,

    #[serde(default = "default_engine_call_timeout_ms")]
    #[validate(range(min = 1))]
    pub call_timeout_ms: u64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            token: None,
            connect_timeout_ms: default_connect_timeout_ms(),
            call_timeout_ms: default_engine_call_timeout_ms(),
        }
    }
}

impl EngineSettings {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }
}

/// Which telemetry endpoint answers identifier lookups.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LookupEndpoint {
    /// `GET /api/2.0/sql/history/queries/{id}`: server-side timing.
    #[default]
    QueryHistory,
    /// `GET /api/2.0/sql/statements/{id}`: manifest counts, no server timing.
    Statement,
}

#[derive(Debug, Deserialize, Serialize, Clone, Validate)]
pub struct TelemetryApiSettings {
    /// Workspace host, with or without scheme.
    #[serde(default)]
    pub host: String,

    #[serde(default, skip_serializing)]
    pub token: Option<String>,

    #[serde(default)]
    pub warehouse_id: Option<String>,

    #[serde(default = "default_telemetry_call_timeout_ms")]
    #[validate(range(min = 1))]
    pub call_timeout_ms: u64,

    #[serde(default = "default_submit_wait_timeout_secs")]
    #[validate(custom(function = "validate_wait_timeout"))]
    pub submit_wait_timeout_secs: u32,

    #[serde(default = "default_poll_interval_ms")]
    #[validate(range(min = 1))]
    pub poll_interval_ms: u64,

    #[serde(default)]
    pub lookup_endpoint: LookupEndpoint,
}

impl Default for TelemetryApiSettings {
    fn default() -> Self {
        Self {
            host: String::new(),
            token: None,
            warehouse_id: None,
            call_timeout_ms: default_telemetry_call_timeout_ms(),
            submit_wait_timeout_secs: default_submit_wait_timeout_secs(),
            poll_interval_ms: default_poll_interval_ms(),
            lookup_endpoint: LookupEndpoint::default(),
        }
    }
}

impl TelemetryApiSettings {
    /// Base URL of the workspace API. Bare hosts get an `https://` scheme.
    pub fn base_url(&self) -> String {
        let host = self.host.trim().trim_end_matches('/');
        if host.contains("://") {
            host.to_string()
        } else {
            format!("https://{}", host)
        }
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Server-side wait in the `"{n}s"` form the statements API expects.
    pub fn wait_timeout_param(&self) -> String {
        format!("{}s", self.submit_wait_timeout_secs)
    }
}

/// Delay schedule between telemetry lookups.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackoffSettings {
    /// Delay before attempt `n` is `delays_ms[n - 1]`; the last entry repeats.
    Fixed { delays_ms: Vec<u64> },
    /// No delay before the first attempt, then `base_ms * 2^(n - 2)` capped at `max_ms`.
    Exponential {
        base_ms: u64,
        max_ms: u64,
        #[serde(default)]
        jitter_ms: u64,
    },
}

impl Default for BackoffSettings {
    fn default() -> Self {
        BackoffSettings::Fixed {
            delays_ms: DEFAULT_FIXED_DELAYS_MS.to_vec(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Validate)]
#[validate(schema(function = "validate_correlation"))]
pub struct CorrelationSettings {
    #[serde(default = "default_max_attempts")]
    #[validate(range(min = 1, max = 100))]
    pub max_attempts: u32,

    #[serde(default)]
    pub backoff: BackoffSettings,

    #[serde(default = "default_per_call_timeout_ms")]
    #[validate(range(min = 1))]
    pub per_call_timeout_ms: u64,

    #[serde(default = "default_deadline_ms")]
    #[validate(range(min = 1))]
    pub deadline_ms: u64,

    /// Look up the telemetry record of a failed primary execution when an identifier was captured.
    #[serde(default)]
    pub lookup_failed_executions: bool,
}

impl Default for CorrelationSettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff: BackoffSettings::default(),
            per_call_timeout_ms: default_per_call_timeout_ms(),
            deadline_ms: default_deadline_ms(),
            lookup_failed_executions: false,
        }
    }
}

impl CorrelationSettings {
    pub fn per_call_timeout(&self) -> Duration {
        Duration::from_millis(self.per_call_timeout_ms)
    }

    pub fn deadline(&self) -> Duration {
        Duration::from_millis(self.deadline_ms)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Validate)]
pub struct ObservabilityConfig {
    #[serde(default = "default_observability_enabled")]
    pub enabled: bool,

    #[serde(default = "default_otlp_endpoint")]
    #[validate(url)]
    pub endpoint: String,

    #[serde(default = "default_service_name")]
    pub service_name: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            enabled: default_observability_enabled(),
            endpoint: default_otlp_endpoint(),
            service_name: default_service_name(),
        }
    }
}

fn default_connect_timeout_ms() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_MS
}

fn default_engine_call_timeout_ms() -> u64 {
    DEFAULT_ENGINE_CALL_TIMEOUT_MS
}

fn default_telemetry_call_timeout_ms() -> u64 {
    DEFAULT_TELEMETRY_CALL_TIMEOUT_MS
}

fn default_submit_wait_timeout_secs() -> u32 {
    DEFAULT_SUBMIT_WAIT_TIMEOUT_SECS
}

fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

fn default_per_call_timeout_ms() -> u64 {
    DEFAULT_PER_CALL_TIMEOUT_MS
}

fn default_deadline_ms() -> u64 {
    DEFAULT_DEADLINE_MS
}

fn default_observability_enabled() -> bool {
    DEFAULT_OBSERVABILITY_ENABLED
}

fn default_otlp_endpoint() -> String {
    DEFAULT_OTLP_ENDPOINT.to_string()
}

fn default_service_name() -> String {
    DEFAULT_SERVICE_NAME.to_string()
}

fn validate_optional_url(url: &str) -> std::result::Result<(), ValidationError> {
    if url.is_empty() {
        return Ok(()); // Checked where the channel is actually opened
    }

    match url::Url::parse(url) {
        Ok(_) => Ok(()),
        Err(_) => Err(ValidationError::new("invalid_url")),
    }
}

// The statements API accepts 0 (asynchronous) or 5 to 50 seconds.
fn validate_wait_timeout(secs: u32) -> std::result::Result<(), ValidationError> {
    if secs == 0 || (5..=50).contains(&secs) {
        Ok(())
    } else {
        Err(ValidationError::new("wait_timeout_out_of_range"))
    }
}

fn validate_correlation(settings: &CorrelationSettings) -> std::result::Result<(), ValidationError> {
    if settings.per_call_timeout_ms >= settings.deadline_ms {
        return Err(ValidationError::new("per_call_timeout_not_below_deadline"));
    }

    match &settings.backoff {
        BackoffSettings::Fixed { delays_ms } => {
            if delays_ms.is_empty() {
                return Err(ValidationError::new("empty_delay_schedule"));
            }
            if delays_ms.windows(2).any(|w| w[0] >= w[1]) {
                return Err(ValidationError::new("delays_not_strictly_increasing"));
            }
        }
        BackoffSettings::Exponential { base_ms, max_ms, .. } => {
            if *base_ms == 0 || base_ms > max_ms {
                return Err(ValidationError::new("invalid_exponential_bounds"));
            }
        }
    }

    Ok(())
}

// Config implementation
impl AppConfig {
    pub fn from_file(path: &str) -> Result<Self> {
        let builder = config::Config::builder();

        let builder = if std::path::Path::new(path).exists() {
            builder.add_source(config::File::with_name(path))
        } else {
            builder
        };

        // Map PARALLAX__TELEMETRY__HOST to telemetry.host, etc.
        let builder = builder.add_source(
            config::Environment::with_prefix(DEFAULT_ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let cfg = builder.build().map_err(|e| config_error(path, e))?;

        let app_config: AppConfig = cfg.try_deserialize().map_err(|e| config_error(path, e))?;

        app_config.validate().map_err(|e| {
            ParallaxError::config(format!("Configuration validation failed: {}", e))
                .with_context(ErrorContext::Config {
                    field: e.errors().keys().next().map(|k| k.to_string()),
                    file_path: Some(path.to_string()),
                })
        })?;

        Ok(app_config)
    }
}

fn config_error(path: &str, e: config::ConfigError) -> ParallaxError {
    let code = match &e {
        config::ConfigError::NotFound(_) => ErrorCode::MissingRequiredField,
        _ => ErrorCode::InvalidConfig,
    };
    ParallaxError::new(code, format!("Failed to load configuration: {}", e))
        .with_context(ErrorContext::Config {
            field: None,
            file_path: Some(path.to_string()),
        })
        .with_hint("Check the YAML file and PARALLAX__* environment variables")
}
