//! Primary channel abstractions and implementations.
//!
//! Each channel type implements `ChannelProvider`, which turns the engine settings into a
//! connected `PrimaryChannel`. The registry picks the provider from the endpoint URL scheme.
//!
//! # Supported Channels
//!
//! | Scheme | Implementation | Description |
//! |--------|----------------|-------------|
//! | `grpc`, `grpc+tls`, `http`, `https` | `FlightSqlChannelProvider` | Arrow Flight SQL over gRPC |
//!
//! # Adding a New Channel
//!
//! 1. Implement `PrimaryChannel` so that it fires the identifier hook once submission succeeds.
//! 2. Implement `ChannelProvider` for it.
//! 3. Register the provider in `default_registry` in this module.

use async_trait::async_trait;
use parallax_common::config::EngineSettings;
use parallax_core::PrimaryChannel;
use parallax_error::{ErrorCode, ErrorContext, ParallaxError, Result};
use std::collections::HashMap;
use std::sync::Arc;

pub mod flight;

#[async_trait]
pub trait ChannelProvider: Send + Sync {
    /// Returns the type of channel this provider opens (e.g., "flight_sql")
    fn type_name(&self) -> &'static str;

    /// URL schemes this provider accepts
    fn schemes(&self) -> &'static [&'static str];

    async fn connect(&self, settings: &EngineSettings) -> Result<Arc<dyn PrimaryChannel>>;
}

#[derive(Default)]
pub struct ChannelRegistry {
    providers: HashMap<&'static str, Arc<dyn ChannelProvider>>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_provider(&mut self, provider: Arc<dyn ChannelProvider>) {
        for scheme in provider.schemes() {
            self.providers.insert(*scheme, provider.clone());
        }
    }

    pub async fn connect(&self, settings: &EngineSettings) -> Result<Arc<dyn PrimaryChannel>> {
        if settings.endpoint.trim().is_empty() {
            return Err(ParallaxError::new(
                ErrorCode::MissingRequiredField,
                "Primary engine endpoint is not configured",
            )
            .with_context(ErrorContext::Config {
                field: Some("engine.endpoint".to_string()),
                file_path: None,
            })
            .with_hint("Set engine.endpoint or PARALLAX__ENGINE__ENDPOINT"));
        }

        let url = url::Url::parse(&settings.endpoint).map_err(|e| {
            ParallaxError::new(
                ErrorCode::InvalidUrl,
                format!("Invalid engine endpoint '{}': {}", settings.endpoint, e),
            )
        })?;

        match self.providers.get(url.scheme()) {
            Some(provider) => {
                tracing::info!(
                    channel = provider.type_name(),
                    endpoint = %settings.endpoint,
                    "Opening primary channel"
                );
                provider.connect(settings).await
            }
            None => Err(ParallaxError::new(
                ErrorCode::InvalidUrl,
                format!("No channel provider for scheme: {}", url.scheme()),
            )),
        }
    }
}

pub fn default_registry() -> ChannelRegistry {
    let mut registry = ChannelRegistry::new();
    registry.register_provider(Arc::new(flight::FlightSqlChannelProvider));
    registry
}
