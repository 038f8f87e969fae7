//! Arrow Flight SQL primary channel.
//!
//! Submits statements with `CommandStatementQuery`, reports the server-assigned statement
//! identifier through the hook, and streams the result through `do_get` for every
//! endpoint of the returned `FlightInfo`.
use arrow::record_batch::RecordBatch;
use arrow_flight::decode::FlightRecordBatchStream;
use arrow_flight::sql::client::FlightSqlServiceClient;
use arrow_flight::{FlightInfo, Ticket};
use async_trait::async_trait;
use futures::StreamExt;
use parallax_common::config::EngineSettings;
use parallax_common::retry::{retry_async, RetryPolicy, RetrySchedule};
use parallax_core::{IdentifierHook, PrimaryChannel, QueryRequest, ResultHandle};
use parallax_error::{ParallaxError, Result};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tonic::transport::{Channel, ClientTlsConfig, Endpoint};
use tracing::{debug, info};

use super::ChannelProvider;

pub mod error;

pub use error::FlightChannelError;

/// Header carrying the caller's correlation tag.
pub const CORRELATION_HEADER: &str = "x-correlation-id";

const CONNECT_ATTEMPTS: u32 = 3;
const CONNECT_BASE_DELAY_MS: u64 = 250;
const CONNECT_MAX_DELAY_MS: u64 = 2000;
const CONNECT_JITTER_MS: u64 = 100;

pub struct FlightSqlChannelProvider;

#[async_trait]
impl ChannelProvider for FlightSqlChannelProvider {
    fn type_name(&self) -> &'static str {
        "flight_sql"
    }

    fn schemes(&self) -> &'static [&'static str] {
        &["grpc", "grpc+tls", "http", "https"]
    }

    async fn connect(&self, settings: &EngineSettings) -> Result<Arc<dyn PrimaryChannel>> {
        Ok(Arc::new(FlightSqlChannel::connect(settings).await?))
    }
}

pub struct FlightSqlChannel {
    channel: Channel,
    token: Option<String>,
}

impl FlightSqlChannel {
    pub async fn connect(settings: &EngineSettings) -> Result<Self> {
        let endpoint = endpoint_for(settings)?;
        let policy = RetryPolicy::new(
            CONNECT_ATTEMPTS,
            RetrySchedule::Exponential {
                base: Duration::from_millis(CONNECT_BASE_DELAY_MS),
                max: Duration::from_millis(CONNECT_MAX_DELAY_MS),
                jitter: Duration::from_millis(CONNECT_JITTER_MS),
            },
        );

        info!("Connecting to Flight SQL endpoint: {}", settings.endpoint);
        let channel = retry_async("flight_sql_connect", &policy, || {
            let endpoint = endpoint.clone();
            let target = settings.endpoint.clone();
            async move {
                endpoint.connect().await.map_err(|source| {
                    ParallaxError::from(FlightChannelError::Connect {
                        endpoint: target,
                        source,
                    })
                })
            }
        })
        .await?;

        Ok(Self {
            channel,
            token: settings.token.clone(),
        })
    }

    fn client(&self, correlation_tag: Option<&str>) -> FlightSqlServiceClient<Channel> {
        let mut client = FlightSqlServiceClient::new(self.channel.clone());
        if let Some(token) = &self.token {
            client.set_token(token.clone());
        }
        if let Some(tag) = correlation_tag {
            client.set_header(CORRELATION_HEADER, tag);
        }
        client
    }
}

#[async_trait]
impl PrimaryChannel for FlightSqlChannel {
    fn name(&self) -> &str {
        "flight_sql"
    }

    async fn submit(
        &self,
        request: &QueryRequest,
        hook: IdentifierHook,
    ) -> Result<Box<dyn ResultHandle>> {
        let mut client = self.client(request.correlation_tag());

        let info = client
            .execute(request.statement().to_string(), None)
            .await
            .map_err(FlightChannelError::Execute)?;

        match statement_identifier(&info) {
            Some(identifier) => {
                debug!(identifier = %identifier, "Flight SQL assigned statement identifier");
                hook.capture(identifier);
            }
            None => debug!("Flight SQL response carried no statement identifier"),
        }

        let column_count = info
            .clone()
            .try_decode_schema()
            .ok()
            .map(|schema| schema.fields().len());
        let tickets: VecDeque<Ticket> = info
            .endpoint
            .into_iter()
            .filter_map(|endpoint| endpoint.ticket)
            .collect();

        Ok(Box::new(FlightResultHandle {
            client,
            tickets,
            current: None,
            column_count,
        }))
    }
}

/// Streams the batches of every endpoint in order.
pub struct FlightResultHandle {
    client: FlightSqlServiceClient<Channel>,
    tickets: VecDeque<Ticket>,
    current: Option<FlightRecordBatchStream>,
    column_count: Option<usize>,
}

#[async_trait]
impl ResultHandle for FlightResultHandle {
    fn column_count(&self) -> Option<usize> {
        self.column_count
    }

    async fn next_batch(&mut self) -> Result<Option<RecordBatch>> {
        loop {
            if let Some(stream) = self.current.as_mut() {
                match stream.next().await {
                    Some(batch) => return Ok(Some(batch.map_err(FlightChannelError::Stream)?)),
                    None => self.current = None,
                }
            }

            let Some(ticket) = self.tickets.pop_front() else {
                return Ok(None);
            };
            let stream = self
                .client
                .do_get(ticket)
                .await
                .map_err(FlightChannelError::Execute)?;
            self.current = Some(stream);
        }
    }
}

/// The identifier the server assigned to an executed statement.
///
/// Servers report it in `FlightInfo.app_metadata`; some echo it as a plain-text
/// descriptor command instead.
pub fn statement_identifier(info: &FlightInfo) -> Option<String> {
    text_token(&info.app_metadata).or_else(|| {
        info.flight_descriptor
            .as_ref()
            .and_then(|descriptor| text_token(&descriptor.cmd))
    })
}

fn text_token(bytes: &[u8]) -> Option<String> {
    let text = std::str::from_utf8(bytes).ok()?.trim();
    if text.is_empty() || text.chars().any(char::is_control) {
        return None;
    }
    Some(text.to_string())
}

fn endpoint_for(settings: &EngineSettings) -> Result<Endpoint> {
    let (uri, tls) = match settings.endpoint.split_once("://") {
        Some(("grpc", rest)) => (format!("http://{}", rest), false),
        Some(("grpc+tls", rest)) => (format!("https://{}", rest), true),
        Some(("https", _)) => (settings.endpoint.clone(), true),
        _ => (settings.endpoint.clone(), false),
    };

    let invalid = |reason: String| FlightChannelError::InvalidEndpoint {
        endpoint: settings.endpoint.clone(),
        reason,
    };

    let mut endpoint = Channel::from_shared(uri)
        .map_err(|e| invalid(e.to_string()))?
        .connect_timeout(settings.connect_timeout())
        .timeout(settings.call_timeout());

    if tls {
        endpoint = endpoint
            .tls_config(ClientTlsConfig::new().with_webpki_roots())
            .map_err(|e| invalid(e.to_string()))?;
    }

    Ok(endpoint)
}
