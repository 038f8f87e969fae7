use super::normalize;
use super::wire::{ApiErrorBody, QueryInfo, StatementRequest, StatementResponse};
use super::{HistoryEntry, Lookup, TelemetryApi};
use crate::events::CorrelationTelemetry;
use crate::model::{
    Disposition, ExecutionContext, ExecutionRecord, ExecutionStatus, QueryRequest, ResultFormat,
    TimingBasis,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parallax_common::config::{LookupEndpoint, TelemetryApiSettings};
use parallax_common::scrubber::scrub_truncated;
use parallax_error::{ErrorCode, ErrorContext, ParallaxError, Result};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use url::Url;

const STATEMENTS_PATH: [&str; 4] = ["api", "2.0", "sql", "statements"];
const HISTORY_PATH: [&str; 5] = ["api", "2.0", "sql", "history", "queries"];

/// Error codes the workspace API uses for identifiers it does not know (yet).
const NOT_FOUND_ERROR_CODES: [&str; 2] = ["RESOURCE_DOES_NOT_EXIST", "NOT_FOUND"];

/// Longest error body kept in messages and logs.
const MAX_ERROR_BODY_CHARS: usize = 512;

/// Server-side wait bounds accepted by the statements API.
const MIN_WAIT_SECS: u64 = 5;
const MAX_WAIT_SECS: u64 = 50;

const DEFAULT_HISTORY_LIMIT: u32 = 5;

/// REST client for the statements and query-history APIs.
#[derive(Debug, Clone)]
pub struct TelemetryClient {
    http: reqwest::Client,
    base_url: Url,
    settings: TelemetryApiSettings,
}

/// A statement response plus the client-observed round trip that produced it.
struct StatementRun {
    response: StatementResponse,
    started_ms: i64,
    ended_ms: i64,
    elapsed: Duration,
}

impl TelemetryClient {
    pub fn new(settings: TelemetryApiSettings) -> Result<Self> {
        if settings.host.trim().is_empty() {
            return Err(ParallaxError::new(
                ErrorCode::MissingRequiredField,
                "Telemetry API host is not configured",
            )
            .with_context(ErrorContext::Config {
                field: Some("telemetry.host".to_string()),
                file_path: None,
            })
            .with_hint("Set telemetry.host or PARALLAX__TELEMETRY__HOST"));
        }

        let base_url = Url::parse(&settings.base_url()).map_err(|e| {
            ParallaxError::new(ErrorCode::InvalidUrl, format!("Invalid telemetry host: {}", e))
        })?;

        let mut headers = HeaderMap::new();
        if let Some(token) = &settings.token {
            let mut value = HeaderValue::from_str(&format!("Bearer {}", token)).map_err(|_| {
                ParallaxError::config("Telemetry token contains invalid header characters")
            })?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(settings.call_timeout())
            .build()?;

        Ok(Self {
            http,
            base_url,
            settings,
        })
    }

    pub fn settings(&self) -> &TelemetryApiSettings {
        &self.settings
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn statements_url(&self) -> Url {
        // The API expects the trailing slash on the collection path.
        let segments: Vec<&str> = STATEMENTS_PATH.iter().copied().chain([""]).collect();
        self.endpoint(&segments)
    }

    fn statement_url(&self, statement_id: &str) -> Url {
        let segments: Vec<&str> = STATEMENTS_PATH.iter().copied().chain([statement_id]).collect();
        self.endpoint(&segments)
    }

    fn history_url(&self, query_id: &str) -> Url {
        let segments: Vec<&str> = HISTORY_PATH.iter().copied().chain([query_id]).collect();
        self.endpoint(&segments)
    }

    fn warehouse_for<'a>(&'a self, context: &'a ExecutionContext) -> Result<&'a str> {
        context
            .warehouse_id
            .as_deref()
            .or(self.settings.warehouse_id.as_deref())
            .filter(|w| !w.is_empty())
            .ok_or_else(|| {
                ParallaxError::new(
                    ErrorCode::MissingRequiredField,
                    "No warehouse id for statement execution",
                )
                .with_context(ErrorContext::Config {
                    field: Some("telemetry.warehouse_id".to_string()),
                    file_path: None,
                })
            })
    }

    #[tracing::instrument(skip(self, body), fields(warehouse_id = %body.warehouse_id))]
    async fn post_statement(&self, body: &StatementRequest<'_>) -> Result<StatementResponse> {
        let started = Instant::now();
        let result = self
            .http
            .post(self.statements_url())
            .json(body)
            .send()
            .await
            .map_err(|e| annotate(e.into(), "submit_statement", None));

        let response = match result {
            Ok(resp) => read_json(resp, "submit_statement", None).await,
            Err(e) => Err(e),
        };
        CorrelationTelemetry::telemetry_api_call(
            "submit_statement",
            started.elapsed().as_millis() as u64,
            response.is_ok(),
        );
        response
    }

    #[tracing::instrument(skip(self))]
    async fn get_statement(&self, statement_id: &str) -> Result<Option<StatementResponse>> {
        self.get_optional(self.statement_url(statement_id), "get_statement", statement_id)
            .await
    }

    #[tracing::instrument(skip(self))]
    async fn get_query_info(&self, query_id: &str) -> Result<Option<QueryInfo>> {
        self.get_optional(self.history_url(query_id), "lookup_history", query_id)
            .await
    }

    async fn get_optional<T: DeserializeOwned>(
        &self,
        url: Url,
        operation: &str,
        identifier: &str,
    ) -> Result<Option<T>> {
        let started = Instant::now();
        let result = match self.http.get(url).send().await {
            Ok(resp) => match read_json::<T>(resp, operation, Some(identifier)).await {
                Ok(body) => Ok(Some(body)),
                Err(e) if e.code == ErrorCode::StatementNotFound => Ok(None),
                Err(e) => Err(e),
            },
            Err(e) => Err(annotate(e.into(), operation, Some(identifier))),
        };
        CorrelationTelemetry::telemetry_api_call(
            operation,
            started.elapsed().as_millis() as u64,
            result.is_ok(),
        );
        result
    }

    /// POST the statement and poll it until it is terminal or `timeout` elapses.
    async fn run_statement(&self, request: &QueryRequest, timeout: Duration) -> Result<StatementRun> {
        let context = request.context().cloned().unwrap_or_default();
        let warehouse_id = self.warehouse_for(&context)?;
        let wait_secs = context
            .wait_timeout_secs
            .unwrap_or(self.settings.submit_wait_timeout_secs);

        let body = StatementRequest {
            statement: request.statement(),
            warehouse_id,
            wait_timeout: format!("{}s", effective_wait_secs(wait_secs, timeout)),
            format: context.format.as_str(),
            disposition: context.disposition.as_str(),
            on_wait_timeout: "CONTINUE",
        };

        let deadline = Instant::now() + timeout;
        let started_ms = Utc::now().timestamp_millis();
        let started = Instant::now();

        let mut response = tokio::time::timeout_at(deadline, self.post_statement(&body))
            .await
            .map_err(|_| {
                ParallaxError::deadline_exceeded(format!(
                    "Statement submission did not return within {:?}",
                    timeout
                ))
            })??;

        if response.statement_id.is_empty() {
            return Err(annotate(
                ParallaxError::new(
                    ErrorCode::MalformedResponse,
                    "Statement response without statement_id",
                ),
                "submit_statement",
                None,
            ));
        }
        info!(statement_id = %response.statement_id, state = %response.state(), "Statement submitted");

        let poll_interval = self.settings.poll_interval();
        let mut last_transient: Option<ParallaxError> = None;
        while !ExecutionStatus::from_remote(response.state()).is_terminal() {
            if Instant::now() + poll_interval > deadline {
                warn!(
                    statement_id = %response.statement_id,
                    state = %response.state(),
                    "Statement not terminal before timeout"
                );
                break;
            }
            tokio::time::sleep(poll_interval).await;

            let polled = match tokio::time::timeout_at(
                deadline,
                self.get_statement(&response.statement_id),
            )
            .await
            {
                Ok(Ok(polled)) => polled,
                Ok(Err(e)) if e.is_transient() => {
                    warn!(statement_id = %response.statement_id, error = %e, "Transient error while polling statement");
                    last_transient = Some(e);
                    continue;
                }
                Ok(Err(e)) => return Err(e),
                Err(_) => break,
            };
            last_transient = None;
            match polled {
                Some(next) => {
                    debug!(statement_id = %next.statement_id, state = %next.state(), "Polled statement");
                    // The GET body may omit statement_id.
                    let id = std::mem::take(&mut response.statement_id);
                    response = next;
                    if response.statement_id.is_empty() {
                        response.statement_id = id;
                    }
                }
                None => {
                    return Err(ParallaxError::new(
                        ErrorCode::StatementNotFound,
                        format!("Statement {} disappeared while polling", response.statement_id),
                    ))
                }
            }
        }

        if let Some(e) = last_transient {
            return Err(e);
        }

        Ok(StatementRun {
            response,
            started_ms,
            ended_ms: Utc::now().timestamp_millis(),
            elapsed: started.elapsed(),
        })
    }

    /// Search the query history table for statements containing `text`.
    #[tracing::instrument(skip(self, text))]
    pub async fn search_history(
        &self,
        text: &str,
        since: Option<DateTime<Utc>>,
        limit: Option<u32>,
    ) -> Result<Vec<HistoryEntry>> {
        let sql = history_search_sql(text, since, limit.unwrap_or(DEFAULT_HISTORY_LIMIT));
        let request = QueryRequest::new(sql).with_context(ExecutionContext {
            disposition: Disposition::Inline,
            format: ResultFormat::JsonArray,
            ..Default::default()
        });

        let run = self.run_statement(&request, self.settings.call_timeout()).await?;
        if let Some(message) = run.response.error_message() {
            return Err(annotate(
                ParallaxError::telemetry_fatal(format!("History search failed: {}", message)),
                "search_history",
                Some(&run.response.statement_id),
            ));
        }

        let rows = run
            .response
            .result
            .and_then(|r| r.data_array)
            .unwrap_or_default();
        let entries: Vec<HistoryEntry> =
            rows.iter().filter_map(|row| HistoryEntry::from_row(row)).collect();
        info!(matches = entries.len(), "History search completed");
        Ok(entries)
    }
}

#[async_trait]
impl TelemetryApi for TelemetryClient {
    async fn submit_and_wait(
        &self,
        request: &QueryRequest,
        timeout: Duration,
    ) -> Result<ExecutionRecord> {
        let run = self.run_statement(request, timeout).await?;
        let mut record = normalize::from_statement(&run.response)?;
        record.timing_basis = TimingBasis::ApiRoundTrip;
        record.observed_start_ms = Some(run.started_ms);
        record.observed_end_ms = Some(run.ended_ms);
        record.duration_ms = Some(run.elapsed.as_millis() as u64);
        Ok(record)
    }

    async fn lookup_by_identifier(&self, identifier: &str) -> Result<Lookup> {
        let record = match self.settings.lookup_endpoint {
            LookupEndpoint::QueryHistory => self
                .get_query_info(identifier)
                .await?
                .map(|info| normalize::from_query_info(&info))
                .transpose()?,
            LookupEndpoint::Statement => self
                .get_statement(identifier)
                .await?
                .map(|response| normalize::from_statement(&response))
                .transpose()?,
        };
        Ok(record.map(Lookup::Found).unwrap_or(Lookup::NotFound))
    }
}

/// SQL for a statement-text search over `system.query.history`.
pub fn history_search_sql(text: &str, since: Option<DateTime<Utc>>, limit: u32) -> String {
    let cleaned = text.replace(['\n', '\r'], " ");
    let escaped = cleaned.trim().replace('\'', "''");
    let since_clause = since
        .map(|t| format!("\n  AND start_time >= '{}'", t.format("%Y-%m-%d %H:%M:%S")))
        .unwrap_or_default();

    format!(
        "SELECT statement_id, executed_by, execution_status, start_time, end_time, \
         total_duration_ms, produced_rows, statement_text\n\
         FROM system.query.history\n\
         WHERE statement_text LIKE '%{}%'{}\n\
         ORDER BY start_time DESC\n\
         LIMIT {}",
        escaped, since_clause, limit
    )
}

/// Server-side wait that never outlasts the client timeout.
fn effective_wait_secs(requested: u32, timeout: Duration) -> u64 {
    if requested == 0 {
        return 0;
    }
    let wait = u64::from(requested).min(timeout.as_secs()).min(MAX_WAIT_SECS);
    if wait < MIN_WAIT_SECS {
        0
    } else {
        wait
    }
}

async fn read_json<T: DeserializeOwned>(
    resp: reqwest::Response,
    operation: &str,
    identifier: Option<&str>,
) -> Result<T> {
    let status = resp.status();
    if status.is_success() {
        return resp
            .json::<T>()
            .await
            .map_err(|e| annotate(e.into(), operation, identifier));
    }

    let body = resp.text().await.unwrap_or_default();
    let parsed: ApiErrorBody = serde_json::from_str(&body).unwrap_or_default();

    let mut code = ErrorCode::from_http_status(status.as_u16());
    if parsed
        .error_code
        .as_deref()
        .is_some_and(|c| NOT_FOUND_ERROR_CODES.contains(&c))
    {
        code = ErrorCode::StatementNotFound;
    }

    let detail = parsed.message.unwrap_or(body);
    let error = ParallaxError::new(
        code,
        format!(
            "{} returned HTTP {}: {}",
            operation,
            status.as_u16(),
            scrub_truncated(&detail, MAX_ERROR_BODY_CHARS)
        ),
    )
    .with_context(ErrorContext::Telemetry {
        operation: operation.to_string(),
        http_status: Some(status.as_u16()),
        error_code: parsed.error_code,
        identifier: identifier.map(str::to_string),
    });

    Err(match status.as_u16() {
        401 | 403 => error.with_hint("Check the telemetry API token and its workspace permissions"),
        _ => error,
    })
}

/// Replace the generic transport context with the operation that failed.
fn annotate(error: ParallaxError, operation: &str, identifier: Option<&str>) -> ParallaxError {
    let http_status = match &error.context {
        Some(ErrorContext::Telemetry { http_status, .. }) => *http_status,
        _ => None,
    };
    error.with_context(ErrorContext::Telemetry {
        operation: operation.to_string(),
        http_status,
        error_code: None,
        identifier: identifier.map(str::to_string),
    })
}
