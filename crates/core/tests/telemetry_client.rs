//! Telemetry client integration tests against a mocked workspace API.

use parallax_common::config::{LookupEndpoint, TelemetryApiSettings};
use parallax_core::model::{ExecutionStatus, Origin, TimingBasis};
use parallax_core::{Lookup, QueryRequest, TelemetryApi, TelemetryClient};
use parallax_error::{ErrorCode, ErrorContext};
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer, lookup_endpoint: LookupEndpoint) -> TelemetryClient {
    TelemetryClient::new(TelemetryApiSettings {
        host: server.uri(),
        token: Some("dapi-test-token".to_string()),
        warehouse_id: Some("wh-1".to_string()),
        poll_interval_ms: 20,
        lookup_endpoint,
        ..Default::default()
    })
    .expect("client")
}

// ============================================================================
// Lookup by identifier
// ============================================================================

#[tokio::test]
async fn test_history_lookup_found() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/2.0/sql/history/queries/01f0-abc"))
        .and(header("authorization", "Bearer dapi-test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "query_id": "01f0-abc",
            "status": "FINISHED",
            "query_start_time_ms": 1700000000000i64,
            "query_end_time_ms": 1700000000115i64,
            "execution_end_time_ms": 1700000000112i64,
            "duration": 115,
            "rows_produced": 1,
            "query_text": "SELECT 1"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let lookup = client(&server, LookupEndpoint::QueryHistory)
        .lookup_by_identifier("01f0-abc")
        .await
        .unwrap();

    let Lookup::Found(record) = lookup else {
        panic!("expected a record");
    };
    assert_eq!(record.origin, Origin::Telemetry);
    assert_eq!(record.identifier, "01f0-abc");
    assert_eq!(record.status, ExecutionStatus::Succeeded);
    assert_eq!(record.duration_ms, Some(115));
    assert_eq!(record.row_count, Some(1));
    assert_eq!(record.timing_basis, TimingBasis::HistoryQueryEnd);
}

#[tokio::test]
async fn test_history_lookup_404_is_not_found() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/2.0/sql/history/queries/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error_code": "NOT_FOUND",
            "message": "Query missing not found"
        })))
        .mount(&server)
        .await;

    let lookup = client(&server, LookupEndpoint::QueryHistory)
        .lookup_by_identifier("missing")
        .await
        .unwrap();
    assert_eq!(lookup, Lookup::NotFound);
}

#[tokio::test]
async fn test_history_lookup_resource_does_not_exist_is_not_found() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/2.0/sql/history/queries/too-early"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error_code": "RESOURCE_DOES_NOT_EXIST",
            "message": "Query too-early does not exist"
        })))
        .mount(&server)
        .await;

    let lookup = client(&server, LookupEndpoint::QueryHistory)
        .lookup_by_identifier("too-early")
        .await
        .unwrap();
    assert_eq!(lookup, Lookup::NotFound);
}

#[tokio::test]
async fn test_lookup_auth_failure_is_fatal() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/2.0/sql/history/queries/01f0-abc"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "error_code": "PERMISSION_DENIED",
            "message": "Invalid access token"
        })))
        .mount(&server)
        .await;

    let err = client(&server, LookupEndpoint::QueryHistory)
        .lookup_by_identifier("01f0-abc")
        .await
        .unwrap_err();

    assert_eq!(err.code, ErrorCode::TelemetryFatal);
    assert!(!err.is_transient());
    assert!(err.hint.is_some());
    match err.context {
        Some(ErrorContext::Telemetry {
            http_status,
            error_code,
            identifier,
            ..
        }) => {
            assert_eq!(http_status, Some(403));
            assert_eq!(error_code.as_deref(), Some("PERMISSION_DENIED"));
            assert_eq!(identifier.as_deref(), Some("01f0-abc"));
        }
        other => panic!("unexpected context {:?}", other),
    }
}

#[tokio::test]
async fn test_lookup_server_error_is_transient() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/2.0/sql/history/queries/01f0-abc"))
        .respond_with(ResponseTemplate::new(503).set_body_string("upstream unavailable"))
        .mount(&server)
        .await;

    let err = client(&server, LookupEndpoint::QueryHistory)
        .lookup_by_identifier("01f0-abc")
        .await
        .unwrap_err();

    assert_eq!(err.code, ErrorCode::TelemetryTransient);
    assert!(err.message.contains("upstream unavailable"));
}

#[tokio::test]
async fn test_statement_endpoint_lookup() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/2.0/sql/statements/stmt-9"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "statement_id": "stmt-9",
            "status": { "state": "RUNNING" }
        })))
        .mount(&server)
        .await;

    let lookup = client(&server, LookupEndpoint::Statement)
        .lookup_by_identifier("stmt-9")
        .await
        .unwrap();

    let Lookup::Found(record) = lookup else {
        panic!("expected a record");
    };
    assert_eq!(record.status, ExecutionStatus::Running);
    assert_eq!(record.timing_basis, TimingBasis::Unavailable);
    assert_eq!(record.duration_ms, None);
}

// ============================================================================
// Submit and wait
// ============================================================================

#[tokio::test]
async fn test_submit_and_wait_inline_success() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/2.0/sql/statements/"))
        .and(body_partial_json(json!({
            "statement": "SELECT 1",
            "warehouse_id": "wh-1",
            "wait_timeout": "30s",
            "format": "JSON_ARRAY",
            "disposition": "INLINE"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "statement_id": "stmt-1",
            "status": { "state": "SUCCEEDED" },
            "manifest": {
                "schema": { "column_count": 2 },
                "total_row_count": 1,
                "total_chunk_count": 1
            },
            "result": { "data_array": [["2024-05-01 10:00:00", "hybrid_test"]] }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let record = client(&server, LookupEndpoint::QueryHistory)
        .submit_and_wait(&QueryRequest::new("SELECT 1"), Duration::from_secs(60))
        .await
        .unwrap();

    assert_eq!(record.identifier, "stmt-1");
    assert_eq!(record.status, ExecutionStatus::Succeeded);
    assert_eq!(record.column_count, Some(2));
    assert_eq!(record.row_count, Some(1));
    assert_eq!(record.chunk_count, Some(1));
    assert_eq!(record.timing_basis, TimingBasis::ApiRoundTrip);
    assert!(record.duration_ms.is_some());
}

#[tokio::test]
async fn test_submit_and_wait_polls_until_terminal() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/2.0/sql/statements/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "statement_id": "stmt-2",
            "status": { "state": "PENDING" }
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/2.0/sql/statements/stmt-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "statement_id": "stmt-2",
            "status": { "state": "SUCCEEDED" },
            "manifest": { "schema": { "column_count": 3 }, "total_row_count": 10 }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let record = client(&server, LookupEndpoint::QueryHistory)
        .submit_and_wait(&QueryRequest::new("SELECT * FROM t"), Duration::from_secs(10))
        .await
        .unwrap();

    assert_eq!(record.status, ExecutionStatus::Succeeded);
    assert_eq!(record.column_count, Some(3));
    assert_eq!(record.row_count, Some(10));
}

#[tokio::test]
async fn test_submit_and_wait_retries_transient_poll_errors() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/2.0/sql/statements/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "statement_id": "stmt-2",
            "status": { "state": "PENDING" }
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/2.0/sql/statements/stmt-2"))
        .respond_with(ResponseTemplate::new(503).set_body_string("warehouse restarting"))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/2.0/sql/statements/stmt-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "statement_id": "stmt-2",
            "status": { "state": "SUCCEEDED" },
            "manifest": { "schema": { "column_count": 1 }, "total_row_count": 4 }
        })))
        .mount(&server)
        .await;

    let record = client(&server, LookupEndpoint::QueryHistory)
        .submit_and_wait(&QueryRequest::new("SELECT * FROM t"), Duration::from_secs(10))
        .await
        .unwrap();

    assert_eq!(record.identifier, "stmt-2");
    assert_eq!(record.status, ExecutionStatus::Succeeded);
    assert_eq!(record.row_count, Some(4));
}

#[tokio::test]
async fn test_submit_and_wait_surfaces_last_transient_error_at_timeout() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/2.0/sql/statements/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "statement_id": "stmt-5",
            "status": { "state": "PENDING" }
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/2.0/sql/statements/stmt-5"))
        .respond_with(ResponseTemplate::new(503).set_body_string("warehouse restarting"))
        .mount(&server)
        .await;

    let err = client(&server, LookupEndpoint::QueryHistory)
        .submit_and_wait(&QueryRequest::new("SELECT * FROM t"), Duration::from_millis(300))
        .await
        .unwrap_err();

    assert_eq!(err.code, ErrorCode::TelemetryTransient);
}

#[tokio::test]
async fn test_submit_and_wait_timeout_returns_latest_record() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/2.0/sql/statements/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "statement_id": "stmt-4",
            "status": { "state": "PENDING" }
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/2.0/sql/statements/stmt-4"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "statement_id": "stmt-4",
            "status": { "state": "RUNNING" }
        })))
        .mount(&server)
        .await;

    let record = client(&server, LookupEndpoint::QueryHistory)
        .submit_and_wait(&QueryRequest::new("SELECT * FROM t"), Duration::from_millis(300))
        .await
        .unwrap();

    assert_eq!(record.identifier, "stmt-4");
    assert_eq!(record.status, ExecutionStatus::Running);
    assert!(!record.status.is_terminal());
}

#[tokio::test]
async fn test_submit_and_wait_reports_statement_failure() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/2.0/sql/statements/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "statement_id": "stmt-3",
            "status": {
                "state": "FAILED",
                "error": { "error_code": "BAD_REQUEST", "message": "[TABLE_OR_VIEW_NOT_FOUND] t" }
            }
        })))
        .mount(&server)
        .await;

    let record = client(&server, LookupEndpoint::QueryHistory)
        .submit_and_wait(&QueryRequest::new("SELECT * FROM t"), Duration::from_secs(10))
        .await
        .unwrap();

    assert_eq!(record.status, ExecutionStatus::Failed);
    assert_eq!(
        record.error_detail.as_deref(),
        Some("[TABLE_OR_VIEW_NOT_FOUND] t")
    );
}

#[tokio::test]
async fn test_submit_without_warehouse_is_rejected() {
    let server = MockServer::start().await;
    let client = TelemetryClient::new(TelemetryApiSettings {
        host: server.uri(),
        ..Default::default()
    })
    .unwrap();

    let err = client
        .submit_and_wait(&QueryRequest::new("SELECT 1"), Duration::from_secs(10))
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::MissingRequiredField);
}

// ============================================================================
// History search
// ============================================================================

#[tokio::test]
async fn test_search_history_parses_rows() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/2.0/sql/statements/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "statement_id": "stmt-h",
            "status": { "state": "SUCCEEDED" },
            "manifest": { "schema": { "column_count": 8 }, "total_row_count": 2 },
            "result": {
                "data_array": [
                    ["01f0-a", "analyst@example.com", "FINISHED", "2024-05-01T10:00:00Z",
                     "2024-05-01T10:00:00.115Z", "115", "1", "SELECT 'marker'"],
                    ["01f0-b", null, "FAILED", "2024-05-01T09:00:00Z", null, null, null, "SELECT 'marker'"]
                ]
            }
        })))
        .mount(&server)
        .await;

    let entries = client(&server, LookupEndpoint::QueryHistory)
        .search_history("SELECT 'marker'", None, Some(5))
        .await
        .unwrap();

    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].statement_id, "01f0-a");
    assert_eq!(entries[0].total_duration_ms, Some(115));
    assert_eq!(entries[1].execution_status, ExecutionStatus::Failed);
    assert_eq!(entries[1].executed_by, None);
}
