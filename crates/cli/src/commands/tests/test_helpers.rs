use crate::commands::helpers::{
    build_request, format_agreement, format_ms, parse_since, summary_line,
};
use chrono::{TimeZone, Utc};
use parallax_common::config::AppConfig;
use parallax_core::model::{
    ComparisonResult, CorrelationOutcome, ExecutionRecord, ExecutionStatus, Origin,
};

#[test]
fn test_parse_since_relative_units() {
    let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
    assert_eq!(
        parse_since("30m", now).unwrap(),
        Utc.with_ymd_and_hms(2024, 5, 1, 11, 30, 0).unwrap()
    );
    assert_eq!(
        parse_since("2d", now).unwrap(),
        Utc.with_ymd_and_hms(2024, 4, 29, 12, 0, 0).unwrap()
    );
}

#[test]
fn test_parse_since_rfc3339() {
    let now = Utc::now();
    let parsed = parse_since("2024-05-01T10:00:00+02:00", now).unwrap();
    assert_eq!(parsed, Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap());
}

#[test]
fn test_parse_since_rejects_unknown_unit() {
    let now = Utc::now();
    assert!(parse_since("5w", now).is_err());
    assert!(parse_since("15", now).is_err());
    assert!(parse_since("h", now).is_err());
}

#[test]
fn test_build_request_carries_tag_and_warehouse() {
    let mut config = AppConfig::default();
    config.telemetry.warehouse_id = Some("wh-7".to_string());

    let request = build_request("SELECT 1", Some("nightly-42"), &config);
    assert_eq!(request.statement(), "SELECT 1");
    assert_eq!(request.correlation_tag(), Some("nightly-42"));
    assert_eq!(
        request.context().and_then(|c| c.warehouse_id.as_deref()),
        Some("wh-7")
    );
}

#[test]
fn test_summary_line() {
    let primary = ExecutionRecord::new(Origin::Primary, "01f0", ExecutionStatus::Succeeded);
    let result = ComparisonResult {
        primary,
        telemetry: None,
        duration_delta_ms: Some(438),
        row_count_agreement: Some(true),
        column_count_agreement: None,
        correlation_attempts: 1,
        correlation_succeeded: true,
        outcome: CorrelationOutcome::Matched,
    };
    assert_eq!(
        summary_line(&result),
        "matched after 1 attempt(s); duration delta 438 ms"
    );
}

#[test]
fn test_value_formatting() {
    assert_eq!(format_ms(None), "n/a");
    assert_eq!(format_ms(Some(12)), "12 ms");
    assert_eq!(format_agreement(Some(false)), "DIFFER");
    assert_eq!(format_agreement(None), "n/a");
}
