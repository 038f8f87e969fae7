//! Derived metrics over a primary and a telemetry record. Pure functions only.

use crate::model::{ComparisonResult, CorrelationOutcome, ExecutionRecord};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comparison {
    pub duration_delta_ms: Option<u64>,
    pub row_count_agreement: Option<bool>,
    pub column_count_agreement: Option<bool>,
}

impl Comparison {
    /// Names of the fields on which the two records disagree.
    pub fn mismatches(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.row_count_agreement == Some(false) {
            fields.push("row_count");
        }
        if self.column_count_agreement == Some(false) {
            fields.push("column_count");
        }
        fields
    }
}

pub fn compare(primary: &ExecutionRecord, telemetry: Option<&ExecutionRecord>) -> Comparison {
    let Some(telemetry) = telemetry else {
        return Comparison {
            duration_delta_ms: None,
            row_count_agreement: None,
            column_count_agreement: None,
        };
    };

    Comparison {
        duration_delta_ms: primary
            .duration_ms
            .zip(telemetry.duration_ms)
            .map(|(a, b)| a.abs_diff(b)),
        row_count_agreement: primary.row_count.zip(telemetry.row_count).map(|(a, b)| a == b),
        column_count_agreement: primary
            .column_count
            .zip(telemetry.column_count)
            .map(|(a, b)| a == b),
    }
}

impl ComparisonResult {
    pub fn assemble(
        primary: ExecutionRecord,
        telemetry: Option<ExecutionRecord>,
        correlation_attempts: u32,
        outcome: CorrelationOutcome,
    ) -> Self {
        let comparison = compare(&primary, telemetry.as_ref());
        let correlation_succeeded = outcome == CorrelationOutcome::Matched
            && telemetry.as_ref().is_some_and(ExecutionRecord::has_identifier);

        Self {
            primary,
            telemetry,
            duration_delta_ms: comparison.duration_delta_ms,
            row_count_agreement: comparison.row_count_agreement,
            column_count_agreement: comparison.column_count_agreement,
            correlation_attempts,
            correlation_succeeded,
            outcome,
        }
    }

    pub fn comparison(&self) -> Comparison {
        Comparison {
            duration_delta_ms: self.duration_delta_ms,
            row_count_agreement: self.row_count_agreement,
            column_count_agreement: self.column_count_agreement,
        }
    }
}
