//! Shared types for the update pipeline.

use std::fmt;

use serde::Serialize;

use crate::error::RowError;
use crate::input::{RawRow, SignatureRow};

// ── Reason codes ────────────────────────────────────────────────────

/// Stable, machine-readable cause of a failed row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReasonCode {
    /// The CSV row itself is unusable; nothing was sent.
    InvalidRow,
    /// The account's addresses could not be resolved.
    LookupError,
    /// Reading or writing the signature set failed.
    RemoteError,
    /// Processing the user crashed.
    InternalError,
}

impl ReasonCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidRow => "invalid-row",
            Self::LookupError => "lookup-error",
            Self::RemoteError => "remote-error",
            Self::InternalError => "internal-error",
        }
    }
}

impl fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Outcomes ────────────────────────────────────────────────────────

/// What happened to one input row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum RunOutcome {
    Applied,
    SkippedDryRun,
    SkippedEmailMismatch,
    Failed { reason: ReasonCode },
}

impl RunOutcome {
    /// Short label for logging.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Applied => "applied",
            Self::SkippedDryRun => "skipped-dry-run",
            Self::SkippedEmailMismatch => "skipped-email-mismatch",
            Self::Failed { .. } => "failed",
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// Outcome of one row, with enough identity to find it in the input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RowOutcome {
    pub row: usize,
    pub user_id: String,
    pub email: String,
    #[serde(flatten)]
    pub outcome: RunOutcome,
    /// Human-readable context for logs. Not stable across versions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl RowOutcome {
    pub fn new(row: &SignatureRow, outcome: RunOutcome) -> Self {
        Self {
            row: row.row,
            user_id: row.user_id.clone(),
            email: row.email.clone(),
            outcome,
            detail: None,
        }
    }

    pub fn failed(row: &SignatureRow, reason: ReasonCode, detail: impl Into<String>) -> Self {
        Self::new(row, RunOutcome::Failed { reason }).with_detail(detail)
    }

    pub fn invalid(raw: &RawRow, err: &RowError) -> Self {
        Self {
            row: raw.row,
            user_id: raw.user_id.trim().to_string(),
            email: raw.email.trim().to_string(),
            outcome: RunOutcome::Failed {
                reason: ReasonCode::InvalidRow,
            },
            detail: Some(err.to_string()),
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row() -> SignatureRow {
        SignatureRow {
            row: 7,
            user_id: "113".into(),
            email: "a@x.ru".into(),
            signature: "Hi".into(),
            lang: None,
        }
    }

    #[test]
    fn outcome_serializes_with_stable_codes() {
        let outcome = RowOutcome::failed(&row(), ReasonCode::RemoteError, "HTTP 500");
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["reason"], "remote-error");
        assert_eq!(json["userId"], "113");
        assert_eq!(json["row"], 7);
        assert_eq!(json["detail"], "HTTP 500");
    }

    #[test]
    fn skipped_outcomes_have_no_reason() {
        let outcome = RowOutcome::new(&row(), RunOutcome::SkippedEmailMismatch);
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "skipped-email-mismatch");
        assert!(json.get("reason").is_none());
        assert!(json.get("detail").is_none());
    }

    #[test]
    fn invalid_rows_carry_invalid_row_code() {
        let raw = RawRow {
            row: 2,
            user_id: " 113 ".into(),
            ..RawRow::default()
        };
        let err = RowError::MissingField { row: 2, field: "email" };
        let outcome = RowOutcome::invalid(&raw, &err);
        assert_eq!(
            outcome.outcome,
            RunOutcome::Failed {
                reason: ReasonCode::InvalidRow
            }
        );
        assert_eq!(outcome.user_id, "113");
        assert_eq!(ReasonCode::InvalidRow.to_string(), "invalid-row");
    }
}
