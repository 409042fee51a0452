//! Run report: per-row outcomes plus the counts shown to the operator.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::ReportError;
use crate::input::RawRow;
use crate::pipeline::types::{ReasonCode, RowOutcome, RunOutcome};

/// Count of rows per outcome kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutcomeCounts {
    pub applied: usize,
    pub skipped_dry_run: usize,
    pub skipped_email_mismatch: usize,
    pub failed: usize,
}

impl OutcomeCounts {
    fn record(&mut self, outcome: &RunOutcome) {
        match outcome {
            RunOutcome::Applied => self.applied += 1,
            RunOutcome::SkippedDryRun => self.skipped_dry_run += 1,
            RunOutcome::SkippedEmailMismatch => self.skipped_email_mismatch += 1,
            RunOutcome::Failed { .. } => self.failed += 1,
        }
    }
}

/// Rows of one user, for per-user presentation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary<'a> {
    pub user_id: &'a str,
    pub counts: OutcomeCounts,
    pub rows: Vec<&'a RowOutcome>,
}

/// Finalized result of one run. Outcomes are in input row order.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub dry_run: bool,
    pub total_rows: usize,
    pub counts: OutcomeCounts,
    outcomes: Vec<RowOutcome>,
}

impl RunReport {
    pub fn new(
        started_at: DateTime<Utc>,
        dry_run: bool,
        mut outcomes: Vec<RowOutcome>,
    ) -> Self {
        outcomes.sort_by_key(|o| o.row);

        let mut counts = OutcomeCounts::default();
        for outcome in &outcomes {
            counts.record(&outcome.outcome);
        }

        Self {
            run_id: Uuid::new_v4(),
            started_at,
            finished_at: Utc::now(),
            dry_run,
            total_rows: outcomes.len(),
            counts,
            outcomes,
        }
    }

    pub fn outcomes(&self) -> &[RowOutcome] {
        &self.outcomes
    }

    pub fn outcome_for_row(&self, row: usize) -> Option<&RowOutcome> {
        self.outcomes.iter().find(|o| o.row == row)
    }

    pub fn failures(&self) -> impl Iterator<Item = &RowOutcome> {
        self.outcomes.iter().filter(|o| o.outcome.is_failure())
    }

    pub fn has_failures(&self) -> bool {
        self.counts.failed > 0
    }

    /// Failure counts keyed by reason code.
    pub fn failures_by_reason(&self) -> HashMap<ReasonCode, usize> {
        let mut by_reason = HashMap::new();
        for outcome in self.failures() {
            if let RunOutcome::Failed { reason } = outcome.outcome {
                *by_reason.entry(reason).or_insert(0) += 1;
            }
        }
        by_reason
    }

    /// Outcomes grouped by user, users in first-seen order.
    pub fn by_user(&self) -> Vec<UserSummary<'_>> {
        let mut index: HashMap<&str, usize> = HashMap::new();
        let mut users: Vec<UserSummary<'_>> = Vec::new();
        for outcome in &self.outcomes {
            let slot = *index.entry(outcome.user_id.as_str()).or_insert_with(|| {
                users.push(UserSummary {
                    user_id: &outcome.user_id,
                    counts: OutcomeCounts::default(),
                    rows: Vec::new(),
                });
                users.len() - 1
            });
            users[slot].counts.record(&outcome.outcome);
            users[slot].rows.push(outcome);
        }
        users
    }

    /// Write the report as pretty-printed JSON.
    pub fn write_json(&self, path: &Path) -> Result<(), ReportError> {
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(())
    }

    /// Write the failed input rows back out in the input CSV layout so they
    /// can be fed to another run. Returns the number of rows written.
    pub fn write_failed_rows(&self, path: &Path, input: &[RawRow]) -> Result<usize, ReportError> {
        let by_row: HashMap<usize, &RawRow> = input.iter().map(|r| (r.row, r)).collect();

        let mut writer = csv::Writer::from_path(path)?;
        writer.write_record(["userId", "email", "signature", "lang"])?;
        let mut written = 0;
        for failure in self.failures() {
            if let Some(raw) = by_row.get(&failure.row) {
                writer.write_record([&raw.user_id, &raw.email, &raw.signature, &raw.lang])?;
                written += 1;
            }
        }
        writer.flush()?;
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::{SignatureRow, read_rows_from_path};

    fn row(n: usize, user: &str) -> SignatureRow {
        SignatureRow {
            row: n,
            user_id: user.into(),
            email: format!("{user}@x.ru"),
            signature: format!("sig {n}"),
            lang: None,
        }
    }

    fn sample() -> RunReport {
        let outcomes = vec![
            RowOutcome::new(&row(3, "u2"), RunOutcome::SkippedEmailMismatch),
            RowOutcome::new(&row(1, "u1"), RunOutcome::Applied),
            RowOutcome::failed(&row(4, "u3"), ReasonCode::RemoteError, "HTTP 500"),
            RowOutcome::new(&row(2, "u1"), RunOutcome::Applied),
        ];
        RunReport::new(Utc::now(), false, outcomes)
    }

    #[test]
    fn counts_and_orders_outcomes() {
        let report = sample();
        assert_eq!(report.total_rows, 4);
        assert_eq!(report.counts.applied, 2);
        assert_eq!(report.counts.skipped_email_mismatch, 1);
        assert_eq!(report.counts.failed, 1);
        let rows: Vec<usize> = report.outcomes().iter().map(|o| o.row).collect();
        assert_eq!(rows, vec![1, 2, 3, 4]);
        assert!(report.has_failures());
        assert_eq!(report.failures_by_reason()[&ReasonCode::RemoteError], 1);
    }

    #[test]
    fn groups_by_user_in_first_seen_order() {
        let report = sample();
        let users = report.by_user();
        let ids: Vec<&str> = users.iter().map(|u| u.user_id).collect();
        assert_eq!(ids, vec!["u1", "u2", "u3"]);
        assert_eq!(users[0].counts.applied, 2);
        assert_eq!(users[0].rows.len(), 2);
    }

    #[test]
    fn json_report_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        sample().write_json(&path).unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["counts"]["failed"], 1);
        assert_eq!(json["outcomes"][3]["reason"], "remote-error");
        assert_eq!(json["dryRun"], false);
    }

    #[test]
    fn failed_rows_csv_can_be_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("failed.csv");
        let input: Vec<RawRow> = (1..=4)
            .map(|n| RawRow {
                row: n,
                user_id: format!("u{n}"),
                email: format!("u{n}@x.ru"),
                signature: format!("line one\nline {n}"),
                lang: "en".into(),
            })
            .collect();

        let written = sample().write_failed_rows(&path, &input).unwrap();
        assert_eq!(written, 1);

        let reread = read_rows_from_path(&path).unwrap();
        assert_eq!(reread.len(), 1);
        assert_eq!(reread[0].user_id, "u4");
        assert_eq!(reread[0].signature, "line one\nline 4");
    }
}
