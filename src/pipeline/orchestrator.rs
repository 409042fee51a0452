//! Drives a whole run: validate rows, group them by user, run each user's
//! update cycle and collect the report.
//!
//! Users are dispatched in first-seen order, at most `concurrency` at a time.
//! All of them share one rate limiter. Each user runs in its own task so a
//! crash while processing one account is recorded and the run continues.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use futures::StreamExt;
use tracing::{error, info, warn};

use crate::api::MailAdminApi;
use crate::config::RunConfig;
use crate::directory::AccountDirectory;
use crate::input::{RawRow, SignatureRow};
use crate::pipeline::planner::UpdatePlanner;
use crate::pipeline::report::RunReport;
use crate::pipeline::types::{ReasonCode, RowOutcome, RunOutcome};
use crate::ratelimit::RateLimiter;
use crate::signature::SignatureStore;

/// All rows of one user, in input order.
#[derive(Debug, Clone)]
pub struct UserBatch {
    pub user_id: String,
    pub rows: Vec<SignatureRow>,
}

pub struct Orchestrator {
    api: Arc<dyn MailAdminApi>,
    config: Arc<RunConfig>,
    limiter: Arc<RateLimiter>,
}

impl Orchestrator {
    pub fn new(api: Arc<dyn MailAdminApi>, config: RunConfig) -> Self {
        let limiter = Arc::new(RateLimiter::new(config.rps));
        Self {
            api,
            config: Arc::new(config),
            limiter,
        }
    }

    /// Process every row and return the finalized report.
    pub async fn run(&self, rows: &[RawRow]) -> RunReport {
        let started_at = Utc::now();
        let (batches, mut outcomes) = partition(rows);

        info!(
            rows = rows.len(),
            users = batches.len(),
            invalid = outcomes.len(),
            dry_run = self.config.dry_run,
            mode = ?self.config.mode,
            strict_email = self.config.strict_email,
            "Starting signature run"
        );

        let planner = Arc::new(UpdatePlanner::new(
            AccountDirectory::new(
                Arc::clone(&self.api),
                Arc::clone(&self.limiter),
                self.config.retry.clone(),
            ),
            SignatureStore::new(
                Arc::clone(&self.api),
                Arc::clone(&self.limiter),
                self.config.retry.clone(),
            ),
        ));

        let mut per_user = futures::stream::iter(batches)
            .map(|batch| run_user(Arc::clone(&planner), Arc::clone(&self.config), batch))
            .buffered(self.config.concurrency.max(1));

        while let Some(user_outcomes) = per_user.next().await {
            for outcome in &user_outcomes {
                log_outcome(outcome);
            }
            outcomes.extend(user_outcomes);
        }

        let report = RunReport::new(started_at, self.config.dry_run, outcomes);
        info!(
            applied = report.counts.applied,
            skipped_dry_run = report.counts.skipped_dry_run,
            skipped_email_mismatch = report.counts.skipped_email_mismatch,
            failed = report.counts.failed,
            "Signature run finished"
        );
        report
    }
}

/// Run one user's cycle in its own task; a panic fails that user's rows only.
async fn run_user(
    planner: Arc<UpdatePlanner>,
    config: Arc<RunConfig>,
    batch: UserBatch,
) -> Vec<RowOutcome> {
    let UserBatch { user_id, rows } = batch;
    let task_rows = rows.clone();
    let task_user = user_id.clone();

    let handle = tokio::spawn(async move {
        planner
            .plan_and_apply(&task_user, &task_rows, &config)
            .await
    });

    match handle.await {
        Ok(outcomes) => outcomes,
        Err(e) => {
            error!(user_id = %user_id, error = %e, "User processing crashed");
            rows.iter()
                .map(|row| {
                    RowOutcome::failed(
                        row,
                        ReasonCode::InternalError,
                        "user processing task failed",
                    )
                })
                .collect()
        }
    }
}

/// Split rows into valid per-user batches (first-seen user order) and
/// outcomes for rows that failed validation.
pub fn partition(rows: &[RawRow]) -> (Vec<UserBatch>, Vec<RowOutcome>) {
    let mut batches: Vec<UserBatch> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut invalid = Vec::new();

    for raw in rows {
        match raw.normalize() {
            Ok(row) => {
                let slot = *index.entry(row.user_id.clone()).or_insert_with(|| {
                    batches.push(UserBatch {
                        user_id: row.user_id.clone(),
                        rows: Vec::new(),
                    });
                    batches.len() - 1
                });
                batches[slot].rows.push(row);
            }
            Err(e) => {
                warn!(row = raw.row, error = %e, "Skipping invalid row");
                invalid.push(RowOutcome::invalid(raw, &e));
            }
        }
    }

    (batches, invalid)
}

fn log_outcome(outcome: &RowOutcome) {
    match outcome.outcome {
        RunOutcome::Applied | RunOutcome::SkippedDryRun => info!(
            row = outcome.row,
            user_id = %outcome.user_id,
            status = outcome.outcome.label(),
            "Row processed"
        ),
        RunOutcome::SkippedEmailMismatch => warn!(
            row = outcome.row,
            user_id = %outcome.user_id,
            email = %outcome.email,
            status = outcome.outcome.label(),
            "Row processed"
        ),
        RunOutcome::Failed { reason } => error!(
            row = outcome.row,
            user_id = %outcome.user_id,
            reason = reason.as_str(),
            detail = outcome.detail.as_deref().unwrap_or_default(),
            "Row failed"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(row: usize, user_id: &str, email: &str) -> RawRow {
        RawRow {
            row,
            user_id: user_id.into(),
            email: email.into(),
            signature: "Regards".into(),
            lang: String::new(),
        }
    }

    #[test]
    fn partition_groups_by_user_in_first_seen_order() {
        let rows = vec![
            raw(1, "u2", "b@x.ru"),
            raw(2, "u1", "a@x.ru"),
            raw(3, "u2", "b2@x.ru"),
            raw(4, "", "c@x.ru"),
        ];
        let (batches, invalid) = partition(&rows);

        let users: Vec<&str> = batches.iter().map(|b| b.user_id.as_str()).collect();
        assert_eq!(users, vec!["u2", "u1"]);
        let u2_rows: Vec<usize> = batches[0].rows.iter().map(|r| r.row).collect();
        assert_eq!(u2_rows, vec![1, 3]);

        assert_eq!(invalid.len(), 1);
        assert_eq!(invalid[0].row, 4);
        assert_eq!(
            invalid[0].outcome,
            RunOutcome::Failed {
                reason: ReasonCode::InvalidRow
            }
        );
    }

    #[test]
    fn partition_trims_user_ids_before_grouping() {
        let rows = vec![raw(1, "u1", "a@x.ru"), raw(2, " u1 ", "a@x.ru")];
        let (batches, _) = partition(&rows);
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].rows.len(), 2);
    }
}
