//! Per-user update cycle.
//!
//! Flow for one user:
//! 1. Fetch the current signature set (one remote call)
//! 2. Check each row's email against the account (one cached lookup)
//! 3. Fold every accepted row into the set, in input order
//! 4. Write the set back once, or skip the write in dry-run
//!
//! A failure of any remote step fails the rows it affects and never escapes
//! as an error: the caller always gets one outcome per row.

use tracing::{error, info, warn};

use crate::config::RunConfig;
use crate::directory::{AccountDirectory, Ownership};
use crate::input::SignatureRow;
use crate::pipeline::types::{ReasonCode, RowOutcome, RunOutcome};
use crate::signature::policy::followup_mode;
use crate::signature::{SignatureChange, SignaturePolicy, SignatureStore};

pub struct UpdatePlanner {
    directory: AccountDirectory,
    store: SignatureStore,
}

impl UpdatePlanner {
    pub fn new(directory: AccountDirectory, store: SignatureStore) -> Self {
        Self { directory, store }
    }

    /// Apply all of `user_id`'s rows and return one outcome per row, in row order.
    pub async fn plan_and_apply(
        &self,
        user_id: &str,
        rows: &[SignatureRow],
        config: &RunConfig,
    ) -> Vec<RowOutcome> {
        let mut set = match self.store.fetch(user_id).await {
            Ok(set) => set,
            Err(e) => {
                error!(user_id, error = %e, "Could not read signatures, skipping user");
                return fail_all(rows, ReasonCode::RemoteError, &e.to_string());
            }
        };

        let policy = SignaturePolicy::from_config(config);
        let mut outcomes: Vec<Option<RowOutcome>> = vec![None; rows.len()];
        let mut contributing = Vec::new();

        for (idx, row) in rows.iter().enumerate() {
            let ownership = match self
                .directory
                .verify_ownership(user_id, &row.email, config.strict_email)
                .await
            {
                Ok(ownership) => ownership,
                Err(e) => {
                    error!(
                        user_id,
                        error = %e,
                        "Could not resolve account addresses, skipping user"
                    );
                    return fail_all(rows, ReasonCode::LookupError, &e.to_string());
                }
            };

            let address = match ownership {
                Ownership::Owned => Some(row.email.as_str()),
                Ownership::Unbound => None,
                Ownership::Rejected => {
                    outcomes[idx] = Some(RowOutcome::new(row, RunOutcome::SkippedEmailMismatch));
                    continue;
                }
            };

            let change = SignatureChange {
                address,
                lang: row.lang_or(&config.default_lang),
                body: &row.signature,
            };
            let mode = if contributing.is_empty() {
                policy.mode()
            } else {
                followup_mode(policy.mode())
            };
            set = policy.apply_with(set, &change, mode);
            contributing.push(idx);
        }

        if contributing.is_empty() {
            warn!(user_id, "No applicable rows, nothing to write");
            return outcomes.into_iter().flatten().collect();
        }

        let (outcome, detail) = if config.dry_run {
            info!(
                user_id,
                rows = contributing.len(),
                body = %set.to_body(),
                "Dry run, signature set not written"
            );
            (RunOutcome::SkippedDryRun, None)
        } else {
            match self.store.persist(user_id, &set).await {
                Ok(()) => (RunOutcome::Applied, None),
                Err(e) => {
                    error!(user_id, error = %e, "Could not write signatures");
                    let reason = ReasonCode::RemoteError;
                    (RunOutcome::Failed { reason }, Some(e.to_string()))
                }
            }
        };

        for idx in contributing {
            outcomes[idx] = Some(RowOutcome {
                detail: detail.clone(),
                ..RowOutcome::new(&rows[idx], outcome)
            });
        }

        outcomes.into_iter().flatten().collect()
    }
}

fn fail_all(rows: &[SignatureRow], reason: ReasonCode, detail: &str) -> Vec<RowOutcome> {
    rows.iter()
        .map(|row| RowOutcome::failed(row, reason, detail))
        .collect()
}
