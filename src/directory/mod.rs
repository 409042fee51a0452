//! Account directory: which addresses belong to which account.
//!
//! Alias membership is not expected to change during a run, so each account
//! is looked up at most once and kept for the rest of the run.

pub mod model;

pub use model::AccountAliasSet;

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::api::{MailAdminApi, RetryPolicy, with_retry};
use crate::error::LookupError;
use crate::ratelimit::RateLimiter;

/// Result of checking a row's email against its account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ownership {
    /// The address belongs to the account; bind the signature to it.
    Owned,
    /// Not owned, lenient mode: apply without an address binding.
    Unbound,
    /// Not owned, strict mode: do not touch the account for this row.
    Rejected,
}

/// Run-scoped, cached address lookups.
pub struct AccountDirectory {
    api: Arc<dyn MailAdminApi>,
    limiter: Arc<RateLimiter>,
    retry: RetryPolicy,
    cache: RwLock<HashMap<String, Arc<AccountAliasSet>>>,
}

impl AccountDirectory {
    pub fn new(api: Arc<dyn MailAdminApi>, limiter: Arc<RateLimiter>, retry: RetryPolicy) -> Self {
        Self {
            api,
            limiter,
            retry,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Primary address plus aliases of `user_id`.
    pub async fn resolve_addresses(
        &self,
        user_id: &str,
    ) -> Result<Arc<AccountAliasSet>, LookupError> {
        if let Some(cached) = self.cache.read().await.get(user_id) {
            return Ok(Arc::clone(cached));
        }

        let api = &self.api;
        let fetched = with_retry(&self.retry, &self.limiter, "list addresses", user_id, || {
            api.list_addresses(user_id)
        })
        .await
        .map_err(|e| {
            if e.is_not_found() {
                LookupError::NotFound {
                    user_id: user_id.to_string(),
                }
            } else {
                LookupError::Remote(e)
            }
        })?;

        debug!(user_id, addresses = fetched.len(), "Account addresses cached");
        let mut cache = self.cache.write().await;
        let entry = cache
            .entry(user_id.to_string())
            .or_insert_with(|| Arc::new(fetched));
        Ok(Arc::clone(entry))
    }

    /// Check `email` against the account and translate the answer through
    /// the strict/lenient policy.
    pub async fn verify_ownership(
        &self,
        user_id: &str,
        email: &str,
        strict: bool,
    ) -> Result<Ownership, LookupError> {
        let addresses = self.resolve_addresses(user_id).await?;
        if addresses.contains(email) {
            return Ok(Ownership::Owned);
        }

        if strict {
            warn!(user_id, email, "Email does not belong to user, row rejected");
            Ok(Ownership::Rejected)
        } else {
            warn!(user_id, email, "Email does not belong to user, dropping address binding");
            Ok(Ownership::Unbound)
        }
    }

    /// Number of accounts resolved so far.
    pub async fn cached_accounts(&self) -> usize {
        self.cache.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::error::ApiError;
    use crate::signature::SignatureSet;

    struct DirectoryOnly {
        lookups: AtomicU32,
        fail_with: Option<ApiError>,
    }

    impl DirectoryOnly {
        fn ok() -> Self {
            Self {
                lookups: AtomicU32::new(0),
                fail_with: None,
            }
        }
    }

    #[async_trait]
    impl MailAdminApi for DirectoryOnly {
        async fn list_addresses(&self, _user_id: &str) -> Result<AccountAliasSet, ApiError> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            match &self.fail_with {
                Some(err) => Err(err.clone()),
                None => Ok(AccountAliasSet::from_addresses([
                    "a.ivanov@company.ru",
                    "andrey.ivanov@company.ru",
                ])),
            }
        }

        async fn get_signatures(&self, _user_id: &str) -> Result<SignatureSet, ApiError> {
            unimplemented!("not used by directory tests")
        }

        async fn set_signatures(
            &self,
            _user_id: &str,
            _set: &SignatureSet,
        ) -> Result<(), ApiError> {
            unimplemented!("not used by directory tests")
        }
    }

    fn directory(api: Arc<DirectoryOnly>) -> AccountDirectory {
        let retry = RetryPolicy {
            max_attempts: 2,
            jitter: Duration::ZERO,
            ..RetryPolicy::default()
        };
        AccountDirectory::new(api, Arc::new(RateLimiter::new(1000.0)), retry)
    }

    #[tokio::test]
    async fn owned_email_matches_case_insensitively() {
        let dir = directory(Arc::new(DirectoryOnly::ok()));
        let result = dir
            .verify_ownership("u1", "A.Ivanov@Company.ru", true)
            .await
            .unwrap();
        assert_eq!(result, Ownership::Owned);
    }

    #[tokio::test]
    async fn mismatch_depends_on_strictness() {
        let dir = directory(Arc::new(DirectoryOnly::ok()));
        assert_eq!(
            dir.verify_ownership("u1", "wrong@company.ru", true).await.unwrap(),
            Ownership::Rejected
        );
        assert_eq!(
            dir.verify_ownership("u1", "wrong@company.ru", false).await.unwrap(),
            Ownership::Unbound
        );
    }

    #[tokio::test]
    async fn lookups_are_cached_per_user() {
        let api = Arc::new(DirectoryOnly::ok());
        let dir = directory(Arc::clone(&api));

        for _ in 0..3 {
            dir.resolve_addresses("u1").await.unwrap();
        }
        dir.resolve_addresses("u2").await.unwrap();

        assert_eq!(api.lookups.load(Ordering::SeqCst), 2);
        assert_eq!(dir.cached_accounts().await, 2);
    }

    #[tokio::test]
    async fn missing_account_is_not_found() {
        let api = Arc::new(DirectoryOnly {
            lookups: AtomicU32::new(0),
            fail_with: Some(ApiError::NotFound),
        });
        let dir = directory(api);
        let err = dir.resolve_addresses("ghost").await.unwrap_err();
        assert!(matches!(err, LookupError::NotFound { ref user_id } if user_id == "ghost"));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_lookup_is_not_cached() {
        let api = Arc::new(DirectoryOnly {
            lookups: AtomicU32::new(0),
            fail_with: Some(ApiError::Status {
                status: 500,
                body: String::new(),
            }),
        });
        let dir = directory(Arc::clone(&api));

        assert!(matches!(
            dir.resolve_addresses("u1").await,
            Err(LookupError::Remote(_))
        ));
        assert_eq!(dir.cached_accounts().await, 0);
        assert_eq!(api.lookups.load(Ordering::SeqCst), 2);
    }
}
