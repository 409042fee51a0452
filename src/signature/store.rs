//! Read and write whole signature sets through the throttled, retried API.

use std::sync::Arc;

use tracing::{debug, info};

use crate::api::{MailAdminApi, RetryPolicy, with_retry};
use crate::error::RemoteError;
use crate::ratelimit::RateLimiter;
use crate::signature::model::SignatureSet;

pub struct SignatureStore {
    api: Arc<dyn MailAdminApi>,
    limiter: Arc<RateLimiter>,
    retry: RetryPolicy,
}

impl SignatureStore {
    pub fn new(api: Arc<dyn MailAdminApi>, limiter: Arc<RateLimiter>, retry: RetryPolicy) -> Self {
        Self {
            api,
            limiter,
            retry,
        }
    }

    /// Current signature set of `user_id`. A mailbox the service has no
    /// settings for yet yields [`SignatureSet::empty`].
    pub async fn fetch(&self, user_id: &str) -> Result<SignatureSet, RemoteError> {
        let api = &self.api;
        match with_retry(&self.retry, &self.limiter, "fetch signatures", user_id, || {
            api.get_signatures(user_id)
        })
        .await
        {
            Ok(set) => {
                debug!(user_id, entries = set.len(), "Fetched signature set");
                Ok(set)
            }
            Err(e) if e.is_not_found() => {
                debug!(user_id, "No sender settings yet, starting from empty set");
                Ok(SignatureSet::empty())
            }
            Err(e) => Err(e),
        }
    }

    /// Overwrite the whole signature set of `user_id`.
    pub async fn persist(&self, user_id: &str, set: &SignatureSet) -> Result<(), RemoteError> {
        let api = &self.api;
        with_retry(&self.retry, &self.limiter, "persist signatures", user_id, || {
            api.set_signatures(user_id, set)
        })
        .await?;
        info!(user_id, entries = set.len(), "Signature set written");
        Ok(())
    }
}
