//! Remote admin API: the three calls the engine needs, an HTTP binding and
//! the retry combinator wrapped around every call.

pub mod client;
pub mod retry;

pub use client::Api360Client;
pub use retry::{RetryPolicy, with_retry};

use async_trait::async_trait;

use crate::directory::AccountAliasSet;
use crate::error::ApiError;
use crate::signature::SignatureSet;

/// Organization-scoped admin operations on user mailboxes.
///
/// Implementations perform exactly one request per call; throttling and
/// retries are layered on top by the callers.
#[async_trait]
pub trait MailAdminApi: Send + Sync {
    /// Primary address and aliases of an account.
    async fn list_addresses(&self, user_id: &str) -> Result<AccountAliasSet, ApiError>;

    /// The account's full signature set.
    async fn get_signatures(&self, user_id: &str) -> Result<SignatureSet, ApiError>;

    /// Overwrite the account's full signature set.
    async fn set_signatures(&self, user_id: &str, set: &SignatureSet) -> Result<(), ApiError>;
}
