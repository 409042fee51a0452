//! Configuration types.
//!
//! Built once by the binary from CLI flags and `.env`, then passed down by
//! reference. Nothing below `main` reads the environment.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::api::RetryPolicy;

/// Default Yandex 360 API endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api360.yandex.net";

/// Lowest accepted request rate; anything below is clamped.
pub const MIN_RPS: f64 = 0.1;

/// Where the mail client places the signature relative to quoted text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignPosition {
    #[default]
    Bottom,
    Under,
}

/// How much of a user's stored set a replace-mode run discards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplaceScope {
    /// Drop every entry the account held before this run.
    #[default]
    All,
    /// Drop only the entries occupying the row's own (address, lang) slot.
    Slot,
}

/// How each row's signature is combined with what the account already has.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase", tag = "mode", content = "scope")]
pub enum WriteMode {
    Merge,
    Replace(ReplaceScope),
}

impl fmt::Display for WriteMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            WriteMode::Merge => "merge",
            WriteMode::Replace(ReplaceScope::All) => "replace (all)",
            WriteMode::Replace(ReplaceScope::Slot) => "replace (slot)",
        })
    }
}

impl Default for WriteMode {
    fn default() -> Self {
        WriteMode::Replace(ReplaceScope::All)
    }
}

/// Per-run behaviour switches.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Perform reads and validation but never persist.
    pub dry_run: bool,
    /// Merge with or replace the existing signature set.
    pub mode: WriteMode,
    /// Turn line breaks in signature bodies into `<br>`.
    pub convert_newlines: bool,
    /// Outbound request ceiling, process-wide.
    pub rps: f64,
    /// Reject rows whose email does not belong to the account.
    pub strict_email: bool,
    /// Placement written alongside new signatures.
    pub position: SignPosition,
    /// Language used when a row leaves `lang` empty.
    pub default_lang: String,
    /// Number of users processed at the same time.
    pub concurrency: usize,
    /// Retry budget for transient API failures.
    pub retry: RetryPolicy,
}

impl RunConfig {
    /// Spacing between two outbound calls at the configured rate.
    pub fn request_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.rps.max(MIN_RPS))
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            dry_run: false,
            mode: WriteMode::default(),
            convert_newlines: false,
            rps: 4.0,
            strict_email: false,
            position: SignPosition::Bottom,
            default_lang: "ru".to_string(),
            concurrency: 1,
            retry: RetryPolicy::default(),
        }
    }
}

/// Connection settings for the admin API.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub base_url: String,
    pub org_id: String,
    pub token: secrecy::SecretString,
    pub timeout: Duration,
}

impl ApiConfig {
    pub fn new(org_id: impl Into<String>, token: secrecy::SecretString) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            org_id: org_id.into(),
            token,
            timeout: Duration::from_secs(20),
        }
    }
}
