//! Command-line interface.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};

use crate::api::RetryPolicy;
use crate::config::{
    ApiConfig, DEFAULT_BASE_URL, MIN_RPS, ReplaceScope, RunConfig, SignPosition, WriteMode,
};
use crate::error::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PositionArg {
    Bottom,
    Under,
}

impl From<PositionArg> for SignPosition {
    fn from(arg: PositionArg) -> Self {
        match arg {
            PositionArg::Bottom => SignPosition::Bottom,
            PositionArg::Under => SignPosition::Under,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReplaceScopeArg {
    All,
    Slot,
}

impl From<ReplaceScopeArg> for ReplaceScope {
    fn from(arg: ReplaceScopeArg) -> Self {
        match arg {
            ReplaceScopeArg::All => ReplaceScope::All,
            ReplaceScopeArg::Slot => ReplaceScope::Slot,
        }
    }
}

/// Mass update Yandex 360 mail signatures from CSV.
#[derive(Debug, Parser)]
#[command(name = "sigsync", version, about)]
pub struct Args {
    /// Path to CSV with columns userId,email,signature[,lang]
    #[arg(long)]
    pub csv: PathBuf,

    /// Organization ID
    #[arg(long, env = "ORG_ID")]
    pub org_id: Option<String>,

    /// OAuth token with admin rights
    #[arg(long, env = "TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// API base URL
    #[arg(long, env = "API360_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    /// Signature position
    #[arg(long, value_enum, default_value = "bottom")]
    pub position: PositionArg,

    /// Language used when a row has none
    #[arg(long, default_value = "ru")]
    pub default_lang: String,

    /// Merge with existing signatures instead of replacing them
    #[arg(long)]
    pub merge: bool,

    /// What a replace discards: every stored signature, or only the row's slot
    #[arg(long, value_enum, default_value = "all")]
    pub replace_scope: ReplaceScopeArg,

    /// Convert line breaks (and literal "\n") in signatures to <br>
    #[arg(long)]
    pub convert_newlines: bool,

    /// Maximum requests per second
    #[arg(long, default_value_t = 4.0)]
    pub rps: f64,

    /// Do not send changes, only show what would be written
    #[arg(long)]
    pub dry_run: bool,

    /// HTTP timeout in seconds
    #[arg(long, default_value_t = 20.0)]
    pub timeout: f64,

    /// Reject rows whose email does not belong to the user (default: drop the binding and continue)
    #[arg(long)]
    pub strict_email: bool,

    /// Attempts per request before a transient failure counts as an error
    #[arg(long, default_value_t = 6)]
    pub max_attempts: u32,

    /// Users processed in parallel (the request rate stays global)
    #[arg(long, default_value_t = 1)]
    pub concurrency: usize,

    /// Write the full run report as JSON
    #[arg(long)]
    pub report_json: Option<PathBuf>,

    /// Write failed rows to a CSV that can be re-run
    #[arg(long)]
    pub failed_csv: Option<PathBuf>,

    /// Also write logs to daily-rotated files in this directory
    #[arg(long)]
    pub log_dir: Option<PathBuf>,
}

impl Args {
    pub fn run_config(&self) -> Result<RunConfig, ConfigError> {
        if !self.rps.is_finite() || self.rps <= 0.0 {
            return Err(ConfigError::InvalidValue {
                key: "--rps".to_string(),
                message: format!("must be a positive number, got {}", self.rps),
            });
        }
        if self.concurrency == 0 {
            return Err(ConfigError::InvalidValue {
                key: "--concurrency".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        let default_lang = self.default_lang.trim().to_lowercase();
        if default_lang.is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "--default-lang".to_string(),
                message: "must not be empty".to_string(),
            });
        }

        let mode = if self.merge {
            WriteMode::Merge
        } else {
            WriteMode::Replace(self.replace_scope.into())
        };

        Ok(RunConfig {
            dry_run: self.dry_run,
            mode,
            convert_newlines: self.convert_newlines,
            rps: self.rps.max(MIN_RPS),
            strict_email: self.strict_email,
            position: self.position.into(),
            default_lang,
            concurrency: self.concurrency,
            retry: RetryPolicy {
                max_attempts: self.max_attempts.max(1),
                ..RetryPolicy::default()
            },
        })
    }

    pub fn api_config(&self) -> Result<ApiConfig, ConfigError> {
        let org_id = required(
            self.org_id.as_deref(),
            "ORG_ID",
            "Pass --org-id or set ORG_ID (e.g. in .env)",
        )?;
        let token = required(
            self.token.as_deref(),
            "TOKEN",
            "Pass --token or set TOKEN (e.g. in .env)",
        )?;
        if !self.timeout.is_finite() || self.timeout <= 0.0 {
            return Err(ConfigError::InvalidValue {
                key: "--timeout".to_string(),
                message: format!("must be a positive number of seconds, got {}", self.timeout),
            });
        }

        Ok(ApiConfig {
            base_url: self.base_url.clone(),
            org_id: org_id.to_string(),
            token: secrecy::SecretString::from(token.to_string()),
            timeout: Duration::from_secs_f64(self.timeout),
        })
    }
}

fn required<'a>(value: Option<&'a str>, key: &str, hint: &str) -> Result<&'a str, ConfigError> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ConfigError::MissingRequired {
            key: key.to_string(),
            hint: hint.to_string(),
        })
}
