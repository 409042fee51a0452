//! Error types for sigsync.

use std::time::Duration;

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Input error: {0}")]
    Input(#[from] InputError),

    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),

    #[error("Lookup error: {0}")]
    Lookup(#[from] LookupError),

    #[error("Report error: {0}")]
    Report(#[from] ReportError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required configuration: {key}. {hint}")]
    MissingRequired { key: String, hint: String },

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Errors reading the CSV input as a whole. Per-row problems are [`RowError`].
#[derive(Debug, thiserror::Error)]
pub enum InputError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("CSV has no header row. Expected columns: userId,email,signature[,lang]")]
    MissingHeader,

    #[error("CSV is missing columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),
}

/// A single CSV row that cannot be turned into a signature request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RowError {
    #[error("row {row}: missing required field '{field}'")]
    MissingField { row: usize, field: &'static str },

    #[error("row {row}: '{email}' is not an email address")]
    InvalidEmail { row: usize, email: String },
}

/// Wire-level failure of one HTTP call against the admin API.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ApiError {
    #[error("authentication rejected (status {status})")]
    Unauthorized { status: u16 },

    #[error("resource not found")]
    NotFound,

    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    #[error("API error {status}: {body}")]
    Status { status: u16, body: String },

    #[error("transport error: {message}")]
    Transport { message: String, transient: bool },

    #[error("invalid response payload: {0}")]
    Decode(String),
}

impl ApiError {
    /// Whether the call may succeed if repeated after a delay.
    pub fn is_retryable(&self) -> bool {
        match self {
            ApiError::RateLimited { .. } => true,
            ApiError::Status { status, .. } => *status == 408 || (500..600).contains(status),
            ApiError::Transport { transient, .. } => *transient,
            ApiError::Unauthorized { .. } | ApiError::NotFound | ApiError::Decode(_) => false,
        }
    }

    /// Server-provided delay hint, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            ApiError::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

/// Reading or writing a user's signature set failed.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RemoteError {
    #[error("{operation} for user {user_id} failed: {source}")]
    Api {
        operation: &'static str,
        user_id: String,
        source: ApiError,
    },

    #[error("{operation} for user {user_id} gave up after {attempts} attempts: {last}")]
    RetriesExhausted {
        operation: &'static str,
        user_id: String,
        attempts: u32,
        last: ApiError,
    },
}

impl RemoteError {
    /// The wire-level error behind this failure.
    pub fn api_error(&self) -> &ApiError {
        match self {
            RemoteError::Api { source, .. } => source,
            RemoteError::RetriesExhausted { last, .. } => last,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self.api_error(), ApiError::NotFound)
    }
}

/// Resolving an account's addresses failed.
#[derive(Debug, Clone, thiserror::Error)]
pub enum LookupError {
    #[error("user {user_id} not found in directory")]
    NotFound { user_id: String },

    #[error(transparent)]
    Remote(#[from] RemoteError),
}

/// Writing report artefacts failed.
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Result type alias for sigsync.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_and_server_errors_are_retryable() {
        assert!(ApiError::RateLimited { retry_after: None }.is_retryable());
        for status in [408, 500, 502, 503, 504] {
            let err = ApiError::Status {
                status,
                body: String::new(),
            };
            assert!(err.is_retryable(), "status {status} should retry");
        }
    }

    #[test]
    fn fatal_errors_are_not_retryable() {
        assert!(!ApiError::Unauthorized { status: 401 }.is_retryable());
        assert!(!ApiError::NotFound.is_retryable());
        assert!(
            !ApiError::Status {
                status: 400,
                body: "bad".into()
            }
            .is_retryable()
        );
        assert!(!ApiError::Decode("eof".into()).is_retryable());
        assert!(
            !ApiError::Transport {
                message: "tls".into(),
                transient: false
            }
            .is_retryable()
        );
    }

    #[test]
    fn missing_columns_message_lists_names() {
        let err = InputError::MissingColumns(vec!["email".into(), "signature".into()]);
        assert_eq!(err.to_string(), "CSV is missing columns: email, signature");
    }
}
