//! Yandex 360 admin API over reqwest.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{Response, StatusCode};
use secrecy::ExposeSecret;
use tracing::debug;

use crate::api::MailAdminApi;
use crate::config::ApiConfig;
use crate::directory::AccountAliasSet;
use crate::error::{ApiError, ConfigError};
use crate::signature::SignatureSet;

/// Longest error body kept in [`ApiError::Status`].
const MAX_ERROR_BODY: usize = 512;

/// HTTP client bound to one organization.
pub struct Api360Client {
    client: reqwest::Client,
    base_url: String,
    org_id: String,
}

impl Api360Client {
    pub fn new(config: &ApiConfig) -> Result<Self, ConfigError> {
        let mut auth = HeaderValue::from_str(&format!("OAuth {}", config.token.expose_secret()))
            .map_err(|e| ConfigError::InvalidValue {
                key: "TOKEN".to_string(),
                message: e.to_string(),
            })?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, auth);
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json; charset=utf-8"),
        );
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()
            .map_err(|e| ConfigError::InvalidValue {
                key: "http client".to_string(),
                message: e.to_string(),
            })?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            org_id: config.org_id.clone(),
        })
    }

    fn user_url(&self, user_id: &str) -> String {
        format!("{}/directory/v1/org/{}/users/{user_id}", self.base_url, self.org_id)
    }

    fn sender_info_url(&self, user_id: &str) -> String {
        format!(
            "{}/admin/v1/org/{}/mail/users/{user_id}/settings/sender_info",
            self.base_url, self.org_id
        )
    }
}

#[async_trait]
impl MailAdminApi for Api360Client {
    async fn list_addresses(&self, user_id: &str) -> Result<AccountAliasSet, ApiError> {
        let resp = self
            .client
            .get(self.user_url(user_id))
            .send()
            .await
            .map_err(transport_error)?;
        let card: serde_json::Value = check_status(resp)
            .await?
            .json()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))?;

        let aliases = AccountAliasSet::from_user_card(&card);
        debug!(user_id, addresses = aliases.len(), "Resolved account addresses");
        Ok(aliases)
    }

    async fn get_signatures(&self, user_id: &str) -> Result<SignatureSet, ApiError> {
        let resp = self
            .client
            .get(self.sender_info_url(user_id))
            .send()
            .await
            .map_err(transport_error)?;
        check_status(resp)
            .await?
            .json()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))
    }

    async fn set_signatures(&self, user_id: &str, set: &SignatureSet) -> Result<(), ApiError> {
        let resp = self
            .client
            .post(self.sender_info_url(user_id))
            .json(set)
            .send()
            .await
            .map_err(transport_error)?;
        check_status(resp).await?;
        Ok(())
    }
}

fn transport_error(err: reqwest::Error) -> ApiError {
    ApiError::Transport {
        transient: err.is_timeout() || err.is_connect(),
        message: err.to_string(),
    }
}

/// Map a non-success status onto [`ApiError`]; pass successes through.
async fn check_status(resp: Response) -> Result<Response, ApiError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(ApiError::Unauthorized {
            status: status.as_u16(),
        }),
        StatusCode::NOT_FOUND => Err(ApiError::NotFound),
        StatusCode::TOO_MANY_REQUESTS => Err(ApiError::RateLimited {
            retry_after: parse_retry_after(resp.headers().get(header::RETRY_AFTER)),
        }),
        _ => {
            let mut body = resp.text().await.unwrap_or_default();
            if body.len() > MAX_ERROR_BODY {
                let cut = (0..=MAX_ERROR_BODY)
                    .rev()
                    .find(|i| body.is_char_boundary(*i))
                    .unwrap_or(0);
                body.truncate(cut);
            }
            Err(ApiError::Status {
                status: status.as_u16(),
                body,
            })
        }
    }
}

fn parse_retry_after(value: Option<&HeaderValue>) -> Option<Duration> {
    value
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}
