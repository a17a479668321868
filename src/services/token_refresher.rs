use crate::config::RefreshSecret;
use crate::constants::credentials::MAX_TOKEN_LIFETIME_SECS;
use crate::constants::limits::MAX_ERROR_BODY_BYTES;
use crate::errors::UpstreamError;
use crate::services::credential_store::Credential;
use crate::services::logger::Logger;
use crate::utils::redact::{redact_literals, redact_text};
use crate::utils::text::clip_body;
use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::Client;
use serde::Deserialize;
use std::time::{Duration, Instant};
use url::Url;

/// Exchanges long-lived material for a fresh bearer credential.
#[async_trait]
pub trait CredentialRefresher: Send + Sync {
    async fn refresh(&self) -> Result<Credential, UpstreamError>;
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
    #[serde(default)]
    scope: Option<String>,
}

/// Refresh-token grant against the Spotify accounts service.
pub struct SpotifyTokenRefresher {
    logger: Logger,
    client: Client,
    token_url: Url,
    secret: RefreshSecret,
    timeout: Duration,
}

impl SpotifyTokenRefresher {
    pub fn new(
        logger: Logger,
        client: Client,
        token_url: Url,
        secret: RefreshSecret,
        timeout: Duration,
    ) -> Self {
        Self {
            logger: logger.child("token"),
            client,
            token_url,
            secret,
            timeout,
        }
    }

    fn scrub(&self, text: &str) -> String {
        let scrubbed = redact_literals(
            text,
            &[
                self.secret.refresh_token.as_str(),
                self.secret.client_secret.as_str(),
            ],
        );
        clip_body(&redact_text(&scrubbed, usize::MAX), MAX_ERROR_BODY_BYTES)
    }

    fn failure(&self, status: Option<u16>, body: impl AsRef<str>) -> UpstreamError {
        UpstreamError::AuthRefresh {
            status,
            body: self.scrub(body.as_ref()),
        }
    }
}

#[async_trait]
impl CredentialRefresher for SpotifyTokenRefresher {
    async fn refresh(&self) -> Result<Credential, UpstreamError> {
        let form = serde_urlencoded::to_string(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", self.secret.refresh_token.as_str()),
            ("client_id", self.secret.client_id.as_str()),
            ("client_secret", self.secret.client_secret.as_str()),
        ])
        .map_err(|err| self.failure(None, err.to_string()))?;

        let started = Instant::now();
        let request = self
            .client
            .post(self.token_url.clone())
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .header(ACCEPT, "application/json")
            .body(form);
        let exchange = async {
            let response = request.send().await?;
            let status = response.status();
            let text = response.text().await?;
            Ok::<_, reqwest::Error>((status, text))
        };
        let (status, text) = tokio::time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| {
                self.failure(
                    None,
                    format!("token endpoint timed out after {}ms", self.timeout.as_millis()),
                )
            })?
            .map_err(|err| self.failure(None, err.to_string()))?;

        if !status.is_success() {
            return Err(self.failure(Some(status.as_u16()), text));
        }
        let payload: TokenResponse = serde_json::from_str(&text).map_err(|_| {
            self.failure(
                Some(status.as_u16()),
                "token response is missing access_token or expires_in",
            )
        })?;
        if payload.access_token.trim().is_empty() {
            return Err(self.failure(Some(status.as_u16()), "token response has an empty access_token"));
        }

        self.logger.info(
            "Access token refreshed",
            Some(&serde_json::json!({
                "expires_in": payload.expires_in,
                "scope": payload.scope,
                "duration_ms": started.elapsed().as_millis() as u64,
            })),
        );
        if payload.expires_in > MAX_TOKEN_LIFETIME_SECS {
            self.logger.warn(
                "Token lifetime clamped",
                Some(&serde_json::json!({
                    "expires_in": payload.expires_in,
                    "clamped_to": MAX_TOKEN_LIFETIME_SECS,
                })),
            );
        }
        Ok(Credential::expiring_in(
            payload.access_token,
            Duration::from_secs(payload.expires_in),
        ))
    }
}
