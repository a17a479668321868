use crate::constants::limits::MAX_ERROR_BODY_BYTES;
use crate::errors::UpstreamError;
use crate::services::logger::Logger;
use crate::utils::redact::{redact_literals, redact_text};
use crate::utils::text::clip_body;
use reqwest::header::ACCEPT;
use reqwest::Client;
use serde_json::Value;
use std::time::{Duration, Instant};
use url::Url;

/// Key-authenticated client for the Last.fm similarity endpoints.
#[derive(Clone)]
pub struct LastFmClient {
    logger: Logger,
    client: Client,
    base_url: Url,
    api_key: String,
    timeout: Duration,
}

impl LastFmClient {
    pub fn new(
        logger: Logger,
        client: Client,
        base_url: Url,
        api_key: String,
        timeout: Duration,
    ) -> Self {
        Self {
            logger: logger.child("lastfm"),
            client,
            base_url,
            api_key,
            timeout,
        }
    }

    /// Calls `method` (e.g. `track.getSimilar`) with the given query parameters.
    pub async fn call(&self, method: &str, params: &[(&str, String)]) -> Result<Value, UpstreamError> {
        let mut url = self.base_url.clone();
        {
            let mut pairs = url.query_pairs_mut();
            pairs
                .append_pair("method", method)
                .append_pair("api_key", &self.api_key)
                .append_pair("format", "json")
                .append_pair("autocorrect", "1");
            for (key, value) in params {
                pairs.append_pair(key, value);
            }
        }

        let started = Instant::now();
        let request = self.client.get(url).header(ACCEPT, "application/json");
        let exchange = async {
            let response = request.send().await?;
            let status = response.status().as_u16();
            let text = response.text().await?;
            Ok::<_, reqwest::Error>((status, text))
        };
        let (status, text) = match tokio::time::timeout(self.timeout, exchange).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(err)) if err.is_timeout() => {
                return Err(UpstreamError::Timeout {
                    timeout_ms: self.timeout.as_millis() as u64,
                })
            }
            Ok(Err(err)) => return Err(UpstreamError::Transport(self.scrub(&err.to_string()))),
            Err(_) => {
                return Err(UpstreamError::Timeout {
                    timeout_ms: self.timeout.as_millis() as u64,
                })
            }
        };
        self.logger.debug(
            "lastfm call",
            Some(&serde_json::json!({
                "method": method,
                "status": status,
                "duration_ms": started.elapsed().as_millis() as u64,
            })),
        );

        if !(200..300).contains(&status) {
            return Err(UpstreamError::Status {
                status,
                body: self.scrub(&text),
            });
        }
        let body: Value = serde_json::from_str(&text)
            .map_err(|err| UpstreamError::Decode(format!("{} returned non-JSON body: {}", method, err)))?;
        rejection(&body).map_or(Ok(body), Err)
    }

    fn scrub(&self, text: &str) -> String {
        let scrubbed = redact_literals(text, &[self.api_key.as_str()]);
        clip_body(&redact_text(&scrubbed, usize::MAX), MAX_ERROR_BODY_BYTES)
    }
}

/// Last.fm reports API errors as `{"error": n, "message": ...}`, sometimes with 200.
fn rejection(body: &Value) -> Option<UpstreamError> {
    let code = body.get("error")?.as_i64()?;
    let message = body
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or("no message")
        .to_string();
    Some(UpstreamError::Rejected { code, message })
}
