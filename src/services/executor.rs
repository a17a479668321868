use crate::constants::limits::MAX_ERROR_BODY_BYTES;
use crate::errors::UpstreamError;
use crate::services::credential_store::CredentialStore;
use crate::services::logger::Logger;
use crate::utils::redact::redact_text;
use crate::utils::text::clip_body;
use reqwest::header::ACCEPT;
use reqwest::{Client, Method};
use serde_json::Value;
use std::fmt;
use std::time::{Duration, Instant};
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Get,
    Post,
    Put,
}

impl Verb {
    fn method(self) -> Method {
        match self {
            Verb::Get => Method::GET,
            Verb::Post => Method::POST,
            Verb::Put => Method::PUT,
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.method().as_str())
    }
}

#[derive(Debug, Clone)]
pub struct UpstreamRequest {
    pub verb: Verb,
    pub path: String,
    pub params: Option<Value>,
}

/// Bearer-authenticated transport against the product API.
#[derive(Clone)]
pub struct AuthenticatedExecutor {
    logger: Logger,
    client: Client,
    base_url: Url,
    credentials: CredentialStore,
    timeout: Duration,
}

impl AuthenticatedExecutor {
    pub fn new(
        logger: Logger,
        client: Client,
        base_url: Url,
        credentials: CredentialStore,
        timeout: Duration,
    ) -> Self {
        Self {
            logger: logger.child("executor"),
            client,
            base_url,
            credentials,
            timeout,
        }
    }

    pub async fn execute(
        &self,
        verb: Verb,
        path: &str,
        params: Option<Value>,
    ) -> Result<Value, UpstreamError> {
        self.send(UpstreamRequest {
            verb,
            path: path.to_string(),
            params,
        })
        .await
    }

    pub async fn send(&self, request: UpstreamRequest) -> Result<Value, UpstreamError> {
        let credential = self.credentials.get_valid_credential().await?;
        let url = build_url(&self.base_url, &request)?;

        let mut builder = self
            .client
            .request(request.verb.method(), url)
            .bearer_auth(credential.token())
            .header(ACCEPT, "application/json");
        if request.verb != Verb::Get {
            builder = match request.params.as_ref().and_then(request_body) {
                Some(body) => builder.json(&body),
                // Body-less PUT/POST still needs Content-Length: 0 upstream.
                None => builder.body(Vec::new()),
            };
        }

        let started = Instant::now();
        let exchange = async {
            let response = builder.send().await?;
            let status = response.status().as_u16();
            let text = response.text().await?;
            Ok::<_, reqwest::Error>((status, text))
        };
        let outcome = match tokio::time::timeout(self.timeout, exchange).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(err)) => return Err(self.map_reqwest_error(err)),
            Err(_) => {
                return Err(UpstreamError::Timeout {
                    timeout_ms: self.timeout.as_millis() as u64,
                })
            }
        };
        let (status, text) = outcome;
        self.logger.debug(
            "upstream call",
            Some(&serde_json::json!({
                "verb": request.verb.to_string(),
                "path": request.path,
                "status": status,
                "duration_ms": started.elapsed().as_millis() as u64,
            })),
        );
        classify_response(request.verb, status, &text)
    }

    fn map_reqwest_error(&self, err: reqwest::Error) -> UpstreamError {
        if err.is_timeout() {
            return UpstreamError::Timeout {
                timeout_ms: self.timeout.as_millis() as u64,
            };
        }
        UpstreamError::Transport(redact_text(&err.to_string(), MAX_ERROR_BODY_BYTES))
    }
}

/// Applies the per-verb success rules to a received response.
pub fn classify_response(verb: Verb, status: u16, body: &str) -> Result<Value, UpstreamError> {
    if !(200..300).contains(&status) {
        return Err(UpstreamError::Status {
            status,
            body: clip_body(&redact_text(body, usize::MAX), MAX_ERROR_BODY_BYTES),
        });
    }
    // Playback-control endpoints answer PUT with no content on success.
    if verb == Verb::Put && (status == 200 || status == 204 || body.trim().is_empty()) {
        return Ok(serde_json::json!({ "status": "ok" }));
    }
    if body.trim().is_empty() {
        return Err(UpstreamError::Decode(format!(
            "{} returned {} with an empty body",
            verb, status
        )));
    }
    serde_json::from_str(body).map_err(|err| UpstreamError::Decode(err.to_string()))
}

fn build_url(base: &Url, request: &UpstreamRequest) -> Result<Url, UpstreamError> {
    let path = request.path.trim();
    let joined = format!(
        "{}/{}",
        base.as_str().trim_end_matches('/'),
        path.trim_start_matches('/')
    );
    let mut url = Url::parse(&joined)
        .map_err(|_| UpstreamError::Transport(format!("invalid upstream path: {}", path)))?;
    if request.verb == Verb::Get {
        if let Some(Value::Object(params)) = &request.params {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in params {
                if let Some(rendered) = render_query_value(value) {
                    pairs.append_pair(key, &rendered);
                }
            }
        }
        if url.query() == Some("") {
            url.set_query(None);
        }
    }
    Ok(url)
}

fn render_query_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) => Some(text.clone()),
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().filter_map(render_query_value).collect();
            if parts.is_empty() {
                None
            } else {
                Some(parts.join(","))
            }
        }
        other => Some(other.to_string()),
    }
}

fn request_body(params: &Value) -> Option<Value> {
    match params {
        Value::Null => None,
        Value::Object(map) => Some(Value::Object(
            map.iter()
                .filter(|(_, value)| !value.is_null())
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect(),
        )),
        other => Some(other.clone()),
    }
}
