#![allow(dead_code)]

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;
use spotify_mcp::app::App;
use spotify_mcp::config::GatewayConfig;
use spotify_mcp::services::credential_store::CredentialStore;
use spotify_mcp::services::executor::AuthenticatedExecutor;
use spotify_mcp::services::logger::{LogLevel, Logger};
use spotify_mcp::services::token_refresher::SpotifyTokenRefresher;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use url::Url;

pub const TOKEN_PATH: &str = "/api/token";
pub const LASTFM_PATH: &str = "/2.0/";
pub const LASTFM_KEY: &str = "test-lastfm-key";
pub const REFRESH_TOKEN: &str = "rtoken-secret-value";

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    pub authorization: Option<String>,
    pub body: String,
}

impl RecordedRequest {
    pub fn query_pairs(&self) -> HashMap<String, String> {
        url::form_urlencoded::parse(self.query.as_deref().unwrap_or("").as_bytes())
            .into_owned()
            .collect()
    }

    pub fn json_body(&self) -> serde_json::Value {
        serde_json::from_str(&self.body).expect("request body is JSON")
    }
}

#[derive(Debug, Clone)]
pub struct MockReply {
    pub status: u16,
    pub body: String,
    pub delay: Duration,
}

#[derive(Clone, Default)]
struct MockState {
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    routes: Arc<Mutex<HashMap<(String, String), MockReply>>>,
    token_reply: Arc<Mutex<Option<MockReply>>>,
    token_delay: Arc<Mutex<Duration>>,
    token_calls: Arc<AtomicUsize>,
}

/// Stand-in for the accounts service, the Web API and Last.fm on one port.
///
/// The token endpoint answers `tok-<n>` (n = exchange count) with a one hour
/// lifetime unless overridden. Other routes answer 404 until configured.
#[derive(Clone)]
pub struct MockUpstream {
    pub addr: SocketAddr,
    state: MockState,
}

impl MockUpstream {
    pub async fn start() -> Self {
        let state = MockState::default();
        let app = Router::new().fallback(handle).with_state(state.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock upstream");
        let addr = listener.local_addr().expect("mock addr");
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        Self { addr, state }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn reply(&self, method: &str, path: &str, status: u16, body: &str) {
        self.reply_after(method, path, status, body, Duration::ZERO);
    }

    pub fn reply_after(&self, method: &str, path: &str, status: u16, body: &str, delay: Duration) {
        self.state.routes.lock().unwrap().insert(
            (method.to_string(), path.to_string()),
            MockReply {
                status,
                body: body.to_string(),
                delay,
            },
        );
    }

    pub fn token_reply(&self, status: u16, body: &str) {
        *self.state.token_reply.lock().unwrap() = Some(MockReply {
            status,
            body: body.to_string(),
            delay: Duration::ZERO,
        });
    }

    pub fn reset_token_reply(&self) {
        *self.state.token_reply.lock().unwrap() = None;
    }

    pub fn token_delay(&self, delay: Duration) {
        *self.state.token_delay.lock().unwrap() = delay;
    }

    pub fn token_calls(&self) -> usize {
        self.state.token_calls.load(Ordering::SeqCst)
    }

    /// Requests other than token exchanges, in arrival order.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state
            .requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.path != TOKEN_PATH)
            .cloned()
            .collect()
    }

    pub fn token_requests(&self) -> Vec<RecordedRequest> {
        self.state
            .requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.path == TOKEN_PATH)
            .cloned()
            .collect()
    }
}

async fn handle(
    State(state): State<MockState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let recorded = RecordedRequest {
        method: method.to_string(),
        path: uri.path().to_string(),
        query: uri.query().map(|q| q.to_string()),
        authorization: headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string()),
        body: String::from_utf8_lossy(&body).into_owned(),
    };
    state.requests.lock().unwrap().push(recorded);

    let reply = if uri.path() == TOKEN_PATH {
        let n = state.token_calls.fetch_add(1, Ordering::SeqCst) + 1;
        let delay = *state.token_delay.lock().unwrap();
        let configured = state.token_reply.lock().unwrap().clone();
        let mut reply = configured.unwrap_or_else(|| MockReply {
            status: 200,
            body: serde_json::json!({
                "access_token": format!("tok-{}", n),
                "token_type": "Bearer",
                "expires_in": 3600,
            })
            .to_string(),
            delay: Duration::ZERO,
        });
        reply.delay = delay;
        reply
    } else {
        let key = (method.to_string(), uri.path().to_string());
        state
            .routes
            .lock()
            .unwrap()
            .get(&key)
            .cloned()
            .unwrap_or(MockReply {
                status: 404,
                body: r#"{"error":{"status":404,"message":"Not found."}}"#.to_string(),
                delay: Duration::ZERO,
            })
    };

    if !reply.delay.is_zero() {
        tokio::time::sleep(reply.delay).await;
    }
    let status = StatusCode::from_u16(reply.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, [("content-type", "application/json")], reply.body).into_response()
}

pub fn quiet_logger() -> Logger {
    Logger::with_level("test", LogLevel::Error)
}

pub fn config_for(mock: &MockUpstream, with_lastfm: bool, timeout_ms: u64) -> GatewayConfig {
    let mut env: HashMap<&str, String> = HashMap::from([
        ("CLIENT_ID", "test-client-id".to_string()),
        ("CLIENT_SECRET", "test-client-secret".to_string()),
        ("REFRESH_TOKEN", REFRESH_TOKEN.to_string()),
        ("SPOTIFY_API_URL", mock.url("/v1")),
        ("SPOTIFY_TOKEN_URL", mock.url(TOKEN_PATH)),
        ("LASTFM_API_URL", mock.url(LASTFM_PATH)),
        ("SPOTIFY_MCP_TIMEOUT_MS", timeout_ms.to_string()),
    ]);
    if with_lastfm {
        env.insert("LASTFM_API_KEY", LASTFM_KEY.to_string());
    }
    GatewayConfig::from_lookup(|key| env.get(key).cloned()).expect("test config")
}

pub fn build_app(mock: &MockUpstream) -> App {
    App::initialize(config_for(mock, true, 2_000)).expect("app")
}

pub fn credential_store(mock: &MockUpstream, margin: Duration) -> CredentialStore {
    let config = config_for(mock, false, 2_000);
    let refresher = SpotifyTokenRefresher::new(
        quiet_logger(),
        reqwest::Client::new(),
        config.token_url.clone(),
        config.secret.clone(),
        config.request_timeout,
    );
    CredentialStore::new(quiet_logger(), Arc::new(refresher), margin)
}

pub fn executor(mock: &MockUpstream, store: CredentialStore, timeout: Duration) -> AuthenticatedExecutor {
    AuthenticatedExecutor::new(
        quiet_logger(),
        reqwest::Client::new(),
        Url::parse(&mock.url("/v1")).expect("api url"),
        store,
        timeout,
    )
}
