//! Cached bearer credential with single-flight renewal.
//!
//! Reads of a valid credential only take a shared read lock. When the cached
//! credential is missing or inside its expiry margin, the first caller starts
//! a refresh and every concurrent caller awaits that same exchange.

use crate::constants::credentials::MAX_TOKEN_LIFETIME_SECS;
use crate::errors::UpstreamError;
use crate::services::logger::Logger;
use crate::services::token_refresher::CredentialRefresher;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tokio::time::Instant;

#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    token: String,
    expires_at: Instant,
}

impl Credential {
    pub fn new(token: impl Into<String>, expires_at: Instant) -> Self {
        Self {
            token: token.into(),
            expires_at,
        }
    }

    /// `ttl` is clamped to `MAX_TOKEN_LIFETIME_SECS`.
    pub fn expiring_in(token: impl Into<String>, ttl: Duration) -> Self {
        let ttl = ttl.min(Duration::from_secs(MAX_TOKEN_LIFETIME_SECS));
        Self::new(token, Instant::now() + ttl)
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn expires_at(&self) -> Instant {
        self.expires_at
    }

    /// True while `now < expires_at - margin`.
    pub fn is_usable(&self, now: Instant, margin: Duration) -> bool {
        now.checked_add(margin)
            .map_or(false, |deadline| deadline < self.expires_at)
    }

    /// True while the literal expiry instant has not passed.
    pub fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let remaining = self.expires_at.saturating_duration_since(Instant::now());
        f.debug_struct("Credential")
            .field("token", &"[REDACTED]")
            .field("expires_in_ms", &remaining.as_millis())
            .finish()
    }
}

type RefreshFlight = Shared<BoxFuture<'static, Result<Credential, UpstreamError>>>;

#[derive(Default)]
struct Flights {
    next_id: u64,
    current: Option<(u64, RefreshFlight)>,
}

struct StoreState {
    current: RwLock<Option<Credential>>,
    flights: Mutex<Flights>,
    exchanges: AtomicU64,
}

/// Clears the in-flight slot when its refresh ends, including by panic.
struct FlightSlot {
    state: Arc<StoreState>,
    id: u64,
}

impl Drop for FlightSlot {
    fn drop(&mut self) {
        let mut flights = self.state.flights.lock().unwrap_or_else(|err| err.into_inner());
        if matches!(flights.current, Some((current, _)) if current == self.id) {
            flights.current = None;
        }
    }
}

enum Acquire {
    Cached(Credential),
    Flight(RefreshFlight),
}

#[derive(Clone)]
pub struct CredentialStore {
    logger: Logger,
    refresher: Arc<dyn CredentialRefresher>,
    margin: Duration,
    state: Arc<StoreState>,
}

impl CredentialStore {
    pub fn new(logger: Logger, refresher: Arc<dyn CredentialRefresher>, margin: Duration) -> Self {
        Self {
            logger: logger.child("credentials"),
            refresher,
            margin,
            state: Arc::new(StoreState {
                current: RwLock::new(None),
                flights: Mutex::new(Flights::default()),
                exchanges: AtomicU64::new(0),
            }),
        }
    }

    pub fn margin(&self) -> Duration {
        self.margin
    }

    /// Number of refresh exchanges started so far.
    pub fn exchanges(&self) -> u64 {
        self.state.exchanges.load(Ordering::SeqCst)
    }

    /// Replaces the cached credential.
    pub fn install(&self, credential: Credential) {
        *self
            .state
            .current
            .write()
            .unwrap_or_else(|err| err.into_inner()) = Some(credential);
    }

    fn cached(&self) -> Option<Credential> {
        self.state
            .current
            .read()
            .unwrap_or_else(|err| err.into_inner())
            .clone()
    }

    fn cached_usable(&self) -> Option<Credential> {
        self.cached()
            .filter(|credential| credential.is_usable(Instant::now(), self.margin))
    }

    pub async fn get_valid_credential(&self) -> Result<Credential, UpstreamError> {
        if let Some(credential) = self.cached_usable() {
            return Ok(credential);
        }
        let flight = match self.join_or_start_refresh() {
            Acquire::Cached(credential) => return Ok(credential),
            Acquire::Flight(flight) => flight,
        };
        match flight.await {
            Ok(credential) => Ok(credential),
            Err(err) => match self.cached().filter(|c| c.is_live(Instant::now())) {
                Some(previous) => {
                    self.logger.warn(
                        "Token refresh failed; reusing credential inside its expiry margin",
                        Some(&serde_json::json!({ "error": err.to_string() })),
                    );
                    Ok(previous)
                }
                None => Err(err),
            },
        }
    }

    fn join_or_start_refresh(&self) -> Acquire {
        let mut flights = self
            .state
            .flights
            .lock()
            .unwrap_or_else(|err| err.into_inner());
        if let Some((_, flight)) = flights.current.as_ref() {
            return Acquire::Flight(flight.clone());
        }
        // A flight may have finished between the fast-path read and taking the lock.
        if let Some(credential) = self.cached_usable() {
            return Acquire::Cached(credential);
        }

        let id = flights.next_id;
        flights.next_id += 1;
        self.state.exchanges.fetch_add(1, Ordering::SeqCst);
        self.logger.debug(
            "Starting token refresh",
            Some(&serde_json::json!({ "flight": id })),
        );

        let state = self.state.clone();
        let refresher = self.refresher.clone();
        let logger = self.logger.clone();
        let flight = async move {
            let _slot = FlightSlot {
                state: state.clone(),
                id,
            };
            // A panicking refresher must still complete the shared flight.
            let result = AssertUnwindSafe(refresher.refresh())
                .catch_unwind()
                .await
                .unwrap_or_else(|_| {
                    Err(UpstreamError::AuthRefresh {
                        status: None,
                        body: "token refresher panicked".to_string(),
                    })
                });
            match &result {
                Ok(credential) => {
                    *state.current.write().unwrap_or_else(|err| err.into_inner()) =
                        Some(credential.clone());
                }
                Err(err) => logger.error(
                    "Token refresh failed",
                    Some(&serde_json::json!({ "flight": id, "error": err.to_string() })),
                ),
            }
            result
        }
        .boxed()
        .shared();
        flights.current = Some((id, flight.clone()));
        Acquire::Flight(flight)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usable_respects_margin() {
        let now = Instant::now();
        let credential = Credential::new("t", now + Duration::from_secs(60));
        assert!(credential.is_usable(now, Duration::from_secs(30)));
        assert!(!credential.is_usable(now, Duration::from_secs(60)));
        assert!(!credential.is_usable(now + Duration::from_secs(31), Duration::from_secs(30)));
        assert!(credential.is_live(now + Duration::from_secs(59)));
    }

    #[test]
    fn huge_margins_and_lifetimes_do_not_overflow() {
        let now = Instant::now();
        let credential = Credential::new("t", now + Duration::from_secs(60));
        assert!(!credential.is_usable(now, Duration::MAX));

        let long_lived = Credential::expiring_in("t", Duration::from_secs(u64::MAX));
        assert!(long_lived.expires_at() <= Instant::now() + Duration::from_secs(MAX_TOKEN_LIFETIME_SECS));
        assert!(long_lived.is_usable(Instant::now(), Duration::from_secs(30)));
    }

    struct PanicsOnce {
        calls: AtomicU64,
    }

    #[async_trait::async_trait]
    impl CredentialRefresher for PanicsOnce {
        async fn refresh(&self) -> Result<Credential, UpstreamError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                panic!("refresher bug");
            }
            Ok(Credential::expiring_in("recovered", Duration::from_secs(3600)))
        }
    }

    #[tokio::test]
    async fn panicked_refresh_does_not_block_later_refreshes() {
        use crate::services::logger::LogLevel;

        let store = CredentialStore::new(
            Logger::with_level("test", LogLevel::Error),
            Arc::new(PanicsOnce {
                calls: AtomicU64::new(0),
            }),
            Duration::from_secs(30),
        );

        let err = store.get_valid_credential().await.unwrap_err();
        assert!(matches!(err, UpstreamError::AuthRefresh { status: None, .. }));

        let credential = store.get_valid_credential().await.expect("credential");
        assert_eq!(credential.token(), "recovered");
        assert_eq!(store.exchanges(), 2);
    }

    #[test]
    fn debug_hides_token() {
        let credential = Credential::expiring_in("BQD-secret-token", Duration::from_secs(60));
        assert!(!format!("{:?}", credential).contains("BQD-secret-token"));
    }
}
