//! Access token renewal
//!
//! Exchanges the long-lived session cookie for a fresh access token.
//! Concurrent callers are coalesced into a single in-flight exchange whose
//! outcome fans out to every waiter, so a burst of near-expiry requests
//! triggers one backend call instead of racing to overwrite each other's
//! result.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::Mutex;

/// Errors that can occur during a refresh exchange
///
/// Clone, so one flight's failure can be handed to every coalesced waiter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RefreshError {
    /// The exchange could not reach the backend or returned garbage
    #[error("Refresh transport error: {0}")]
    Transport(String),

    /// The backend refused the session cookie
    #[error("Refresh rejected with status {status}")]
    Rejected {
        /// HTTP status the backend answered with
        status: u16,
    },
}

/// Backend seam for the refresh exchange
#[async_trait]
pub trait RefreshTransport: Send + Sync {
    /// Performs one exchange of the session cookie for a new access token
    async fn exchange(&self) -> Result<String, RefreshError>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshResponse {
    access_token: String,
}

/// Production transport: `POST /auth/refresh` on the shared cookie-jar client
///
/// The endpoint is authenticated by the session cookie alone; the client
/// passed in must carry the cookie jar the sign-in call populated.
pub struct HttpRefreshTransport {
    client: reqwest::Client,
    url: String,
}

impl HttpRefreshTransport {
    /// Creates a transport against the given backend base URL
    pub fn new(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            url: format!("{}/auth/refresh", base_url.trim_end_matches('/')),
        }
    }
}

#[async_trait]
impl RefreshTransport for HttpRefreshTransport {
    async fn exchange(&self) -> Result<String, RefreshError> {
        let response = self
            .client
            .post(&self.url)
            .send()
            .await
            .map_err(|e| RefreshError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RefreshError::Rejected {
                status: status.as_u16(),
            });
        }

        let body: RefreshResponse = response
            .json()
            .await
            .map_err(|e| RefreshError::Transport(e.to_string()))?;
        Ok(body.access_token)
    }
}

/// Coalesces concurrent refresh calls into one in-flight exchange
///
/// The coordinator never touches token storage; on success or failure alike,
/// write-back is the caller's responsibility. This keeps a failed exchange
/// from ever mutating stored state.
pub struct RefreshCoordinator {
    transport: Arc<dyn RefreshTransport>,
    generation: AtomicU64,
    last_outcome: Mutex<Option<Result<String, RefreshError>>>,
}

impl RefreshCoordinator {
    /// Creates a coordinator over the given transport
    pub fn new(transport: Arc<dyn RefreshTransport>) -> Self {
        Self {
            transport,
            generation: AtomicU64::new(0),
            last_outcome: Mutex::new(None),
        }
    }

    /// Obtains a fresh access token
    ///
    /// Callers that arrive while an exchange is already in flight wait for
    /// it and share its outcome instead of starting a second one.
    pub async fn refresh(&self) -> Result<String, RefreshError> {
        // Snapshot before contending for the lock: the lock is held across
        // the exchange, so a changed generation after acquiring it means a
        // flight completed while this caller waited.
        let seen = self.generation.load(Ordering::Acquire);

        let mut last_outcome = self.last_outcome.lock().await;
        if self.generation.load(Ordering::Acquire) != seen {
            if let Some(outcome) = last_outcome.clone() {
                tracing::debug!("Joining refresh flight that completed while waiting");
                return outcome;
            }
        }

        let outcome = self.transport.exchange().await;
        *last_outcome = Some(outcome.clone());
        self.generation.fetch_add(1, Ordering::Release);

        match &outcome {
            Ok(_) => tracing::debug!("Refresh exchange succeeded"),
            Err(e) => tracing::warn!("Refresh exchange failed: {}", e),
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;
    use std::time::Duration;

    struct CountingTransport {
        calls: AtomicU32,
        outcome: Result<String, RefreshError>,
        delay: Duration,
    }

    impl CountingTransport {
        fn succeeding(token: &str) -> Self {
            Self {
                calls: AtomicU32::new(0),
                outcome: Ok(token.to_string()),
                delay: Duration::from_millis(50),
            }
        }

        fn failing() -> Self {
            Self {
                calls: AtomicU32::new(0),
                outcome: Err(RefreshError::Rejected { status: 401 }),
                delay: Duration::from_millis(50),
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl RefreshTransport for CountingTransport {
        async fn exchange(&self) -> Result<String, RefreshError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.outcome.clone()
        }
    }

    #[tokio::test]
    async fn test_single_refresh() {
        let transport = Arc::new(CountingTransport::succeeding("T2"));
        let coordinator = RefreshCoordinator::new(transport.clone());

        let token = coordinator.refresh().await.unwrap();
        assert_eq!(token, "T2");
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_refreshes_coalesce() {
        let transport = Arc::new(CountingTransport::succeeding("T2"));
        let coordinator = Arc::new(RefreshCoordinator::new(transport.clone()));

        let (a, b, c) = tokio::join!(
            coordinator.refresh(),
            coordinator.refresh(),
            coordinator.refresh()
        );

        assert_eq!(a.unwrap(), "T2");
        assert_eq!(b.unwrap(), "T2");
        assert_eq!(c.unwrap(), "T2");
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn test_sequential_refreshes_each_hit_the_backend() {
        let transport = Arc::new(CountingTransport::succeeding("T2"));
        let coordinator = RefreshCoordinator::new(transport.clone());

        coordinator.refresh().await.unwrap();
        coordinator.refresh().await.unwrap();

        assert_eq!(transport.calls(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_failure_is_shared() {
        let transport = Arc::new(CountingTransport::failing());
        let coordinator = Arc::new(RefreshCoordinator::new(transport.clone()));

        let (a, b) = tokio::join!(coordinator.refresh(), coordinator.refresh());

        assert_eq!(a, Err(RefreshError::Rejected { status: 401 }));
        assert_eq!(b, Err(RefreshError::Rejected { status: 401 }));
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn test_refresh_after_failure_retries() {
        let transport = Arc::new(CountingTransport::failing());
        let coordinator = RefreshCoordinator::new(transport.clone());

        assert!(coordinator.refresh().await.is_err());
        assert!(coordinator.refresh().await.is_err());

        // A later call is a new flight, not a replay of the cached failure.
        assert_eq!(transport.calls(), 2);
    }
}
