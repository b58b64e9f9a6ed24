//! Per-request authentication
//!
//! Decides, for every outgoing request, which access token to attach and
//! whether to renew it first. The policy fails open: an undecodable token or
//! a failed renewal still attaches whatever the store holds and lets the
//! backend be the final arbiter.

use std::sync::Arc;

use chrono::{Duration, Utc};
use reqwest::RequestBuilder;

use crate::auth::{decode_claims, RefreshCoordinator, TokenStore};

/// Outcome of authenticating one outgoing request
///
/// Makes the fail-open policy an explicit, testable branch instead of a
/// nest of fallbacks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthDecision {
    /// The token was proactively renewed and the new value attached
    Renewed(String),
    /// The stored token had enough validity left and was attached unchanged
    Attached(String),
    /// The stored token was attached as-is because it could not be decoded
    /// or because renewal failed
    Fallback(String),
    /// Neither scope holds a token; the request proceeds unauthenticated
    Unauthenticated,
}

impl AuthDecision {
    /// The token to attach, if any
    pub fn token(&self) -> Option<&str> {
        match self {
            AuthDecision::Renewed(token)
            | AuthDecision::Attached(token)
            | AuthDecision::Fallback(token) => Some(token),
            AuthDecision::Unauthenticated => None,
        }
    }

    /// Attaches the decision to an outgoing request as a bearer header
    pub fn apply(&self, request: RequestBuilder) -> RequestBuilder {
        match self.token() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

/// The per-request interceptor
pub struct RequestAuthenticator {
    store: Arc<TokenStore>,
    coordinator: Arc<RefreshCoordinator>,
    threshold: Duration,
}

impl RequestAuthenticator {
    /// Creates an authenticator with the given proactive-renewal threshold
    pub fn new(
        store: Arc<TokenStore>,
        coordinator: Arc<RefreshCoordinator>,
        threshold: std::time::Duration,
    ) -> Self {
        Self {
            store,
            coordinator,
            threshold: Duration::from_std(threshold).unwrap_or_else(|_| Duration::seconds(120)),
        }
    }

    /// Runs the authentication sequence for one outgoing request
    ///
    /// Must complete before the request is transmitted. The store is read
    /// fresh on every call, so a renewal completed by a concurrent request
    /// is always observed rather than a stale cached token.
    pub async fn authenticate(&self) -> AuthDecision {
        let Some((token, scope)) = self.store.read_active() else {
            return AuthDecision::Unauthenticated;
        };

        let expires_at = match decode_claims(&token) {
            Ok(claims) => claims.expires_at(),
            Err(e) => {
                tracing::warn!("Attaching undecodable access token as-is: {}", e);
                return AuthDecision::Fallback(token);
            }
        };
        let Some(expires_at) = expires_at else {
            tracing::warn!("Access token expiry out of range; attaching as-is");
            return AuthDecision::Fallback(token);
        };

        let remaining = expires_at - Utc::now();
        if remaining >= self.threshold {
            return AuthDecision::Attached(token);
        }

        tracing::debug!(
            "Access token expires in {}s; renewing before send",
            remaining.num_seconds()
        );
        match self.coordinator.refresh().await {
            Ok(renewed) => {
                // Write back into the scope the original came from so the
                // other scope never gains a second, stale token.
                self.store.write(scope, &renewed);
                AuthDecision::Renewed(renewed)
            }
            Err(e) => {
                tracing::warn!("Renewal failed; attaching expiring token: {}", e);
                AuthDecision::Fallback(token)
            }
        }
    }
}
