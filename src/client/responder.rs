//! Authentication-failure handling
//!
//! Watches every response for an authentication rejection. Outside a small
//! exempt set of bootstrap endpoints, a rejection means the whole session is
//! gone: stored tokens are cleared and the injected hook fires so the
//! embedding application can route the user back to sign-in. On exempt
//! endpoints the rejection propagates to the caller as a normal, non-fatal
//! outcome.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use reqwest::StatusCode;

use crate::auth::TokenStore;
use crate::error::ApiError;

/// Callback invoked when the session is no longer valid
///
/// Stands in for the whole-application redirect a browser client would
/// perform; the embedder decides what "go to sign-in" means.
pub type SessionInvalidatedHook = Arc<dyn Fn() + Send + Sync>;

/// The per-response interceptor
pub struct FailureResponder {
    store: Arc<TokenStore>,
    hook: Option<SessionInvalidatedHook>,
    exempt: Vec<&'static str>,
    invalidated: AtomicBool,
}

impl FailureResponder {
    /// Creates a responder whose global sign-out is suppressed for the given
    /// exempt path suffixes
    pub fn new(
        store: Arc<TokenStore>,
        hook: Option<SessionInvalidatedHook>,
        exempt: Vec<&'static str>,
    ) -> Self {
        Self {
            store,
            hook,
            exempt,
            invalidated: AtomicBool::new(false),
        }
    }

    fn is_exempt(&self, path: &str) -> bool {
        self.exempt.iter().any(|suffix| path.ends_with(suffix))
    }

    /// Evaluates one response status
    ///
    /// Returns `Ok(())` for anything this responder does not handle,
    /// including non-authentication failures; those are the caller's to
    /// surface.
    pub fn handle(&self, path: &str, status: StatusCode) -> Result<(), ApiError> {
        if status != StatusCode::UNAUTHORIZED {
            return Ok(());
        }

        if self.is_exempt(path) {
            tracing::debug!("Authentication rejection on exempt path {}", path);
            return Err(ApiError::AuthenticationRejected {
                path: path.to_string(),
            });
        }

        // One-shot: a burst of rejected in-flight requests signs out once.
        if !self.invalidated.swap(true, Ordering::SeqCst) {
            tracing::info!("Session invalidated by rejection on {}; signing out", path);
            self.store.clear_all();
            if let Some(hook) = &self.hook {
                hook();
            }
        }

        Err(ApiError::AuthenticationRejected {
            path: path.to_string(),
        })
    }

    /// Re-arms the one-shot sign-out after a successful credential exchange
    pub fn reset(&self) {
        self.invalidated.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Scope;
    use std::sync::atomic::AtomicU32;

    fn responder_with_hook(
        store: Arc<TokenStore>,
    ) -> (FailureResponder, Arc<AtomicU32>) {
        let fired = Arc::new(AtomicU32::new(0));
        let counter = fired.clone();
        let hook: SessionInvalidatedHook = Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let responder = FailureResponder::new(store, Some(hook), vec!["/auth/check"]);
        (responder, fired)
    }

    #[test]
    fn test_success_status_passes_through() {
        let store = Arc::new(TokenStore::in_memory());
        let (responder, fired) = responder_with_hook(store);

        assert!(responder.handle("/user/profile", StatusCode::OK).is_ok());
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_non_auth_failure_passes_through() {
        let store = Arc::new(TokenStore::in_memory());
        let (responder, fired) = responder_with_hook(store);

        assert!(responder
            .handle("/user/profile", StatusCode::INTERNAL_SERVER_ERROR)
            .is_ok());
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_rejection_signs_out_and_clears_store() {
        let store = Arc::new(TokenStore::in_memory());
        store.write(Scope::Session, "s-token");
        store.write(Scope::Persistent, "p-token");
        let (responder, fired) = responder_with_hook(store.clone());

        let result = responder.handle("/user/profile", StatusCode::UNAUTHORIZED);
        assert!(matches!(
            result,
            Err(ApiError::AuthenticationRejected { path }) if path == "/user/profile"
        ));
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(store.read_active(), None);
    }

    #[test]
    fn test_exempt_path_propagates_without_side_effects() {
        let store = Arc::new(TokenStore::in_memory());
        store.write(Scope::Session, "s-token");
        let (responder, fired) = responder_with_hook(store.clone());

        let result = responder.handle("/auth/check", StatusCode::UNAUTHORIZED);
        assert!(matches!(
            result,
            Err(ApiError::AuthenticationRejected { .. })
        ));
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert_eq!(store.read(Scope::Session), Some("s-token".to_string()));
    }

    #[test]
    fn test_sign_out_fires_once_per_burst() {
        let store = Arc::new(TokenStore::in_memory());
        let (responder, fired) = responder_with_hook(store);

        let _ = responder.handle("/user/profile", StatusCode::UNAUTHORIZED);
        let _ = responder.handle("/user/messages", StatusCode::UNAUTHORIZED);
        let _ = responder.handle("/gemini/ask", StatusCode::UNAUTHORIZED);

        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_reset_rearms_sign_out() {
        let store = Arc::new(TokenStore::in_memory());
        let (responder, fired) = responder_with_hook(store);

        let _ = responder.handle("/user/profile", StatusCode::UNAUTHORIZED);
        responder.reset();
        let _ = responder.handle("/user/profile", StatusCode::UNAUTHORIZED);

        assert_eq!(fired.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_responder_without_hook_still_clears_store() {
        let store = Arc::new(TokenStore::in_memory());
        store.write(Scope::Session, "s-token");
        let responder = FailureResponder::new(store.clone(), None, vec!["/auth/check"]);

        let _ = responder.handle("/user/profile", StatusCode::UNAUTHORIZED);
        assert_eq!(store.read_active(), None);
    }
}
