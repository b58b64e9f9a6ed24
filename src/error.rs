//! Error types surfaced by the client
//!
//! The request pipeline fails open and never panics: undecodable tokens are
//! attached as-is, failed renewals fall back to the stored token, and the
//! worst-case outcome of broken authentication state is the
//! session-invalidated hook firing.

use reqwest::StatusCode;
use thiserror::Error;

/// Errors returned by [`ChimeriaClient`](crate::ChimeriaClient) operations
#[derive(Debug, Error)]
pub enum ApiError {
    /// Network or protocol-level failure
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The backend rejected the request's authentication
    #[error("Authentication rejected by {path}")]
    AuthenticationRejected {
        /// Path of the failing request
        path: String,
    },

    /// Non-authentication failure status from the backend
    ///
    /// Propagated unchanged so the embedding application can display it.
    #[error("Request failed with status {status}: {body}")]
    Status {
        /// HTTP status code
        status: StatusCode,
        /// Response body text
        body: String,
    },
}
