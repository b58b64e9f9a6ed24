//! Chimeria client - Rust SDK for the Chimeria image Q&A backend
//!
//! Wraps the backend's JSON/HTTPS contract behind typed operations and
//! manages the session token lifecycle on the caller's behalf.
//!
//! ## Features
//!
//! - Two token storage scopes: an in-process session scope and an
//!   OS-keychain persistent scope ("remember me"), session taking precedence
//! - Proactive token renewal when less than two minutes of validity remain,
//!   with concurrent renewals coalesced into one backend exchange
//! - Fail-open attachment: an undecodable token or a failed renewal still
//!   sends the request with whatever is stored, leaving the backend as the
//!   final arbiter
//! - A session-invalidated hook replacing the whole-application redirect a
//!   browser client would perform on an authentication rejection
//!
//! ## Architecture
//!
//! - **auth**: scoped token storage, claims inspection, refresh coalescing
//! - **client**: the request/response interceptors and the typed API surface
//! - **config**: client configuration
//!
//! ## Example
//!
//! ```no_run
//! use chimeria_client::{ChimeriaClient, ClientConfig};
//!
//! # async fn run() -> Result<(), chimeria_client::ApiError> {
//! let client = ChimeriaClient::new(ClientConfig::new("https://api.chimeria.example"))?;
//! client.sign_in("astronaut@chimeria.test", "hunter2", true).await?;
//! let answer = client.ask("What is this warning light?", None).await?;
//! println!("{}", answer.content);
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod client;
pub mod config;
pub mod error;

pub use auth::{
    decode_claims, AccessClaims, ClaimsError, KeyringSlot, MemorySlot, RefreshCoordinator,
    RefreshError, RefreshTransport, Scope, StoreError, TokenSlot, TokenStore,
};
pub use client::{
    AskResponse, AuthDecision, CheckAuthResponse, ChimeriaClient, FailureResponder,
    ImageAttachment, Message, Profile, RequestAuthenticator, SessionInvalidatedHook,
    SessionResponse,
};
pub use config::ClientConfig;
pub use error::ApiError;

/// Initializes logging for binaries embedding the client
///
/// Filters via `RUST_LOG`, with this crate's own output at debug level by
/// default.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("chimeria_client=debug".parse().unwrap())
                .add_directive("info".parse().unwrap()),
        )
        .init();
}
