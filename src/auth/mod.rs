//! Token lifecycle - storage, inspection, and renewal
//!
//! The pieces behind automatic session management:
//! - Scoped token storage with session-over-persistent precedence
//! - Claims inspection to read a token's expiry without validating it
//! - Single-flight renewal against the backend's cookie-authenticated
//!   refresh endpoint

mod claims;
mod refresh;
mod store;

pub use claims::{decode_claims, AccessClaims, ClaimsError};
pub use refresh::{HttpRefreshTransport, RefreshCoordinator, RefreshError, RefreshTransport};
pub use store::{
    KeyringSlot, MemorySlot, Scope, StoreError, TokenSlot, TokenStore, ACCESS_TOKEN_KEY,
};

#[cfg(test)]
pub(crate) use claims::forge_token;
