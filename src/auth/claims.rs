//! Access token claims inspection
//!
//! Decodes the payload segment of a JWT to read its expiry. The signature is
//! deliberately not validated: the backend is the final arbiter of token
//! validity, the client only needs the expiry to decide whether to renew
//! proactively before a request goes out.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use thiserror::Error;

/// Errors that can occur when decoding token claims
#[derive(Debug, Error)]
pub enum ClaimsError {
    /// The token is not a three-segment JWT
    #[error("Token is not a three-segment JWT")]
    Malformed,

    /// The payload segment is not valid base64url
    #[error("Payload is not valid base64url: {0}")]
    Base64(#[from] base64::DecodeError),

    /// The payload is not valid claims JSON
    #[error("Payload is not valid claims JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Claims carried by a Chimeria access token
#[derive(Debug, Clone, Deserialize)]
pub struct AccessClaims {
    /// Expiration time, seconds since the Unix epoch
    pub exp: i64,
    /// Subject user id
    #[serde(default)]
    pub id: Option<String>,
    /// Subject email
    #[serde(default)]
    pub email: Option<String>,
}

impl AccessClaims {
    /// Expiry as an instant, or `None` if `exp` is out of representable range
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.exp, 0)
    }
}

/// Decodes the claims of a bearer token without validating its signature
///
/// Never panics; a malformed token is an error the caller is expected to
/// swallow by using the token as-is.
pub fn decode_claims(token: &str) -> Result<AccessClaims, ClaimsError> {
    let mut segments = token.split('.');
    let payload = match (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) {
        (Some(_), Some(payload), Some(_), None) => payload,
        _ => return Err(ClaimsError::Malformed),
    };

    let bytes = URL_SAFE_NO_PAD.decode(payload)?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Builds an unsigned token with the given expiry, for tests
#[cfg(test)]
pub(crate) fn forge_token(exp: i64) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(
        serde_json::json!({ "id": "user-1", "email": "astronaut@chimeria.test", "exp": exp })
            .to_string(),
    );
    format!("{}.{}.forged-signature", header, payload)
}
