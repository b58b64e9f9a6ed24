//! Request pipeline and typed API surface
//!
//! Every outgoing request passes through the request authenticator before
//! transmission; every response passes through a failure responder after
//! receipt. [`ChimeriaClient`] wires both interceptors around a shared
//! cookie-jar HTTP client.

mod api;
mod authenticator;
mod responder;

pub use api::{
    AskResponse, CheckAuthResponse, ChimeriaClient, ImageAttachment, Message, Profile,
    SessionResponse,
};
pub use authenticator::{AuthDecision, RequestAuthenticator};
pub use responder::{FailureResponder, SessionInvalidatedHook};
