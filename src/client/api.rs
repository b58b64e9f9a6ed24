//! The Chimeria backend client
//!
//! Typed operations over the backend's JSON/HTTPS contract. Credential
//! exchange (sign-in, sign-up, refresh, sign-out, session check) rides on
//! the long-lived session cookie held in the client's cookie jar; every
//! other operation carries a bearer token attached by the request
//! authenticator before transmission.

use std::sync::Arc;

use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};

use crate::auth::{HttpRefreshTransport, RefreshCoordinator, Scope, TokenStore};
use crate::client::authenticator::RequestAuthenticator;
use crate::client::responder::{FailureResponder, SessionInvalidatedHook};
use crate::config::ClientConfig;
use crate::error::ApiError;

/// Keychain service name the production token store uses
const KEYCHAIN_SERVICE: &str = "Chimeria";

#[derive(Debug, Serialize)]
struct SignInRequest<'a> {
    email: &'a str,
    password: &'a str,
    remember: bool,
}

#[derive(Debug, Serialize)]
struct SignUpRequest<'a> {
    email: &'a str,
    password: &'a str,
    name: &'a str,
}

/// Result of a credential exchange (sign-in or sign-up)
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    /// Freshly issued access token
    pub access_token: String,
    /// Whether the backend considers the session authenticated
    #[serde(default)]
    pub authenticated: bool,
}

/// Result of the bootstrap session check
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckAuthResponse {
    /// Whether the session cookie is still good
    pub authenticated: bool,
    /// Access token reissued alongside a positive check
    #[serde(default)]
    pub access_token: Option<String>,
}

/// The signed-in user's profile
#[derive(Debug, Clone, Deserialize)]
pub struct Profile {
    pub email: String,
    pub name: String,
}

/// One stored conversation message
#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    /// Message text
    pub content: String,
    /// Attached image as a data URL, when the message carried one
    #[serde(default)]
    pub image: Option<String>,
    /// "user" or "assistant"
    pub role: String,
}

/// Answer to an ask request
#[derive(Debug, Clone, Deserialize)]
pub struct AskResponse {
    pub content: String,
    pub role: String,
}

/// An image handed along with a question
///
/// Size and format validation is the embedder's concern; the backend rejects
/// what it cannot handle.
#[derive(Debug, Clone)]
pub struct ImageAttachment {
    /// File name forwarded in the multipart part
    pub file_name: String,
    /// MIME type, e.g. `image/jpeg`
    pub content_type: String,
    /// Raw image bytes
    pub bytes: Vec<u8>,
}

/// Client for the Chimeria backend
///
/// Owns the cookie jar, the scoped token store, and both interceptors.
/// Cheap to share behind an `Arc`; all operations take `&self`.
pub struct ChimeriaClient {
    http: reqwest::Client,
    config: ClientConfig,
    store: Arc<TokenStore>,
    authenticator: RequestAuthenticator,
    api_responder: FailureResponder,
    auth_responder: FailureResponder,
}

impl ChimeriaClient {
    /// Creates a client with the production token store
    pub fn new(config: ClientConfig) -> Result<Self, ApiError> {
        Self::with_store(config, Arc::new(TokenStore::new(KEYCHAIN_SERVICE)), None)
    }

    /// Creates a client over an explicit store and session hook
    ///
    /// The hook fires once when a non-exempt request is rejected for
    /// authentication, after both token scopes have been cleared.
    pub fn with_store(
        config: ClientConfig,
        store: Arc<TokenStore>,
        on_session_invalidated: Option<SessionInvalidatedHook>,
    ) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(config.request_timeout)
            .build()?;

        let transport = HttpRefreshTransport::new(http.clone(), &config.base_url);
        let coordinator = Arc::new(RefreshCoordinator::new(Arc::new(transport)));
        let authenticator =
            RequestAuthenticator::new(store.clone(), coordinator, config.refresh_threshold);

        // Both responders exempt the bootstrap check: "not authenticated
        // yet" is a normal answer there, not a broken session.
        let api_responder = FailureResponder::new(
            store.clone(),
            on_session_invalidated.clone(),
            vec!["/auth/check"],
        );
        let auth_responder =
            FailureResponder::new(store.clone(), on_session_invalidated, vec!["/auth/check"]);

        Ok(Self {
            http,
            config,
            store,
            authenticator,
            api_responder,
            auth_responder,
        })
    }

    /// The token store backing this client
    pub fn store(&self) -> &Arc<TokenStore> {
        &self.store
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    /// Runs the response side of the pipeline and deserializes the body
    async fn finish<T: serde::de::DeserializeOwned>(
        &self,
        responder: &FailureResponder,
        path: &str,
        response: reqwest::Response,
    ) -> Result<T, ApiError> {
        let status = response.status();
        responder.handle(path, status)?;
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Status { status, body });
        }
        Ok(response.json().await?)
    }

    fn on_signed_in(&self) {
        self.api_responder.reset();
        self.auth_responder.reset();
    }

    // ------------------------------------------------------------------
    // Credential exchange
    // ------------------------------------------------------------------

    /// Signs in and stores the issued access token
    ///
    /// `remember` selects the persistent scope; otherwise the token lives
    /// only as long as the process. The other scope is cleared so exactly
    /// one scope stays authoritative.
    pub async fn sign_in(
        &self,
        email: &str,
        password: &str,
        remember: bool,
    ) -> Result<SessionResponse, ApiError> {
        let path = "/auth/sign-in";
        let response = self
            .http
            .post(self.url(path))
            .json(&SignInRequest {
                email,
                password,
                remember,
            })
            .send()
            .await?;
        let session: SessionResponse = self.finish(&self.auth_responder, path, response).await?;

        let scope = if remember {
            Scope::Persistent
        } else {
            Scope::Session
        };
        self.store.write(scope, &session.access_token);
        self.store.clear(scope.other());
        self.on_signed_in();
        tracing::info!("Signed in; access token stored in {:?} scope", scope);
        Ok(session)
    }

    /// Registers a new account and stores the issued token in the session
    /// scope
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        name: &str,
    ) -> Result<SessionResponse, ApiError> {
        let path = "/auth/sign-up";
        let response = self
            .http
            .post(self.url(path))
            .json(&SignUpRequest {
                email,
                password,
                name,
            })
            .send()
            .await?;
        let session: SessionResponse = self.finish(&self.auth_responder, path, response).await?;

        self.store.write(Scope::Session, &session.access_token);
        self.store.clear(Scope::Persistent);
        self.on_signed_in();
        tracing::info!("Signed up; access token stored in Session scope");
        Ok(session)
    }

    /// Asks the backend whether the session cookie is still good
    ///
    /// A rejection here propagates as a normal error instead of signing the
    /// whole application out, so bootstrap flows can treat "not
    /// authenticated" as an expected answer.
    pub async fn check_auth(&self) -> Result<CheckAuthResponse, ApiError> {
        let path = "/auth/check";
        let response = self.http.get(self.url(path)).send().await?;
        let check: CheckAuthResponse = self.finish(&self.auth_responder, path, response).await?;

        if check.authenticated {
            if let Some(token) = &check.access_token {
                self.store.write(Scope::Session, token);
                self.on_signed_in();
            }
        }
        Ok(check)
    }

    /// Signs out on the backend and clears both local token scopes
    ///
    /// Local state is cleared regardless of what the backend answers.
    pub async fn sign_out(&self) -> Result<(), ApiError> {
        let path = "/auth/sign-out";
        let response = self.http.post(self.url(path)).send().await?;
        let status = response.status();

        self.store.clear_all();
        tracing::info!("Signed out; local token scopes cleared");

        self.auth_responder.handle(path, status)?;
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Status { status, body });
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Bearer-authenticated API
    // ------------------------------------------------------------------

    /// Authenticates and transmits one request
    ///
    /// The authentication sequence, including any renewal exchange, is a
    /// blocking precondition of transmission, never a background effect.
    async fn send_authed(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, ApiError> {
        let decision = self.authenticator.authenticate().await;
        Ok(decision.apply(request).send().await?)
    }

    /// Fetches the signed-in user's profile
    pub async fn profile(&self) -> Result<Profile, ApiError> {
        let path = "/user/profile";
        let response = self.send_authed(self.http.get(self.url(path))).await?;
        self.finish(&self.api_responder, path, response).await
    }

    /// Fetches the stored conversation history, oldest first
    pub async fn messages(&self) -> Result<Vec<Message>, ApiError> {
        let path = "/user/messages";
        let response = self.send_authed(self.http.get(self.url(path))).await?;
        self.finish(&self.api_responder, path, response).await
    }

    /// Asks a question, optionally grounded on an image
    pub async fn ask(
        &self,
        question: &str,
        image: Option<ImageAttachment>,
    ) -> Result<AskResponse, ApiError> {
        let path = "/gemini/ask";

        let mut form = Form::new().text("question", question.to_string());
        if let Some(image) = image {
            let part = Part::bytes(image.bytes)
                .file_name(image.file_name)
                .mime_str(&image.content_type)?;
            form = form.part("file", part);
        }

        let response = self
            .send_authed(self.http.post(self.url(path)).multipart(form))
            .await?;
        self.finish(&self.api_responder, path, response).await
    }
}
