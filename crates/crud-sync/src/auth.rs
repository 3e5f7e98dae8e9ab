//! # Auth Client
//!
//! Login and registration exchanges against `/auth/login` and `/auth/reg`. A token
//! returned by either exchange is written through the [`CredentialStore`], which is the
//! only writer of the durable token key.

use crate::client::server_message;
use crate::credential::{Credential, CredentialStore, StoreError};
use crate::error::SyncError;
use crate::transport::{HttpRequest, HttpResponse, HttpTransport, Method};
use crate::validation::Validator;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};

#[derive(Debug, Clone, Default, Serialize)]
pub struct LoginDraft {
    pub login: String,
    pub password: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RegistrationDraft {
    pub login: String,
    pub password: String,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    /// `signed_in` is set when the server also issued a token.
    Registered { signed_in: bool },
    AlreadyExists,
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Sync(#[from] SyncError),
    #[error(transparent)]
    Storage(#[from] StoreError),
}

#[derive(Debug, Default, Deserialize)]
struct TokenReply {
    #[serde(default)]
    token: Option<String>,
}

#[derive(Clone)]
pub struct AuthClient {
    base_url: Arc<str>,
    transport: Arc<dyn HttpTransport>,
    credentials: CredentialStore,
}

impl AuthClient {
    pub fn new(
        base_url: &str,
        transport: Arc<dyn HttpTransport>,
        credentials: CredentialStore,
    ) -> Self {
        Self {
            base_url: Arc::from(base_url.trim_end_matches('/')),
            transport,
            credentials,
        }
    }

    pub fn login_rules() -> Validator<LoginDraft> {
        Validator::<LoginDraft>::new()
            .required("login", "Login is required", |d| &d.login)
            .required("password", "Password is required", |d| &d.password)
    }

    pub fn registration_rules() -> Validator<RegistrationDraft> {
        Validator::<RegistrationDraft>::new()
            .required("login", "Login is required", |d| &d.login)
            .min_len(
                "password",
                8,
                "Password must be at least 8 characters long",
                |d| &d.password,
            )
            .required("name", "Name is required", |d| &d.name)
    }

    /// Exchanges login and password for a token and stores it.
    ///
    /// Wrong credentials are reported as a server error carrying the server's message;
    /// there is no session to end yet.
    #[instrument(skip_all, fields(login = %draft.login))]
    pub async fn login(&self, draft: &LoginDraft) -> Result<Credential, SessionError> {
        Self::login_rules()
            .validate(draft)
            .map_err(SyncError::Validation)?;
        let response = self.post("/auth/login", draft).await?;
        if !response.is_success() {
            return Err(failure(&response).into());
        }

        let reply: TokenReply = serde_json::from_slice(&response.body).unwrap_or_default();
        let token = reply
            .token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| SyncError::Server {
                status: response.status,
                message: "Login response did not include a token".to_string(),
            })?;
        let credential = Credential::new(token);
        self.credentials.set(credential.clone())?;
        info!("Signed in");
        Ok(credential)
    }

    /// Creates an account. `409 Conflict` means the login is taken.
    #[instrument(skip_all, fields(login = %draft.login))]
    pub async fn register(&self, draft: &RegistrationDraft) -> Result<Registration, SessionError> {
        Self::registration_rules()
            .validate(draft)
            .map_err(SyncError::Validation)?;
        let response = self.post("/auth/reg", draft).await?;
        if response.status == 409 {
            info!("Login already registered");
            return Ok(Registration::AlreadyExists);
        }
        if !response.is_success() {
            return Err(failure(&response).into());
        }

        let token = serde_json::from_slice::<TokenReply>(&response.body)
            .ok()
            .and_then(|reply| reply.token)
            .filter(|t| !t.is_empty());
        let signed_in = match token {
            Some(token) => {
                self.credentials.set(Credential::new(token))?;
                true
            }
            None => false,
        };
        info!(signed_in, "Registered");
        Ok(Registration::Registered { signed_in })
    }

    pub fn logout(&self) -> Result<bool, StoreError> {
        self.credentials.clear()
    }

    async fn post<B: Serialize>(&self, path: &str, body: &B) -> Result<HttpResponse, SyncError> {
        let body = serde_json::to_value(body)
            .map_err(|e| SyncError::Network(format!("could not encode request body: {e}")))?;
        let request = HttpRequest::new(Method::Post, format!("{}{path}", self.base_url)).json(body);
        self.transport.send(request).await.map_err(|e| {
            warn!(path, error = %e, "Transport failure");
            SyncError::Network(e.to_string())
        })
    }
}

fn failure(response: &HttpResponse) -> SyncError {
    let message = server_message(response.status, &response.body);
    warn!(status = response.status, %message, "Auth exchange failed");
    SyncError::Server {
        status: response.status,
        message,
    }
}
