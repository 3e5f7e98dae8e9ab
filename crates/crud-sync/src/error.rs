//! # Sync Errors
//!
//! Every failure surfaced by the client, controllers and forms is one [`SyncError`].
//! [`ErrorKind`] orders the kinds by severity, from local field validation up to
//! session-ending authentication failures.

use crate::validation::FieldErrors;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthFailure {
    #[error("no credential present")]
    MissingCredential,
    #[error("credential rejected by server (status {status})")]
    Rejected { status: u16 },
}

/// Classified failure of a sync operation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SyncError {
    #[error("authentication failed: {0}")]
    Auth(#[from] AuthFailure),
    #[error("validation failed: {0}")]
    Validation(FieldErrors),
    #[error("{resource} {id} not found")]
    NotFound { resource: String, id: String },
    #[error("network error: {0}")]
    Network(String),
    #[error("server error {status}: {message}")]
    Server { status: u16, message: String },
    #[error("list controller closed")]
    ControllerClosed,
}

/// Severity-ordered error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Network,
    Server,
    Auth,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Validation => "validation",
            ErrorKind::NotFound => "not found",
            ErrorKind::Network => "network",
            ErrorKind::Server => "server",
            ErrorKind::Auth => "auth",
        };
        f.write_str(name)
    }
}

impl SyncError {
    /// A closed controller produced no response, so it classifies like a transport failure.
    pub fn kind(&self) -> ErrorKind {
        match self {
            SyncError::Auth(_) => ErrorKind::Auth,
            SyncError::Validation(_) => ErrorKind::Validation,
            SyncError::NotFound { .. } => ErrorKind::NotFound,
            SyncError::Network(_) | SyncError::ControllerClosed => ErrorKind::Network,
            SyncError::Server { .. } => ErrorKind::Server,
        }
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, SyncError::Auth(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, SyncError::NotFound { .. })
    }

    pub(crate) fn missing_credential() -> Self {
        SyncError::Auth(AuthFailure::MissingCredential)
    }
}
