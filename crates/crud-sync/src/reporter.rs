//! # Error Reporter
//!
//! Turns a [`SyncError`] into something a screen can show, and performs the one global
//! side effect in the taxonomy: an auth failure clears the credential, which publishes
//! `SignedOut` to the hosting shell.

use crate::credential::CredentialStore;
use crate::error::{ErrorKind, SyncError};
use crate::validation::FieldErrors;
use std::fmt;
use tracing::{error, warn};

/// Where a failure should be displayed.
#[derive(Debug, Clone, PartialEq)]
pub enum Presentation {
    /// Inline, next to each offending field.
    Fields(FieldErrors),
    /// One message for the whole form.
    Form(String),
    /// Nothing inline; the shell reacts to the session signal instead.
    Silent,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub kind: ErrorKind,
    pub presentation: Presentation,
    /// The session is over and the user must sign in again.
    pub terminal: bool,
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.presentation {
            Presentation::Fields(fields) => write!(f, "{}: {fields}", self.kind),
            Presentation::Form(message) => write!(f, "{}: {message}", self.kind),
            Presentation::Silent => write!(f, "{}", self.kind),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ErrorReporter {
    credentials: CredentialStore,
}

impl ErrorReporter {
    pub fn new(credentials: CredentialStore) -> Self {
        Self { credentials }
    }

    /// Ends the session when `error` is an auth failure. Returns whether it did.
    pub fn escalate(&self, error: &SyncError) -> bool {
        if !error.is_auth() {
            return false;
        }
        warn!(error = %error, "Authentication failure, ending session");
        if let Err(e) = self.credentials.clear() {
            error!(error = %e, "Failed to clear credential");
        }
        true
    }

    pub fn report(&self, error: &SyncError) -> Report {
        let kind = error.kind();
        let presentation = match error {
            SyncError::Validation(fields) => Presentation::Fields(fields.clone()),
            SyncError::Auth(_) => {
                self.escalate(error);
                Presentation::Silent
            }
            SyncError::NotFound { resource, id } => {
                Presentation::Form(format!("This {resource} ({id}) no longer exists"))
            }
            SyncError::Network(_) => Presentation::Form(
                "Could not reach the server. Check your connection and try again.".to_string(),
            ),
            SyncError::Server { message, .. } => Presentation::Form(message.clone()),
            SyncError::ControllerClosed => {
                Presentation::Form("This screen is no longer active".to_string())
            }
        };
        Report {
            kind,
            presentation,
            terminal: kind == ErrorKind::Auth,
        }
    }
}
