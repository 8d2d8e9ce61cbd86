//! Identity provider seam.
//!
//! The usage gate only needs to know who is signed in and whether that identity is
//! anonymous. [`AuthBackend`] abstracts the provider; [`LocalAuthBackend`] is the
//! bundled implementation backed by a JSON account file.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

mod local;
mod password;

pub use local::LocalAuthBackend;
pub use password::{validate_email, validate_password, MIN_PASSWORD_LEN};

/// The signed-in user as seen by the rest of the app.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub uid: String,
    pub is_anonymous: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl Identity {
    pub fn anonymous(uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            is_anonymous: true,
            display_name: None,
            email: None,
        }
    }

    /// Display name, falling back to email, then "Guest" for anonymous users.
    pub fn label(&self) -> &str {
        self.display_name
            .as_deref()
            .or(self.email.as_deref())
            .unwrap_or(if self.is_anonymous { "Guest" } else { "User" })
    }
}

/// Credential for a permanent sign-in.
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    EmailPassword { email: String, password: String },
}

impl Credential {
    pub fn email_password(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self::EmailPassword {
            email: email.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmailPassword { email, .. } => f
                .debug_struct("EmailPassword")
                .field("email", email)
                .field("password", &"<redacted>")
                .finish(),
        }
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Please enter a valid email: {0}")]
    InvalidEmail(String),

    #[error("Password must be at least {min} characters")]
    WeakPassword { min: usize },

    #[error("Name is required")]
    MissingName,

    #[error("An account already exists for {0}")]
    AccountExists(String),

    #[error("Authentication failed: email or password is incorrect")]
    InvalidCredential,

    #[error("Auth storage error: {0}")]
    Storage(String),
}

/// Identity provider used by the usage gate.
///
/// Sign-in operations replace the current session on success and leave it
/// untouched on failure.
#[async_trait]
pub trait AuthBackend: Send + Sync {
    fn current_identity(&self) -> Option<Identity>;

    async fn sign_in_anonymously(&self) -> Result<Identity, AuthError>;

    async fn sign_in_with_credential(&self, credential: &Credential)
        -> Result<Identity, AuthError>;

    /// Create a permanent account and sign it in.
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> Result<Identity, AuthError>;

    async fn sign_out(&self) -> Result<(), AuthError>;
}

/// Result of an auth operation as reported to callers of the gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity: Option<Identity>,
}

impl AuthOutcome {
    pub fn signed_in(identity: Identity) -> Self {
        Self {
            success: true,
            message: None,
            identity: Some(identity),
        }
    }

    pub fn signed_out() -> Self {
        Self {
            success: true,
            message: None,
            identity: None,
        }
    }

    pub fn failed(err: &AuthError) -> Self {
        Self {
            success: false,
            message: Some(err.to_string()),
            identity: None,
        }
    }
}
