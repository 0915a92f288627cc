use crate::attributes::NormalizedUserRecord;
use crate::directory::DirectoryError;
use async_trait::async_trait;
use thiserror::Error;

pub mod credentials;
pub mod directory;

pub use credentials::Credentials;
pub use directory::DirectoryAuthenticator;

/// Result of an authentication attempt that reached a decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    Authenticated(NormalizedUserRecord),
    /// The directory refused the credentials.
    Rejected,
}

impl AuthOutcome {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, AuthOutcome::Authenticated(_))
    }

    pub fn user(&self) -> Option<&NormalizedUserRecord> {
        match self {
            AuthOutcome::Authenticated(user) => Some(user),
            AuthOutcome::Rejected => None,
        }
    }

    pub fn into_user(self) -> Option<NormalizedUserRecord> {
        match self {
            AuthOutcome::Authenticated(user) => Some(user),
            AuthOutcome::Rejected => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    /// Missing or malformed credentials; the directory was not contacted.
    #[error("invalid login request: {0}")]
    Validation(String),
    /// The bind succeeded but the principal could not be looked up.
    /// `username` is kept for the caller but left out of the message.
    #[error("directory has no entry for the authenticated user")]
    DirectoryInconsistency { username: String },
    #[error("cannot reach directory service: {0}")]
    Transport(#[from] DirectoryError),
}

#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Authenticate a user.
    /// Returns `Ok(Rejected)` for bad credentials and `Err` only when no
    /// decision could be made.
    async fn authenticate(&self, credentials: &Credentials) -> Result<AuthOutcome, AuthError>;

    async fn authenticate_user(
        &self,
        username: &str,
        password: &str,
    ) -> Result<AuthOutcome, AuthError> {
        self.authenticate(&Credentials::new(username, password)).await
    }
}
