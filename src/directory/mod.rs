//! The directory service seam.
//!
//! Authentication only ever needs two things from a directory: verify a
//! password with a bind, then read the attributes of the bound principal.
//! [`LdapDirectory`] provides both on top of `ldap3`; tests plug in their own.

use crate::attributes::RawAttributeSet;
use async_trait::async_trait;
use thiserror::Error;

pub mod ldap;

pub use self::ldap::LdapDirectory;

/// Faults raised by a directory client below the level of a bind decision.
#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("failed to connect to {url}: {source}")]
    Connect {
        url: String,
        #[source]
        source: ldap3::LdapError,
    },
    /// The server answered the bind with a result code that says nothing
    /// about the credentials (busy, unavailable, protocol error, ...).
    #[error("LDAP bind failed with result code {rc}: {text}")]
    Bind { rc: u32, text: String },
    #[error("LDAP operation failed: {0}")]
    Ldap(#[from] ldap3::LdapError),
    #[error("directory unavailable: {0}")]
    Unavailable(String),
}

/// Opens one session per authentication attempt.
#[async_trait]
pub trait Directory: Send + Sync {
    type Session: DirectorySession;

    async fn connect(&self) -> Result<Self::Session, DirectoryError>;
}

#[async_trait]
pub trait DirectorySession: Send {
    /// Returns `Ok(false)` when the directory rejects the credentials.
    async fn bind(&mut self, username: &str, password: &str) -> Result<bool, DirectoryError>;

    /// Looks up the entry whose `identity_attribute` equals `identity_value`.
    ///
    /// `selected` limits the attributes returned; `None` asks for all of them.
    /// Returns `Ok(None)` when no entry matches.
    async fn fetch_attributes(
        &mut self,
        identity_attribute: &str,
        identity_value: &str,
        selected: Option<&[String]>,
    ) -> Result<Option<RawAttributeSet>, DirectoryError>;

    async fn close(&mut self) {}
}
