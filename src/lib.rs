pub mod attributes;
pub mod auth;
pub mod config;
pub mod directory;

pub use attributes::{AttributeValue, NormalizedUserRecord, RawAttributeSet};
pub use auth::{AuthError, AuthOutcome, Authenticator, Credentials, DirectoryAuthenticator};
pub use config::{AuthenticatorSettings, Config};
pub use directory::{Directory, DirectoryError, DirectorySession, LdapDirectory};
