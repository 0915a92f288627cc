use super::{AuthError, AuthOutcome, Authenticator, Credentials};
use crate::attributes::{sanitize, NormalizedUserRecord};
use crate::config::{AuthenticatorSettings, Config};
use crate::directory::{Directory, DirectoryError, DirectorySession, LdapDirectory};
use async_trait::async_trait;
use tracing::{debug, error, info, trace, warn};

/// Verifies credentials with a bind, then reads and normalizes the
/// principal's attributes.
pub struct DirectoryAuthenticator<D> {
    directory: D,
    settings: AuthenticatorSettings,
}

impl<D: Directory> DirectoryAuthenticator<D> {
    pub fn new(directory: D, settings: AuthenticatorSettings) -> Self {
        Self { directory, settings }
    }

    pub fn settings(&self) -> &AuthenticatorSettings {
        &self.settings
    }

    async fn resolve(
        &self,
        session: &mut D::Session,
        credentials: &Credentials,
    ) -> Result<AuthOutcome, AuthError> {
        let username = credentials.username();

        if !session
            .bind(username, credentials.password())
            .await
            .map_err(transport_fault)?
        {
            debug!("Directory rejected credentials");
            trace!("Rejected user: {}", username);
            return Ok(AuthOutcome::Rejected);
        }

        let raw = session
            .fetch_attributes(
                self.settings.identity_attribute(),
                username,
                self.settings.selected(),
            )
            .await
            .map_err(transport_fault)?
            .ok_or_else(|| {
                warn!(
                    "Bind succeeded but no entry matches the {} lookup",
                    self.settings.identity_attribute()
                );
                trace!("Unresolved user: {}", username);
                AuthError::DirectoryInconsistency {
                    username: username.to_string(),
                }
            })?;

        let record = NormalizedUserRecord::from_sanitized(sanitize(raw, self.settings.ignored()));
        info!("Authenticated user with {} groups", record.groups.len());
        trace!("Authenticated user: {}", username);

        Ok(AuthOutcome::Authenticated(record))
    }
}

impl DirectoryAuthenticator<LdapDirectory> {
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        Ok(Self::new(
            LdapDirectory::new(config.directory.clone()),
            config.authenticator_settings()?,
        ))
    }
}

fn transport_fault(e: DirectoryError) -> AuthError {
    error!("Directory fault: {}", e);
    AuthError::Transport(e)
}

#[async_trait]
impl<D: Directory> Authenticator for DirectoryAuthenticator<D> {
    async fn authenticate(&self, credentials: &Credentials) -> Result<AuthOutcome, AuthError> {
        credentials.validate()?;

        let mut session = self.directory.connect().await.map_err(transport_fault)?;
        let outcome = self.resolve(&mut session, credentials).await;
        session.close().await;

        outcome
    }
}
