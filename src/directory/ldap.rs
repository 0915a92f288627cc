use super::{Directory, DirectoryError, DirectorySession};
use crate::attributes::{AttributeValue, RawAttributeSet};
use crate::config::DirectoryConfig;
use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use ldap3::{
    ldap_escape, Ldap, LdapConnAsync, LdapConnSettings, LdapResult, Scope, SearchEntry,
};
use std::time::Duration;
use tracing::{debug, trace, warn};

const INVALID_CREDENTIALS: u32 = 49;
const INSUFFICIENT_ACCESS_RIGHTS: u32 = 50;
const UNWILLING_TO_PERFORM: u32 = 53;

#[derive(Clone)]
pub struct LdapDirectory {
    config: DirectoryConfig,
}

impl LdapDirectory {
    pub fn new(config: DirectoryConfig) -> Self {
        Self { config }
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.config.timeout_seconds)
    }
}

#[async_trait]
impl Directory for LdapDirectory {
    type Session = LdapSession;

    /// Tries each configured domain controller in turn and keeps the first
    /// that accepts a connection.
    async fn connect(&self) -> Result<LdapSession, DirectoryError> {
        let mut last_error = None;

        for url in self.config.urls() {
            let settings = LdapConnSettings::new()
                .set_conn_timeout(self.timeout())
                .set_starttls(self.config.start_tls);

            debug!("Connecting to LDAP server: {}", url);

            match LdapConnAsync::with_settings(settings, url).await {
                Ok((conn, ldap)) => {
                    ldap3::drive!(conn);
                    return Ok(LdapSession {
                        ldap,
                        config: self.config.clone(),
                    });
                }
                Err(source) => {
                    warn!("Failed to connect to LDAP server {}: {}", url, source);
                    last_error = Some(DirectoryError::Connect {
                        url: url.to_string(),
                        source,
                    });
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            DirectoryError::Unavailable("no domain controllers configured".to_string())
        }))
    }
}

pub struct LdapSession {
    ldap: Ldap,
    config: DirectoryConfig,
}

impl LdapSession {
    fn timeout(&self) -> Duration {
        Duration::from_secs(self.config.timeout_seconds)
    }
}

#[async_trait]
impl DirectorySession for LdapSession {
    async fn bind(&mut self, username: &str, password: &str) -> Result<bool, DirectoryError> {
        let bind_name = self.config.bind_name(username);
        let timeout = self.timeout();
        let result = self
            .ldap
            .with_timeout(timeout)
            .simple_bind(&bind_name, password)
            .await?;

        let decision = bind_decision(&result);
        if let Ok(false) = decision {
            debug!("LDAP bind rejected (rc={})", result.rc);
            trace!("Rejected bind name: {}", bind_name);
        }
        decision
    }

    async fn fetch_attributes(
        &mut self,
        identity_attribute: &str,
        identity_value: &str,
        selected: Option<&[String]>,
    ) -> Result<Option<RawAttributeSet>, DirectoryError> {
        let filter = format!("({}={})", identity_attribute, ldap_escape(identity_value));
        let attrs: Vec<&str> = match selected {
            Some(keys) => keys.iter().map(String::as_str).collect(),
            None => vec!["*"],
        };

        trace!("Searching {} with filter {}", self.config.base_dn, filter);

        let timeout = self.timeout();
        let (entries, _res) = self
            .ldap
            .with_timeout(timeout)
            .search(&self.config.base_dn, Scope::Subtree, &filter, attrs)
            .await?
            .success()?;

        let mut entries = entries.into_iter().filter(|entry| !entry.is_ref());
        let entry = match entries.next() {
            Some(entry) => SearchEntry::construct(entry),
            None => return Ok(None),
        };

        if entries.next().is_some() {
            warn!("Multiple entries match the {} lookup; using the first", identity_attribute);
            trace!("Ambiguous filter {} resolved to {}", filter, entry.dn);
        }

        Ok(Some(into_attribute_set(entry)))
    }

    async fn close(&mut self) {
        if let Err(e) = self.ldap.unbind().await {
            debug!("LDAP unbind failed: {}", e);
        }
    }
}

/// Maps a bind result to a login decision.
///
/// Only credential outcomes count as a rejection: 49 (invalid credentials),
/// 50 (insufficient access) and 53 (disabled or locked account). Any other
/// non-zero code means the server could not decide.
fn bind_decision(result: &LdapResult) -> Result<bool, DirectoryError> {
    match result.rc {
        0 => Ok(true),
        INVALID_CREDENTIALS | INSUFFICIENT_ACCESS_RIGHTS | UNWILLING_TO_PERFORM => Ok(false),
        rc => Err(DirectoryError::Bind {
            rc,
            text: result.text.clone(),
        }),
    }
}

/// Flattens an LDAP entry into an attribute set with lower-case names.
/// The entry DN becomes the `dn` attribute; binary values are base64 encoded.
fn into_attribute_set(entry: SearchEntry) -> RawAttributeSet {
    let mut attributes = RawAttributeSet::new();
    attributes.insert("dn".to_string(), AttributeValue::Multi(vec![entry.dn]));

    for (name, values) in entry.attrs {
        merge(&mut attributes, name, values);
    }

    for (name, values) in entry.bin_attrs {
        let encoded = values
            .iter()
            .map(|value| general_purpose::STANDARD.encode(value))
            .collect();
        merge(&mut attributes, name, encoded);
    }

    attributes
}

fn merge(attributes: &mut RawAttributeSet, name: String, values: Vec<String>) {
    let key = name.to_lowercase();
    match attributes.get_mut(&key) {
        Some(AttributeValue::Multi(existing)) => existing.extend(values),
        _ => {
            attributes.insert(key, AttributeValue::Multi(values));
        }
    }
}
