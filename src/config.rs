use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use tracing::info;

use crate::attributes::MEMBERSHIP_KEY;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    pub directory: DirectoryConfig,
    #[serde(default)]
    pub attributes: AttributesConfig,
    #[serde(default)]
    pub form: FormFields,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Connection settings handed to the LDAP client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryConfig {
    /// `ldap://` or `ldaps://` URL of the primary domain controller.
    pub url: String,
    /// Further controllers tried in order when the previous one is unreachable.
    #[serde(default)]
    pub domain_controllers: Vec<String>,
    /// Search base for principal lookups, e.g. `DC=example,DC=com`.
    pub base_dn: String,
    /// Prepended to the username when binding, e.g. `EXAMPLE\`.
    #[serde(default)]
    pub account_prefix: String,
    /// Appended to the username when binding, e.g. `@example.com`.
    #[serde(default)]
    pub account_suffix: String,
    #[serde(default)]
    pub start_tls: bool,
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

fn default_timeout() -> u64 {
    10
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            url: "ldap://localhost:389".to_string(),
            domain_controllers: Vec::new(),
            base_dn: "DC=example,DC=com".to_string(),
            account_prefix: String::new(),
            account_suffix: String::new(),
            start_tls: false,
            timeout_seconds: default_timeout(),
        }
    }
}

impl DirectoryConfig {
    pub fn urls(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.url.as_str()).chain(self.domain_controllers.iter().map(String::as_str))
    }

    pub fn bind_name(&self, username: &str) -> String {
        format!("{}{}{}", self.account_prefix, username, self.account_suffix)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributesConfig {
    /// Attribute matched against the username after a successful bind.
    #[serde(default = "default_identity_attribute")]
    pub identity_attribute: String,
    /// Attributes removed from the user record.
    #[serde(default = "default_ignored")]
    pub ignored: Vec<String>,
    /// Attributes to fetch; `None` fetches everything.
    #[serde(default)]
    pub select: Option<Vec<String>>,
}

fn default_identity_attribute() -> String {
    "samaccountname".to_string()
}

fn default_ignored() -> Vec<String> {
    ["distinguishedname", "dn", "objectcategory", "objectclass"]
        .into_iter()
        .map(String::from)
        .collect()
}

impl Default for AttributesConfig {
    fn default() -> Self {
        Self {
            identity_attribute: default_identity_attribute(),
            ignored: default_ignored(),
            select: None,
        }
    }
}

/// Names of the form fields carrying the credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormFields {
    pub username: String,
    pub password: String,
}

impl Default for FormFields {
    fn default() -> Self {
        Self {
            username: "username".to_string(),
            password: "password".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
    pub console: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
            console: true,
        }
    }
}

/// Validated, immutable settings for a [`DirectoryAuthenticator`].
///
/// [`DirectoryAuthenticator`]: crate::auth::DirectoryAuthenticator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatorSettings {
    identity_attribute: String,
    ignored: BTreeSet<String>,
    selected: Option<Vec<String>>,
}

impl AuthenticatorSettings {
    pub fn new(
        identity_attribute: impl Into<String>,
        ignored: impl IntoIterator<Item = String>,
        selected: Option<Vec<String>>,
    ) -> Result<Self> {
        let identity_attribute = identity_attribute.into();
        if identity_attribute.trim().is_empty() {
            return Err(anyhow!("Identity attribute cannot be empty"));
        }

        let selected = match selected {
            Some(mut keys) => {
                if keys.iter().any(|key| key.trim().is_empty()) {
                    return Err(anyhow!("Selected attribute names cannot be empty"));
                }
                if !keys.iter().any(|key| key == MEMBERSHIP_KEY) {
                    keys.push(MEMBERSHIP_KEY.to_string());
                }
                Some(keys)
            }
            None => None,
        };

        Ok(Self {
            identity_attribute,
            ignored: ignored.into_iter().collect(),
            selected,
        })
    }

    pub fn identity_attribute(&self) -> &str {
        &self.identity_attribute
    }

    pub fn ignored(&self) -> &BTreeSet<String> {
        &self.ignored
    }

    /// Attributes to request; always includes the membership attribute when set.
    pub fn selected(&self) -> Option<&[String]> {
        self.selected.as_deref()
    }
}

impl Default for AuthenticatorSettings {
    fn default() -> Self {
        Self {
            identity_attribute: default_identity_attribute(),
            ignored: default_ignored().into_iter().collect(),
            selected: None,
        }
    }
}

impl TryFrom<&AttributesConfig> for AuthenticatorSettings {
    type Error = anyhow::Error;

    fn try_from(config: &AttributesConfig) -> Result<Self> {
        Self::new(
            config.identity_attribute.clone(),
            config.ignored.iter().cloned(),
            config.select.clone(),
        )
    }
}

impl Config {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        config.validate()?;
        info!("Configuration loaded successfully");
        Ok(config)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        for url in self.directory.urls() {
            if !url.starts_with("ldap://") && !url.starts_with("ldaps://") {
                return Err(anyhow!("Directory URL must start with ldap:// or ldaps://: {}", url));
            }

            if url.starts_with("ldaps://") && self.directory.start_tls {
                return Err(anyhow!("STARTTLS cannot be combined with an ldaps:// URL"));
            }
        }

        if self.directory.base_dn.trim().is_empty() {
            return Err(anyhow!("Directory base DN cannot be empty"));
        }

        if self.directory.timeout_seconds == 0 {
            return Err(anyhow!("Directory timeout must be greater than 0"));
        }

        if self.form.username.is_empty() || self.form.password.is_empty() {
            return Err(anyhow!("Form field names cannot be empty"));
        }

        self.authenticator_settings()?;

        if !["trace", "debug", "info", "warn", "error"].contains(&self.logging.level.as_str()) {
            return Err(anyhow!("Invalid log level: {}", self.logging.level));
        }

        Ok(())
    }

    pub fn authenticator_settings(&self) -> Result<AuthenticatorSettings> {
        AuthenticatorSettings::try_from(&self.attributes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_minimal_yaml_fills_defaults() {
        let yaml = r#"
directory:
  url: ldaps://dc1.example.com:636
  base_dn: DC=example,DC=com
  account_suffix: "@example.com"
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert!(config.validate().is_ok());

        assert_eq!(config.directory.timeout_seconds, 10);
        assert!(config.directory.domain_controllers.is_empty());
        assert_eq!(config.directory.bind_name("jdoe"), "jdoe@example.com");
        assert_eq!(config.attributes.identity_attribute, "samaccountname");
        assert_eq!(config.attributes.ignored.len(), 4);
        assert!(config.attributes.select.is_none());
        assert_eq!(config.form.username, "username");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_domain_controllers_follow_primary_url() {
        let yaml = r#"
directory:
  url: ldaps://dc1.example.com
  domain_controllers:
    - ldaps://dc2.example.com
    - ldaps://dc3.example.com
  base_dn: DC=example,DC=com
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert!(config.validate().is_ok());

        let urls: Vec<&str> = config.directory.urls().collect();
        assert_eq!(
            urls,
            vec!["ldaps://dc1.example.com", "ldaps://dc2.example.com", "ldaps://dc3.example.com"]
        );
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = Config::default();
        config.directory.url = "http://dc1".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.directory.url = "ldaps://dc1".to_string();
        config.directory.start_tls = true;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.directory.domain_controllers = vec!["dc2.example.com".to_string()];
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.directory.base_dn = " ".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.attributes.select = Some(vec!["mail".to_string(), String::new()]);
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.logging.level = "loud".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_selected_always_includes_membership() {
        let settings = AuthenticatorSettings::new(
            "samaccountname",
            Vec::new(),
            Some(vec!["mail".to_string(), "cn".to_string()]),
        )
        .unwrap();
        assert_eq!(settings.selected(), Some(&["mail".to_string(), "cn".to_string(), "memberof".to_string()][..]));

        let settings = AuthenticatorSettings::new(
            "samaccountname",
            Vec::new(),
            Some(vec!["memberof".to_string()]),
        )
        .unwrap();
        assert_eq!(settings.selected().map(<[String]>::len), Some(1));

        assert!(AuthenticatorSettings::default().selected().is_none());
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let path = std::env::temp_dir().join(format!("rust-adauth-{}.yml", std::process::id()));
        let mut config = Config::default();
        config.attributes.select = Some(vec!["mail".to_string()]);
        config.save_to_file(&path).unwrap();

        let loaded = Config::load_from_file(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(loaded.attributes.select, Some(vec!["mail".to_string()]));
        assert_eq!(loaded.directory.url, config.directory.url);
    }
}
