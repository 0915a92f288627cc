use super::AuthError;
use crate::config::FormFields;
use base64::{engine::general_purpose, Engine as _};
use secrecy::{ExposeSecret, SecretString};
use std::collections::HashMap;

/// A username and password for a single authentication attempt.
///
/// The password is redacted from `Debug` output and zeroed on drop.
#[derive(Debug)]
pub struct Credentials {
    username: String,
    password: SecretString,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: SecretString::new(password.into()),
        }
    }

    /// Reads the credentials out of submitted form data.
    pub fn from_form(form: &HashMap<String, String>, fields: &FormFields) -> Result<Self, AuthError> {
        let credentials = Self::new(
            form_field(form, &fields.username)?,
            form_field(form, &fields.password)?,
        );
        credentials.validate()?;
        Ok(credentials)
    }

    /// Decodes an HTTP `Authorization: Basic ...` header value.
    pub fn from_basic_auth(header: &str) -> Result<Self, AuthError> {
        let encoded = header
            .strip_prefix("Basic ")
            .ok_or_else(|| AuthError::Validation("expected Basic authorization".to_string()))?;

        let decoded = general_purpose::STANDARD
            .decode(encoded.trim())
            .map_err(|e| AuthError::Validation(format!("malformed Basic credentials: {}", e)))?;
        let decoded = String::from_utf8(decoded)
            .map_err(|_| AuthError::Validation("Basic credentials are not UTF-8".to_string()))?;

        let (username, password) = decoded
            .split_once(':')
            .ok_or_else(|| AuthError::Validation("Basic credentials lack a password".to_string()))?;

        let credentials = Self::new(username, password);
        credentials.validate()?;
        Ok(credentials)
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        self.password.expose_secret()
    }

    /// An empty password would turn the bind into an anonymous one, so both
    /// parts are required before the directory is contacted.
    pub fn validate(&self) -> Result<(), AuthError> {
        if self.username.is_empty() {
            return Err(AuthError::Validation("username is required".to_string()));
        }
        if self.password().is_empty() {
            return Err(AuthError::Validation("password is required".to_string()));
        }
        Ok(())
    }
}

fn form_field<'a>(form: &'a HashMap<String, String>, name: &str) -> Result<&'a str, AuthError> {
    form.get(name)
        .map(String::as_str)
        .ok_or_else(|| AuthError::Validation(format!("missing form field '{}'", name)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_output_hides_password() {
        let credentials = Credentials::new("jdoe", "hunter2");
        let debug = format!("{:?}", credentials);
        assert!(debug.contains("jdoe"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn test_validate_requires_both_parts() {
        assert!(Credentials::new("jdoe", "secret").validate().is_ok());
        assert!(matches!(
            Credentials::new("", "secret").validate(),
            Err(AuthError::Validation(_))
        ));
        assert!(matches!(
            Credentials::new("jdoe", "").validate(),
            Err(AuthError::Validation(_))
        ));
    }

    #[test]
    fn test_from_form_uses_configured_fields() {
        let fields = FormFields {
            username: "login".to_string(),
            password: "pass".to_string(),
        };
        let mut form = HashMap::new();
        form.insert("login".to_string(), "jdoe".to_string());
        form.insert("pass".to_string(), "secret".to_string());

        let credentials = Credentials::from_form(&form, &fields).unwrap();
        assert_eq!(credentials.username(), "jdoe");
        assert_eq!(credentials.password(), "secret");

        form.remove("pass");
        assert!(matches!(
            Credentials::from_form(&form, &fields),
            Err(AuthError::Validation(_))
        ));
    }

    #[test]
    fn test_from_basic_auth() {
        // jdoe:pa:ss
        let credentials = Credentials::from_basic_auth("Basic amRvZTpwYTpzcw==").unwrap();
        assert_eq!(credentials.username(), "jdoe");
        assert_eq!(credentials.password(), "pa:ss");

        assert!(Credentials::from_basic_auth("Bearer abc").is_err());
        assert!(Credentials::from_basic_auth("Basic !!!").is_err());
        // "jdoe"
        assert!(Credentials::from_basic_auth("Basic amRvZQ==").is_err());
        // "jdoe:"
        assert!(Credentials::from_basic_auth("Basic amRvZTo=").is_err());
    }
}
