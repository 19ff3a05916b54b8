//! Static identity directory.
//!
//! Inspectors are looked up in the `[identity.users]` table of the
//! configuration. A successful login yields an [`Inspector`], which is the
//! only way to obtain one outside tests.

use std::collections::BTreeMap;
use std::fmt;

use tracing::{debug, warn};

use crate::config::IdentityConfig;
use crate::error::{Error, Result};

/// An authenticated operator.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Inspector(String);

impl Inspector {
    /// The username this inspector logged in with.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.0
    }

    #[cfg(test)]
    pub(crate) fn for_tests(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl fmt::Display for Inspector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Username to password lookup.
pub struct Directory {
    users: BTreeMap<String, String>,
}

impl fmt::Debug for Directory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Directory")
            .field("users", &self.users.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Directory {
    /// Build the directory from configuration.
    #[must_use]
    pub fn from_config(config: &IdentityConfig) -> Self {
        Self {
            users: config.users.clone(),
        }
    }

    /// Number of known users.
    #[must_use]
    pub fn len(&self) -> usize {
        self.users.len()
    }

    /// Whether no users are configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    /// Check `username` and `password` against the directory.
    ///
    /// The username is matched after trimming surrounding whitespace; the
    /// password is compared exactly.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidCredentials`] if the user is unknown or the
    /// password does not match.
    pub fn authenticate(&self, username: &str, password: &str) -> Result<Inspector> {
        let username = username.trim();
        match self.users.get(username) {
            Some(expected) if expected == password => {
                debug!(user = username, "Login succeeded");
                Ok(Inspector(username.to_string()))
            }
            _ => {
                warn!(user = username, "Login failed");
                Err(Error::InvalidCredentials)
            }
        }
    }

    /// Authenticate from optional CLI credentials.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotAuthenticated`] if either value is missing, and
    /// [`Error::InvalidCredentials`] if they do not match.
    pub fn login(&self, username: Option<&str>, password: Option<&str>) -> Result<Inspector> {
        match (username, password) {
            (Some(user), Some(pass)) => self.authenticate(user, pass),
            _ => Err(Error::NotAuthenticated),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn directory() -> Directory {
        let mut config = IdentityConfig::default();
        config.users.insert("joao".to_string(), "solda123".to_string());
        config.users.insert("maria".to_string(), "pintura".to_string());
        Directory::from_config(&config)
    }

    #[test]
    fn test_authenticate_success() {
        let inspector = directory().authenticate("joao", "solda123").unwrap();
        assert_eq!(inspector.name(), "joao");
        assert_eq!(inspector.to_string(), "joao");
    }

    #[test]
    fn test_authenticate_trims_username() {
        let inspector = directory().authenticate("  maria ", "pintura").unwrap();
        assert_eq!(inspector.name(), "maria");
    }

    #[test]
    fn test_wrong_password() {
        let err = directory().authenticate("joao", "pintura").unwrap_err();
        assert!(matches!(err, Error::InvalidCredentials));
    }

    #[test]
    fn test_unknown_user() {
        let err = directory().authenticate("pedro", "").unwrap_err();
        assert!(matches!(err, Error::InvalidCredentials));
    }

    #[test]
    fn test_login_requires_both_values() {
        let dir = directory();
        assert!(matches!(
            dir.login(Some("joao"), None).unwrap_err(),
            Error::NotAuthenticated
        ));
        assert!(matches!(dir.login(None, None).unwrap_err(), Error::NotAuthenticated));
        assert!(dir.login(Some("joao"), Some("solda123")).is_ok());
    }

    #[test]
    fn test_empty_directory_rejects_everyone() {
        let dir = Directory::from_config(&IdentityConfig::default());
        assert!(dir.is_empty());
        assert!(dir.authenticate("", "").is_err());
    }

    #[test]
    fn test_debug_hides_passwords() {
        let rendered = format!("{:?}", directory());
        assert!(rendered.contains("joao"));
        assert!(!rendered.contains("solda123"));
        assert_eq!(directory().len(), 2);
    }
}
