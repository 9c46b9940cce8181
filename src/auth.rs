//! Static credential lookup and operator sessions.
//!
//! Passwords are stored as lowercase hex SHA-256 digests. A session is the
//! explicit replacement for "whoever is logged in": it travels with every
//! service call and decides which locations the operator may touch.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::config::UserConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Any location, reconciler and movement log
    Admin,
    /// One assigned location
    User,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    InvalidCredentials,
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::InvalidCredentials => write!(f, "Invalid user name or password."),
        }
    }
}

impl std::error::Error for AuthError {}

/// Hex SHA-256 digest of a password, as stored in the credential mapping.
pub fn password_digest(password: &str) -> String {
    let digest = Sha256::digest(password.as_bytes());
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    pub user: String,
    pub role: Role,
    pub assigned_location: Option<String>,
}

impl Session {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn can_access(&self, location: &str) -> bool {
        match self.role {
            Role::Admin => true,
            Role::User => self
                .assigned_location
                .as_deref()
                .is_some_and(|assigned| assigned == location.trim()),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CredentialStore {
    users: BTreeMap<String, UserConfig>,
}

impl CredentialStore {
    pub fn new(users: BTreeMap<String, UserConfig>) -> Self {
        Self { users }
    }

    /// Check a user name and password. Surrounding whitespace is ignored on
    /// both; operators paste values with stray spaces.
    pub fn authenticate(&self, user: &str, password: &str) -> Result<Session, AuthError> {
        let user = user.trim();
        let entry = self.users.get(user).ok_or_else(|| {
            log::warn!("login attempt for unknown user '{user}'");
            AuthError::InvalidCredentials
        })?;
        if !entry
            .password_sha256
            .trim()
            .eq_ignore_ascii_case(&password_digest(password.trim()))
        {
            log::warn!("wrong password for '{user}'");
            return Err(AuthError::InvalidCredentials);
        }
        log::info!("'{user}' logged in as {:?}", entry.role);
        Ok(Session {
            user: user.to_string(),
            role: entry.role,
            assigned_location: match entry.role {
                Role::Admin => None,
                Role::User => entry.location.clone(),
            },
        })
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}
