//! Credential repositories
//!
//! Lookups are synchronous and side-effect free; callers may retry them
//! freely. A `None` result means "no such record", never a fault.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use trustgate_core::{CertAuthPolicy, UserId};

use crate::error::RepositoryError;

/// A client certificate as seen by the resolver
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Certificate {
    /// Lower-case serial
    pub serial: String,

    /// Owning account
    pub user_id: UserId,

    /// The owner's certificate policy at lookup time
    pub owner_cert_policy: CertAuthPolicy,

    /// Past its validity period
    #[serde(default)]
    pub expired: bool,

    /// Explicitly revoked
    #[serde(default)]
    pub revoked: bool,
}

/// A registered federated identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityRecord {
    /// Identity URL
    pub url: String,

    /// Owning account
    pub user_id: UserId,

    /// The owner's certificate policy at lookup time
    pub owner_cert_policy: CertAuthPolicy,
}

/// A user account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Stable account id
    pub id: UserId,

    /// Display name
    pub name: String,

    /// Administratively granted roles
    #[serde(default)]
    pub roles: BTreeSet<String>,

    /// Client certificate policy
    #[serde(default)]
    pub cert_auth: CertAuthPolicy,

    /// Registered federated identity URLs
    #[serde(default)]
    pub identity_urls: Vec<String>,

    /// Number of client certificates issued to this account
    #[serde(default)]
    pub certificate_count: usize,
}

impl User {
    /// Create a user with the default `user` role
    pub fn new(id: impl Into<UserId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            roles: BTreeSet::from(["user".to_string()]),
            cert_auth: CertAuthPolicy::default(),
            identity_urls: Vec::new(),
            certificate_count: 0,
        }
    }

    /// Add a role
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.roles.insert(role.into());
        self
    }

    /// Set the certificate policy
    pub fn with_cert_auth(mut self, policy: CertAuthPolicy) -> Self {
        self.cert_auth = policy;
        self
    }

    /// Register a federated identity URL
    pub fn with_identity_url(mut self, url: impl Into<String>) -> Self {
        self.identity_urls.push(url.into());
        self
    }

    /// Whether `url` is one of this account's identity URLs
    pub fn owns_identity_url(&self, url: &str) -> bool {
        self.identity_urls.iter().any(|u| u == url)
    }
}

/// Certificate lookup by serial
pub trait CertificateRepository: Send + Sync {
    /// Find a certificate by its lower-case serial
    fn find_by_serial(&self, serial: &str) -> Result<Option<Certificate>, RepositoryError>;
}

/// Federated identity lookup by URL
pub trait IdentityRepository: Send + Sync {
    /// Find an identity record by URL
    fn find_by_url(&self, url: &str) -> Result<Option<IdentityRecord>, RepositoryError>;
}

/// Account lookup by id
pub trait UserRepository: Send + Sync {
    /// Find a user by id
    fn find_user(&self, id: &UserId) -> Result<Option<User>, RepositoryError>;
}
