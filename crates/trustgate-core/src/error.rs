//! Error types for the trust engine

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::types::UserId;

/// Result type alias using ConfigError
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Authentication mechanism a credential failure belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mechanism {
    /// Client certificate supplied by the transport layer
    Certificate,
    /// Federated (OpenID) login recorded in the trust state
    #[serde(rename = "openid")]
    OpenId,
}

impl fmt::Display for Mechanism {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mechanism::Certificate => write!(f, "certificate"),
            Mechanism::OpenId => write!(f, "openid"),
        }
    }
}

/// Why a credential did not contribute to this request's authentication.
///
/// These never abort resolution. The resolver drops the mechanism's
/// contribution and reports the kind to the caller as a warning.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CredentialError {
    /// No certificate with the presented serial
    #[error("Unrecognised client certificate: {serial}")]
    CertNotFound { serial: String },

    /// The owning account has disabled certificate login
    #[error("Client certificates are disabled for this account")]
    CertAuthDisabled,

    /// The certificate is past its validity period
    #[error("Client certificate {serial} has expired")]
    CertExpired { serial: String },

    /// The certificate was revoked
    #[error("Client certificate {serial} has been revoked")]
    CertRevoked { serial: String },

    /// No identity record for the stored federated login
    #[error("Unrecognised OpenID identity: {url}")]
    OpenIdNotFound { url: String },

    /// The owning account only accepts client certificates
    #[error("OpenID login is disabled for this account")]
    OpenIdAuthDisabled,

    /// Two credentials in one session named different users
    #[error("{mechanism} names user '{actual}' but the session belongs to '{expected}'")]
    AuthConflict {
        mechanism: Mechanism,
        expected: UserId,
        actual: UserId,
    },
}

impl CredentialError {
    /// The mechanism whose contribution was dropped
    pub fn mechanism(&self) -> Mechanism {
        match self {
            CredentialError::CertNotFound { .. }
            | CredentialError::CertAuthDisabled
            | CredentialError::CertExpired { .. }
            | CredentialError::CertRevoked { .. } => Mechanism::Certificate,
            CredentialError::OpenIdNotFound { .. } | CredentialError::OpenIdAuthDisabled => {
                Mechanism::OpenId
            }
            CredentialError::AuthConflict { mechanism, .. } => *mechanism,
        }
    }

    /// True for [`CredentialError::AuthConflict`]
    pub fn is_conflict(&self) -> bool {
        matches!(self, CredentialError::AuthConflict { .. })
    }
}

/// Errors raised while loading configuration or the trust rule table
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A rule has no alternatives at all
    #[error("Trust rule '{0}' has no prerequisite sets")]
    NoAlternatives(String),

    /// A prerequisite set is empty and would grant unconditionally
    #[error("Trust rule '{0}' has an empty prerequisite set")]
    EmptyPrerequisites(String),

    /// Two rules derive the same principal
    #[error("Duplicate trust rule for '{0}'")]
    DuplicateRule(String),

    /// A rule tries to derive a principal that must come from the account
    #[error("Trust rule may not derive '{0}'")]
    ForbiddenDerivation(String),

    /// A configuration value could not be used
    #[error("Invalid value for {name}: {value}")]
    InvalidValue { name: String, value: String },

    /// Reading a rule file failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Rule or config JSON failed to parse
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        ConfigError::Serialization(err.to_string())
    }
}
