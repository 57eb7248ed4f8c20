//! Common types used across the trust engine

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::principal::{AuthStrength, TrustFlag};

/// Stable identifier of a user account
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Create a new user id
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Raw string form
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for UserId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Per-account client certificate policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CertAuthPolicy {
    /// Client certificates may not be used to log in
    Disabled,
    /// Client certificates are accepted alongside other mechanisms
    #[default]
    Allowed,
    /// Certificates are accepted, and required for sensitive operations
    SensitiveRequired,
    /// Certificates are the only accepted login mechanism
    Required,
}

impl CertAuthPolicy {
    /// True for the policies that make the account `auth:secure`
    pub fn is_required(&self) -> bool {
        matches!(self, CertAuthPolicy::Required | CertAuthPolicy::SensitiveRequired)
    }

    /// Whether a client certificate may authenticate this account
    pub fn allows_certificates(&self) -> bool {
        !matches!(self, CertAuthPolicy::Disabled)
    }

    /// Whether a federated login may authenticate this account
    pub fn allows_openid(&self) -> bool {
        !matches!(self, CertAuthPolicy::Required)
    }

    /// Base security flag for an account with this policy
    pub fn strength(&self) -> AuthStrength {
        if self.is_required() {
            AuthStrength::Secure
        } else {
            AuthStrength::Insecure
        }
    }
}

/// Who the current request belongs to.
///
/// Created once per request by the resolver and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Identity {
    /// Nothing validated
    #[default]
    Anonymous,
    /// A user resolved from at least one valid credential
    Resolved {
        /// The resolved account
        user_id: UserId,
        /// Role names granted to the account
        roles: BTreeSet<String>,
    },
}

impl Identity {
    /// Create a resolved identity
    pub fn resolved<I, S>(user_id: impl Into<UserId>, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Identity::Resolved {
            user_id: user_id.into(),
            roles: roles.into_iter().map(Into::into).collect(),
        }
    }

    /// The resolved user id, if any
    pub fn user_id(&self) -> Option<&UserId> {
        match self {
            Identity::Anonymous => None,
            Identity::Resolved { user_id, .. } => Some(user_id),
        }
    }

    /// True for [`Identity::Anonymous`]
    pub fn is_anonymous(&self) -> bool {
        matches!(self, Identity::Anonymous)
    }
}

/// Trust flags that apply to one request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectiveFlags {
    /// Base security flag from the account's certificate policy
    pub strength: AuthStrength,
    /// Mechanisms that validated, in the order they validated
    pub trust: Vec<TrustFlag>,
}

impl EffectiveFlags {
    /// Flags for a request where nothing validated
    pub fn anonymous() -> Self {
        Self {
            strength: AuthStrength::Insecure,
            trust: Vec::new(),
        }
    }

    /// Whether a given mechanism validated
    pub fn has(&self, flag: TrustFlag) -> bool {
        self.trust.contains(&flag)
    }
}

impl Default for EffectiveFlags {
    fn default() -> Self {
        Self::anonymous()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_strength() {
        assert_eq!(CertAuthPolicy::Required.strength(), AuthStrength::Secure);
        assert_eq!(CertAuthPolicy::SensitiveRequired.strength(), AuthStrength::Secure);
        assert_eq!(CertAuthPolicy::Allowed.strength(), AuthStrength::Insecure);
        assert_eq!(CertAuthPolicy::Disabled.strength(), AuthStrength::Insecure);
    }

    #[test]
    fn test_policy_mechanisms() {
        assert!(!CertAuthPolicy::Disabled.allows_certificates());
        assert!(CertAuthPolicy::Disabled.allows_openid());
        // sensitive_required still permits a federated login
        assert!(CertAuthPolicy::SensitiveRequired.allows_openid());
        assert!(!CertAuthPolicy::Required.allows_openid());
    }

    #[test]
    fn test_policy_serde() {
        let policy: CertAuthPolicy = serde_json::from_str(r#""sensitive_required""#).unwrap();
        assert_eq!(policy, CertAuthPolicy::SensitiveRequired);
    }

    #[test]
    fn test_identity() {
        let identity = Identity::resolved("42", ["user", "admin"]);
        assert_eq!(identity.user_id(), Some(&UserId::new("42")));
        assert!(!identity.is_anonymous());
        assert!(Identity::Anonymous.user_id().is_none());
    }
}
