//! Principals and principal sets
//!
//! A principal is an opaque tag a request is said to "hold". Permission
//! checks are evaluated against the full set of principals a request holds
//! (the effective principal set). Principals are grouped into families by
//! their prefix:
//!
//! - `role:*`    roles granted administratively
//! - `user:*`    the resolved user id
//! - `auth:*`    the relative strength of the account's auth policy
//! - `trusted:*` the authentication mechanisms that validated this request
//! - `system.*`  the universal `Everyone` / `Authenticated` constants
//!
//! Anything else (for example `trusted_for:auth`) is a derived principal
//! granted by the trust rule table.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// The full set of principals held by a request.
///
/// Ordered so that iteration (and therefore escalation output) is
/// deterministic.
pub type PrincipalSet = BTreeSet<Principal>;

const EVERYONE: &str = "system.Everyone";
const AUTHENTICATED: &str = "system.Authenticated";

/// An opaque principal tag
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Principal(String);

/// Family a principal belongs to, derived from its prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrincipalFamily {
    /// `role:*`
    Role,
    /// `user:*`
    User,
    /// `auth:*`
    Auth,
    /// `trusted:*`
    Trusted,
    /// `Everyone` / `Authenticated`
    System,
    /// Anything else; only reachable through the trust rule table
    Derived,
}

impl Principal {
    /// Wrap a raw principal string
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The principal every request holds
    pub fn everyone() -> Self {
        Self(EVERYONE.to_string())
    }

    /// The principal every request with a resolved user holds
    pub fn authenticated() -> Self {
        Self(AUTHENTICATED.to_string())
    }

    /// `role:<name>`
    pub fn role(name: impl fmt::Display) -> Self {
        Self(format!("role:{}", name))
    }

    /// `user:<id>`
    pub fn user(id: impl fmt::Display) -> Self {
        Self(format!("user:{}", id))
    }

    /// `auth:secure` or `auth:insecure`
    pub fn auth(strength: AuthStrength) -> Self {
        Self(format!("auth:{}", strength.as_str()))
    }

    /// `trusted:<flag>`
    pub fn trusted(flag: TrustFlag) -> Self {
        Self(format!("trusted:{}", flag.as_str()))
    }

    /// Raw string form
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Family this principal belongs to
    pub fn family(&self) -> PrincipalFamily {
        let s = self.0.as_str();
        if s == EVERYONE || s == AUTHENTICATED {
            PrincipalFamily::System
        } else if s.starts_with("role:") {
            PrincipalFamily::Role
        } else if s.starts_with("user:") {
            PrincipalFamily::User
        } else if s.starts_with("auth:") {
            PrincipalFamily::Auth
        } else if s.starts_with("trusted:") {
            PrincipalFamily::Trusted
        } else {
            PrincipalFamily::Derived
        }
    }

    /// Roles require an administrative grant and can never be acquired by
    /// the user on their own.
    pub fn is_administrative(&self) -> bool {
        self.family() == PrincipalFamily::Role
    }

    /// For `role:*` principals, the role name
    pub fn role_name(&self) -> Option<&str> {
        self.0.strip_prefix("role:")
    }

    /// For `trusted:*` principals, the trust flag it names
    pub fn trust_flag(&self) -> Option<TrustFlag> {
        self.0.strip_prefix("trusted:").and_then(TrustFlag::parse)
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Principal {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Principal {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Marker recording one authentication mechanism that validated this request
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrustFlag {
    /// A client certificate was presented and is valid
    Cert,
    /// A federated (OpenID) login is on record and still accepted
    #[serde(rename = "openid")]
    OpenId,
    /// The federated login happened within the confidence window
    #[serde(rename = "openid_recent")]
    OpenIdRecent,
}

impl TrustFlag {
    /// String form used inside `trusted:*` principals
    pub fn as_str(&self) -> &'static str {
        match self {
            TrustFlag::Cert => "cert",
            TrustFlag::OpenId => "openid",
            TrustFlag::OpenIdRecent => "openid_recent",
        }
    }

    /// Parse the string form
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "cert" => Some(TrustFlag::Cert),
            "openid" => Some(TrustFlag::OpenId),
            "openid_recent" => Some(TrustFlag::OpenIdRecent),
            _ => None,
        }
    }

    /// True for the flags produced by a federated login
    pub fn is_openid(&self) -> bool {
        matches!(self, TrustFlag::OpenId | TrustFlag::OpenIdRecent)
    }
}

impl fmt::Display for TrustFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Base security flag derived from the account's certificate-auth policy.
///
/// Independent of which mechanism actually authenticated the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthStrength {
    /// The account requires client certificates
    Secure,
    /// The account accepts weaker mechanisms
    Insecure,
}

impl AuthStrength {
    /// String form used inside `auth:*` principals
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthStrength::Secure => "secure",
            AuthStrength::Insecure => "insecure",
        }
    }
}

impl fmt::Display for AuthStrength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Build a principal set from string literals
pub fn principal_set<I, S>(items: I) -> PrincipalSet
where
    I: IntoIterator<Item = S>,
    S: Into<Principal>,
{
    items.into_iter().map(Into::into).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructors() {
        assert_eq!(Principal::role("admin").as_str(), "role:admin");
        assert_eq!(Principal::user(42).as_str(), "user:42");
        assert_eq!(Principal::auth(AuthStrength::Secure).as_str(), "auth:secure");
        assert_eq!(
            Principal::trusted(TrustFlag::OpenIdRecent).as_str(),
            "trusted:openid_recent"
        );
    }

    #[test]
    fn test_families() {
        assert_eq!(Principal::everyone().family(), PrincipalFamily::System);
        assert_eq!(Principal::authenticated().family(), PrincipalFamily::System);
        assert_eq!(Principal::from("role:user").family(), PrincipalFamily::Role);
        assert_eq!(Principal::from("user:7").family(), PrincipalFamily::User);
        assert_eq!(Principal::from("auth:insecure").family(), PrincipalFamily::Auth);
        assert_eq!(Principal::from("trusted:cert").family(), PrincipalFamily::Trusted);
        assert_eq!(
            Principal::from("trusted_for:auth").family(),
            PrincipalFamily::Derived
        );
    }

    #[test]
    fn test_only_roles_are_administrative() {
        assert!(Principal::from("role:admin").is_administrative());
        assert!(!Principal::from("trusted:cert").is_administrative());
        assert!(!Principal::from("auth:secure").is_administrative());
        assert!(!Principal::from("trusted_for:admin").is_administrative());
    }

    #[test]
    fn test_trust_flag_round_trip_through_principal() {
        for flag in [TrustFlag::Cert, TrustFlag::OpenId, TrustFlag::OpenIdRecent] {
            assert_eq!(Principal::trusted(flag).trust_flag(), Some(flag));
        }
        assert_eq!(Principal::from("trusted:bogus").trust_flag(), None);
    }

    #[test]
    fn test_trust_flag_serde_names() {
        let json = serde_json::to_string(&vec![TrustFlag::OpenId, TrustFlag::OpenIdRecent]).unwrap();
        assert_eq!(json, r#"["openid","openid_recent"]"#);
    }
}
