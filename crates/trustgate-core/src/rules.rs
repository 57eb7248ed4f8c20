//! Trust rules and principal derivation
//!
//! A trust rule grants a derived principal when *all* principals of at least
//! one of its prerequisite sets are held ("or of ands"):
//!
//! ```text
//! trusted_for:auth  <- {role:user, auth:insecure, trusted:openid_recent}
//!                    | {role:user, auth:insecure, trusted:cert}
//!                    | {role:user, auth:secure,   trusted:cert}
//! trusted_for:admin <- {role:admin, auth:secure, trusted:cert}
//! ```
//!
//! ## Single pass
//!
//! Derivation evaluates every rule exactly once, in table order, against the
//! *base* principal set. A principal derived by one rule never satisfies a
//! prerequisite of another rule, so multi-hop chains such as
//! `a <- {x}`, `b <- {a}` do not grant `b`. This keeps derivation a pure,
//! order-independent function of its input. Tables that need transitive
//! grants must spell out the full prerequisites on each rule.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

use crate::error::{ConfigError, Result};
use crate::principal::{Principal, PrincipalFamily, PrincipalSet};
use crate::types::{EffectiveFlags, Identity};

/// A derived principal and the alternative prerequisite sets that grant it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustRule {
    /// Principal granted by this rule
    pub derived: Principal,

    /// Ordered alternatives; the first fully satisfied one grants the rule
    pub alternatives: Vec<Vec<Principal>>,
}

impl TrustRule {
    /// Create a rule with no alternatives yet
    pub fn new(derived: impl Into<Principal>) -> Self {
        Self {
            derived: derived.into(),
            alternatives: Vec::new(),
        }
    }

    /// Add an alternative prerequisite set (builder pattern)
    pub fn or<I, S>(mut self, prerequisites: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Principal>,
    {
        self.alternatives
            .push(prerequisites.into_iter().map(Into::into).collect());
        self
    }

    /// Index of the first alternative fully contained in `held`
    pub fn satisfied_by(&self, held: &PrincipalSet) -> Option<usize> {
        self.alternatives
            .iter()
            .position(|prereqs| prereqs.iter().all(|p| held.contains(p)))
    }

    fn validate(&self) -> Result<()> {
        match self.derived.family() {
            PrincipalFamily::Role | PrincipalFamily::User | PrincipalFamily::System => {
                return Err(ConfigError::ForbiddenDerivation(self.derived.to_string()));
            }
            _ => {}
        }

        if self.alternatives.is_empty() {
            return Err(ConfigError::NoAlternatives(self.derived.to_string()));
        }

        if self.alternatives.iter().any(|prereqs| prereqs.is_empty()) {
            return Err(ConfigError::EmptyPrerequisites(self.derived.to_string()));
        }

        Ok(())
    }
}

/// Ordered, immutable table of trust rules
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<TrustRule>", into = "Vec<TrustRule>")]
pub struct TrustRuleTable {
    rules: Vec<TrustRule>,
}

impl TrustRuleTable {
    /// Build a validated table from rules in declaration order
    pub fn new(rules: Vec<TrustRule>) -> Result<Self> {
        let mut seen = HashSet::new();
        for rule in &rules {
            rule.validate()?;
            if !seen.insert(rule.derived.clone()) {
                return Err(ConfigError::DuplicateRule(rule.derived.to_string()));
            }
        }
        Ok(Self { rules })
    }

    /// A table with no rules; derivation adds nothing
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    /// The built-in table
    pub fn standard() -> Self {
        Self {
            rules: vec![
                TrustRule::new("trusted_for:auth")
                    .or(["role:user", "auth:insecure", "trusted:openid_recent"])
                    .or(["role:user", "auth:insecure", "trusted:cert"])
                    .or(["role:user", "auth:secure", "trusted:cert"]),
                TrustRule::new("trusted_for:admin")
                    .or(["role:admin", "auth:secure", "trusted:cert"]),
            ],
        }
    }

    /// Parse a table from a JSON array of rules
    pub fn from_json(json: &str) -> Result<Self> {
        let rules: Vec<TrustRule> = serde_json::from_str(json)?;
        Self::new(rules)
    }

    /// Rules in declaration order
    pub fn rules(&self) -> &[TrustRule] {
        &self.rules
    }

    /// The rule deriving `principal`, if it is a derived principal
    pub fn rule_for(&self, principal: &Principal) -> Option<&TrustRule> {
        self.rules.iter().find(|r| &r.derived == principal)
    }

    /// Number of rules
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// True when the table has no rules
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Add every principal derivable from `base` in a single pass.
    ///
    /// Prerequisites are only ever checked against `base`, never against
    /// principals derived earlier in the same pass.
    pub fn derive(&self, base: &PrincipalSet) -> PrincipalSet {
        let mut effective = base.clone();

        for rule in &self.rules {
            if let Some(index) = rule.satisfied_by(base) {
                debug!(
                    derived = %rule.derived,
                    alternative = index,
                    "Derived principal granted"
                );
                effective.insert(rule.derived.clone());
            }
        }

        effective
    }
}

impl Default for TrustRuleTable {
    fn default() -> Self {
        Self::standard()
    }
}

impl TryFrom<Vec<TrustRule>> for TrustRuleTable {
    type Error = ConfigError;

    fn try_from(rules: Vec<TrustRule>) -> Result<Self> {
        Self::new(rules)
    }
}

impl From<TrustRuleTable> for Vec<TrustRule> {
    fn from(table: TrustRuleTable) -> Self {
        table.rules
    }
}

/// Principals held by a request before derivation
pub fn base_principals(identity: &Identity, flags: &EffectiveFlags) -> PrincipalSet {
    let mut principals = PrincipalSet::new();
    principals.insert(Principal::everyone());

    let Identity::Resolved { user_id, roles } = identity else {
        return principals;
    };

    principals.insert(Principal::authenticated());
    principals.insert(Principal::user(user_id));
    principals.extend(roles.iter().map(Principal::role));
    principals.insert(Principal::auth(flags.strength));
    principals.extend(flags.trust.iter().copied().map(Principal::trusted));

    principals
}

/// The full effective principal set for a request.
///
/// Anonymous requests hold only `Everyone`; no rule is evaluated for them.
pub fn effective_principals(
    identity: &Identity,
    flags: &EffectiveFlags,
    rules: &TrustRuleTable,
) -> PrincipalSet {
    let base = base_principals(identity, flags);
    if identity.is_anonymous() {
        return base;
    }
    rules.derive(&base)
}
