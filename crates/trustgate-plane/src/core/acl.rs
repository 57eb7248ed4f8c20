//! Permission engine boundary and a reference ACL engine
//!
//! The trust engine consumes permission evaluation as a black box: "does
//! principal set P satisfy permission X in context C?" and "which
//! principals would be accepted for X in C?". [`AclEngine`] answers both
//! from an ordered access-control list and is what the tests and small
//! deployments use.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use trustgate_core::{Principal, PrincipalSet};

/// Permission that matches every permission
pub const ALL_PERMISSIONS: &str = "*";

/// Errors raised by a permission engine
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// The engine could not be reached
    #[error("Permission engine unavailable: {0}")]
    Unavailable(String),

    /// The context cannot be evaluated
    #[error("Malformed permission context: {0}")]
    MalformedContext(String),
}

/// Permission evaluation over contexts of type `C`
pub trait PermissionEngine<C: ?Sized>: Send + Sync {
    /// Whether `principals` hold `permission` in `context`
    fn is_permitted(
        &self,
        principals: &PrincipalSet,
        permission: &str,
        context: &C,
    ) -> Result<bool, EngineError>;

    /// Every principal that on its own would be granted `permission`
    fn principals_accepted_for(
        &self,
        permission: &str,
        context: &C,
    ) -> Result<PrincipalSet, EngineError>;
}

/// Whether an entry grants or refuses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AclAction {
    /// Grant the listed permissions
    Allow,
    /// Refuse the listed permissions
    Deny,
}

/// One access-control entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AclEntry {
    /// Grant or refuse
    pub action: AclAction,
    /// Principal the entry applies to
    pub principal: Principal,
    /// Permission names, or [`ALL_PERMISSIONS`]
    pub permissions: Vec<String>,
}

impl AclEntry {
    fn covers(&self, permission: &str) -> bool {
        self.permissions
            .iter()
            .any(|p| p == permission || p == ALL_PERMISSIONS)
    }
}

/// An ordered access-control list. The first matching entry decides.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Acl {
    entries: Vec<AclEntry>,
}

impl Acl {
    /// An empty list; denies everything
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an allow entry
    pub fn allow<I, S>(self, principal: impl Into<Principal>, permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.push(AclAction::Allow, principal.into(), permissions)
    }

    /// Append a deny entry
    pub fn deny<I, S>(self, principal: impl Into<Principal>, permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.push(AclAction::Deny, principal.into(), permissions)
    }

    fn push<I, S>(mut self, action: AclAction, principal: Principal, permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.entries.push(AclEntry {
            action,
            principal,
            permissions: permissions.into_iter().map(Into::into).collect(),
        });
        self
    }

    /// Entries in evaluation order
    pub fn entries(&self) -> &[AclEntry] {
        &self.entries
    }
}

/// Permission engine evaluating an [`Acl`] context
#[derive(Debug, Clone, Copy, Default)]
pub struct AclEngine;

impl AclEngine {
    /// Create the engine
    pub fn new() -> Self {
        Self
    }
}

impl PermissionEngine<Acl> for AclEngine {
    fn is_permitted(
        &self,
        principals: &PrincipalSet,
        permission: &str,
        acl: &Acl,
    ) -> Result<bool, EngineError> {
        let decision = acl
            .entries
            .iter()
            .find(|entry| entry.covers(permission) && principals.contains(&entry.principal));

        let permitted = matches!(decision, Some(entry) if entry.action == AclAction::Allow);
        debug!(
            permission = %permission,
            permitted,
            matched = ?decision.map(|e| &e.principal),
            "Permission evaluated"
        );
        Ok(permitted)
    }

    fn principals_accepted_for(
        &self,
        permission: &str,
        acl: &Acl,
    ) -> Result<PrincipalSet, EngineError> {
        let mut allowed = PrincipalSet::new();
        let mut denied = PrincipalSet::new();

        for entry in acl.entries.iter().filter(|e| e.covers(permission)) {
            match entry.action {
                AclAction::Allow => {
                    if !denied.contains(&entry.principal) {
                        allowed.insert(entry.principal.clone());
                    }
                }
                AclAction::Deny => {
                    // Nobody below a blanket deny can be reached
                    if entry.principal == Principal::everyone() {
                        break;
                    }
                    denied.insert(entry.principal.clone());
                }
            }
        }

        Ok(allowed)
    }
}
