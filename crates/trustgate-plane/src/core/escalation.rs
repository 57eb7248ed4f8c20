//! Escalation planning
//!
//! When a request is denied, work out which principals the user could
//! acquire *by themselves* to be granted the permission, and whether any of
//! that can be automated.
//!
//! ## Outstanding principals
//!
//! For every principal the permission engine would accept:
//!
//! - a derived principal expands to each of its rule's prerequisite sets,
//!   minus what the request already holds
//! - any other principal is itself the requirement
//!
//! Differences that are empty, or that would need `auth:insecure`, are
//! dropped. Weakening the account's policy is not an upgrade.
//!
//! Roles are granted administratively, so an option containing a `role:`
//! principal is never self-service.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};
use trustgate_core::{
    AuthStrength, Principal, PrincipalFamily, PrincipalSet, TrustFlag, TrustRuleTable,
};

use super::acl::{EngineError, PermissionEngine};
use crate::session::SessionId;
use crate::stash::{RequestStash, ReturnKey, StashError, StashedRequest};

/// Errors raised while planning an escalation
#[derive(Error, Debug)]
pub enum EscalationError {
    /// The permission engine failed
    #[error("Permission engine error: {0}")]
    Engine(#[from] EngineError),

    /// The current request could not be stashed
    #[error("Stash error: {0}")]
    Stash(#[from] StashError),
}

/// One concrete thing a user can do to gain a principal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "step", content = "detail", rename_all = "snake_case")]
pub enum UpgradeStep {
    /// Switch the account to a certificate-required policy
    ConfigureCertificateAuth,
    /// Present a client certificate
    PresentCertificate,
    /// Log in with a federated identity
    AuthenticateOpenId,
    /// Log in again with the federated identity already on record
    ReauthenticateOpenId,
    /// Needs a role only an administrator can grant
    AdministrativeGrant(String),
    /// No known way to acquire this principal
    Unknown(Principal),
}

impl UpgradeStep {
    /// Whether the user can take this step without an administrator
    pub fn is_self_service(&self) -> bool {
        !matches!(self, UpgradeStep::AdministrativeGrant(_) | UpgradeStep::Unknown(_))
    }
}

/// Map an outstanding option to the steps that would satisfy it
pub fn upgrade_steps(option: &PrincipalSet, held: &PrincipalSet) -> Vec<UpgradeStep> {
    let has_openid = held.contains(&Principal::trusted(TrustFlag::OpenId));

    option
        .iter()
        .map(|principal| {
            if principal == &Principal::auth(AuthStrength::Secure) {
                return UpgradeStep::ConfigureCertificateAuth;
            }
            if let Some(role) = principal.role_name() {
                return UpgradeStep::AdministrativeGrant(role.to_string());
            }
            match principal.trust_flag() {
                Some(TrustFlag::Cert) => UpgradeStep::PresentCertificate,
                Some(TrustFlag::OpenId) => UpgradeStep::AuthenticateOpenId,
                Some(TrustFlag::OpenIdRecent) if has_openid => UpgradeStep::ReauthenticateOpenId,
                Some(TrustFlag::OpenIdRecent) => UpgradeStep::AuthenticateOpenId,
                None => UpgradeStep::Unknown(principal.clone()),
            }
        })
        .collect()
}

/// An option the caller may present to the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Upgrade {
    /// Principals that would together grant the permission
    pub option: PrincipalSet,
    /// How to acquire each of them
    pub steps: Vec<UpgradeStep>,
}

impl Upgrade {
    /// True when every step is self-service
    pub fn is_self_service(&self) -> bool {
        self.steps.iter().all(UpgradeStep::is_self_service)
    }
}

/// Redirect into a federated re-authentication
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpgradeRedirect {
    /// The missing principal the login will grant
    pub principal: Principal,
    /// Resumes the stashed request after login
    pub return_key: ReturnKey,
    /// The user already has a federated login on record
    pub reauthenticate: bool,
}

/// What `attempt_privilege_escalation` decided
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum EscalationOutcome {
    /// Nothing to do
    AlreadyPermitted,
    /// No self-service option exists
    Unreachable,
    /// The request was stashed; send the user to log in
    Redirect(UpgradeRedirect),
    /// Options for the user to choose from; empty when denied with nothing
    /// outstanding
    Advisory { upgrades: Vec<Upgrade> },
}

/// Plans escalations against one permission engine and rule table
pub struct EscalationPlanner<'a, E> {
    engine: &'a E,
    rules: &'a TrustRuleTable,
}

impl<'a, E> EscalationPlanner<'a, E> {
    /// Plan against `engine`, expanding derived principals through `rules`
    pub fn new(engine: &'a E, rules: &'a TrustRuleTable) -> Self {
        Self { engine, rules }
    }

    /// Principal sets any one of which would grant `permission`.
    ///
    /// Empty if the permission is already held.
    pub fn outstanding_principals<C: ?Sized>(
        &self,
        permission: &str,
        context: &C,
        held: &PrincipalSet,
    ) -> Result<Vec<PrincipalSet>, EscalationError>
    where
        E: PermissionEngine<C>,
    {
        if self.engine.is_permitted(held, permission, context)? {
            return Ok(Vec::new());
        }

        let insecure = Principal::auth(AuthStrength::Insecure);
        let mut outstanding = Vec::new();

        for principal in self.engine.principals_accepted_for(permission, context)? {
            match self.rules.rule_for(&principal) {
                Some(rule) => {
                    for prerequisites in &rule.alternatives {
                        let diff: PrincipalSet = prerequisites
                            .iter()
                            .filter(|p| !held.contains(*p))
                            .cloned()
                            .collect();
                        if !diff.is_empty() && !diff.contains(&insecure) {
                            outstanding.push(diff);
                        }
                    }
                }
                None => outstanding.push(PrincipalSet::from([principal])),
            }
        }

        debug!(
            permission = %permission,
            options = outstanding.len(),
            "Outstanding principals computed"
        );
        Ok(outstanding)
    }

    /// Whether the request could hold `permission` without an administrator.
    ///
    /// True when nothing is outstanding, or when any outstanding option is
    /// self-service.
    pub fn could_have_permission<C: ?Sized>(
        &self,
        permission: &str,
        context: &C,
        held: &PrincipalSet,
    ) -> Result<bool, EscalationError>
    where
        E: PermissionEngine<C>,
    {
        let outstanding = self.outstanding_principals(permission, context, held)?;
        Ok(outstanding.is_empty() || outstanding.iter().any(is_self_service))
    }

    /// Every outstanding option with its upgrade steps
    pub fn upgrades<C: ?Sized>(
        &self,
        permission: &str,
        context: &C,
        held: &PrincipalSet,
    ) -> Result<Vec<Upgrade>, EscalationError>
    where
        E: PermissionEngine<C>,
    {
        Ok(self
            .outstanding_principals(permission, context, held)?
            .into_iter()
            .map(|option| Upgrade {
                steps: upgrade_steps(&option, held),
                option,
            })
            .collect())
    }

    /// Automate the escalation if a single federated login would do.
    ///
    /// On a redirect the pending request has been stashed under `session`
    /// and the returned key resumes it.
    pub fn attempt_privilege_escalation<C: ?Sized>(
        &self,
        permission: &str,
        context: &C,
        held: &PrincipalSet,
        stash: &dyn RequestStash,
        session: &SessionId,
        pending: StashedRequest,
    ) -> Result<EscalationOutcome, EscalationError>
    where
        E: PermissionEngine<C>,
    {
        if self.engine.is_permitted(held, permission, context)? {
            return Ok(EscalationOutcome::AlreadyPermitted);
        }

        let outstanding = self.outstanding_principals(permission, context, held)?;
        if outstanding.is_empty() {
            debug!(permission = %permission, "Denied with nothing outstanding");
            return Ok(EscalationOutcome::Advisory {
                upgrades: Vec::new(),
            });
        }
        if !outstanding.iter().any(is_self_service) {
            debug!(permission = %permission, "Permission unreachable by escalation");
            return Ok(EscalationOutcome::Unreachable);
        }

        let login = outstanding
            .iter()
            .filter(|option| option.len() == 1)
            .flat_map(|option| option.iter())
            .find(|principal| principal.trust_flag().is_some_and(|f| f.is_openid()));

        if let Some(principal) = login {
            let path = pending.path.clone();
            let deferred = StashedRequest {
                immediate: false,
                ..pending
            };
            let return_key = stash
                .stash(session, deferred)?
                .ok_or(StashError::MissingReturnKey(path))?;
            let reauthenticate = held.contains(&Principal::trusted(TrustFlag::OpenId));

            info!(
                session = %session,
                permission = %permission,
                principal = %principal,
                reauthenticate,
                "Redirecting to federated login for escalation"
            );
            return Ok(EscalationOutcome::Redirect(UpgradeRedirect {
                principal: principal.clone(),
                return_key,
                reauthenticate,
            }));
        }

        let upgrades = outstanding
            .into_iter()
            .map(|option| Upgrade {
                steps: upgrade_steps(&option, held),
                option,
            })
            .collect();
        Ok(EscalationOutcome::Advisory { upgrades })
    }
}

fn is_self_service(option: &PrincipalSet) -> bool {
    option
        .iter()
        .all(|p| p.family() != PrincipalFamily::Role)
}
