//! Identity resolution
//!
//! Reconciles the stored [`TrustState`] against live credential data on
//! every request. Checks run in a fixed order:
//!
//! 1. **Certificate**: the serial supplied by the transport, if any
//! 2. **Federated login**: the url/timestamp pair stored in the state
//!
//! The certificate is authoritative. A federated login naming a different
//! user than the certificate is evicted, never allowed to override it.
//! When neither mechanism validates, the state is wiped entirely.
//!
//! Every credential failure is non-fatal: the mechanism's contribution is
//! dropped from the state and the failure is returned as a warning. Only a
//! repository fault aborts the pass.

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};
use trustgate_core::{
    effective_principals, CredentialError, EffectiveFlags, Identity, Mechanism, PrincipalSet,
    TrustConfig, TrustFlag, TrustRuleTable, TrustState, UserId,
};

use crate::error::{ResolveError, Result};
use crate::repository::{CertificateRepository, IdentityRepository, User, UserRepository};

/// Canonical form of a certificate serial
pub fn normalize_serial(serial: &str) -> String {
    serial.trim().to_lowercase()
}

/// Outcome of one resolution pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// Updated trust state, to be stored back into the session
    pub state: TrustState,

    /// Who the request belongs to
    pub identity: Identity,

    /// Base security flag and validated mechanisms
    pub flags: EffectiveFlags,

    /// Credential failures encountered during the pass
    pub warnings: Vec<CredentialError>,
}

impl Resolution {
    /// The federated login validated, so it can be dropped without losing
    /// all authentication
    pub fn can_purge(&self) -> bool {
        self.flags.has(TrustFlag::OpenId)
    }

    /// True if any warning was an authentication conflict
    pub fn had_conflict(&self) -> bool {
        self.warnings.iter().any(CredentialError::is_conflict)
    }

    /// The effective principal set for this resolution
    pub fn principals(&self, rules: &TrustRuleTable) -> PrincipalSet {
        effective_principals(&self.identity, &self.flags, rules)
    }
}

/// Accumulated result of the checks run so far
#[derive(Default)]
struct Pass {
    user: Option<User>,
    trust: Vec<TrustFlag>,
    warnings: Vec<CredentialError>,
}

impl Pass {
    fn user_id(&self) -> Option<&UserId> {
        self.user.as_ref().map(|u| &u.id)
    }

    fn adopt(&mut self, user: User) {
        if self.user.is_none() {
            self.user = Some(user);
        }
    }

    fn reject(&mut self, err: CredentialError) {
        if let CredentialError::AuthConflict {
            mechanism,
            expected,
            actual,
        } = &err
        {
            warn!(
                mechanism = %mechanism,
                expected = %expected,
                actual = %actual,
                "SECURITY: Authentication sources disagree about the user"
            );
        } else {
            warn!(mechanism = %err.mechanism(), error = %err, "Credential rejected");
        }
        self.warnings.push(err);
    }
}

/// Resolves a trust state against the credential repositories
pub struct Resolver<'a> {
    config: &'a TrustConfig,
    certificates: &'a dyn CertificateRepository,
    identities: &'a dyn IdentityRepository,
    users: &'a dyn UserRepository,
}

impl<'a> Resolver<'a> {
    /// Create a resolver over the given repositories
    pub fn new(
        config: &'a TrustConfig,
        certificates: &'a dyn CertificateRepository,
        identities: &'a dyn IdentityRepository,
        users: &'a dyn UserRepository,
    ) -> Self {
        Self {
            config,
            certificates,
            identities,
            users,
        }
    }

    /// Resolve using the wall clock
    pub fn resolve(&self, state: TrustState, cert_serial: Option<&str>) -> Result<Resolution> {
        self.resolve_at(state, cert_serial, Utc::now())
    }

    /// Resolve as of `now`
    pub fn resolve_at(
        &self,
        mut state: TrustState,
        cert_serial: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Resolution> {
        let mut pass = Pass::default();

        // Certificate check. The stored serial is always dropped first; it
        // is only written back if the presented certificate validates.
        let previous_serial = state.clear_cert();
        let serial = cert_serial
            .filter(|_| self.config.client_cert_auth)
            .map(normalize_serial)
            .filter(|s| !s.is_empty());

        if let Some(serial) = serial {
            match self.check_certificate(&serial, previous_serial.as_deref(), &pass) {
                Ok(user) => {
                    info!(user_id = %user.id, serial = %serial, "Client certificate validated");
                    state.set_cert_serial(serial);
                    pass.trust.push(TrustFlag::Cert);
                    pass.adopt(user);
                }
                Err(ResolveError::Credential(err)) => pass.reject(err),
                Err(err) => return Err(err),
            }
        }

        // Federated check. Popping the pair is itself the fallback clear.
        if let Some((url, timestamp)) = state.take_openid() {
            match self.check_openid(&url, &pass) {
                Ok(user) => {
                    let age = now - timestamp;
                    if age < Duration::zero() {
                        warn!(user_id = %user.id, url = %url, timestamp = %timestamp, "Federated login timestamp is in the future");
                    }
                    let recent = age >= Duration::zero() && age <= self.config.confidence_expiry;
                    info!(user_id = %user.id, url = %url, recent, "Federated login validated");
                    state.set_openid(url, timestamp);
                    pass.trust.push(TrustFlag::OpenId);
                    if recent {
                        pass.trust.push(TrustFlag::OpenIdRecent);
                    }
                    pass.adopt(user);
                }
                Err(ResolveError::Credential(err)) => pass.reject(err),
                Err(err) => return Err(err),
            }
        }

        if pass.trust.is_empty() {
            state.clear();
        }

        let (identity, flags) = match pass.user {
            Some(user) if !pass.trust.is_empty() => (
                Identity::Resolved {
                    user_id: user.id,
                    roles: user.roles,
                },
                EffectiveFlags {
                    strength: user.cert_auth.strength(),
                    trust: pass.trust,
                },
            ),
            _ => (Identity::Anonymous, EffectiveFlags::anonymous()),
        };

        debug!(
            user_id = ?identity.user_id(),
            strength = %flags.strength,
            trust = ?flags.trust,
            warnings = pass.warnings.len(),
            "Resolution complete"
        );

        Ok(Resolution {
            state,
            identity,
            flags,
            warnings: pass.warnings,
        })
    }

    fn check_certificate(&self, serial: &str, previous: Option<&str>, pass: &Pass) -> Result<User> {
        let not_found = || CredentialError::CertNotFound {
            serial: serial.to_string(),
        };

        let cert = self.certificates.find_by_serial(serial)?.ok_or_else(not_found)?;

        if !cert.owner_cert_policy.allows_certificates() {
            return Err(CredentialError::CertAuthDisabled.into());
        }
        if cert.expired {
            return Err(CredentialError::CertExpired {
                serial: serial.to_string(),
            }
            .into());
        }
        if cert.revoked {
            return Err(CredentialError::CertRevoked {
                serial: serial.to_string(),
            }
            .into());
        }

        let user = self.users.find_user(&cert.user_id)?.ok_or_else(not_found)?;

        if let Some(resolved) = pass.user_id() {
            ensure_same_user(Mechanism::Certificate, resolved, &user.id)?;
        }

        // A different certificate than last time must still belong to the
        // session's user.
        if let Some(previous) = previous.filter(|p| *p != serial) {
            if let Some(prior) = self.certificates.find_by_serial(previous)? {
                ensure_same_user(Mechanism::Certificate, &prior.user_id, &user.id)?;
            }
        }

        Ok(user)
    }

    fn check_openid(&self, url: &str, pass: &Pass) -> Result<User> {
        let not_found = || CredentialError::OpenIdNotFound {
            url: url.to_string(),
        };

        let record = self.identities.find_by_url(url)?.ok_or_else(not_found)?;

        if !record.owner_cert_policy.allows_openid() {
            return Err(CredentialError::OpenIdAuthDisabled.into());
        }

        let user = self.users.find_user(&record.user_id)?.ok_or_else(not_found)?;

        if let Some(resolved) = pass.user_id() {
            ensure_same_user(Mechanism::OpenId, resolved, &user.id)?;
        }

        Ok(user)
    }
}

fn ensure_same_user(mechanism: Mechanism, expected: &UserId, actual: &UserId) -> Result<()> {
    if expected != actual {
        return Err(CredentialError::AuthConflict {
            mechanism,
            expected: expected.clone(),
            actual: actual.clone(),
        }
        .into());
    }
    Ok(())
}
