//! Per-request authentication
//!
//! Ties the pieces together for one request: load the session's trust
//! state, resolve it, store the result back, and derive the effective
//! principal set. Nothing derived is cached between requests, so a
//! revoked certificate or identity stops working on the next request.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};
use trustgate_bridge::{
    check_openid_login, CertificateRepository, IdentityRepository, Resolver, UserRepository,
};
use trustgate_core::{
    CredentialError, EffectiveFlags, Identity, PrincipalSet, TrustConfig, TrustFlag, UserId,
};

use crate::core::EscalationPlanner;
use crate::error::{PlaneError, Result};
use crate::session::{SessionId, SessionStore};
use crate::stash::RequestStash;

/// Authentication outcome for one request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequestAuth {
    /// Who the request resolved to
    pub identity: Identity,
    /// Strength and trust flags from this resolution
    pub flags: EffectiveFlags,
    /// Effective principal set, base plus derived
    pub principals: PrincipalSet,
    /// Credential problems to show the user
    pub warnings: Vec<CredentialError>,
}

impl RequestAuth {
    /// The resolved user, if any
    pub fn user_id(&self) -> Option<&UserId> {
        self.identity.user_id()
    }

    /// True when nothing validated
    pub fn is_anonymous(&self) -> bool {
        self.identity.is_anonymous()
    }

    /// The federated login can be dropped without logging out entirely
    pub fn can_purge(&self) -> bool {
        self.flags.has(TrustFlag::OpenId)
    }
}

/// Authenticates requests against shared configuration and repositories
pub struct Authenticator {
    config: Arc<TrustConfig>,
    certificates: Arc<dyn CertificateRepository>,
    identities: Arc<dyn IdentityRepository>,
    users: Arc<dyn UserRepository>,
    sessions: Arc<dyn SessionStore>,
    stash: Option<Arc<dyn RequestStash>>,
}

impl Authenticator {
    /// Build from separate repositories
    pub fn new(
        config: Arc<TrustConfig>,
        certificates: Arc<dyn CertificateRepository>,
        identities: Arc<dyn IdentityRepository>,
        users: Arc<dyn UserRepository>,
        sessions: Arc<dyn SessionStore>,
    ) -> Self {
        Self {
            config,
            certificates,
            identities,
            users,
            sessions,
            stash: None,
        }
    }

    /// Drop the session's stashed requests on logout
    pub fn with_stash(mut self, stash: Arc<dyn RequestStash>) -> Self {
        self.stash = Some(stash);
        self
    }

    /// Build from one store that backs all three repositories
    pub fn from_directory<D>(
        config: Arc<TrustConfig>,
        directory: Arc<D>,
        sessions: Arc<dyn SessionStore>,
    ) -> Self
    where
        D: CertificateRepository + IdentityRepository + UserRepository + 'static,
    {
        Self::new(
            config,
            directory.clone(),
            directory.clone(),
            directory,
            sessions,
        )
    }

    /// Shared configuration
    pub fn config(&self) -> &TrustConfig {
        &self.config
    }

    /// Escalation planner using this authenticator's rule table
    pub fn planner<'a, E>(&'a self, engine: &'a E) -> EscalationPlanner<'a, E> {
        EscalationPlanner::new(engine, &self.config.rules)
    }

    /// Authenticate a request using the wall clock
    pub async fn authenticate(
        &self,
        session: &SessionId,
        cert_serial: Option<&str>,
    ) -> Result<RequestAuth> {
        self.authenticate_at(session, cert_serial, Utc::now()).await
    }

    /// Authenticate a request as of `now`
    pub async fn authenticate_at(
        &self,
        session: &SessionId,
        cert_serial: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<RequestAuth> {
        let state = self.sessions.load(session).await?;

        let resolution = Resolver::new(
            &self.config,
            self.certificates.as_ref(),
            self.identities.as_ref(),
            self.users.as_ref(),
        )
        .resolve_at(state, cert_serial, now)?;

        self.sessions.store(session, &resolution.state).await?;

        let principals = resolution.principals(&self.config.rules);
        debug!(
            session = %session,
            user_id = ?resolution.identity.user_id(),
            principals = principals.len(),
            "Request authenticated"
        );

        Ok(RequestAuth {
            identity: resolution.identity,
            flags: resolution.flags,
            principals,
            warnings: resolution.warnings,
        })
    }

    /// Record a completed federated login; effective from the next request
    pub async fn login_openid(&self, session: &SessionId, user_id: &UserId, url: &str) -> Result<()> {
        self.login_openid_at(session, user_id, url, Utc::now()).await
    }

    /// Record a federated login that completed at `now`
    pub async fn login_openid_at(
        &self,
        session: &SessionId,
        user_id: &UserId,
        url: &str,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let user = self
            .users
            .find_user(user_id)?
            .ok_or_else(|| PlaneError::UnknownUser(user_id.clone()))?;
        check_openid_login(&user, url)?;

        let url_owned = url.to_string();
        self.sessions
            .update(
                session,
                Box::new(move |mut state| {
                    state.set_openid(url_owned, now);
                    state
                }),
            )
            .await?;

        info!(session = %session, user_id = %user_id, url = %url, "Federated login recorded");
        Ok(())
    }

    /// Log the session out completely
    pub async fn logout(&self, session: &SessionId) -> Result<()> {
        self.sessions.clear(session).await?;
        let stashes = match &self.stash {
            Some(stash) => stash.clear(session)?,
            None => 0,
        };
        info!(session = %session, stashes, "Session logged out");
        Ok(())
    }
}

impl std::fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authenticator")
            .field("config", &self.config)
            .field("sessions", &self.sessions)
            .field("stash", &self.stash.is_some())
            .finish_non_exhaustive()
    }
}
