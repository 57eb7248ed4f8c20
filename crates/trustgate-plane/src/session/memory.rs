//! In-memory session backend
//!
//! Keeps each session's trust state as the JSON blob a cookie or external
//! session store would hold. Data is lost on restart.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::debug;
use trustgate_core::TrustState;

use super::{SessionError, SessionId, SessionStore, StateUpdate};

/// In-memory session store implementation
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<SessionId, String>>,
}

impl MemorySessionStore {
    /// Create a new in-memory store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of sessions holding trust state
    pub fn len(&self) -> Result<usize, SessionError> {
        let sessions = self.sessions.read().map_err(|_| SessionError::Poisoned)?;
        Ok(sessions.len())
    }

    /// True when no session holds trust state
    pub fn is_empty(&self) -> Result<bool, SessionError> {
        Ok(self.len()? == 0)
    }

    fn write_blob(
        sessions: &mut HashMap<SessionId, String>,
        session: &SessionId,
        state: &TrustState,
    ) -> Result<(), SessionError> {
        if state.is_empty() {
            sessions.remove(session);
        } else {
            sessions.insert(*session, state.to_json()?);
        }
        Ok(())
    }
}

fn parse_blob(blob: Option<&String>) -> Result<TrustState, SessionError> {
    match blob {
        Some(json) => Ok(TrustState::from_json(json)?),
        None => Ok(TrustState::new()),
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self, session: &SessionId) -> Result<TrustState, SessionError> {
        let sessions = self.sessions.read().map_err(|_| SessionError::Poisoned)?;
        parse_blob(sessions.get(session))
    }

    async fn store(&self, session: &SessionId, state: &TrustState) -> Result<(), SessionError> {
        let mut sessions = self.sessions.write().map_err(|_| SessionError::Poisoned)?;
        debug!(session = %session, empty = state.is_empty(), "Storing trust state");
        Self::write_blob(&mut sessions, session, state)
    }

    async fn clear(&self, session: &SessionId) -> Result<bool, SessionError> {
        let mut sessions = self.sessions.write().map_err(|_| SessionError::Poisoned)?;
        let removed = sessions.remove(session).is_some();
        if removed {
            debug!(session = %session, "Cleared trust state");
        }
        Ok(removed)
    }

    async fn update(
        &self,
        session: &SessionId,
        update: StateUpdate,
    ) -> Result<TrustState, SessionError> {
        let mut sessions = self.sessions.write().map_err(|_| SessionError::Poisoned)?;
        let state = update(parse_blob(sessions.get(session))?);
        Self::write_blob(&mut sessions, session, &state)?;
        Ok(state)
    }
}
