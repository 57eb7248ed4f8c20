//! Session persistence for trust state
//!
//! This module provides a trait-based abstraction over the session store
//! that holds each session's [`TrustState`], with an in-memory backend.
//!
//! The store must make `update` atomic per session key. Separate `load`
//! and `store` calls give last-writer-wins semantics across concurrent
//! requests for one session, which is the documented consistency level.

pub mod memory;

pub use memory::MemorySessionStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Debug};
use trustgate_core::TrustState;
use uuid::Uuid;

/// Error type for session operations
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Invalid session id: {0}")]
    InvalidId(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Session lock poisoned")]
    Poisoned,

    #[error("Backend error: {0}")]
    Backend(String),
}

impl From<serde_json::Error> for SessionError {
    fn from(err: serde_json::Error) -> Self {
        SessionError::Serialization(err.to_string())
    }
}

/// Opaque session identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Generate a fresh random session id
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse a session id handed back by the transport
    pub fn parse(value: &str) -> Result<Self, SessionError> {
        Uuid::parse_str(value)
            .map(Self)
            .map_err(|_| SessionError::InvalidId(value.to_string()))
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A read-modify-write step applied under the store's per-session lock
pub type StateUpdate = Box<dyn FnOnce(TrustState) -> TrustState + Send>;

/// Storage backend for per-session trust state
///
/// Implementations must be thread-safe and support concurrent access.
#[async_trait]
pub trait SessionStore: Send + Sync + Debug {
    /// Load the session's trust state; unknown sessions load as empty
    async fn load(&self, session: &SessionId) -> Result<TrustState, SessionError>;

    /// Replace the session's trust state
    async fn store(&self, session: &SessionId, state: &TrustState) -> Result<(), SessionError>;

    /// Drop the session's trust state, returning whether any was stored
    async fn clear(&self, session: &SessionId) -> Result<bool, SessionError>;

    /// Atomically load, transform and store the session's trust state
    async fn update(
        &self,
        session: &SessionId,
        update: StateUpdate,
    ) -> Result<TrustState, SessionError>;
}
