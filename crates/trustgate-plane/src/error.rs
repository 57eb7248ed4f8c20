//! Error types for the request plane

use thiserror::Error;
use trustgate_bridge::{RepositoryError, ResolveError};
use trustgate_core::{CredentialError, UserId};

use crate::core::{EngineError, EscalationError};
use crate::session::SessionError;
use crate::stash::StashError;

/// Result type for plane operations
pub type Result<T> = std::result::Result<T, PlaneError>;

/// Errors raised while handling a request
#[derive(Error, Debug)]
pub enum PlaneError {
    /// The session store failed
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Resolution hit a repository fault
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    /// A direct repository lookup failed
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    /// A login was refused
    #[error(transparent)]
    Credential(#[from] CredentialError),

    /// The named account does not exist
    #[error("Unknown user: {0}")]
    UnknownUser(UserId),

    /// The permission engine failed
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// The request stash failed
    #[error(transparent)]
    Stash(#[from] StashError),

    /// Escalation planning failed
    #[error(transparent)]
    Escalation(#[from] EscalationError),
}
