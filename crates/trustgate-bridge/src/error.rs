//! Error types for identity resolution

use thiserror::Error;
use trustgate_core::CredentialError;

/// Result type for resolution operations
pub type Result<T> = std::result::Result<T, ResolveError>;

/// Faults raised by a credential repository backend
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    /// The backend could not be reached
    #[error("Repository unavailable: {0}")]
    Unavailable(String),

    /// A stored record could not be read
    #[error("Corrupt record: {0}")]
    Corrupt(String),

    /// An in-process lock was poisoned by a panicking writer
    #[error("Repository lock poisoned: {0}")]
    Poisoned(String),
}

/// Errors surfaced by the resolver.
///
/// `Credential` never escapes [`Resolver::resolve`](crate::Resolver::resolve);
/// it is turned into a warning there. Other callers (for example
/// [`login_openid`](crate::login_openid)) may return it directly.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// A credential did not validate
    #[error(transparent)]
    Credential(#[from] CredentialError),

    /// A repository lookup failed
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
}

impl ResolveError {
    /// True for faults that should abort the request
    pub fn is_hard_failure(&self) -> bool {
        matches!(self, ResolveError::Repository(_))
    }
}
