//! Request stash
//!
//! Saves a request's path and form data in the session so it can be
//! replayed after a detour, typically a re-authentication redirect.
//!
//! A stash is retrieved when the current path equals the stash's path and
//! either:
//!
//! - the request carries the stash's return key, or
//! - the stash is `immediate` and no key was given.
//!
//! A deferred (non-immediate) stash gets an 80-bit random return key. Only
//! one stash exists per path within a session; a new one replaces the old.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::RwLock;
use thiserror::Error;
use tracing::{debug, warn};

use crate::session::SessionId;

/// Bytes of randomness in a return key
const RETURN_KEY_BYTES: usize = 10;

/// Errors raised by a request stash
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StashError {
    #[error("Stash lock poisoned")]
    Poisoned,

    #[error("Deferred stash for {0} produced no return key")]
    MissingReturnKey(String),

    #[error("Stash backend error: {0}")]
    Backend(String),
}

/// Token that resumes a deferred stash
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReturnKey(String);

impl ReturnKey {
    /// A fresh random key, URL-safe
    pub fn generate() -> Self {
        let mut bytes = [0u8; RETURN_KEY_BYTES];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(URL_SAFE_NO_PAD.encode(bytes))
    }

    /// Wrap a key received from a client
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Raw key text
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReturnKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A request to stash
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StashedRequest {
    /// Request path; unique per session
    pub path: String,

    /// Full URL to return to
    pub url: String,

    /// Retrievable without a key on the next visit to `path`
    #[serde(default)]
    pub immediate: bool,

    /// Submitted form fields
    #[serde(default)]
    pub post: BTreeMap<String, String>,
}

impl StashedRequest {
    /// A deferred stash for `path`
    pub fn new(path: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            url: url.into(),
            immediate: false,
            post: BTreeMap::new(),
        }
    }

    /// Mark as immediate
    pub fn immediate(mut self) -> Self {
        self.immediate = true;
        self
    }

    /// Add a form field
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.post.insert(name.into(), value.into());
        self
    }
}

/// A stored stash
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stash {
    /// Present for deferred stashes only
    pub key: Option<ReturnKey>,

    #[serde(flatten)]
    pub request: StashedRequest,
}

impl Stash {
    fn matches(&self, path: Option<&str>, key: Option<&ReturnKey>) -> bool {
        match (path, key) {
            (Some(path), None) => self.request.path == path && self.request.immediate,
            (Some(path), Some(key)) => self.request.path == path && self.key.as_ref() == Some(key),
            (None, Some(key)) => self.key.as_ref() == Some(key),
            (None, None) => false,
        }
    }
}

/// Per-session request stash
pub trait RequestStash: Send + Sync {
    /// Save a request, replacing any stash with the same path. Returns the
    /// return key for deferred stashes.
    fn stash(
        &self,
        session: &SessionId,
        request: StashedRequest,
    ) -> Result<Option<ReturnKey>, StashError>;

    /// Look up a stash without removing it
    fn fetch(
        &self,
        session: &SessionId,
        path: Option<&str>,
        key: Option<&ReturnKey>,
    ) -> Result<Option<Stash>, StashError>;

    /// Look up and remove a stash; a stash activates at most once
    fn take(
        &self,
        session: &SessionId,
        path: Option<&str>,
        key: Option<&ReturnKey>,
    ) -> Result<Option<Stash>, StashError>;

    /// Every return key held by the session
    fn keys(&self, session: &SessionId) -> Result<Vec<ReturnKey>, StashError>;

    /// Drop every stash held by the session, returning how many there were
    fn clear(&self, session: &SessionId) -> Result<usize, StashError>;

    /// Pick the first known key among the `return_key` values a request
    /// carried.
    fn key_from_request(
        &self,
        session: &SessionId,
        candidates: &[String],
    ) -> Result<Option<ReturnKey>, StashError> {
        if candidates.is_empty() {
            return Ok(None);
        }
        if candidates.len() > 1 {
            warn!(session = %session, count = candidates.len(), "More than one return key in request");
        }

        let known = self.keys(session)?;
        let key = candidates
            .iter()
            .map(|c| ReturnKey::new(c.as_str()))
            .find(|c| known.contains(c));

        if key.is_none() {
            warn!(session = %session, key = %candidates[0], "Unknown return key");
        }
        Ok(key)
    }
}

/// In-memory request stash
#[derive(Debug, Default)]
pub struct MemoryStash {
    stashes: RwLock<HashMap<SessionId, BTreeMap<String, Stash>>>,
}

impl MemoryStash {
    /// Create an empty stash
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of sessions holding at least one stash
    pub fn sessions(&self) -> Result<usize, StashError> {
        Ok(self.stashes.read().map_err(|_| StashError::Poisoned)?.len())
    }

    fn find(
        stashes: &BTreeMap<String, Stash>,
        path: Option<&str>,
        key: Option<&ReturnKey>,
    ) -> Option<String> {
        if let Some(path) = path {
            if stashes.get(path).is_some_and(|s| s.matches(Some(path), key)) {
                return Some(path.to_string());
            }
            return None;
        }
        stashes
            .values()
            .find(|s| s.matches(None, key))
            .map(|s| s.request.path.clone())
    }
}

impl RequestStash for MemoryStash {
    fn stash(
        &self,
        session: &SessionId,
        request: StashedRequest,
    ) -> Result<Option<ReturnKey>, StashError> {
        let key = (!request.immediate).then(ReturnKey::generate);
        let mut stashes = self.stashes.write().map_err(|_| StashError::Poisoned)?;

        debug!(session = %session, path = %request.path, immediate = request.immediate, "Stashing request");
        stashes.entry(*session).or_default().insert(
            request.path.clone(),
            Stash {
                key: key.clone(),
                request,
            },
        );
        Ok(key)
    }

    fn fetch(
        &self,
        session: &SessionId,
        path: Option<&str>,
        key: Option<&ReturnKey>,
    ) -> Result<Option<Stash>, StashError> {
        let stashes = self.stashes.read().map_err(|_| StashError::Poisoned)?;
        let Some(session_stashes) = stashes.get(session) else {
            return Ok(None);
        };
        Ok(Self::find(session_stashes, path, key).and_then(|p| session_stashes.get(&p).cloned()))
    }

    fn take(
        &self,
        session: &SessionId,
        path: Option<&str>,
        key: Option<&ReturnKey>,
    ) -> Result<Option<Stash>, StashError> {
        let mut stashes = self.stashes.write().map_err(|_| StashError::Poisoned)?;
        let Some(session_stashes) = stashes.get_mut(session) else {
            return Ok(None);
        };

        let taken = Self::find(session_stashes, path, key).and_then(|p| session_stashes.remove(&p));
        if let Some(stash) = &taken {
            debug!(session = %session, path = %stash.request.path, "Consumed stash");
        }
        if session_stashes.is_empty() {
            stashes.remove(session);
        }
        Ok(taken)
    }

    fn keys(&self, session: &SessionId) -> Result<Vec<ReturnKey>, StashError> {
        let stashes = self.stashes.read().map_err(|_| StashError::Poisoned)?;
        Ok(stashes
            .get(session)
            .map(|s| s.values().filter_map(|s| s.key.clone()).collect())
            .unwrap_or_default())
    }

    fn clear(&self, session: &SessionId) -> Result<usize, StashError> {
        let mut stashes = self.stashes.write().map_err(|_| StashError::Poisoned)?;
        let dropped = stashes.remove(session).map_or(0, |s| s.len());
        if dropped > 0 {
            debug!(session = %session, dropped, "Cleared session stashes");
        }
        Ok(dropped)
    }
}
