//! Trustgate Plane
//!
//! The request-level half of trust-level authentication:
//! - Loads and stores each session's trust state
//! - Authenticates requests into an effective principal set
//! - Evaluates permissions through a pluggable permission engine
//! - Plans privilege escalation when a permission is denied
//!
//! ## Request Flow
//!
//! ```text
//! SessionStore::load -> Resolver -> SessionStore::store -> effective principals
//!                                                              |
//!                                      denied? -> EscalationPlanner -> redirect / advice
//! ```
//!
//! ## Consistency
//!
//! `authenticate` loads and stores the trust state separately, so two
//! concurrent requests for one session resolve independently and the last
//! writer wins. Login goes through [`SessionStore::update`], which is
//! atomic per session.

pub mod authenticator;
pub mod core;
pub mod error;
pub mod session;
pub mod stash;

pub use authenticator::{Authenticator, RequestAuth};
pub use crate::core::{
    upgrade_steps, Acl, AclAction, AclEngine, AclEntry, EngineError, EscalationError,
    EscalationOutcome, EscalationPlanner, PermissionEngine, Upgrade, UpgradeRedirect, UpgradeStep,
    ALL_PERMISSIONS,
};
pub use error::{PlaneError, Result};
pub use session::{MemorySessionStore, SessionError, SessionId, SessionStore, StateUpdate};
pub use stash::{MemoryStash, RequestStash, ReturnKey, Stash, StashError, StashedRequest};
