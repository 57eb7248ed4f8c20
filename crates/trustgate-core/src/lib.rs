//! # Trustgate Core
//!
//! Core types for trust-level authentication: who a request belongs to,
//! which authentication mechanisms currently vouch for it, and which
//! principals that combination grants.
//!
//! ## Key Concepts
//!
//! - **Principal**: an opaque tag a request holds (`role:admin`, `trusted:cert`)
//! - **Trust flag**: marker for a mechanism that validated this request
//! - **Trust state**: durable per-session record of authentication facts
//! - **Trust rule**: grants a derived principal when one of its prerequisite
//!   sets is fully held
//!
//! ## Data Flow
//!
//! ```text
//! TrustState + credentials --resolve--> (Identity, EffectiveFlags)
//!                                        |
//!                                        v
//!                     base principals --derive (single pass)--> effective set
//! ```
//!
//! Resolution lives in `trustgate-bridge`; session handling and escalation
//! planning live in `trustgate-plane`.

pub mod config;
pub mod error;
pub mod principal;
pub mod rules;
pub mod state;
pub mod types;

pub use config::{TrustConfig, DEFAULT_CONFIDENCE_EXPIRY_SECS};
pub use error::{ConfigError, CredentialError, Mechanism, Result};
pub use principal::{principal_set, AuthStrength, Principal, PrincipalFamily, PrincipalSet, TrustFlag};
pub use rules::{base_principals, effective_principals, TrustRule, TrustRuleTable};
pub use state::TrustState;
pub use types::{CertAuthPolicy, EffectiveFlags, Identity, UserId};

/// Library version, reported when configuration loads
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
