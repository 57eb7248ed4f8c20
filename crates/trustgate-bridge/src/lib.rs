//! Trustgate Bridge
//!
//! The bridge reconciles the two authentication sources a session can carry
//! (a client certificate presented by the transport and a stored federated
//! login) into one resolved identity plus the trust flags that vouch for it.
//!
//! ## Architecture
//!
//! Credential data lives behind three repository traits, each a
//! synchronous, side-effect free lookup:
//!
//! - **Certificates**: by serial
//! - **Identities**: federated identity records by URL
//! - **Users**: account roles and certificate policy
//!
//! The [`Resolver`] runs the certificate check, then the federated check,
//! against a [`TrustState`](trustgate_core::TrustState) and returns a
//! [`Resolution`]. Credential failures are reported as warnings; only a
//! repository fault aborts resolution.
//!
//! ## Usage
//!
//! ```ignore
//! use trustgate_bridge::{MemoryDirectory, Resolver};
//! use trustgate_core::{TrustConfig, TrustState};
//!
//! let directory = MemoryDirectory::new();
//! let config = TrustConfig::default();
//! let resolver = Resolver::new(&config, &directory, &directory, &directory);
//!
//! let resolution = resolver.resolve(TrustState::new(), Some("0A1B"))?;
//! println!("Identity: {:?}", resolution.identity);
//! ```

pub mod error;
pub mod login;
pub mod memory;
pub mod repository;
pub mod resolver;

pub use error::{RepositoryError, ResolveError, Result};
pub use login::{check_openid_login, login_openid, logout};
pub use memory::MemoryDirectory;
pub use repository::{
    Certificate, CertificateRepository, IdentityRecord, IdentityRepository, User, UserRepository,
};
pub use resolver::{normalize_serial, Resolution, Resolver};
