//! In-memory credential directory
//!
//! A single store backing all three repository traits, so certificate and
//! identity lookups always report the owner's current policy. Suitable for
//! development and tests. Data is lost on restart.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::info;
use trustgate_core::{CertAuthPolicy, UserId};

use crate::error::RepositoryError;
use crate::repository::{
    Certificate, CertificateRepository, IdentityRecord, IdentityRepository, User, UserRepository,
};
use crate::resolver::normalize_serial;

#[derive(Debug, Clone)]
struct StoredCertificate {
    user_id: UserId,
    expired: bool,
    revoked: bool,
}

/// In-memory users, certificates and identity URLs
#[derive(Debug, Default)]
pub struct MemoryDirectory {
    users: RwLock<HashMap<UserId, User>>,
    certificates: RwLock<HashMap<String, StoredCertificate>>,
    identities: RwLock<HashMap<String, UserId>>,
}

fn read<'a, T>(lock: &'a RwLock<T>, name: &str) -> Result<RwLockReadGuard<'a, T>, RepositoryError> {
    lock.read()
        .map_err(|_| RepositoryError::Poisoned(name.to_string()))
}

fn write<'a, T>(lock: &'a RwLock<T>, name: &str) -> Result<RwLockWriteGuard<'a, T>, RepositoryError> {
    lock.write()
        .map_err(|_| RepositoryError::Poisoned(name.to_string()))
}

impl MemoryDirectory {
    /// Create an empty directory
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a user, registering its identity URLs
    pub fn add_user(&self, user: User) -> Result<(), RepositoryError> {
        let mut identities = write(&self.identities, "identities")?;
        for url in &user.identity_urls {
            identities.insert(url.clone(), user.id.clone());
        }
        drop(identities);

        let mut users = write(&self.users, "users")?;
        info!(user_id = %user.id, name = %user.name, "Registering user");
        users.insert(user.id.clone(), user);
        Ok(())
    }

    /// Issue a certificate to an existing user
    pub fn add_certificate(&self, serial: &str, user_id: &UserId) -> Result<(), RepositoryError> {
        let serial = normalize_serial(serial);

        let mut users = write(&self.users, "users")?;
        if let Some(user) = users.get_mut(user_id) {
            user.certificate_count += 1;
        }
        drop(users);

        let mut certificates = write(&self.certificates, "certificates")?;
        info!(user_id = %user_id, serial = %serial, "Registering certificate");
        certificates.insert(
            serial,
            StoredCertificate {
                user_id: user_id.clone(),
                expired: false,
                revoked: false,
            },
        );
        Ok(())
    }

    /// Register an identity URL for an existing user
    pub fn add_identity_url(&self, url: &str, user_id: &UserId) -> Result<(), RepositoryError> {
        let mut users = write(&self.users, "users")?;
        if let Some(user) = users.get_mut(user_id) {
            if !user.owns_identity_url(url) {
                user.identity_urls.push(url.to_string());
            }
        }
        drop(users);

        let mut identities = write(&self.identities, "identities")?;
        identities.insert(url.to_string(), user_id.clone());
        Ok(())
    }

    /// Remove a user. Their certificates and identity URLs stay behind as
    /// orphans, which lookups then treat as unknown.
    pub fn remove_user(&self, user_id: &UserId) -> Result<bool, RepositoryError> {
        let mut users = write(&self.users, "users")?;
        let removed = users.remove(user_id).is_some();
        if removed {
            info!(user_id = %user_id, "Removed user");
        }
        Ok(removed)
    }

    /// Change a user's certificate policy
    pub fn set_cert_policy(
        &self,
        user_id: &UserId,
        policy: CertAuthPolicy,
    ) -> Result<bool, RepositoryError> {
        let mut users = write(&self.users, "users")?;
        match users.get_mut(user_id) {
            Some(user) => {
                info!(user_id = %user_id, policy = ?policy, "Certificate policy changed");
                user.cert_auth = policy;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Revoke a certificate
    pub fn revoke_certificate(&self, serial: &str) -> Result<bool, RepositoryError> {
        self.update_certificate(serial, |cert| cert.revoked = true)
    }

    /// Mark a certificate as expired
    pub fn expire_certificate(&self, serial: &str) -> Result<bool, RepositoryError> {
        self.update_certificate(serial, |cert| cert.expired = true)
    }

    fn update_certificate<F>(&self, serial: &str, f: F) -> Result<bool, RepositoryError>
    where
        F: FnOnce(&mut StoredCertificate),
    {
        let serial = normalize_serial(serial);
        let mut certificates = write(&self.certificates, "certificates")?;
        match certificates.get_mut(&serial) {
            Some(cert) => {
                f(cert);
                info!(serial = %serial, expired = cert.expired, revoked = cert.revoked, "Certificate updated");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn owner_policy(&self, user_id: &UserId) -> Result<CertAuthPolicy, RepositoryError> {
        let users = read(&self.users, "users")?;
        Ok(users
            .get(user_id)
            .map(|u| u.cert_auth)
            .unwrap_or_default())
    }
}

impl CertificateRepository for MemoryDirectory {
    fn find_by_serial(&self, serial: &str) -> Result<Option<Certificate>, RepositoryError> {
        let stored = {
            let certificates = read(&self.certificates, "certificates")?;
            certificates.get(serial).cloned()
        };

        let Some(stored) = stored else {
            return Ok(None);
        };

        Ok(Some(Certificate {
            serial: serial.to_string(),
            owner_cert_policy: self.owner_policy(&stored.user_id)?,
            user_id: stored.user_id,
            expired: stored.expired,
            revoked: stored.revoked,
        }))
    }
}

impl IdentityRepository for MemoryDirectory {
    fn find_by_url(&self, url: &str) -> Result<Option<IdentityRecord>, RepositoryError> {
        let user_id = {
            let identities = read(&self.identities, "identities")?;
            identities.get(url).cloned()
        };

        let Some(user_id) = user_id else {
            return Ok(None);
        };

        Ok(Some(IdentityRecord {
            url: url.to_string(),
            owner_cert_policy: self.owner_policy(&user_id)?,
            user_id,
        }))
    }
}

impl UserRepository for MemoryDirectory {
    fn find_user(&self, id: &UserId) -> Result<Option<User>, RepositoryError> {
        let users = read(&self.users, "users")?;
        Ok(users.get(id).cloned())
    }
}
