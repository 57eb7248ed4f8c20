//! Federated login and logout
//!
//! Both only edit the trust state. Changes take effect on the next
//! resolution, typically after the caller redirects.

use chrono::{DateTime, Utc};
use tracing::{info, warn};
use trustgate_core::{CredentialError, TrustState};

use crate::repository::User;

/// Whether `user` may complete a federated login with `url`.
///
/// Refused when the account only accepts certificates, or when `url` is not
/// one of the account's registered identity URLs.
pub fn check_openid_login(user: &User, url: &str) -> Result<(), CredentialError> {
    if !user.cert_auth.allows_openid() {
        warn!(user_id = %user.id, "Federated login refused: account requires certificates");
        return Err(CredentialError::OpenIdAuthDisabled);
    }

    if !user.owns_identity_url(url) {
        warn!(user_id = %user.id, url = %url, "Federated login refused: unknown identity URL");
        return Err(CredentialError::OpenIdNotFound {
            url: url.to_string(),
        });
    }

    Ok(())
}

/// Record a completed federated login for `user`
pub fn login_openid(
    state: &mut TrustState,
    user: &User,
    url: &str,
    now: DateTime<Utc>,
) -> Result<(), CredentialError> {
    check_openid_login(user, url)?;

    info!(user_id = %user.id, url = %url, "Federated login recorded");
    state.set_openid(url, now);
    Ok(())
}

/// Log out completely
pub fn logout(state: &mut TrustState) {
    state.clear();
    info!("Trust state cleared");
}
