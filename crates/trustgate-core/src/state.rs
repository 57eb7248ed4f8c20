//! Durable per-session trust state
//!
//! The trust state records which authentication facts are currently believed
//! valid for a session. Everything in it must describe the *same* user at
//! all times: a certificate serial and a federated login naming two
//! different users is never persisted. The resolver enforces this by
//! dropping the conflicting fact, and by wiping the whole state when nothing
//! validates.
//!
//! The state is a plain value threaded through resolution. Loading it from
//! and storing it back to the session is the caller's job.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Authentication facts stored in the session
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustState {
    /// Serial of the client certificate that last validated
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cert_serial: Option<String>,

    /// Identity URL of the last federated login
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub openid_url: Option<String>,

    /// When the federated login happened
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub openid_timestamp: Option<DateTime<Utc>>,
}

impl TrustState {
    /// An empty trust state
    pub fn new() -> Self {
        Self::default()
    }

    /// True when no authentication fact is stored
    pub fn is_empty(&self) -> bool {
        self.cert_serial.is_none() && self.openid_url.is_none() && self.openid_timestamp.is_none()
    }

    /// Forget every stored fact
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Record a validated certificate serial
    pub fn set_cert_serial(&mut self, serial: impl Into<String>) {
        self.cert_serial = Some(serial.into());
    }

    /// Forget the stored certificate serial, returning it
    pub fn clear_cert(&mut self) -> Option<String> {
        self.cert_serial.take()
    }

    /// Record a federated login
    pub fn set_openid(&mut self, url: impl Into<String>, timestamp: DateTime<Utc>) {
        self.openid_url = Some(url.into());
        self.openid_timestamp = Some(timestamp);
    }

    /// Remove both federated login fields.
    ///
    /// Returns the pair only if both were present; a half-written login is
    /// discarded either way.
    pub fn take_openid(&mut self) -> Option<(String, DateTime<Utc>)> {
        let url = self.openid_url.take();
        let timestamp = self.openid_timestamp.take();
        match (url, timestamp) {
            (Some(url), Some(timestamp)) if !url.is_empty() => Some((url, timestamp)),
            _ => None,
        }
    }

    /// Serialize to the JSON blob kept in the session
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parse the JSON blob kept in the session
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
