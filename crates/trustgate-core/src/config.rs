//! Static configuration
//!
//! Loaded once at process start and shared immutably (behind an `Arc`)
//! for the rest of the process lifetime.
//!
//! ## Environment
//!
//! - `TRUSTGATE_CONFIDENCE_EXPIRY_SECS` - seconds a federated login counts
//!   as recent (default 600)
//! - `TRUSTGATE_CLIENT_CERT_AUTH` - `true`/`false`, whether the transport's
//!   certificate serial is honoured (default `true`)
//! - `TRUSTGATE_TRUST_RULES` - path to a JSON trust rule table (default:
//!   the built-in table)

use chrono::Duration;
use serde::Deserialize;
use std::env;
use tracing::info;

use crate::error::{ConfigError, Result};
use crate::rules::TrustRuleTable;

/// Default window during which a federated login counts as recent
pub const DEFAULT_CONFIDENCE_EXPIRY_SECS: i64 = 600;

const ENV_CONFIDENCE_EXPIRY: &str = "TRUSTGATE_CONFIDENCE_EXPIRY_SECS";
const ENV_CLIENT_CERT_AUTH: &str = "TRUSTGATE_CLIENT_CERT_AUTH";
const ENV_TRUST_RULES: &str = "TRUSTGATE_TRUST_RULES";

/// Trust engine configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustConfig {
    /// How long after a federated login `trusted:openid_recent` is granted
    pub confidence_expiry: Duration,

    /// Whether client certificate serials from the transport are honoured
    pub client_cert_auth: bool,

    /// Trust derivation rules
    pub rules: TrustRuleTable,
}

impl Default for TrustConfig {
    fn default() -> Self {
        Self {
            confidence_expiry: Duration::seconds(DEFAULT_CONFIDENCE_EXPIRY_SECS),
            client_cert_auth: true,
            rules: TrustRuleTable::standard(),
        }
    }
}

/// Serialized form of [`TrustConfig`]
#[derive(Debug, Deserialize)]
struct RawConfig {
    #[serde(default = "default_expiry_secs")]
    confidence_expiry_secs: i64,
    #[serde(default = "default_true")]
    client_cert_auth: bool,
    #[serde(default)]
    rules: Option<TrustRuleTable>,
}

fn default_expiry_secs() -> i64 {
    DEFAULT_CONFIDENCE_EXPIRY_SECS
}

fn default_true() -> bool {
    true
}

impl TrustConfig {
    /// Set the confidence window
    pub fn with_confidence_expiry(mut self, expiry: Duration) -> Self {
        self.confidence_expiry = expiry;
        self
    }

    /// Enable or disable certificate authentication
    pub fn with_client_cert_auth(mut self, enabled: bool) -> Self {
        self.client_cert_auth = enabled;
        self
    }

    /// Replace the trust rule table
    pub fn with_rules(mut self, rules: TrustRuleTable) -> Self {
        self.rules = rules;
        self
    }

    /// Parse a JSON config document.
    ///
    /// ```json
    /// {"confidence_expiry_secs": 300, "client_cert_auth": true, "rules": [...]}
    /// ```
    pub fn from_json(json: &str) -> Result<Self> {
        let raw: RawConfig = serde_json::from_str(json)?;
        if raw.confidence_expiry_secs < 0 {
            return Err(ConfigError::InvalidValue {
                name: "confidence_expiry_secs".into(),
                value: raw.confidence_expiry_secs.to_string(),
            });
        }
        Ok(Self {
            confidence_expiry: Duration::seconds(raw.confidence_expiry_secs),
            client_cert_auth: raw.client_cert_auth,
            rules: raw.rules.unwrap_or_default(),
        })
    }

    /// Load from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load using an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(value) = lookup(ENV_CONFIDENCE_EXPIRY) {
            let secs = value
                .trim()
                .parse::<i64>()
                .ok()
                .filter(|s| *s >= 0)
                .ok_or_else(|| ConfigError::InvalidValue {
                    name: ENV_CONFIDENCE_EXPIRY.into(),
                    value: value.clone(),
                })?;
            config.confidence_expiry = Duration::seconds(secs);
        }

        if let Some(value) = lookup(ENV_CLIENT_CERT_AUTH) {
            config.client_cert_auth = match value.trim().to_lowercase().as_str() {
                "true" | "1" | "yes" => true,
                "false" | "0" | "no" => false,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        name: ENV_CLIENT_CERT_AUTH.into(),
                        value,
                    })
                }
            };
        }

        if let Some(path) = lookup(ENV_TRUST_RULES) {
            let json = std::fs::read_to_string(&path)?;
            config.rules = TrustRuleTable::from_json(&json)?;
        }

        info!(
            version = crate::VERSION,
            confidence_expiry_secs = config.confidence_expiry.num_seconds(),
            client_cert_auth = config.client_cert_auth,
            rule_count = config.rules.len(),
            "Trust configuration loaded"
        );

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = TrustConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.confidence_expiry, Duration::seconds(600));
        assert!(config.client_cert_auth);
        assert_eq!(config.rules, TrustRuleTable::standard());
    }

    #[test]
    fn test_env_overrides() {
        let config = TrustConfig::from_lookup(lookup(&[
            (ENV_CONFIDENCE_EXPIRY, "120"),
            (ENV_CLIENT_CERT_AUTH, "False"),
        ]))
        .unwrap();
        assert_eq!(config.confidence_expiry, Duration::seconds(120));
        assert!(!config.client_cert_auth);
    }

    #[test]
    fn test_bad_env_values() {
        assert!(TrustConfig::from_lookup(lookup(&[(ENV_CONFIDENCE_EXPIRY, "soon")])).is_err());
        assert!(TrustConfig::from_lookup(lookup(&[(ENV_CONFIDENCE_EXPIRY, "-5")])).is_err());
        assert!(TrustConfig::from_lookup(lookup(&[(ENV_CLIENT_CERT_AUTH, "maybe")])).is_err());
    }

    #[test]
    fn test_missing_rules_file() {
        let result = TrustConfig::from_lookup(lookup(&[(ENV_TRUST_RULES, "/nonexistent/rules.json")]));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_from_json() {
        let config = TrustConfig::from_json(
            r#"{
                "confidence_expiry_secs": 30,
                "rules": [{"derived": "trusted_for:x", "alternatives": [["trusted:cert"]]}]
            }"#,
        )
        .unwrap();
        assert_eq!(config.confidence_expiry, Duration::seconds(30));
        assert!(config.client_cert_auth);
        assert_eq!(config.rules.len(), 1);
    }

    #[test]
    fn test_from_json_defaults_rules() {
        let config = TrustConfig::from_json("{}").unwrap();
        assert_eq!(config, TrustConfig::default());
    }
}
