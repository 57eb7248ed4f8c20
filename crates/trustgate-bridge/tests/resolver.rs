//! Resolver scenarios across both authentication sources

use chrono::{DateTime, Duration, TimeZone, Utc};
use trustgate_bridge::{login_openid, logout, MemoryDirectory, Resolution, Resolver, User};
use trustgate_core::{
    CertAuthPolicy, CredentialError, Identity, Mechanism, Principal, TrustConfig, TrustFlag,
    TrustState, UserId,
};

const ALICE_URL: &str = "https://id.example/alice";
const BOB_URL: &str = "https://id.example/bob";

// =============================================================================
// Test Helpers
// =============================================================================

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("trustgate_bridge=debug")
        .with_test_writer()
        .try_init();
}

fn now() -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000, 0).unwrap()
}

fn alice() -> UserId {
    UserId::new("1")
}

fn bob() -> UserId {
    UserId::new("2")
}

/// alice: cert 0a1b, openid ALICE_URL; bob: cert 0b0b, openid BOB_URL
fn directory() -> MemoryDirectory {
    let directory = MemoryDirectory::new();
    directory
        .add_user(User::new("1", "alice").with_identity_url(ALICE_URL))
        .unwrap();
    directory
        .add_user(User::new("2", "bob").with_identity_url(BOB_URL))
        .unwrap();
    directory.add_certificate("0a1b", &alice()).unwrap();
    directory.add_certificate("0b0b", &bob()).unwrap();
    directory
}

fn resolve_with(
    config: &TrustConfig,
    directory: &MemoryDirectory,
    state: TrustState,
    serial: Option<&str>,
) -> Resolution {
    Resolver::new(config, directory, directory, directory)
        .resolve_at(state, serial, now())
        .unwrap()
}

fn resolve(directory: &MemoryDirectory, state: TrustState, serial: Option<&str>) -> Resolution {
    resolve_with(&TrustConfig::default(), directory, state, serial)
}

fn openid_state(url: &str, age_secs: i64) -> TrustState {
    let mut state = TrustState::new();
    state.set_openid(url, now() - Duration::seconds(age_secs));
    state
}

// =============================================================================
// Both mechanisms
// =============================================================================

#[test]
fn test_certificate_and_openid_for_same_user() {
    init_tracing();
    let resolution = resolve(&directory(), openid_state(ALICE_URL, 10), Some("0a1b"));

    assert_eq!(resolution.identity.user_id(), Some(&alice()));
    assert_eq!(
        resolution.flags.trust,
        vec![TrustFlag::Cert, TrustFlag::OpenId, TrustFlag::OpenIdRecent]
    );
    assert_eq!(resolution.state.cert_serial.as_deref(), Some("0a1b"));
    assert_eq!(resolution.state.openid_url.as_deref(), Some(ALICE_URL));
    assert!(resolution.warnings.is_empty());
}

#[test]
fn test_stale_openid_is_not_recent() {
    // 700 seconds ago with a 600 second window
    let config = TrustConfig::default().with_confidence_expiry(Duration::seconds(600));
    let resolution = resolve_with(&config, &directory(), openid_state(ALICE_URL, 700), None);

    assert_eq!(resolution.flags.trust, vec![TrustFlag::OpenId]);
    assert!(!resolution.flags.has(TrustFlag::OpenIdRecent));
    assert_eq!(resolution.identity.user_id(), Some(&alice()));
}

#[test]
fn test_future_openid_timestamp_is_not_recent() {
    init_tracing();
    let resolution = resolve(&directory(), openid_state(ALICE_URL, -3600), None);

    assert_eq!(resolution.identity.user_id(), Some(&alice()));
    assert_eq!(resolution.flags.trust, vec![TrustFlag::OpenId]);
    assert_eq!(resolution.state.openid_timestamp, Some(now() + Duration::seconds(3600)));
}

#[test]
fn test_openid_conflicting_with_certificate_is_evicted() {
    init_tracing();
    let resolution = resolve(&directory(), openid_state(BOB_URL, 10), Some("0a1b"));

    assert_eq!(resolution.identity.user_id(), Some(&alice()));
    assert_eq!(resolution.flags.trust, vec![TrustFlag::Cert]);
    assert!(resolution.state.openid_url.is_none());
    assert!(resolution.state.openid_timestamp.is_none());
    assert_eq!(
        resolution.warnings,
        vec![CredentialError::AuthConflict {
            mechanism: Mechanism::OpenId,
            expected: alice(),
            actual: bob(),
        }]
    );
}

#[test]
fn test_certificate_switch_to_other_user_is_a_conflict() {
    let mut state = openid_state(ALICE_URL, 10);
    state.set_cert_serial("0a1b");

    let resolution = resolve(&directory(), state, Some("0b0b"));

    assert!(resolution.had_conflict());
    assert!(resolution.state.cert_serial.is_none());
    // the remaining federated login still belongs to alice
    assert_eq!(resolution.identity.user_id(), Some(&alice()));
    assert_eq!(
        resolution.flags.trust,
        vec![TrustFlag::OpenId, TrustFlag::OpenIdRecent]
    );
}

#[test]
fn test_second_certificate_of_same_user_is_accepted() {
    let directory = directory();
    directory.add_certificate("0a1c", &alice()).unwrap();

    let mut state = TrustState::new();
    state.set_cert_serial("0a1b");

    let resolution = resolve(&directory, state, Some("0a1c"));
    assert!(resolution.warnings.is_empty());
    assert_eq!(resolution.state.cert_serial.as_deref(), Some("0a1c"));
}

// =============================================================================
// Credential failures
// =============================================================================

#[test]
fn test_revoked_certificate() {
    let directory = directory();
    directory.revoke_certificate("0a1b").unwrap();

    let resolution = resolve(&directory, TrustState::new(), Some("0a1b"));
    assert_eq!(resolution.identity, Identity::Anonymous);
    assert_eq!(
        resolution.warnings,
        vec![CredentialError::CertRevoked {
            serial: "0a1b".into()
        }]
    );
}

#[test]
fn test_expired_certificate_falls_back_to_openid() {
    let directory = directory();
    directory.expire_certificate("0a1b").unwrap();

    let resolution = resolve(&directory, openid_state(ALICE_URL, 10), Some("0a1b"));
    assert_eq!(resolution.identity.user_id(), Some(&alice()));
    assert!(!resolution.flags.has(TrustFlag::Cert));
    assert!(resolution.flags.has(TrustFlag::OpenId));
    assert!(matches!(
        resolution.warnings.as_slice(),
        [CredentialError::CertExpired { .. }]
    ));
}

#[test]
fn test_certificate_login_disabled_for_account() {
    let directory = directory();
    directory
        .set_cert_policy(&alice(), CertAuthPolicy::Disabled)
        .unwrap();

    let resolution = resolve(&directory, TrustState::new(), Some("0a1b"));
    assert_eq!(resolution.warnings, vec![CredentialError::CertAuthDisabled]);
    assert!(resolution.state.is_empty());
}

#[test]
fn test_openid_refused_for_certificate_only_account() {
    let directory = directory();
    directory
        .set_cert_policy(&alice(), CertAuthPolicy::Required)
        .unwrap();

    let resolution = resolve(&directory, openid_state(ALICE_URL, 10), None);
    assert_eq!(resolution.warnings, vec![CredentialError::OpenIdAuthDisabled]);
    assert_eq!(resolution.identity, Identity::Anonymous);
    assert!(resolution.state.is_empty());
}

#[test]
fn test_unknown_openid_url() {
    let resolution = resolve(
        &directory(),
        openid_state("https://id.example/nobody", 10),
        None,
    );
    assert!(matches!(
        resolution.warnings.as_slice(),
        [CredentialError::OpenIdNotFound { .. }]
    ));
}

#[test]
fn test_half_written_openid_login_is_dropped_silently() {
    let mut state = TrustState::new();
    state.openid_url = Some(ALICE_URL.into());

    let resolution = resolve(&directory(), state, None);
    assert!(resolution.warnings.is_empty());
    assert!(resolution.state.is_empty());
}

#[test]
fn test_everything_failing_wipes_state() {
    let directory = directory();
    directory.revoke_certificate("0a1b").unwrap();

    let mut state = openid_state("https://id.example/nobody", 10);
    state.set_cert_serial("0a1b");

    let resolution = resolve(&directory, state, Some("0a1b"));
    assert_eq!(resolution.identity, Identity::Anonymous);
    assert!(resolution.state.is_empty());
    assert_eq!(resolution.warnings.len(), 2);
}

// =============================================================================
// Login / logout round trip
// =============================================================================

#[test]
fn test_login_then_resolve() {
    let user = User::new("1", "alice").with_identity_url(ALICE_URL);
    let mut state = TrustState::new();
    login_openid(&mut state, &user, ALICE_URL, now()).unwrap();

    let resolution = resolve(&directory(), state, None);
    assert!(resolution.can_purge());
    let principals = resolution.principals(&TrustConfig::default().rules);
    assert!(principals.contains(&Principal::from("trusted_for:auth")));

    let mut state = resolution.state;
    logout(&mut state);
    let resolution = resolve(&directory(), state, None);
    assert_eq!(resolution.identity, Identity::Anonymous);
    assert!(!resolution.can_purge());
}
