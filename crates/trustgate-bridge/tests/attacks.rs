//! Attack Scenario Tests
//!
//! Each test represents a way a client could try to make the resolver
//! believe something about a session that is not true. Every one of them
//! must be blocked.

use chrono::{DateTime, Duration, TimeZone, Utc};
use trustgate_bridge::{
    Certificate, CertificateRepository, IdentityRecord, IdentityRepository, MemoryDirectory,
    RepositoryError, ResolveError, Resolver, User, UserRepository,
};
use trustgate_core::{
    CertAuthPolicy, CredentialError, Identity, TrustConfig, TrustFlag, TrustState, UserId,
};

// =============================================================================
// Test Helpers
// =============================================================================

const ALICE_URL: &str = "https://id.example/alice";
const MALLORY_URL: &str = "https://id.example/mallory";

fn now() -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000, 0).unwrap()
}

fn directory() -> MemoryDirectory {
    let directory = MemoryDirectory::new();
    directory
        .add_user(
            User::new("1", "alice")
                .with_role("admin")
                .with_identity_url(ALICE_URL),
        )
        .unwrap();
    directory
        .add_user(User::new("666", "mallory").with_identity_url(MALLORY_URL))
        .unwrap();
    directory.add_certificate("a11ce", &UserId::new("1")).unwrap();
    directory.add_certificate("ba5e", &UserId::new("666")).unwrap();
    directory
}

fn resolve(
    directory: &MemoryDirectory,
    state: TrustState,
    serial: Option<&str>,
) -> trustgate_bridge::Resolution {
    let config = TrustConfig::default();
    Resolver::new(&config, directory, directory, directory)
        .resolve_at(state, serial, now())
        .unwrap()
}

/// Repository whose backend is down
struct Unreachable;

impl CertificateRepository for Unreachable {
    fn find_by_serial(&self, _serial: &str) -> Result<Option<Certificate>, RepositoryError> {
        Err(RepositoryError::Unavailable("certificates".into()))
    }
}

impl IdentityRepository for Unreachable {
    fn find_by_url(&self, _url: &str) -> Result<Option<IdentityRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("identities".into()))
    }
}

impl UserRepository for Unreachable {
    fn find_user(&self, _id: &UserId) -> Result<Option<User>, RepositoryError> {
        Err(RepositoryError::Unavailable("users".into()))
    }
}

// =============================================================================
// ATTACK: Identity Splicing
// =============================================================================

/// Mallory holds her own certificate and plants alice's federated login in
/// her session, hoping to pick up alice's roles through the openid check.
#[test]
fn attack_openid_spliced_onto_foreign_certificate() {
    let mut state = TrustState::new();
    state.set_openid(ALICE_URL, now());

    let resolution = resolve(&directory(), state, Some("ba5e"));

    assert_eq!(resolution.identity.user_id(), Some(&UserId::new("666")));
    assert!(!resolution.flags.has(TrustFlag::OpenId));
    assert!(resolution.state.openid_url.is_none(), "Spliced login must be evicted");
    assert!(resolution.had_conflict());
}

/// A session established by alice's certificate is reused with mallory's.
#[test]
fn attack_certificate_swap_mid_session() {
    let mut state = TrustState::new();
    state.set_cert_serial("a11ce");

    let resolution = resolve(&directory(), state, Some("ba5e"));

    assert_eq!(resolution.identity, Identity::Anonymous);
    assert!(resolution.state.is_empty());
    assert!(matches!(
        resolution.warnings.as_slice(),
        [CredentialError::AuthConflict { .. }]
    ));
}

// =============================================================================
// ATTACK: Stale Credentials
// =============================================================================

/// A revoked certificate must stop working immediately, whatever the case
/// of the serial the transport hands over.
#[test]
fn attack_revoked_certificate_with_mangled_serial() {
    let directory = directory();
    directory.revoke_certificate("A11CE").unwrap();

    for serial in ["a11ce", "A11CE", " a11Ce "] {
        let resolution = resolve(&directory, TrustState::new(), Some(serial));
        assert_eq!(resolution.identity, Identity::Anonymous, "serial {:?}", serial);
    }
}

/// A stored certificate serial without the certificate being presented
/// again grants nothing.
#[test]
fn attack_replay_stored_serial_without_certificate() {
    let mut state = TrustState::new();
    state.set_cert_serial("a11ce");

    let resolution = resolve(&directory(), state, None);
    assert_eq!(resolution.identity, Identity::Anonymous);
    assert!(resolution.state.cert_serial.is_none());
}

/// Switching the account to certificate-only must invalidate an existing
/// federated session on the very next request.
#[test]
fn attack_openid_session_survives_policy_hardening() {
    let directory = directory();
    let mut state = TrustState::new();
    state.set_openid(ALICE_URL, now() - Duration::seconds(5));

    let before = resolve(&directory, state.clone(), None);
    assert!(before.flags.has(TrustFlag::OpenId));

    directory
        .set_cert_policy(&UserId::new("1"), CertAuthPolicy::Required)
        .unwrap();

    let after = resolve(&directory, state, None);
    assert_eq!(after.identity, Identity::Anonymous);
    assert!(after.state.is_empty());
}

/// A deleted account's credentials do not resolve to a ghost identity.
#[test]
fn attack_deleted_account_credentials() {
    let directory = directory();
    directory.remove_user(&UserId::new("1")).unwrap();

    let mut state = TrustState::new();
    state.set_openid(ALICE_URL, now());

    let resolution = resolve(&directory, state, Some("a11ce"));
    assert_eq!(resolution.identity, Identity::Anonymous);
    assert!(resolution.state.is_empty());
}

// =============================================================================
// ATTACK: Transport Spoofing
// =============================================================================

/// With certificate auth switched off, a serial header injected by the
/// client must be ignored.
#[test]
fn attack_injected_serial_when_certificates_disabled() {
    let directory = directory();
    let config = TrustConfig::default().with_client_cert_auth(false);

    let resolution = Resolver::new(&config, &directory, &directory, &directory)
        .resolve_at(TrustState::new(), Some("a11ce"), now())
        .unwrap();

    assert_eq!(resolution.identity, Identity::Anonymous);
}

/// A backend outage must surface as a hard failure, never as a silently
/// downgraded session.
#[test]
fn attack_backend_outage_is_not_swallowed() {
    let config = TrustConfig::default();
    let repo = Unreachable;

    let mut state = TrustState::new();
    state.set_openid(ALICE_URL, now());

    let result = Resolver::new(&config, &repo, &repo, &repo).resolve_at(state, Some("a11ce"), now());
    assert!(matches!(result, Err(ResolveError::Repository(_))));
}
