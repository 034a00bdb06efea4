//! Account operations through the auth context.

#![allow(clippy::unwrap_used)]

use quardcube_integration_tests::{BASE_URL, FakeAuthBackend, MemoryProfiles, PASSWORD, test_config, user};
use quardcube_storefront::models::ProfileUpdate;
use quardcube_storefront::services::auth::{AuthError, OAuthProvider, pkce};
use quardcube_storefront::services::auth_state::{AuthService, AuthState, SignUpResult};
use quardcube_storefront::services::profiles::ProfileProvisioner;
use quardcube_storefront::services::session::{CODE_VERIFIER_COOKIE, RequestCookies, SessionStore};

struct Harness {
    sessions: SessionStore<FakeAuthBackend>,
    provisioner: ProfileProvisioner,
    profiles: MemoryProfiles,
}

impl Harness {
    fn with_backend(backend: FakeAuthBackend) -> Self {
        Self {
            sessions: SessionStore::new(backend, test_config().cookies),
            provisioner: ProfileProvisioner::new(),
            profiles: MemoryProfiles::new(),
        }
    }

    fn new() -> Self {
        Self::with_backend(FakeAuthBackend::new(user("amani@example.com")))
    }

    fn auth(&self) -> AuthService<'_, FakeAuthBackend, MemoryProfiles> {
        AuthService::new(&self.sessions, &self.provisioner, &self.profiles, BASE_URL)
    }

    fn backend(&self) -> &FakeAuthBackend {
        self.sessions.backend()
    }
}

fn metadata(name: &str, country: &str) -> ProfileUpdate {
    ProfileUpdate {
        name: Some(name.to_string()),
        country: Some(country.to_string()),
        ..ProfileUpdate::default()
    }
}

#[tokio::test]
async fn sign_in_sets_cookies_and_provisions_profile() {
    let harness = Harness::new();

    let signed_in = harness
        .auth()
        .sign_in("amani@example.com", PASSWORD)
        .await
        .unwrap();

    assert_eq!(signed_in.cookies.len(), 2);
    let profile = harness.profiles.get(signed_in.session.user.id).unwrap();
    assert_eq!(profile.email.as_str(), "amani@example.com");
    assert_eq!(profile.name.as_deref(), Some("Amani Juma"));
}

#[tokio::test]
async fn repeated_sign_in_provisions_once() {
    let harness = Harness::new();

    harness.auth().sign_in("amani@example.com", PASSWORD).await.unwrap();
    harness.auth().sign_in("amani@example.com", PASSWORD).await.unwrap();

    assert_eq!(harness.profiles.writes(), 1);
}

#[tokio::test]
async fn wrong_password_is_invalid_credentials() {
    let harness = Harness::new();

    let err = harness
        .auth()
        .sign_in("amani@example.com", "wrong")
        .await
        .unwrap_err();

    assert!(matches!(err, AuthError::InvalidCredentials));
}

#[tokio::test]
async fn malformed_email_never_reaches_backend() {
    let harness = Harness::new();

    let err = harness.auth().sign_in("not-an-email", PASSWORD).await.unwrap_err();

    assert!(matches!(err, AuthError::InvalidEmail(_)));
    assert!(harness.backend().calls().is_empty());
}

#[tokio::test]
async fn short_password_is_rejected_before_sign_up() {
    let harness = Harness::new();

    let err = harness
        .auth()
        .sign_up("amani@example.com", "123", metadata("Amani", "Tanzania"))
        .await
        .unwrap_err();

    assert!(matches!(err, AuthError::WeakPassword(_)));
    assert_eq!(harness.backend().call_count("sign_up"), 0);
}

#[tokio::test]
async fn sign_up_with_confirmation_seeds_profile_from_form() {
    let harness =
        Harness::with_backend(FakeAuthBackend::new(user("amani@example.com")).requiring_confirmation());

    let result = harness
        .auth()
        .sign_up("amani@example.com", PASSWORD, metadata("  Amani J  ", "Kenya"))
        .await
        .unwrap();

    let SignUpResult::PendingConfirmation { email, .. } = result else {
        panic!("expected pending confirmation");
    };
    assert_eq!(email.as_str(), "amani@example.com");

    let profile = harness.profiles.get(harness.backend().user().id).unwrap();
    assert_eq!(profile.name.as_deref(), Some("Amani J"));
    assert_eq!(profile.country.as_deref(), Some("Kenya"));
}

#[tokio::test]
async fn sign_up_without_confirmation_signs_in() {
    let harness = Harness::new();

    let result = harness
        .auth()
        .sign_up("amani@example.com", PASSWORD, metadata("Amani", "Tanzania"))
        .await
        .unwrap();

    assert!(matches!(result, SignUpResult::SignedIn(ref s) if s.cookies.len() == 2));
}

#[tokio::test]
async fn resolve_reports_authenticated_state() {
    let harness = Harness::new();
    let session = harness.backend().issue();
    let cookies = RequestCookies::new(
        Some(session.access_token.clone()),
        Some(session.refresh_token.clone()),
        None,
    );

    let resolved = harness.auth().resolve(&cookies).await.unwrap();

    assert!(resolved.state.is_authenticated());
    assert_eq!(resolved.state.user().map(|u| u.id), Some(session.user.id));
    assert!(harness.profiles.get(session.user.id).is_some());

    let anonymous = harness.auth().resolve(&RequestCookies::default()).await.unwrap();
    assert_eq!(anonymous.state, AuthState::Anonymous);
}

#[tokio::test]
async fn provider_sign_in_carries_matching_challenge() {
    let harness = Harness::new();

    let redirect = harness.auth().sign_in_with_provider(OAuthProvider::Google);

    assert_eq!(redirect.verifier_cookie.name(), CODE_VERIFIER_COOKIE);
    let challenge = pkce::challenge(redirect.verifier_cookie.value());
    assert!(redirect.location.contains("provider=google"));
    assert!(redirect.location.contains(&format!("code_challenge={challenge}")));
    assert!(
        redirect
            .location
            .contains("redirect_to=http://localhost:3000/auth/callback")
    );
}

#[tokio::test]
async fn profile_update_merges_into_existing_row() {
    let harness = Harness::new();
    let signed_in = harness
        .auth()
        .sign_in("amani@example.com", PASSWORD)
        .await
        .unwrap();

    let update = ProfileUpdate {
        city: Some("Arusha".to_string()),
        phone: Some("   ".to_string()),
        ..ProfileUpdate::default()
    };
    let updated = harness
        .auth()
        .update_profile(&signed_in.session, update)
        .await
        .unwrap();

    assert!(updated.side_effects.is_clean());
    let profile = harness.profiles.get(signed_in.session.user.id).unwrap();
    assert_eq!(profile.city.as_deref(), Some("Arusha"));
    assert_eq!(profile.phone, None);
    assert_eq!(profile.name.as_deref(), Some("Amani Juma"));
}

#[tokio::test]
async fn profile_update_after_sign_out_needs_session() {
    let harness = Harness::new();
    let session = harness.backend().issue();
    let _ = harness.auth().sign_out(Some(&session)).await;

    let err = harness
        .auth()
        .update_profile(&session, metadata("Amani", "Tanzania"))
        .await
        .unwrap_err();

    assert!(matches!(err, AuthError::NoSession));
}
