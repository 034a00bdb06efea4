//! Auth context: the per-request view of who is signed in, and the account
//! operations built on the session store.

use tower_sessions::cookie::Cookie;

use quardcube_core::Email;

use crate::db::ProfileStore;
use crate::models::{AuthSession, AuthUser, NewProfile, ProfileUpdate, SessionView};
use crate::services::auth::{AuthBackend, AuthError, OAuthProvider, SignUpOutcome, pkce};
use crate::services::effects::{SideEffect, SideEffects};
use crate::services::profiles::ProfileProvisioner;
use crate::services::session::{RequestCookies, SessionStore};

/// Where the auth context stands for a request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum AuthState {
    /// The session has not been resolved yet.
    #[default]
    Loading,
    Authenticated(SessionView),
    Anonymous,
}

impl AuthState {
    /// State once the session lookup has finished.
    #[must_use]
    pub fn resolve(session: Option<&AuthSession>) -> Self {
        session.map_or(Self::Anonymous, |s| Self::Authenticated(s.view()))
    }

    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated(_))
    }

    #[must_use]
    pub const fn user(&self) -> Option<&AuthUser> {
        match self {
            Self::Authenticated(view) => Some(&view.user),
            _ => None,
        }
    }
}

/// Resolved auth context for one request.
#[derive(Debug)]
pub struct ResolvedAuth {
    pub state: AuthState,
    pub session: Option<AuthSession>,
    /// Refreshed or cleared auth cookies to attach to the response.
    pub cookies: Vec<Cookie<'static>>,
    pub side_effects: SideEffects,
}

/// A completed sign-in.
#[derive(Debug)]
pub struct SignedIn {
    pub session: AuthSession,
    pub cookies: Vec<Cookie<'static>>,
    pub side_effects: SideEffects,
}

/// Result of a sign-up.
#[derive(Debug)]
pub enum SignUpResult {
    SignedIn(SignedIn),
    /// A confirmation email was sent to the address.
    PendingConfirmation {
        email: Email,
        side_effects: SideEffects,
    },
}

/// Redirect starting an OAuth sign-in.
#[derive(Debug)]
pub struct OAuthRedirect {
    pub location: String,
    pub verifier_cookie: Cookie<'static>,
}

/// Result of a profile update.
#[derive(Debug, serde::Serialize)]
pub struct ProfileUpdated {
    pub user: AuthUser,
    pub side_effects: SideEffects,
}

/// Account operations for the auth context.
pub struct AuthService<'a, B, P> {
    pub(super) sessions: &'a SessionStore<B>,
    pub(super) provisioner: &'a ProfileProvisioner,
    pub(super) profiles: &'a P,
    pub(super) base_url: &'a str,
}

impl<'a, B: AuthBackend, P: ProfileStore> AuthService<'a, B, P> {
    /// Create a new auth service.
    #[must_use]
    pub const fn new(
        sessions: &'a SessionStore<B>,
        provisioner: &'a ProfileProvisioner,
        profiles: &'a P,
        base_url: &'a str,
    ) -> Self {
        Self {
            sessions,
            provisioner,
            profiles,
            base_url,
        }
    }

    fn callback_url(&self) -> String {
        format!("{}/auth/callback", self.base_url)
    }

    pub(super) async fn provision(&self, profile: NewProfile, effects: &mut SideEffects) {
        if let Err(e) = self.provisioner.ensure(self.profiles, profile).await {
            effects.record(SideEffect::ProfileUpsert, e);
        }
    }

    /// Resolve the request's session and make sure its user has a profile.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Backend` if the auth backend is unavailable.
    pub async fn resolve(&self, cookies: &RequestCookies) -> Result<ResolvedAuth, AuthError> {
        let lookup = self.sessions.get_session(cookies).await?;
        let state = AuthState::resolve(lookup.session.as_ref());

        let mut side_effects = SideEffects::new();
        if let Some(session) = &lookup.session {
            self.provision(NewProfile::from(&session.user), &mut side_effects)
                .await;
        }

        Ok(ResolvedAuth {
            state,
            session: lookup.session,
            cookies: lookup.cookies,
            side_effects,
        })
    }

    /// Register with email and password. `metadata` (name, country) seeds
    /// both the backend user metadata and the profile row.
    ///
    /// # Errors
    ///
    /// Returns `AuthError` if validation fails or the backend refuses.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: ProfileUpdate,
    ) -> Result<SignUpResult, AuthError> {
        let metadata = metadata.trimmed();
        let outcome = self
            .sessions
            .sign_up(email, password, &metadata, &self.callback_url())
            .await?;

        let mut side_effects = SideEffects::new();
        let user = match &outcome {
            SignUpOutcome::Session(session) => &session.user,
            SignUpOutcome::PendingConfirmation(user) => user,
        };
        let profile = NewProfile {
            name: metadata.name.clone().or_else(|| user.display_name.clone()),
            country: metadata.country.clone(),
            ..NewProfile::from(user)
        };
        self.provision(profile, &mut side_effects).await;

        Ok(match outcome {
            SignUpOutcome::Session(session) => {
                tracing::info!(user_id = %session.user.id, "User signed up");
                SignUpResult::SignedIn(SignedIn {
                    cookies: self.sessions.session_cookies(&session),
                    session,
                    side_effects,
                })
            }
            SignUpOutcome::PendingConfirmation(user) => {
                tracing::info!(user_id = %user.id, "User signed up, awaiting confirmation");
                SignUpResult::PendingConfirmation {
                    email: user.email,
                    side_effects,
                }
            }
        })
    }

    /// Sign in with email and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the backend refuses.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<SignedIn, AuthError> {
        let session = self.sessions.sign_in_with_password(email, password).await?;
        tracing::info!(user_id = %session.user.id, "User signed in");

        let mut side_effects = SideEffects::new();
        self.provision(NewProfile::from(&session.user), &mut side_effects)
            .await;

        Ok(SignedIn {
            cookies: self.sessions.session_cookies(&session),
            session,
            side_effects,
        })
    }

    /// Start an OAuth sign-in: a fresh PKCE verifier goes into a cookie and
    /// the visitor is sent to the provider.
    #[must_use]
    pub fn sign_in_with_provider(&self, provider: OAuthProvider) -> OAuthRedirect {
        let verifier = pkce::generate_verifier();
        let challenge = pkce::challenge(&verifier);
        let location = self.sessions.backend().authorize_url(
            provider,
            &self.callback_url(),
            &challenge,
        );

        OAuthRedirect {
            location,
            verifier_cookie: self.sessions.verifier_cookie(&verifier),
        }
    }

    /// Sign out; returns the cookies clearing the session.
    pub async fn sign_out(&self, session: Option<&AuthSession>) -> Vec<Cookie<'static>> {
        self.sessions.sign_out(session).await
    }

    /// Email a password recovery link.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidEmail` or `AuthError::Backend`.
    pub async fn reset_password(&self, email: &str) -> Result<(), AuthError> {
        let email = Email::parse(email)?;
        // TODO: no /auth/reset-password route yet. It needs to exchange the
        // recovery code and then set the new password through `update_user`.
        let redirect_to = format!("{}/auth/reset-password", self.base_url);
        self.sessions
            .backend()
            .reset_password(email.as_str(), &redirect_to)
            .await?;
        Ok(())
    }

    /// Update the user's metadata, then mirror it into the profile row.
    ///
    /// Only the known profile fields are sent and blank values are dropped.
    /// A failed profile write is reported in the side effects.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::NoSession` if the access token is no longer
    /// accepted, `AuthError::Backend` for other backend failures.
    pub async fn update_profile(
        &self,
        session: &AuthSession,
        update: ProfileUpdate,
    ) -> Result<ProfileUpdated, AuthError> {
        let update = update.trimmed();

        let user = self
            .sessions
            .backend()
            .update_user(&session.access_token, &update)
            .await
            .map_err(|e| {
                if e.is_unauthorized() {
                    AuthError::NoSession
                } else {
                    AuthError::Backend(e)
                }
            })?;

        let mut side_effects = SideEffects::new();
        if let Err(e) = self
            .profiles
            .update_profile(user.id, &user.email, &update)
            .await
        {
            side_effects.record(SideEffect::ProfileUpsert, e);
        }

        Ok(ProfileUpdated { user, side_effects })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use quardcube_core::UserId;

    fn session() -> AuthSession {
        AuthSession {
            access_token: "a".to_string(),
            refresh_token: "r".to_string(),
            expires_at: 10,
            user: AuthUser {
                id: UserId::generate(),
                email: Email::parse("buyer@example.com").unwrap(),
                display_name: None,
                avatar_url: None,
                provider: None,
            },
        }
    }

    #[test]
    fn test_initial_state_is_loading() {
        assert_eq!(AuthState::default(), AuthState::Loading);
        assert_eq!(AuthState::resolve(None), AuthState::Anonymous);
        assert!(AuthState::resolve(Some(&session())).is_authenticated());
    }
}
