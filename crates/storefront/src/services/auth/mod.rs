//! Authentication service.
//!
//! The storefront delegates identity to the hosted auth backend. This module
//! defines the [`AuthBackend`] seam the rest of the crate talks to, plus the
//! provider list and local input validation done before any network call.

mod error;
pub mod pkce;

pub use error::AuthError;

use std::future::Future;

use crate::models::{AuthSession, AuthUser, ProfileUpdate};
use crate::supabase::SupabaseError;

/// Minimum password length accepted by the auth backend.
const MIN_PASSWORD_LENGTH: usize = 6;

/// Result of a sign-up.
#[derive(Debug, Clone)]
pub enum SignUpOutcome {
    /// Email confirmation is off; the user is signed in.
    Session(AuthSession),
    /// The user must confirm their email before signing in.
    PendingConfirmation(AuthUser),
}

/// OAuth providers offered on the login page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OAuthProvider {
    Google,
    Facebook,
    Apple,
}

impl OAuthProvider {
    /// Provider name as understood by the auth backend.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Google => "google",
            Self::Facebook => "facebook",
            Self::Apple => "apple",
        }
    }
}

impl std::fmt::Display for OAuthProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OAuthProvider {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "google" => Ok(Self::Google),
            "facebook" => Ok(Self::Facebook),
            "apple" => Ok(Self::Apple),
            _ => Err(AuthError::UnsupportedProvider(s.to_string())),
        }
    }
}

/// Operations the storefront needs from the auth backend.
///
/// [`crate::supabase::AuthClient`] is the production implementation.
pub trait AuthBackend: Send + Sync {
    /// URL of the provider sign-in page for a PKCE flow.
    fn authorize_url(
        &self,
        provider: OAuthProvider,
        redirect_to: &str,
        code_challenge: &str,
    ) -> String;

    /// Exchange an authorization code and its PKCE verifier for a session.
    fn exchange_code(
        &self,
        code: &str,
        code_verifier: &str,
    ) -> impl Future<Output = Result<AuthSession, SupabaseError>> + Send;

    fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> impl Future<Output = Result<AuthSession, SupabaseError>> + Send;

    /// Register an account; `metadata` becomes the user's metadata.
    fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: &ProfileUpdate,
        redirect_to: &str,
    ) -> impl Future<Output = Result<SignUpOutcome, SupabaseError>> + Send;

    /// Trade a refresh token for a new session.
    fn refresh(
        &self,
        refresh_token: &str,
    ) -> impl Future<Output = Result<AuthSession, SupabaseError>> + Send;

    /// Validate an access token and return its user.
    fn get_user(
        &self,
        access_token: &str,
    ) -> impl Future<Output = Result<AuthUser, SupabaseError>> + Send;

    /// Merge `metadata` into the user's metadata.
    fn update_user(
        &self,
        access_token: &str,
        metadata: &ProfileUpdate,
    ) -> impl Future<Output = Result<AuthUser, SupabaseError>> + Send;

    /// Revoke the session's refresh tokens.
    fn sign_out(
        &self,
        access_token: &str,
    ) -> impl Future<Output = Result<(), SupabaseError>> + Send;

    /// Send a password recovery email.
    fn reset_password(
        &self,
        email: &str,
        redirect_to: &str,
    ) -> impl Future<Output = Result<(), SupabaseError>> + Send;
}

/// Validate password requirements.
///
/// # Errors
///
/// Returns `AuthError::WeakPassword` if the password doesn't meet requirements.
pub fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "Password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }

    if password.trim().is_empty() {
        return Err(AuthError::WeakPassword(
            "Password cannot be only whitespace".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_password() {
        assert!(validate_password("secret").is_ok());
        assert!(matches!(
            validate_password("short"),
            Err(AuthError::WeakPassword(_))
        ));
        assert!(matches!(
            validate_password("        "),
            Err(AuthError::WeakPassword(_))
        ));
    }

    #[test]
    fn test_provider_parsing() {
        assert_eq!("Google".parse::<OAuthProvider>().unwrap(), OAuthProvider::Google);
        assert_eq!("apple".parse::<OAuthProvider>().unwrap().as_str(), "apple");
        assert!(matches!(
            "github".parse::<OAuthProvider>(),
            Err(AuthError::UnsupportedProvider(_))
        ));
    }
}
