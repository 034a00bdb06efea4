//! Authentication error types.

use thiserror::Error;

use crate::supabase::SupabaseError;

/// Errors that can occur during authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Invalid email format.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] quardcube_core::EmailError),

    /// Invalid credentials (wrong password or user not found).
    #[error("invalid credentials")]
    InvalidCredentials,

    /// User already exists.
    #[error("user already exists")]
    UserAlreadyExists,

    /// Password too weak or invalid.
    #[error("password validation failed: {0}")]
    WeakPassword(String),

    /// Unknown OAuth provider name.
    #[error("unsupported provider: {0}")]
    UnsupportedProvider(String),

    /// OAuth callback arrived without the PKCE verifier cookie.
    #[error("no code verifier present")]
    MissingVerifier,

    /// The backend refused the authorization code.
    #[error("code exchange failed: {0}")]
    CodeExchange(String),

    /// The operation needs a signed-in user.
    #[error("not signed in")]
    NoSession,

    /// Auth backend error.
    #[error("auth backend error: {0}")]
    Backend(#[from] SupabaseError),
}

impl AuthError {
    /// Short machine-readable code, used as the `error` query parameter on
    /// auth redirects.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidEmail(_) => "invalid_email",
            Self::InvalidCredentials => "invalid_credentials",
            Self::UserAlreadyExists => "user_already_exists",
            Self::WeakPassword(_) => "weak_password",
            Self::UnsupportedProvider(_) => "unsupported_provider",
            Self::MissingVerifier => "no_code_verifier",
            Self::CodeExchange(_) => "session_exchange_error",
            Self::NoSession => "no_session",
            Self::Backend(_) => "unexpected_error",
        }
    }

    /// Message safe to show to the visitor.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidEmail(e) => format!("Invalid email: {e}"),
            Self::InvalidCredentials => "Invalid email or password".to_string(),
            Self::UserAlreadyExists => "An account with this email already exists".to_string(),
            Self::WeakPassword(reason) => reason.clone(),
            Self::UnsupportedProvider(p) => format!("Sign-in with {p} is not supported"),
            Self::MissingVerifier => "Sign-in session expired, please try again".to_string(),
            Self::CodeExchange(message) => message.clone(),
            Self::NoSession => "Please sign in to continue".to_string(),
            Self::Backend(SupabaseError::Api { message, .. }) => message.clone(),
            Self::Backend(_) => "Something went wrong, please try again".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_callback_codes() {
        assert_eq!(AuthError::MissingVerifier.code(), "no_code_verifier");
        assert_eq!(
            AuthError::CodeExchange("expired".to_string()).code(),
            "session_exchange_error"
        );
        assert_eq!(
            AuthError::Backend(SupabaseError::MissingEmail).code(),
            "unexpected_error"
        );
    }

    #[test]
    fn test_backend_messages_pass_through() {
        let err = AuthError::Backend(SupabaseError::Api {
            status: 429,
            code: None,
            message: "Email rate limit exceeded".to_string(),
        });
        assert_eq!(err.user_message(), "Email rate limit exceeded");
        assert_eq!(
            AuthError::Backend(SupabaseError::MissingEmail).user_message(),
            "Something went wrong, please try again"
        );
    }
}
