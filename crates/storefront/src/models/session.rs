//! Session-related types.
//!
//! An [`AuthSession`] is what the auth backend hands out after a code
//! exchange, password sign-in or refresh. Handlers and templates only ever see
//! the token-free [`SessionView`].

use serde::{Deserialize, Serialize};

use quardcube_core::{Email, UserId};

/// The signed-in user, as reported by the auth backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: UserId,
    pub email: Email,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    /// OAuth provider the account signed in with (`email` for passwords).
    pub provider: Option<String>,
}

/// Access/refresh token pair for a user.
///
/// Implements `Debug` manually to redact the tokens.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthSession {
    pub access_token: String,
    pub refresh_token: String,
    /// Unix timestamp (seconds) at which the access token expires.
    pub expires_at: i64,
    pub user: AuthUser,
}

impl AuthSession {
    /// Whether the access token has expired at `now` (unix seconds).
    #[must_use]
    pub const fn is_expired_at(&self, now: i64) -> bool {
        self.expires_at <= now
    }

    /// Token-free projection for handlers and templates.
    #[must_use]
    pub fn view(&self) -> SessionView {
        SessionView {
            user: self.user.clone(),
            expires_at: self.expires_at,
        }
    }
}

impl std::fmt::Debug for AuthSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSession")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .field("user", &self.user)
            .finish()
    }
}

/// What request handlers know about the current session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionView {
    pub user: AuthUser,
    pub expires_at: i64,
}

/// Keys for data stored in the tower-sessions session.
pub mod keys {
    /// The visitor's cart lines.
    pub const CART: &str = "cart";
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn session() -> AuthSession {
        AuthSession {
            access_token: "access-token-value".to_string(),
            refresh_token: "refresh-token-value".to_string(),
            expires_at: 1_700_000_000,
            user: AuthUser {
                id: UserId::generate(),
                email: Email::parse("buyer@example.com").unwrap(),
                display_name: Some("Buyer".to_string()),
                avatar_url: None,
                provider: Some("google".to_string()),
            },
        }
    }

    #[test]
    fn test_debug_redacts_tokens() {
        let debug = format!("{:?}", session());
        assert!(!debug.contains("access-token-value"));
        assert!(!debug.contains("refresh-token-value"));
        assert!(debug.contains("buyer@example.com"));
    }

    #[test]
    fn test_expiry_boundary() {
        let session = session();
        assert!(!session.is_expired_at(1_699_999_999));
        assert!(session.is_expired_at(1_700_000_000));
    }

    #[test]
    fn test_view_carries_no_tokens() {
        let json = serde_json::to_string(&session().view()).unwrap();
        assert!(!json.contains("token"));
        assert!(json.contains("buyer@example.com"));
    }
}
