//! OAuth callback handling.
//!
//! The provider sends the visitor to `/auth/callback` with either a `code`
//! or an `error`. Every outcome is a redirect: home with fresh session
//! cookies on success, the login page with `error`/`message` otherwise.

use serde::Deserialize;
use tower_sessions::cookie::Cookie;

use crate::db::ProfileStore;
use crate::models::NewProfile;
use crate::services::auth::{AuthBackend, AuthError};
use crate::services::auth_state::AuthService;
use crate::services::effects::SideEffects;
use crate::services::session::RequestCookies;

/// Query parameters on the callback URL.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// Where to send the visitor and which cookies to set on the way.
#[derive(Debug)]
pub struct CallbackOutcome {
    pub location: String,
    pub cookies: Vec<Cookie<'static>>,
    pub side_effects: SideEffects,
}

/// Login page URL carrying an `error` code and a readable `message`.
#[must_use]
pub fn login_redirect(base_url: &str, error: &str, message: &str) -> String {
    format!(
        "{base_url}/auth/login?error={}&message={}",
        urlencoding::encode(error),
        urlencoding::encode(message)
    )
}

impl<B: AuthBackend, P: ProfileStore> AuthService<'_, B, P> {
    /// Finish an OAuth sign-in.
    ///
    /// A provider error short-circuits before any code exchange.
    pub async fn handle_callback(
        &self,
        params: CallbackParams,
        cookies: &RequestCookies,
    ) -> CallbackOutcome {
        let failure = |error: &str, message: &str| CallbackOutcome {
            location: login_redirect(self.base_url, error, message),
            cookies: Vec::new(),
            side_effects: SideEffects::new(),
        };

        if let Some(error) = params.error {
            let message = params
                .error_description
                .filter(|d| !d.is_empty())
                .unwrap_or_else(|| "Authentication failed".to_string());
            tracing::warn!(error = %error, message = %message, "OAuth provider returned an error");
            return failure(&error, &message);
        }

        let Some(code) = params.code.filter(|c| !c.is_empty()) else {
            tracing::warn!("OAuth callback without code");
            return failure("no_code", "No authentication code provided");
        };

        let session = match self
            .sessions
            .exchange_code(&code, cookies.code_verifier())
            .await
        {
            Ok(session) => session,
            Err(AuthError::MissingVerifier) => {
                tracing::warn!("OAuth callback without code verifier cookie");
                return failure("no_code_verifier", "No code verifier found");
            }
            Err(AuthError::CodeExchange(message)) => {
                tracing::warn!(message = %message, "Code exchange rejected");
                return failure("session_exchange_error", &message);
            }
            Err(e) => {
                tracing::error!(error = %e, "Code exchange failed");
                return failure("unexpected_error", "An unexpected error occurred");
            }
        };

        tracing::info!(
            user_id = %session.user.id,
            expires_at = session.expires_at,
            "OAuth sign-in completed"
        );

        let mut side_effects = SideEffects::new();
        self.provision(NewProfile::from(&session.user), &mut side_effects)
            .await;

        let mut cookies = self.sessions.session_cookies(&session);
        cookies.push(self.sessions.clear_verifier_cookie());

        CallbackOutcome {
            location: self.base_url.to_string(),
            cookies,
            side_effects,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_redirect_encodes_values() {
        assert_eq!(
            login_redirect("https://quardcube.com", "access_denied", "User said no & left"),
            "https://quardcube.com/auth/login?error=access_denied&message=User%20said%20no%20%26%20left"
        );
    }
}
