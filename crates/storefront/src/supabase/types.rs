//! Wire types for the auth REST API.

use serde::Deserialize;
use uuid::Uuid;

use quardcube_core::{Email, UserId};

use super::SupabaseError;
use crate::models::{AuthSession, AuthUser};

/// Response of the `/token` endpoint (all grant types) and of an
/// auto-confirmed `/signup`.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    /// Lifetime of the access token in seconds.
    pub expires_in: i64,
    /// Absolute expiry (unix seconds); older servers omit it.
    #[serde(default)]
    pub expires_at: Option<i64>,
    pub refresh_token: String,
    pub user: UserResponse,
}

impl TokenResponse {
    /// Convert into a session, computing the expiry relative to `now` when
    /// the server did not send one.
    ///
    /// # Errors
    ///
    /// Returns `SupabaseError::MissingEmail` if the user has no usable email.
    pub fn into_session(self, now: i64) -> Result<AuthSession, SupabaseError> {
        let expires_at = self
            .expires_at
            .unwrap_or_else(|| now.saturating_add(self.expires_in));

        Ok(AuthSession {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at,
            user: self.user.try_into()?,
        })
    }
}

/// A user object as returned by `/user`, `/signup` and inside token responses.
#[derive(Debug, Deserialize)]
pub struct UserResponse {
    pub id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: UserMetadata,
    #[serde(default)]
    pub app_metadata: AppMetadata,
}

/// Free-form metadata, reduced to the fields the storefront reads.
#[derive(Debug, Default, Deserialize)]
pub struct UserMetadata {
    pub name: Option<String>,
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
    pub picture: Option<String>,
    pub country: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AppMetadata {
    pub provider: Option<String>,
}

impl TryFrom<UserResponse> for AuthUser {
    type Error = SupabaseError;

    fn try_from(user: UserResponse) -> Result<Self, Self::Error> {
        let email = user
            .email
            .as_deref()
            .and_then(|e| Email::parse(e).ok())
            .ok_or(SupabaseError::MissingEmail)?;

        let UserMetadata {
            name,
            full_name,
            avatar_url,
            picture,
            ..
        } = user.user_metadata;

        Ok(Self {
            id: UserId::new(user.id),
            email,
            display_name: full_name.or(name).filter(|n| !n.trim().is_empty()),
            avatar_url: avatar_url.or(picture),
            provider: user.app_metadata.provider,
        })
    }
}

/// `/signup` answers with a session when email confirmation is disabled and
/// with the bare user otherwise.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum SignUpResponse {
    Session(TokenResponse),
    User(UserResponse),
}

/// Error body. Different endpoints fill different fields.
#[derive(Debug, Default, Deserialize)]
pub struct ErrorResponse {
    pub error: Option<String>,
    pub error_description: Option<String>,
    pub error_code: Option<String>,
    pub msg: Option<String>,
    pub message: Option<String>,
}

impl ErrorResponse {
    /// The most specific human-readable message available.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.error_description
            .as_deref()
            .or(self.msg.as_deref())
            .or(self.message.as_deref())
            .or(self.error.as_deref())
    }

    /// Machine-readable code, when present.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        self.error_code.as_deref().or(self.error.as_deref())
    }
}
