//! Client for the hosted auth REST API (GoTrue-compatible).
//!
//! Every request carries the project's anon key in the `apikey` header;
//! user-scoped calls add `Authorization: Bearer <access token>`.
//!
//! # PKCE Flow
//!
//! 1. Build the provider redirect with [`AuthBackend::authorize_url`]
//! 2. The provider sends the visitor back to `/auth/callback?code=...`
//! 3. Exchange the code plus the stored verifier with
//!    [`AuthBackend::exchange_code`]

mod types;

pub use types::*;

use std::sync::Arc;

use reqwest::{RequestBuilder, Response};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde_json::json;
use thiserror::Error;

use crate::config::SupabaseConfig;
use crate::models::{AuthSession, AuthUser, ProfileUpdate};
use crate::services::auth::{AuthBackend, OAuthProvider, SignUpOutcome};

/// Errors that can occur when talking to the auth backend.
#[derive(Debug, Error)]
pub enum SupabaseError {
    /// Transport or decoding failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend answered with a non-success status.
    #[error("auth API error ({status}): {message}")]
    Api {
        status: u16,
        code: Option<String>,
        message: String,
    },

    /// The backend returned a user without a usable email address.
    #[error("user has no email address")]
    MissingEmail,
}

impl SupabaseError {
    /// HTTP status for `Api` errors.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the backend rejected the request itself (4xx), as opposed to
    /// being unreachable or failing.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        self.status().is_some_and(|s| (400..500).contains(&s))
    }

    /// Whether the credentials presented (token, refresh token) were refused.
    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        matches!(self.status(), Some(401 | 403))
    }
}

/// Client for the auth API.
#[derive(Clone)]
pub struct AuthClient {
    inner: Arc<AuthClientInner>,
}

struct AuthClientInner {
    client: reqwest::Client,
    url: String,
    anon_key: SecretString,
}

impl std::fmt::Debug for AuthClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthClient")
            .field("url", &self.inner.url)
            .finish_non_exhaustive()
    }
}

impl AuthClient {
    /// Create a new client.
    #[must_use]
    pub fn new(config: &SupabaseConfig) -> Self {
        Self {
            inner: Arc::new(AuthClientInner {
                client: reqwest::Client::new(),
                url: format!("{}/auth/v1", config.url.trim_end_matches('/')),
                anon_key: config.anon_key.clone(),
            }),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.inner.url)
    }

    fn post(&self, path: &str) -> RequestBuilder {
        self.inner
            .client
            .post(self.endpoint(path))
            .header("apikey", self.inner.anon_key.expose_secret())
    }
}

impl AuthBackend for AuthClient {
    fn authorize_url(
        &self,
        provider: OAuthProvider,
        redirect_to: &str,
        code_challenge: &str,
    ) -> String {
        format!(
            "{}?provider={}&redirect_to={}&code_challenge={}&code_challenge_method=s256\
            &access_type=offline&prompt=consent",
            self.endpoint("/authorize"),
            provider.as_str(),
            urlencoding::encode(redirect_to),
            urlencoding::encode(code_challenge),
        )
    }

    async fn exchange_code(
        &self,
        code: &str,
        code_verifier: &str,
    ) -> Result<AuthSession, SupabaseError> {
        let response = self
            .post("/token?grant_type=pkce")
            .json(&json!({ "auth_code": code, "code_verifier": code_verifier }))
            .send()
            .await?;

        let token: TokenResponse = parse(response).await?;
        token.into_session(now())
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<AuthSession, SupabaseError> {
        let response = self
            .post("/token?grant_type=password")
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?;

        let token: TokenResponse = parse(response).await?;
        token.into_session(now())
    }

    async fn refresh(&self, refresh_token: &str) -> Result<AuthSession, SupabaseError> {
        let response = self
            .post("/token?grant_type=refresh_token")
            .json(&json!({ "refresh_token": refresh_token }))
            .send()
            .await?;

        let token: TokenResponse = parse(response).await?;
        token.into_session(now())
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: &ProfileUpdate,
        redirect_to: &str,
    ) -> Result<SignUpOutcome, SupabaseError> {
        let response = self
            .post(&format!(
                "/signup?redirect_to={}",
                urlencoding::encode(redirect_to)
            ))
            .json(&json!({ "email": email, "password": password, "data": metadata }))
            .send()
            .await?;

        match parse(response).await? {
            SignUpResponse::Session(token) => token.into_session(now()).map(SignUpOutcome::Session),
            SignUpResponse::User(user) => user.try_into().map(SignUpOutcome::PendingConfirmation),
        }
    }

    async fn get_user(&self, access_token: &str) -> Result<AuthUser, SupabaseError> {
        let response = self
            .inner
            .client
            .get(self.endpoint("/user"))
            .header("apikey", self.inner.anon_key.expose_secret())
            .bearer_auth(access_token)
            .send()
            .await?;
        let user: UserResponse = parse(response).await?;
        user.try_into()
    }

    async fn update_user(
        &self,
        access_token: &str,
        metadata: &ProfileUpdate,
    ) -> Result<AuthUser, SupabaseError> {
        let response = self
            .inner
            .client
            .put(self.endpoint("/user"))
            .header("apikey", self.inner.anon_key.expose_secret())
            .bearer_auth(access_token)
            .json(&json!({ "data": metadata }))
            .send()
            .await?;
        let user: UserResponse = parse(response).await?;
        user.try_into()
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), SupabaseError> {
        let response = self
            .post("/logout")
            .bearer_auth(access_token)
            .send()
            .await?;
        expect_success(response).await
    }

    async fn reset_password(&self, email: &str, redirect_to: &str) -> Result<(), SupabaseError> {
        let response = self
            .post(&format!(
                "/recover?redirect_to={}",
                urlencoding::encode(redirect_to)
            ))
            .json(&json!({ "email": email }))
            .send()
            .await?;

        expect_success(response).await
    }
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

async fn api_error(response: Response) -> SupabaseError {
    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    let body: ErrorResponse = serde_json::from_str(&text).unwrap_or_default();

    let message = body.message().map_or_else(
        || {
            status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string()
        },
        str::to_owned,
    );

    SupabaseError::Api {
        status: status.as_u16(),
        code: body.code().map(str::to_owned),
        message,
    }
}

async fn parse<T: DeserializeOwned>(response: Response) -> Result<T, SupabaseError> {
    if !response.status().is_success() {
        return Err(api_error(response).await);
    }
    Ok(response.json().await?)
}

async fn expect_success(response: Response) -> Result<(), SupabaseError> {
    if response.status().is_success() {
        return Ok(());
    }
    Err(api_error(response).await)
}
