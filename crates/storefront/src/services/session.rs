//! Session store adapter.
//!
//! Auth sessions live in three cookies rather than in the server-side
//! session table, so the backend's tokens survive server restarts and work
//! across the apex and `www` hosts:
//!
//! | cookie | content | max-age |
//! |---|---|---|
//! | `sb-auth-token` | access token (JWT) | 7 days |
//! | `sb-refresh-token` | refresh token | 30 days |
//! | `sb-code-verifier` | PKCE verifier during an OAuth round trip | 10 minutes |
//!
//! Every cookie gets its attributes from the one [`CookiePolicy`] computed
//! at startup.

use axum::http::{HeaderMap, HeaderValue, header};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::Deserialize;
use tokio::sync::broadcast;
use tower_sessions::cookie::time::Duration;
use tower_sessions::cookie::{Cookie, SameSite};

use quardcube_core::{Email, UserId};

use crate::config::CookiePolicy;
use crate::models::{AuthSession, ProfileUpdate};
use crate::services::auth::{AuthBackend, AuthError, SignUpOutcome, validate_password};
use crate::supabase::SupabaseError;

/// Cookie holding the access token.
pub const ACCESS_TOKEN_COOKIE: &str = "sb-auth-token";
/// Cookie holding the refresh token.
pub const REFRESH_TOKEN_COOKIE: &str = "sb-refresh-token";
/// Cookie holding the PKCE verifier between redirect and callback.
pub const CODE_VERIFIER_COOKIE: &str = "sb-code-verifier";

const ACCESS_TOKEN_MAX_AGE: i64 = 7 * 24 * 60 * 60;
const REFRESH_TOKEN_MAX_AGE: i64 = 30 * 24 * 60 * 60;
const CODE_VERIFIER_MAX_AGE: i64 = 10 * 60;

const EVENT_CAPACITY: usize = 64;

/// Session lifecycle notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthEvent {
    SignedIn(UserId),
    SignedOut,
    TokenRefreshed(UserId),
}

/// Log session events until every [`SessionStore`] sender is gone.
pub async fn log_events(mut events: broadcast::Receiver<AuthEvent>) {
    loop {
        match events.recv().await {
            Ok(AuthEvent::SignedIn(user_id)) => tracing::info!(user_id = %user_id, "Auth: signed in"),
            Ok(AuthEvent::TokenRefreshed(user_id)) => {
                tracing::debug!(user_id = %user_id, "Auth: token refreshed");
            }
            Ok(AuthEvent::SignedOut) => tracing::info!("Auth: signed out"),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Auth event log fell behind");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

/// The auth cookies sent with a request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestCookies {
    access_token: Option<String>,
    refresh_token: Option<String>,
    code_verifier: Option<String>,
}

impl RequestCookies {
    /// Collect the auth cookies from every `Cookie` header.
    #[must_use]
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let mut cookies = Self::default();

        for value in headers.get_all(header::COOKIE) {
            let Ok(value) = value.to_str() else {
                continue;
            };
            for cookie in Cookie::split_parse(value).flatten() {
                let slot = match cookie.name() {
                    ACCESS_TOKEN_COOKIE => &mut cookies.access_token,
                    REFRESH_TOKEN_COOKIE => &mut cookies.refresh_token,
                    CODE_VERIFIER_COOKIE => &mut cookies.code_verifier,
                    _ => continue,
                };
                if !cookie.value().is_empty() {
                    *slot = Some(cookie.value().to_string());
                }
            }
        }

        cookies
    }

    /// Build from raw values (tests and non-HTTP callers).
    #[must_use]
    pub const fn new(
        access_token: Option<String>,
        refresh_token: Option<String>,
        code_verifier: Option<String>,
    ) -> Self {
        Self {
            access_token,
            refresh_token,
            code_verifier,
        }
    }

    #[must_use]
    pub fn access_token(&self) -> Option<&str> {
        self.access_token.as_deref()
    }

    #[must_use]
    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref()
    }

    #[must_use]
    pub fn code_verifier(&self) -> Option<&str> {
        self.code_verifier.as_deref()
    }
}

/// Outcome of resolving the request's session.
///
/// `cookies` must be attached to the response: they carry refreshed tokens
/// or clear cookies the backend no longer accepts.
#[derive(Debug, Default)]
pub struct SessionLookup {
    pub session: Option<AuthSession>,
    pub cookies: Vec<Cookie<'static>>,
}

/// Reads, refreshes and writes auth sessions.
pub struct SessionStore<B> {
    backend: B,
    policy: CookiePolicy,
    events: broadcast::Sender<AuthEvent>,
}

impl<B: AuthBackend> SessionStore<B> {
    /// Create a store writing cookies according to `policy`.
    #[must_use]
    pub fn new(backend: B, policy: CookiePolicy) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            backend,
            policy,
            events,
        }
    }

    /// The auth backend.
    #[must_use]
    pub const fn backend(&self) -> &B {
        &self.backend
    }

    /// Subscribe to sign-in, sign-out and refresh events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: AuthEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    /// Resolve the session carried by the request cookies.
    ///
    /// A live access token is validated against the backend. An expired or
    /// rejected one is replaced through the refresh grant; the new cookies
    /// are returned in [`SessionLookup::cookies`]. A rejected refresh token
    /// clears the auth cookies.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Backend` if the backend cannot be reached or fails
    /// with a server error.
    pub async fn get_session(&self, cookies: &RequestCookies) -> Result<SessionLookup, AuthError> {
        let now = chrono::Utc::now().timestamp();

        if let Some(access_token) = cookies.access_token() {
            let expires_at = token_expiry(access_token);

            if expires_at.is_none_or(|exp| exp > now) {
                match self.backend.get_user(access_token).await {
                    Ok(user) => {
                        let session = AuthSession {
                            access_token: access_token.to_string(),
                            refresh_token: cookies.refresh_token.clone().unwrap_or_default(),
                            expires_at: expires_at.unwrap_or(now),
                            user,
                        };
                        return Ok(SessionLookup {
                            session: Some(session),
                            cookies: Vec::new(),
                        });
                    }
                    Err(e) if e.is_unauthorized() => {
                        tracing::debug!(error = %e, "Access token rejected, trying refresh");
                    }
                    Err(e) => return Err(e.into()),
                }
            }
        }

        let Some(refresh_token) = cookies.refresh_token() else {
            let cookies = if cookies.access_token().is_some() {
                self.clear_cookies()
            } else {
                Vec::new()
            };
            return Ok(SessionLookup {
                session: None,
                cookies,
            });
        };

        match self.backend.refresh(refresh_token).await {
            Ok(session) => {
                tracing::debug!(user_id = %session.user.id, "Refreshed auth session");
                self.emit(AuthEvent::TokenRefreshed(session.user.id));
                Ok(SessionLookup {
                    cookies: self.session_cookies(&session),
                    session: Some(session),
                })
            }
            Err(e) if e.is_client_error() => {
                tracing::info!(error = %e, "Refresh token rejected, clearing auth cookies");
                Ok(SessionLookup {
                    session: None,
                    cookies: self.clear_cookies(),
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Complete an OAuth round trip.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::MissingVerifier` without contacting the backend
    /// when no verifier is present, and `AuthError::CodeExchange` when the
    /// backend refuses the code.
    pub async fn exchange_code(
        &self,
        code: &str,
        code_verifier: Option<&str>,
    ) -> Result<AuthSession, AuthError> {
        let code_verifier = code_verifier
            .filter(|v| !v.is_empty())
            .ok_or(AuthError::MissingVerifier)?;

        let session = self
            .backend
            .exchange_code(code, code_verifier)
            .await
            .map_err(|e| match e {
                SupabaseError::Api { message, .. } => AuthError::CodeExchange(message),
                other => AuthError::Backend(other),
            })?;

        self.emit(AuthEvent::SignedIn(session.user.id));
        Ok(session)
    }

    /// Sign in with email and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidEmail` for a malformed email and
    /// `AuthError::InvalidCredentials` when the backend refuses the pair.
    pub async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<AuthSession, AuthError> {
        let email = Email::parse(email)?;

        let session = self
            .backend
            .sign_in_with_password(email.as_str(), password)
            .await
            .map_err(|e| match e.status() {
                Some(400 | 401) => AuthError::InvalidCredentials,
                _ => AuthError::Backend(e),
            })?;

        self.emit(AuthEvent::SignedIn(session.user.id));
        Ok(session)
    }

    /// Register an account.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidEmail`, `AuthError::WeakPassword` or
    /// `AuthError::UserAlreadyExists` for the corresponding rejections.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: &ProfileUpdate,
        redirect_to: &str,
    ) -> Result<SignUpOutcome, AuthError> {
        let email = Email::parse(email)?;
        validate_password(password)?;

        let outcome = self
            .backend
            .sign_up(email.as_str(), password, metadata, redirect_to)
            .await
            .map_err(sign_up_error)?;

        if let SignUpOutcome::Session(session) = &outcome {
            self.emit(AuthEvent::SignedIn(session.user.id));
        }
        Ok(outcome)
    }

    /// End the session and return the cookies that clear it.
    ///
    /// The local sign-out always happens; a backend failure to revoke the
    /// refresh token is only logged.
    pub async fn sign_out(&self, session: Option<&AuthSession>) -> Vec<Cookie<'static>> {
        if let Some(session) = session
            && let Err(e) = self.backend.sign_out(&session.access_token).await
        {
            tracing::warn!(user_id = %session.user.id, error = %e, "Backend sign-out failed");
        }

        self.emit(AuthEvent::SignedOut);
        self.clear_cookies()
    }

    // =========================================================================
    // Cookies
    // =========================================================================

    fn cookie(&self, name: &'static str, value: String, max_age: i64) -> Cookie<'static> {
        let mut builder = Cookie::build((name, value))
            .path("/")
            .same_site(SameSite::Lax)
            .secure(self.policy.secure)
            .http_only(true)
            .max_age(Duration::seconds(max_age));

        if let Some(domain) = &self.policy.domain {
            builder = builder.domain(domain.clone());
        }

        builder.build()
    }

    /// Cookies persisting `session`.
    #[must_use]
    pub fn session_cookies(&self, session: &AuthSession) -> Vec<Cookie<'static>> {
        vec![
            self.cookie(
                ACCESS_TOKEN_COOKIE,
                session.access_token.clone(),
                ACCESS_TOKEN_MAX_AGE,
            ),
            self.cookie(
                REFRESH_TOKEN_COOKIE,
                session.refresh_token.clone(),
                REFRESH_TOKEN_MAX_AGE,
            ),
        ]
    }

    /// Cookie holding a PKCE verifier for the OAuth round trip.
    #[must_use]
    pub fn verifier_cookie(&self, verifier: &str) -> Cookie<'static> {
        self.cookie(
            CODE_VERIFIER_COOKIE,
            verifier.to_string(),
            CODE_VERIFIER_MAX_AGE,
        )
    }

    /// Cookie removing the PKCE verifier.
    #[must_use]
    pub fn clear_verifier_cookie(&self) -> Cookie<'static> {
        self.cookie(CODE_VERIFIER_COOKIE, String::new(), 0)
    }

    /// Cookies removing the access and refresh tokens.
    #[must_use]
    pub fn clear_cookies(&self) -> Vec<Cookie<'static>> {
        vec![
            self.cookie(ACCESS_TOKEN_COOKIE, String::new(), 0),
            self.cookie(REFRESH_TOKEN_COOKIE, String::new(), 0),
        ]
    }
}

fn sign_up_error(err: SupabaseError) -> AuthError {
    if let SupabaseError::Api {
        status,
        code,
        message,
    } = &err
    {
        let code = code.as_deref().unwrap_or_default();
        if code == "user_already_exists"
            || code == "email_exists"
            || message.to_ascii_lowercase().contains("already registered")
        {
            return AuthError::UserAlreadyExists;
        }
        if code == "weak_password" || (*status == 422 && message.contains("assword")) {
            return AuthError::WeakPassword(message.clone());
        }
    }
    AuthError::Backend(err)
}

/// The `exp` claim of a JWT. The signature is not checked here.
fn token_expiry(token: &str) -> Option<i64> {
    #[derive(Deserialize)]
    struct Claims {
        exp: i64,
    }

    let payload = token.split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD.decode(payload).ok()?;
    serde_json::from_slice::<Claims>(&bytes)
        .ok()
        .map(|c| c.exp)
}

/// Append `Set-Cookie` headers. Cookies that cannot be encoded as a header
/// value are logged and skipped.
pub fn append_cookies(headers: &mut HeaderMap, cookies: &[Cookie<'_>]) {
    for cookie in cookies {
        match HeaderValue::from_str(&cookie.to_string()) {
            Ok(value) => {
                headers.append(header::SET_COOKIE, value);
            }
            Err(e) => {
                tracing::error!(cookie = cookie.name(), error = %e, "Failed to encode cookie");
            }
        }
    }
}
