//! Route guard.
//!
//! Every navigable request is classified by path before a handler runs:
//!
//! | class | paths | behavior |
//! |---|---|---|
//! | public | `/api`, `/static`, `/health`, `/favicon.ico`, `/auth/callback`, `/auth/oauth` | passed through, no session lookup |
//! | auth-only | `/auth/login`, `/auth/register`, `/auth/forgot-password` | signed-in visitors are sent to `/` |
//! | protected | `/account`, `/orders` | anonymous visitors are sent to the login page |
//! | open | everything else | rendered either way |
//!
//! Prefixes match whole path segments: `/orders` covers `/orders/…` but not
//! `/ordersx`.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};

use crate::db::ProfileRepository;
use crate::error::{clear_sentry_user, set_sentry_user};
use crate::services::session::{RequestCookies, append_cookies};
use crate::state::AppState;

const PUBLIC_PREFIXES: &[&str] = &[
    "/api",
    "/static",
    "/health",
    "/favicon.ico",
    "/auth/callback",
    "/auth/oauth",
];

const AUTH_ONLY_PREFIXES: &[&str] = &["/auth/login", "/auth/register", "/auth/forgot-password"];

const PROTECTED_PREFIXES: &[&str] = &["/account", "/orders"];

/// Where anonymous visitors are sent.
pub const LOGIN_PATH: &str = "/auth/login";

/// How the guard treats a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteClass {
    Public,
    AuthOnly,
    Protected,
    Open,
}

/// What the guard does with a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    /// Skip the session lookup entirely.
    Bypass,
    /// Run the handler.
    Allow,
    /// Redirect to the given location.
    Redirect(String),
}

/// Whether `path` is `prefix` or lies below it.
fn has_segment_prefix(path: &str, prefix: &str) -> bool {
    path.strip_prefix(prefix)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}

fn matches_any(path: &str, prefixes: &[&str]) -> bool {
    prefixes.iter().any(|prefix| has_segment_prefix(path, prefix))
}

/// Classify a request path. Public wins over auth-only, auth-only over
/// protected.
#[must_use]
pub fn classify(path: &str) -> RouteClass {
    if matches_any(path, PUBLIC_PREFIXES) {
        RouteClass::Public
    } else if matches_any(path, AUTH_ONLY_PREFIXES) {
        RouteClass::AuthOnly
    } else if matches_any(path, PROTECTED_PREFIXES) {
        RouteClass::Protected
    } else {
        RouteClass::Open
    }
}

/// `/auth/login?redirectTo=<path>`, keeping slashes readable.
#[must_use]
pub fn login_redirect(path: &str) -> String {
    let target = urlencoding::encode(path).replace("%2F", "/");
    format!("{LOGIN_PATH}?redirectTo={target}")
}

/// Decide what to do with `path` for a visitor who is (or isn't) signed in.
#[must_use]
pub fn decide(path: &str, signed_in: bool) -> GuardDecision {
    match classify(path) {
        RouteClass::Public => GuardDecision::Bypass,
        RouteClass::AuthOnly if signed_in => GuardDecision::Redirect("/".to_string()),
        RouteClass::Protected if !signed_in => GuardDecision::Redirect(login_redirect(path)),
        RouteClass::AuthOnly | RouteClass::Protected | RouteClass::Open => GuardDecision::Allow,
    }
}

/// Resolve the visitor's session and enforce [`decide`].
///
/// On success the [`crate::models::SessionView`] and
/// [`crate::models::AuthSession`] are inserted into request extensions for
/// the auth extractors. Cookies refreshed during the lookup are attached to
/// whatever response goes out.
pub async fn route_guard(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let path = request.uri().path().to_owned();
    if classify(&path) == RouteClass::Public {
        return next.run(request).await;
    }

    let cookies = RequestCookies::from_headers(request.headers());
    let profiles = ProfileRepository::new(state.pool());

    let (session, refreshed) = match state.auth(&profiles).resolve(&cookies).await {
        Ok(resolved) => (resolved.session, resolved.cookies),
        Err(e) => {
            tracing::warn!(error = %e, path = %path, "Session lookup failed, treating as signed out");
            (None, Vec::new())
        }
    };

    let mut response = match decide(&path, session.is_some()) {
        GuardDecision::Redirect(location) => {
            tracing::debug!(path = %path, location = %location, "Route guard redirect");
            Redirect::to(&location).into_response()
        }
        GuardDecision::Bypass | GuardDecision::Allow => {
            match session {
                Some(session) => {
                    set_sentry_user(&session.user.id, Some(session.user.email.as_str()));
                    request.extensions_mut().insert(session.view());
                    request.extensions_mut().insert(session);
                }
                None => clear_sentry_user(),
            }
            next.run(request).await
        }
    };

    append_cookies(response.headers_mut(), &refreshed);
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification_precedence() {
        assert_eq!(classify("/api/products"), RouteClass::Public);
        assert_eq!(classify("/auth/callback"), RouteClass::Public);
        assert_eq!(classify("/auth/oauth/google"), RouteClass::Public);
        assert_eq!(classify("/auth/login"), RouteClass::AuthOnly);
        assert_eq!(classify("/orders"), RouteClass::Protected);
        assert_eq!(classify("/orders/5/invoice"), RouteClass::Protected);
        assert_eq!(classify("/cart"), RouteClass::Open);
        assert_eq!(classify("/"), RouteClass::Open);
    }

    #[test]
    fn test_prefixes_match_whole_segments() {
        assert_eq!(classify("/ordersx"), RouteClass::Open);
        assert_eq!(classify("/accounting"), RouteClass::Open);
        assert_eq!(classify("/apis"), RouteClass::Open);
        assert_eq!(classify("/auth/login-help"), RouteClass::Open);
    }

    #[test]
    fn test_protected_redirects_anonymous_to_login() {
        assert_eq!(
            decide("/orders", false),
            GuardDecision::Redirect("/auth/login?redirectTo=/orders".to_string())
        );
        assert_eq!(decide("/orders", true), GuardDecision::Allow);
    }

    #[test]
    fn test_auth_only_redirects_signed_in_home() {
        assert_eq!(
            decide("/auth/register", true),
            GuardDecision::Redirect("/".to_string())
        );
        assert_eq!(decide("/auth/register", false), GuardDecision::Allow);
    }

    #[test]
    fn test_public_bypasses_regardless_of_session() {
        assert_eq!(decide("/health", true), GuardDecision::Bypass);
        assert_eq!(decide("/static/app.css", false), GuardDecision::Bypass);
    }

    #[test]
    fn test_login_redirect_encodes_unsafe_characters() {
        assert_eq!(
            login_redirect("/account/a b"),
            "/auth/login?redirectTo=/account/a%20b"
        );
    }
}
