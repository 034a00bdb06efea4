//! Authentication extractors.
//!
//! The route guard resolves the visitor's session and leaves it in request
//! extensions; these extractors read it back out in handlers.

use axum::{
    Json,
    extract::FromRequestParts,
    http::{Method, StatusCode, request::Parts},
    response::{IntoResponse, Redirect, Response},
};
use serde_json::json;

use super::route_guard::login_redirect;
use crate::models::{AuthSession, SessionView};

/// Extractor that requires a signed-in user.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(RequireUser(view): RequireUser) -> impl IntoResponse {
///     format!("Hello, {}!", view.user.email)
/// }
/// ```
pub struct RequireUser(pub SessionView);

/// Extractor for the full session, tokens included. Only for handlers that
/// call the auth backend on the user's behalf.
pub struct RequireSession(pub AuthSession);

/// Extractor for the full session, if any. Never rejects.
pub struct OptionalSession(pub Option<AuthSession>);

/// Error returned when authentication is required but nobody is signed in.
pub enum AuthRejection {
    /// Redirect to login page (for page navigations).
    RedirectToLogin(String),
    /// Unauthorized response (for API calls and form posts).
    Unauthorized,
}

impl AuthRejection {
    fn for_request(parts: &Parts) -> Self {
        let path = parts.uri.path();
        if parts.method == Method::GET && !path.starts_with("/api/") {
            Self::RedirectToLogin(login_redirect(path))
        } else {
            Self::Unauthorized
        }
    }
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        match self {
            Self::RedirectToLogin(location) => Redirect::to(&location).into_response(),
            Self::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "error": "Please sign in to continue" })),
            )
                .into_response(),
        }
    }
}

impl<S> FromRequestParts<S> for RequireUser
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<SessionView>()
            .cloned()
            .map(Self)
            .ok_or_else(|| AuthRejection::for_request(parts))
    }
}

impl<S> FromRequestParts<S> for RequireSession
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthSession>()
            .cloned()
            .map(Self)
            .ok_or_else(|| AuthRejection::for_request(parts))
    }
}

impl<S> FromRequestParts<S> for OptionalSession
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(parts.extensions.get::<AuthSession>().cloned()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::Request;

    use super::*;

    fn parts(method: Method, uri: &str) -> Parts {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(())
            .unwrap()
            .into_parts()
            .0
    }

    #[tokio::test]
    async fn test_missing_user_redirects_page_navigation() {
        let mut parts = parts(Method::GET, "/account");
        let rejection = RequireUser::from_request_parts(&mut parts, &())
            .await
            .err()
            .unwrap();
        let response = rejection.into_response();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            response.headers()["location"],
            "/auth/login?redirectTo=/account"
        );
    }

    #[tokio::test]
    async fn test_missing_user_is_unauthorized_for_posts() {
        let mut parts = parts(Method::POST, "/cart/checkout");
        let rejection = RequireUser::from_request_parts(&mut parts, &())
            .await
            .err()
            .unwrap();
        assert_eq!(rejection.into_response().status(), StatusCode::UNAUTHORIZED);
    }
}
