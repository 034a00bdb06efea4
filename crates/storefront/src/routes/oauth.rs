//! OAuth sign-in with PKCE.
//!
//! `GET /auth/oauth/{provider}` stores a fresh code verifier in a short-lived
//! cookie and sends the visitor to the provider. The provider comes back to
//! `GET /auth/callback`, where the code and verifier are exchanged for a
//! session.

use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    response::{IntoResponse, Redirect, Response},
};

use super::redirect_with_cookies;
use crate::db::ProfileRepository;
use crate::services::auth::OAuthProvider;
use crate::services::callback::{CallbackParams, login_redirect};
use crate::services::session::RequestCookies;
use crate::state::AppState;

/// Start an OAuth sign-in.
pub async fn start(State(state): State<AppState>, Path(provider): Path<String>) -> Response {
    let provider = match provider.parse::<OAuthProvider>() {
        Ok(provider) => provider,
        Err(e) => {
            tracing::warn!(error = %e, "OAuth start for unknown provider");
            return Redirect::to(&login_redirect("", e.code(), &e.user_message())).into_response();
        }
    };

    let profiles = ProfileRepository::new(state.pool());
    let redirect = state.auth(&profiles).sign_in_with_provider(provider);
    tracing::info!(provider = %provider, "Starting OAuth sign-in");

    redirect_with_cookies(&redirect.location, &[redirect.verifier_cookie])
}

/// Finish an OAuth sign-in.
pub async fn callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<CallbackParams>,
) -> Response {
    let cookies = RequestCookies::from_headers(&headers);
    let profiles = ProfileRepository::new(state.pool());
    let outcome = state
        .auth(&profiles)
        .handle_callback(params, &cookies)
        .await;

    redirect_with_cookies(&outcome.location, &outcome.cookies)
}
