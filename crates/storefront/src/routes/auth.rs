//! Authentication route handlers.
//!
//! Handles login, registration, password recovery and logout against the
//! hosted auth backend. Failures come back to the form page as `error` and
//! `message` query parameters.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;

use super::redirect_with_cookies;
use crate::db::ProfileRepository;
use crate::error::{add_breadcrumb, clear_sentry_user, set_sentry_user};
use crate::middleware::{CspNonce, OptionalSession};
use crate::models::ProfileUpdate;
use crate::services::auth::AuthError;
use crate::services::auth_state::SignUpResult;
use crate::services::callback::login_redirect;
use crate::state::AppState;

// =============================================================================
// Form Types
// =============================================================================

/// Login form data.
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
    #[serde(default, rename = "redirectTo")]
    pub redirect_to: Option<String>,
}

/// Registration form data.
#[derive(Debug, Deserialize)]
pub struct RegisterForm {
    pub email: String,
    pub password: String,
    pub password_confirm: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
}

/// Forgot password form data.
#[derive(Debug, Deserialize)]
pub struct ForgotPasswordForm {
    pub email: String,
}

// =============================================================================
// Query Types
// =============================================================================

/// Query parameters for error/success display.
#[derive(Debug, Default, Deserialize)]
pub struct MessageQuery {
    pub error: Option<String>,
    pub message: Option<String>,
    pub success: Option<String>,
    #[serde(rename = "redirectTo")]
    pub redirect_to: Option<String>,
}

// =============================================================================
// Templates
// =============================================================================

/// Login page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/login.html")]
pub struct LoginTemplate {
    pub nonce: String,
    pub error: Option<String>,
    pub message: Option<String>,
    pub redirect_to: String,
}

/// Register page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/register.html")]
pub struct RegisterTemplate {
    pub nonce: String,
    pub error: Option<String>,
}

/// Forgot password page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/forgot_password.html")]
pub struct ForgotPasswordTemplate {
    pub nonce: String,
    pub error: Option<String>,
    pub success: Option<String>,
}

/// Only same-site absolute paths are followed after sign-in.
fn local_redirect(target: Option<&str>) -> &str {
    target
        .filter(|t| t.starts_with('/') && !t.starts_with("//") && !t.contains('\\'))
        .unwrap_or("/")
}

fn auth_failure(page: &str, error: &AuthError) -> Response {
    let location = login_redirect("", error.code(), &error.user_message())
        .replacen("/auth/login", page, 1);
    Redirect::to(&location).into_response()
}

// =============================================================================
// Login Routes
// =============================================================================

/// Display the login page.
pub async fn login_page(
    CspNonce(nonce): CspNonce,
    Query(query): Query<MessageQuery>,
) -> impl IntoResponse {
    LoginTemplate {
        nonce,
        error: query.error,
        message: query.message,
        redirect_to: local_redirect(query.redirect_to.as_deref()).to_string(),
    }
}

/// Handle login form submission.
pub async fn login(State(state): State<AppState>, Form(form): Form<LoginForm>) -> Response {
    let profiles = ProfileRepository::new(state.pool());

    match state.auth(&profiles).sign_in(&form.email, &form.password).await {
        Ok(signed_in) => {
            set_sentry_user(&signed_in.session.user.id, Some(signed_in.session.user.email.as_str()));
            add_breadcrumb("auth", "Signed in", None);
            redirect_with_cookies(local_redirect(form.redirect_to.as_deref()), &signed_in.cookies)
        }
        Err(e) => {
            tracing::warn!(error = %e, "Login failed");
            auth_failure("/auth/login", &e)
        }
    }
}

// =============================================================================
// Registration Routes
// =============================================================================

/// Display the registration page.
pub async fn register_page(
    CspNonce(nonce): CspNonce,
    Query(query): Query<MessageQuery>,
) -> impl IntoResponse {
    RegisterTemplate {
        nonce,
        error: query.message.or(query.error),
    }
}

/// Handle registration form submission.
///
/// Depending on the backend's confirmation setting the visitor is either
/// signed in straight away or asked to confirm their email first.
pub async fn register(State(state): State<AppState>, Form(form): Form<RegisterForm>) -> Response {
    if form.password != form.password_confirm {
        return auth_failure(
            "/auth/register",
            &AuthError::WeakPassword("Passwords do not match".to_string()),
        );
    }

    let metadata = ProfileUpdate {
        name: form.name,
        country: form.country,
        ..ProfileUpdate::default()
    };

    let profiles = ProfileRepository::new(state.pool());
    match state
        .auth(&profiles)
        .sign_up(&form.email, &form.password, metadata)
        .await
    {
        Ok(SignUpResult::SignedIn(signed_in)) => {
            set_sentry_user(&signed_in.session.user.id, Some(signed_in.session.user.email.as_str()));
            redirect_with_cookies("/", &signed_in.cookies)
        }
        Ok(SignUpResult::PendingConfirmation { email, .. }) => {
            let message = format!("Check {email} for a confirmation link");
            Redirect::to(&format!(
                "/auth/login?success=confirm_email&message={}",
                urlencoding::encode(&message)
            ))
            .into_response()
        }
        Err(e) => {
            tracing::warn!(error = %e, "Registration failed");
            auth_failure("/auth/register", &e)
        }
    }
}

// =============================================================================
// Password Recovery Routes
// =============================================================================

/// Display the forgot password page.
pub async fn forgot_password_page(
    CspNonce(nonce): CspNonce,
    Query(query): Query<MessageQuery>,
) -> impl IntoResponse {
    ForgotPasswordTemplate {
        nonce,
        error: query.message.or(query.error),
        success: query.success,
    }
}

/// Handle forgot password form submission.
///
/// Always reports success so the form can't be used to probe for accounts.
pub async fn forgot_password(
    State(state): State<AppState>,
    Form(form): Form<ForgotPasswordForm>,
) -> Response {
    let profiles = ProfileRepository::new(state.pool());
    match state.auth(&profiles).reset_password(&form.email).await {
        Ok(()) => {}
        Err(e @ AuthError::InvalidEmail(_)) => return auth_failure("/auth/forgot-password", &e),
        Err(e) => tracing::warn!(error = %e, "Password recovery request failed"),
    }

    Redirect::to("/auth/forgot-password?success=email_sent").into_response()
}

// =============================================================================
// Logout
// =============================================================================

/// Sign out and clear the auth cookies.
pub async fn logout(
    State(state): State<AppState>,
    OptionalSession(session): OptionalSession,
) -> Response {
    let profiles = ProfileRepository::new(state.pool());
    let cookies = state.auth(&profiles).sign_out(session.as_ref()).await;
    clear_sentry_user();
    redirect_with_cookies("/", &cookies)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_redirect_rejects_offsite_targets() {
        assert_eq!(local_redirect(Some("/orders/1")), "/orders/1");
        assert_eq!(local_redirect(Some("//evil.example")), "/");
        assert_eq!(local_redirect(Some("https://evil.example")), "/");
        assert_eq!(local_redirect(Some("/\\evil.example")), "/");
        assert_eq!(local_redirect(None), "/");
    }

    #[test]
    fn test_failures_land_on_the_submitting_page() {
        let response = auth_failure("/auth/register", &AuthError::UserAlreadyExists);
        let location = response.headers()["location"].to_str().unwrap_or_default();
        assert!(location.starts_with("/auth/register?error=user_already_exists&message="));
    }
}
