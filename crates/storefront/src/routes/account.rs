//! Account route handlers.
//!
//! These routes require authentication.

use axum::{Json, extract::State};
use serde::Serialize;

use crate::db::{ProfileRepository, ProfileStore};
use crate::error::Result;
use crate::middleware::{RequireSession, RequireUser};
use crate::models::{AuthUser, ProfileUpdate, UserProfile};
use crate::services::auth_state::ProfileUpdated;
use crate::state::AppState;

/// Account overview.
#[derive(Debug, Serialize)]
pub struct AccountView {
    pub user: AuthUser,
    /// Absent until provisioning has succeeded once.
    pub profile: Option<UserProfile>,
}

/// Show the signed-in user and their profile.
pub async fn index(
    State(state): State<AppState>,
    RequireUser(view): RequireUser,
) -> Result<Json<AccountView>> {
    let profile = ProfileRepository::new(state.pool())
        .find_profile(view.user.id)
        .await?;

    Ok(Json(AccountView {
        user: view.user,
        profile,
    }))
}

/// Update the profile (backend metadata first, then the profile row).
pub async fn update_profile(
    State(state): State<AppState>,
    RequireSession(session): RequireSession,
    Json(update): Json<ProfileUpdate>,
) -> Result<Json<ProfileUpdated>> {
    let profiles = ProfileRepository::new(state.pool());
    let updated = state
        .auth(&profiles)
        .update_profile(&session, update)
        .await?;

    tracing::info!(user_id = %updated.user.id, "Profile updated");
    Ok(Json(updated))
}
