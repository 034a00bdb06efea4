//! Session middleware configuration.
//!
//! Sets up `PostgreSQL`-backed sessions using tower-sessions. The session
//! holds the visitor's cart; auth tokens live in their own cookies.

use sqlx::PgPool;
use tower_sessions::cookie::{SameSite, time::Duration};
use tower_sessions::{Expiry, SessionManagerLayer};
use tower_sessions_sqlx_store::PostgresStore;

use crate::config::CookiePolicy;

/// Session cookie name.
pub const SESSION_COOKIE_NAME: &str = "qc_session";

/// Carts survive 30 days of inactivity.
const SESSION_EXPIRY_DAYS: i64 = 30;

/// Create the session layer with `PostgreSQL` store.
///
/// The `tower_sessions.session` table is created by `qc-cli migrate`.
#[must_use]
pub fn create_session_layer(
    pool: &PgPool,
    policy: &CookiePolicy,
) -> SessionManagerLayer<PostgresStore> {
    let store = PostgresStore::new(pool.clone());

    let layer = SessionManagerLayer::new(store)
        .with_name(SESSION_COOKIE_NAME)
        .with_expiry(Expiry::OnInactivity(Duration::days(SESSION_EXPIRY_DAYS)))
        .with_secure(policy.secure)
        .with_same_site(SameSite::Lax)
        .with_http_only(true)
        .with_path("/");

    match &policy.domain {
        Some(domain) => layer.with_domain(domain.clone()),
        None => layer,
    }
}
