//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::StorefrontConfig;
use crate::db::{OrderRepository, ProductRepository, ProfileRepository};
use crate::services::auth_state::AuthService;
use crate::services::email::EmailService;
use crate::services::orders::OrderService;
use crate::services::profiles::ProfileProvisioner;
use crate::services::session::SessionStore;
use crate::supabase::AuthClient;

/// Error creating the application state.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("smtp configuration error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
}

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like database connections and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    pool: PgPool,
    sessions: SessionStore<AuthClient>,
    provisioner: ProfileProvisioner,
    mailer: EmailService,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Errors
    ///
    /// Returns an error if the SMTP transport cannot be configured.
    pub fn new(config: StorefrontConfig, pool: PgPool) -> Result<Self, StateError> {
        let sessions = SessionStore::new(AuthClient::new(&config.supabase), config.cookies.clone());
        let mailer = EmailService::new(&config.email)?;

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                sessions,
                provisioner: ProfileProvisioner::new(),
                mailer,
            }),
        })
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Session adapter over the auth backend.
    #[must_use]
    pub fn sessions(&self) -> &SessionStore<AuthClient> {
        &self.inner.sessions
    }

    #[must_use]
    pub fn provisioner(&self) -> &ProfileProvisioner {
        &self.inner.provisioner
    }

    #[must_use]
    pub fn mailer(&self) -> &EmailService {
        &self.inner.mailer
    }

    /// Account operations backed by `profiles`.
    #[must_use]
    pub fn auth<'a>(
        &'a self,
        profiles: &'a ProfileRepository<'a>,
    ) -> AuthService<'a, AuthClient, ProfileRepository<'a>> {
        AuthService::new(
            self.sessions(),
            self.provisioner(),
            profiles,
            &self.config().base_url,
        )
    }

    /// Order creation against the database and configured mailer.
    #[must_use]
    pub fn orders<'a>(
        &'a self,
        catalog: &'a ProductRepository<'a>,
        orders: &'a OrderRepository<'a>,
    ) -> OrderService<'a, ProductRepository<'a>, OrderRepository<'a>, EmailService> {
        OrderService::new(catalog, orders, self.mailer(), &self.config().email.admin_email)
    }
}
