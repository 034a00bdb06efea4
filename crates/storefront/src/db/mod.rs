//! Database operations for storefront `PostgreSQL`.
//!
//! # Tables
//!
//! - `user_profiles` - One row per auth user, created lazily on first sign-in
//! - `products` - The catalog, with stock counts
//! - `orders` - Placed orders with JSON line-item and address snapshots
//! - `tower_sessions.session` - tower-sessions storage (carts)
//!
//! # Migrations
//!
//! Migrations are stored in `crates/storefront/migrations/` and run via:
//! ```bash
//! cargo run -p quardcube-cli -- migrate
//! ```
//!
//! Services are written against the [`ProfileStore`], [`CatalogStore`] and
//! [`OrderStore`] traits; the `*Repository` types are the `PostgreSQL`
//! implementations.

pub mod orders;
pub mod products;
pub mod profiles;

use std::future::Future;
use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use quardcube_core::{Email, OrderId, ProductId, UserId};

use crate::models::{NewOrder, NewProfile, Order, Product, ProfileUpdate, UserProfile};

pub use orders::OrderRepository;
pub use products::{NewProduct, ProductRepository};
pub use profiles::ProfileRepository;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., duplicate id).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

impl RepositoryError {
    /// Map unique violations to `Conflict`, everything else to `Database`.
    pub(crate) fn from_insert(err: sqlx::Error, what: &str) -> Self {
        if let sqlx::Error::Database(ref db_err) = err
            && db_err.is_unique_violation()
        {
            return Self::Conflict(format!("{what} already exists"));
        }
        Self::Database(err)
    }
}

/// User profile persistence.
pub trait ProfileStore: Send + Sync {
    fn find_profile(
        &self,
        user_id: UserId,
    ) -> impl Future<Output = Result<Option<UserProfile>, RepositoryError>> + Send;

    /// Insert the profile, or refresh email/name/avatar on an existing row.
    fn upsert_profile(
        &self,
        profile: &NewProfile,
    ) -> impl Future<Output = Result<UserProfile, RepositoryError>> + Send;

    /// Apply the non-empty fields of `update`, creating the row if needed.
    fn update_profile(
        &self,
        user_id: UserId,
        email: &Email,
        update: &ProfileUpdate,
    ) -> impl Future<Output = Result<UserProfile, RepositoryError>> + Send;
}

/// Catalog reads and stock writes.
pub trait CatalogStore: Send + Sync {
    fn product(
        &self,
        id: ProductId,
    ) -> impl Future<Output = Result<Option<Product>, RepositoryError>> + Send;

    fn products(
        &self,
        category: Option<&str>,
    ) -> impl Future<Output = Result<Vec<Product>, RepositoryError>> + Send;

    /// Subtract `quantity` from stock if enough is left.
    ///
    /// Returns the remaining stock, or `None` when the current stock no longer
    /// covers `quantity` (nothing is written in that case).
    fn decrement_stock(
        &self,
        id: ProductId,
        quantity: u32,
    ) -> impl Future<Output = Result<Option<i32>, RepositoryError>> + Send;
}

/// Order persistence.
pub trait OrderStore: Send + Sync {
    fn insert_order(
        &self,
        order: &NewOrder,
    ) -> impl Future<Output = Result<Order, RepositoryError>> + Send;

    /// A user's orders, newest first.
    fn orders_for_user(
        &self,
        user_id: UserId,
    ) -> impl Future<Output = Result<Vec<Order>, RepositoryError>> + Send;

    fn order_for_user(
        &self,
        user_id: UserId,
        order_id: OrderId,
    ) -> impl Future<Output = Result<Option<Order>, RepositoryError>> + Send;

    fn count_for_user(
        &self,
        user_id: UserId,
    ) -> impl Future<Output = Result<i64, RepositoryError>> + Send;
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
