//! Integration tests for the QuardCube storefront.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p quardcube-integration-tests
//! ```
//!
//! The services are exercised against the in-memory fakes below, so no
//! database or auth backend is needed. Router tests build the full app on a
//! lazily connecting pool and only hit paths that never reach the database.
//!
//! # Test Files
//!
//! - `auth_flow` - sign-in, sign-up and profile provisioning
//! - `cart_checkout` - session cart through checkout
//! - `callback` - OAuth callback outcomes
//! - `guard` - route guard decisions and redirects through the router
//! - `orders` - order creation, stock and checkout
//! - `session_cookies` - session lookup, refresh and cookie clearing

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use secrecy::SecretString;
use sqlx::postgres::PgPoolOptions;

use quardcube_core::{Email, OrderId, Price, ProductId, UserId};
use quardcube_storefront::config::{
    AppEnv, CookiePolicy, EmailConfig, StorefrontConfig, SupabaseConfig,
};
use quardcube_storefront::db::{CatalogStore, OrderStore, ProfileStore, RepositoryError};
use quardcube_storefront::models::{
    AuthSession, AuthUser, CustomerDetails, NewOrder, NewProfile, Order, Product, ProfileUpdate,
    ShippingAddress, UserProfile,
};
use quardcube_storefront::services::auth::{AuthBackend, OAuthProvider, SignUpOutcome};
use quardcube_storefront::services::email::{EmailError, Mailer, OutgoingEmail};
use quardcube_storefront::state::AppState;
use quardcube_storefront::supabase::SupabaseError;

/// Password the fake backend accepts.
pub const PASSWORD: &str = "correct-horse";

/// Authorization code the fake backend refuses to exchange.
pub const REJECTED_CODE: &str = "expired-code";

pub const BASE_URL: &str = "http://localhost:3000";

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn api_error(status: u16, code: &str, message: &str) -> SupabaseError {
    SupabaseError::Api {
        status,
        code: Some(code.to_string()),
        message: message.to_string(),
    }
}

// =============================================================================
// Fixtures
// =============================================================================

/// A backend user with the given email.
///
/// # Panics
///
/// Panics if `email` is not a valid address.
#[must_use]
#[allow(clippy::unwrap_used)]
pub fn user(email: &str) -> AuthUser {
    AuthUser {
        id: UserId::generate(),
        email: Email::parse(email).unwrap(),
        display_name: Some("Amani Juma".to_string()),
        avatar_url: None,
        provider: Some("email".to_string()),
    }
}

#[must_use]
pub fn product(id: i32, name: &str, price_cents: i64, stock: i32) -> Product {
    Product {
        id: ProductId::new(id),
        name: name.to_string(),
        description: None,
        price: Price::from_cents(price_cents),
        stock,
        category: Some("boards".to_string()),
        rating: None,
        image: None,
    }
}

/// Checkout details with an optional customer email.
///
/// # Panics
///
/// Panics if `email` is not a valid address.
#[must_use]
#[allow(clippy::unwrap_used)]
pub fn customer(name: &str, email: Option<&str>) -> CustomerDetails {
    CustomerDetails {
        name: name.to_string(),
        email: email.map(|e| Email::parse(e).unwrap()),
        phone: Some("+255746624875".to_string()),
        shipping_address: ShippingAddress {
            street: "Samora Avenue".to_string(),
            city: "Dar es Salaam".to_string(),
            ..ShippingAddress::default()
        },
        payment_method: None,
    }
}

/// Configuration for an app that never leaves the process.
#[must_use]
pub fn test_config() -> StorefrontConfig {
    StorefrontConfig {
        database_url: SecretString::from("postgres://localhost/quardcube_test"),
        host: std::net::IpAddr::from([127, 0, 0, 1]),
        port: 0,
        base_url: BASE_URL.to_string(),
        environment: AppEnv::Development,
        supabase: SupabaseConfig {
            url: "http://127.0.0.1:9".to_string(),
            anon_key: SecretString::from("test-anon-key"),
        },
        email: EmailConfig {
            smtp_host: "localhost".to_string(),
            smtp_port: 2525,
            smtp_email: None,
            smtp_password: None,
            admin_email: "orders@quardcube.test".to_string(),
        },
        cookies: CookiePolicy::for_site(BASE_URL, AppEnv::Development),
        sentry_dsn: None,
        sentry_environment: None,
    }
}

/// App state on a pool that connects on first use.
///
/// Must be called inside a Tokio runtime.
///
/// # Panics
///
/// Panics if the state cannot be built.
#[must_use]
#[allow(clippy::unwrap_used)]
pub fn lazy_state() -> AppState {
    let config = test_config();
    let pool = PgPoolOptions::new()
        .max_connections(1)
        .connect_lazy("postgres://localhost/quardcube_test")
        .unwrap();
    AppState::new(config, pool).unwrap()
}

// =============================================================================
// Auth backend
// =============================================================================

/// In-process stand-in for the hosted auth backend.
///
/// Issued tokens are `access-N` / `refresh-N`. Access tokens stay valid until
/// signed out; refresh tokens are single use.
pub struct FakeAuthBackend {
    user: AuthUser,
    confirm_email: bool,
    issued: AtomicUsize,
    live_tokens: Mutex<HashSet<String>>,
    refresh_tokens: Mutex<HashSet<String>>,
    calls: Mutex<Vec<&'static str>>,
}

impl FakeAuthBackend {
    #[must_use]
    pub fn new(user: AuthUser) -> Self {
        Self {
            user,
            confirm_email: false,
            issued: AtomicUsize::new(0),
            live_tokens: Mutex::new(HashSet::new()),
            refresh_tokens: Mutex::new(HashSet::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Sign-ups wait for email confirmation instead of signing in.
    #[must_use]
    pub fn requiring_confirmation(mut self) -> Self {
        self.confirm_email = true;
        self
    }

    /// Accept `token` as a refresh token.
    #[must_use]
    pub fn with_refresh_token(self, token: &str) -> Self {
        lock(&self.refresh_tokens).insert(token.to_string());
        self
    }

    #[must_use]
    pub fn user(&self) -> &AuthUser {
        &self.user
    }

    /// Issue a live session directly.
    #[must_use]
    pub fn issue(&self) -> AuthSession {
        let n = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        let session = AuthSession {
            access_token: format!("access-{n}"),
            refresh_token: format!("refresh-{n}"),
            expires_at: Utc::now().timestamp() + 3600,
            user: self.user.clone(),
        };
        lock(&self.live_tokens).insert(session.access_token.clone());
        lock(&self.refresh_tokens).insert(session.refresh_token.clone());
        session
    }

    /// Backend operations called so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<&'static str> {
        lock(&self.calls).clone()
    }

    #[must_use]
    pub fn call_count(&self, operation: &str) -> usize {
        lock(&self.calls).iter().filter(|c| **c == operation).count()
    }

    fn record(&self, operation: &'static str) {
        lock(&self.calls).push(operation);
    }

    fn is_live(&self, access_token: &str) -> bool {
        lock(&self.live_tokens).contains(access_token)
    }
}

impl AuthBackend for FakeAuthBackend {
    fn authorize_url(
        &self,
        provider: OAuthProvider,
        redirect_to: &str,
        code_challenge: &str,
    ) -> String {
        self.record("authorize_url");
        format!(
            "https://auth.test/authorize?provider={provider}&redirect_to={redirect_to}\
             &code_challenge={code_challenge}&code_challenge_method=s256"
        )
    }

    async fn exchange_code(
        &self,
        code: &str,
        _code_verifier: &str,
    ) -> Result<AuthSession, SupabaseError> {
        self.record("exchange_code");
        if code == REJECTED_CODE {
            return Err(api_error(400, "bad_code_verifier", "invalid flow state"));
        }
        Ok(self.issue())
    }

    async fn sign_in_with_password(
        &self,
        _email: &str,
        password: &str,
    ) -> Result<AuthSession, SupabaseError> {
        self.record("sign_in_with_password");
        if password != PASSWORD {
            return Err(api_error(400, "invalid_credentials", "Invalid login credentials"));
        }
        Ok(self.issue())
    }

    async fn sign_up(
        &self,
        _email: &str,
        _password: &str,
        _metadata: &ProfileUpdate,
        _redirect_to: &str,
    ) -> Result<SignUpOutcome, SupabaseError> {
        self.record("sign_up");
        if self.confirm_email {
            return Ok(SignUpOutcome::PendingConfirmation(self.user.clone()));
        }
        Ok(SignUpOutcome::Session(self.issue()))
    }

    async fn refresh(&self, refresh_token: &str) -> Result<AuthSession, SupabaseError> {
        self.record("refresh");
        if !lock(&self.refresh_tokens).remove(refresh_token) {
            return Err(api_error(400, "refresh_token_not_found", "Invalid Refresh Token"));
        }
        Ok(self.issue())
    }

    async fn get_user(&self, access_token: &str) -> Result<AuthUser, SupabaseError> {
        self.record("get_user");
        if !self.is_live(access_token) {
            return Err(api_error(401, "bad_jwt", "invalid JWT"));
        }
        Ok(self.user.clone())
    }

    async fn update_user(
        &self,
        access_token: &str,
        metadata: &ProfileUpdate,
    ) -> Result<AuthUser, SupabaseError> {
        self.record("update_user");
        if !self.is_live(access_token) {
            return Err(api_error(401, "bad_jwt", "invalid JWT"));
        }
        Ok(AuthUser {
            display_name: metadata
                .name
                .clone()
                .or_else(|| self.user.display_name.clone()),
            avatar_url: metadata
                .avatar_url
                .clone()
                .or_else(|| self.user.avatar_url.clone()),
            ..self.user.clone()
        })
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), SupabaseError> {
        self.record("sign_out");
        lock(&self.live_tokens).remove(access_token);
        Ok(())
    }

    async fn reset_password(&self, _email: &str, _redirect_to: &str) -> Result<(), SupabaseError> {
        self.record("reset_password");
        Ok(())
    }
}

// =============================================================================
// Repositories
// =============================================================================

/// `user_profiles` in memory.
#[derive(Default)]
pub struct MemoryProfiles {
    rows: Mutex<HashMap<UserId, UserProfile>>,
    fail_writes: AtomicBool,
    writes: AtomicUsize,
}

impl MemoryProfiles {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every write fail from now on.
    pub fn fail_writes(&self) {
        self.fail_writes.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn get(&self, user_id: UserId) -> Option<UserProfile> {
        lock(&self.rows).get(&user_id).cloned()
    }

    /// Number of successful writes.
    #[must_use]
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn check_write(&self) -> Result<(), RepositoryError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(RepositoryError::Conflict("profile writes disabled".to_string()));
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl ProfileStore for MemoryProfiles {
    async fn find_profile(&self, user_id: UserId) -> Result<Option<UserProfile>, RepositoryError> {
        Ok(self.get(user_id))
    }

    async fn upsert_profile(&self, profile: &NewProfile) -> Result<UserProfile, RepositoryError> {
        self.check_write()?;
        let now = Utc::now();
        let mut rows = lock(&self.rows);
        let row = rows.entry(profile.user_id).or_insert_with(|| UserProfile {
            user_id: profile.user_id,
            email: profile.email.clone(),
            name: None,
            avatar_url: None,
            phone: None,
            street: None,
            city: None,
            state: None,
            country: profile.country.clone(),
            postal_code: None,
            created_at: now,
            updated_at: now,
        });
        row.email = profile.email.clone();
        row.name.clone_from(&profile.name);
        row.avatar_url.clone_from(&profile.avatar_url);
        row.updated_at = now;
        Ok(row.clone())
    }

    async fn update_profile(
        &self,
        user_id: UserId,
        email: &Email,
        update: &ProfileUpdate,
    ) -> Result<UserProfile, RepositoryError> {
        self.check_write()?;
        let now = Utc::now();
        let mut rows = lock(&self.rows);
        let row = rows.entry(user_id).or_insert_with(|| UserProfile {
            user_id,
            email: email.clone(),
            name: None,
            avatar_url: None,
            phone: None,
            street: None,
            city: None,
            state: None,
            country: None,
            postal_code: None,
            created_at: now,
            updated_at: now,
        });

        let merge = |slot: &mut Option<String>, value: &Option<String>| {
            if value.is_some() {
                slot.clone_from(value);
            }
        };
        merge(&mut row.name, &update.name);
        merge(&mut row.avatar_url, &update.avatar_url);
        merge(&mut row.country, &update.country);
        merge(&mut row.street, &update.street);
        merge(&mut row.city, &update.city);
        merge(&mut row.state, &update.state);
        merge(&mut row.postal_code, &update.postal_code);
        merge(&mut row.phone, &update.phone);
        row.updated_at = now;
        Ok(row.clone())
    }
}

/// `products` in memory. The decrement is conditional like the SQL one.
#[derive(Default)]
pub struct MemoryCatalog {
    products: Mutex<BTreeMap<ProductId, Product>>,
    fail_decrements: AtomicBool,
}

impl MemoryCatalog {
    #[must_use]
    pub fn new(products: Vec<Product>) -> Self {
        Self {
            products: Mutex::new(products.into_iter().map(|p| (p.id, p)).collect()),
            fail_decrements: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn stock_of(&self, id: ProductId) -> Option<i32> {
        lock(&self.products).get(&id).map(|p| p.stock)
    }

    pub fn set_stock(&self, id: ProductId, stock: i32) {
        if let Some(product) = lock(&self.products).get_mut(&id) {
            product.stock = stock;
        }
    }

    /// Rename or reprice a product after the fact.
    pub fn edit(&self, id: ProductId, name: &str, price: Price) {
        if let Some(product) = lock(&self.products).get_mut(&id) {
            product.name = name.to_string();
            product.price = price;
        }
    }

    pub fn fail_decrements(&self) {
        self.fail_decrements.store(true, Ordering::SeqCst);
    }
}

impl CatalogStore for MemoryCatalog {
    async fn product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        Ok(lock(&self.products).get(&id).cloned())
    }

    async fn products(&self, category: Option<&str>) -> Result<Vec<Product>, RepositoryError> {
        Ok(lock(&self.products)
            .values()
            .filter(|p| category.is_none_or(|c| p.category.as_deref() == Some(c)))
            .cloned()
            .collect())
    }

    async fn decrement_stock(
        &self,
        id: ProductId,
        quantity: u32,
    ) -> Result<Option<i32>, RepositoryError> {
        if self.fail_decrements.load(Ordering::SeqCst) {
            return Err(RepositoryError::NotFound);
        }
        let mut products = lock(&self.products);
        let Some(product) = products.get_mut(&id) else {
            return Ok(None);
        };
        let Ok(quantity) = i32::try_from(quantity) else {
            return Ok(None);
        };
        if product.stock < quantity {
            return Ok(None);
        }
        product.stock -= quantity;
        Ok(Some(product.stock))
    }
}

/// `orders` in memory.
#[derive(Default)]
pub struct MemoryOrders {
    rows: Mutex<Vec<Order>>,
    fail_inserts: AtomicBool,
}

impl MemoryOrders {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_inserts(&self) {
        self.fail_inserts.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn all(&self) -> Vec<Order> {
        lock(&self.rows).clone()
    }
}

impl OrderStore for MemoryOrders {
    async fn insert_order(&self, order: &NewOrder) -> Result<Order, RepositoryError> {
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(RepositoryError::Conflict("order insert disabled".to_string()));
        }
        let order = order.clone().into_order(Utc::now());
        lock(&self.rows).push(order.clone());
        Ok(order)
    }

    async fn orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError> {
        let mut orders: Vec<Order> = lock(&self.rows)
            .iter()
            .filter(|o| o.user_id == user_id)
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    async fn order_for_user(
        &self,
        user_id: UserId,
        order_id: OrderId,
    ) -> Result<Option<Order>, RepositoryError> {
        Ok(lock(&self.rows)
            .iter()
            .find(|o| o.user_id == user_id && o.id == order_id)
            .cloned())
    }

    async fn count_for_user(&self, user_id: UserId) -> Result<i64, RepositoryError> {
        let count = lock(&self.rows)
            .iter()
            .filter(|o| o.user_id == user_id)
            .count();
        Ok(i64::try_from(count).unwrap_or(i64::MAX))
    }
}

// =============================================================================
// Mail
// =============================================================================

/// Keeps every delivered email; optionally refuses one recipient.
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<OutgoingEmail>>,
    refuse: Mutex<Option<String>>,
}

impl RecordingMailer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every delivery to `recipient`.
    #[must_use]
    pub fn refusing(self, recipient: &str) -> Self {
        *lock(&self.refuse) = Some(recipient.to_string());
        self
    }

    #[must_use]
    pub fn sent(&self) -> Vec<OutgoingEmail> {
        lock(&self.sent).clone()
    }
}

impl Mailer for RecordingMailer {
    async fn deliver(&self, email: OutgoingEmail) -> Result<String, EmailError> {
        if lock(&self.refuse).as_deref() == Some(email.to.as_str()) {
            return Err(EmailError::InvalidAddress(email.to));
        }
        let mut sent = lock(&self.sent);
        sent.push(email);
        Ok(format!("<{}@quardcube.test>", sent.len()))
    }
}
