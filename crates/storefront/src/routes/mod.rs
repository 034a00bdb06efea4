//! HTTP route handlers for storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                     - Liveness
//! GET  /health/ready               - Readiness (database)
//!
//! # Auth
//! GET  /auth/login                 - Login page
//! POST /auth/login                 - Password sign-in
//! GET  /auth/register              - Register page
//! POST /auth/register              - Sign-up
//! GET  /auth/forgot-password       - Forgot password page
//! POST /auth/forgot-password       - Send recovery email
//! POST /auth/logout                - Sign out
//! GET  /auth/oauth/{provider}      - Start OAuth (PKCE)
//! GET  /auth/callback              - OAuth callback
//!
//! # Catalog (JSON)
//! GET  /api/products               - Product list (?category=)
//! GET  /api/products/{id}          - Product detail
//!
//! # Cart (JSON, session-backed)
//! GET  /cart                       - Cart contents
//! POST /cart/add                   - Add a product
//! POST /cart/update                - Set a line's quantity
//! POST /cart/remove                - Remove a line
//! POST /cart/clear                 - Empty the cart
//! GET  /cart/count                 - Item count badge
//! POST /cart/checkout              - One order per cart line
//!
//! # Orders (signed in)
//! GET  /orders                     - Order history
//! POST /orders                     - Place a single-product order
//! GET  /orders/count               - Order count badge
//! GET  /orders/{id}                - Order detail
//! GET  /orders/{id}/invoice        - Printable invoice (HTML)
//!
//! # Account (signed in)
//! GET  /account                    - User and profile
//! POST /account/profile            - Update profile
//!
//! # Contact
//! POST /contact                    - Contact form
//! POST /newsletter                 - Newsletter signup
//! ```

pub mod account;
pub mod auth;
pub mod cart;
pub mod contact;
pub mod oauth;
pub mod orders;
pub mod products;

use axum::{
    Router,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
};
use tower_sessions::cookie::Cookie;

use crate::services::session::append_cookies;
use crate::state::AppState;

/// Redirect that also sets (or clears) cookies.
pub(crate) fn redirect_with_cookies(location: &str, cookies: &[Cookie<'_>]) -> Response {
    let mut response = Redirect::to(location).into_response();
    append_cookies(response.headers_mut(), cookies);
    response
}

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/login", get(auth::login_page).post(auth::login))
        .route("/register", get(auth::register_page).post(auth::register))
        .route(
            "/forgot-password",
            get(auth::forgot_password_page).post(auth::forgot_password),
        )
        .route("/logout", post(auth::logout))
        .route("/oauth/{provider}", get(oauth::start))
        .route("/callback", get(oauth::callback))
}

/// Create the product API router.
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(products::index))
        .route("/{id}", get(products::show))
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show))
        .route("/add", post(cart::add))
        .route("/update", post(cart::update))
        .route("/remove", post(cart::remove))
        .route("/clear", post(cart::clear))
        .route("/count", get(cart::count))
        .route("/checkout", post(cart::checkout))
}

/// Create the order routes router.
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(orders::index).post(orders::create))
        .route("/count", get(orders::count))
        .route("/{id}", get(orders::show))
        .route("/{id}/invoice", get(orders::invoice))
}

/// Create the account routes router.
pub fn account_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(account::index))
        .route("/profile", post(account::update_profile))
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        .nest("/auth", auth_routes())
        .nest("/api/products", product_routes())
        .nest("/cart", cart_routes())
        .nest("/orders", order_routes())
        .nest("/account", account_routes())
        .route("/contact", post(contact::contact))
        .route("/newsletter", post(contact::newsletter))
}
