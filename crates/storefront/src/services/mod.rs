//! Business logic services for storefront.
//!
//! # Services
//!
//! - `auth` - Auth backend seam, OAuth providers, PKCE helpers
//! - `session` - Cookie-backed session adapter over the auth backend
//! - `auth_state` - Account operations and the auth state machine
//! - `callback` - OAuth callback handling
//! - `profiles` - Lazy profile provisioning
//! - `cart` - Session-backed cart
//! - `orders` - Order creation and checkout
//! - `email` - Order notification emails
//! - `invoice` - Printable invoice
//! - `effects` - Best-effort side effect reporting

pub mod auth;
pub mod auth_state;
pub mod callback;
pub mod cart;
pub mod effects;
pub mod email;
pub mod invoice;
pub mod orders;
pub mod profiles;
pub mod session;
