//! HTTP middleware stack for storefront.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (capture errors, transactions)
//! 2. `TraceLayer` (request span with `request_id` field)
//! 3. Request ID
//! 4. CSP nonce
//! 5. Security headers (CSP names the request's nonce)
//! 6. Session layer (tower-sessions with `PostgreSQL` store, carts)
//! 7. Route guard (auth session lookup, redirects, user extensions)

pub mod auth;
pub mod csp;
pub mod request_id;
pub mod route_guard;
pub mod security_headers;
pub mod session;

pub use auth::{OptionalSession, RequireSession, RequireUser};
pub use csp::{CspNonce, csp_nonce_middleware};
pub use request_id::{RequestId, request_id_middleware};
pub use route_guard::route_guard;
pub use security_headers::security_headers_middleware;
pub use session::create_session_layer;
