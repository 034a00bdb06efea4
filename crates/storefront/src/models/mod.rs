//! Domain models for storefront.
//!
//! Row types live next to their repositories in `db`; the types here are
//! what services and handlers pass around.

pub mod order;
pub mod product;
pub mod profile;
pub mod session;

pub use order::{CustomerDetails, NewOrder, Order, OrderLine, ShippingAddress};
pub use product::Product;
pub use profile::{NewProfile, ProfileUpdate, UserProfile};
pub use session::{AuthSession, AuthUser, SessionView, keys as session_keys};
