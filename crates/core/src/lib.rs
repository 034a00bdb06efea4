//! QuardCube Core - Shared types library.
//!
//! This crate provides the domain types shared by the QuardCube components:
//! - `storefront` - Public-facing shop, checkout and account backend
//! - `cli` - Command-line tools for migrations and catalog seeding
//!
//! # Architecture
//!
//! The core crate contains only types and pure logic - no I/O, no database
//! access, no HTTP clients. The cart container lives here so it can be
//! exercised without a session backend.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for ids, prices, emails, and order statuses
//! - [`cart`] - The visitor's cart: ordered lines unique by product

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod types;

pub use cart::{Cart, CartLine, CartProduct};
pub use types::*;
