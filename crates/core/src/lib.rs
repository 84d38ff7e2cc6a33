//! FastSpot Core: shared domain types and pricing.
//!
//! Used by:
//! - `storefront` - the ordering API (cart, checkout, recommendations)
//! - `cli` - migrations and catalog seeding
//!
//! The crate holds types and pure functions only. No database access, no
//! HTTP, no async.
//!
//! # Modules
//!
//! - [`types`] - IDs, prices, emails, owner keys and status enums
//! - [`pricing`] - line and cart total arithmetic

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod pricing;
pub mod types;

pub use types::*;
