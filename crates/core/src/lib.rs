//! Vidriera Core - shared domain types.
//!
//! Used by every Vidriera component:
//! - `storefront` - HTTP API for the catalog, carts and orders
//! - `cli` - migrations, catalog seeding and account management
//!
//! # Architecture
//!
//! The core crate contains only types and pure rules (pricing, shipping
//! validation, order status policy). No I/O, no database access, no HTTP
//! clients.
//!
//! # Modules
//!
//! - [`types`] - Typed IDs, emails, prices, statuses and shipping snapshots

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
