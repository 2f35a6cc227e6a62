//! Business logic services for the storefront.
//!
//! # Services
//!
//! - `access` - Capability checks shared by every service
//! - `auth` - Google OAuth sign-in
//! - `cart` - Cart lines with cart-time stock checks
//! - `catalog` - Product listing and admin management
//! - `orders` - Order placement and the status history
//! - `users` - Account profiles and administration
//!
//! Services borrow a [`Store`](crate::db::Store) and hold no state of their
//! own, so they are built per request.

pub mod access;
pub mod auth;
pub mod cart;
pub mod catalog;
mod error;
pub mod orders;
pub mod users;

pub use access::{Action, Resource, authorize};
pub use cart::CartService;
pub use catalog::CatalogService;
pub use error::ShopError;
pub use orders::{OrderService, PlaceOrder, StatusChange};
pub use users::UserService;
