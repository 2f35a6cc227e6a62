//! Domain models for the storefront.
//!
//! Validated domain objects shared by the storage layer, services and
//! routes. Row types live next to the SQL in `db`.

pub mod cart;
pub mod order;
pub mod product;
pub mod session;
pub mod user;

pub use cart::{Cart, CartLine, CartLineView, CartView};
pub use order::{NewOrder, Order, OrderLine, OrderLineView, OrderView};
pub use product::{Product, ProductDraft, ProductFilter, ProductSummary};
pub use session::CurrentUser;
pub use user::{ProfileUpdate, User};
