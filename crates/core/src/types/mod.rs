//! Domain types for Vidriera.

pub mod email;
pub mod id;
pub mod price;
pub mod shipping;
pub mod status;

pub use email::{Email, EmailError};
pub use id::*;
pub use price::{effective_price, line_total};
pub use shipping::ShippingInfo;
pub use status::*;
