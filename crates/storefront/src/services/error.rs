//! Domain error taxonomy.

use thiserror::Error;

use vidriera_core::TransitionError;

use crate::db::RepositoryError;

/// Errors returned by service operations.
///
/// Everything except [`Conflict`](Self::Conflict) and
/// [`Internal`](Self::Internal) is raised before any write, so a failed call
/// leaves carts, stock and orders as they were.
#[derive(Debug, Error)]
pub enum ShopError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{product} is out of stock")]
    OutOfStock { product: String },

    #[error("not enough stock for {product}: {available} available")]
    InsufficientStock { product: String, available: i32 },

    #[error("quantity must be at least 1")]
    InvalidQuantity,

    #[error("cart is empty")]
    EmptyCart,

    #[error("shipping information is incomplete: {}", .missing.join(", "))]
    IncompleteShippingInfo { missing: Vec<&'static str> },

    #[error("invalid payment method: {0:?}")]
    InvalidPaymentMethod(String),

    #[error("invalid order status: {0:?}")]
    InvalidStatus(String),

    #[error(transparent)]
    InvalidTransition(#[from] TransitionError),

    #[error("invalid product: {0}")]
    InvalidProduct(String),

    #[error("not allowed")]
    Forbidden,

    /// A concurrent request changed the data first. Safe to retry.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("internal error: {0}")]
    Internal(RepositoryError),
}

impl ShopError {
    /// Whether the client may retry the same request unchanged.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}

impl From<RepositoryError> for ShopError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound => Self::NotFound("record"),
            RepositoryError::Conflict(reason) => Self::Conflict(reason),
            other => Self::Internal(other),
        }
    }
}
