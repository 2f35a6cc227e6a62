//! Capability checks.
//!
//! Every service operation that touches data beyond the caller's own cart
//! asks [`authorize`] first. Admins may do anything. Other users may read
//! their own account, orders and order list, and edit their own profile.

use vidriera_core::UserId;

use super::ShopError;
use crate::models::CurrentUser;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    View,
    Edit,
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    /// Product create, update and delete. Reading the catalog is public.
    Catalog,
    /// One order, owned by the given user.
    Order { owner: UserId },
    /// The order list of one user.
    OrdersOf(UserId),
    AllOrders,
    /// Recording a status change on any order.
    OrderStatus,
    /// One account.
    User(UserId),
    AllUsers,
}

/// Allow or refuse `action` on `resource` for `actor`.
///
/// # Errors
///
/// Returns [`ShopError::Forbidden`] when the actor lacks the capability.
pub fn authorize(actor: &CurrentUser, action: Action, resource: Resource) -> Result<(), ShopError> {
    if actor.is_admin() {
        return Ok(());
    }

    let own = |id: UserId| id == actor.id;
    let allowed = match (action, resource) {
        (Action::View, Resource::Order { owner } | Resource::OrdersOf(owner) | Resource::User(owner))
        | (Action::Edit, Resource::User(owner)) => own(owner),
        _ => false,
    };

    if allowed {
        Ok(())
    } else {
        tracing::warn!(user_id = %actor.id, ?action, ?resource, "Access denied");
        Err(ShopError::Forbidden)
    }
}
