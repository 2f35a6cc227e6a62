//! Status enums: order lifecycle, payment method, account role.
//!
//! Wire and storage names are the Spanish labels customers see
//! (`"pago aprobado"`, `"transferencia"`), so serde, [`Display`](core::fmt::Display)
//! and [`FromStr`](std::str::FromStr) all agree on the same strings.

use core::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A string did not name any variant of an enum.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid {kind}: {value:?}")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

impl ParseEnumError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_owned(),
        }
    }
}

/// Order lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum OrderStatus {
    #[default]
    #[serde(rename = "creado")]
    Created,
    #[serde(rename = "pago aprobado")]
    PaymentApproved,
    #[serde(rename = "preparando paquete")]
    Preparing,
    #[serde(rename = "enviado")]
    Shipped,
    #[serde(rename = "entregado")]
    Delivered,
    #[serde(rename = "cancelado")]
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [Self; 6] = [
        Self::Created,
        Self::PaymentApproved,
        Self::Preparing,
        Self::Shipped,
        Self::Delivered,
        Self::Cancelled,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Created => "creado",
            Self::PaymentApproved => "pago aprobado",
            Self::Preparing => "preparando paquete",
            Self::Shipped => "enviado",
            Self::Delivered => "entregado",
            Self::Cancelled => "cancelado",
        }
    }

    /// `entregado` and `cancelado` end the lifecycle.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled)
    }

    /// Position along the fulfilment path. `cancelado` sits outside it.
    const fn rank(self) -> Option<u8> {
        match self {
            Self::Created => Some(0),
            Self::PaymentApproved => Some(1),
            Self::Preparing => Some(2),
            Self::Shipped => Some(3),
            Self::Delivered => Some(4),
            Self::Cancelled => None,
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s.trim())
            .ok_or_else(|| ParseEnumError::new("order status", s))
    }
}

/// One entry of an order's append-only status history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEntry {
    pub status: OrderStatus,
    pub timestamp: DateTime<Utc>,
}

/// How the customer said they will pay. No gateway is involved; this is
/// recorded on the order and nothing else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Transferencia,
    Mercadopago,
}

impl PaymentMethod {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Transferencia => "transferencia",
            Self::Mercadopago => "mercadopago",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "transferencia" => Ok(Self::Transferencia),
            "mercadopago" => Ok(Self::Mercadopago),
            _ => Err(ParseEnumError::new("payment method", s)),
        }
    }
}

/// Account role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    #[default]
    User,
}

impl Role {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::User => "user",
        }
    }

    #[must_use]
    pub const fn is_admin(self) -> bool {
        matches!(self, Self::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "admin" => Ok(Self::Admin),
            "user" => Ok(Self::User),
            _ => Err(ParseEnumError::new("role", s)),
        }
    }
}

/// A status change refused by [`StatusPolicy::ForwardOnly`].
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("cannot move order from {from} to {to}")]
pub struct TransitionError {
    pub from: OrderStatus,
    pub to: OrderStatus,
}

/// Which status changes an admin may record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusPolicy {
    /// Any status may follow any other, including leaving a terminal state.
    #[default]
    Permissive,
    /// Statuses only move forward along the fulfilment path; `cancelado` is
    /// reachable from any non-terminal state; terminal states are final.
    ForwardOnly,
}

impl StatusPolicy {
    /// Check whether `current -> next` is allowed.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError`] when the policy refuses the change.
    pub fn check(self, current: OrderStatus, next: OrderStatus) -> Result<(), TransitionError> {
        let refused = TransitionError {
            from: current,
            to: next,
        };
        match self {
            Self::Permissive => Ok(()),
            Self::ForwardOnly if current.is_terminal() => Err(refused),
            Self::ForwardOnly => match (current.rank(), next.rank()) {
                (_, None) => Ok(()),
                (Some(from), Some(to)) if to > from => Ok(()),
                _ => Err(refused),
            },
        }
    }
}

impl FromStr for StatusPolicy {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "permissive" => Ok(Self::Permissive),
            "forward_only" | "forward-only" => Ok(Self::ForwardOnly),
            _ => Err(ParseEnumError::new("status policy", s)),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_status_labels_round_trip_through_from_str() {
        for status in OrderStatus::ALL {
            assert_eq!(status.as_str().parse::<OrderStatus>().unwrap(), status);
        }
        assert!("shipped".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn test_status_serializes_with_spaces() {
        let json = serde_json::to_string(&OrderStatus::PaymentApproved).unwrap();
        assert_eq!(json, "\"pago aprobado\"");
        let parsed: OrderStatus = serde_json::from_str("\"preparando paquete\"").unwrap();
        assert_eq!(parsed, OrderStatus::Preparing);
    }

    #[test]
    fn test_payment_method_parse() {
        assert_eq!(
            "mercadopago".parse::<PaymentMethod>().unwrap(),
            PaymentMethod::Mercadopago
        );
        let err = "efectivo".parse::<PaymentMethod>().unwrap_err();
        assert_eq!(err.kind, "payment method");
    }

    #[test]
    fn test_permissive_policy_allows_reopening_delivered_orders() {
        assert!(
            StatusPolicy::Permissive
                .check(OrderStatus::Delivered, OrderStatus::Created)
                .is_ok()
        );
    }

    #[test]
    fn test_forward_only_policy() {
        let policy = StatusPolicy::ForwardOnly;
        assert!(policy.check(OrderStatus::Created, OrderStatus::PaymentApproved).is_ok());
        assert!(policy.check(OrderStatus::Created, OrderStatus::Shipped).is_ok());
        assert!(policy.check(OrderStatus::Shipped, OrderStatus::Cancelled).is_ok());
        assert!(policy.check(OrderStatus::Shipped, OrderStatus::Preparing).is_err());
        assert!(policy.check(OrderStatus::Created, OrderStatus::Created).is_err());
        assert!(policy.check(OrderStatus::Delivered, OrderStatus::Created).is_err());
        assert!(policy.check(OrderStatus::Cancelled, OrderStatus::Cancelled).is_err());
    }

    #[test]
    fn test_policy_from_str() {
        assert_eq!(
            "FORWARD_ONLY".parse::<StatusPolicy>().unwrap(),
            StatusPolicy::ForwardOnly
        );
        assert!("strict".parse::<StatusPolicy>().is_err());
    }
}
