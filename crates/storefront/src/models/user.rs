//! User domain types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use vidriera_core::{Email, Role, ShippingInfo, UserId};

use super::CurrentUser;

/// A storefront account.
///
/// Every user owns exactly one cart, created in the same transaction as the
/// user. Orders point at the user; the user does not embed them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: Email,
    /// Google `sub` claim. `None` for accounts created from the CLI that
    /// have not signed in yet.
    #[serde(skip_serializing)]
    pub google_id: Option<String>,
    pub role: Role,
    /// Default shipping details offered at checkout. Tracking fields are
    /// always `None` here.
    pub shipping: ShippingInfo,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Identity to store in the session after sign-in.
    #[must_use]
    pub fn session_identity(&self) -> CurrentUser {
        CurrentUser {
            id: self.id,
            email: self.email.clone(),
            role: self.role,
        }
    }
}

/// Partial profile edit. Absent fields keep their value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub surname: Option<String>,
    pub province: Option<String>,
    pub city: Option<String>,
    pub street: Option<String>,
    pub number: Option<String>,
    pub postal_code: Option<String>,
    pub phone: Option<String>,
}

impl ProfileUpdate {
    /// Apply the edit on top of an existing profile.
    #[must_use]
    pub fn apply(self, current: &ShippingInfo) -> ShippingInfo {
        let pick = |new: Option<String>, old: &str| new.map_or_else(|| old.to_owned(), |v| v.trim().to_owned());
        ShippingInfo {
            name: pick(self.name, &current.name),
            surname: pick(self.surname, &current.surname),
            province: pick(self.province, &current.province),
            city: pick(self.city, &current.city),
            street: pick(self.street, &current.street),
            number: pick(self.number, &current.number),
            postal_code: pick(self.postal_code, &current.postal_code),
            phone: pick(self.phone, &current.phone),
            tracking_number: None,
            shipping_company: None,
        }
    }
}
