//! Shipping snapshot attached to an order and reused as a user's profile.

use serde::{Deserialize, Serialize};

/// Delivery details.
///
/// On a user this is the default address; on an order it is a snapshot taken
/// at placement. Only `tracking_number` and `shipping_company` change after an
/// order is placed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingInfo {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub surname: String,
    #[serde(default)]
    pub province: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub street: String,
    /// Street number. Kept as text: "1234 bis", "s/n".
    #[serde(default)]
    pub number: String,
    #[serde(default)]
    pub postal_code: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracking_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shipping_company: Option<String>,
}

impl ShippingInfo {
    /// Names of the required fields that are blank, in declaration order.
    ///
    /// Whitespace-only values count as blank.
    #[must_use]
    pub fn missing_fields(&self) -> Vec<&'static str> {
        [
            ("name", &self.name),
            ("surname", &self.surname),
            ("province", &self.province),
            ("city", &self.city),
            ("street", &self.street),
            ("number", &self.number),
            ("postal_code", &self.postal_code),
            ("phone", &self.phone),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(field, _)| field)
        .collect()
    }

    /// Copy with surrounding whitespace removed from every field and blank
    /// tracking details dropped.
    #[must_use]
    pub fn trimmed(&self) -> Self {
        let clean = |s: &str| s.trim().to_owned();
        let clean_opt = |s: &Option<String>| {
            s.as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_owned)
        };
        Self {
            name: clean(&self.name),
            surname: clean(&self.surname),
            province: clean(&self.province),
            city: clean(&self.city),
            street: clean(&self.street),
            number: clean(&self.number),
            postal_code: clean(&self.postal_code),
            phone: clean(&self.phone),
            tracking_number: clean_opt(&self.tracking_number),
            shipping_company: clean_opt(&self.shipping_company),
        }
    }
}
