//! Order types (`orders` table).
//!
//! Line items and the shipping address are JSON snapshots taken at checkout;
//! later catalog edits never change a placed order.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use quardcube_core::{Email, OrderId, OrderStatus, Price, ProductId, UserId};

/// Country recorded when the shopper leaves it blank.
pub const DEFAULT_COUNTRY: &str = "Tanzania";

/// Payment method recorded when none is given.
pub const DEFAULT_PAYMENT_METHOD: &str = "Credit Card";

/// A line item snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    #[serde(alias = "id")]
    pub product_id: ProductId,
    pub name: String,
    pub price: Price,
    pub quantity: u32,
}

impl OrderLine {
    #[must_use]
    pub fn subtotal(&self) -> Price {
        self.price.times(self.quantity)
    }
}

/// Shipping address snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShippingAddress {
    pub street: String,
    pub city: String,
    pub state: String,
    pub country: String,
    #[serde(rename = "postalCode", alias = "postal_code")]
    pub postal_code: String,
}

impl ShippingAddress {
    /// Trim every field and fill in the default country.
    #[must_use]
    pub fn normalized(self) -> Self {
        let country = self.country.trim();
        Self {
            street: self.street.trim().to_string(),
            city: self.city.trim().to_string(),
            state: self.state.trim().to_string(),
            country: if country.is_empty() {
                DEFAULT_COUNTRY.to_string()
            } else {
                country.to_string()
            },
            postal_code: self.postal_code.trim().to_string(),
        }
    }

    /// `city state postal` on one line, skipping blanks.
    #[must_use]
    pub fn locality(&self) -> String {
        [&self.city, &self.state, &self.postal_code]
            .into_iter()
            .filter(|s| !s.is_empty())
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Contact and shipping details submitted at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CustomerDetails {
    pub name: String,
    #[serde(default)]
    pub email: Option<Email>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default, alias = "address")]
    pub shipping_address: ShippingAddress,
    #[serde(default)]
    pub payment_method: Option<String>,
}

/// A placed order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub items: Vec<OrderLine>,
    pub total_amount: Price,
    pub customer_name: String,
    pub customer_email: Option<String>,
    pub customer_phone: Option<String>,
    pub shipping_address: ShippingAddress,
    pub payment_method: String,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Order ready to be inserted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    pub id: OrderId,
    pub user_id: UserId,
    pub items: Vec<OrderLine>,
    pub total_amount: Price,
    pub customer_name: String,
    pub customer_email: Option<String>,
    pub customer_phone: Option<String>,
    pub shipping_address: ShippingAddress,
    pub payment_method: String,
    pub status: OrderStatus,
}

impl NewOrder {
    /// The order as it will read back once stored at `now`.
    #[must_use]
    pub fn into_order(self, now: DateTime<Utc>) -> Order {
        Order {
            id: self.id,
            user_id: self.user_id,
            items: self.items,
            total_amount: self.total_amount,
            customer_name: self.customer_name,
            customer_email: self.customer_email,
            customer_phone: self.customer_phone,
            shipping_address: self.shipping_address,
            payment_method: self.payment_method,
            status: self.status,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_shipping_defaults_country() {
        let address = ShippingAddress {
            street: " 12 Uhuru St ".to_string(),
            country: "  ".to_string(),
            ..ShippingAddress::default()
        }
        .normalized();

        assert_eq!(address.street, "12 Uhuru St");
        assert_eq!(address.country, DEFAULT_COUNTRY);
    }

    #[test]
    fn test_shipping_json_uses_postal_code_camel_case() {
        let address = ShippingAddress {
            postal_code: "11101".to_string(),
            ..ShippingAddress::default()
        };
        let json = serde_json::to_value(&address).unwrap();
        assert_eq!(json["postalCode"], "11101");

        let back: ShippingAddress =
            serde_json::from_value(serde_json::json!({ "postal_code": "9" })).unwrap();
        assert_eq!(back.postal_code, "9");
    }

    #[test]
    fn test_order_line_accepts_legacy_id_key() {
        let line: OrderLine = serde_json::from_value(serde_json::json!({
            "id": 4,
            "name": "Speed Cube",
            "price": "12.50",
            "quantity": 2
        }))
        .unwrap();
        assert_eq!(line.product_id, ProductId::new(4));
        assert_eq!(line.subtotal(), Price::from_cents(2500));
    }

    #[test]
    fn test_locality_skips_blanks() {
        let address = ShippingAddress {
            city: "Arusha".to_string(),
            postal_code: "23101".to_string(),
            ..ShippingAddress::default()
        };
        assert_eq!(address.locality(), "Arusha 23101");
    }
}
