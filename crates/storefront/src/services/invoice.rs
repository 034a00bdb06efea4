//! Printable order invoice.

use askama::Template;
use askama_web::WebTemplate;
use rust_decimal::{Decimal, RoundingStrategy};

use quardcube_core::Price;

use crate::models::Order;

/// One row of the items table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvoiceRow {
    pub name: String,
    pub quantity: u32,
    pub unit_price: String,
    pub subtotal: String,
}

/// Invoice page. Opens the print dialog on load.
#[derive(Template, WebTemplate)]
#[template(path = "orders/invoice.html")]
pub struct InvoiceTemplate {
    pub nonce: String,
    pub order_id: String,
    pub date: String,
    pub status: String,
    pub customer_name: String,
    pub customer_email: String,
    pub street: String,
    pub locality: String,
    pub country: String,
    pub rows: Vec<InvoiceRow>,
    pub total: String,
}

impl InvoiceTemplate {
    /// Build the invoice for `order`. `account_email` is shown when the order
    /// itself carries no email.
    #[must_use]
    pub fn new(order: &Order, account_email: Option<&str>, nonce: String) -> Self {
        let status = order.status.as_str();
        let mut chars = status.chars();
        let status = chars
            .next()
            .map(|first| first.to_uppercase().chain(chars).collect())
            .unwrap_or_default();

        Self {
            nonce,
            order_id: order.id.to_string(),
            date: order.created_at.format("%B %-d, %Y").to_string(),
            status,
            customer_name: order.customer_name.clone(),
            customer_email: order
                .customer_email
                .as_deref()
                .or(account_email)
                .unwrap_or("N/A")
                .to_string(),
            street: order.shipping_address.street.clone(),
            locality: order.shipping_address.locality(),
            country: order.shipping_address.country.clone(),
            rows: order
                .items
                .iter()
                .map(|item| InvoiceRow {
                    name: item.name.clone(),
                    quantity: item.quantity,
                    unit_price: format_tzs(item.price),
                    subtotal: format_tzs(item.subtotal()),
                })
                .collect(),
            total: format_tzs(order.total_amount),
        }
    }
}

/// `TZS 12,500.00`
#[must_use]
pub fn format_tzs(price: Price) -> String {
    let amount = price
        .amount()
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    let negative = amount < Decimal::ZERO;
    let formatted = format!("{:.2}", amount.abs());
    let (whole, cents) = formatted.split_once('.').unwrap_or((&formatted, "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, digit) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    format!("TZS {}{grouped}.{cents}", if negative { "-" } else { "" })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{TimeZone, Utc};
    use quardcube_core::{OrderId, OrderStatus, ProductId, UserId};

    use super::*;
    use crate::models::{OrderLine, ShippingAddress};

    #[test]
    fn test_format_tzs_groups_thousands() {
        assert_eq!(format_tzs(Price::from_cents(0)), "TZS 0.00");
        assert_eq!(format_tzs(Price::from_cents(99_950)), "TZS 999.50");
        assert_eq!(format_tzs(Price::from_cents(1_250_000)), "TZS 12,500.00");
        assert_eq!(format_tzs(Price::from_cents(123_456_789)), "TZS 1,234,567.89");
    }

    #[test]
    fn test_invoice_renders_order() {
        let placed = Utc.with_ymd_and_hms(2025, 1, 5, 12, 0, 0).unwrap();
        let order = Order {
            id: OrderId::generate(),
            user_id: UserId::generate(),
            items: vec![OrderLine {
                product_id: ProductId::new(3),
                name: "Speed Cube".to_string(),
                price: Price::from_cents(1_500_000),
                quantity: 2,
            }],
            total_amount: Price::from_cents(3_000_000),
            customer_name: "Amani".to_string(),
            customer_email: None,
            customer_phone: None,
            shipping_address: ShippingAddress {
                city: "Dodoma".to_string(),
                country: "Tanzania".to_string(),
                ..ShippingAddress::default()
            },
            payment_method: "Credit Card".to_string(),
            status: OrderStatus::Pending,
            created_at: placed,
            updated_at: placed,
        };

        let invoice = InvoiceTemplate::new(&order, Some("amani@example.com"), "n0nce".to_string());
        assert_eq!(invoice.status, "Pending");
        assert_eq!(invoice.date, "January 5, 2025");
        assert_eq!(invoice.customer_email, "amani@example.com");

        let html = invoice.render().unwrap();
        assert!(html.contains(&order.id.to_string()));
        assert!(html.contains("TZS 30,000.00"));
        assert!(html.contains(r#"<script nonce="n0nce">"#));
        assert!(html.contains("window.print()"));
    }
}
