//! The visitor's shopping cart.
//!
//! A cart is an ordered list of lines, at most one per product. Each line
//! carries a snapshot of the product as it looked when it was added; the
//! catalog is not consulted again until checkout.

use serde::{Deserialize, Serialize};

use crate::types::{Price, ProductId};

/// Product details captured when an item is put in the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartProduct {
    pub id: ProductId,
    pub name: String,
    pub price: Price,
    pub image: Option<String>,
    pub category: Option<String>,
}

/// One cart line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub product: CartProduct,
    pub quantity: u32,
}

impl CartLine {
    /// `price × quantity` for this line.
    #[must_use]
    pub fn subtotal(&self) -> Price {
        self.product.price.times(self.quantity)
    }
}

/// Ordered cart lines, unique by product id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cart {
    lines: Vec<CartLine>,
}

impl Cart {
    #[must_use]
    pub const fn new() -> Self {
        Self { lines: Vec::new() }
    }

    /// Add `quantity` of `product`.
    ///
    /// Merges into the existing line when the product is already in the cart
    /// (the stored snapshot is kept). A zero quantity is a no-op.
    pub fn add(&mut self, product: CartProduct, quantity: u32) {
        if quantity == 0 {
            return;
        }
        match self.lines.iter_mut().find(|l| l.product.id == product.id) {
            Some(line) => line.quantity = line.quantity.saturating_add(quantity),
            None => self.lines.push(CartLine { product, quantity }),
        }
    }

    /// Set the quantity of an existing line; `quantity <= 0` removes it.
    ///
    /// Returns `false` when the product isn't in the cart.
    pub fn set_quantity(&mut self, id: ProductId, quantity: i64) -> bool {
        if quantity <= 0 {
            return self.remove(id);
        }
        let quantity = u32::try_from(quantity).unwrap_or(u32::MAX);
        match self.lines.iter_mut().find(|l| l.product.id == id) {
            Some(line) => {
                line.quantity = quantity;
                true
            }
            None => false,
        }
    }

    /// Remove a product's line. Returns whether a line was removed.
    pub fn remove(&mut self, id: ProductId) -> bool {
        let before = self.lines.len();
        self.lines.retain(|l| l.product.id != id);
        self.lines.len() != before
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    /// Σ price × quantity.
    #[must_use]
    pub fn total(&self) -> Price {
        self.lines.iter().map(CartLine::subtotal).sum()
    }

    /// Σ quantity (the header badge count).
    #[must_use]
    pub fn item_count(&self) -> u64 {
        self.lines.iter().map(|l| u64::from(l.quantity)).sum()
    }

    #[must_use]
    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    #[must_use]
    pub fn quantity_of(&self, id: ProductId) -> Option<u32> {
        self.lines
            .iter()
            .find(|l| l.product.id == id)
            .map(|l| l.quantity)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn product(id: i32, cents: i64) -> CartProduct {
        CartProduct {
            id: ProductId::new(id),
            name: format!("Product {id}"),
            price: Price::from_cents(cents),
            image: None,
            category: Some("cubes".to_owned()),
        }
    }

    #[test]
    fn test_add_same_product_merges() {
        let mut merged = Cart::new();
        merged.add(product(1, 500), 2);
        merged.add(product(1, 500), 1);

        let mut single = Cart::new();
        single.add(product(1, 500), 3);

        assert_eq!(merged, single);
        assert_eq!(merged.lines().len(), 1);
        assert_eq!(merged.quantity_of(ProductId::new(1)), Some(3));
    }

    #[test]
    fn test_add_keeps_first_snapshot() {
        let mut cart = Cart::new();
        cart.add(product(1, 500), 1);
        cart.add(product(1, 900), 1);
        assert_eq!(cart.lines().first().unwrap().product.price, Price::from_cents(500));
    }

    #[test]
    fn test_add_zero_is_noop() {
        let mut cart = Cart::new();
        cart.add(product(1, 500), 0);
        assert!(cart.is_empty());
    }

    #[test]
    fn test_set_quantity_zero_or_negative_removes() {
        let mut cart = Cart::new();
        cart.add(product(1, 500), 2);
        cart.add(product(2, 300), 1);

        assert!(cart.set_quantity(ProductId::new(1), 0));
        assert_eq!(cart.quantity_of(ProductId::new(1)), None);

        assert!(cart.set_quantity(ProductId::new(2), -4));
        assert!(cart.is_empty());
    }

    #[test]
    fn test_set_quantity_unknown_product() {
        let mut cart = Cart::new();
        assert!(!cart.set_quantity(ProductId::new(9), 3));
        assert!(cart.is_empty());
    }

    #[test]
    fn test_total_and_item_count() {
        let mut cart = Cart::new();
        cart.add(product(1, 1000), 2);
        cart.add(product(2, 250), 3);
        assert_eq!(cart.total(), Price::from_cents(2750));
        assert_eq!(cart.item_count(), 5);

        cart.clear();
        assert_eq!(cart.total(), Price::ZERO);
        assert_eq!(cart.item_count(), 0);
    }

    #[test]
    fn test_order_is_preserved() {
        let mut cart = Cart::new();
        cart.add(product(3, 100), 1);
        cart.add(product(1, 100), 1);
        cart.add(product(2, 100), 1);
        cart.remove(ProductId::new(1));
        let ids: Vec<i32> = cart.lines().iter().map(|l| l.product.id.as_i32()).collect();
        assert_eq!(ids, vec![3, 2]);
    }

    #[test]
    fn test_serde_roundtrip_through_session_json() {
        let mut cart = Cart::new();
        cart.add(product(1, 1999), 2);
        let json = serde_json::to_value(&cart).unwrap();
        let back: Cart = serde_json::from_value(json).unwrap();
        assert_eq!(back, cart);
    }
}
