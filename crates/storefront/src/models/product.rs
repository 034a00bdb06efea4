//! Catalog product (`products` table).

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use quardcube_core::{CartProduct, Price, ProductId};

/// A catalog product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: Option<String>,
    pub price: Price,
    /// Units on hand; never negative.
    pub stock: i32,
    pub category: Option<String>,
    pub rating: Option<Decimal>,
    pub image: Option<String>,
}

impl Product {
    /// Snapshot used for cart lines.
    #[must_use]
    pub fn to_cart_product(&self) -> CartProduct {
        CartProduct {
            id: self.id,
            name: self.name.clone(),
            price: self.price,
            image: self.image.clone(),
            category: self.category.clone(),
        }
    }

    /// Whether `quantity` units can be sold from current stock.
    #[must_use]
    pub fn covers(&self, quantity: u32) -> bool {
        i64::from(self.stock) >= i64::from(quantity)
    }
}
