//! Session-backed cart.
//!
//! The cart lives in the visitor's tower-sessions session under
//! [`session_keys::CART`] and is written back after every mutation. A failed
//! write is logged; the caller still gets the updated in-memory cart.

use tower_sessions::Session;

use quardcube_core::{Cart, CartProduct, ProductId};

use crate::models::session_keys;

/// A visitor's cart bound to their session.
pub struct CartStore {
    session: Session,
    cart: Cart,
}

impl CartStore {
    /// Load the cart from the session. A missing or unreadable cart starts
    /// empty.
    pub async fn load(session: Session) -> Self {
        let cart = match session.get::<Cart>(session_keys::CART).await {
            Ok(cart) => cart.unwrap_or_default(),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read cart from session, starting empty");
                Cart::new()
            }
        };
        Self { session, cart }
    }

    #[must_use]
    pub const fn cart(&self) -> &Cart {
        &self.cart
    }

    #[must_use]
    pub fn into_cart(self) -> Cart {
        self.cart
    }

    async fn persist(&self) {
        if let Err(e) = self.session.insert(session_keys::CART, &self.cart).await {
            tracing::error!(error = %e, "Failed to persist cart to session");
        }
    }

    /// Add `quantity` of a product, merging with an existing line.
    pub async fn add(&mut self, product: CartProduct, quantity: u32) {
        self.cart.add(product, quantity);
        self.persist().await;
    }

    /// Set a line's quantity; zero or less removes it. Returns whether the
    /// product was in the cart.
    pub async fn set_quantity(&mut self, id: ProductId, quantity: i64) -> bool {
        let changed = self.cart.set_quantity(id, quantity);
        self.persist().await;
        changed
    }

    /// Remove a product's line. Returns whether it was in the cart.
    pub async fn remove(&mut self, id: ProductId) -> bool {
        let removed = self.cart.remove(id);
        self.persist().await;
        removed
    }

    pub async fn clear(&mut self) {
        self.cart.clear();
        self.persist().await;
    }

    /// Drop the lines for `ids` (products that were ordered).
    pub async fn remove_all(&mut self, ids: &[ProductId]) {
        for id in ids {
            self.cart.remove(*id);
        }
        self.persist().await;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use quardcube_core::Price;
    use tower_sessions::MemoryStore;

    use super::*;

    fn product(id: i32) -> CartProduct {
        CartProduct {
            id: ProductId::new(id),
            name: format!("Cube {id}"),
            price: Price::from_cents(1_250),
            image: None,
            category: Some("puzzles".to_string()),
        }
    }

    #[tokio::test]
    async fn test_mutations_survive_reload() {
        let session = Session::new(None, Arc::new(MemoryStore::default()), None);

        let mut store = CartStore::load(session.clone()).await;
        store.add(product(1), 2).await;
        store.add(product(1), 1).await;
        store.add(product(2), 1).await;
        assert!(store.set_quantity(ProductId::new(2), 0).await);

        let reloaded = CartStore::load(session).await;
        assert_eq!(reloaded.cart().quantity_of(ProductId::new(1)), Some(3));
        assert_eq!(reloaded.cart().quantity_of(ProductId::new(2)), None);
        assert_eq!(reloaded.cart().total(), Price::from_cents(3_750));
    }

    #[tokio::test]
    async fn test_remove_all_keeps_other_lines() {
        let session = Session::new(None, Arc::new(MemoryStore::default()), None);

        let mut store = CartStore::load(session.clone()).await;
        store.add(product(1), 1).await;
        store.add(product(2), 4).await;
        store.remove_all(&[ProductId::new(1)]).await;

        let reloaded = CartStore::load(session).await;
        assert_eq!(reloaded.cart().item_count(), 4);
    }
}
