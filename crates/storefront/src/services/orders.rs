//! Order creation.
//!
//! Placing an order is a fixed sequence:
//!
//! 1. Load the product and check the requested quantity against stock
//! 2. Insert the order with a snapshot of the product's name and price
//! 3. Decrement stock
//! 4. Notify the shop, then the customer when an email was given
//!
//! Only steps 1 and 2 can fail the operation. Steps 3 and 4 are best effort:
//! their failures are logged and returned in [`OrderReceipt::side_effects`].
//! The order insert and the stock decrement are separate statements; the
//! decrement is conditional on enough stock remaining, so a concurrent
//! checkout can leave a placed order without its decrement (reported as a
//! `StockDecrement` failure) but can never drive stock negative.

use serde::Serialize;
use thiserror::Error;

use quardcube_core::{CartLine, OrderId, OrderStatus, Price, ProductId, UserId};

use crate::db::{CatalogStore, OrderStore, RepositoryError};
use crate::models::order::DEFAULT_PAYMENT_METHOD;
use crate::models::{CustomerDetails, NewOrder, Order, OrderLine};
use crate::services::effects::{SideEffect, SideEffects};
use crate::services::email::{self, EmailOutcome, Mailer};

/// Errors that fail order creation.
#[derive(Debug, Error)]
pub enum OrderError {
    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    #[error("Quantity must be at least 1")]
    InvalidQuantity,

    #[error("Insufficient stock for {product}. Available: {available}, Requested: {requested}")]
    InsufficientStock {
        product: String,
        available: i32,
        requested: u32,
    },

    #[error("Customer name is required")]
    MissingCustomerName,

    #[error("Failed to create order: {0}")]
    Store(#[from] RepositoryError),
}

/// What a successful checkout of one product returns.
#[derive(Debug, Clone, Serialize)]
pub struct OrderReceipt {
    pub order_id: OrderId,
    pub total: Price,
    pub admin_email: EmailOutcome,
    pub customer_email: Option<EmailOutcome>,
    pub side_effects: SideEffects,
}

/// A cart line that could not be ordered.
#[derive(Debug, Clone, Serialize)]
pub struct CheckoutFailure {
    pub product_id: ProductId,
    pub name: String,
    pub message: String,
}

/// Result of checking out a whole cart.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CheckoutSummary {
    pub receipts: Vec<OrderReceipt>,
    pub failures: Vec<CheckoutFailure>,
    /// Products whose orders were placed.
    #[serde(skip)]
    pub ordered: Vec<ProductId>,
}

/// Order creation service.
pub struct OrderService<'a, C, O, M> {
    catalog: &'a C,
    orders: &'a O,
    mailer: &'a M,
    admin_email: &'a str,
}

impl<'a, C: CatalogStore, O: OrderStore, M: Mailer> OrderService<'a, C, O, M> {
    /// Create a new order service.
    #[must_use]
    pub const fn new(catalog: &'a C, orders: &'a O, mailer: &'a M, admin_email: &'a str) -> Self {
        Self {
            catalog,
            orders,
            mailer,
            admin_email,
        }
    }

    /// Place an order for `quantity` of one product.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::ProductNotFound`, `OrderError::InvalidQuantity`
    /// or `OrderError::InsufficientStock` before anything is written, and
    /// `OrderError::Store` if the order cannot be inserted.
    pub async fn create_order(
        &self,
        product_id: ProductId,
        quantity: u32,
        user_id: UserId,
        customer: CustomerDetails,
    ) -> Result<OrderReceipt, OrderError> {
        if quantity == 0 {
            return Err(OrderError::InvalidQuantity);
        }

        let customer_name = customer.name.trim().to_string();
        if customer_name.is_empty() {
            return Err(OrderError::MissingCustomerName);
        }

        let product = self
            .catalog
            .product(product_id)
            .await?
            .ok_or(OrderError::ProductNotFound(product_id))?;

        if !product.covers(quantity) {
            return Err(OrderError::InsufficientStock {
                product: product.name,
                available: product.stock,
                requested: quantity,
            });
        }

        let line = OrderLine {
            product_id,
            name: product.name.clone(),
            price: product.price,
            quantity,
        };
        let total = line.subtotal();

        let new_order = NewOrder {
            id: OrderId::generate(),
            user_id,
            items: vec![line],
            total_amount: total,
            customer_name,
            customer_email: customer.email.map(String::from),
            customer_phone: customer
                .phone
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty()),
            shipping_address: customer.shipping_address.normalized(),
            payment_method: customer
                .payment_method
                .map(|m| m.trim().to_string())
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| DEFAULT_PAYMENT_METHOD.to_string()),
            status: OrderStatus::Pending,
        };

        let order = self.orders.insert_order(&new_order).await?;
        tracing::info!(
            order_id = %order.id,
            user_id = %user_id,
            product_id = %product_id,
            quantity,
            total = %total,
            "Order created"
        );

        let mut side_effects = SideEffects::new();

        match self.catalog.decrement_stock(product_id, quantity).await {
            Ok(Some(remaining)) => {
                tracing::info!(
                    product_id = %product_id,
                    from = product.stock,
                    to = remaining,
                    "Stock updated"
                );
            }
            Ok(None) => side_effects.record(
                SideEffect::StockDecrement,
                format!("stock for product {product_id} no longer covers {quantity}"),
            ),
            Err(e) => side_effects.record(SideEffect::StockDecrement, e),
        }

        let (admin_email, customer_email) = self.notify(&order, &mut side_effects).await;

        Ok(OrderReceipt {
            order_id: order.id,
            total,
            admin_email,
            customer_email,
            side_effects,
        })
    }

    /// Place one order per cart line.
    ///
    /// Lines are independent: a failed line is reported and the rest still
    /// go through.
    pub async fn checkout(
        &self,
        lines: &[CartLine],
        user_id: UserId,
        customer: &CustomerDetails,
    ) -> CheckoutSummary {
        let mut summary = CheckoutSummary::default();

        for line in lines {
            let product_id = line.product.id;
            match self
                .create_order(product_id, line.quantity, user_id, customer.clone())
                .await
            {
                Ok(receipt) => {
                    summary.ordered.push(product_id);
                    summary.receipts.push(receipt);
                }
                Err(e) => {
                    tracing::warn!(product_id = %product_id, error = %e, "Checkout line failed");
                    summary.failures.push(CheckoutFailure {
                        product_id,
                        name: line.product.name.clone(),
                        message: e.to_string(),
                    });
                }
            }
        }

        summary
    }

    async fn notify(
        &self,
        order: &Order,
        side_effects: &mut SideEffects,
    ) -> (EmailOutcome, Option<EmailOutcome>) {
        let admin = match email::order_notification(order, self.admin_email) {
            Ok(message) => email::send(self.mailer, message).await,
            Err(e) => EmailOutcome::failed(self.admin_email, e),
        };
        if let Some(error) = &admin.error {
            side_effects.record(SideEffect::AdminNotification, error);
        }

        let customer = match email::order_confirmation(order) {
            Ok(Some(message)) => Some(email::send(self.mailer, message).await),
            Ok(None) => {
                tracing::debug!(order_id = %order.id, "No customer email, skipping confirmation");
                None
            }
            Err(e) => Some(EmailOutcome::failed(
                order.customer_email.clone().unwrap_or_default(),
                e,
            )),
        };
        if let Some(error) = customer.as_ref().and_then(|c| c.error.as_ref()) {
            side_effects.record(SideEffect::CustomerConfirmation, error);
        }

        (admin, customer)
    }
}
