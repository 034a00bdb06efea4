//! Order route handlers.
//!
//! All routes here sit behind the route guard's protected prefix; the
//! extractors reject anything that slips through without a user.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::json;
use tracing::instrument;

use quardcube_core::{OrderId, ProductId};

use crate::db::{OrderRepository, OrderStore, ProductRepository};
use crate::error::{AppError, Result};
use crate::middleware::{CspNonce, RequireUser};
use crate::models::{CustomerDetails, Order};
use crate::services::invoice::InvoiceTemplate;
use crate::services::orders::OrderReceipt;
use crate::state::AppState;

/// Single-product order request.
#[derive(Debug, Deserialize)]
pub struct CreateOrder {
    pub product_id: ProductId,
    pub quantity: u32,
    #[serde(flatten)]
    pub customer: CustomerDetails,
}

/// The signed-in user's orders, newest first.
pub async fn index(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
) -> Result<Json<Vec<Order>>> {
    let orders = OrderRepository::new(state.pool())
        .orders_for_user(user.user.id)
        .await?;
    Ok(Json(orders))
}

/// Place an order for one product.
#[instrument(skip_all, fields(user_id = %user.user.id, product_id = %request.product_id))]
pub async fn create(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Json(request): Json<CreateOrder>,
) -> Result<(StatusCode, Json<OrderReceipt>)> {
    let catalog = ProductRepository::new(state.pool());
    let orders = OrderRepository::new(state.pool());

    let receipt = state
        .orders(&catalog, &orders)
        .create_order(request.product_id, request.quantity, user.user.id, request.customer)
        .await?;

    Ok((StatusCode::CREATED, Json(receipt)))
}

/// Order count badge.
pub async fn count(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
) -> Result<Json<serde_json::Value>> {
    let count = OrderRepository::new(state.pool())
        .count_for_user(user.user.id)
        .await?;
    Ok(Json(json!({ "count": count })))
}

async fn owned_order(state: &AppState, user: &RequireUser, id: OrderId) -> Result<Order> {
    OrderRepository::new(state.pool())
        .order_for_user(user.0.user.id, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Order".to_string()))
}

/// One of the user's orders.
pub async fn show(
    State(state): State<AppState>,
    user: RequireUser,
    Path(id): Path<OrderId>,
) -> Result<Json<Order>> {
    Ok(Json(owned_order(&state, &user, id).await?))
}

/// Printable invoice for one of the user's orders.
pub async fn invoice(
    State(state): State<AppState>,
    user: RequireUser,
    CspNonce(nonce): CspNonce,
    Path(id): Path<OrderId>,
) -> Result<impl IntoResponse> {
    let order = owned_order(&state, &user, id).await?;
    Ok(InvoiceTemplate::new(&order, Some(user.0.user.email.as_str()), nonce))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_create_order_reads_flat_customer_fields() {
        let request: CreateOrder = serde_json::from_value(json!({
            "product_id": 2,
            "quantity": 3,
            "name": "Amani",
            "email": "amani@example.com",
            "address": { "street": "Uhuru St", "city": "Dodoma" }
        }))
        .unwrap();

        assert_eq!(request.quantity, 3);
        assert_eq!(request.customer.name, "Amani");
        assert_eq!(request.customer.shipping_address.city, "Dodoma");
    }
}
