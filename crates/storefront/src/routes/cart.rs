//! Cart route handlers.
//!
//! The cart lives in the visitor's session; every mutation answers with the
//! updated cart. Checkout turns each line into an order.

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_sessions::Session;
use tracing::instrument;

use quardcube_core::{Cart, CartLine, Price, ProductId};

use crate::db::{CatalogStore, OrderRepository, ProductRepository};
use crate::error::{AppError, Result, add_breadcrumb};
use crate::middleware::RequireUser;
use crate::models::CustomerDetails;
use crate::services::cart::CartStore;
use crate::state::AppState;

/// Cart as returned to the client.
#[derive(Debug, Serialize)]
pub struct CartView {
    pub items: Vec<CartLineView>,
    pub total: Price,
    pub item_count: u64,
}

/// One cart line with its subtotal.
#[derive(Debug, Serialize)]
pub struct CartLineView {
    #[serde(flatten)]
    pub line: CartLine,
    pub subtotal: Price,
}

impl From<&Cart> for CartView {
    fn from(cart: &Cart) -> Self {
        Self {
            items: cart
                .lines()
                .iter()
                .map(|line| CartLineView {
                    subtotal: line.subtotal(),
                    line: line.clone(),
                })
                .collect(),
            total: cart.total(),
            item_count: cart.item_count(),
        }
    }
}

/// Add-to-cart request.
#[derive(Debug, Deserialize)]
pub struct AddToCart {
    pub product_id: ProductId,
    #[serde(default = "one")]
    pub quantity: u32,
}

const fn one() -> u32 {
    1
}

/// Quantity change request. Zero or less removes the line.
#[derive(Debug, Deserialize)]
pub struct UpdateQuantity {
    pub product_id: ProductId,
    pub quantity: i64,
}

/// Remove-from-cart request.
#[derive(Debug, Deserialize)]
pub struct RemoveFromCart {
    pub product_id: ProductId,
}

/// Show the cart.
pub async fn show(session: Session) -> Json<CartView> {
    let store = CartStore::load(session).await;
    Json(CartView::from(store.cart()))
}

/// Add a product to the cart.
#[instrument(skip(state, session), fields(product_id = %request.product_id))]
pub async fn add(
    State(state): State<AppState>,
    session: Session,
    Json(request): Json<AddToCart>,
) -> Result<Json<CartView>> {
    if request.quantity == 0 {
        return Err(AppError::BadRequest("Quantity must be at least 1".to_string()));
    }

    let product = ProductRepository::new(state.pool())
        .product(request.product_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Product".to_string()))?;

    let mut store = CartStore::load(session).await;
    store.add(product.to_cart_product(), request.quantity).await;

    let product_id = request.product_id.to_string();
    add_breadcrumb("cart", "Added to cart", Some(&[("product_id", &product_id)]));

    Ok(Json(CartView::from(store.cart())))
}

/// Change a line's quantity.
pub async fn update(
    session: Session,
    Json(request): Json<UpdateQuantity>,
) -> Result<Json<CartView>> {
    let mut store = CartStore::load(session).await;
    if !store.set_quantity(request.product_id, request.quantity).await {
        return Err(AppError::NotFound("Cart item".to_string()));
    }
    Ok(Json(CartView::from(store.cart())))
}

/// Remove a line.
pub async fn remove(
    session: Session,
    Json(request): Json<RemoveFromCart>,
) -> Result<Json<CartView>> {
    let mut store = CartStore::load(session).await;
    if !store.remove(request.product_id).await {
        return Err(AppError::NotFound("Cart item".to_string()));
    }
    Ok(Json(CartView::from(store.cart())))
}

/// Empty the cart.
pub async fn clear(session: Session) -> Json<CartView> {
    let mut store = CartStore::load(session).await;
    store.clear().await;
    Json(CartView::from(store.cart()))
}

/// Cart count badge.
pub async fn count(session: Session) -> Json<serde_json::Value> {
    let store = CartStore::load(session).await;
    Json(json!({ "count": store.cart().item_count() }))
}

/// Place one order per cart line.
///
/// Lines that were ordered leave the cart; failed lines stay so the visitor
/// can adjust them. Answers 201 when at least one order was placed, 409
/// when none were.
#[instrument(skip_all, fields(user_id = %user.user.id))]
pub async fn checkout(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    session: Session,
    Json(customer): Json<CustomerDetails>,
) -> Result<Response> {
    let mut store = CartStore::load(session).await;
    if store.cart().is_empty() {
        return Err(AppError::BadRequest("Your cart is empty".to_string()));
    }

    let catalog = ProductRepository::new(state.pool());
    let orders = OrderRepository::new(state.pool());
    let summary = state
        .orders(&catalog, &orders)
        .checkout(store.cart().lines(), user.user.id, &customer)
        .await;

    store.remove_all(&summary.ordered).await;
    tracing::info!(
        placed = summary.receipts.len(),
        failed = summary.failures.len(),
        "Checkout finished"
    );

    let status = if summary.receipts.is_empty() {
        StatusCode::CONFLICT
    } else {
        StatusCode::CREATED
    };
    Ok((status, Json(summary)).into_response())
}
