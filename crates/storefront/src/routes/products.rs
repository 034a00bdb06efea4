//! Catalog API.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;

use quardcube_core::ProductId;

use crate::db::{CatalogStore, ProductRepository};
use crate::error::{AppError, Result};
use crate::models::Product;
use crate::state::AppState;

/// Catalog filters.
#[derive(Debug, Default, Deserialize)]
pub struct ProductQuery {
    pub category: Option<String>,
}

/// All products, optionally limited to one category, by name.
pub async fn index(
    State(state): State<AppState>,
    Query(query): Query<ProductQuery>,
) -> Result<Json<Vec<Product>>> {
    let category = query
        .category
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty() && !c.eq_ignore_ascii_case("all"));

    let products = ProductRepository::new(state.pool())
        .products(category)
        .await?;
    Ok(Json(products))
}

/// One product.
pub async fn show(
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
) -> Result<Json<Product>> {
    ProductRepository::new(state.pool())
        .product(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Product".to_string()))
}
