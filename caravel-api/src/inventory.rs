use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use caravel_inventory::{InventoryChangeLog, Product};
use caravel_shared::{OwnerRef, StockStatus};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateProductRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct AddStockRequest {
    pub owner: OwnerRef,
    pub product_id: Uuid,
    pub quantity: i64,
    pub status: StockStatus,
    pub actor_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct AdjustStockRequest {
    pub owner: OwnerRef,
    pub product_id: Uuid,
    pub new_quantity: i64,
    pub actor_id: Uuid,
}

/// POST /v1/products
pub async fn create_product(
    State(state): State<AppState>,
    Json(request): Json<CreateProductRequest>,
) -> Result<(StatusCode, Json<Product>), AppError> {
    let product = state.inventory.register_product(request.name).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

/// POST /v1/stock
pub async fn add_stock(
    State(state): State<AppState>,
    Json(request): Json<AddStockRequest>,
) -> Result<(StatusCode, Json<InventoryChangeLog>), AppError> {
    let entry = state
        .inventory
        .add_stock(
            request.owner,
            request.product_id,
            request.quantity,
            request.status,
            request.actor_id,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

/// POST /v1/stock/adjust
pub async fn adjust_stock(
    State(state): State<AppState>,
    Json(request): Json<AdjustStockRequest>,
) -> Result<Json<InventoryChangeLog>, AppError> {
    let entry = state
        .inventory
        .adjust(
            request.owner,
            request.product_id,
            request.new_quantity,
            request.actor_id,
        )
        .await?;
    Ok(Json(entry))
}

fn parse_owner(kind: &str, owner_id: Uuid) -> Result<OwnerRef, AppError> {
    match kind.to_ascii_uppercase().as_str() {
        "FACTORY" => Ok(OwnerRef::Factory(owner_id)),
        "DISTRIBUTOR" => Ok(OwnerRef::Distributor(owner_id)),
        "FRANCHISE" => Ok(OwnerRef::Franchise(owner_id)),
        other => Err(AppError::ValidationError(format!(
            "unknown owner kind: {}",
            other
        ))),
    }
}

/// GET /v1/stock/{owner_kind}/{owner_id}/{product_id}/history
pub async fn stock_history(
    State(state): State<AppState>,
    Path((owner_kind, owner_id, product_id)): Path<(String, Uuid, Uuid)>,
) -> Result<Json<Vec<InventoryChangeLog>>, AppError> {
    let owner = parse_owner(&owner_kind, owner_id)?;
    Ok(Json(state.inventory.history(owner, product_id).await?))
}
