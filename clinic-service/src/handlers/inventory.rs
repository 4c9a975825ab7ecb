use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use clinic_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dtos::check_amount,
    dtos::inventory::{AdjustStockRequest, InventoryItemRequest, ListInventoryQuery},
    middleware::CurrentUser,
    models::{InventoryItem, ListInventoryFilter},
    services::policy::{require_role, FRONT_DESK},
    startup::AppState,
};

fn not_found() -> AppError {
    AppError::NotFound(anyhow::anyhow!("Inventory item not found"))
}

fn checked(payload: InventoryItemRequest) -> Result<InventoryItemRequest, AppError> {
    Ok(InventoryItemRequest {
        unit_cost: check_amount("unit_cost", payload.unit_cost)?,
        ..payload
    })
}

pub async fn list_inventory(
    State(state): State<AppState>,
    _user: CurrentUser,
    Query(query): Query<ListInventoryQuery>,
) -> Result<Json<Vec<InventoryItem>>, AppError> {
    let items = state
        .db
        .list_inventory(&ListInventoryFilter::from(query))
        .await?;

    Ok(Json(items))
}

pub async fn get_inventory_item(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(item_id): Path<Uuid>,
) -> Result<Json<InventoryItem>, AppError> {
    let item = state
        .db
        .get_inventory_item(item_id)
        .await?
        .ok_or_else(not_found)?;

    Ok(Json(item))
}

pub async fn create_inventory_item(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(payload): Json<InventoryItemRequest>,
) -> Result<(StatusCode, Json<InventoryItem>), AppError> {
    require_role(&user, FRONT_DESK)?;
    payload.validate()?;

    let item = state.db.create_inventory_item(&checked(payload)?).await?;

    Ok((StatusCode::CREATED, Json(item)))
}

pub async fn update_inventory_item(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(item_id): Path<Uuid>,
    Json(payload): Json<InventoryItemRequest>,
) -> Result<Json<InventoryItem>, AppError> {
    require_role(&user, FRONT_DESK)?;
    payload.validate()?;

    let item = state
        .db
        .update_inventory_item(item_id, &checked(payload)?)
        .await?
        .ok_or_else(not_found)?;

    Ok(Json(item))
}

pub async fn delete_inventory_item(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(item_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    require_role(&user, FRONT_DESK)?;

    if !state.db.delete_inventory_item(item_id).await? {
        return Err(not_found());
    }

    Ok(StatusCode::NO_CONTENT)
}

/// Receive or consume stock: `quantity += delta`, never below zero.
pub async fn adjust_stock(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(item_id): Path<Uuid>,
    Json(payload): Json<AdjustStockRequest>,
) -> Result<Json<InventoryItem>, AppError> {
    require_role(&user, FRONT_DESK)?;
    payload.validate()?;

    if payload.delta == 0 {
        return Err(AppError::BadRequest(anyhow::anyhow!("delta must not be zero")));
    }

    let item = state
        .db
        .adjust_stock(item_id, payload.delta, payload.reason.as_deref())
        .await?
        .ok_or_else(not_found)?;

    Ok(Json(item))
}
