use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use clinic_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dtos::staff::{CreateStaffRequest, ListStaffQuery, UpdateStaffRequest},
    middleware::CurrentUser,
    models::Staff,
    services::policy::{require_role, ADMIN_ONLY},
    startup::AppState,
    utils::{hash_password, Password},
};

/// Directory of staff; visible to every role.
pub async fn list_staff(
    State(state): State<AppState>,
    _user: CurrentUser,
    Query(query): Query<ListStaffQuery>,
) -> Result<Json<Vec<Staff>>, AppError> {
    let staff = state.db.list_staff(&query.into()).await?;
    Ok(Json(staff))
}

pub async fn get_staff(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(staff_id): Path<Uuid>,
) -> Result<Json<Staff>, AppError> {
    let staff = state
        .db
        .get_staff(staff_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Staff member not found")))?;

    Ok(Json(staff))
}

pub async fn create_staff(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(payload): Json<CreateStaffRequest>,
) -> Result<(StatusCode, Json<Staff>), AppError> {
    require_role(&user, ADMIN_ONLY)?;
    payload.validate()?;

    let password_hash = hash_password(&Password::new(payload.password.as_str()))?;
    let staff = state.db.create_staff(&payload, &password_hash).await?;

    tracing::info!(
        staff_id = %staff.staff_id,
        created_by = %user.id,
        role = %staff.role,
        "Staff member added"
    );

    Ok((StatusCode::CREATED, Json(staff)))
}

pub async fn update_staff(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(staff_id): Path<Uuid>,
    Json(payload): Json<UpdateStaffRequest>,
) -> Result<Json<Staff>, AppError> {
    require_role(&user, ADMIN_ONLY)?;
    payload.validate()?;

    if staff_id == user.id && payload.active == Some(false) {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "You cannot deactivate your own account"
        )));
    }

    let password_hash = payload
        .password
        .as_ref()
        .map(|p| hash_password(&Password::new(p.as_str())))
        .transpose()?;

    let staff = state
        .db
        .update_staff(staff_id, &payload, password_hash.as_ref())
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Staff member not found")))?;

    Ok(Json(staff))
}

/// Soft delete: the account is deactivated, its history stays.
pub async fn deactivate_staff(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(staff_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    require_role(&user, ADMIN_ONLY)?;

    if staff_id == user.id {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "You cannot deactivate your own account"
        )));
    }

    if !state.db.deactivate_staff(staff_id).await? {
        return Err(AppError::NotFound(anyhow::anyhow!("Staff member not found")));
    }

    tracing::info!(staff_id = %staff_id, deactivated_by = %user.id, "Staff member deactivated");

    Ok(StatusCode::NO_CONTENT)
}
