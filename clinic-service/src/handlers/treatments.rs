use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{NaiveDate, Utc};
use clinic_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dtos::treatments::{ListTreatmentsQuery, TreatmentRequest},
    dtos::{check_amount, clean},
    middleware::CurrentUser,
    models::{ListTreatmentsFilter, Treatment, TreatmentRecord, TreatmentStatus},
    services::policy::{dentist_scope, ensure_owner, require_role, resolve_dentist, CLINICAL},
    startup::AppState,
};

fn not_found() -> AppError {
    AppError::NotFound(anyhow::anyhow!("Treatment not found"))
}

fn record(
    payload: &TreatmentRequest,
    dentist_id: Uuid,
    default_date: NaiveDate,
) -> Result<TreatmentRecord, AppError> {
    Ok(TreatmentRecord {
        patient_id: payload.patient_id,
        dentist_id,
        appointment_id: payload.appointment_id,
        treatment_name: payload.treatment_name.trim().to_string(),
        tooth_number: payload.tooth_number,
        description: clean(&payload.description),
        cost: check_amount("cost", payload.cost)?,
        status: payload.status.unwrap_or(TreatmentStatus::Planned),
        treatment_date: payload.treatment_date.unwrap_or(default_date),
        notes: clean(&payload.notes),
    })
}

pub async fn list_treatments(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<ListTreatmentsQuery>,
) -> Result<Json<Vec<Treatment>>, AppError> {
    let filter = ListTreatmentsFilter::from(query);
    let treatments = state
        .db
        .list_treatments(&filter, dentist_scope(&user))
        .await?;

    Ok(Json(treatments))
}

pub async fn get_treatment(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(treatment_id): Path<Uuid>,
) -> Result<Json<Treatment>, AppError> {
    let treatment = state
        .db
        .get_treatment(treatment_id, dentist_scope(&user))
        .await?
        .ok_or_else(not_found)?;

    Ok(Json(treatment))
}

pub async fn create_treatment(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(payload): Json<TreatmentRequest>,
) -> Result<(StatusCode, Json<Treatment>), AppError> {
    require_role(&user, CLINICAL)?;
    let dentist_id = resolve_dentist(&user, payload.dentist_id)?;
    payload.validate()?;

    let treatment = state
        .db
        .create_treatment(&record(&payload, dentist_id, Utc::now().date_naive())?)
        .await?;

    tracing::info!(
        treatment_id = %treatment.treatment_id,
        patient_id = %treatment.patient_id,
        dentist_id = %dentist_id,
        "Treatment recorded"
    );

    Ok((StatusCode::CREATED, Json(treatment)))
}

pub async fn update_treatment(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(treatment_id): Path<Uuid>,
    Json(payload): Json<TreatmentRequest>,
) -> Result<Json<Treatment>, AppError> {
    require_role(&user, CLINICAL)?;
    if let Some(dentist_id) = payload.dentist_id {
        ensure_owner(&user, dentist_id)?;
    }
    payload.validate()?;

    let scope = dentist_scope(&user);
    let current = state
        .db
        .get_treatment(treatment_id, scope)
        .await?
        .ok_or_else(not_found)?;

    let input = record(
        &payload,
        payload.dentist_id.unwrap_or(current.dentist_id),
        current.treatment_date,
    )?;
    let treatment = state
        .db
        .update_treatment(treatment_id, &input, scope)
        .await?
        .ok_or_else(not_found)?;

    Ok(Json(treatment))
}

pub async fn delete_treatment(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(treatment_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    require_role(&user, CLINICAL)?;

    if !state
        .db
        .delete_treatment(treatment_id, dentist_scope(&user))
        .await?
    {
        return Err(not_found());
    }

    Ok(StatusCode::NO_CONTENT)
}
