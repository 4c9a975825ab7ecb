use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use clinic_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dtos::patients::{ListPatientsQuery, PatientRequest},
    middleware::CurrentUser,
    models::{ListPatientsFilter, Page, Patient, PatientHistory},
    services::policy::{dentist_scope, require_role, FRONT_DESK},
    startup::AppState,
};

fn not_found() -> AppError {
    AppError::NotFound(anyhow::anyhow!("Patient not found"))
}

pub async fn list_patients(
    State(state): State<AppState>,
    _user: CurrentUser,
    Query(query): Query<ListPatientsQuery>,
) -> Result<Json<Page<Patient>>, AppError> {
    let filter = ListPatientsFilter::from(query);
    let (items, total) = state.db.list_patients(&filter).await?;

    Ok(Json(Page {
        items,
        total,
        page: filter.page.max(1),
        page_size: filter.limit(),
    }))
}

pub async fn get_patient(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(patient_id): Path<Uuid>,
) -> Result<Json<Patient>, AppError> {
    let patient = state.db.get_patient(patient_id).await?.ok_or_else(not_found)?;
    Ok(Json(patient))
}

pub async fn get_patient_history(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(patient_id): Path<Uuid>,
) -> Result<Json<PatientHistory>, AppError> {
    let history = state
        .db
        .get_patient_history(patient_id, dentist_scope(&user))
        .await?
        .ok_or_else(not_found)?;

    Ok(Json(history))
}

pub async fn create_patient(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(payload): Json<PatientRequest>,
) -> Result<(StatusCode, Json<Patient>), AppError> {
    require_role(&user, FRONT_DESK)?;
    payload.validate()?;

    let patient = state.db.create_patient(&payload).await?;

    tracing::info!(patient_id = %patient.patient_id, created_by = %user.id, "Patient registered");

    Ok((StatusCode::CREATED, Json(patient)))
}

/// Every role may correct a patient's chart details.
pub async fn update_patient(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(patient_id): Path<Uuid>,
    Json(payload): Json<PatientRequest>,
) -> Result<Json<Patient>, AppError> {
    payload.validate()?;

    let patient = state
        .db
        .update_patient(patient_id, &payload)
        .await?
        .ok_or_else(not_found)?;

    tracing::info!(patient_id = %patient_id, updated_by = %user.id, "Patient updated");

    Ok(Json(patient))
}

pub async fn delete_patient(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(patient_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    require_role(&user, FRONT_DESK)?;

    if !state.db.delete_patient(patient_id).await? {
        return Err(not_found());
    }

    Ok(StatusCode::NO_CONTENT)
}
