//! Appointment booking. Dentists see and manage only their own diary.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use clinic_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dtos::appointments::{AppointmentRequest, ListAppointmentsQuery, UpdateAppointmentStatusRequest},
    dtos::clean,
    middleware::CurrentUser,
    models::{Appointment, AppointmentRecord, AppointmentStatus, ListAppointmentsFilter},
    services::policy::{dentist_scope, ensure_owner, resolve_dentist},
    startup::AppState,
};

fn not_found() -> AppError {
    AppError::NotFound(anyhow::anyhow!("Appointment not found"))
}

fn record(payload: &AppointmentRequest, dentist_id: Uuid) -> AppointmentRecord {
    AppointmentRecord {
        patient_id: payload.patient_id,
        dentist_id,
        appointment_date: payload.appointment_date,
        start_time: payload.start_time,
        duration_minutes: payload.duration_minutes,
        status: payload.status.unwrap_or(AppointmentStatus::Scheduled),
        reason: clean(&payload.reason),
        notes: clean(&payload.notes),
    }
}

pub async fn list_appointments(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<ListAppointmentsQuery>,
) -> Result<Json<Vec<Appointment>>, AppError> {
    let filter = ListAppointmentsFilter::from(query);
    let appointments = state
        .db
        .list_appointments(&filter, dentist_scope(&user))
        .await?;

    Ok(Json(appointments))
}

pub async fn get_appointment(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Appointment>, AppError> {
    let appointment = state
        .db
        .get_appointment(appointment_id, dentist_scope(&user))
        .await?
        .ok_or_else(not_found)?;

    Ok(Json(appointment))
}

pub async fn create_appointment(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(payload): Json<AppointmentRequest>,
) -> Result<(StatusCode, Json<Appointment>), AppError> {
    let dentist_id = resolve_dentist(&user, payload.dentist_id)?;
    payload.validate()?;

    let appointment = state
        .db
        .create_appointment(&record(&payload, dentist_id))
        .await?;

    tracing::info!(
        appointment_id = %appointment.appointment_id,
        dentist_id = %dentist_id,
        booked_by = %user.id,
        "Appointment booked"
    );

    Ok((StatusCode::CREATED, Json(appointment)))
}

/// Full update. An omitted `dentist_id` keeps the current dentist.
pub async fn update_appointment(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(appointment_id): Path<Uuid>,
    Json(payload): Json<AppointmentRequest>,
) -> Result<Json<Appointment>, AppError> {
    if let Some(dentist_id) = payload.dentist_id {
        ensure_owner(&user, dentist_id)?;
    }
    payload.validate()?;

    let scope = dentist_scope(&user);
    let current = state
        .db
        .get_appointment(appointment_id, scope)
        .await?
        .ok_or_else(not_found)?;

    let dentist_id = payload.dentist_id.unwrap_or(current.dentist_id);
    let appointment = state
        .db
        .update_appointment(appointment_id, &record(&payload, dentist_id), scope)
        .await?
        .ok_or_else(not_found)?;

    Ok(Json(appointment))
}

pub async fn update_appointment_status(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(appointment_id): Path<Uuid>,
    Json(payload): Json<UpdateAppointmentStatusRequest>,
) -> Result<Json<Appointment>, AppError> {
    let appointment = state
        .db
        .update_appointment_status(appointment_id, payload.status, dentist_scope(&user))
        .await?
        .ok_or_else(not_found)?;

    Ok(Json(appointment))
}

pub async fn delete_appointment(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(appointment_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if !state
        .db
        .delete_appointment(appointment_id, dentist_scope(&user))
        .await?
    {
        return Err(not_found());
    }

    tracing::info!(appointment_id = %appointment_id, deleted_by = %user.id, "Appointment deleted");

    Ok(StatusCode::NO_CONTENT)
}
