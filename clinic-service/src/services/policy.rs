//! Role checks and the dentist ownership scope.
//!
//! Dentists only see and change appointments and treatments whose
//! `dentist_id` is their own staff id. Admins and receptionists are not
//! scoped. Role gates run before any query so a rejected request never
//! touches the database.

use clinic_core::error::AppError;
use uuid::Uuid;

use crate::middleware::CurrentUser;
use crate::models::Role;

pub const ADMIN_ONLY: &[Role] = &[Role::Admin];
/// Front desk: patients, appointments, billing and stock.
pub const FRONT_DESK: &[Role] = &[Role::Admin, Role::Receptionist];
/// Clinical records: treatments and chart edits.
pub const CLINICAL: &[Role] = &[Role::Admin, Role::Dentist];

pub fn require_role(user: &CurrentUser, allowed: &[Role]) -> Result<(), AppError> {
    if allowed.contains(&user.role) {
        Ok(())
    } else {
        tracing::warn!(
            staff_id = %user.id,
            role = %user.role,
            "Role not permitted for this action"
        );
        Err(AppError::Forbidden(anyhow::anyhow!(
            "Your role does not permit this action"
        )))
    }
}

/// `Some(own id)` for dentists; list and lookup queries AND it into `dentist_id = $n`.
pub fn dentist_scope(user: &CurrentUser) -> Option<Uuid> {
    match user.role {
        Role::Dentist => Some(user.id),
        Role::Admin | Role::Receptionist => None,
    }
}

pub fn ensure_owner(user: &CurrentUser, dentist_id: Uuid) -> Result<(), AppError> {
    match dentist_scope(user) {
        Some(own) if own != dentist_id => Err(AppError::Forbidden(anyhow::anyhow!(
            "Dentists may only manage their own records"
        ))),
        _ => Ok(()),
    }
}

/// Dentist a new appointment or treatment is booked for.
pub fn resolve_dentist(user: &CurrentUser, requested: Option<Uuid>) -> Result<Uuid, AppError> {
    match dentist_scope(user) {
        Some(own) => {
            ensure_owner(user, requested.unwrap_or(own))?;
            Ok(own)
        }
        None => requested
            .ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("dentist_id is required"))),
    }
}
