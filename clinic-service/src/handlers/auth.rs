//! Login and the signed-in staff member's own profile.

use axum::{extract::State, Json};
use clinic_core::error::AppError;
use validator::Validate;

use crate::{
    dtos::auth::{LoginRequest, LoginResponse, UpdateProfileRequest},
    middleware::CurrentUser,
    models::Staff,
    startup::AppState,
    utils::{
        hash_password, verify_dummy_password, verify_password, Password, PasswordHashString,
    },
};

fn invalid_credentials() -> AppError {
    AppError::Unauthorized(anyhow::anyhow!("Invalid email or password"))
}

#[axum::debug_handler]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    payload.validate()?;

    let password = Password::new(payload.password);
    let staff = match state
        .db
        .get_staff_by_email(&payload.email)
        .await?
        .filter(|s| s.active)
    {
        Some(staff) => staff,
        None => {
            verify_dummy_password(&password);
            tracing::warn!(email = %payload.email, "Login for unknown or inactive account");
            return Err(invalid_credentials());
        }
    };

    let hash = PasswordHashString::new(staff.password_hash.clone());
    if let Err(e) = verify_password(&password, &hash) {
        tracing::warn!(staff_id = %staff.staff_id, error = %e, "Login rejected");
        return Err(invalid_credentials());
    }

    let access_token = state.jwt.generate_access_token(&staff)?;

    tracing::info!(staff_id = %staff.staff_id, role = %staff.role, "Staff member logged in");

    Ok(Json(LoginResponse {
        access_token,
        token_type: "Bearer".to_string(),
        expires_in: state.jwt.expires_in(),
        user: staff,
    }))
}

pub async fn get_me(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<Staff>, AppError> {
    let staff = state
        .db
        .get_staff(user.id)
        .await?
        .filter(|s| s.active)
        .ok_or_else(|| AppError::Unauthorized(anyhow::anyhow!("Account is no longer active")))?;

    Ok(Json(staff))
}

pub async fn update_me(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<Json<Staff>, AppError> {
    payload.validate()?;

    let password_hash = payload
        .password
        .as_ref()
        .map(|p| hash_password(&Password::new(p.as_str())))
        .transpose()?;

    let staff = state
        .db
        .update_profile(user.id, &payload, password_hash.as_ref())
        .await?
        .ok_or_else(|| AppError::Unauthorized(anyhow::anyhow!("Account is no longer active")))?;

    tracing::info!(
        staff_id = %user.id,
        password_changed = password_hash.is_some(),
        "Profile updated"
    );

    Ok(Json(staff))
}
