use axum::{extract::State, Json};
use clinic_core::error::AppError;

use crate::{
    middleware::CurrentUser, models::DashboardSummary, services::policy::dentist_scope,
    startup::AppState,
};

pub async fn get_dashboard(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<DashboardSummary>, AppError> {
    let summary = state.db.dashboard_summary(dentist_scope(&user)).await?;
    Ok(Json(summary))
}
