use clinic_core::error::AppError;
use tracing::instrument;
use uuid::Uuid;

use super::{db_error, Database};
use crate::models::DashboardSummary;
use crate::services::metrics::QueryTimer;

impl Database {
    /// Front-page counters. Appointment counts honour `dentist_scope`.
    #[instrument(skip(self))]
    pub async fn dashboard_summary(
        &self,
        dentist_scope: Option<Uuid>,
    ) -> Result<DashboardSummary, AppError> {
        let _timer = QueryTimer::start("dashboard_summary");

        sqlx::query_as::<_, DashboardSummary>(
            r#"
            SELECT
                (SELECT COUNT(*) FROM appointments
                  WHERE appointment_date = CURRENT_DATE
                    AND status NOT IN ('cancelled', 'no_show')
                    AND ($1::uuid IS NULL OR dentist_id = $1)) AS today_appointments,
                (SELECT COUNT(*) FROM appointments
                  WHERE appointment_date > CURRENT_DATE
                    AND status IN ('scheduled', 'confirmed')
                    AND ($1::uuid IS NULL OR dentist_id = $1)) AS upcoming_appointments,
                (SELECT COUNT(*) FROM patients) AS total_patients,
                (SELECT COALESCE(SUM(balance_amount), 0) FROM invoices
                  WHERE status <> 'cancelled') AS outstanding_balance,
                (SELECT COUNT(*) FROM inventory_items
                  WHERE quantity <= reorder_level) AS low_stock_items
            "#,
        )
        .bind(dentist_scope)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error("Failed to load dashboard"))
    }
}
