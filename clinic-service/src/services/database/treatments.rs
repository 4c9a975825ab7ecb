use clinic_core::error::AppError;
use sqlx::{PgConnection, Postgres};
use tracing::{info, instrument};
use uuid::Uuid;

use super::{begin, commit, db_error, ensure_active_dentist, Database};
use crate::models::{ListTreatmentsFilter, Treatment, TreatmentRecord};
use crate::services::metrics::QueryTimer;

const TREATMENT_PROJECTION: &str = r#"t.treatment_id, t.patient_id, t.dentist_id, t.appointment_id,
    t.treatment_name, t.tooth_number, t.description, t.cost, t.status, t.treatment_date, t.notes,
    t.created_utc, t.updated_utc,
    p.first_name || ' ' || p.last_name AS patient_name,
    s.name AS dentist_name"#;

const TREATMENT_JOINS: &str = r#"JOIN patients p ON p.patient_id = t.patient_id
    JOIN staff s ON s.staff_id = t.dentist_id"#;

impl Database {
    // -------------------------------------------------------------------------
    // Treatment Operations
    // -------------------------------------------------------------------------

    #[instrument(skip(self))]
    pub async fn list_treatments(
        &self,
        filter: &ListTreatmentsFilter,
        dentist_scope: Option<Uuid>,
    ) -> Result<Vec<Treatment>, AppError> {
        let _timer = QueryTimer::start("list_treatments");

        sqlx::query_as::<_, Treatment>(&format!(
            r#"
            SELECT {}
            FROM treatments t
            {}
            WHERE ($1::uuid IS NULL OR t.patient_id = $1)
              AND ($2::uuid IS NULL OR t.dentist_id = $2)
              AND ($3::varchar IS NULL OR t.status = $3)
              AND ($4::date IS NULL OR t.treatment_date >= $4)
              AND ($5::date IS NULL OR t.treatment_date <= $5)
              AND ($6::uuid IS NULL OR t.dentist_id = $6)
            ORDER BY t.treatment_date DESC, t.created_utc DESC
            "#,
            TREATMENT_PROJECTION, TREATMENT_JOINS
        ))
        .bind(filter.patient_id)
        .bind(filter.dentist_id)
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.from)
        .bind(filter.to)
        .bind(dentist_scope)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("Failed to list treatments"))
    }

    #[instrument(skip(self))]
    pub async fn get_treatment(
        &self,
        treatment_id: Uuid,
        dentist_scope: Option<Uuid>,
    ) -> Result<Option<Treatment>, AppError> {
        let _timer = QueryTimer::start("get_treatment");

        fetch_treatment(&self.pool, treatment_id, dentist_scope).await
    }

    #[instrument(skip(self, input), fields(patient_id = %input.patient_id, dentist_id = %input.dentist_id))]
    pub async fn create_treatment(&self, input: &TreatmentRecord) -> Result<Treatment, AppError> {
        let _timer = QueryTimer::start("create_treatment");

        let mut tx = begin(&self.pool).await?;

        check_references(&mut tx, input).await?;

        let treatment_id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO treatments (
                treatment_id, patient_id, dentist_id, appointment_id, treatment_name,
                tooth_number, description, cost, status, treatment_date, notes
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(treatment_id)
        .bind(input.patient_id)
        .bind(input.dentist_id)
        .bind(input.appointment_id)
        .bind(&input.treatment_name)
        .bind(input.tooth_number)
        .bind(&input.description)
        .bind(input.cost)
        .bind(input.status.as_str())
        .bind(input.treatment_date)
        .bind(&input.notes)
        .execute(&mut *tx)
        .await
        .map_err(db_error("Failed to create treatment"))?;

        let treatment = fetch_treatment(&mut *tx, treatment_id, None)
            .await?
            .ok_or_else(|| AppError::InternalError(anyhow::anyhow!("Inserted treatment vanished")))?;

        commit(tx).await?;

        info!(treatment_id = %treatment_id, "Treatment created");

        Ok(treatment)
    }

    #[instrument(skip(self, input))]
    pub async fn update_treatment(
        &self,
        treatment_id: Uuid,
        input: &TreatmentRecord,
        dentist_scope: Option<Uuid>,
    ) -> Result<Option<Treatment>, AppError> {
        let _timer = QueryTimer::start("update_treatment");

        let mut tx = begin(&self.pool).await?;

        check_references(&mut tx, input).await?;

        let result = sqlx::query(
            r#"
            UPDATE treatments
            SET patient_id = $3,
                dentist_id = $4,
                appointment_id = $5,
                treatment_name = $6,
                tooth_number = $7,
                description = $8,
                cost = $9,
                status = $10,
                treatment_date = $11,
                notes = $12,
                updated_utc = NOW()
            WHERE treatment_id = $1
              AND ($2::uuid IS NULL OR dentist_id = $2)
            "#,
        )
        .bind(treatment_id)
        .bind(dentist_scope)
        .bind(input.patient_id)
        .bind(input.dentist_id)
        .bind(input.appointment_id)
        .bind(&input.treatment_name)
        .bind(input.tooth_number)
        .bind(&input.description)
        .bind(input.cost)
        .bind(input.status.as_str())
        .bind(input.treatment_date)
        .bind(&input.notes)
        .execute(&mut *tx)
        .await
        .map_err(db_error("Failed to update treatment"))?;

        if result.rows_affected() == 0 {
            tx.rollback().await.ok();
            return Ok(None);
        }

        let treatment = fetch_treatment(&mut *tx, treatment_id, None).await?;

        commit(tx).await?;

        info!(treatment_id = %treatment_id, status = input.status.as_str(), "Treatment updated");

        Ok(treatment)
    }

    #[instrument(skip(self))]
    pub async fn delete_treatment(
        &self,
        treatment_id: Uuid,
        dentist_scope: Option<Uuid>,
    ) -> Result<bool, AppError> {
        let _timer = QueryTimer::start("delete_treatment");

        let result = sqlx::query(
            r#"
            DELETE FROM treatments
            WHERE treatment_id = $1
              AND ($2::uuid IS NULL OR dentist_id = $2)
            "#,
        )
        .bind(treatment_id)
        .bind(dentist_scope)
        .execute(&self.pool)
        .await
        .map_err(db_error("Failed to delete treatment"))?;

        if result.rows_affected() > 0 {
            info!(treatment_id = %treatment_id, "Treatment deleted");
        }

        Ok(result.rows_affected() > 0)
    }
}

async fn fetch_treatment<'e, E>(
    executor: E,
    treatment_id: Uuid,
    dentist_scope: Option<Uuid>,
) -> Result<Option<Treatment>, AppError>
where
    E: sqlx::Executor<'e, Database = Postgres>,
{
    sqlx::query_as::<_, Treatment>(&format!(
        r#"
        SELECT {}
        FROM treatments t
        {}
        WHERE t.treatment_id = $1
          AND ($2::uuid IS NULL OR t.dentist_id = $2)
        "#,
        TREATMENT_PROJECTION, TREATMENT_JOINS
    ))
    .bind(treatment_id)
    .bind(dentist_scope)
    .fetch_optional(executor)
    .await
    .map_err(db_error("Failed to get treatment"))
}

/// The dentist must be an active dentist and a linked appointment must be the same patient's.
async fn check_references(conn: &mut PgConnection, input: &TreatmentRecord) -> Result<(), AppError> {
    ensure_active_dentist(&mut *conn, input.dentist_id).await?;

    if let Some(appointment_id) = input.appointment_id {
        let appointment_patient = sqlx::query_scalar::<_, Uuid>(
            "SELECT patient_id FROM appointments WHERE appointment_id = $1",
        )
        .bind(appointment_id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(db_error("Failed to check appointment"))?;

        if appointment_patient != Some(input.patient_id) {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "appointment_id must reference an appointment of the same patient"
            )));
        }
    }

    Ok(())
}
