use clinic_core::error::AppError;
use tracing::{info, instrument};
use uuid::Uuid;

use super::{begin, commit, db_error, like_pattern, Database};
use crate::dtos::clean;
use crate::dtos::patients::PatientRequest;
use crate::models::{
    ListAppointmentsFilter, ListInvoicesFilter, ListPatientsFilter, ListTreatmentsFilter,
    Patient, PatientHistory,
};
use crate::services::metrics::QueryTimer;

const PATIENT_COLUMNS: &str = r#"patient_id, first_name, last_name, date_of_birth, gender, phone, email,
    address, medical_history, allergies, insurance_provider, insurance_number,
    emergency_contact_name, emergency_contact_phone, created_utc, updated_utc"#;

const PATIENT_SEARCH: &str = r#"($1::varchar IS NULL
       OR first_name ILIKE $1
       OR last_name ILIKE $1
       OR (first_name || ' ' || last_name) ILIKE $1
       OR phone ILIKE $1
       OR email ILIKE $1)"#;

impl Database {
    // -------------------------------------------------------------------------
    // Patient Operations
    // -------------------------------------------------------------------------

    /// One page of patients plus the total matching count.
    #[instrument(skip(self))]
    pub async fn list_patients(
        &self,
        filter: &ListPatientsFilter,
    ) -> Result<(Vec<Patient>, i64), AppError> {
        let _timer = QueryTimer::start("list_patients");

        let search = filter.search.as_deref().map(like_pattern);

        let patients = sqlx::query_as::<_, Patient>(&format!(
            r#"
            SELECT {}
            FROM patients
            WHERE {}
            ORDER BY last_name, first_name, patient_id
            LIMIT $2 OFFSET $3
            "#,
            PATIENT_COLUMNS, PATIENT_SEARCH
        ))
        .bind(&search)
        .bind(filter.limit())
        .bind(filter.offset())
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("Failed to list patients"))?;

        let total = sqlx::query_scalar::<_, i64>(&format!(
            "SELECT COUNT(*) FROM patients WHERE {}",
            PATIENT_SEARCH
        ))
        .bind(&search)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error("Failed to count patients"))?;

        Ok((patients, total))
    }

    #[instrument(skip(self))]
    pub async fn get_patient(&self, patient_id: Uuid) -> Result<Option<Patient>, AppError> {
        let _timer = QueryTimer::start("get_patient");

        sqlx::query_as::<_, Patient>(&format!(
            "SELECT {} FROM patients WHERE patient_id = $1",
            PATIENT_COLUMNS
        ))
        .bind(patient_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("Failed to get patient"))
    }

    /// Chart view. Appointments and treatments honour `dentist_scope`.
    #[instrument(skip(self))]
    pub async fn get_patient_history(
        &self,
        patient_id: Uuid,
        dentist_scope: Option<Uuid>,
    ) -> Result<Option<PatientHistory>, AppError> {
        let Some(patient) = self.get_patient(patient_id).await? else {
            return Ok(None);
        };

        let appointments = self
            .list_appointments(
                &ListAppointmentsFilter {
                    patient_id: Some(patient_id),
                    ..Default::default()
                },
                dentist_scope,
            )
            .await?;

        let treatments = self
            .list_treatments(
                &ListTreatmentsFilter {
                    patient_id: Some(patient_id),
                    ..Default::default()
                },
                dentist_scope,
            )
            .await?;

        let invoices = self
            .list_invoices(&ListInvoicesFilter {
                patient_id: Some(patient_id),
                ..Default::default()
            })
            .await?;

        Ok(Some(PatientHistory {
            patient,
            appointments,
            treatments,
            invoices,
        }))
    }

    #[instrument(skip(self, input))]
    pub async fn create_patient(&self, input: &PatientRequest) -> Result<Patient, AppError> {
        let _timer = QueryTimer::start("create_patient");

        let patient = sqlx::query_as::<_, Patient>(&format!(
            r#"
            INSERT INTO patients (
                patient_id, first_name, last_name, date_of_birth, gender, phone, email,
                address, medical_history, allergies, insurance_provider, insurance_number,
                emergency_contact_name, emergency_contact_phone
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            RETURNING {}
            "#,
            PATIENT_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(input.first_name.trim())
        .bind(input.last_name.trim())
        .bind(input.date_of_birth)
        .bind(clean(&input.gender))
        .bind(clean(&input.phone))
        .bind(clean(&input.email))
        .bind(clean(&input.address))
        .bind(clean(&input.medical_history))
        .bind(clean(&input.allergies))
        .bind(clean(&input.insurance_provider))
        .bind(clean(&input.insurance_number))
        .bind(clean(&input.emergency_contact_name))
        .bind(clean(&input.emergency_contact_phone))
        .fetch_one(&self.pool)
        .await
        .map_err(db_error("Failed to create patient"))?;

        info!(patient_id = %patient.patient_id, "Patient created");

        Ok(patient)
    }

    /// Replace every editable column.
    #[instrument(skip(self, input))]
    pub async fn update_patient(
        &self,
        patient_id: Uuid,
        input: &PatientRequest,
    ) -> Result<Option<Patient>, AppError> {
        let _timer = QueryTimer::start("update_patient");

        let patient = sqlx::query_as::<_, Patient>(&format!(
            r#"
            UPDATE patients
            SET first_name = $2,
                last_name = $3,
                date_of_birth = $4,
                gender = $5,
                phone = $6,
                email = $7,
                address = $8,
                medical_history = $9,
                allergies = $10,
                insurance_provider = $11,
                insurance_number = $12,
                emergency_contact_name = $13,
                emergency_contact_phone = $14,
                updated_utc = NOW()
            WHERE patient_id = $1
            RETURNING {}
            "#,
            PATIENT_COLUMNS
        ))
        .bind(patient_id)
        .bind(input.first_name.trim())
        .bind(input.last_name.trim())
        .bind(input.date_of_birth)
        .bind(clean(&input.gender))
        .bind(clean(&input.phone))
        .bind(clean(&input.email))
        .bind(clean(&input.address))
        .bind(clean(&input.medical_history))
        .bind(clean(&input.allergies))
        .bind(clean(&input.insurance_provider))
        .bind(clean(&input.insurance_number))
        .bind(clean(&input.emergency_contact_name))
        .bind(clean(&input.emergency_contact_phone))
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("Failed to update patient"))?;

        if patient.is_some() {
            info!(patient_id = %patient_id, "Patient updated");
        }

        Ok(patient)
    }

    /// Delete a patient with their appointments and treatments.
    /// Refused while any invoice references the patient.
    #[instrument(skip(self))]
    pub async fn delete_patient(&self, patient_id: Uuid) -> Result<bool, AppError> {
        let _timer = QueryTimer::start("delete_patient");

        let mut tx = begin(&self.pool).await?;

        let has_invoices = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM invoices WHERE patient_id = $1)",
        )
        .bind(patient_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_error("Failed to check patient invoices"))?;

        if has_invoices {
            tx.rollback().await.ok();
            return Err(AppError::Conflict(anyhow::anyhow!(
                "Patient has invoices and cannot be deleted"
            )));
        }

        let result = sqlx::query("DELETE FROM patients WHERE patient_id = $1")
            .bind(patient_id)
            .execute(&mut *tx)
            .await
            .map_err(db_error("Failed to delete patient"))?;

        commit(tx).await?;

        if result.rows_affected() > 0 {
            info!(patient_id = %patient_id, "Patient deleted");
        }

        Ok(result.rows_affected() > 0)
    }
}
