use chrono::{NaiveDate, NaiveTime};
use clinic_core::error::AppError;
use sqlx::{PgConnection, Postgres, Transaction};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::{begin, commit, db_error, ensure_active_dentist, Database};
use crate::models::{
    Appointment, AppointmentRecord, AppointmentStatus, ListAppointmentsFilter, ScheduleSlot,
};
use crate::services::metrics::{record_appointment, QueryTimer};

const APPOINTMENT_PROJECTION: &str = r#"a.appointment_id, a.patient_id, a.dentist_id, a.appointment_date,
    a.start_time, a.duration_minutes, a.status, a.reason, a.notes, a.created_utc, a.updated_utc,
    p.first_name || ' ' || p.last_name AS patient_name,
    s.name AS dentist_name"#;

const APPOINTMENT_JOINS: &str = r#"JOIN patients p ON p.patient_id = a.patient_id
    JOIN staff s ON s.staff_id = a.dentist_id"#;

/// Identity and slot of a stored appointment, read under `FOR UPDATE`.
#[derive(Debug, sqlx::FromRow)]
struct LockedAppointment {
    dentist_id: Uuid,
    appointment_date: NaiveDate,
    start_time: NaiveTime,
    duration_minutes: i32,
}

impl Database {
    // -------------------------------------------------------------------------
    // Appointment Operations
    // -------------------------------------------------------------------------

    #[instrument(skip(self))]
    pub async fn list_appointments(
        &self,
        filter: &ListAppointmentsFilter,
        dentist_scope: Option<Uuid>,
    ) -> Result<Vec<Appointment>, AppError> {
        let _timer = QueryTimer::start("list_appointments");

        sqlx::query_as::<_, Appointment>(&format!(
            r#"
            SELECT {}
            FROM appointments a
            {}
            WHERE ($1::date IS NULL OR a.appointment_date = $1)
              AND ($2::date IS NULL OR a.appointment_date >= $2)
              AND ($3::date IS NULL OR a.appointment_date <= $3)
              AND ($4::uuid IS NULL OR a.dentist_id = $4)
              AND ($5::uuid IS NULL OR a.patient_id = $5)
              AND ($6::varchar IS NULL OR a.status = $6)
              AND ($7::uuid IS NULL OR a.dentist_id = $7)
            ORDER BY a.appointment_date, a.start_time
            "#,
            APPOINTMENT_PROJECTION, APPOINTMENT_JOINS
        ))
        .bind(filter.date)
        .bind(filter.from)
        .bind(filter.to)
        .bind(filter.dentist_id)
        .bind(filter.patient_id)
        .bind(filter.status.map(|s| s.as_str()))
        .bind(dentist_scope)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("Failed to list appointments"))
    }

    #[instrument(skip(self))]
    pub async fn get_appointment(
        &self,
        appointment_id: Uuid,
        dentist_scope: Option<Uuid>,
    ) -> Result<Option<Appointment>, AppError> {
        let _timer = QueryTimer::start("get_appointment");

        fetch_appointment(&self.pool, appointment_id, dentist_scope).await
    }

    /// Book an appointment. The double-booking check and the insert share one transaction.
    #[instrument(skip(self, input), fields(dentist_id = %input.dentist_id, date = %input.appointment_date))]
    pub async fn create_appointment(
        &self,
        input: &AppointmentRecord,
    ) -> Result<Appointment, AppError> {
        let _timer = QueryTimer::start("create_appointment");

        let mut tx = begin(&self.pool).await?;

        ensure_active_dentist(&mut tx, input.dentist_id).await?;
        if input.status.occupies_slot() {
            ensure_slot_free(&mut tx, input.dentist_id, input.appointment_date, input.slot(), None)
                .await?;
        }

        let appointment_id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO appointments (
                appointment_id, patient_id, dentist_id, appointment_date, start_time,
                duration_minutes, status, reason, notes
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(appointment_id)
        .bind(input.patient_id)
        .bind(input.dentist_id)
        .bind(input.appointment_date)
        .bind(input.start_time)
        .bind(input.duration_minutes)
        .bind(input.status.as_str())
        .bind(&input.reason)
        .bind(&input.notes)
        .execute(&mut *tx)
        .await
        .map_err(db_error("Failed to create appointment"))?;

        let appointment = fetch_appointment(&mut *tx, appointment_id, None)
            .await?
            .ok_or_else(|| AppError::InternalError(anyhow::anyhow!("Inserted appointment vanished")))?;

        commit(tx).await?;

        record_appointment(input.status.as_str());
        info!(
            appointment_id = %appointment_id,
            patient_id = %input.patient_id,
            "Appointment created"
        );

        Ok(appointment)
    }

    /// Full update within `dentist_scope`; `Ok(None)` when the row is not visible.
    #[instrument(skip(self, input), fields(dentist_id = %input.dentist_id))]
    pub async fn update_appointment(
        &self,
        appointment_id: Uuid,
        input: &AppointmentRecord,
        dentist_scope: Option<Uuid>,
    ) -> Result<Option<Appointment>, AppError> {
        let _timer = QueryTimer::start("update_appointment");

        let mut tx = begin(&self.pool).await?;

        if lock_appointment(&mut tx, appointment_id, dentist_scope)
            .await?
            .is_none()
        {
            tx.rollback().await.ok();
            return Ok(None);
        }

        ensure_active_dentist(&mut tx, input.dentist_id).await?;
        if input.status.occupies_slot() {
            ensure_slot_free(
                &mut tx,
                input.dentist_id,
                input.appointment_date,
                input.slot(),
                Some(appointment_id),
            )
            .await?;
        }

        sqlx::query(
            r#"
            UPDATE appointments
            SET patient_id = $2,
                dentist_id = $3,
                appointment_date = $4,
                start_time = $5,
                duration_minutes = $6,
                status = $7,
                reason = $8,
                notes = $9,
                updated_utc = NOW()
            WHERE appointment_id = $1
            "#,
        )
        .bind(appointment_id)
        .bind(input.patient_id)
        .bind(input.dentist_id)
        .bind(input.appointment_date)
        .bind(input.start_time)
        .bind(input.duration_minutes)
        .bind(input.status.as_str())
        .bind(&input.reason)
        .bind(&input.notes)
        .execute(&mut *tx)
        .await
        .map_err(db_error("Failed to update appointment"))?;

        let appointment = fetch_appointment(&mut *tx, appointment_id, None).await?;

        commit(tx).await?;

        info!(appointment_id = %appointment_id, status = input.status.as_str(), "Appointment updated");

        Ok(appointment)
    }

    /// Change only the status. Reopening a cancelled slot re-runs the double-booking check.
    #[instrument(skip(self))]
    pub async fn update_appointment_status(
        &self,
        appointment_id: Uuid,
        status: AppointmentStatus,
        dentist_scope: Option<Uuid>,
    ) -> Result<Option<Appointment>, AppError> {
        let _timer = QueryTimer::start("update_appointment_status");

        let mut tx = begin(&self.pool).await?;

        let Some(current) = lock_appointment(&mut tx, appointment_id, dentist_scope).await? else {
            tx.rollback().await.ok();
            return Ok(None);
        };

        if status.occupies_slot() {
            ensure_slot_free(
                &mut tx,
                current.dentist_id,
                current.appointment_date,
                ScheduleSlot::new(current.start_time, current.duration_minutes),
                Some(appointment_id),
            )
            .await?;
        }

        sqlx::query(
            "UPDATE appointments SET status = $2, updated_utc = NOW() WHERE appointment_id = $1",
        )
        .bind(appointment_id)
        .bind(status.as_str())
        .execute(&mut *tx)
        .await
        .map_err(db_error("Failed to update appointment status"))?;

        let appointment = fetch_appointment(&mut *tx, appointment_id, None).await?;

        commit(tx).await?;

        record_appointment(status.as_str());
        info!(appointment_id = %appointment_id, status = status.as_str(), "Appointment status changed");

        Ok(appointment)
    }

    #[instrument(skip(self))]
    pub async fn delete_appointment(
        &self,
        appointment_id: Uuid,
        dentist_scope: Option<Uuid>,
    ) -> Result<bool, AppError> {
        let _timer = QueryTimer::start("delete_appointment");

        let result = sqlx::query(
            r#"
            DELETE FROM appointments
            WHERE appointment_id = $1
              AND ($2::uuid IS NULL OR dentist_id = $2)
            "#,
        )
        .bind(appointment_id)
        .bind(dentist_scope)
        .execute(&self.pool)
        .await
        .map_err(db_error("Failed to delete appointment"))?;

        if result.rows_affected() > 0 {
            info!(appointment_id = %appointment_id, "Appointment deleted");
        }

        Ok(result.rows_affected() > 0)
    }
}

async fn fetch_appointment<'e, E>(
    executor: E,
    appointment_id: Uuid,
    dentist_scope: Option<Uuid>,
) -> Result<Option<Appointment>, AppError>
where
    E: sqlx::Executor<'e, Database = Postgres>,
{
    sqlx::query_as::<_, Appointment>(&format!(
        r#"
        SELECT {}
        FROM appointments a
        {}
        WHERE a.appointment_id = $1
          AND ($2::uuid IS NULL OR a.dentist_id = $2)
        "#,
        APPOINTMENT_PROJECTION, APPOINTMENT_JOINS
    ))
    .bind(appointment_id)
    .bind(dentist_scope)
    .fetch_optional(executor)
    .await
    .map_err(db_error("Failed to get appointment"))
}

async fn lock_appointment(
    tx: &mut Transaction<'static, Postgres>,
    appointment_id: Uuid,
    dentist_scope: Option<Uuid>,
) -> Result<Option<LockedAppointment>, AppError> {
    sqlx::query_as::<_, LockedAppointment>(
        r#"
        SELECT dentist_id, appointment_date, start_time, duration_minutes
        FROM appointments
        WHERE appointment_id = $1
          AND ($2::uuid IS NULL OR dentist_id = $2)
        FOR UPDATE
        "#,
    )
    .bind(appointment_id)
    .bind(dentist_scope)
    .fetch_optional(&mut **tx)
    .await
    .map_err(db_error("Failed to lock appointment"))
}

/// Serialise bookings per dentist and day, then reject any overlap with a
/// slot-occupying appointment other than `exclude`.
async fn ensure_slot_free(
    conn: &mut PgConnection,
    dentist_id: Uuid,
    date: NaiveDate,
    slot: ScheduleSlot,
    exclude: Option<Uuid>,
) -> Result<(), AppError> {
    if !slot.fits_in_day() {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Appointment must end on the day it starts"
        )));
    }

    sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
        .bind(format!("appointments:{}:{}", dentist_id, date))
        .execute(&mut *conn)
        .await
        .map_err(db_error("Failed to lock dentist schedule"))?;

    let booked = sqlx::query_as::<_, (Uuid, NaiveTime, i32)>(
        r#"
        SELECT appointment_id, start_time, duration_minutes
        FROM appointments
        WHERE dentist_id = $1
          AND appointment_date = $2
          AND status NOT IN ('cancelled', 'no_show')
          AND ($3::uuid IS NULL OR appointment_id <> $3)
        "#,
    )
    .bind(dentist_id)
    .bind(date)
    .bind(exclude)
    .fetch_all(&mut *conn)
    .await
    .map_err(db_error("Failed to load dentist schedule"))?;

    if let Some((other_id, _, _)) = booked
        .iter()
        .find(|(_, start, duration)| slot.overlaps(&ScheduleSlot::new(*start, *duration)))
    {
        warn!(
            dentist_id = %dentist_id,
            date = %date,
            conflicting_appointment = %other_id,
            "Double booking rejected"
        );
        return Err(AppError::Conflict(anyhow::anyhow!(
            "Dentist already has an appointment in that time slot"
        )));
    }

    Ok(())
}
