use clinic_core::error::AppError;
use tracing::{info, instrument};
use uuid::Uuid;

use super::{db_error, like_pattern, Database};
use crate::dtos::auth::UpdateProfileRequest;
use crate::dtos::clean;
use crate::dtos::staff::{CreateStaffRequest, UpdateStaffRequest};
use crate::models::{ListStaffFilter, Role, Staff};
use crate::services::metrics::QueryTimer;
use crate::utils::PasswordHashString;

const STAFF_COLUMNS: &str = "staff_id, name, email, phone, role, specialization, password_hash, active, created_utc, updated_utc";

impl Database {
    // -------------------------------------------------------------------------
    // Staff Operations
    // -------------------------------------------------------------------------

    #[instrument(skip(self))]
    pub async fn get_staff(&self, staff_id: Uuid) -> Result<Option<Staff>, AppError> {
        let _timer = QueryTimer::start("get_staff");

        sqlx::query_as::<_, Staff>(&format!(
            "SELECT {} FROM staff WHERE staff_id = $1",
            STAFF_COLUMNS
        ))
        .bind(staff_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("Failed to get staff member"))
    }

    /// Case-insensitive lookup used by login.
    #[instrument(skip(self))]
    pub async fn get_staff_by_email(&self, email: &str) -> Result<Option<Staff>, AppError> {
        let _timer = QueryTimer::start("get_staff_by_email");

        sqlx::query_as::<_, Staff>(&format!(
            "SELECT {} FROM staff WHERE LOWER(email) = LOWER($1)",
            STAFF_COLUMNS
        ))
        .bind(email.trim())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("Failed to look up staff by email"))
    }

    #[instrument(skip(self))]
    pub async fn list_staff(&self, filter: &ListStaffFilter) -> Result<Vec<Staff>, AppError> {
        let _timer = QueryTimer::start("list_staff");

        let search = filter.search.as_deref().map(like_pattern);

        sqlx::query_as::<_, Staff>(&format!(
            r#"
            SELECT {}
            FROM staff
            WHERE ($1::varchar IS NULL OR role = $1)
              AND ($2::boolean IS NULL OR active = $2)
              AND ($3::varchar IS NULL OR name ILIKE $3 OR email ILIKE $3)
            ORDER BY name
            "#,
            STAFF_COLUMNS
        ))
        .bind(filter.role.map(|r| r.as_str()))
        .bind(filter.active)
        .bind(search)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("Failed to list staff"))
    }

    #[instrument(skip(self, input, password_hash), fields(email = %input.email, role = %input.role))]
    pub async fn create_staff(
        &self,
        input: &CreateStaffRequest,
        password_hash: &PasswordHashString,
    ) -> Result<Staff, AppError> {
        let _timer = QueryTimer::start("create_staff");

        let staff = sqlx::query_as::<_, Staff>(&format!(
            r#"
            INSERT INTO staff (staff_id, name, email, phone, role, specialization, password_hash, active)
            VALUES ($1, $2, $3, $4, $5, $6, $7, TRUE)
            RETURNING {}
            "#,
            STAFF_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(input.name.trim())
        .bind(input.email.trim())
        .bind(clean(&input.phone))
        .bind(input.role.as_str())
        .bind(clean(&input.specialization))
        .bind(password_hash.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                AppError::Conflict(anyhow::anyhow!(
                    "A staff member with email '{}' already exists",
                    input.email
                ))
            }
            other => db_error("Failed to create staff member")(other),
        })?;

        info!(staff_id = %staff.staff_id, "Staff member created");

        Ok(staff)
    }

    /// Apply the fields present in `input`; absent fields keep their value.
    #[instrument(skip(self, input, password_hash))]
    pub async fn update_staff(
        &self,
        staff_id: Uuid,
        input: &UpdateStaffRequest,
        password_hash: Option<&PasswordHashString>,
    ) -> Result<Option<Staff>, AppError> {
        let _timer = QueryTimer::start("update_staff");

        let staff = sqlx::query_as::<_, Staff>(&format!(
            r#"
            UPDATE staff
            SET name = COALESCE($2, name),
                email = COALESCE($3, email),
                phone = COALESCE($4, phone),
                role = COALESCE($5, role),
                specialization = COALESCE($6, specialization),
                active = COALESCE($7, active),
                password_hash = COALESCE($8, password_hash),
                updated_utc = NOW()
            WHERE staff_id = $1
            RETURNING {}
            "#,
            STAFF_COLUMNS
        ))
        .bind(staff_id)
        .bind(clean(&input.name))
        .bind(clean(&input.email))
        .bind(clean(&input.phone))
        .bind(input.role.map(|r| r.as_str()))
        .bind(clean(&input.specialization))
        .bind(input.active)
        .bind(password_hash.map(|h| h.as_str()))
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                AppError::Conflict(anyhow::anyhow!(
                    "A staff member with that email already exists"
                ))
            }
            other => db_error("Failed to update staff member")(other),
        })?;

        if let Some(ref s) = staff {
            info!(staff_id = %s.staff_id, active = s.active, "Staff member updated");
        }

        Ok(staff)
    }

    #[instrument(skip(self, input, password_hash))]
    pub async fn update_profile(
        &self,
        staff_id: Uuid,
        input: &UpdateProfileRequest,
        password_hash: Option<&PasswordHashString>,
    ) -> Result<Option<Staff>, AppError> {
        let _timer = QueryTimer::start("update_profile");

        sqlx::query_as::<_, Staff>(&format!(
            r#"
            UPDATE staff
            SET name = COALESCE($2, name),
                phone = COALESCE($3, phone),
                password_hash = COALESCE($4, password_hash),
                updated_utc = NOW()
            WHERE staff_id = $1 AND active
            RETURNING {}
            "#,
            STAFF_COLUMNS
        ))
        .bind(staff_id)
        .bind(clean(&input.name))
        .bind(clean(&input.phone))
        .bind(password_hash.map(|h| h.as_str()))
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("Failed to update profile"))
    }

    /// Soft delete. Returns false when no such staff member exists.
    #[instrument(skip(self))]
    pub async fn deactivate_staff(&self, staff_id: Uuid) -> Result<bool, AppError> {
        let _timer = QueryTimer::start("deactivate_staff");

        let result = sqlx::query(
            "UPDATE staff SET active = FALSE, updated_utc = NOW() WHERE staff_id = $1",
        )
        .bind(staff_id)
        .execute(&self.pool)
        .await
        .map_err(db_error("Failed to deactivate staff member"))?;

        if result.rows_affected() > 0 {
            info!(staff_id = %staff_id, "Staff member deactivated");
        }

        Ok(result.rows_affected() > 0)
    }

    /// Create the first admin when the clinic has none. Returns the new account, if any.
    #[instrument(skip(self, password_hash))]
    pub async fn bootstrap_admin(
        &self,
        email: &str,
        password_hash: &PasswordHashString,
    ) -> Result<Option<Staff>, AppError> {
        let _timer = QueryTimer::start("bootstrap_admin");

        let admin_exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM staff WHERE role = $1 AND active)",
        )
        .bind(Role::Admin.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(db_error("Failed to check for an admin"))?;

        if admin_exists {
            return Ok(None);
        }

        let staff = sqlx::query_as::<_, Staff>(&format!(
            r#"
            INSERT INTO staff (staff_id, name, email, role, password_hash, active)
            VALUES ($1, 'Administrator', $2, $3, $4, TRUE)
            ON CONFLICT DO NOTHING
            RETURNING {}
            "#,
            STAFF_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(email.trim())
        .bind(Role::Admin.as_str())
        .bind(password_hash.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("Failed to create bootstrap admin"))?;

        if let Some(ref s) = staff {
            info!(staff_id = %s.staff_id, email = %s.email, "Bootstrap admin created");
        }

        Ok(staff)
    }
}
