use chrono::{NaiveDate, Utc};
use clinic_core::error::AppError;
use rust_decimal::Decimal;
use sqlx::{PgConnection, Postgres};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::{begin, commit, db_error, Database};
use crate::dtos::invoices::InvoiceItemRequest;
use crate::models::{
    invoice_number, line_amount, max_money, Invoice, InvoiceDetail, InvoiceItem, InvoiceStatus,
    InvoiceTotals, ListInvoicesFilter, Payment, PaymentMethod,
};
use crate::services::metrics::{record_invoice, record_payment, QueryTimer};

const INVOICE_PROJECTION: &str = r#"i.invoice_id, i.invoice_number, i.patient_id, i.invoice_date, i.due_date,
    i.total_amount, i.paid_amount, i.balance_amount, i.status, i.notes, i.created_utc, i.updated_utc,
    p.first_name || ' ' || p.last_name AS patient_name"#;

/// Header fields written by create and update.
#[derive(Debug, Clone)]
pub struct InvoiceDraft {
    pub invoice_date: NaiveDate,
    pub due_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub items: Vec<InvoiceItemRequest>,
}

impl InvoiceDraft {
    /// Totals over the draft's items; out-of-range money is a client error.
    fn totals(&self, paid_amount: Decimal, cancelled: bool) -> Result<InvoiceTotals, AppError> {
        self.items
            .iter()
            .map(|item| line_amount(item.quantity, item.unit_price))
            .collect::<Option<Vec<_>>>()
            .and_then(|amounts| InvoiceTotals::compute(amounts, paid_amount, cancelled))
            .ok_or_else(amount_out_of_range)
    }
}

fn amount_out_of_range() -> AppError {
    AppError::BadRequest(anyhow::anyhow!(
        "Invoice amounts must not exceed {}",
        max_money()
    ))
}

/// A payment about to be recorded.
#[derive(Debug, Clone)]
pub struct PaymentDraft {
    pub amount: Decimal,
    pub method: PaymentMethod,
    pub reference: Option<String>,
    pub paid_on: NaiveDate,
    pub notes: Option<String>,
}

/// Header money columns read under `FOR UPDATE`.
#[derive(Debug, sqlx::FromRow)]
struct LockedInvoice {
    total_amount: Decimal,
    paid_amount: Decimal,
    balance_amount: Decimal,
    status: String,
}

impl LockedInvoice {
    fn is_cancelled(&self) -> bool {
        self.status == InvoiceStatus::Cancelled.as_str()
    }
}

impl Database {
    // -------------------------------------------------------------------------
    // Invoice Operations
    // -------------------------------------------------------------------------

    #[instrument(skip(self))]
    pub async fn list_invoices(&self, filter: &ListInvoicesFilter) -> Result<Vec<Invoice>, AppError> {
        let _timer = QueryTimer::start("list_invoices");

        sqlx::query_as::<_, Invoice>(&format!(
            r#"
            SELECT {}
            FROM invoices i
            JOIN patients p ON p.patient_id = i.patient_id
            WHERE ($1::uuid IS NULL OR i.patient_id = $1)
              AND ($2::varchar IS NULL OR i.status = $2)
              AND ($3::date IS NULL OR i.invoice_date >= $3)
              AND ($4::date IS NULL OR i.invoice_date <= $4)
            ORDER BY i.invoice_date DESC, i.created_utc DESC
            "#,
            INVOICE_PROJECTION
        ))
        .bind(filter.patient_id)
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.from)
        .bind(filter.to)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("Failed to list invoices"))
    }

    /// Invoice with its line items and payments.
    #[instrument(skip(self))]
    pub async fn get_invoice_detail(
        &self,
        invoice_id: Uuid,
    ) -> Result<Option<InvoiceDetail>, AppError> {
        let _timer = QueryTimer::start("get_invoice_detail");

        let mut conn = self.pool.acquire().await.map_err(db_error("Failed to acquire connection"))?;
        load_detail(&mut conn, invoice_id).await
    }

    /// Insert the header with computed totals and its items in one transaction.
    #[instrument(skip(self, draft), fields(patient_id = %patient_id, items = draft.items.len()))]
    pub async fn create_invoice(
        &self,
        patient_id: Uuid,
        draft: &InvoiceDraft,
    ) -> Result<InvoiceDetail, AppError> {
        let _timer = QueryTimer::start("create_invoice");

        let totals = draft.totals(Decimal::ZERO, false)?;
        let invoice_id = Uuid::new_v4();
        let number = invoice_number(Utc::now().date_naive(), invoice_id);

        let mut tx = begin(&self.pool).await?;

        sqlx::query(
            r#"
            INSERT INTO invoices (
                invoice_id, invoice_number, patient_id, invoice_date, due_date,
                total_amount, paid_amount, balance_amount, status, notes
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(invoice_id)
        .bind(&number)
        .bind(patient_id)
        .bind(draft.invoice_date)
        .bind(draft.due_date)
        .bind(totals.total_amount)
        .bind(totals.paid_amount)
        .bind(totals.balance_amount)
        .bind(totals.status.as_str())
        .bind(&draft.notes)
        .execute(&mut *tx)
        .await
        .map_err(db_error("Failed to create invoice"))?;

        insert_items(&mut tx, invoice_id, &draft.items).await?;

        let detail = load_detail(&mut tx, invoice_id)
            .await?
            .ok_or_else(|| AppError::InternalError(anyhow::anyhow!("Inserted invoice vanished")))?;

        commit(tx).await?;

        record_invoice(totals.status.as_str());
        info!(
            invoice_id = %invoice_id,
            invoice_number = %number,
            total_amount = %totals.total_amount,
            "Invoice created"
        );

        Ok(detail)
    }

    /// Replace the header fields and every line item, keeping recorded payments.
    #[instrument(skip(self, draft), fields(items = draft.items.len()))]
    pub async fn update_invoice(
        &self,
        invoice_id: Uuid,
        draft: &InvoiceDraft,
        cancel: bool,
    ) -> Result<Option<InvoiceDetail>, AppError> {
        let _timer = QueryTimer::start("update_invoice");

        let mut tx = begin(&self.pool).await?;

        let Some(current) = lock_invoice(&mut tx, invoice_id).await? else {
            tx.rollback().await.ok();
            return Ok(None);
        };

        if current.is_cancelled() {
            tx.rollback().await.ok();
            return Err(AppError::Conflict(anyhow::anyhow!(
                "Cancelled invoices cannot be edited"
            )));
        }

        let totals = match draft.totals(current.paid_amount, cancel) {
            Ok(totals) => totals,
            Err(e) => {
                tx.rollback().await.ok();
                return Err(e);
            }
        };
        if totals.total_amount < current.paid_amount {
            tx.rollback().await.ok();
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Invoice total {} is below the amount already paid ({})",
                totals.total_amount,
                current.paid_amount
            )));
        }

        sqlx::query(
            r#"
            UPDATE invoices
            SET invoice_date = $2,
                due_date = $3,
                notes = $4,
                total_amount = $5,
                paid_amount = $6,
                balance_amount = $7,
                status = $8,
                updated_utc = NOW()
            WHERE invoice_id = $1
            "#,
        )
        .bind(invoice_id)
        .bind(draft.invoice_date)
        .bind(draft.due_date)
        .bind(&draft.notes)
        .bind(totals.total_amount)
        .bind(totals.paid_amount)
        .bind(totals.balance_amount)
        .bind(totals.status.as_str())
        .execute(&mut *tx)
        .await
        .map_err(db_error("Failed to update invoice"))?;

        sqlx::query("DELETE FROM invoice_items WHERE invoice_id = $1")
            .bind(invoice_id)
            .execute(&mut *tx)
            .await
            .map_err(db_error("Failed to clear invoice items"))?;

        insert_items(&mut tx, invoice_id, &draft.items).await?;

        let detail = load_detail(&mut tx, invoice_id).await?;

        commit(tx).await?;

        if cancel {
            record_invoice(InvoiceStatus::Cancelled.as_str());
        }
        info!(
            invoice_id = %invoice_id,
            total_amount = %totals.total_amount,
            status = totals.status.as_str(),
            "Invoice updated"
        );

        Ok(detail)
    }

    /// Delete payments, items and the invoice in one transaction.
    #[instrument(skip(self))]
    pub async fn delete_invoice(&self, invoice_id: Uuid) -> Result<bool, AppError> {
        let _timer = QueryTimer::start("delete_invoice");

        let mut tx = begin(&self.pool).await?;

        sqlx::query("DELETE FROM payments WHERE invoice_id = $1")
            .bind(invoice_id)
            .execute(&mut *tx)
            .await
            .map_err(db_error("Failed to delete invoice payments"))?;

        sqlx::query("DELETE FROM invoice_items WHERE invoice_id = $1")
            .bind(invoice_id)
            .execute(&mut *tx)
            .await
            .map_err(db_error("Failed to delete invoice items"))?;

        let result = sqlx::query("DELETE FROM invoices WHERE invoice_id = $1")
            .bind(invoice_id)
            .execute(&mut *tx)
            .await
            .map_err(db_error("Failed to delete invoice"))?;

        if result.rows_affected() == 0 {
            tx.rollback().await.ok();
            return Ok(false);
        }

        commit(tx).await?;

        info!(invoice_id = %invoice_id, "Invoice deleted");

        Ok(true)
    }

    // -------------------------------------------------------------------------
    // Payment Operations
    // -------------------------------------------------------------------------

    /// Record a payment and move the header's paid, balance and status columns.
    #[instrument(skip(self, draft), fields(amount = %draft.amount, method = draft.method.as_str()))]
    pub async fn record_payment(
        &self,
        invoice_id: Uuid,
        draft: &PaymentDraft,
    ) -> Result<Option<InvoiceDetail>, AppError> {
        let _timer = QueryTimer::start("record_payment");

        let mut tx = begin(&self.pool).await?;

        let Some(current) = lock_invoice(&mut tx, invoice_id).await? else {
            tx.rollback().await.ok();
            return Ok(None);
        };

        if current.is_cancelled() {
            tx.rollback().await.ok();
            return Err(AppError::Conflict(anyhow::anyhow!(
                "Payments cannot be recorded on a cancelled invoice"
            )));
        }

        if draft.amount > current.balance_amount {
            tx.rollback().await.ok();
            warn!(
                invoice_id = %invoice_id,
                balance_amount = %current.balance_amount,
                "Over-payment rejected"
            );
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Payment of {} exceeds the outstanding balance of {}",
                draft.amount,
                current.balance_amount
            )));
        }

        let payment_id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO payments (payment_id, invoice_id, amount, method, reference, paid_on, notes)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(payment_id)
        .bind(invoice_id)
        .bind(draft.amount)
        .bind(draft.method.as_str())
        .bind(&draft.reference)
        .bind(draft.paid_on)
        .bind(&draft.notes)
        .execute(&mut *tx)
        .await
        .map_err(db_error("Failed to record payment"))?;

        let totals = InvoiceTotals::from_total(
            current.total_amount,
            current.paid_amount + draft.amount,
            false,
        );
        write_totals(&mut tx, invoice_id, &totals).await?;

        let detail = load_detail(&mut tx, invoice_id).await?;

        commit(tx).await?;

        record_payment(draft.method.as_str());
        info!(
            invoice_id = %invoice_id,
            payment_id = %payment_id,
            balance_amount = %totals.balance_amount,
            status = totals.status.as_str(),
            "Payment recorded"
        );

        Ok(detail)
    }

    /// Remove a payment and recompute the header from the payments that remain.
    #[instrument(skip(self))]
    pub async fn delete_payment(
        &self,
        invoice_id: Uuid,
        payment_id: Uuid,
    ) -> Result<Option<InvoiceDetail>, AppError> {
        let _timer = QueryTimer::start("delete_payment");

        let mut tx = begin(&self.pool).await?;

        let Some(current) = lock_invoice(&mut tx, invoice_id).await? else {
            tx.rollback().await.ok();
            return Ok(None);
        };

        let result = sqlx::query("DELETE FROM payments WHERE payment_id = $1 AND invoice_id = $2")
            .bind(payment_id)
            .bind(invoice_id)
            .execute(&mut *tx)
            .await
            .map_err(db_error("Failed to delete payment"))?;

        if result.rows_affected() == 0 {
            tx.rollback().await.ok();
            return Err(AppError::NotFound(anyhow::anyhow!("Payment not found")));
        }

        let paid_amount = sqlx::query_scalar::<_, Decimal>(
            "SELECT COALESCE(SUM(amount), 0) FROM payments WHERE invoice_id = $1",
        )
        .bind(invoice_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_error("Failed to sum payments"))?;

        let totals =
            InvoiceTotals::from_total(current.total_amount, paid_amount, current.is_cancelled());
        write_totals(&mut tx, invoice_id, &totals).await?;

        let detail = load_detail(&mut tx, invoice_id).await?;

        commit(tx).await?;

        info!(
            invoice_id = %invoice_id,
            payment_id = %payment_id,
            balance_amount = %totals.balance_amount,
            "Payment deleted"
        );

        Ok(detail)
    }
}

async fn lock_invoice(
    conn: &mut PgConnection,
    invoice_id: Uuid,
) -> Result<Option<LockedInvoice>, AppError> {
    sqlx::query_as::<_, LockedInvoice>(
        r#"
        SELECT total_amount, paid_amount, balance_amount, status
        FROM invoices
        WHERE invoice_id = $1
        FOR UPDATE
        "#,
    )
    .bind(invoice_id)
    .fetch_optional(&mut *conn)
    .await
    .map_err(db_error("Failed to lock invoice"))
}

async fn write_totals(
    conn: &mut PgConnection,
    invoice_id: Uuid,
    totals: &InvoiceTotals,
) -> Result<(), AppError> {
    sqlx::query(
        r#"
        UPDATE invoices
        SET total_amount = $2,
            paid_amount = $3,
            balance_amount = $4,
            status = $5,
            updated_utc = NOW()
        WHERE invoice_id = $1
        "#,
    )
    .bind(invoice_id)
    .bind(totals.total_amount)
    .bind(totals.paid_amount)
    .bind(totals.balance_amount)
    .bind(totals.status.as_str())
    .execute(&mut *conn)
    .await
    .map_err(db_error("Failed to update invoice totals"))?;

    Ok(())
}

async fn insert_items(
    conn: &mut PgConnection,
    invoice_id: Uuid,
    items: &[InvoiceItemRequest],
) -> Result<(), AppError> {
    for (position, item) in items.iter().enumerate() {
        let amount =
            line_amount(item.quantity, item.unit_price).ok_or_else(amount_out_of_range)?;

        sqlx::query(
            r#"
            INSERT INTO invoice_items (
                item_id, invoice_id, treatment_id, description, quantity, unit_price, amount, sort_order
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(invoice_id)
        .bind(item.treatment_id)
        .bind(item.description.trim())
        .bind(item.quantity)
        .bind(item.unit_price)
        .bind(amount)
        .bind(position as i32)
        .execute(&mut *conn)
        .await
        .map_err(db_error("Failed to insert invoice item"))?;
    }

    Ok(())
}

async fn fetch_invoice<'e, E>(executor: E, invoice_id: Uuid) -> Result<Option<Invoice>, AppError>
where
    E: sqlx::Executor<'e, Database = Postgres>,
{
    sqlx::query_as::<_, Invoice>(&format!(
        r#"
        SELECT {}
        FROM invoices i
        JOIN patients p ON p.patient_id = i.patient_id
        WHERE i.invoice_id = $1
        "#,
        INVOICE_PROJECTION
    ))
    .bind(invoice_id)
    .fetch_optional(executor)
    .await
    .map_err(db_error("Failed to get invoice"))
}

async fn load_detail(
    conn: &mut PgConnection,
    invoice_id: Uuid,
) -> Result<Option<InvoiceDetail>, AppError> {
    let Some(invoice) = fetch_invoice(&mut *conn, invoice_id).await? else {
        return Ok(None);
    };

    let items = sqlx::query_as::<_, InvoiceItem>(
        r#"
        SELECT item_id, invoice_id, treatment_id, description, quantity, unit_price, amount, sort_order
        FROM invoice_items
        WHERE invoice_id = $1
        ORDER BY sort_order
        "#,
    )
    .bind(invoice_id)
    .fetch_all(&mut *conn)
    .await
    .map_err(db_error("Failed to load invoice items"))?;

    let payments = sqlx::query_as::<_, Payment>(
        r#"
        SELECT payment_id, invoice_id, amount, method, reference, paid_on, notes, created_utc
        FROM payments
        WHERE invoice_id = $1
        ORDER BY paid_on, created_utc
        "#,
    )
    .bind(invoice_id)
    .fetch_all(&mut *conn)
    .await
    .map_err(db_error("Failed to load payments"))?;

    Ok(Some(InvoiceDetail {
        invoice,
        items,
        payments,
    }))
}
