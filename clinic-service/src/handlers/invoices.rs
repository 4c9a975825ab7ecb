//! Invoices, their line items and the payments recorded against them.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use clinic_core::error::AppError;
use rust_decimal::Decimal;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dtos::invoices::{
        check_due_date, checked_items, CreateInvoiceRequest, ListInvoicesQuery,
        RecordPaymentRequest, UpdateInvoiceRequest,
    },
    dtos::{check_amount, clean},
    middleware::CurrentUser,
    models::{Invoice, InvoiceDetail, InvoiceStatus, ListInvoicesFilter},
    services::database::{InvoiceDraft, PaymentDraft},
    services::policy::{require_role, FRONT_DESK},
    startup::AppState,
};

fn not_found() -> AppError {
    AppError::NotFound(anyhow::anyhow!("Invoice not found"))
}

pub async fn list_invoices(
    State(state): State<AppState>,
    _user: CurrentUser,
    Query(query): Query<ListInvoicesQuery>,
) -> Result<Json<Vec<Invoice>>, AppError> {
    let invoices = state
        .db
        .list_invoices(&ListInvoicesFilter::from(query))
        .await?;

    Ok(Json(invoices))
}

pub async fn get_invoice(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(invoice_id): Path<Uuid>,
) -> Result<Json<InvoiceDetail>, AppError> {
    let detail = state
        .db
        .get_invoice_detail(invoice_id)
        .await?
        .ok_or_else(not_found)?;

    Ok(Json(detail))
}

pub async fn create_invoice(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(payload): Json<CreateInvoiceRequest>,
) -> Result<(StatusCode, Json<InvoiceDetail>), AppError> {
    require_role(&user, FRONT_DESK)?;
    payload.validate()?;

    let invoice_date = payload
        .invoice_date
        .unwrap_or_else(|| Utc::now().date_naive());
    check_due_date(invoice_date, payload.due_date)?;

    let draft = InvoiceDraft {
        invoice_date,
        due_date: payload.due_date,
        notes: clean(&payload.notes),
        items: checked_items(&payload.items)?,
    };

    let detail = state.db.create_invoice(payload.patient_id, &draft).await?;

    tracing::info!(
        invoice_id = %detail.invoice.invoice_id,
        patient_id = %payload.patient_id,
        issued_by = %user.id,
        "Invoice issued"
    );

    Ok((StatusCode::CREATED, Json(detail)))
}

/// Replace header and items. `status` may only be set to `cancelled`.
pub async fn update_invoice(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(invoice_id): Path<Uuid>,
    Json(payload): Json<UpdateInvoiceRequest>,
) -> Result<Json<InvoiceDetail>, AppError> {
    require_role(&user, FRONT_DESK)?;
    payload.validate()?;

    let cancel = match payload.status {
        None => false,
        Some(InvoiceStatus::Cancelled) => true,
        Some(other) => {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Invoice status '{}' is derived from payments and cannot be set",
                other.as_str()
            )))
        }
    };
    check_due_date(payload.invoice_date, payload.due_date)?;

    let draft = InvoiceDraft {
        invoice_date: payload.invoice_date,
        due_date: payload.due_date,
        notes: clean(&payload.notes),
        items: checked_items(&payload.items)?,
    };

    let detail = state
        .db
        .update_invoice(invoice_id, &draft, cancel)
        .await?
        .ok_or_else(not_found)?;

    Ok(Json(detail))
}

pub async fn delete_invoice(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(invoice_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    require_role(&user, FRONT_DESK)?;

    if !state.db.delete_invoice(invoice_id).await? {
        return Err(not_found());
    }

    tracing::info!(invoice_id = %invoice_id, deleted_by = %user.id, "Invoice deleted");

    Ok(StatusCode::NO_CONTENT)
}

pub async fn record_payment(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(invoice_id): Path<Uuid>,
    Json(payload): Json<RecordPaymentRequest>,
) -> Result<(StatusCode, Json<InvoiceDetail>), AppError> {
    require_role(&user, FRONT_DESK)?;
    payload.validate()?;

    let amount = check_amount("amount", payload.amount)?;
    if amount <= Decimal::ZERO {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "amount must be greater than zero"
        )));
    }

    let draft = PaymentDraft {
        amount,
        method: payload.method,
        reference: clean(&payload.reference),
        paid_on: payload.paid_on.unwrap_or_else(|| Utc::now().date_naive()),
        notes: clean(&payload.notes),
    };

    let detail = state
        .db
        .record_payment(invoice_id, &draft)
        .await?
        .ok_or_else(not_found)?;

    Ok((StatusCode::CREATED, Json(detail)))
}

pub async fn delete_payment(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((invoice_id, payment_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<InvoiceDetail>, AppError> {
    require_role(&user, FRONT_DESK)?;

    let detail = state
        .db
        .delete_payment(invoice_id, payment_id)
        .await?
        .ok_or_else(not_found)?;

    tracing::info!(
        invoice_id = %invoice_id,
        payment_id = %payment_id,
        deleted_by = %user.id,
        "Payment removed"
    );

    Ok(Json(detail))
}
