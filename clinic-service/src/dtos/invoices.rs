use chrono::NaiveDate;
use clinic_core::error::AppError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::{check_amount, empty_string_as_none};
use crate::models::{InvoiceStatus, ListInvoicesFilter, PaymentMethod};

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct InvoiceItemRequest {
    pub treatment_id: Option<Uuid>,
    #[validate(length(min = 1, max = 500, message = "Item description is required"))]
    pub description: String,
    #[validate(range(min = 1, max = 10000, message = "Quantity must be at least 1"))]
    pub quantity: i32,
    pub unit_price: Decimal,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateInvoiceRequest {
    pub patient_id: Uuid,
    /// Defaults to today.
    pub invoice_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub notes: Option<String>,
    #[validate(length(min = 1, message = "An invoice needs at least one item"), nested)]
    pub items: Vec<InvoiceItemRequest>,
}

/// Replaces the header fields and every line item.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdateInvoiceRequest {
    pub invoice_date: NaiveDate,
    pub due_date: Option<NaiveDate>,
    pub notes: Option<String>,
    /// Only `cancelled` may be set explicitly; other statuses follow the balance.
    pub status: Option<InvoiceStatus>,
    #[validate(length(min = 1, message = "An invoice needs at least one item"), nested)]
    pub items: Vec<InvoiceItemRequest>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RecordPaymentRequest {
    pub amount: Decimal,
    pub method: PaymentMethod,
    #[validate(length(max = 200))]
    pub reference: Option<String>,
    /// Defaults to today.
    pub paid_on: Option<NaiveDate>,
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListInvoicesQuery {
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub patient_id: Option<Uuid>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub status: Option<InvoiceStatus>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub from: Option<NaiveDate>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub to: Option<NaiveDate>,
}

impl From<ListInvoicesQuery> for ListInvoicesFilter {
    fn from(q: ListInvoicesQuery) -> Self {
        Self {
            patient_id: q.patient_id,
            status: q.status,
            from: q.from,
            to: q.to,
        }
    }
}

/// Rejects negative or sub-cent prices and returns the items with prices rounded.
pub fn checked_items(items: &[InvoiceItemRequest]) -> Result<Vec<InvoiceItemRequest>, AppError> {
    items
        .iter()
        .map(|item| {
            Ok(InvoiceItemRequest {
                unit_price: check_amount("unit_price", item.unit_price)?,
                ..item.clone()
            })
        })
        .collect()
}

pub fn check_due_date(invoice_date: NaiveDate, due_date: Option<NaiveDate>) -> Result<(), AppError> {
    match due_date {
        Some(due) if due < invoice_date => Err(AppError::BadRequest(anyhow::anyhow!(
            "Due date cannot be before the invoice date"
        ))),
        _ => Ok(()),
    }
}
