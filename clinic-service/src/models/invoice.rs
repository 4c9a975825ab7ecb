//! Invoice, line item and payment models plus balance bookkeeping.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::str::FromStr;
use uuid::Uuid;

/// Invoice status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Pending,
    Partial,
    Paid,
    Cancelled,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Pending => "pending",
            InvoiceStatus::Partial => "partial",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Cancelled => "cancelled",
        }
    }
}

impl FromStr for InvoiceStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(InvoiceStatus::Pending),
            "partial" => Ok(InvoiceStatus::Partial),
            "paid" => Ok(InvoiceStatus::Paid),
            "cancelled" => Ok(InvoiceStatus::Cancelled),
            other => Err(format!("Unknown invoice status: {}", other)),
        }
    }
}

/// Payment method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Card,
    Insurance,
    BankTransfer,
    Other,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Card => "card",
            PaymentMethod::Insurance => "insurance",
            PaymentMethod::BankTransfer => "bank_transfer",
            PaymentMethod::Other => "other",
        }
    }
}

/// Invoice header joined with the patient's name.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Invoice {
    pub invoice_id: Uuid,
    pub invoice_number: String,
    pub patient_id: Uuid,
    pub invoice_date: NaiveDate,
    pub due_date: Option<NaiveDate>,
    pub total_amount: Decimal,
    pub paid_amount: Decimal,
    pub balance_amount: Decimal,
    pub status: String,
    pub notes: Option<String>,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
    pub patient_name: String,
}

/// Line item on an invoice.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct InvoiceItem {
    pub item_id: Uuid,
    pub invoice_id: Uuid,
    pub treatment_id: Option<Uuid>,
    pub description: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub amount: Decimal,
    pub sort_order: i32,
}

/// Payment recorded against an invoice.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Payment {
    pub payment_id: Uuid,
    pub invoice_id: Uuid,
    pub amount: Decimal,
    pub method: String,
    pub reference: Option<String>,
    pub paid_on: NaiveDate,
    pub notes: Option<String>,
    pub created_utc: DateTime<Utc>,
}

/// Invoice with its items and payments.
#[derive(Debug, Serialize)]
pub struct InvoiceDetail {
    pub invoice: Invoice,
    pub items: Vec<InvoiceItem>,
    pub payments: Vec<Payment>,
}

/// Filter parameters for listing invoices.
#[derive(Debug, Clone, Default)]
pub struct ListInvoicesFilter {
    pub patient_id: Option<Uuid>,
    pub status: Option<InvoiceStatus>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

/// `INV-YYYYMMDD-XXXXXX`: issue date plus the first six hex digits of the invoice id.
pub fn invoice_number(issued_on: NaiveDate, invoice_id: Uuid) -> String {
    let suffix: String = invoice_id.simple().to_string().chars().take(6).collect();
    format!("INV-{}-{}", issued_on.format("%Y%m%d"), suffix.to_uppercase())
}

/// Largest value a `NUMERIC(12, 2)` money column holds.
pub fn max_money() -> Decimal {
    Decimal::new(999_999_999_999, 2)
}

/// Amount of one line, rounded to cents. `None` when it does not fit a money column.
pub fn line_amount(quantity: i32, unit_price: Decimal) -> Option<Decimal> {
    Decimal::from(quantity)
        .checked_mul(unit_price)
        .map(|amount| amount.round_dp(2))
        .filter(|amount| *amount <= max_money())
}

/// Header figures derived from line amounts and money received.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvoiceTotals {
    pub total_amount: Decimal,
    pub paid_amount: Decimal,
    pub balance_amount: Decimal,
    pub status: InvoiceStatus,
}

impl InvoiceTotals {
    /// `balance = total - paid`; a cancelled invoice keeps its status.
    ///
    /// `None` when the total overflows or exceeds [`max_money`].
    pub fn compute<I>(line_amounts: I, paid_amount: Decimal, cancelled: bool) -> Option<Self>
    where
        I: IntoIterator<Item = Decimal>,
    {
        let total_amount = line_amounts
            .into_iter()
            .try_fold(Decimal::ZERO, |total, amount| total.checked_add(amount))
            .filter(|total| *total <= max_money())?;
        Some(Self::from_total(total_amount, paid_amount, cancelled))
    }

    pub fn from_total(total_amount: Decimal, paid_amount: Decimal, cancelled: bool) -> Self {
        let balance_amount = total_amount - paid_amount;

        let status = if cancelled {
            InvoiceStatus::Cancelled
        } else if total_amount > Decimal::ZERO && balance_amount <= Decimal::ZERO {
            InvoiceStatus::Paid
        } else if paid_amount > Decimal::ZERO {
            InvoiceStatus::Partial
        } else {
            InvoiceStatus::Pending
        };

        Self {
            total_amount,
            paid_amount,
            balance_amount,
            status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn invoice_number_has_date_and_id_suffix() {
        let id = Uuid::parse_str("3f9a12c4-0000-4000-8000-000000000000").unwrap();
        let day = NaiveDate::from_ymd_opt(2025, 2, 7).unwrap();
        assert_eq!(invoice_number(day, id), "INV-20250207-3F9A12");
    }

    #[test]
    fn line_amount_multiplies_and_rounds() {
        assert_eq!(line_amount(3, dec("19.999")), Some(dec("60.00")));
        assert_eq!(line_amount(1, dec("120.50")), Some(dec("120.50")));
    }

    #[test]
    fn oversized_amounts_are_refused() {
        assert_eq!(line_amount(2, Decimal::MAX), None);
        assert_eq!(line_amount(10_000, dec("9999999999.99")), None);
        assert_eq!(line_amount(1, max_money()), Some(max_money()));

        assert!(InvoiceTotals::compute([Decimal::MAX, Decimal::MAX], Decimal::ZERO, false).is_none());
        assert!(InvoiceTotals::compute([max_money(), dec("0.01")], Decimal::ZERO, false).is_none());
    }

    #[test]
    fn unpaid_invoice_is_pending_with_full_balance() {
        let totals =
            InvoiceTotals::compute([dec("80.00"), dec("45.50")], Decimal::ZERO, false).unwrap();
        assert_eq!(totals.total_amount, dec("125.50"));
        assert_eq!(totals.balance_amount, dec("125.50"));
        assert_eq!(totals.status, InvoiceStatus::Pending);
    }

    #[test]
    fn partial_payment_reduces_balance() {
        let totals = InvoiceTotals::from_total(dec("200.00"), dec("50.00"), false);
        assert_eq!(totals.balance_amount, dec("150.00"));
        assert_eq!(totals.status, InvoiceStatus::Partial);
    }

    #[test]
    fn settled_invoice_is_paid() {
        let totals = InvoiceTotals::from_total(dec("200.00"), dec("200.00"), false);
        assert_eq!(totals.balance_amount, Decimal::ZERO);
        assert_eq!(totals.status, InvoiceStatus::Paid);
    }

    #[test]
    fn zero_total_is_not_paid() {
        let totals = InvoiceTotals::compute(Vec::<Decimal>::new(), Decimal::ZERO, false).unwrap();
        assert_eq!(totals.status, InvoiceStatus::Pending);
    }

    #[test]
    fn cancellation_wins_over_payment_state() {
        let totals = InvoiceTotals::from_total(dec("90.00"), dec("90.00"), true);
        assert_eq!(totals.status, InvoiceStatus::Cancelled);
        assert_eq!(totals.balance_amount, Decimal::ZERO);
    }
}
