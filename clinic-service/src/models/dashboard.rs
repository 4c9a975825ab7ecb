use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::FromRow;

/// Front-page counters.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct DashboardSummary {
    pub today_appointments: i64,
    pub upcoming_appointments: i64,
    pub total_patients: i64,
    pub outstanding_balance: Decimal,
    pub low_stock_items: i64,
}
