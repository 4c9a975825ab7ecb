//! Inventory (consumables and instruments) model.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct InventoryItem {
    pub item_id: Uuid,
    pub name: String,
    pub category: Option<String>,
    pub sku: Option<String>,
    pub quantity: i32,
    pub unit: String,
    pub reorder_level: i32,
    pub unit_cost: Decimal,
    pub supplier: Option<String>,
    pub expiry_date: Option<NaiveDate>,
    /// `quantity <= reorder_level`, computed by the query.
    pub low_stock: bool,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

/// Filter parameters for listing inventory.
#[derive(Debug, Clone, Default)]
pub struct ListInventoryFilter {
    pub search: Option<String>,
    pub category: Option<String>,
    pub low_stock: bool,
}
