use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use validator::Validate;

use super::empty_string_as_none;
use crate::models::ListInventoryFilter;

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct InventoryItemRequest {
    #[validate(length(min = 1, max = 200, message = "Item name is required"))]
    pub name: String,
    #[validate(length(max = 100))]
    pub category: Option<String>,
    #[validate(length(max = 100))]
    pub sku: Option<String>,
    #[validate(range(min = 0, message = "Quantity cannot be negative"))]
    pub quantity: i32,
    #[validate(length(min = 1, max = 40, message = "Unit is required"))]
    pub unit: String,
    #[validate(range(min = 0, message = "Reorder level cannot be negative"))]
    #[serde(default)]
    pub reorder_level: i32,
    #[serde(default)]
    pub unit_cost: Decimal,
    #[validate(length(max = 200))]
    pub supplier: Option<String>,
    pub expiry_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AdjustStockRequest {
    #[validate(range(min = -100000, max = 100000))]
    pub delta: i32,
    #[validate(length(max = 200))]
    pub reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListInventoryQuery {
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub search: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub category: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub low_stock: Option<bool>,
}

impl From<ListInventoryQuery> for ListInventoryFilter {
    fn from(q: ListInventoryQuery) -> Self {
        Self {
            search: q.search,
            category: q.category,
            low_stock: q.low_stock.unwrap_or(false),
        }
    }
}
