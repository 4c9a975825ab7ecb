use clinic_core::error::AppError;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::{db_error, like_pattern, Database};
use crate::dtos::clean;
use crate::dtos::inventory::InventoryItemRequest;
use crate::models::{InventoryItem, ListInventoryFilter};
use crate::services::metrics::QueryTimer;

const INVENTORY_COLUMNS: &str = r#"item_id, name, category, sku, quantity, unit, reorder_level, unit_cost,
    supplier, expiry_date, (quantity <= reorder_level) AS low_stock, created_utc, updated_utc"#;

impl Database {
    // -------------------------------------------------------------------------
    // Inventory Operations
    // -------------------------------------------------------------------------

    #[instrument(skip(self))]
    pub async fn list_inventory(
        &self,
        filter: &ListInventoryFilter,
    ) -> Result<Vec<InventoryItem>, AppError> {
        let _timer = QueryTimer::start("list_inventory");

        let search = filter.search.as_deref().map(like_pattern);

        sqlx::query_as::<_, InventoryItem>(&format!(
            r#"
            SELECT {}
            FROM inventory_items
            WHERE ($1::varchar IS NULL OR name ILIKE $1 OR sku ILIKE $1 OR supplier ILIKE $1)
              AND ($2::varchar IS NULL OR LOWER(category) = LOWER($2))
              AND (NOT $3 OR quantity <= reorder_level)
            ORDER BY name
            "#,
            INVENTORY_COLUMNS
        ))
        .bind(search)
        .bind(filter.category.as_deref().map(str::trim))
        .bind(filter.low_stock)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("Failed to list inventory"))
    }

    #[instrument(skip(self))]
    pub async fn get_inventory_item(&self, item_id: Uuid) -> Result<Option<InventoryItem>, AppError> {
        let _timer = QueryTimer::start("get_inventory_item");

        sqlx::query_as::<_, InventoryItem>(&format!(
            "SELECT {} FROM inventory_items WHERE item_id = $1",
            INVENTORY_COLUMNS
        ))
        .bind(item_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("Failed to get inventory item"))
    }

    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create_inventory_item(
        &self,
        input: &InventoryItemRequest,
    ) -> Result<InventoryItem, AppError> {
        let _timer = QueryTimer::start("create_inventory_item");

        let item = sqlx::query_as::<_, InventoryItem>(&format!(
            r#"
            INSERT INTO inventory_items (
                item_id, name, category, sku, quantity, unit, reorder_level, unit_cost,
                supplier, expiry_date
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {}
            "#,
            INVENTORY_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(input.name.trim())
        .bind(clean(&input.category))
        .bind(clean(&input.sku))
        .bind(input.quantity)
        .bind(input.unit.trim())
        .bind(input.reorder_level)
        .bind(input.unit_cost)
        .bind(clean(&input.supplier))
        .bind(input.expiry_date)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                AppError::Conflict(anyhow::anyhow!(
                    "An item with SKU '{}' already exists",
                    input.sku.as_deref().unwrap_or_default()
                ))
            }
            other => db_error("Failed to create inventory item")(other),
        })?;

        info!(item_id = %item.item_id, quantity = item.quantity, "Inventory item created");

        Ok(item)
    }

    #[instrument(skip(self, input))]
    pub async fn update_inventory_item(
        &self,
        item_id: Uuid,
        input: &InventoryItemRequest,
    ) -> Result<Option<InventoryItem>, AppError> {
        let _timer = QueryTimer::start("update_inventory_item");

        let item = sqlx::query_as::<_, InventoryItem>(&format!(
            r#"
            UPDATE inventory_items
            SET name = $2,
                category = $3,
                sku = $4,
                quantity = $5,
                unit = $6,
                reorder_level = $7,
                unit_cost = $8,
                supplier = $9,
                expiry_date = $10,
                updated_utc = NOW()
            WHERE item_id = $1
            RETURNING {}
            "#,
            INVENTORY_COLUMNS
        ))
        .bind(item_id)
        .bind(input.name.trim())
        .bind(clean(&input.category))
        .bind(clean(&input.sku))
        .bind(input.quantity)
        .bind(input.unit.trim())
        .bind(input.reorder_level)
        .bind(input.unit_cost)
        .bind(clean(&input.supplier))
        .bind(input.expiry_date)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("Failed to update inventory item"))?;

        if item.is_some() {
            info!(item_id = %item_id, "Inventory item updated");
        }

        Ok(item)
    }

    #[instrument(skip(self))]
    pub async fn delete_inventory_item(&self, item_id: Uuid) -> Result<bool, AppError> {
        let _timer = QueryTimer::start("delete_inventory_item");

        let result = sqlx::query("DELETE FROM inventory_items WHERE item_id = $1")
            .bind(item_id)
            .execute(&self.pool)
            .await
            .map_err(db_error("Failed to delete inventory item"))?;

        if result.rows_affected() > 0 {
            info!(item_id = %item_id, "Inventory item deleted");
        }

        Ok(result.rows_affected() > 0)
    }

    /// Apply `quantity + delta` in a single statement; refused when stock would go negative.
    #[instrument(skip(self))]
    pub async fn adjust_stock(
        &self,
        item_id: Uuid,
        delta: i32,
        reason: Option<&str>,
    ) -> Result<Option<InventoryItem>, AppError> {
        let _timer = QueryTimer::start("adjust_stock");

        let item = sqlx::query_as::<_, InventoryItem>(&format!(
            r#"
            UPDATE inventory_items
            SET quantity = quantity + $2,
                updated_utc = NOW()
            WHERE item_id = $1
              AND quantity + $2 >= 0
            RETURNING {}
            "#,
            INVENTORY_COLUMNS
        ))
        .bind(item_id)
        .bind(delta)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("Failed to adjust stock"))?;

        match item {
            Some(item) => {
                info!(
                    item_id = %item_id,
                    delta = delta,
                    quantity = item.quantity,
                    reason = reason.unwrap_or(""),
                    "Stock adjusted"
                );
                if item.low_stock {
                    warn!(item_id = %item_id, quantity = item.quantity, "Item at or below reorder level");
                }
                Ok(Some(item))
            }
            None => match self.get_inventory_item(item_id).await? {
                Some(current) => Err(AppError::BadRequest(anyhow::anyhow!(
                    "Insufficient stock: {} on hand, adjustment of {}",
                    current.quantity,
                    delta
                ))),
                None => Ok(None),
            },
        }
    }
}
