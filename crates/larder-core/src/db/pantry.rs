//! Pantry item operations

use chrono::Utc;
use rusqlite::{params, OptionalExtension};

use super::{format_datetime, parse_datetime, Database};
use crate::error::{Error, Result};
use crate::models::{PantryItem, StockLevel};
use crate::store::DEFAULT_CATEGORY;

const PANTRY_COLUMNS: &str = "id, name, category, stock_level, last_known_price, updated_at";

impl Database {
    /// Add a pantry item
    pub fn create_pantry_item(
        &self,
        name: &str,
        category: Option<&str>,
        stock_level: StockLevel,
        price: Option<f64>,
    ) -> Result<PantryItem> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::Validation("pantry item name is empty".into()));
        }

        let item = PantryItem {
            id: self.next_id("pantry"),
            name: name.to_string(),
            category: category
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .unwrap_or(DEFAULT_CATEGORY)
                .to_string(),
            stock_level,
            last_known_price: price,
            updated_at: Some(Utc::now()),
        };

        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO pantry_items (id, name, category, stock_level, last_known_price, updated_at)
             VALUES (?, ?, ?, ?, ?, ?)",
            params![
                item.id,
                item.name,
                item.category,
                item.stock_level.as_str(),
                item.last_known_price,
                item.updated_at.as_ref().map(format_datetime),
            ],
        )?;
        Ok(item)
    }

    /// Get a pantry item by ID
    pub fn find_pantry_item(&self, id: &str) -> Result<Option<PantryItem>> {
        let conn = self.conn()?;
        let item = conn
            .query_row(
                &format!("SELECT {} FROM pantry_items WHERE id = ?", PANTRY_COLUMNS),
                params![id],
                Self::row_to_pantry_item,
            )
            .optional()?;
        Ok(item)
    }

    /// List pantry items, optionally only those at one stock level
    pub fn list_pantry_items(&self, stock_level: Option<StockLevel>) -> Result<Vec<PantryItem>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM pantry_items
             WHERE ?1 IS NULL OR stock_level = ?1
             ORDER BY category, name COLLATE NOCASE, id",
            PANTRY_COLUMNS
        ))?;

        let items = stmt
            .query_map(params![stock_level.map(|s| s.as_str())], Self::row_to_pantry_item)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(items)
    }

    /// Set the stock level by hand
    pub fn set_stock_level(&self, id: &str, stock_level: StockLevel) -> Result<()> {
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE pantry_items SET stock_level = ?, updated_at = ? WHERE id = ?",
            params![stock_level.as_str(), format_datetime(&Utc::now()), id],
        )?;
        if updated == 0 {
            return Err(Error::NotFound(format!("pantry item {}", id)));
        }
        Ok(())
    }

    /// Mark an item stocked, keeping the old price when none is given
    pub fn restock_item(&self, id: &str, price: Option<f64>) -> Result<()> {
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE pantry_items
             SET stock_level = 'stocked',
                 last_known_price = COALESCE(?, last_known_price),
                 updated_at = ?
             WHERE id = ?",
            params![price, format_datetime(&Utc::now()), id],
        )?;
        if updated == 0 {
            return Err(Error::NotFound(format!("pantry item {}", id)));
        }
        Ok(())
    }

    pub fn delete_pantry_item(&self, id: &str) -> Result<()> {
        let conn = self.conn()?;
        let deleted = conn.execute("DELETE FROM pantry_items WHERE id = ?", params![id])?;
        if deleted == 0 {
            return Err(Error::NotFound(format!("pantry item {}", id)));
        }
        Ok(())
    }

    fn row_to_pantry_item(row: &rusqlite::Row) -> rusqlite::Result<PantryItem> {
        let stock_level: String = row.get(3)?;
        let updated_at: Option<String> = row.get(5)?;

        Ok(PantryItem {
            id: row.get(0)?,
            name: row.get(1)?,
            category: row.get(2)?,
            stock_level: stock_level.parse().unwrap_or_default(),
            last_known_price: row.get(4)?,
            updated_at: updated_at.map(|s| parse_datetime(&s)),
        })
    }
}
