//! Receipt operations

use chrono::NaiveDate;
use rusqlite::{params, OptionalExtension};

use super::{Database, DbConn};
use crate::error::{Error, Result};
use crate::import::ParsedReceipt;
use crate::models::{Receipt, ReceiptItem};

const RECEIPT_COLUMNS: &str = "id, store_name, purchased_on, printed_total, list_id, content_hash";

/// Result of storing an imported receipt
#[derive(Debug, Clone, PartialEq)]
pub enum ReceiptInsertResult {
    Created(Receipt),
    /// Same file was imported before
    Duplicate(Receipt),
}

impl ReceiptInsertResult {
    pub fn receipt(&self) -> &Receipt {
        match self {
            Self::Created(r) | Self::Duplicate(r) => r,
        }
    }
}

impl Database {
    /// Store an imported receipt with its line items
    ///
    /// A receipt whose content hash is already known is not stored again.
    pub fn create_receipt(&self, parsed: ParsedReceipt) -> Result<ReceiptInsertResult> {
        if let Some(existing) = self.find_receipt_by_hash(&parsed.content_hash)? {
            return Ok(ReceiptInsertResult::Duplicate(existing));
        }

        let receipt = parsed.into_receipt(self.next_id("receipt"));
        receipt.validate()?;

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO receipts (id, store_name, purchased_on, printed_total, content_hash)
             VALUES (?, ?, ?, ?, ?)",
            params![
                receipt.id,
                receipt.store_name,
                receipt.purchased_on.map(|d| d.to_string()),
                receipt.printed_total,
                receipt.content_hash,
            ],
        )?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO receipt_items (receipt_id, position, name, quantity, unit_price,
                 total_price, category, size, unit, confidence)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )?;
            for (position, item) in receipt.items.iter().enumerate() {
                stmt.execute(params![
                    receipt.id,
                    position as i64,
                    item.name,
                    item.quantity,
                    item.unit_price,
                    item.total_price,
                    item.category,
                    item.size,
                    item.unit,
                    item.confidence,
                ])?;
            }
        }
        tx.commit()?;

        Ok(ReceiptInsertResult::Created(receipt))
    }

    /// Get a receipt with its line items
    pub fn find_receipt(&self, id: &str) -> Result<Option<Receipt>> {
        self.find_receipt_where("id = ?", id)
    }

    /// Get receipt by content hash (for deduplication)
    pub fn find_receipt_by_hash(&self, content_hash: &str) -> Result<Option<Receipt>> {
        self.find_receipt_where("content_hash = ?", content_hash)
    }

    fn find_receipt_where(&self, condition: &str, value: &str) -> Result<Option<Receipt>> {
        let conn = self.conn()?;
        let receipt = conn
            .query_row(
                &format!("SELECT {} FROM receipts WHERE {}", RECEIPT_COLUMNS, condition),
                params![value],
                Self::row_to_receipt,
            )
            .optional()?;

        match receipt {
            Some(mut receipt) => {
                receipt.items = Self::load_receipt_items(&conn, &receipt.id)?;
                Ok(Some(receipt))
            }
            None => Ok(None),
        }
    }

    /// All receipts with their items, newest first
    pub fn list_receipts(&self) -> Result<Vec<Receipt>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM receipts ORDER BY created_at DESC, rowid DESC",
            RECEIPT_COLUMNS
        ))?;
        let mut receipts = stmt
            .query_map([], Self::row_to_receipt)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        for receipt in &mut receipts {
            receipt.items = Self::load_receipt_items(&conn, &receipt.id)?;
        }
        Ok(receipts)
    }

    /// Point a receipt at a shopping list
    pub fn set_receipt_list(&self, receipt_id: &str, list_id: &str) -> Result<()> {
        let conn = self.conn()?;
        let list_exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM shopping_lists WHERE id = ?)",
            params![list_id],
            |row| row.get(0),
        )?;
        if !list_exists {
            return Err(Error::NotFound(format!("shopping list {}", list_id)));
        }

        let updated = conn.execute(
            "UPDATE receipts SET list_id = ? WHERE id = ?",
            params![list_id, receipt_id],
        )?;
        if updated == 0 {
            return Err(Error::NotFound(format!("receipt {}", receipt_id)));
        }
        Ok(())
    }

    pub fn delete_receipt(&self, id: &str) -> Result<()> {
        let conn = self.conn()?;
        let deleted = conn.execute("DELETE FROM receipts WHERE id = ?", params![id])?;
        if deleted == 0 {
            return Err(Error::NotFound(format!("receipt {}", id)));
        }
        Ok(())
    }

    fn load_receipt_items(conn: &DbConn, receipt_id: &str) -> Result<Vec<ReceiptItem>> {
        let mut stmt = conn.prepare(
            "SELECT name, quantity, unit_price, total_price, category, size, unit, confidence
             FROM receipt_items WHERE receipt_id = ? ORDER BY position",
        )?;
        let items = stmt
            .query_map(params![receipt_id], |row| {
                Ok(ReceiptItem {
                    name: row.get(0)?,
                    quantity: row.get(1)?,
                    unit_price: row.get(2)?,
                    total_price: row.get(3)?,
                    category: row.get(4)?,
                    size: row.get(5)?,
                    unit: row.get(6)?,
                    confidence: row.get(7)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(items)
    }

    fn row_to_receipt(row: &rusqlite::Row) -> rusqlite::Result<Receipt> {
        let purchased_on: Option<String> = row.get(2)?;

        Ok(Receipt {
            id: row.get(0)?,
            store_name: row.get(1)?,
            purchased_on: purchased_on.and_then(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok()),
            printed_total: row.get(3)?,
            items: Vec::new(),
            list_id: row.get(4)?,
            content_hash: row.get(5)?,
        })
    }
}
