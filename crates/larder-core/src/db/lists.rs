//! Shopping list operations

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};

use super::{format_datetime, parse_datetime, Database, DbConn};
use crate::error::{Error, Result};
use crate::models::{ListStatus, ShoppingList, ShoppingListItem};

impl Database {
    /// Create an empty, active shopping list
    pub fn create_list(&self, name: &str, budget: Option<f64>) -> Result<ShoppingList> {
        let list = ShoppingList::new(self.next_id("list"), name.trim(), budget);
        if list.name.is_empty() {
            return Err(Error::Validation("list name is empty".into()));
        }
        list.validate()?;

        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO shopping_lists (id, name, budget, status) VALUES (?, ?, ?, ?)",
            params![list.id, list.name, list.budget, list.status.as_str()],
        )?;
        Ok(list)
    }

    /// Append an item to a list
    pub fn add_list_item(&self, list_id: &str, item: &ShoppingListItem) -> Result<()> {
        if item.name.trim().is_empty() {
            return Err(Error::Validation("list item name is empty".into()));
        }

        let conn = self.conn()?;
        let status: Option<String> = conn
            .query_row(
                "SELECT status FROM shopping_lists WHERE id = ?",
                params![list_id],
                |row| row.get(0),
            )
            .optional()?;
        let status: ListStatus = status
            .ok_or_else(|| Error::NotFound(format!("shopping list {}", list_id)))?
            .parse()
            .unwrap_or_default();
        if !status.can_complete() {
            return Err(Error::InvalidState(format!(
                "list {} is {}; items can no longer be added",
                list_id, status
            )));
        }

        conn.execute(
            "INSERT INTO list_items (list_id, position, name, quantity, priority, pantry_item_id)
             VALUES (?1, (SELECT COALESCE(MAX(position), -1) + 1 FROM list_items WHERE list_id = ?1),
                     ?2, ?3, ?4, ?5)",
            params![
                list_id,
                item.name.trim(),
                item.quantity,
                item.priority.as_str(),
                item.pantry_item_id,
            ],
        )?;
        Ok(())
    }

    /// Get a list with its items
    pub fn find_list(&self, id: &str) -> Result<Option<ShoppingList>> {
        let conn = self.conn()?;
        let list = conn
            .query_row(
                "SELECT id, name, budget, status, completed_at FROM shopping_lists WHERE id = ?",
                params![id],
                Self::row_to_list,
            )
            .optional()?;

        match list {
            Some(mut list) => {
                list.items = Self::load_list_items(&conn, &list.id)?;
                Ok(Some(list))
            }
            None => Ok(None),
        }
    }

    /// All lists (with items), newest first, optionally filtered by status
    pub fn list_lists(&self, status: Option<ListStatus>) -> Result<Vec<ShoppingList>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, name, budget, status, completed_at FROM shopping_lists
             WHERE ?1 IS NULL OR status = ?1
             ORDER BY created_at DESC, rowid DESC",
        )?;
        let mut lists = stmt
            .query_map(params![status.map(|s| s.as_str())], Self::row_to_list)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        for list in &mut lists {
            list.items = Self::load_list_items(&conn, &list.id)?;
        }
        Ok(lists)
    }

    /// Move a list between active, shopping and archived
    ///
    /// Completion goes through trip completion, not here.
    pub fn set_list_status(&self, id: &str, status: ListStatus) -> Result<()> {
        if status == ListStatus::Completed {
            return Err(Error::InvalidState(
                "lists are completed by finishing a trip".into(),
            ));
        }
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE shopping_lists SET status = ? WHERE id = ?",
            params![status.as_str(), id],
        )?;
        if updated == 0 {
            return Err(Error::NotFound(format!("shopping list {}", id)));
        }
        Ok(())
    }

    /// Record list completion
    pub fn mark_list_completed(&self, id: &str, completed_at: DateTime<Utc>) -> Result<()> {
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE shopping_lists SET status = 'completed', completed_at = ? WHERE id = ?",
            params![format_datetime(&completed_at), id],
        )?;
        if updated == 0 {
            return Err(Error::NotFound(format!("shopping list {}", id)));
        }
        Ok(())
    }

    fn load_list_items(conn: &DbConn, list_id: &str) -> Result<Vec<ShoppingListItem>> {
        let mut stmt = conn.prepare(
            "SELECT name, quantity, priority, pantry_item_id FROM list_items
             WHERE list_id = ? ORDER BY position",
        )?;
        let items = stmt
            .query_map(params![list_id], |row| {
                let priority: String = row.get(2)?;
                Ok(ShoppingListItem {
                    name: row.get(0)?,
                    quantity: row.get(1)?,
                    priority: priority.parse().unwrap_or_default(),
                    pantry_item_id: row.get(3)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(items)
    }

    fn row_to_list(row: &rusqlite::Row) -> rusqlite::Result<ShoppingList> {
        let status: String = row.get(3)?;
        let completed_at: Option<String> = row.get(4)?;

        Ok(ShoppingList {
            id: row.get(0)?,
            name: row.get(1)?,
            budget: row.get(2)?,
            status: status.parse().unwrap_or_default(),
            completed_at: completed_at.map(|s| parse_datetime(&s)),
            items: Vec::new(),
        })
    }
}
