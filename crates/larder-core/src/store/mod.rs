//! External collaborators of the reconciliation engine
//!
//! Everything the engine reads or mutates goes through [`HouseholdStore`].
//! Implementations:
//! - `Database` (in `crate::db`) - SQLite persistence
//! - [`MemoryStore`] - in-memory, with failure/delay injection for tests and dry runs

mod memory;

pub use memory::{MemoryStore, StoreCall};

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::{Error, Result};
use crate::models::{PantryItem, Receipt, ReceiptItem, ShoppingList, ShoppingListItem};

/// Persistence and mutation interface used by the trip orchestrator.
///
/// Calls are awaited one at a time; implementations need not be re-entrant
/// for a single trip, but must be Send + Sync so a store can be shared.
#[async_trait]
pub trait HouseholdStore: Send + Sync {
    async fn get_receipt(&self, receipt_id: &str) -> Result<Option<Receipt>>;

    /// Shopping list with its items
    async fn get_list(&self, list_id: &str) -> Result<Option<ShoppingList>>;

    async fn get_list_items(&self, list_id: &str) -> Result<Vec<ShoppingListItem>> {
        Ok(self
            .get_list(list_id)
            .await?
            .map(|list| list.items)
            .unwrap_or_default())
    }

    /// Snapshot of the whole pantry
    async fn get_pantry_items(&self) -> Result<Vec<PantryItem>>;

    /// Mark a pantry item as freshly stocked, remembering the price paid
    async fn restock_pantry_item(&self, pantry_item_id: &str, price: Option<f64>) -> Result<()>;

    /// Apply a user-confirmed fuzzy match
    async fn confirm_fuzzy_restock(
        &self,
        pantry_item_id: &str,
        receipt_item: &ReceiptItem,
    ) -> Result<()> {
        self.restock_pantry_item(pantry_item_id, receipt_item.observed_price())
            .await
    }

    /// Create a pantry item for a product seen on a receipt
    async fn add_pantry_item_from_receipt(
        &self,
        name: &str,
        category: Option<&str>,
        price: Option<f64>,
    ) -> Result<PantryItem>;

    async fn complete_shopping_list(&self, list_id: &str, completed_at: DateTime<Utc>)
        -> Result<()>;

    async fn link_receipt_to_list(&self, receipt_id: &str, list_id: &str) -> Result<()>;
}

/// Category given to pantry items created without one
pub const DEFAULT_CATEGORY: &str = "uncategorized";

/// Await one external call, optionally bounded by `timeout`.
///
/// Any failure (including the timeout) comes back as `Error::RemoteCall`
/// tagged with `operation`. Nothing is retried.
pub async fn remote_call<T, F>(operation: &str, timeout: Option<Duration>, call: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    let outcome = match timeout {
        Some(limit) => match tokio::time::timeout(limit, call).await {
            Ok(outcome) => outcome,
            Err(_) => {
                return Err(Error::RemoteCall {
                    operation: operation.to_string(),
                    message: format!("timed out after {:?}", limit),
                })
            }
        },
        None => call.await,
    };
    outcome.map_err(|e| Error::remote(operation, e))
}
