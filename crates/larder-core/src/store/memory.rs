//! In-memory store
//!
//! Holds pantry items, lists and receipts behind a mutex and records every
//! call it receives. Individual calls can be made to fail or stall, which
//! is how the orchestrator's skip-and-proceed behaviour is tested.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{HouseholdStore, DEFAULT_CATEGORY};
use crate::error::{Error, Result};
use crate::ids::{IdGenerator, SequentialIds};
use crate::models::{ListStatus, PantryItem, Receipt, ReceiptItem, ShoppingList, StockLevel};

/// One recorded store call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreCall {
    pub operation: &'static str,
    /// Id or name the call was about
    pub target: String,
}

#[derive(Default)]
struct MemoryState {
    pantry: Vec<PantryItem>,
    lists: HashMap<String, ShoppingList>,
    receipts: HashMap<String, Receipt>,
    calls: Vec<StoreCall>,
    /// (operation, target) pairs that fail; target "*" matches anything
    failures: Vec<(String, String)>,
    delays: HashMap<String, Duration>,
}

/// Mutex-backed [`HouseholdStore`]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
    ids: Arc<dyn IdGenerator>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_ids(Arc::new(SequentialIds::new()))
    }

    pub fn with_ids(ids: Arc<dyn IdGenerator>) -> Self {
        Self {
            state: Mutex::new(MemoryState::default()),
            ids,
        }
    }

    /// Seed from existing data (e.g. a database snapshot for a dry run)
    pub fn seeded(pantry: Vec<PantryItem>, lists: Vec<ShoppingList>, receipts: Vec<Receipt>) -> Self {
        let store = Self::new();
        {
            let mut state = store.lock();
            state.pantry = pantry;
            state.lists = lists.into_iter().map(|l| (l.id.clone(), l)).collect();
            state.receipts = receipts.into_iter().map(|r| (r.id.clone(), r)).collect();
        }
        store
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn insert_pantry_item(&self, item: PantryItem) {
        self.lock().pantry.push(item);
    }

    pub fn insert_list(&self, list: ShoppingList) {
        self.lock().lists.insert(list.id.clone(), list);
    }

    pub fn insert_receipt(&self, receipt: Receipt) {
        self.lock().receipts.insert(receipt.id.clone(), receipt);
    }

    pub fn pantry(&self) -> Vec<PantryItem> {
        self.lock().pantry.clone()
    }

    pub fn pantry_item(&self, id: &str) -> Option<PantryItem> {
        self.lock().pantry.iter().find(|p| p.id == id).cloned()
    }

    pub fn list(&self, id: &str) -> Option<ShoppingList> {
        self.lock().lists.get(id).cloned()
    }

    pub fn receipt(&self, id: &str) -> Option<Receipt> {
        self.lock().receipts.get(id).cloned()
    }

    /// Make `operation` fail for `target` ("*" for every target)
    pub fn fail_on(&self, operation: &str, target: &str) {
        self.lock()
            .failures
            .push((operation.to_string(), target.to_string()));
    }

    /// Make every call to `operation` sleep first
    pub fn delay_on(&self, operation: &str, delay: Duration) {
        self.lock().delays.insert(operation.to_string(), delay);
    }

    /// All calls received so far, in order
    pub fn calls(&self) -> Vec<StoreCall> {
        self.lock().calls.clone()
    }

    /// Targets of every call to `operation`, in order
    pub fn calls_to(&self, operation: &str) -> Vec<String> {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.operation == operation)
            .map(|c| c.target.clone())
            .collect()
    }

    /// Record the call, apply any injected delay, then any injected failure
    async fn enter(&self, operation: &'static str, target: &str) -> Result<()> {
        let delay = {
            let mut state = self.lock();
            state.calls.push(StoreCall {
                operation,
                target: target.to_string(),
            });
            state.delays.get(operation).copied()
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let fails = self
            .lock()
            .failures
            .iter()
            .any(|(op, t)| op == operation && (t == "*" || t == target));
        if fails {
            return Err(Error::RemoteCall {
                operation: operation.to_string(),
                message: format!("injected failure for {}", target),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl HouseholdStore for MemoryStore {
    async fn get_receipt(&self, receipt_id: &str) -> Result<Option<Receipt>> {
        self.enter("get_receipt", receipt_id).await?;
        Ok(self.receipt(receipt_id))
    }

    async fn get_list(&self, list_id: &str) -> Result<Option<ShoppingList>> {
        self.enter("get_list", list_id).await?;
        Ok(self.list(list_id))
    }

    async fn get_pantry_items(&self) -> Result<Vec<PantryItem>> {
        self.enter("get_pantry_items", "*").await?;
        Ok(self.pantry())
    }

    async fn restock_pantry_item(&self, pantry_item_id: &str, price: Option<f64>) -> Result<()> {
        self.enter("restock_pantry_item", pantry_item_id).await?;
        let mut state = self.lock();
        let item = state
            .pantry
            .iter_mut()
            .find(|p| p.id == pantry_item_id)
            .ok_or_else(|| Error::NotFound(format!("pantry item {}", pantry_item_id)))?;
        item.stock_level = StockLevel::Stocked;
        if price.is_some() {
            item.last_known_price = price;
        }
        item.updated_at = Some(Utc::now());
        Ok(())
    }

    async fn confirm_fuzzy_restock(
        &self,
        pantry_item_id: &str,
        receipt_item: &ReceiptItem,
    ) -> Result<()> {
        self.enter("confirm_fuzzy_restock", pantry_item_id).await?;
        self.restock_pantry_item(pantry_item_id, receipt_item.observed_price())
            .await
    }

    async fn add_pantry_item_from_receipt(
        &self,
        name: &str,
        category: Option<&str>,
        price: Option<f64>,
    ) -> Result<PantryItem> {
        self.enter("add_pantry_item_from_receipt", name).await?;
        let item = PantryItem {
            id: self.ids.next_id("pantry"),
            name: name.trim().to_string(),
            category: category.unwrap_or(DEFAULT_CATEGORY).to_string(),
            stock_level: StockLevel::Stocked,
            last_known_price: price,
            updated_at: Some(Utc::now()),
        };
        self.lock().pantry.push(item.clone());
        Ok(item)
    }

    async fn complete_shopping_list(
        &self,
        list_id: &str,
        completed_at: DateTime<Utc>,
    ) -> Result<()> {
        self.enter("complete_shopping_list", list_id).await?;
        let mut state = self.lock();
        let list = state
            .lists
            .get_mut(list_id)
            .ok_or_else(|| Error::NotFound(format!("shopping list {}", list_id)))?;
        list.status = ListStatus::Completed;
        list.completed_at = Some(completed_at);
        Ok(())
    }

    async fn link_receipt_to_list(&self, receipt_id: &str, list_id: &str) -> Result<()> {
        self.enter("link_receipt_to_list", receipt_id).await?;
        let mut state = self.lock();
        if !state.lists.contains_key(list_id) {
            return Err(Error::NotFound(format!("shopping list {}", list_id)));
        }
        let receipt = state
            .receipts
            .get_mut(receipt_id)
            .ok_or_else(|| Error::NotFound(format!("receipt {}", receipt_id)))?;
        receipt.list_id = Some(list_id.to_string());
        Ok(())
    }
}
