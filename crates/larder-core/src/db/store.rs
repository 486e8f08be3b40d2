//! `HouseholdStore` backed by SQLite

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::Database;
use crate::error::Result;
use crate::models::{PantryItem, Receipt, ShoppingList, StockLevel};
use crate::store::HouseholdStore;

#[async_trait]
impl HouseholdStore for Database {
    async fn get_receipt(&self, receipt_id: &str) -> Result<Option<Receipt>> {
        self.find_receipt(receipt_id)
    }

    async fn get_list(&self, list_id: &str) -> Result<Option<ShoppingList>> {
        self.find_list(list_id)
    }

    async fn get_pantry_items(&self) -> Result<Vec<PantryItem>> {
        self.list_pantry_items(None)
    }

    async fn restock_pantry_item(&self, pantry_item_id: &str, price: Option<f64>) -> Result<()> {
        self.restock_item(pantry_item_id, price)
    }

    async fn add_pantry_item_from_receipt(
        &self,
        name: &str,
        category: Option<&str>,
        price: Option<f64>,
    ) -> Result<PantryItem> {
        self.create_pantry_item(name, category, StockLevel::Stocked, price)
    }

    async fn complete_shopping_list(
        &self,
        list_id: &str,
        completed_at: DateTime<Utc>,
    ) -> Result<()> {
        self.mark_list_completed(list_id, completed_at)
    }

    async fn link_receipt_to_list(&self, receipt_id: &str, list_id: &str) -> Result<()> {
        self.set_receipt_list(receipt_id, list_id)
    }
}
