//! Domain models for Larder

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default OCR confidence below which a receipt line is flagged for review
pub const DEFAULT_REVIEW_CONFIDENCE: u8 = 70;

/// How much of a pantry item is left
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StockLevel {
    /// Freshly bought
    #[default]
    Stocked,
    Good,
    Low,
    Out,
}

impl StockLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stocked => "stocked",
            Self::Good => "good",
            Self::Low => "low",
            Self::Out => "out",
        }
    }
}

impl std::str::FromStr for StockLevel {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "stocked" | "full" => Ok(Self::Stocked),
            "good" => Ok(Self::Good),
            "low" => Ok(Self::Low),
            "out" | "empty" => Ok(Self::Out),
            _ => Err(format!("Unknown stock level: {}", s)),
        }
    }
}

impl std::fmt::Display for StockLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A tracked household inventory entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PantryItem {
    pub id: String,
    pub name: String,
    pub category: String,
    pub stock_level: StockLevel,
    pub last_known_price: Option<f64>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl PantryItem {
    /// Convenience constructor for an item with no price history
    pub fn new(id: impl Into<String>, name: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            category: category.into(),
            stock_level: StockLevel::Stocked,
            last_known_price: None,
            updated_at: None,
        }
    }
}

/// A single line on a scanned receipt, as produced by the external parser
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceiptItem {
    pub name: String,
    #[serde(default = "default_quantity")]
    pub quantity: f64,
    #[serde(default)]
    pub unit_price: f64,
    #[serde(default)]
    pub total_price: f64,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub unit: Option<String>,
    /// OCR confidence, 0-100
    #[serde(default)]
    pub confidence: Option<u8>,
}

fn default_quantity() -> f64 {
    1.0
}

impl ReceiptItem {
    pub fn new(name: impl Into<String>, quantity: f64, unit_price: f64) -> Self {
        Self {
            name: name.into(),
            quantity,
            unit_price,
            total_price: quantity * unit_price,
            category: None,
            size: None,
            unit: None,
            confidence: None,
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_confidence(mut self, confidence: u8) -> Self {
        self.confidence = Some(confidence);
        self
    }

    /// Low-confidence lines are shown for review but still reconciled
    pub fn needs_review(&self, threshold: u8) -> bool {
        self.confidence.is_some_and(|c| c < threshold)
    }

    /// Price to remember on the pantry item after a restock
    pub fn observed_price(&self) -> Option<f64> {
        if self.unit_price > 0.0 {
            Some(self.unit_price)
        } else if self.total_price > 0.0 && self.quantity > 0.0 {
            Some(self.total_price / self.quantity)
        } else {
            None
        }
    }

    fn validate(&self, index: usize) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::Validation(format!(
                "receipt item {} has an empty name",
                index + 1
            )));
        }
        if !self.quantity.is_finite() || self.quantity <= 0.0 {
            return Err(Error::Validation(format!(
                "receipt item '{}' has invalid quantity {}",
                self.name, self.quantity
            )));
        }
        for (label, value) in [("unit price", self.unit_price), ("total", self.total_price)] {
            if !value.is_finite() || value < 0.0 {
                return Err(Error::Validation(format!(
                    "receipt item '{}' has invalid {} {}",
                    self.name, label, value
                )));
            }
        }
        if self.confidence.is_some_and(|c| c > 100) {
            return Err(Error::Validation(format!(
                "receipt item '{}' has confidence above 100",
                self.name
            )));
        }
        Ok(())
    }
}

/// A scanned receipt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Receipt {
    pub id: String,
    pub store_name: Option<String>,
    pub purchased_on: Option<NaiveDate>,
    /// Total printed on the receipt, if the parser found one
    pub printed_total: Option<f64>,
    pub items: Vec<ReceiptItem>,
    /// Shopping list this receipt was linked to
    pub list_id: Option<String>,
    /// SHA-256 of the imported file, for duplicate detection
    pub content_hash: Option<String>,
}

impl Receipt {
    pub fn new(id: impl Into<String>, items: Vec<ReceiptItem>) -> Self {
        Self {
            id: id.into(),
            store_name: None,
            purchased_on: None,
            printed_total: None,
            items,
            list_id: None,
            content_hash: None,
        }
    }

    /// Trip spend: the printed total, or the sum of line totals
    pub fn total(&self) -> f64 {
        self.printed_total
            .unwrap_or_else(|| self.items.iter().map(|i| i.total_price).sum())
    }

    /// Reject receipts that cannot be reconciled
    pub fn validate(&self) -> Result<()> {
        if self.items.is_empty() {
            return Err(Error::Validation(format!(
                "receipt {} has no line items",
                self.id
            )));
        }
        for (index, item) in self.items.iter().enumerate() {
            item.validate(index)?;
        }
        if let Some(total) = self.printed_total {
            if !total.is_finite() || total < 0.0 {
                return Err(Error::Validation(format!(
                    "receipt {} has invalid total {}",
                    self.id, total
                )));
            }
        }
        Ok(())
    }
}

/// Shopping list lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ListStatus {
    /// Being planned
    #[default]
    Active,
    /// User is in the shop
    Shopping,
    Completed,
    Archived,
}

impl ListStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Shopping => "shopping",
            Self::Completed => "completed",
            Self::Archived => "archived",
        }
    }

    /// Whether a trip can be completed from this status
    pub fn can_complete(&self) -> bool {
        matches!(self, Self::Active | Self::Shopping)
    }
}

impl std::str::FromStr for ListStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(Self::Active),
            "shopping" => Ok(Self::Shopping),
            "completed" => Ok(Self::Completed),
            "archived" => Ok(Self::Archived),
            _ => Err(format!("Unknown list status: {}", s)),
        }
    }
}

impl std::fmt::Display for ListStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Item priority on a shopping list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

impl std::str::FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "high" | "must" => Ok(Self::High),
            "medium" | "normal" => Ok(Self::Medium),
            "low" | "nice" => Ok(Self::Low),
            _ => Err(format!("Unknown priority: {}", s)),
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A planned purchase on a shopping list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShoppingListItem {
    pub name: String,
    #[serde(default = "default_quantity")]
    pub quantity: f64,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub pantry_item_id: Option<String>,
}

impl ShoppingListItem {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            quantity: 1.0,
            priority: Priority::default(),
            pantry_item_id: None,
        }
    }
}

/// A shopping list with its planned items
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShoppingList {
    pub id: String,
    pub name: String,
    pub budget: Option<f64>,
    pub status: ListStatus,
    pub completed_at: Option<DateTime<Utc>>,
    pub items: Vec<ShoppingListItem>,
}

impl ShoppingList {
    pub fn new(id: impl Into<String>, name: impl Into<String>, budget: Option<f64>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            budget,
            status: ListStatus::Active,
            completed_at: None,
            items: Vec::new(),
        }
    }

    pub fn with_items(mut self, items: Vec<ShoppingListItem>) -> Self {
        self.items = items;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(budget) = self.budget {
            if !budget.is_finite() || budget < 0.0 {
                return Err(Error::Validation(format!(
                    "list {} has invalid budget {}",
                    self.id, budget
                )));
            }
        }
        if let Some(item) = self.items.iter().find(|i| i.name.trim().is_empty()) {
            return Err(Error::Validation(format!(
                "list {} has an item with an empty name (quantity {})",
                self.id, item.quantity
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stock_level_round_trip_names() {
        for level in [
            StockLevel::Stocked,
            StockLevel::Good,
            StockLevel::Low,
            StockLevel::Out,
        ] {
            assert_eq!(level.as_str().parse::<StockLevel>().unwrap(), level);
        }
        assert_eq!("EMPTY".parse::<StockLevel>().unwrap(), StockLevel::Out);
        assert!("half".parse::<StockLevel>().is_err());
    }

    #[test]
    fn test_list_status_can_complete() {
        assert!(ListStatus::Active.can_complete());
        assert!(ListStatus::Shopping.can_complete());
        assert!(!ListStatus::Completed.can_complete());
        assert!(!ListStatus::Archived.can_complete());
    }

    #[test]
    fn test_receipt_total_prefers_printed_total() {
        let mut receipt = Receipt::new(
            "r1",
            vec![ReceiptItem::new("Milk", 2.0, 1.5), ReceiptItem::new("Bread", 1.0, 2.25)],
        );
        assert!((receipt.total() - 5.25).abs() < 1e-9);

        receipt.printed_total = Some(5.0);
        assert_eq!(receipt.total(), 5.0);
    }

    #[test]
    fn test_receipt_validation() {
        let empty = Receipt::new("r1", vec![]);
        assert!(matches!(empty.validate(), Err(Error::Validation(_))));

        let blank = Receipt::new("r2", vec![ReceiptItem::new("  ", 1.0, 1.0)]);
        assert!(matches!(blank.validate(), Err(Error::Validation(_))));

        let negative = Receipt::new("r3", vec![ReceiptItem::new("Eggs", 1.0, -2.0)]);
        assert!(matches!(negative.validate(), Err(Error::Validation(_))));

        let ok = Receipt::new("r4", vec![ReceiptItem::new("Eggs", 12.0, 0.3)]);
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn test_needs_review_below_threshold() {
        let item = ReceiptItem::new("Yoghurt", 1.0, 0.99).with_confidence(55);
        assert!(item.needs_review(DEFAULT_REVIEW_CONFIDENCE));
        assert!(!item.with_confidence(70).needs_review(DEFAULT_REVIEW_CONFIDENCE));
        assert!(!ReceiptItem::new("Tea", 1.0, 3.0).needs_review(DEFAULT_REVIEW_CONFIDENCE));
    }

    #[test]
    fn test_observed_price_falls_back_to_total() {
        let mut item = ReceiptItem::new("Apples", 4.0, 0.0);
        item.total_price = 2.0;
        assert_eq!(item.observed_price(), Some(0.5));
        assert_eq!(ReceiptItem::new("Free sample", 1.0, 0.0).observed_price(), None);
    }

    #[test]
    fn test_list_rejects_negative_budget() {
        let list = ShoppingList::new("l1", "Weekly", Some(-1.0));
        assert!(matches!(list.validate(), Err(Error::Validation(_))));
    }

    #[test]
    fn test_receipt_item_json_defaults() {
        let item: ReceiptItem = serde_json::from_str(r#"{"name":"Butter"}"#).unwrap();
        assert_eq!(item.quantity, 1.0);
        assert_eq!(item.total_price, 0.0);
        assert!(item.category.is_none());
    }
}
