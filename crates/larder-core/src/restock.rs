//! Receipt-to-pantry restock engine
//!
//! Partitions a receipt into three disjoint buckets:
//! - `restocked_items` - exact matches, restocked immediately
//! - `fuzzy_matches` - likely matches the user has to confirm
//! - `items_to_add` - products the pantry does not know yet
//!
//! A pantry item is consumed by the first receipt line that matches it
//! exactly, so no pantry item is ever restocked twice or both restocked and
//! suggested in one call. Fuzzy suggestions do not consume: several receipt
//! lines may point at the same pantry item, and the user decides later.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::matching::{MatchClassifier, MatchConfig, MatchDecision};
use crate::models::{PantryItem, ReceiptItem};
use crate::store::{remote_call, HouseholdStore};

/// Receipt line that restocked a pantry item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RestockedItem {
    pub receipt_item_name: String,
    pub pantry_item_id: String,
    /// Position of the line on the receipt
    pub receipt_index: usize,
    /// Unit price to remember on the pantry item
    pub price: Option<f64>,
}

/// Suggested match awaiting confirmation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuzzyMatch {
    pub receipt_item_name: String,
    pub pantry_item_id: String,
    pub pantry_item_name: String,
    pub similarity: u8,
    pub receipt_index: usize,
}

/// Receipt line with no pantry counterpart
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewItem {
    pub name: String,
    pub category: Option<String>,
    pub receipt_index: usize,
}

/// Outcome of one reconciliation call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RestockResult {
    pub restocked_items: Vec<RestockedItem>,
    pub fuzzy_matches: Vec<FuzzyMatch>,
    pub items_to_add: Vec<NewItem>,
}

impl RestockResult {
    /// True when nothing needs a user decision
    pub fn is_settled(&self) -> bool {
        self.fuzzy_matches.is_empty() && self.items_to_add.is_empty()
    }

    /// Pantry ids referenced by the restocked and fuzzy buckets, in that order
    pub fn pantry_ids(&self) -> Vec<&str> {
        self.restocked_items
            .iter()
            .map(|r| r.pantry_item_id.as_str())
            .chain(self.fuzzy_matches.iter().map(|f| f.pantry_item_id.as_str()))
            .collect()
    }
}

/// A side effect that failed while the batch carried on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemFailure {
    /// Receipt line the failure belongs to
    pub item: String,
    pub operation: String,
    pub message: String,
}

/// What `apply` managed to do
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RestockReport {
    /// Pantry ids restocked successfully
    pub applied: Vec<String>,
    pub failures: Vec<ItemFailure>,
}

/// Runs classification across a whole receipt
#[derive(Debug, Clone, Default)]
pub struct RestockEngine {
    classifier: MatchClassifier,
}

impl RestockEngine {
    pub fn new(config: MatchConfig) -> Self {
        Self {
            classifier: MatchClassifier::new(config),
        }
    }

    pub fn config(&self) -> &MatchConfig {
        self.classifier.config()
    }

    /// Partition `receipt_items` against a snapshot of the pantry.
    ///
    /// Exact matches are decided line by line in receipt order, each against
    /// the pantry items not yet consumed. Fuzzy and new decisions are then
    /// taken against what is left after all exact consumption, which keeps a
    /// pantry id out of the fuzzy bucket once an exact match has claimed it.
    /// Non-exact lines never shrink the pool, so the exact allocations are
    /// the same as a single in-order pass would produce.
    pub fn reconcile(&self, receipt_items: &[ReceiptItem], pantry_items: &[PantryItem]) -> RestockResult {
        let mut pool: Vec<&PantryItem> = pantry_items.iter().collect();
        let mut result = RestockResult::default();
        let mut undecided = Vec::new();

        for (index, item) in receipt_items.iter().enumerate() {
            let classification = self.classifier.classify_refs(item, pool.iter().copied());
            match (classification.decision, classification.matched_id) {
                (MatchDecision::Exact, Some(pantry_id)) => {
                    if let Some(pos) = pool.iter().position(|p| p.id == pantry_id) {
                        pool.remove(pos);
                    }
                    debug!(
                        item = %item.name,
                        pantry_id = %pantry_id,
                        score = classification.score,
                        "Exact pantry match"
                    );
                    result.restocked_items.push(RestockedItem {
                        receipt_item_name: item.name.clone(),
                        pantry_item_id: pantry_id,
                        receipt_index: index,
                        price: item.observed_price(),
                    });
                }
                _ => undecided.push(index),
            }
        }

        for index in undecided {
            let item = &receipt_items[index];
            let classification = self.classifier.classify_refs(item, pool.iter().copied());
            let candidate = classification
                .matched_id
                .as_deref()
                .and_then(|id| pool.iter().find(|p| p.id == id));

            match (classification.decision, candidate) {
                // The pool only shrinks, so nothing reaches the exact threshold here
                (MatchDecision::Exact | MatchDecision::Fuzzy, Some(candidate)) => {
                    debug!(
                        item = %item.name,
                        pantry_id = %candidate.id,
                        score = classification.score,
                        "Fuzzy pantry match"
                    );
                    result.fuzzy_matches.push(FuzzyMatch {
                        receipt_item_name: item.name.clone(),
                        pantry_item_id: candidate.id.clone(),
                        pantry_item_name: candidate.name.clone(),
                        similarity: classification.score,
                        receipt_index: index,
                    });
                }
                _ => {
                    debug!(item = %item.name, score = classification.score, "New pantry item");
                    result.items_to_add.push(NewItem {
                        name: item.name.clone(),
                        category: item.category.clone(),
                        receipt_index: index,
                    });
                }
            }
        }

        info!(
            restocked = result.restocked_items.len(),
            fuzzy = result.fuzzy_matches.len(),
            new = result.items_to_add.len(),
            "Reconciled receipt against pantry"
        );
        result
    }

    /// Restock every exact match, one call at a time.
    ///
    /// A failing call is logged and recorded; the remaining items are still
    /// attempted. Nothing is retried.
    pub async fn apply<S>(
        &self,
        store: &S,
        result: &RestockResult,
        timeout: Option<Duration>,
    ) -> RestockReport
    where
        S: HouseholdStore + ?Sized,
    {
        let mut report = RestockReport::default();

        for restock in &result.restocked_items {
            let call = store.restock_pantry_item(&restock.pantry_item_id, restock.price);
            match remote_call("restock_pantry_item", timeout, call).await {
                Ok(()) => report.applied.push(restock.pantry_item_id.clone()),
                Err(e) => {
                    warn!(
                        item = %restock.receipt_item_name,
                        pantry_id = %restock.pantry_item_id,
                        "Restock failed: {}",
                        e
                    );
                    report.failures.push(ItemFailure {
                        item: restock.receipt_item_name.clone(),
                        operation: "restock_pantry_item".to_string(),
                        message: e.to_string(),
                    });
                }
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::models::StockLevel;
    use crate::store::MemoryStore;

    fn pantry(id: &str, name: &str) -> PantryItem {
        PantryItem::new(id, name, "general")
    }

    fn line(name: &str) -> ReceiptItem {
        ReceiptItem::new(name, 1.0, 1.0)
    }

    #[test]
    fn test_partitions_receipt() {
        let engine = RestockEngine::default();
        let result = engine.reconcile(
            &[line("Milk"), line("Buter"), line("Lentils")],
            &[pantry("p1", "Milk"), pantry("p2", "Butter")],
        );

        assert_eq!(result.restocked_items.len(), 1);
        assert_eq!(result.restocked_items[0].pantry_item_id, "p1");
        assert_eq!(result.fuzzy_matches.len(), 1);
        assert_eq!(result.fuzzy_matches[0].pantry_item_id, "p2");
        assert_eq!(result.fuzzy_matches[0].pantry_item_name, "Butter");
        assert_eq!(result.fuzzy_matches[0].similarity, 83);
        assert_eq!(result.items_to_add.len(), 1);
        assert_eq!(result.items_to_add[0].name, "Lentils");
        assert_eq!(result.items_to_add[0].receipt_index, 2);
    }

    #[test]
    fn test_no_double_allocation() {
        let engine = RestockEngine::default();
        let result = engine.reconcile(
            &[line("Milk"), line("Semi-Skimmed Milk")],
            &[pantry("p1", "Milk")],
        );

        let exact_to_p1 = result
            .restocked_items
            .iter()
            .filter(|r| r.pantry_item_id == "p1")
            .count();
        assert_eq!(exact_to_p1, 1);
        assert_eq!(result.restocked_items[0].receipt_item_name, "Milk");
        assert!(result.fuzzy_matches.iter().all(|f| f.pantry_item_id != "p1"));
        assert_eq!(result.items_to_add.len(), 1);
        assert_eq!(result.items_to_add[0].name, "Semi-Skimmed Milk");
    }

    #[test]
    fn test_duplicate_lines_consume_distinct_items() {
        let engine = RestockEngine::default();
        let result = engine.reconcile(
            &[line("Milk"), line("milk"), line("MILK")],
            &[pantry("p1", "Milk"), pantry("p2", "Milk")],
        );

        let ids: Vec<&str> = result
            .restocked_items
            .iter()
            .map(|r| r.pantry_item_id.as_str())
            .collect();
        assert_eq!(ids, vec!["p1", "p2"]);
        // Third line finds nothing left to match
        assert_eq!(result.items_to_add.len(), 1);
        assert_eq!(result.items_to_add[0].receipt_index, 2);
    }

    #[test]
    fn test_fuzzy_suggestion_never_points_at_consumed_item() {
        // "Buter" would fuzzy-match p1 in a naive pass, but the later exact
        // "Butter" line consumes p1.
        let engine = RestockEngine::default();
        let result = engine.reconcile(
            &[line("Buter"), line("Butter")],
            &[pantry("p1", "Butter")],
        );

        assert_eq!(result.restocked_items.len(), 1);
        assert_eq!(result.restocked_items[0].receipt_item_name, "Butter");
        assert!(result.fuzzy_matches.is_empty());
        assert_eq!(result.items_to_add[0].name, "Buter");
    }

    #[test]
    fn test_fuzzy_matches_may_share_a_pantry_item() {
        let engine = RestockEngine::default();
        let result = engine.reconcile(
            &[line("Chedar"), line("Cheddr")],
            &[pantry("p1", "Cheddar")],
        );

        assert_eq!(result.fuzzy_matches.len(), 2);
        assert!(result.fuzzy_matches.iter().all(|f| f.pantry_item_id == "p1"));
    }

    #[test]
    fn test_buckets_are_disjoint() {
        let engine = RestockEngine::default();
        let pantry_items = vec![
            pantry("p1", "Milk"),
            pantry("p2", "Butter"),
            pantry("p3", "Bread"),
            pantry("p4", "Eggs"),
        ];
        let receipt = vec![
            line("Buter"),
            line("milk"),
            line("Bred"),
            line("Butter"),
            line("Egg"),
            line("Coffee"),
        ];
        let result = engine.reconcile(&receipt, &pantry_items);

        let restocked: HashSet<&str> = result
            .restocked_items
            .iter()
            .map(|r| r.pantry_item_id.as_str())
            .collect();
        assert_eq!(restocked.len(), result.restocked_items.len());
        for fuzzy in &result.fuzzy_matches {
            assert!(!restocked.contains(fuzzy.pantry_item_id.as_str()));
        }
        let total =
            result.restocked_items.len() + result.fuzzy_matches.len() + result.items_to_add.len();
        assert_eq!(total, receipt.len());
    }

    #[test]
    fn test_empty_pantry_makes_everything_new() {
        let engine = RestockEngine::default();
        let result = engine.reconcile(&[line("Milk"), line("Bread")], &[]);
        assert!(result.restocked_items.is_empty());
        assert_eq!(result.items_to_add.len(), 2);
        assert!(!result.is_settled());
    }

    #[tokio::test]
    async fn test_apply_continues_after_failure() {
        let store = MemoryStore::new();
        for (id, name) in [("p1", "Milk"), ("p2", "Bread"), ("p3", "Eggs")] {
            let mut item = pantry(id, name);
            item.stock_level = StockLevel::Low;
            store.insert_pantry_item(item);
        }
        store.fail_on("restock_pantry_item", "p2");

        let engine = RestockEngine::default();
        let result = engine.reconcile(
            &[line("Milk"), line("Bread"), line("Eggs")],
            &store.pantry(),
        );
        let report = engine.apply(&store, &result, None).await;

        assert_eq!(report.applied, vec!["p1", "p3"]);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].item, "Bread");
        assert_eq!(store.pantry_item("p1").unwrap().stock_level, StockLevel::Stocked);
        assert_eq!(store.pantry_item("p2").unwrap().stock_level, StockLevel::Low);
        assert_eq!(store.pantry_item("p3").unwrap().stock_level, StockLevel::Stocked);
    }
}
