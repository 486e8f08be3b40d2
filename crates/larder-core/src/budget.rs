//! Trip spend vs. shopping list plan

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::matching::normalize;
use crate::models::{Receipt, ReceiptItem, ShoppingList};

/// Budget and item reconciliation for one trip
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationSummary {
    pub budget: f64,
    pub actual_total: f64,
    /// budget - actual_total; negative when overspent
    pub difference: f64,
    pub saved_money: bool,
    /// Share of the budget left over; negative when overspent, 0 without a budget
    pub percent_saved: f64,
    /// Amount spent above budget, 0 when within budget
    pub overspend: f64,
    pub planned_items_count: usize,
    pub actual_items_count: usize,
    /// Receipt lines with no planned counterpart
    pub unplanned_items: Vec<ReceiptItem>,
    pub unplanned_total: f64,
    /// Planned item names that never appeared on the receipt
    pub missed_planned_items: Vec<String>,
}

/// Compares a completed trip to its list.
///
/// Item correspondence is by exact normalized name only; see DESIGN.md for
/// why this differs from the fuzzy pantry matching.
#[derive(Debug, Clone, Copy, Default)]
pub struct BudgetReconciler;

impl BudgetReconciler {
    pub fn reconcile(list: &ShoppingList, receipt: &Receipt) -> ReconciliationSummary {
        let budget = list.budget.unwrap_or(0.0);
        let actual_total = receipt.total();
        let difference = budget - actual_total;
        let percent_saved = if budget > 0.0 {
            difference / budget * 100.0
        } else {
            0.0
        };

        let planned: HashSet<String> = list.items.iter().map(|i| normalize(&i.name)).collect();
        let purchased: HashSet<String> =
            receipt.items.iter().map(|i| normalize(&i.name)).collect();

        let unplanned_items: Vec<ReceiptItem> = receipt
            .items
            .iter()
            .filter(|item| !planned.contains(&normalize(&item.name)))
            .cloned()
            .collect();
        let unplanned_total = unplanned_items.iter().map(|i| i.total_price).sum();

        let missed_planned_items = list
            .items
            .iter()
            .filter(|item| !purchased.contains(&normalize(&item.name)))
            .map(|item| item.name.clone())
            .collect();

        debug!(
            list = %list.id,
            receipt = %receipt.id,
            difference,
            unplanned = unplanned_items.len(),
            "Reconciled trip budget"
        );

        ReconciliationSummary {
            budget,
            actual_total,
            difference,
            saved_money: difference > 0.0,
            percent_saved,
            overspend: (-difference).max(0.0),
            planned_items_count: list.items.len(),
            actual_items_count: receipt.items.len(),
            unplanned_items,
            unplanned_total,
            missed_planned_items,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ShoppingListItem;

    fn receipt(items: Vec<ReceiptItem>, total: Option<f64>) -> Receipt {
        let mut receipt = Receipt::new("r1", items);
        receipt.printed_total = total;
        receipt
    }

    #[test]
    fn test_savings() {
        let list = ShoppingList::new("l1", "Weekly", Some(50.0));
        let summary =
            BudgetReconciler::reconcile(&list, &receipt(vec![ReceiptItem::new("Milk", 1.0, 45.0)], Some(45.0)));

        assert_eq!(summary.difference, 5.0);
        assert!(summary.saved_money);
        assert_eq!(summary.percent_saved, 10.0);
        assert_eq!(summary.overspend, 0.0);
    }

    #[test]
    fn test_overspend() {
        let list = ShoppingList::new("l1", "Weekly", Some(40.0));
        let summary =
            BudgetReconciler::reconcile(&list, &receipt(vec![ReceiptItem::new("Steak", 1.0, 50.0)], None));

        assert_eq!(summary.actual_total, 50.0);
        assert_eq!(summary.difference, -10.0);
        assert!(!summary.saved_money);
        assert_eq!(summary.percent_saved, -25.0);
        assert_eq!(summary.overspend, 10.0);
    }

    #[test]
    fn test_exactly_on_budget_is_not_saving() {
        let list = ShoppingList::new("l1", "Weekly", Some(12.0));
        let summary =
            BudgetReconciler::reconcile(&list, &receipt(vec![ReceiptItem::new("Tea", 1.0, 12.0)], None));
        assert_eq!(summary.difference, 0.0);
        assert!(!summary.saved_money);
    }

    #[test]
    fn test_no_budget() {
        let list = ShoppingList::new("l1", "Weekly", None);
        let summary =
            BudgetReconciler::reconcile(&list, &receipt(vec![ReceiptItem::new("Tea", 1.0, 3.0)], None));
        assert_eq!(summary.budget, 0.0);
        assert_eq!(summary.percent_saved, 0.0);
        assert_eq!(summary.difference, -3.0);
    }

    #[test]
    fn test_unplanned_items() {
        let list = ShoppingList::new("l1", "Weekly", Some(10.0))
            .with_items(vec![ShoppingListItem::new("Bread")]);
        let milk = ReceiptItem::new("Milk", 2.0, 1.1);
        let summary = BudgetReconciler::reconcile(
            &list,
            &receipt(vec![ReceiptItem::new("Bread", 1.0, 1.5), milk.clone()], None),
        );

        assert_eq!(summary.unplanned_items, vec![milk.clone()]);
        assert_eq!(summary.unplanned_total, milk.total_price);
        assert_eq!(summary.planned_items_count, 1);
        assert_eq!(summary.actual_items_count, 2);
        assert!(summary.missed_planned_items.is_empty());
    }

    #[test]
    fn test_unplanned_uses_normalized_names_only() {
        let list = ShoppingList::new("l1", "Weekly", Some(10.0)).with_items(vec![
            ShoppingListItem::new("eggs"),
            ShoppingListItem::new("Butter"),
            ShoppingListItem::new("Jam"),
        ]);
        let summary = BudgetReconciler::reconcile(
            &list,
            &receipt(
                vec![
                    ReceiptItem::new("EGG", 1.0, 2.0),
                    // Close but not equal: still unplanned
                    ReceiptItem::new("Buter", 1.0, 2.0),
                ],
                None,
            ),
        );

        let names: Vec<&str> = summary.unplanned_items.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["Buter"]);
        assert_eq!(summary.missed_planned_items, vec!["Butter", "Jam"]);
    }
}
