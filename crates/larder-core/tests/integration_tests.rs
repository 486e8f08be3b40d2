//! Integration tests for larder-core
//!
//! These tests exercise the full import → reconcile → decide workflow.

use std::sync::Arc;

use larder_core::{
    db::Database,
    import::{parse_receipt, ReceiptFormat},
    matching::{normalize, score},
    models::{ListStatus, PantryItem, Receipt, ReceiptItem, ShoppingList, ShoppingListItem, StockLevel},
    BudgetReconciler, DecisionKind, Error, HouseholdStore, MatchClassifier, MatchConfig,
    MatchDecision, MemoryStore, Resolution, RestockEngine, SequentialIds, TripCompletion,
    TripConfig, TripState,
};

/// Parser output for a mid-week top-up shop
fn corner_shop_json() -> &'static [u8] {
    br#"{
        "store_name": "Corner Shop",
        "date": "2024-03-14",
        "total": 13.35,
        "items": [
            {"name": "MILK 2L", "quantity": 1, "unit_price": 1.65},
            {"name": "Bananas", "quantity": 6, "unit_price": 0.20},
            {"name": "Cheddr", "quantity": 1, "unit_price": 3.50, "category": "dairy"},
            {"name": "Dish Soap", "quantity": 1, "unit_price": 2.10},
            {"name": "Sourdough", "quantity": 1, "unit_price": 2.90, "confidence": 48},
            {"name": "Banana", "quantity": 1, "unit_price": 0.20}
        ]
    }"#
}

fn pantry(id: &str, name: &str, category: &str, level: StockLevel) -> PantryItem {
    let mut item = PantryItem::new(id, name, category);
    item.stock_level = level;
    item
}

// =============================================================================
// Matching properties
// =============================================================================

#[test]
fn test_normalize_properties() {
    assert_eq!(normalize(" Milk "), normalize("milk"));
    for name in ["Free-Range EGGS", "  baby   potatoes", "Ben & Jerry's", ""] {
        let once = normalize(name);
        assert_eq!(normalize(&once), once, "not idempotent for {name:?}");
    }
}

#[test]
fn test_score_properties() {
    for (a, b) in [("Milk", "Mlk"), ("Butter", "Peanut Butter"), ("", "Tea")] {
        assert_eq!(score(a, b), score(b, a));
        assert_eq!(score(a, a), 100);
    }
    assert_eq!(score("", ""), 100);
    assert_eq!(score("", "Tea"), 0);
}

#[test]
fn test_classify_is_deterministic() {
    let classifier = MatchClassifier::new(MatchConfig::default());
    let candidates = vec![
        PantryItem::new("p1", "Cheddar", "dairy"),
        PantryItem::new("p2", "Cheddar", "deli"),
    ];
    let item = ReceiptItem::new("Cheddar", 1.0, 3.0).with_category("deli");

    let first = classifier.classify(&item, &candidates);
    for _ in 0..10 {
        assert_eq!(classifier.classify(&item, &candidates), first);
    }
    assert_eq!(first.decision, MatchDecision::Exact);
    assert_eq!(first.matched_id.as_deref(), Some("p2"));
}

// =============================================================================
// Engine and budget
// =============================================================================

#[test]
fn test_no_pantry_item_in_two_buckets() {
    let engine = RestockEngine::default();
    let items = vec![
        ReceiptItem::new("Buter", 1.0, 2.0),
        ReceiptItem::new("Butter", 1.0, 2.0),
        ReceiptItem::new("Butter", 1.0, 2.0),
        ReceiptItem::new("Bread", 1.0, 1.0),
    ];
    let pantry_items = vec![
        pantry("p1", "Butter", "dairy", StockLevel::Low),
        pantry("p2", "Bread", "bakery", StockLevel::Out),
    ];

    let result = engine.reconcile(&items, &pantry_items);
    let ids = result.pantry_ids();
    let mut unique = ids.clone();
    unique.sort();
    unique.dedup();
    assert_eq!(ids.len(), unique.len());
    assert_eq!(result.restocked_items.len(), 2);
    assert_eq!(result.items_to_add.len(), 2);
}

#[test]
fn test_budget_example() {
    let list = ShoppingList::new("l1", "Weekly", Some(50.0));
    let mut receipt = Receipt::new("r1", vec![ReceiptItem::new("Groceries", 1.0, 45.0)]);
    receipt.printed_total = Some(45.0);

    let summary = BudgetReconciler::reconcile(&list, &receipt);
    assert_eq!(summary.difference, 5.0);
    assert!(summary.saved_money);
    assert_eq!(summary.percent_saved, 10.0);
}

// =============================================================================
// Trip completion
// =============================================================================

fn seeded_store() -> MemoryStore {
    let store = MemoryStore::with_ids(Arc::new(SequentialIds::starting_after(100)));
    store.insert_pantry_item(pantry("p1", "Milk 2L", "dairy", StockLevel::Out));
    store.insert_pantry_item(pantry("p2", "Banana", "fruit", StockLevel::Low));
    store.insert_pantry_item(pantry("p3", "Cheddar", "dairy", StockLevel::Good));
    store.insert_list(
        ShoppingList::new("l1", "Top-up", Some(15.0)).with_items(vec![
            ShoppingListItem::new("Milk 2L"),
            ShoppingListItem::new("Bananas"),
            ShoppingListItem::new("Coffee"),
        ]),
    );
    let parsed = parse_receipt(corner_shop_json(), ReceiptFormat::Json).unwrap();
    store.insert_receipt(parsed.into_receipt("r1"));
    store
}

#[tokio::test]
async fn test_trip_end_to_end_in_memory() {
    let store = seeded_store();
    let mut trip = TripCompletion::new(&store);
    let outcome = trip.start("r1", "l1").await.unwrap();

    // MILK 2L and the first banana line restock; the second banana finds p2 taken
    let result = outcome.restock_result.unwrap();
    let restocked: Vec<&str> = result
        .restocked_items
        .iter()
        .map(|r| r.pantry_item_id.as_str())
        .collect();
    assert_eq!(restocked, vec!["p1", "p2"]);
    assert_eq!(result.fuzzy_matches.len(), 1);
    assert_eq!(result.fuzzy_matches[0].pantry_item_id, "p3");

    let summary = outcome.summary.unwrap();
    assert_eq!(summary.actual_total, 13.35);
    assert!(summary.saved_money);
    assert_eq!(summary.missed_planned_items, vec!["Coffee"]);
    let unplanned: Vec<&str> = summary
        .unplanned_items
        .iter()
        .map(|i| i.name.as_str())
        .collect();
    assert_eq!(unplanned, vec!["Cheddr", "Dish Soap", "Sourdough"]);

    let kinds: Vec<DecisionKind> = trip.pending_decisions().iter().map(|d| d.kind()).collect();
    assert_eq!(
        kinds,
        vec![
            DecisionKind::Fuzzy,
            DecisionKind::New,
            DecisionKind::New,
            DecisionKind::New
        ]
    );
    let sourdough = &trip.pending_decisions()[2];
    assert!(sourdough.receipt_item.needs_review(70));

    // Accept the cheese, add soap, skip the rest
    let mut accepted = 0;
    while let Some(entry) = trip.next_decision() {
        let accept = matches!(entry.decision().receipt_item.name.as_str(), "Cheddr" | "Dish Soap");
        if accept {
            accepted += 1;
        }
        entry.resolve(accept).await.unwrap();
    }

    assert_eq!(accepted, 2);
    assert_eq!(trip.state(), TripState::Done);
    assert_eq!(store.calls_to("confirm_fuzzy_restock"), vec!["p3"]);
    assert_eq!(store.calls_to("add_pantry_item_from_receipt"), vec!["Dish Soap"]);
    assert_eq!(store.pantry().len(), 4);
    assert_eq!(store.list("l1").unwrap().status, ListStatus::Completed);
}

#[tokio::test]
async fn test_complete_twice_mutates_once() {
    let store = seeded_store();
    let trip = TripCompletion::new(&store);

    trip.complete_shopping("l1").await.unwrap();
    let first = store.list("l1").unwrap().completed_at;

    let err = trip.complete_shopping("l1").await.unwrap_err();
    assert!(matches!(err, Error::AlreadyCompleted(_)));
    assert_eq!(store.calls_to("complete_shopping_list").len(), 1);
    assert_eq!(store.list("l1").unwrap().completed_at, first);
}

#[tokio::test]
async fn test_decision_failures_do_not_stop_the_queue() {
    let store = MemoryStore::new();
    store.insert_list(ShoppingList::new("l1", "Restock", None));
    store.insert_receipt(Receipt::new(
        "r1",
        vec![
            ReceiptItem::new("Tahini", 1.0, 3.2),
            ReceiptItem::new("Miso", 1.0, 4.1),
            ReceiptItem::new("Nori", 1.0, 2.5),
        ],
    ));
    store.fail_on("add_pantry_item_from_receipt", "Miso");

    let mut trip = TripCompletion::new(&store).with_config(TripConfig {
        call_timeout: None,
        offer_add_on_reject: true,
    });
    trip.start("r1", "l1").await.unwrap();

    let mut outcomes = Vec::new();
    while let Some(entry) = trip.next_decision() {
        outcomes.push(entry.resolve(true).await.is_ok());
    }

    assert_eq!(outcomes, vec![true, false, true]);
    assert_eq!(
        store.calls_to("add_pantry_item_from_receipt"),
        vec!["Tahini", "Miso", "Nori"]
    );
    assert_eq!(trip.state(), TripState::Done);

    let report = trip.report();
    let resolutions: Vec<bool> = report
        .decisions
        .iter()
        .map(|d| d.resolution == Resolution::Applied)
        .collect();
    assert_eq!(resolutions, vec![true, false, true]);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].operation, "add_pantry_item_from_receipt");
}

// =============================================================================
// Database Integration Tests
// =============================================================================

#[tokio::test]
async fn test_full_import_workflow() {
    let db = Database::in_memory().expect("Failed to create in-memory database");
    db.create_pantry_item("Milk 2L", Some("dairy"), StockLevel::Out, Some(1.55))
        .unwrap();
    db.create_pantry_item("Banana", Some("fruit"), StockLevel::Low, None)
        .unwrap();

    let list = db.create_list("Top-up", Some(15.0)).unwrap();
    for name in ["Milk 2L", "Bananas"] {
        db.add_list_item(&list.id, &ShoppingListItem::new(name))
            .unwrap();
    }

    let parsed = parse_receipt(corner_shop_json(), ReceiptFormat::Json).unwrap();
    let receipt = db.create_receipt(parsed).unwrap().receipt().clone();
    assert_eq!(receipt.items.len(), 6);

    let mut trip = TripCompletion::new(&db);
    let outcome = trip.start(&receipt.id, &list.id).await.unwrap();
    assert_eq!(outcome.restock_failures.len(), 0);
    assert_eq!(trip.abandon(), outcome.pending_decisions);
    assert_eq!(trip.state(), TripState::Done);

    let pantry = db.get_pantry_items().await.unwrap();
    let milk = pantry.iter().find(|p| p.name == "Milk 2L").unwrap();
    assert_eq!(milk.stock_level, StockLevel::Stocked);
    assert_eq!(milk.last_known_price, Some(1.65));
    assert_eq!(pantry.len(), 2);

    // A second trip on the same list is refused before anything changes
    let mut again = TripCompletion::new(&db);
    let err = again.start(&receipt.id, &list.id).await.unwrap_err();
    assert!(matches!(err, Error::AlreadyCompleted(_)));
    assert_eq!(again.state(), TripState::Error);
}
