//! Trip completion workflow
//!
//! Drives one shopping trip from receipt to updated pantry:
//!
//! ```text
//! Linking -> CompletingList -> Restocking -> AwaitingUserDecisions -> Done
//!    \____________\_______________\_________________\______________-> Error
//! ```
//!
//! Linking and list completion are fatal on failure: nothing is restocked.
//! Exact restocks and user decisions are skip-and-proceed: a failed call is
//! logged and recorded, and the batch carries on. Fuzzy matches and new
//! items are exposed as a pull-based queue so any front end (terminal
//! prompts, a web UI, a test) can drain it at its own pace.
//!
//! # Usage
//!
//! ```rust,ignore
//! let mut trip = TripCompletion::new(&store);
//! let outcome = trip.start("receipt-1", "list-1").await?;
//! while let Some(entry) = trip.next_decision() {
//!     let accept = ask_user(entry.decision());
//!     entry.resolve(accept).await.ok(); // failures are recorded, not fatal
//! }
//! assert_eq!(trip.state(), TripState::Done);
//! ```

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::budget::{BudgetReconciler, ReconciliationSummary};
use crate::error::{Error, Result};
use crate::ids::{IdGenerator, SequentialIds};
use crate::models::{PantryItem, Receipt, ReceiptItem, ShoppingList};
use crate::restock::{FuzzyMatch, ItemFailure, NewItem, RestockEngine, RestockReport, RestockResult};
use crate::store::{remote_call, HouseholdStore};

/// Trip completion settings
#[derive(Debug, Clone, PartialEq)]
pub struct TripConfig {
    /// Bound on each external call; `None` waits indefinitely
    pub call_timeout: Option<Duration>,
    /// Rejecting a fuzzy match queues the line as a possible new item
    pub offer_add_on_reject: bool,
}

impl Default for TripConfig {
    fn default() -> Self {
        Self {
            call_timeout: Some(Duration::from_secs(30)),
            offer_add_on_reject: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TripState {
    Linking,
    CompletingList,
    Restocking,
    AwaitingUserDecisions,
    Done,
    Error,
}

impl TripState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Linking => "linking",
            Self::CompletingList => "completing_list",
            Self::Restocking => "restocking",
            Self::AwaitingUserDecisions => "awaiting_user_decisions",
            Self::Done => "done",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for TripState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecisionKind {
    Fuzzy,
    New,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DecisionPayload {
    Fuzzy(FuzzyMatch),
    New(NewItem),
}

/// One user-resolvable suggestion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub id: String,
    pub payload: DecisionPayload,
    /// Full receipt line, for price and review display
    pub receipt_item: ReceiptItem,
}

impl Decision {
    pub fn kind(&self) -> DecisionKind {
        match self.payload {
            DecisionPayload::Fuzzy(_) => DecisionKind::Fuzzy,
            DecisionPayload::New(_) => DecisionKind::New,
        }
    }

    fn receipt_index(&self) -> usize {
        match &self.payload {
            DecisionPayload::Fuzzy(m) => m.receipt_index,
            DecisionPayload::New(n) => n.receipt_index,
        }
    }
}

/// What resolving a decision did
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DecisionOutcome {
    Restocked { pantry_item_id: String },
    Added { pantry_item: PantryItem },
    /// Nothing changed; `follow_up` names a queued new-item decision, if any
    Declined { follow_up: Option<String> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "message", rename_all = "snake_case")]
pub enum Resolution {
    Applied,
    Declined,
    Failed(String),
    /// Left in the queue when the caller abandoned it
    Discarded,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub decision: Decision,
    pub accepted: Option<bool>,
    pub resolution: Resolution,
}

/// Returned by [`TripCompletion::start`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripOutcome {
    pub state: TripState,
    pub restock_result: Option<RestockResult>,
    pub summary: Option<ReconciliationSummary>,
    pub restock_failures: Vec<ItemFailure>,
    pub pending_decisions: usize,
}

/// Everything that happened during one trip
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripReport {
    pub state: TripState,
    pub receipt_id: Option<String>,
    pub list_id: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
    pub restock_result: Option<RestockResult>,
    pub restock_report: Option<RestockReport>,
    pub summary: Option<ReconciliationSummary>,
    pub decisions: Vec<DecisionRecord>,
    /// Restock and decision failures, in the order they happened
    pub failures: Vec<ItemFailure>,
}

/// State machine for completing one shopping trip
pub struct TripCompletion<'a, S: HouseholdStore + ?Sized> {
    store: &'a S,
    engine: RestockEngine,
    config: TripConfig,
    ids: Arc<dyn IdGenerator>,
    state: TripState,
    started: bool,
    receipt_id: Option<String>,
    list_id: Option<String>,
    completed_at: Option<DateTime<Utc>>,
    restock_result: Option<RestockResult>,
    restock_report: Option<RestockReport>,
    summary: Option<ReconciliationSummary>,
    queue: Vec<Decision>,
    log: Vec<DecisionRecord>,
    failures: Vec<ItemFailure>,
}

impl<'a, S: HouseholdStore + ?Sized> TripCompletion<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self {
            store,
            engine: RestockEngine::default(),
            config: TripConfig::default(),
            ids: Arc::new(SequentialIds::new()),
            state: TripState::Linking,
            started: false,
            receipt_id: None,
            list_id: None,
            completed_at: None,
            restock_result: None,
            restock_report: None,
            summary: None,
            queue: Vec::new(),
            log: Vec::new(),
            failures: Vec::new(),
        }
    }

    pub fn with_engine(mut self, engine: RestockEngine) -> Self {
        self.engine = engine;
        self
    }

    pub fn with_config(mut self, config: TripConfig) -> Self {
        self.config = config;
        self
    }

    /// Source of decision ids
    pub fn with_ids(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    pub fn state(&self) -> TripState {
        self.state
    }

    /// Run link, completion and restock, then queue any decisions.
    ///
    /// Can be called once per orchestrator. On a fatal error the state is
    /// `Error` and the error is returned; no later step has run.
    pub async fn start(&mut self, receipt_id: &str, list_id: &str) -> Result<TripOutcome> {
        if self.started {
            return Err(Error::InvalidState(format!(
                "trip already started (state: {})",
                self.state
            )));
        }
        self.started = true;
        self.receipt_id = Some(receipt_id.to_string());
        self.list_id = Some(list_id.to_string());

        match self.run(receipt_id, list_id).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                error!(
                    receipt = receipt_id,
                    list = list_id,
                    step = %self.state,
                    "Trip completion failed: {}",
                    e
                );
                self.state = TripState::Error;
                Err(e)
            }
        }
    }

    async fn run(&mut self, receipt_id: &str, list_id: &str) -> Result<TripOutcome> {
        self.state = TripState::Linking;
        let (receipt, list) = self.link(receipt_id, list_id).await?;

        self.state = TripState::CompletingList;
        self.completed_at = Some(self.complete_shopping(list_id).await?);

        self.state = TripState::Restocking;
        let pantry = remote_call(
            "get_pantry_items",
            self.config.call_timeout,
            self.store.get_pantry_items(),
        )
        .await?;

        let result = self.engine.reconcile(&receipt.items, &pantry);
        let report = self
            .engine
            .apply(self.store, &result, self.config.call_timeout)
            .await;
        let summary = BudgetReconciler::reconcile(&list, &receipt);

        self.failures.extend(report.failures.iter().cloned());
        self.enqueue(&result, &receipt);

        self.state = if self.queue.is_empty() {
            TripState::Done
        } else {
            TripState::AwaitingUserDecisions
        };

        info!(
            receipt = receipt_id,
            list = list_id,
            restocked = report.applied.len(),
            failed = report.failures.len(),
            pending = self.queue.len(),
            saved = summary.saved_money,
            "Trip restocked"
        );

        let outcome = TripOutcome {
            state: self.state,
            restock_result: Some(result.clone()),
            summary: Some(summary.clone()),
            restock_failures: report.failures.clone(),
            pending_decisions: self.queue.len(),
        };
        self.restock_result = Some(result);
        self.restock_report = Some(report);
        self.summary = Some(summary);
        Ok(outcome)
    }

    /// Associate a receipt with a list. Linking the same pair twice is a no-op.
    pub async fn link_receipt_to_list(&self, receipt_id: &str, list_id: &str) -> Result<()> {
        self.link(receipt_id, list_id).await.map(|_| ())
    }

    async fn link(&self, receipt_id: &str, list_id: &str) -> Result<(Receipt, ShoppingList)> {
        let timeout = self.config.call_timeout;

        let receipt = remote_call("get_receipt", timeout, self.store.get_receipt(receipt_id))
            .await?
            .ok_or_else(|| Error::NotFound(format!("receipt {}", receipt_id)))?;
        let list = remote_call("get_list", timeout, self.store.get_list(list_id))
            .await?
            .ok_or_else(|| Error::NotFound(format!("shopping list {}", list_id)))?;

        receipt.validate()?;
        list.validate()?;

        match receipt.list_id.as_deref() {
            Some(linked) if linked == list_id => {
                debug!(receipt = receipt_id, list = list_id, "Receipt already linked");
            }
            Some(other) => {
                return Err(Error::AlreadyLinked {
                    receipt_id: receipt_id.to_string(),
                    list_id: other.to_string(),
                });
            }
            None => {
                remote_call(
                    "link_receipt_to_list",
                    timeout,
                    self.store.link_receipt_to_list(receipt_id, list_id),
                )
                .await?;
                info!(receipt = receipt_id, list = list_id, "Linked receipt to list");
            }
        }

        Ok((receipt, list))
    }

    /// Mark a list completed, returning the completion time.
    ///
    /// Fails without mutating anything if the list is already completed or
    /// is not active/shopping.
    pub async fn complete_shopping(&self, list_id: &str) -> Result<DateTime<Utc>> {
        let timeout = self.config.call_timeout;
        let list = remote_call("get_list", timeout, self.store.get_list(list_id))
            .await?
            .ok_or_else(|| Error::NotFound(format!("shopping list {}", list_id)))?;

        if list.status == crate::models::ListStatus::Completed {
            return Err(Error::AlreadyCompleted(list_id.to_string()));
        }
        if !list.status.can_complete() {
            return Err(Error::InvalidState(format!(
                "list {} is {} and cannot be completed",
                list_id, list.status
            )));
        }

        let completed_at = Utc::now();
        remote_call(
            "complete_shopping_list",
            timeout,
            self.store.complete_shopping_list(list_id, completed_at),
        )
        .await?;

        info!(list = list_id, "Shopping list completed");
        Ok(completed_at)
    }

    fn enqueue(&mut self, result: &RestockResult, receipt: &Receipt) {
        let mut decisions: Vec<Decision> = result
            .fuzzy_matches
            .iter()
            .map(|m| (DecisionPayload::Fuzzy(m.clone()), m.receipt_index))
            .chain(
                result
                    .items_to_add
                    .iter()
                    .map(|n| (DecisionPayload::New(n.clone()), n.receipt_index)),
            )
            .filter_map(|(payload, index)| {
                receipt.items.get(index).map(|item| Decision {
                    id: String::new(),
                    payload,
                    receipt_item: item.clone(),
                })
            })
            .collect();

        // Present in receipt order
        decisions.sort_by_key(Decision::receipt_index);
        for mut decision in decisions {
            decision.id = self.ids.next_id("decision");
            self.queue.push(decision);
        }
    }

    /// Decisions not yet resolved, in presentation order
    pub fn pending_decisions(&self) -> &[Decision] {
        &self.queue
    }

    /// The next decision to present, if any
    pub fn next_decision(&mut self) -> Option<DecisionEntry<'_, 'a, S>> {
        if self.state != TripState::AwaitingUserDecisions || self.queue.is_empty() {
            return None;
        }
        Some(DecisionEntry {
            trip: self,
            index: 0,
        })
    }

    /// A specific pending decision, for callers that resolve out of order
    pub fn take_decision(&mut self, decision_id: &str) -> Option<DecisionEntry<'_, 'a, S>> {
        if self.state != TripState::AwaitingUserDecisions {
            return None;
        }
        let index = self.queue.iter().position(|d| d.id == decision_id)?;
        Some(DecisionEntry { trip: self, index })
    }

    /// Resolve a pending decision by id
    pub async fn resolve(&mut self, decision_id: &str, accept: bool) -> Result<DecisionOutcome> {
        if self.state != TripState::AwaitingUserDecisions {
            return Err(Error::InvalidState(format!(
                "no decisions pending (state: {})",
                self.state
            )));
        }
        let index = self
            .queue
            .iter()
            .position(|d| d.id == decision_id)
            .ok_or_else(|| Error::NotFound(format!("decision {}", decision_id)))?;
        self.resolve_at(index, accept).await
    }

    async fn resolve_at(&mut self, index: usize, accept: bool) -> Result<DecisionOutcome> {
        let decision = self.queue.remove(index);
        let timeout = self.config.call_timeout;

        let (operation, result) = match (&decision.payload, accept) {
            (DecisionPayload::Fuzzy(m), true) => (
                "confirm_fuzzy_restock",
                remote_call(
                    "confirm_fuzzy_restock",
                    timeout,
                    self.store
                        .confirm_fuzzy_restock(&m.pantry_item_id, &decision.receipt_item),
                )
                .await
                .map(|()| DecisionOutcome::Restocked {
                    pantry_item_id: m.pantry_item_id.clone(),
                }),
            ),
            (DecisionPayload::New(n), true) => (
                "add_pantry_item_from_receipt",
                remote_call(
                    "add_pantry_item_from_receipt",
                    timeout,
                    self.store.add_pantry_item_from_receipt(
                        &n.name,
                        n.category.as_deref(),
                        decision.receipt_item.observed_price(),
                    ),
                )
                .await
                .map(|pantry_item| DecisionOutcome::Added { pantry_item }),
            ),
            (DecisionPayload::Fuzzy(m), false) if self.config.offer_add_on_reject => {
                let follow_up = Decision {
                    id: self.ids.next_id("decision"),
                    payload: DecisionPayload::New(NewItem {
                        name: m.receipt_item_name.clone(),
                        category: decision.receipt_item.category.clone(),
                        receipt_index: m.receipt_index,
                    }),
                    receipt_item: decision.receipt_item.clone(),
                };
                let follow_up_id = follow_up.id.clone();
                self.queue.insert(index.min(self.queue.len()), follow_up);
                (
                    "decline",
                    Ok(DecisionOutcome::Declined {
                        follow_up: Some(follow_up_id),
                    }),
                )
            }
            (_, false) => ("decline", Ok(DecisionOutcome::Declined { follow_up: None })),
        };

        let resolution = match &result {
            Ok(DecisionOutcome::Declined { .. }) => Resolution::Declined,
            Ok(_) => Resolution::Applied,
            Err(e) => {
                warn!(
                    item = %decision.receipt_item.name,
                    decision = %decision.id,
                    "Decision failed: {}",
                    e
                );
                self.failures.push(ItemFailure {
                    item: decision.receipt_item.name.clone(),
                    operation: operation.to_string(),
                    message: e.to_string(),
                });
                Resolution::Failed(e.to_string())
            }
        };
        debug!(decision = %decision.id, accepted = accept, ?resolution, "Decision resolved");

        self.log.push(DecisionRecord {
            decision,
            accepted: Some(accept),
            resolution,
        });
        self.finish_if_drained();
        result
    }

    /// Drop every unresolved decision. Applied decisions stay applied.
    ///
    /// Returns how many decisions were discarded.
    pub fn abandon(&mut self) -> usize {
        if self.state != TripState::AwaitingUserDecisions {
            return 0;
        }
        let discarded = self.queue.len();
        for decision in self.queue.drain(..) {
            self.log.push(DecisionRecord {
                decision,
                accepted: None,
                resolution: Resolution::Discarded,
            });
        }
        info!(discarded, "Decision queue abandoned");
        self.finish_if_drained();
        discarded
    }

    fn finish_if_drained(&mut self) {
        if self.queue.is_empty() && self.state == TripState::AwaitingUserDecisions {
            self.state = TripState::Done;
            info!(
                decisions = self.log.len(),
                failures = self.failures.len(),
                "Trip complete"
            );
        }
    }

    /// Snapshot of the trip so far
    pub fn report(&self) -> TripReport {
        TripReport {
            state: self.state,
            receipt_id: self.receipt_id.clone(),
            list_id: self.list_id.clone(),
            completed_at: self.completed_at,
            restock_result: self.restock_result.clone(),
            restock_report: self.restock_report.clone(),
            summary: self.summary.clone(),
            decisions: self.log.clone(),
            failures: self.failures.clone(),
        }
    }
}

/// A pending decision handed out by the queue.
///
/// Dropping the entry without resolving leaves it in the queue.
pub struct DecisionEntry<'t, 'a, S: HouseholdStore + ?Sized> {
    trip: &'t mut TripCompletion<'a, S>,
    index: usize,
}

impl<'t, 'a, S: HouseholdStore + ?Sized> DecisionEntry<'t, 'a, S> {
    pub fn decision(&self) -> &Decision {
        &self.trip.queue[self.index]
    }

    pub fn kind(&self) -> DecisionKind {
        self.decision().kind()
    }

    /// Accept or reject the suggestion.
    ///
    /// Accepting a fuzzy match confirms the restock; accepting a new item adds
    /// it to the pantry. A failed call is recorded on the trip and returned,
    /// and the queue moves on either way.
    pub async fn resolve(self, accept: bool) -> Result<DecisionOutcome> {
        self.trip.resolve_at(self.index, accept).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ListStatus, ShoppingListItem, StockLevel};
    use crate::store::MemoryStore;

    fn fixture() -> MemoryStore {
        let store = MemoryStore::new();
        let mut milk = PantryItem::new("p1", "Milk", "dairy");
        milk.stock_level = StockLevel::Out;
        store.insert_pantry_item(milk);
        store.insert_pantry_item(PantryItem::new("p2", "Butter", "dairy"));
        store.insert_pantry_item(PantryItem::new("p3", "Cheddar", "dairy"));

        store.insert_list(
            ShoppingList::new("l1", "Weekly shop", Some(20.0)).with_items(vec![
                ShoppingListItem::new("Milk"),
                ShoppingListItem::new("Butter"),
            ]),
        );
        store.insert_receipt(Receipt::new(
            "r1",
            vec![
                ReceiptItem::new("Milk", 1.0, 1.2),
                ReceiptItem::new("Buter", 1.0, 2.5),
                ReceiptItem::new("Chedar", 1.0, 3.0),
                ReceiptItem::new("Lentils", 2.0, 0.9),
            ],
        ));
        store
    }

    fn no_timeout() -> TripConfig {
        TripConfig {
            call_timeout: None,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_start_runs_pipeline() {
        let store = fixture();
        let mut trip = TripCompletion::new(&store);
        let outcome = trip.start("r1", "l1").await.unwrap();

        assert_eq!(outcome.state, TripState::AwaitingUserDecisions);
        assert_eq!(outcome.pending_decisions, 3);
        let result = outcome.restock_result.unwrap();
        assert_eq!(result.restocked_items.len(), 1);
        assert_eq!(store.pantry_item("p1").unwrap().stock_level, StockLevel::Stocked);
        assert_eq!(store.pantry_item("p1").unwrap().last_known_price, Some(1.2));

        let list = store.list("l1").unwrap();
        assert_eq!(list.status, ListStatus::Completed);
        assert!(list.completed_at.is_some());
        assert_eq!(store.receipt("r1").unwrap().list_id.as_deref(), Some("l1"));

        let summary = outcome.summary.unwrap();
        assert_eq!(summary.unplanned_items.len(), 3);
        assert_eq!(summary.missed_planned_items, vec!["Butter"]);

        // Decisions come out in receipt order
        let kinds: Vec<DecisionKind> = trip.pending_decisions().iter().map(Decision::kind).collect();
        assert_eq!(
            kinds,
            vec![DecisionKind::Fuzzy, DecisionKind::Fuzzy, DecisionKind::New]
        );
    }

    #[tokio::test]
    async fn test_empty_queue_goes_straight_to_done() {
        let store = fixture();
        store.insert_receipt(Receipt::new("r2", vec![ReceiptItem::new("milk", 1.0, 1.0)]));
        let mut trip = TripCompletion::new(&store);
        let outcome = trip.start("r2", "l1").await.unwrap();

        assert_eq!(outcome.state, TripState::Done);
        assert!(trip.next_decision().is_none());
    }

    #[tokio::test]
    async fn test_decision_queue_resilience() {
        let store = fixture();
        store.fail_on("confirm_fuzzy_restock", "p3");

        let mut trip = TripCompletion::new(&store).with_config(no_timeout());
        trip.start("r1", "l1").await.unwrap();
        assert_eq!(trip.pending_decisions().len(), 3);

        let mut results = Vec::new();
        while let Some(entry) = trip.next_decision() {
            results.push(entry.resolve(true).await);
        }

        assert!(results[0].is_ok());
        assert!(matches!(results[1], Err(Error::RemoteCall { .. })));
        assert!(results[2].is_ok());
        assert_eq!(store.calls_to("confirm_fuzzy_restock"), vec!["p2", "p3"]);
        assert_eq!(store.calls_to("add_pantry_item_from_receipt"), vec!["Lentils"]);
        assert_eq!(trip.state(), TripState::Done);

        let report = trip.report();
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].item, "Chedar");
        assert_eq!(report.decisions.len(), 3);
        assert!(matches!(report.decisions[1].resolution, Resolution::Failed(_)));
    }

    #[tokio::test]
    async fn test_resolve_out_of_order() {
        let store = fixture();
        let mut trip = TripCompletion::new(&store);
        trip.start("r1", "l1").await.unwrap();

        let last = trip.pending_decisions()[2].id.clone();
        let entry = trip.take_decision(&last).unwrap();
        assert_eq!(entry.kind(), DecisionKind::New);
        let outcome = entry.resolve(true).await.unwrap();
        match outcome {
            DecisionOutcome::Added { pantry_item } => {
                assert_eq!(pantry_item.name, "Lentils");
                assert_eq!(pantry_item.last_known_price, Some(0.9));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }

        assert_eq!(trip.pending_decisions().len(), 2);
        assert_eq!(trip.state(), TripState::AwaitingUserDecisions);
        assert!(matches!(
            trip.resolve("decision-999", true).await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_rejecting_fuzzy_offers_new_item() {
        let store = fixture();
        let mut trip = TripCompletion::new(&store);
        trip.start("r1", "l1").await.unwrap();

        let entry = trip.next_decision().unwrap();
        assert_eq!(entry.decision().receipt_item.name, "Buter");
        let outcome = entry.resolve(false).await.unwrap();
        let follow_up = match outcome {
            DecisionOutcome::Declined { follow_up } => follow_up.unwrap(),
            other => panic!("unexpected outcome: {other:?}"),
        };

        let next = trip.next_decision().unwrap();
        assert_eq!(next.decision().id, follow_up);
        assert_eq!(next.kind(), DecisionKind::New);
        assert_eq!(trip.pending_decisions().len(), 3);
        assert!(store.calls_to("confirm_fuzzy_restock").is_empty());
    }

    #[tokio::test]
    async fn test_rejecting_without_follow_up() {
        let store = fixture();
        let mut trip = TripCompletion::new(&store).with_config(TripConfig {
            offer_add_on_reject: false,
            ..Default::default()
        });
        trip.start("r1", "l1").await.unwrap();

        while let Some(entry) = trip.next_decision() {
            entry.resolve(false).await.unwrap();
        }
        assert_eq!(trip.state(), TripState::Done);
        assert_eq!(store.pantry().len(), 3);
        assert!(trip
            .report()
            .decisions
            .iter()
            .all(|d| d.resolution == Resolution::Declined));
    }

    #[tokio::test]
    async fn test_abandon_keeps_applied_decisions() {
        let store = fixture();
        let mut trip = TripCompletion::new(&store);
        trip.start("r1", "l1").await.unwrap();

        trip.next_decision().unwrap().resolve(true).await.unwrap();
        assert_eq!(trip.abandon(), 2);
        assert_eq!(trip.state(), TripState::Done);
        assert!(trip.next_decision().is_none());

        let report = trip.report();
        assert_eq!(report.decisions[0].resolution, Resolution::Applied);
        assert_eq!(report.decisions[1].resolution, Resolution::Discarded);
        assert!(store.pantry_item("p2").unwrap().updated_at.is_some());
    }

    #[tokio::test]
    async fn test_complete_twice() {
        let store = fixture();
        let trip = TripCompletion::new(&store);

        trip.complete_shopping("l1").await.unwrap();
        let err = trip.complete_shopping("l1").await.unwrap_err();

        assert!(matches!(err, Error::AlreadyCompleted(_)));
        assert_eq!(store.calls_to("complete_shopping_list").len(), 1);
    }

    #[tokio::test]
    async fn test_complete_archived_list_is_invalid() {
        let store = fixture();
        let mut list = ShoppingList::new("l2", "Old", None);
        list.status = ListStatus::Archived;
        store.insert_list(list);

        let trip = TripCompletion::new(&store);
        let err = trip.complete_shopping("l2").await.unwrap_err();
        assert!(matches!(err, Error::InvalidState(_)));
        assert!(store.calls_to("complete_shopping_list").is_empty());
    }

    #[tokio::test]
    async fn test_link_is_idempotent() {
        let store = fixture();
        let trip = TripCompletion::new(&store);

        trip.link_receipt_to_list("r1", "l1").await.unwrap();
        trip.link_receipt_to_list("r1", "l1").await.unwrap();
        assert_eq!(store.calls_to("link_receipt_to_list").len(), 1);
    }

    #[tokio::test]
    async fn test_link_errors() {
        let store = fixture();
        store.insert_list(ShoppingList::new("l2", "Other", None));
        let trip = TripCompletion::new(&store);

        assert!(matches!(
            trip.link_receipt_to_list("nope", "l1").await,
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            trip.link_receipt_to_list("r1", "nope").await,
            Err(Error::NotFound(_))
        ));

        trip.link_receipt_to_list("r1", "l1").await.unwrap();
        let err = trip.link_receipt_to_list("r1", "l2").await.unwrap_err();
        assert!(matches!(err, Error::AlreadyLinked { ref list_id, .. } if list_id == "l1"));
    }

    #[tokio::test]
    async fn test_completion_failure_is_fatal() {
        let store = fixture();
        store.fail_on("complete_shopping_list", "l1");
        let mut trip = TripCompletion::new(&store);

        let err = trip.start("r1", "l1").await.unwrap_err();
        assert!(err.is_remote());
        assert_eq!(trip.state(), TripState::Error);
        assert!(store.calls_to("get_pantry_items").is_empty());
        assert!(store.calls_to("restock_pantry_item").is_empty());
    }

    #[tokio::test]
    async fn test_already_completed_list_halts_before_restock() {
        let store = fixture();
        let mut list = store.list("l1").unwrap();
        list.status = ListStatus::Completed;
        store.insert_list(list);

        let mut trip = TripCompletion::new(&store);
        let err = trip.start("r1", "l1").await.unwrap_err();
        assert!(matches!(err, Error::AlreadyCompleted(_)));
        assert_eq!(trip.state(), TripState::Error);
        assert!(store.calls_to("restock_pantry_item").is_empty());
    }

    #[tokio::test]
    async fn test_invalid_receipt_is_not_linked() {
        let store = fixture();
        store.insert_receipt(Receipt::new("empty", vec![]));
        let mut trip = TripCompletion::new(&store);

        let err = trip.start("empty", "l1").await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(store.calls_to("link_receipt_to_list").is_empty());
    }

    #[tokio::test]
    async fn test_start_only_once() {
        let store = fixture();
        let mut trip = TripCompletion::new(&store);
        trip.start("r1", "l1").await.unwrap();
        assert!(matches!(
            trip.start("r1", "l1").await,
            Err(Error::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn test_restock_failure_is_recorded_not_fatal() {
        let store = fixture();
        store.fail_on("restock_pantry_item", "p1");
        let mut trip = TripCompletion::new(&store);

        let outcome = trip.start("r1", "l1").await.unwrap();
        assert_eq!(outcome.restock_failures.len(), 1);
        assert_eq!(outcome.restock_failures[0].item, "Milk");
        assert_eq!(outcome.state, TripState::AwaitingUserDecisions);
    }

    #[tokio::test]
    async fn test_slow_decision_times_out_and_queue_moves_on() {
        let store = fixture();
        store.delay_on("add_pantry_item_from_receipt", Duration::from_millis(200));
        let mut trip = TripCompletion::new(&store).with_config(TripConfig {
            call_timeout: Some(Duration::from_millis(20)),
            offer_add_on_reject: false,
        });
        trip.start("r1", "l1").await.unwrap();

        while let Some(entry) = trip.next_decision() {
            let _ = entry.resolve(true).await;
        }
        let report = trip.report();
        assert_eq!(report.state, TripState::Done);
        assert_eq!(report.failures.len(), 1);
        assert!(report.failures[0].message.contains("timed out"));
    }
}
