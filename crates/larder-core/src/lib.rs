//! Larder Core Library
//!
//! Receipt-to-pantry reconciliation for the Larder household tool:
//! - Item name normalization, similarity scoring and match classification
//! - Restock engine partitioning a receipt into exact/fuzzy/new buckets
//! - Budget reconciliation of a trip against its shopping list
//! - Trip completion state machine with a pull-based decision queue
//! - `HouseholdStore` trait with SQLite and in-memory implementations
//! - Receipt import (JSON parser output or CSV line items)

pub mod budget;
pub mod config;
pub mod db;
pub mod error;
pub mod ids;
pub mod import;
pub mod matching;
pub mod models;
pub mod restock;
pub mod store;
pub mod trip;

pub use budget::{BudgetReconciler, ReconciliationSummary};
pub use config::Config;
pub use db::{Database, DbStats, ReceiptInsertResult};
pub use error::{Error, Result};
pub use ids::{HashedIds, IdGenerator, SequentialIds};
pub use import::{ParsedReceipt, ReceiptFormat};
pub use matching::{Classification, MatchClassifier, MatchConfig, MatchDecision};
pub use restock::{
    FuzzyMatch, ItemFailure, NewItem, RestockEngine, RestockReport, RestockResult, RestockedItem,
};
pub use store::{HouseholdStore, MemoryStore};
pub use trip::{
    Decision, DecisionEntry, DecisionKind, DecisionOutcome, DecisionPayload, DecisionRecord,
    Resolution, TripCompletion, TripConfig, TripOutcome, TripReport, TripState,
};
