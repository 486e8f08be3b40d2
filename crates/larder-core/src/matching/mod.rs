//! Name matching between receipt lines and pantry items
//!
//! - `normalize` - canonical item names
//! - `similarity` - 0-100 edit-distance score
//! - `classify` - exact / fuzzy / new decision with configurable thresholds

pub mod classify;
pub mod normalize;
pub mod similarity;

pub use classify::{Classification, MatchClassifier, MatchConfig, MatchDecision};
pub use normalize::normalize;
pub use similarity::score;
