//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `core` - Core commands (init) and shared utilities (open_db, load_config)
//! - `lists` - Shopping list commands (list, create, add, show, status)
//! - `pantry` - Pantry commands (list, add, set, remove)
//! - `receipts` - Receipt import and inspection
//! - `reconcile` - Dry-run preview of a trip
//! - `status` - Database status
//! - `trip` - Trip completion with interactive decisions

pub mod core;
pub mod lists;
pub mod pantry;
pub mod receipts;
pub mod reconcile;
pub mod status;
pub mod trip;

// Re-export command functions for main.rs
pub use core::*;
pub use lists::*;
pub use pantry::*;
pub use receipts::*;
pub use reconcile::*;
pub use status::*;
pub use trip::*;

/// Truncate a string to a maximum length, adding "..." if truncated
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Format an amount for display, or "-" when unknown
pub fn money(amount: Option<f64>) -> String {
    match amount {
        Some(a) => format!("${:.2}", a),
        None => "-".to_string(),
    }
}
