//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Larder - Keep the pantry in step with what you actually bought
#[derive(Parser)]
#[command(name = "larder")]
#[command(about = "Household pantry tracker with receipt reconciliation", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Database path
    #[arg(long, default_value = "larder.db", global = true)]
    pub db: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable database encryption
    ///
    /// By default, the database is encrypted using SQLCipher.
    /// Set LARDER_DB_KEY environment variable with your passphrase.
    #[arg(long, global = true)]
    pub no_encrypt: bool,

    /// Config file (defaults to ~/.local/share/larder/config/larder.toml, then built-in defaults)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the database
    Init,

    /// Show database status and counts
    Status,

    /// Manage pantry items
    Pantry {
        #[command(subcommand)]
        action: Option<PantryAction>,
    },

    /// Manage shopping lists
    Lists {
        #[command(subcommand)]
        action: Option<ListsAction>,
    },

    /// Import and inspect receipts
    Receipts {
        #[command(subcommand)]
        action: Option<ReceiptsAction>,
    },

    /// Preview a trip without changing anything
    Reconcile {
        /// Receipt ID
        receipt_id: String,

        /// Shopping list ID (defaults to the list the receipt is linked to)
        list_id: Option<String>,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Complete a shopping trip: link, complete the list, restock, then decide
    ///
    /// Without decision flags, each fuzzy match and new item is asked about
    /// interactively.
    Trip {
        /// Receipt ID
        receipt_id: String,

        /// Shopping list ID
        list_id: String,

        /// Accept every fuzzy match without asking
        #[arg(long, conflicts_with = "reject_fuzzy")]
        accept_fuzzy: bool,

        /// Reject every fuzzy match without asking
        #[arg(long)]
        reject_fuzzy: bool,

        /// Add every new item to the pantry without asking
        #[arg(long, conflicts_with = "skip_new")]
        add_new: bool,

        /// Skip every new item without asking
        #[arg(long)]
        skip_new: bool,

        /// Print the trip report as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
pub enum PantryAction {
    /// List pantry items
    List {
        /// Only items at this stock level: stocked, good, low, out
        #[arg(long)]
        level: Option<String>,
    },

    /// Add a pantry item
    Add {
        /// Item name
        name: String,

        /// Category (defaults to "uncategorized")
        #[arg(short, long)]
        category: Option<String>,

        /// Stock level: stocked, good, low, out
        #[arg(long, default_value = "stocked")]
        level: String,

        /// Last price paid
        #[arg(long)]
        price: Option<f64>,
    },

    /// Set an item's stock level
    Set {
        /// Pantry item ID
        id: String,
        /// Stock level: stocked, good, low, out
        level: String,
    },

    /// Remove a pantry item
    Remove {
        /// Pantry item ID
        id: String,
    },
}

#[derive(Subcommand)]
pub enum ListsAction {
    /// List shopping lists
    List {
        /// Filter by status: active, shopping, completed, archived
        #[arg(long)]
        status: Option<String>,
    },

    /// Create a shopping list
    Create {
        /// List name
        name: String,

        /// Planned spend
        #[arg(short, long)]
        budget: Option<f64>,
    },

    /// Add an item to a list
    Add {
        /// Shopping list ID
        list_id: String,

        /// Item name
        name: String,

        /// Quantity
        #[arg(short, long, default_value = "1")]
        quantity: f64,

        /// Priority: high, medium, low
        #[arg(short, long, default_value = "medium")]
        priority: String,

        /// Pantry item this entry replenishes
        #[arg(long)]
        pantry_item: Option<String>,
    },

    /// Show a list with its items
    Show {
        /// Shopping list ID
        list_id: String,
    },

    /// Change a list's status (active, shopping, archived)
    Status {
        /// Shopping list ID
        list_id: String,
        /// New status
        status: String,
    },
}

#[derive(Subcommand)]
pub enum ReceiptsAction {
    /// Import a parsed receipt (JSON parser output or CSV of line items)
    Import {
        /// File to import
        #[arg(short, long)]
        file: PathBuf,

        /// File format: json, csv (detected from the extension if not specified)
        #[arg(long)]
        format: Option<String>,

        /// Store name (overrides the file)
        #[arg(long)]
        store: Option<String>,

        /// Purchase date, e.g. 2024-05-03 (overrides the file)
        #[arg(long)]
        date: Option<String>,

        /// Printed receipt total (overrides the file)
        #[arg(long)]
        total: Option<f64>,
    },

    /// List imported receipts
    List,

    /// Show a receipt with its line items
    Show {
        /// Receipt ID
        receipt_id: String,
    },
}
