//! Core command implementations and shared utilities
//!
//! This module contains:
//! - `open_db` - Shared utility to open the database
//! - `load_config` - Resolve matching and trip settings
//! - `cmd_init` - Initialize the database

use std::path::Path;

use anyhow::{Context, Result};
use larder_core::{db::Database, Config};
use tracing::debug;

/// Open database with encryption by default, or unencrypted if --no-encrypt
pub fn open_db(db_path: &Path, no_encrypt: bool) -> Result<Database> {
    let path_str = db_path
        .to_str()
        .context("Database path is not valid UTF-8")?;
    if no_encrypt {
        Database::new_unencrypted(path_str).context("Failed to open database (unencrypted)")
    } else {
        Database::new(path_str).context("Failed to open database")
    }
}

/// Load config from --config, the data-dir override, or built-in defaults
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let config = Config::load(path).context("Failed to load config")?;
    debug!(
        exact = config.matching.exact_threshold,
        fuzzy = config.matching.fuzzy_threshold,
        "Loaded config"
    );
    Ok(config)
}

pub fn cmd_init(db_path: &Path, no_encrypt: bool) -> Result<()> {
    println!("🔧 Initializing database at {}...", db_path.display());

    let db = open_db(db_path, no_encrypt)?;
    let stats = db.stats().context("Failed to read database")?;
    println!("   Pantry items: {}", stats.pantry_items);

    if no_encrypt {
        println!("   ⚠️  Encryption: DISABLED (--no-encrypt)");
    } else {
        println!("   🔒 Encryption: ENABLED");
    }

    println!("✅ Database initialized successfully!");
    println!();
    println!("Next steps:");
    println!("  1. Add pantry items: larder pantry add \"Milk\" --category dairy");
    println!("  2. Plan a trip: larder lists create \"Weekly\" --budget 60");
    println!("  3. Import a receipt: larder receipts import --file receipt.json");
    println!("  4. Complete the trip: larder trip RECEIPT_ID LIST_ID");

    Ok(())
}
