//! Status command implementation

use std::path::Path;

use anyhow::Result;
use larder_core::config::default_config_path;

use super::{load_config, open_db};

pub fn cmd_status(db_path: &Path, config_path: Option<&Path>, no_encrypt: bool) -> Result<()> {
    use larder_core::db::DB_KEY_ENV;
    use std::fs;

    println!();
    println!("📊 Larder Status");
    println!("   ─────────────────────────────────────────────────────────────");

    println!("   Database: {}", db_path.display());

    if db_path.exists() {
        if let Ok(metadata) = fs::metadata(db_path) {
            let size_kb = metadata.len() as f64 / 1024.0;
            if size_kb < 1024.0 {
                println!("   Size: {:.1} KB", size_kb);
            } else {
                println!("   Size: {:.1} MB", size_kb / 1024.0);
            }
        }
    } else {
        println!("   Size: (database not initialized)");
    }

    let has_key = std::env::var(DB_KEY_ENV).is_ok();
    if no_encrypt {
        println!("   ⚠️  Encryption: DISABLED (--no-encrypt)");
    } else if has_key {
        println!("   🔒 Encryption: ENABLED ({}=***)", DB_KEY_ENV);
    } else {
        println!("   ❌ Encryption: REQUIRED but {} not set", DB_KEY_ENV);
    }

    let override_path = config_path
        .map(Path::to_path_buf)
        .or_else(default_config_path)
        .filter(|p| p.exists());
    match override_path {
        Some(p) => println!("   Config: {}", p.display()),
        None => println!("   Config: (built-in defaults)"),
    }
    match load_config(config_path) {
        Ok(config) => println!(
            "   Matching: exact >= {}, fuzzy >= {}",
            config.matching.exact_threshold, config.matching.fuzzy_threshold
        ),
        Err(e) => println!("   ❌ Config error: {:#}", e),
    }

    if db_path.exists() {
        match open_db(db_path, no_encrypt) {
            Ok(db) => {
                if let Ok(stats) = db.stats() {
                    println!();
                    println!(
                        "   Pantry items: {} ({} running low)",
                        stats.pantry_items, stats.running_low
                    );
                    println!(
                        "   Lists: {} open, {} completed",
                        stats.open_lists, stats.completed_lists
                    );
                    println!(
                        "   Receipts: {} ({} not linked to a list)",
                        stats.receipts, stats.unlinked_receipts
                    );
                }
            }
            Err(e) => {
                println!();
                println!("   ❌ Error opening database: {}", e);
                if !no_encrypt && !has_key {
                    println!("      Set {} or use --no-encrypt", DB_KEY_ENV);
                } else if has_key {
                    println!("      (Check if {} is correct)", DB_KEY_ENV);
                }
            }
        }
    }

    println!();
    Ok(())
}
