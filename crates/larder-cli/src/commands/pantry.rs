//! Pantry management commands

use anyhow::{anyhow, Context, Result};
use larder_core::db::Database;
use larder_core::models::StockLevel;

use super::{money, truncate};

/// List pantry items, optionally filtered by stock level
pub fn cmd_pantry_list(db: &Database, level: Option<&str>) -> Result<()> {
    let level: Option<StockLevel> = level
        .map(|l| l.parse().map_err(|e: String| anyhow!(e)))
        .transpose()?;

    let items = db.list_pantry_items(level)?;
    if items.is_empty() {
        match level {
            Some(l) => println!("No pantry items at level '{}'", l),
            None => println!("Pantry is empty. Add items with: larder pantry add NAME"),
        }
        return Ok(());
    }

    println!("\n🥫 Pantry ({} items)", items.len());
    println!("{}", "─".repeat(70));
    println!(
        "  {:<14} {:<28} {:<14} {:<8} {:>8}",
        "ID", "Name", "Category", "Level", "Price"
    );

    for item in &items {
        let marker = match item.stock_level {
            StockLevel::Out => "❌",
            StockLevel::Low => "⚠️ ",
            _ => "  ",
        };
        println!(
            "{}{:<14} {:<28} {:<14} {:<8} {:>8}",
            marker,
            truncate(&item.id, 14),
            truncate(&item.name, 28),
            truncate(&item.category, 14),
            item.stock_level,
            money(item.last_known_price)
        );
    }

    println!();
    Ok(())
}

pub fn cmd_pantry_add(
    db: &Database,
    name: &str,
    category: Option<&str>,
    level: &str,
    price: Option<f64>,
) -> Result<()> {
    let level: StockLevel = level.parse().map_err(|e: String| anyhow!(e))?;
    let item = db
        .create_pantry_item(name, category, level, price)
        .context("Failed to add pantry item")?;

    println!(
        "✅ Added {} ({}, {}) as {}",
        item.name, item.category, item.stock_level, item.id
    );
    Ok(())
}

pub fn cmd_pantry_set(db: &Database, id: &str, level: &str) -> Result<()> {
    let level: StockLevel = level.parse().map_err(|e: String| anyhow!(e))?;
    db.set_stock_level(id, level)?;
    println!("✓ {} is now {}", id, level);
    Ok(())
}

pub fn cmd_pantry_remove(db: &Database, id: &str) -> Result<()> {
    let item = db
        .find_pantry_item(id)?
        .ok_or_else(|| anyhow!("Pantry item {} not found", id))?;
    db.delete_pantry_item(id)?;
    println!("🗑️  Removed {} ({})", item.name, item.id);
    Ok(())
}
