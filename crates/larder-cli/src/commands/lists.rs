//! Shopping list commands

use anyhow::{anyhow, Context, Result};
use larder_core::db::Database;
use larder_core::models::{ListStatus, Priority, ShoppingListItem};

use super::{money, truncate};

pub fn cmd_lists_list(db: &Database, status: Option<&str>) -> Result<()> {
    let status: Option<ListStatus> = status
        .map(|s| s.parse().map_err(|e: String| anyhow!(e)))
        .transpose()?;

    let lists = db.list_lists(status)?;
    if lists.is_empty() {
        println!("No shopping lists found");
        return Ok(());
    }

    println!("\n📝 Shopping Lists ({})", lists.len());
    println!("{}", "─".repeat(70));

    for list in &lists {
        println!(
            "  {:<14} {:<28} {:<10} {:>3} items  budget {}",
            truncate(&list.id, 14),
            truncate(&list.name, 28),
            list.status,
            list.items.len(),
            money(list.budget)
        );
        if let Some(at) = list.completed_at {
            println!("         ✓ Completed {}", at.format("%Y-%m-%d %H:%M"));
        }
    }

    println!();
    Ok(())
}

pub fn cmd_lists_create(db: &Database, name: &str, budget: Option<f64>) -> Result<()> {
    let list = db
        .create_list(name, budget)
        .context("Failed to create list")?;
    println!("✅ Created list {} ({})", list.name, list.id);
    if let Some(b) = list.budget {
        println!("   Budget: ${:.2}", b);
    }
    Ok(())
}

pub fn cmd_lists_add(
    db: &Database,
    list_id: &str,
    name: &str,
    quantity: f64,
    priority: &str,
    pantry_item_id: Option<&str>,
) -> Result<()> {
    let priority: Priority = priority.parse().map_err(|e: String| anyhow!(e))?;
    if quantity <= 0.0 {
        return Err(anyhow!("Quantity must be positive, got {}", quantity));
    }
    if let Some(id) = pantry_item_id {
        if db.find_pantry_item(id)?.is_none() {
            return Err(anyhow!("Pantry item {} not found", id));
        }
    }

    let item = ShoppingListItem {
        name: name.trim().to_string(),
        quantity,
        priority,
        pantry_item_id: pantry_item_id.map(String::from),
    };
    db.add_list_item(list_id, &item)?;
    println!("✓ Added {} x{} to {} ({})", item.name, quantity, list_id, priority);
    Ok(())
}

pub fn cmd_lists_show(db: &Database, list_id: &str) -> Result<()> {
    let list = db
        .find_list(list_id)?
        .ok_or_else(|| anyhow!("Shopping list {} not found", list_id))?;

    println!("\n📝 {} ({})", list.name, list.id);
    println!("{}", "─".repeat(70));
    println!("   Status: {}", list.status);
    println!("   Budget: {}", money(list.budget));
    if let Some(at) = list.completed_at {
        println!("   Completed: {}", at.format("%Y-%m-%d %H:%M"));
    }
    println!();

    if list.items.is_empty() {
        println!("   (no items)");
    }
    for item in &list.items {
        let linked = if item.pantry_item_id.is_some() { " 🔗" } else { "" };
        println!(
            "   • {:<30} x{:<5} {}{}",
            truncate(&item.name, 30),
            item.quantity,
            item.priority,
            linked
        );
    }

    println!();
    Ok(())
}

pub fn cmd_lists_status(db: &Database, list_id: &str, status: &str) -> Result<()> {
    let status: ListStatus = status.parse().map_err(|e: String| anyhow!(e))?;
    if status == ListStatus::Completed {
        return Err(anyhow!(
            "Lists are completed by a trip: larder trip RECEIPT_ID {}",
            list_id
        ));
    }
    db.set_list_status(list_id, status)?;
    println!("✓ {} is now {}", list_id, status);
    Ok(())
}
