//! Dry-run reconciliation
//!
//! Runs the whole trip against an in-memory snapshot of the database so the
//! user can see what would be restocked, suggested and added before anything
//! is written.

use anyhow::{anyhow, Context, Result};
use larder_core::db::Database;
use larder_core::models::{PantryItem, Receipt};
use larder_core::{
    MemoryStore, ReconciliationSummary, RestockEngine, RestockResult, TripCompletion,
};
use larder_core::Config;

use super::receipts::print_review_flags;
use super::{money, truncate};

pub async fn cmd_reconcile(
    db: &Database,
    config: &Config,
    receipt_id: &str,
    list_id: Option<&str>,
    json: bool,
) -> Result<()> {
    let receipt = db
        .find_receipt(receipt_id)?
        .ok_or_else(|| anyhow!("Receipt {} not found", receipt_id))?;
    let list_id = match list_id.map(String::from).or_else(|| receipt.list_id.clone()) {
        Some(id) => id,
        None => {
            return Err(anyhow!(
                "Receipt {} is not linked to a list; pass a LIST_ID",
                receipt_id
            ))
        }
    };
    let list = db
        .find_list(&list_id)?
        .ok_or_else(|| anyhow!("Shopping list {} not found", list_id))?;
    let pantry = db.list_pantry_items(None)?;

    let snapshot = MemoryStore::seeded(pantry.clone(), vec![list], vec![receipt.clone()]);
    let mut trip = TripCompletion::new(&snapshot)
        .with_engine(RestockEngine::new(config.matching.clone()))
        .with_config(config.trip.clone());
    let outcome = trip
        .start(receipt_id, &list_id)
        .await
        .context("Preview failed")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }

    println!();
    println!("🔎 Preview: receipt {} against list {}", receipt.id, list_id);
    println!("{}", "─".repeat(70));

    if let Some(result) = &outcome.restock_result {
        print_restock_result(result, &receipt, &pantry);
    }
    print_review_flags(&receipt, config.review_confidence);
    if let Some(summary) = &outcome.summary {
        print_summary(summary);
    }

    println!();
    println!("Nothing was changed. To apply: larder trip {} {}", receipt.id, list_id);
    Ok(())
}

fn pantry_name<'p>(pantry: &'p [PantryItem], id: &str) -> &'p str {
    pantry
        .iter()
        .find(|p| p.id == id)
        .map(|p| p.name.as_str())
        .unwrap_or("?")
}

/// Print the three reconciliation buckets
pub(crate) fn print_restock_result(result: &RestockResult, receipt: &Receipt, pantry: &[PantryItem]) {
    let price = |index: usize| money(receipt.items.get(index).map(|i| i.total_price));

    println!();
    println!("   ✓ Restock ({})", result.restocked_items.len());
    for item in &result.restocked_items {
        println!(
            "      {:<28} → {:<24} {:>8}",
            truncate(&item.receipt_item_name, 28),
            truncate(pantry_name(pantry, &item.pantry_item_id), 24),
            price(item.receipt_index)
        );
    }

    println!("   🤔 Confirm ({})", result.fuzzy_matches.len());
    for m in &result.fuzzy_matches {
        println!(
            "      {:<28} ≈ {:<24} {:>3}%",
            truncate(&m.receipt_item_name, 28),
            truncate(&m.pantry_item_name, 24),
            m.similarity
        );
    }

    println!("   🆕 New ({})", result.items_to_add.len());
    for item in &result.items_to_add {
        let category = item.category.as_deref().unwrap_or("-");
        println!(
            "      {:<28} {:<24} {:>8}",
            truncate(&item.name, 28),
            truncate(category, 24),
            price(item.receipt_index)
        );
    }
}

/// Print budget and plan adherence
pub(crate) fn print_summary(summary: &ReconciliationSummary) {
    println!();
    println!("   💰 Budget");
    if summary.budget > 0.0 {
        println!("      Planned: ${:.2}", summary.budget);
    } else {
        println!("      Planned: (no budget)");
    }
    println!("      Spent:   ${:.2}", summary.actual_total);
    if summary.budget > 0.0 {
        if summary.saved_money {
            println!(
                "      ✅ Under budget by ${:.2} ({:.1}%)",
                summary.difference, summary.percent_saved
            );
        } else if summary.overspend > 0.0 {
            println!("      ⚠️  Over budget by ${:.2}", summary.overspend);
        } else {
            println!("      On budget");
        }
    }

    println!(
        "      Items: {} planned, {} bought",
        summary.planned_items_count, summary.actual_items_count
    );
    if !summary.unplanned_items.is_empty() {
        let names: Vec<&str> = summary
            .unplanned_items
            .iter()
            .map(|i| i.name.as_str())
            .collect();
        println!(
            "      Unplanned (${:.2}): {}",
            summary.unplanned_total,
            names.join(", ")
        );
    }
    if !summary.missed_planned_items.is_empty() {
        println!("      Missed: {}", summary.missed_planned_items.join(", "));
    }
}
