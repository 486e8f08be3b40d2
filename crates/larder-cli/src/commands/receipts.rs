//! Receipt import and inspection commands

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use larder_core::db::{Database, ReceiptInsertResult};
use larder_core::import::{load_receipt_file, parse_date, ReceiptFormat};
use larder_core::models::Receipt;
use larder_core::Config;
use tracing::info;

use super::{money, truncate};

/// Values given on the command line that replace what the parser found
#[derive(Debug, Default)]
pub struct ReceiptOverrides {
    pub store: Option<String>,
    pub date: Option<String>,
    pub total: Option<f64>,
}

/// Import a receipt file
pub fn cmd_receipts_import(
    db: &Database,
    config: &Config,
    file: &Path,
    format: Option<&str>,
    overrides: ReceiptOverrides,
) -> Result<()> {
    let format: Option<ReceiptFormat> = format
        .map(|f| f.parse().map_err(|e: String| anyhow!(e)))
        .transpose()?;

    println!("📥 Importing receipt from {}...", file.display());

    let mut parsed = load_receipt_file(file, format)
        .with_context(|| format!("Failed to read receipt {}", file.display()))?;

    if let Some(store) = overrides.store {
        parsed.store_name = Some(store);
    }
    if let Some(date) = overrides.date {
        parsed.purchased_on = Some(parse_date(&date)?);
    }
    if let Some(total) = overrides.total {
        parsed.printed_total = Some(total);
    }

    let receipt = match db.create_receipt(parsed)? {
        ReceiptInsertResult::Created(receipt) => {
            info!(id = %receipt.id, items = receipt.items.len(), "Imported receipt");
            println!("✅ Imported receipt {}", receipt.id);
            receipt
        }
        ReceiptInsertResult::Duplicate(receipt) => {
            println!("⏭️  Already imported as {}", receipt.id);
            return Ok(());
        }
    };

    print_receipt_summary(&receipt);
    print_review_flags(&receipt, config.review_confidence);

    println!();
    println!("Next: larder reconcile {} LIST_ID", receipt.id);
    Ok(())
}

pub fn cmd_receipts_list(db: &Database) -> Result<()> {
    let receipts = db.list_receipts()?;
    if receipts.is_empty() {
        println!("No receipts imported yet");
        return Ok(());
    }

    println!("\n🧾 Receipts ({})", receipts.len());
    println!("{}", "─".repeat(70));

    for receipt in &receipts {
        let store = receipt.store_name.as_deref().unwrap_or("Unknown");
        let date = receipt
            .purchased_on
            .map(|d| d.to_string())
            .unwrap_or_else(|| "Unknown".to_string());

        println!(
            "  {:<14} {} - ${:.2} ({}, {} items)",
            truncate(&receipt.id, 14),
            store,
            receipt.total(),
            date,
            receipt.items.len()
        );
        if let Some(list_id) = &receipt.list_id {
            println!("         🔗 Linked to list {}", list_id);
        }
    }

    println!();
    Ok(())
}

pub fn cmd_receipts_show(db: &Database, config: &Config, receipt_id: &str) -> Result<()> {
    let receipt = db
        .find_receipt(receipt_id)?
        .ok_or_else(|| anyhow!("Receipt {} not found", receipt_id))?;

    println!("\n🧾 Receipt {}", receipt.id);
    println!("{}", "─".repeat(70));
    print_receipt_summary(&receipt);
    if let Some(list_id) = &receipt.list_id {
        println!("   List: {}", list_id);
    }
    println!();

    for item in &receipt.items {
        let flag = if item.needs_review(config.review_confidence) {
            " ⚠️"
        } else {
            ""
        };
        println!(
            "   {:<30} {:>6} x {:>8} = {:>8}{}",
            truncate(&item.name, 30),
            item.quantity,
            money(Some(item.unit_price)),
            money(Some(item.total_price)),
            flag
        );
    }

    println!();
    Ok(())
}

fn print_receipt_summary(receipt: &Receipt) {
    if let Some(store) = &receipt.store_name {
        println!("   Store: {}", store);
    }
    if let Some(date) = receipt.purchased_on {
        println!("   Date: {}", date);
    }
    println!("   Items: {}", receipt.items.len());
    match receipt.printed_total {
        Some(t) => println!("   Total: ${:.2}", t),
        None => println!("   Total: ${:.2} (sum of lines)", receipt.total()),
    }
}

/// Lines whose OCR confidence is below the review threshold
pub(crate) fn print_review_flags(receipt: &Receipt, threshold: u8) {
    let flagged: Vec<_> = receipt
        .items
        .iter()
        .filter(|i| i.needs_review(threshold))
        .collect();
    if flagged.is_empty() {
        return;
    }

    println!();
    println!("   ⚠️  {} line(s) read with low confidence:", flagged.len());
    for item in flagged {
        println!(
            "      • {} ({}%)",
            item.name,
            item.confidence.unwrap_or_default()
        );
    }
}
