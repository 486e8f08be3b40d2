//! Trip completion command
//!
//! Links the receipt, completes the list and restocks exact matches, then
//! walks the decision queue. Each decision is settled by a flag when one was
//! given, otherwise by a y/N prompt.

use std::io::{self, BufRead, Write};

use anyhow::{anyhow, Context, Result};
use larder_core::db::Database;
use larder_core::{
    Decision, DecisionKind, DecisionOutcome, DecisionPayload, Resolution, RestockEngine,
    TripCompletion, TripReport,
};
use larder_core::Config;
use tracing::warn;

use super::money;
use super::reconcile::{print_restock_result, print_summary};

/// Standing answers for each kind of decision; `None` means ask
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecisionPolicy {
    pub fuzzy: Option<bool>,
    pub new: Option<bool>,
}

impl DecisionPolicy {
    pub fn from_flags(accept_fuzzy: bool, reject_fuzzy: bool, add_new: bool, skip_new: bool) -> Self {
        let pick = |yes: bool, no: bool| match (yes, no) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        };
        Self {
            fuzzy: pick(accept_fuzzy, reject_fuzzy),
            new: pick(add_new, skip_new),
        }
    }

    fn answer(&self, kind: DecisionKind) -> Option<bool> {
        match kind {
            DecisionKind::Fuzzy => self.fuzzy,
            DecisionKind::New => self.new,
        }
    }

    fn is_complete(&self) -> bool {
        self.fuzzy.is_some() && self.new.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Answer {
    Yes,
    No,
    Quit,
}

pub async fn cmd_trip<R: BufRead>(
    db: &Database,
    config: &Config,
    receipt_id: &str,
    list_id: &str,
    policy: DecisionPolicy,
    json: bool,
    input: &mut R,
) -> Result<()> {
    if json && !policy.is_complete() {
        return Err(anyhow!(
            "--json cannot prompt; pass --accept-fuzzy/--reject-fuzzy and --add-new/--skip-new"
        ));
    }

    let receipt = db
        .find_receipt(receipt_id)?
        .ok_or_else(|| anyhow!("Receipt {} not found", receipt_id))?;

    if !json {
        println!("🛒 Completing trip: receipt {} → list {}...", receipt_id, list_id);
    }

    let mut trip = TripCompletion::new(db)
        .with_engine(RestockEngine::new(config.matching.clone()))
        .with_config(config.trip.clone());
    let outcome = trip
        .start(receipt_id, list_id)
        .await
        .context("Trip could not be completed")?;

    if !json {
        println!("   ✓ Receipt linked and list completed");
        if let Some(result) = &outcome.restock_result {
            let pantry = db.list_pantry_items(None)?;
            print_restock_result(result, &receipt, &pantry);
        }
        for failure in &outcome.restock_failures {
            println!("   ❌ {}: {} ({})", failure.item, failure.message, failure.operation);
        }
        if let Some(summary) = &outcome.summary {
            print_summary(summary);
        }
        if outcome.pending_decisions > 0 {
            println!();
            println!("   {} item(s) need a decision:", outcome.pending_decisions);
        }
    }

    let mut quit = false;
    while let Some(entry) = trip.next_decision() {
        let decision = entry.decision().clone();
        let accept = match policy.answer(decision.kind()) {
            Some(answer) => answer,
            None => match prompt(&decision, config.review_confidence, input)? {
                Answer::Yes => true,
                Answer::No => false,
                Answer::Quit => {
                    quit = true;
                    break;
                }
            },
        };

        match entry.resolve(accept).await {
            Ok(outcome) if !json => print_outcome(&outcome),
            Ok(_) => {}
            Err(e) => {
                warn!(decision = %decision.id, "Decision failed: {}", e);
                if !json {
                    println!("      ❌ {}", e);
                }
            }
        }
    }

    if quit {
        let discarded = trip.abandon();
        if !json {
            println!("   ⏭️  Left {} decision(s) unresolved", discarded);
        }
    }

    let report = trip.report();
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

fn describe(decision: &Decision) -> String {
    let line = &decision.receipt_item;
    match &decision.payload {
        DecisionPayload::Fuzzy(m) => format!(
            "\"{}\" ({}) looks like \"{}\" ({}% similar). Restock it?",
            line.name,
            money(Some(line.total_price)),
            m.pantry_item_name,
            m.similarity
        ),
        DecisionPayload::New(item) => format!(
            "\"{}\" ({}) is not in the pantry. Add it{}?",
            line.name,
            money(Some(line.total_price)),
            item.category
                .as_deref()
                .map(|c| format!(" under {}", c))
                .unwrap_or_default()
        ),
    }
}

/// Ask about one decision. End of input counts as no.
fn prompt<R: BufRead>(decision: &Decision, review_confidence: u8, input: &mut R) -> Result<Answer> {
    let icon = match decision.kind() {
        DecisionKind::Fuzzy => "🤔",
        DecisionKind::New => "🆕",
    };
    if decision.receipt_item.needs_review(review_confidence) {
        println!("   ⚠️  Low-confidence line, check the receipt");
    }
    print!("   {} {} [y/N/q] ", icon, describe(decision));
    io::stdout().flush()?;

    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        println!();
        return Ok(Answer::No);
    }
    Ok(match line.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" => Answer::Yes,
        "q" | "quit" => Answer::Quit,
        _ => Answer::No,
    })
}

fn print_outcome(outcome: &DecisionOutcome) {
    match outcome {
        DecisionOutcome::Restocked { pantry_item_id } => {
            println!("      ✓ Restocked {}", pantry_item_id)
        }
        DecisionOutcome::Added { pantry_item } => {
            println!("      ✓ Added {} ({})", pantry_item.name, pantry_item.id)
        }
        DecisionOutcome::Declined { follow_up: Some(_) } => {
            println!("      ↪ Not the same item; asking about it as new")
        }
        DecisionOutcome::Declined { follow_up: None } => println!("      – Skipped"),
    }
}

fn print_report(report: &TripReport) {
    let count = |f: fn(&Resolution) -> bool| {
        report
            .decisions
            .iter()
            .filter(|d| f(&d.resolution))
            .count()
    };
    let applied = count(|r| matches!(r, Resolution::Applied));
    let declined = count(|r| matches!(r, Resolution::Declined));
    let failed = count(|r| matches!(r, Resolution::Failed(_)));
    let discarded = count(|r| matches!(r, Resolution::Discarded));

    println!();
    println!("✅ Trip {}", report.state);
    if let Some(at) = report.completed_at {
        println!("   Completed: {}", at.format("%Y-%m-%d %H:%M"));
    }
    if let Some(restock) = &report.restock_report {
        println!("   Restocked: {}", restock.applied.len());
    }
    if !report.decisions.is_empty() {
        println!(
            "   Decisions: {} applied, {} declined, {} failed, {} left",
            applied, declined, failed, discarded
        );
    }
    if !report.failures.is_empty() {
        println!("   ⚠️  {} failure(s); re-run the decisions by hand if needed", report.failures.len());
    }
}
