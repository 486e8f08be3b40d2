//! Larder CLI - Pantry tracking with receipt reconciliation
//!
//! Usage:
//!   larder init                          Initialize database
//!   larder receipts import --file r.json Import a parsed receipt
//!   larder reconcile RECEIPT [LIST]      Preview a trip
//!   larder trip RECEIPT LIST             Complete a trip and restock the pantry

mod cli;
mod commands;


use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    match cli.command {
        Commands::Init => commands::cmd_init(&cli.db, cli.no_encrypt),
        Commands::Status => commands::cmd_status(&cli.db, cli.config.as_deref(), cli.no_encrypt),
        Commands::Pantry { action } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            match action {
                None => commands::cmd_pantry_list(&db, None),
                Some(PantryAction::List { level }) => {
                    commands::cmd_pantry_list(&db, level.as_deref())
                }
                Some(PantryAction::Add {
                    name,
                    category,
                    level,
                    price,
                }) => commands::cmd_pantry_add(&db, &name, category.as_deref(), &level, price),
                Some(PantryAction::Set { id, level }) => commands::cmd_pantry_set(&db, &id, &level),
                Some(PantryAction::Remove { id }) => commands::cmd_pantry_remove(&db, &id),
            }
        }
        Commands::Lists { action } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            match action {
                None => commands::cmd_lists_list(&db, None),
                Some(ListsAction::List { status }) => {
                    commands::cmd_lists_list(&db, status.as_deref())
                }
                Some(ListsAction::Create { name, budget }) => {
                    commands::cmd_lists_create(&db, &name, budget)
                }
                Some(ListsAction::Add {
                    list_id,
                    name,
                    quantity,
                    priority,
                    pantry_item,
                }) => commands::cmd_lists_add(
                    &db,
                    &list_id,
                    &name,
                    quantity,
                    &priority,
                    pantry_item.as_deref(),
                ),
                Some(ListsAction::Show { list_id }) => commands::cmd_lists_show(&db, &list_id),
                Some(ListsAction::Status { list_id, status }) => {
                    commands::cmd_lists_status(&db, &list_id, &status)
                }
            }
        }
        Commands::Receipts { action } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            let config = commands::load_config(cli.config.as_deref())?;
            match action {
                None | Some(ReceiptsAction::List) => commands::cmd_receipts_list(&db),
                Some(ReceiptsAction::Import {
                    file,
                    format,
                    store,
                    date,
                    total,
                }) => commands::cmd_receipts_import(
                    &db,
                    &config,
                    &file,
                    format.as_deref(),
                    commands::ReceiptOverrides {
                        store,
                        date,
                        total,
                    },
                ),
                Some(ReceiptsAction::Show { receipt_id }) => {
                    commands::cmd_receipts_show(&db, &config, &receipt_id)
                }
            }
        }
        Commands::Reconcile {
            receipt_id,
            list_id,
            json,
        } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            let config = commands::load_config(cli.config.as_deref())?;
            commands::cmd_reconcile(&db, &config, &receipt_id, list_id.as_deref(), json).await
        }
        Commands::Trip {
            receipt_id,
            list_id,
            accept_fuzzy,
            reject_fuzzy,
            add_new,
            skip_new,
            json,
        } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            let config = commands::load_config(cli.config.as_deref())?;
            let policy = commands::DecisionPolicy::from_flags(
                accept_fuzzy,
                reject_fuzzy,
                add_new,
                skip_new,
            );
            let stdin = std::io::stdin();
            commands::cmd_trip(
                &db,
                &config,
                &receipt_id,
                &list_id,
                policy,
                json,
                &mut stdin.lock(),
            )
            .await
        }
    }
}
