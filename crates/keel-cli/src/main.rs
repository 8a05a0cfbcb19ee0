//! Keel CLI - spend decisions and cash-flow forecasts from your ledger
//!
//! Usage:
//!   keel init                      Initialize database
//!   keel import --file ledger.csv  Import ledger rows
//!   keel check 50                  Ask before spending
//!   keel simulate 1200 -i 12       Project a purchase over 12 months

mod cli;
mod commands;

#[cfg(test)]
mod tests;

use anyhow::Result;
use clap::Parser;
use keel_core::models::TransactionKind;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (warn)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    match cli.command {
        Commands::Init => commands::cmd_init(&cli.db),
        Commands::Status => commands::cmd_status(&cli.db, cli.user),
        Commands::AddIncome {
            amount,
            date,
            category,
        } => {
            let db = commands::open_db(&cli.db)?;
            commands::cmd_add(
                &db,
                cli.user,
                TransactionKind::Income,
                amount,
                date.as_deref(),
                category.as_deref(),
                "unspecified",
                1,
            )
        }
        Commands::AddExpense {
            amount,
            date,
            category,
            method,
            installments,
        } => {
            let db = commands::open_db(&cli.db)?;
            commands::cmd_add(
                &db,
                cli.user,
                TransactionKind::Expense,
                amount,
                date.as_deref(),
                category.as_deref(),
                &method,
                installments,
            )
        }
        Commands::Import { file } => {
            let db = commands::open_db(&cli.db)?;
            commands::cmd_import(&db, cli.user, &file)
        }
        Commands::Transactions { limit } => {
            let db = commands::open_db(&cli.db)?;
            commands::cmd_transactions_list(&db, cli.user, limit)
        }
        Commands::Profile => {
            let db = commands::open_db(&cli.db)?;
            commands::cmd_profile(&db, cli.user)
        }
        Commands::Score => {
            let db = commands::open_db(&cli.db)?;
            commands::cmd_score(&db, cli.user)
        }
        Commands::Check {
            amount,
            description,
            category,
        } => {
            let db = commands::open_db(&cli.db)?;
            commands::cmd_check(
                &db,
                cli.user,
                amount,
                description.as_deref(),
                category.as_deref(),
            )
        }
        Commands::Purchase {
            amount,
            description,
            method,
            installments,
        } => {
            let db = commands::open_db(&cli.db)?;
            commands::cmd_purchase(
                &db,
                cli.user,
                amount,
                &description,
                method.as_deref(),
                installments,
            )
        }
        Commands::Simulate {
            amount,
            description,
            method,
            installments,
            date,
        } => {
            let db = commands::open_db(&cli.db)?;
            commands::cmd_simulate(
                &db,
                cli.user,
                amount,
                &description,
                &method,
                installments,
                date.as_deref(),
            )
        }
        Commands::Simulations => {
            let db = commands::open_db(&cli.db)?;
            commands::cmd_simulations(&db, cli.user)
        }
        Commands::Goals { action } => {
            let db = commands::open_db(&cli.db)?;
            match action {
                None => commands::cmd_goals_list(&db, cli.user),
                Some(GoalsAction::Add {
                    name,
                    kind,
                    target,
                    current,
                    reserve,
                    deadline,
                }) => commands::cmd_goals_add(
                    &db,
                    cli.user,
                    &name,
                    &kind,
                    target,
                    current,
                    reserve,
                    deadline.as_deref(),
                ),
            }
        }
        Commands::Limits { action } => {
            let db = commands::open_db(&cli.db)?;
            match action {
                None => commands::cmd_limits_list(&db, cli.user),
                Some(LimitsAction::Set { category, amount }) => {
                    commands::cmd_limits_set(&db, cli.user, &category, amount)
                }
            }
        }
        Commands::SetIncome { amount } => {
            let db = commands::open_db(&cli.db)?;
            commands::cmd_set_income(&db, cli.user, amount)
        }
        Commands::Audit { limit } => {
            let db = commands::open_db(&cli.db)?;
            commands::cmd_audit(&db, cli.user, limit)
        }
    }
}
