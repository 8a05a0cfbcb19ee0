//! Ledger command implementations: add entries, CSV import, listing

use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result};
use keel_core::db::Database;
use keel_core::import::import_ledger;
use keel_core::models::{NewTransaction, PaymentMethod, TransactionKind};

use super::truncate;

#[allow(clippy::too_many_arguments)]
pub fn cmd_add(
    db: &Database,
    user_id: i64,
    kind: TransactionKind,
    amount: f64,
    date: Option<&str>,
    category: Option<&str>,
    method: &str,
    installments: i64,
) -> Result<()> {
    let occurred_on = super::parse_date_arg(date)?;
    let payment_method: PaymentMethod = method
        .parse()
        .map_err(|e: String| anyhow::anyhow!(e))?;

    if let Some(name) = category {
        db.ensure_category(name)
            .context("Failed to register category")?;
    }

    let id = db
        .insert_transaction(&NewTransaction {
            user_id,
            kind,
            amount,
            category: category.map(|c| c.to_string()),
            payment_method,
            occurred_on,
            installment_count: installments,
            import_hash: None,
        })?
        .context("Entry was treated as a duplicate")?;

    println!(
        "✅ Recorded {} of {:.2} on {} (#{})",
        kind, amount, occurred_on, id
    );
    if installments > 1 {
        println!("   Split into {} monthly installments", installments);
    }

    Ok(())
}

pub fn cmd_import(db: &Database, user_id: i64, file: &Path) -> Result<()> {
    println!("📥 Importing {}...", file.display());

    let reader = File::open(file).context("Failed to open CSV file")?;
    let stats = import_ledger(db, user_id, reader)?;

    println!(
        "✅ Imported {} rows ({} duplicates skipped)",
        stats.imported, stats.skipped
    );

    Ok(())
}

pub fn cmd_transactions_list(db: &Database, user_id: i64, limit: i64) -> Result<()> {
    let transactions = db.recent_transactions(user_id, limit)?;

    if transactions.is_empty() {
        println!("No transactions yet. Add one with: keel add-expense 25 --category Groceries");
        return Ok(());
    }

    println!();
    println!(
        "   {:>5} │ {:10} │ {:7} │ {:>10} │ {:15} │ {}",
        "ID", "Date", "Kind", "Amount", "Category", "Method"
    );
    println!("   ──────┼────────────┼─────────┼────────────┼─────────────────┼────────");
    for tx in &transactions {
        println!(
            "   {:>5} │ {} │ {:7} │ {:>10.2} │ {:15} │ {}{}",
            tx.id,
            tx.occurred_on,
            tx.kind.to_string(),
            tx.amount,
            truncate(tx.category.as_deref().unwrap_or("-"), 15),
            tx.payment_method,
            if tx.installment_count > 1 {
                format!(" ({}x)", tx.installment_count)
            } else {
                String::new()
            }
        );
    }

    Ok(())
}

pub fn cmd_set_income(db: &Database, user_id: i64, amount: f64) -> Result<()> {
    if amount < 0.0 {
        anyhow::bail!("Declared income cannot be negative");
    }
    db.set_declared_income(user_id, amount)?;
    println!("✅ Declared monthly income set to {:.2}", amount);
    Ok(())
}
