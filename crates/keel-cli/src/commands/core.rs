//! Core command implementations and shared utilities
//!
//! This module contains:
//! - `open_db` - Shared utility to open the database
//! - `parse_date_arg` - Shared YYYY-MM-DD argument parsing
//! - `cmd_init` - Initialize the database
//! - `cmd_status` - Show database status

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use keel_core::db::Database;

/// Open (or create) the database at the given path
pub fn open_db(db_path: &Path) -> Result<Database> {
    let path_str = db_path
        .to_str()
        .context("Database path is not valid UTF-8")?;
    Database::open(path_str).context("Failed to open database")
}

/// Parse an optional YYYY-MM-DD argument, defaulting to today
pub fn parse_date_arg(date: Option<&str>) -> Result<NaiveDate> {
    match date {
        Some(raw) => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .context("Invalid date format (use YYYY-MM-DD)"),
        None => Ok(Utc::now().date_naive()),
    }
}

pub fn cmd_init(db_path: &Path) -> Result<()> {
    println!("🔧 Initializing database at {}...", db_path.display());

    open_db(db_path)?;

    println!("✅ Database initialized successfully!");
    println!();
    println!("Next steps:");
    println!("  1. Import your ledger: keel import --file ledger.csv");
    println!("  2. Check your profile: keel profile");
    println!("  3. Ask before spending: keel check 50");

    Ok(())
}

pub fn cmd_status(db_path: &Path, user_id: i64) -> Result<()> {
    let db = open_db(db_path)?;

    let transactions = db.recent_transactions(user_id, i64::MAX)?;
    let goals = db.list_goals(user_id, None)?;
    let simulations = db.list_simulations(user_id)?;
    let profile = db.get_profile(user_id)?;

    println!();
    println!("📊 Keel Status (user {})", user_id);
    println!("   Database:     {}", db.path());
    println!("   Transactions: {}", transactions.len());
    println!("   Goals:        {}", goals.len());
    println!("   Simulations:  {}", simulations.len());
    match profile {
        Some(p) => println!(
            "   Profile:      {} (confidence {}, updated {})",
            if p.dirty { "stale" } else { "fresh" },
            p.confidence,
            p.updated_at.format("%Y-%m-%d %H:%M")
        ),
        None => println!("   Profile:      not computed yet"),
    }

    Ok(())
}
