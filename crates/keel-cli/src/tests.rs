//! CLI command tests
//!
//! This module contains all tests for the CLI commands.

use chrono::{Datelike, Utc};
use keel_core::db::Database;
use keel_core::models::{NewTransaction, PaymentMethod, TransactionKind};

use crate::commands::{self, truncate};

fn setup_test_db() -> Database {
    Database::in_memory().unwrap()
}

/// Seed a couple of months of history relative to today
fn seed_history(db: &Database) {
    let today = Utc::now().date_naive();
    for back in 1..4u32 {
        let date = shift_months(today, -(back as i32));
        db.insert_transaction(&NewTransaction {
            user_id: 1,
            kind: TransactionKind::Income,
            amount: 3000.0,
            category: None,
            payment_method: PaymentMethod::Unspecified,
            occurred_on: date,
            installment_count: 1,
            import_hash: None,
        })
        .unwrap();
        db.insert_transaction(&NewTransaction {
            user_id: 1,
            kind: TransactionKind::Expense,
            amount: 1500.0,
            category: Some("Groceries".to_string()),
            payment_method: PaymentMethod::Debit,
            occurred_on: date,
            installment_count: 1,
            import_hash: None,
        })
        .unwrap();
    }
}

/// Shift a date by whole months, clamping to the 1st for simplicity
fn shift_months(date: chrono::NaiveDate, months: i32) -> chrono::NaiveDate {
    let total = date.year() * 12 + date.month0() as i32 + months;
    chrono::NaiveDate::from_ymd_opt(total.div_euclid(12), total.rem_euclid(12) as u32 + 1, 1)
        .unwrap()
}

#[test]
fn test_cli_parses() {
    use clap::CommandFactory;
    crate::cli::Cli::command().debug_assert();
}

#[test]
fn test_cmd_init_creates_database() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("keel.db");

    assert!(commands::cmd_init(&path).is_ok());
    assert!(path.exists());
}

#[test]
fn test_truncate() {
    assert_eq!(truncate("short", 10), "short");
    assert_eq!(truncate("a very long description", 10), "a very ...");
}

#[test]
fn test_cmd_add_and_list() {
    let db = setup_test_db();

    let result = commands::cmd_add(
        &db,
        1,
        TransactionKind::Expense,
        25.0,
        Some("2026-03-10"),
        Some("Dining"),
        "debit",
        1,
    );
    assert!(result.is_ok());

    let transactions = db.recent_transactions(1, 10).unwrap();
    assert_eq!(transactions.len(), 1);
    assert_eq!(transactions[0].amount, 25.0);

    assert!(commands::cmd_transactions_list(&db, 1, 10).is_ok());
}

#[test]
fn test_cmd_add_rejects_bad_method() {
    let db = setup_test_db();
    let result = commands::cmd_add(
        &db,
        1,
        TransactionKind::Expense,
        25.0,
        None,
        None,
        "bitcoin",
        1,
    );
    assert!(result.is_err());
}

#[test]
fn test_cmd_profile_and_score() {
    let db = setup_test_db();
    seed_history(&db);

    assert!(commands::cmd_profile(&db, 1).is_ok());
    assert!(commands::cmd_score(&db, 1).is_ok());

    // Snapshots were persisted along the way
    assert!(db.get_profile(1).unwrap().is_some());
    assert!(db.get_health_score(1).unwrap().is_some());
}

#[test]
fn test_cmd_check_leaves_audit_trail() {
    let db = setup_test_db();
    seed_history(&db);

    assert!(commands::cmd_check(&db, 1, 50.0, Some("coffee"), None).is_ok());

    let audit = db.list_audit(1, 10).unwrap();
    assert_eq!(audit.len(), 1);
    assert_eq!(audit[0].amount, 50.0);
}

#[test]
fn test_cmd_simulate_persists_history() {
    let db = setup_test_db();
    seed_history(&db);

    assert!(commands::cmd_simulate(&db, 1, 1200.0, "tv", "credit", 12, None).is_ok());
    assert!(commands::cmd_simulations(&db, 1).is_ok());

    assert_eq!(db.list_simulations(1).unwrap().len(), 1);
}

#[test]
fn test_cmd_goals_and_limits() {
    let db = setup_test_db();

    assert!(commands::cmd_goals_add(
        &db,
        1,
        "Emergency fund",
        "accumulate_amount",
        5000.0,
        0.0,
        0.0,
        Some("2027-06-01"),
    )
    .is_ok());
    assert!(commands::cmd_goals_list(&db, 1).is_ok());
    assert_eq!(db.list_goals(1, None).unwrap().len(), 1);

    assert!(commands::cmd_limits_set(&db, 1, "Dining", 400.0).is_ok());
    assert!(commands::cmd_limits_list(&db, 1).is_ok());
    assert!(commands::cmd_limits_set(&db, 1, "Dining", -5.0).is_err());
}

#[test]
fn test_cmd_set_income() {
    let db = setup_test_db();

    assert!(commands::cmd_set_income(&db, 1, 4200.0).is_ok());
    assert_eq!(db.user_settings(1).unwrap().declared_monthly_income, 4200.0);
    assert!(commands::cmd_set_income(&db, 1, -1.0).is_err());
}
