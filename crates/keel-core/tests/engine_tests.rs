//! Integration tests for keel-core
//!
//! These tests exercise the full import → profile → score → decision →
//! simulation workflow through the public API.

use chrono::NaiveDate;

use keel_core::{
    db::Database,
    import::import_ledger,
    models::{
        GoalKind, NewGoal, NewTransaction, PaymentMethod, RiskLevel, TransactionKind, Verdict,
    },
    DecisionEngine, GoalImpactCalculator, HealthScoreEngine, ProfileCalculator, Simulator,
};

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

/// Ledger CSV with four elapsed months of salary and spending
/// (income 3000 flat, expenses 1000/1100/1050/1200), as seen in June 2026.
fn sample_ledger_csv() -> &'static str {
    "\
date,kind,amount,category,payment_method,installments
2026-02-01,income,3000.00,,,
2026-02-10,expense,600.00,Rent,debit,
2026-02-15,expense,400.00,Groceries,debit,
2026-03-01,income,3000.00,,,
2026-03-10,expense,600.00,Rent,debit,
2026-03-15,expense,500.00,Groceries,debit,
2026-04-01,income,3000.00,,,
2026-04-10,expense,600.00,Rent,debit,
2026-04-15,expense,450.00,Groceries,debit,
2026-05-01,income,3000.00,,,
2026-05-10,expense,600.00,Rent,debit,
2026-05-15,expense,600.00,Groceries,debit,
"
}

const TODAY: (i32, u32, u32) = (2026, 6, 15);

fn today() -> NaiveDate {
    d(TODAY.0, TODAY.1, TODAY.2)
}

#[test]
fn test_open_on_disk_database() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("keel.db");

    let db = Database::open(path.to_str().unwrap()).unwrap();
    import_ledger(&db, 1, sample_ledger_csv().as_bytes()).unwrap();
    drop(db);

    // Reopening sees the same ledger; migrations are idempotent
    let reopened = Database::open(path.to_str().unwrap()).unwrap();
    let again = import_ledger(&reopened, 1, sample_ledger_csv().as_bytes()).unwrap();
    assert_eq!(again.imported, 0);
    assert_eq!(again.skipped, 12);
}

#[test]
fn test_import_to_profile_workflow() {
    let db = Database::in_memory().unwrap();

    let stats = import_ledger(&db, 1, sample_ledger_csv().as_bytes()).unwrap();
    assert_eq!(stats.imported, 12);
    assert_eq!(stats.skipped, 0);

    // Re-import skips everything
    let again = import_ledger(&db, 1, sample_ledger_csv().as_bytes()).unwrap();
    assert_eq!(again.imported, 0);
    assert_eq!(again.skipped, 12);

    let calc = ProfileCalculator::new();
    let profile = calc.get_or_compute_as_of(&db, 1, today()).unwrap();

    assert_eq!(profile.avg_monthly_income, 3000.0);
    // EWMA over [1000, 1100, 1050, 1200] leans toward the recent months
    assert!(profile.avg_monthly_expense > 1087.5);
    assert!(profile.avg_monthly_expense < 1200.0);
    // Rent is in the fixed-category allowlist
    assert_eq!(profile.fixed_expense_estimate, 600.0);
    assert!(profile.months_with_data >= 4);
    assert!(!profile.dirty);

    // Recomputing from an unchanged ledger is idempotent
    let recomputed = calc.recompute_as_of(&db, 1, today()).unwrap();
    assert_eq!(profile.avg_monthly_expense, recomputed.avg_monthly_expense);
    assert_eq!(profile.expense_volatility, recomputed.expense_volatility);
}

#[test]
fn test_score_and_quick_decision_workflow() {
    let db = Database::in_memory().unwrap();
    import_ledger(&db, 1, sample_ledger_csv().as_bytes()).unwrap();

    let scores = HealthScoreEngine::new();
    let snapshot = scores.compute_as_of(&db, 1, today()).unwrap();
    assert!(snapshot.score >= 60.0, "score was {}", snapshot.score);
    assert_eq!(snapshot.factors.iter().map(|f| f.weight).sum::<f64>(), 100.0);

    let engine = DecisionEngine::new();

    // A 50 spend against 3000 income is fast-path territory and sails through
    assert!(engine
        .should_use_fast_path_as_of(&db, 1, 50.0, false, today())
        .unwrap());
    let result = engine
        .evaluate_quick_spend_as_of(&db, 1, 50.0, Some("paperback"), None, today())
        .unwrap();
    assert_eq!(result.verdict, Verdict::Proceed);

    // The same evaluation left an audit trail
    let audit = db.list_audit(1, 5).unwrap();
    assert_eq!(audit.len(), 1);
    assert_eq!(audit[0].outcome, "proceed");
}

#[test]
fn test_overdrawn_month_holds() {
    let db = Database::in_memory().unwrap();

    // This month only: 1000 in, 1100 out
    db.insert_transaction(&NewTransaction {
        user_id: 1,
        kind: TransactionKind::Income,
        amount: 1000.0,
        category: None,
        payment_method: PaymentMethod::Unspecified,
        occurred_on: d(2026, 6, 1),
        installment_count: 1,
        import_hash: None,
    })
    .unwrap();
    db.insert_transaction(&NewTransaction {
        user_id: 1,
        kind: TransactionKind::Expense,
        amount: 1100.0,
        category: None,
        payment_method: PaymentMethod::Debit,
        occurred_on: d(2026, 6, 5),
        installment_count: 1,
        import_hash: None,
    })
    .unwrap();

    let engine = DecisionEngine::new();
    let result = engine
        .evaluate_quick_spend_as_of(&db, 1, 10.0, None, None, today())
        .unwrap();

    // Free balance is -100; the mathematical ceiling forces Hold
    assert!(result.free_balance < 0.0);
    assert_eq!(result.verdict, Verdict::Hold);
}

#[test]
fn test_simulation_workflow() {
    let db = Database::in_memory().unwrap();
    import_ledger(&db, 1, sample_ledger_csv().as_bytes()).unwrap();

    let sim = Simulator::new();
    let result = sim
        .simulate_as_of(
            &db,
            1,
            &keel_core::models::SimulationRequest {
                description: "washing machine".to_string(),
                amount: 1200.0,
                payment_method: PaymentMethod::Credit,
                installment_count: 12,
                card_id: None,
                planned_date: None,
            },
            today(),
        )
        .unwrap();

    assert_eq!(result.months.len(), 12);
    // Installments spread from the month after purchase, 100 each
    assert_eq!(result.months[0].purchase_impact, 0.0);
    assert_eq!(result.months[1].purchase_impact, 100.0);
    assert_eq!(result.months[11].purchase_impact, 100.0);
    assert_ne!(result.risk, RiskLevel::High);

    // History returns the persisted run
    let history = sim.history(&db, 1).unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].description, "washing machine");
    assert_eq!(history[0].months.len(), 12);
}

#[test]
fn test_goal_impact_workflow() {
    let db = Database::in_memory().unwrap();

    // Flat months leaving a free margin of exactly 50
    for month in 4..6u32 {
        db.insert_transaction(&NewTransaction {
            user_id: 1,
            kind: TransactionKind::Income,
            amount: 3000.0,
            category: None,
            payment_method: PaymentMethod::Unspecified,
            occurred_on: d(2026, month, 1),
            installment_count: 1,
            import_hash: None,
        })
        .unwrap();
        db.insert_transaction(&NewTransaction {
            user_id: 1,
            kind: TransactionKind::Expense,
            amount: 2950.0,
            category: None,
            payment_method: PaymentMethod::Debit,
            occurred_on: d(2026, month, 10),
            installment_count: 1,
            import_hash: None,
        })
        .unwrap();
    }

    db.insert_goal(&NewGoal {
        user_id: 1,
        name: "Vacation".to_string(),
        kind: GoalKind::AccumulateAmount,
        target_amount: 1200.0,
        current_amount: 0.0,
        monthly_reserve: 0.0,
        deadline: Some(d(2027, 6, 15)),
    })
    .unwrap();

    let calc = GoalImpactCalculator::new();
    let impacts = calc.compute_as_of(&db, 1, 100.0, today()).unwrap();

    assert_eq!(impacts.len(), 1);
    // required 100/month, capacity min(100, margin 50) = 50 → 2 months late
    assert_eq!(impacts[0].delay_months, 2);
}

#[test]
fn test_ledger_change_invalidates_derived_profile() {
    let db = Database::in_memory().unwrap();
    import_ledger(&db, 1, sample_ledger_csv().as_bytes()).unwrap();

    let calc = ProfileCalculator::new();
    let before = calc.get_or_compute_as_of(&db, 1, today()).unwrap();

    // A new elapsed-month expense dirties the profile and shifts the average
    db.insert_transaction(&NewTransaction {
        user_id: 1,
        kind: TransactionKind::Expense,
        amount: 2000.0,
        category: None,
        payment_method: PaymentMethod::Debit,
        occurred_on: d(2026, 5, 20),
        installment_count: 1,
        import_hash: None,
    })
    .unwrap();

    assert!(db.get_profile(1).unwrap().unwrap().dirty);
    let after = calc.get_or_compute_as_of(&db, 1, today()).unwrap();
    assert!(after.avg_monthly_expense > before.avg_monthly_expense);
}
