//! Profile Calculator
//!
//! Aggregates a user's full transaction history into a smoothed
//! `FinancialProfile`: exponentially weighted income/expense averages,
//! fixed/variable expense estimates, expense volatility, open installment
//! totals and a history-driven confidence tier. The profile is cached and
//! recomputed lazily whenever the ledger marks it dirty.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate, Utc};
use tracing::debug;

use crate::config::EngineConfig;
use crate::dates::{add_months, days_in_month, month_start};
use crate::db::Database;
use crate::error::Result;
use crate::models::{
    round_cents, Confidence, FinancialProfile, MonthlyAnalysis, TransactionKind,
};

/// Exponentially weighted average, biased toward recent samples
///
/// `values` is ordered oldest to newest. The i-th sample counted back from
/// the newest gets weight `alpha * (1 - alpha)^i`; the result is the
/// weight-normalized sum. A single-sample series returns that sample.
pub fn ewma(values: &[f64], alpha: f64) -> f64 {
    match values {
        [] => 0.0,
        [only] => *only,
        _ => {
            let mut weighted = 0.0;
            let mut total_weight = 0.0;
            for (distance, value) in values.iter().rev().enumerate() {
                let weight = alpha * (1.0 - alpha).powi(distance as i32);
                weighted += value * weight;
                total_weight += weight;
            }
            weighted / total_weight
        }
    }
}

/// Population standard deviation; 0 for fewer than two samples
pub fn population_std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let variance =
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// Per-month aggregation accumulated while walking the ledger
#[derive(Debug, Default, Clone)]
struct MonthTotals {
    income: f64,
    expense: f64,
    fixed_expense: f64,
    variable_expense: f64,
    financed_expense: f64,
}

impl MonthTotals {
    fn has_activity(&self) -> bool {
        self.income > 0.0 || self.expense > 0.0
    }

    fn cash_expense(&self) -> f64 {
        self.expense - self.financed_expense
    }
}

/// Computes and caches financial profiles
pub struct ProfileCalculator {
    config: EngineConfig,
}

impl ProfileCalculator {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Self { config }
    }

    /// Return the cached profile, recomputing it first when dirty or missing
    pub fn get_or_compute(&self, db: &Database, user_id: i64) -> Result<FinancialProfile> {
        self.get_or_compute_as_of(db, user_id, Utc::now().date_naive())
    }

    /// As `get_or_compute`, with an explicit "today" for deterministic runs
    pub fn get_or_compute_as_of(
        &self,
        db: &Database,
        user_id: i64,
        today: NaiveDate,
    ) -> Result<FinancialProfile> {
        if let Some(profile) = db.get_profile(user_id)? {
            if !profile.dirty {
                return Ok(profile);
            }
        }
        self.recompute_as_of(db, user_id, today)
    }

    /// Recompute the profile from the full ledger and persist it clean
    ///
    /// Idempotent: the result is a pure function of the ledger contents and
    /// `today`, so concurrent recomputations for the same user converge.
    pub fn recompute_as_of(
        &self,
        db: &Database,
        user_id: i64,
        today: NaiveDate,
    ) -> Result<FinancialProfile> {
        let transactions = db.list_transactions(user_id, None, None)?;

        if transactions.is_empty() {
            let profile = FinancialProfile::zero(user_id);
            db.upsert_profile(&profile)?;
            debug!(user_id, "Empty ledger, stored zero profile");
            return Ok(profile);
        }

        let current_month = month_start(today);
        // Transactions are ordered by date, so the first row is the oldest
        let earliest = transactions[0].occurred_on;

        // Group the ledger by calendar month, including empty gap months so
        // inactive stretches are visible downstream.
        let mut months: BTreeMap<NaiveDate, MonthTotals> = BTreeMap::new();
        let mut cursor = month_start(earliest);
        while cursor <= current_month {
            months.insert(cursor, MonthTotals::default());
            cursor = add_months(cursor, 1);
        }

        for tx in &transactions {
            let entry = months.entry(month_start(tx.occurred_on)).or_default();
            match tx.kind {
                TransactionKind::Income => entry.income += tx.amount,
                TransactionKind::Expense => {
                    entry.expense += tx.amount;
                    if tx.installment_count > 1 {
                        entry.financed_expense += tx.amount;
                    }
                    let category = self.config.canonical_category(tx.category.as_deref());
                    if self.config.is_fixed_category(&category) {
                        entry.fixed_expense += tx.amount;
                    } else {
                        entry.variable_expense += tx.amount;
                    }
                }
            }
        }

        // Persist one analysis row per month, the current partial month included
        for (start, totals) in &months {
            db.upsert_monthly_analysis(&MonthlyAnalysis {
                user_id,
                month_start: *start,
                income: round_cents(totals.income),
                expense: round_cents(totals.expense),
                fixed_expense: round_cents(totals.fixed_expense),
                variable_expense: round_cents(totals.variable_expense),
                financed_expense: round_cents(totals.financed_expense),
            })?;
        }

        // Build the smoothing series from fully elapsed months only, dropping
        // months with no activity at all.
        let elapsed: Vec<&MonthTotals> = months
            .iter()
            .filter(|(start, totals)| **start < current_month && totals.has_activity())
            .map(|(_, totals)| totals)
            .collect();

        let alpha = self.config.smoothing_alpha;
        let (avg_income, avg_expense, volatility, fixed_estimate, variable_estimate);

        if elapsed.is_empty() {
            // No usable elapsed month: extrapolate the current partial month.
            // The floor on elapsed days keeps one early large expense from
            // exploding the projection.
            let current = months.get(&current_month).cloned().unwrap_or_default();
            let elapsed_days = (today.day() as i64).max(self.config.partial_month_floor_days);
            let scale = days_in_month(today) as f64 / elapsed_days as f64;

            avg_income = current.income;
            avg_expense = current.cash_expense() * scale;
            volatility = 0.0;
            fixed_estimate = current.fixed_expense;
            variable_estimate = current.variable_expense;
            debug!(
                user_id,
                elapsed_days, "No elapsed months with data, extrapolating partial month"
            );
        } else {
            let income_series: Vec<f64> = elapsed.iter().map(|m| m.income).collect();
            let expense_series: Vec<f64> = elapsed.iter().map(|m| m.cash_expense()).collect();

            avg_income = ewma(&income_series, alpha);
            avg_expense = ewma(&expense_series, alpha);
            volatility = population_std_dev(&expense_series);
            fixed_estimate =
                elapsed.iter().map(|m| m.fixed_expense).sum::<f64>() / elapsed.len() as f64;
            variable_estimate =
                elapsed.iter().map(|m| m.variable_expense).sum::<f64>() / elapsed.len() as f64;
        }

        let (open_total, open_count) = db.open_installments(user_id, today)?;
        let days_of_history = (today - earliest).num_days().max(0);
        let months_with_data = months.values().filter(|m| m.has_activity()).count() as i64;

        let profile = FinancialProfile {
            user_id,
            avg_monthly_income: round_cents(avg_income),
            avg_monthly_expense: round_cents(avg_expense),
            fixed_expense_estimate: round_cents(fixed_estimate),
            variable_expense_estimate: round_cents(variable_estimate),
            open_installment_total: round_cents(open_total),
            open_installment_count: open_count,
            days_of_history,
            months_with_data,
            expense_volatility: round_cents(volatility),
            confidence: Confidence::from_days(days_of_history),
            dirty: false,
            updated_at: Utc::now(),
        };

        db.upsert_profile(&profile)?;
        debug!(
            user_id,
            avg_income = profile.avg_monthly_income,
            avg_expense = profile.avg_monthly_expense,
            confidence = %profile.confidence,
            "Profile recomputed"
        );

        Ok(profile)
    }
}

impl Default for ProfileCalculator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewTransaction, PaymentMethod};

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn add(db: &Database, kind: TransactionKind, amount: f64, date: NaiveDate) {
        add_with(db, kind, amount, date, None, 1);
    }

    fn add_with(
        db: &Database,
        kind: TransactionKind,
        amount: f64,
        date: NaiveDate,
        category: Option<&str>,
        installments: i64,
    ) {
        db.insert_transaction(&NewTransaction {
            user_id: 1,
            kind,
            amount,
            category: category.map(|c| c.to_string()),
            payment_method: if installments > 1 {
                PaymentMethod::Credit
            } else {
                PaymentMethod::Debit
            },
            occurred_on: date,
            installment_count: installments,
            import_hash: None,
        })
        .unwrap();
    }

    #[test]
    fn test_ewma_recency_bias() {
        // Oldest to newest; the recent 200 should pull the average above
        // the plain mean of 133.33
        let series = [100.0, 100.0, 200.0];
        let avg = ewma(&series, 0.3);
        let mean = series.iter().sum::<f64>() / series.len() as f64;
        assert!(avg > mean, "ewma {} should exceed mean {}", avg, mean);
        // alpha=0.3: (0.3*200 + 0.21*100 + 0.147*100) / 0.657
        assert!((avg - 145.662).abs() < 0.01);
    }

    #[test]
    fn test_ewma_single_sample_unchanged() {
        assert_eq!(ewma(&[1234.5], 0.3), 1234.5);
        assert_eq!(ewma(&[], 0.3), 0.0);
    }

    #[test]
    fn test_population_std_dev() {
        assert_eq!(population_std_dev(&[100.0]), 0.0);
        let sd = population_std_dev(&[1000.0, 1100.0, 1050.0, 1200.0]);
        assert!((sd - 73.95).abs() < 0.01);
    }

    #[test]
    fn test_empty_ledger_zero_profile() {
        let db = Database::in_memory().unwrap();
        let calc = ProfileCalculator::new();

        let profile = calc.get_or_compute_as_of(&db, 1, d(2026, 6, 15)).unwrap();
        assert_eq!(profile.avg_monthly_income, 0.0);
        assert_eq!(profile.avg_monthly_expense, 0.0);
        assert_eq!(profile.confidence, Confidence::Low);
        assert!(!profile.dirty);
    }

    #[test]
    fn test_elapsed_months_series_excludes_current() {
        let db = Database::in_memory().unwrap();
        let calc = ProfileCalculator::new();
        let today = d(2026, 6, 15);

        // Four elapsed months of flat income and varying expense
        for (i, expense) in [1000.0, 1100.0, 1050.0, 1200.0].iter().enumerate() {
            let month = d(2026, 2 + i as u32, 5);
            add(&db, TransactionKind::Income, 3000.0, month);
            add(&db, TransactionKind::Expense, *expense, month);
        }
        // Noise in the current month must not bias the averages
        add(&db, TransactionKind::Expense, 9999.0, d(2026, 6, 2));

        let profile = calc.recompute_as_of(&db, 1, today).unwrap();
        assert_eq!(profile.avg_monthly_income, 3000.0);
        // EWMA over [1000, 1100, 1050, 1200]
        assert!((profile.avg_monthly_expense - 1112.12).abs() < 0.01);
        assert!((profile.expense_volatility - 73.95).abs() < 0.01);
        assert_eq!(profile.months_with_data, 5);
        assert_eq!(profile.confidence, Confidence::High);
    }

    #[test]
    fn test_partial_month_fallback_with_floor() {
        let db = Database::in_memory().unwrap();
        let calc = ProfileCalculator::new();

        // Only data point: a 300 expense on June 2nd. Two elapsed days are
        // floored to 7, so the projection is 300 / 7 * 30.
        add(&db, TransactionKind::Expense, 300.0, d(2026, 6, 1));
        let profile = calc.recompute_as_of(&db, 1, d(2026, 6, 2)).unwrap();

        let expected = 300.0 / 7.0 * 30.0;
        assert!((profile.avg_monthly_expense - round_cents(expected)).abs() < 0.01);
        assert_eq!(profile.confidence, Confidence::Low);
    }

    #[test]
    fn test_installment_expense_excluded_from_series() {
        let db = Database::in_memory().unwrap();
        let calc = ProfileCalculator::new();

        add(&db, TransactionKind::Income, 3000.0, d(2026, 4, 5));
        add(&db, TransactionKind::Expense, 800.0, d(2026, 4, 10));
        // Financed purchase: counted in the month's expense row, excluded
        // from the smoothing series
        add_with(&db, TransactionKind::Expense, 1200.0, d(2026, 4, 12), None, 12);

        let profile = calc.recompute_as_of(&db, 1, d(2026, 5, 10)).unwrap();
        assert_eq!(profile.avg_monthly_expense, 800.0);
        assert_eq!(profile.open_installment_count, 12);
        assert!((profile.open_installment_total - 1200.0).abs() < 0.01);

        let rows = db.list_monthly_analysis(1).unwrap();
        let april = rows.iter().find(|r| r.month_start == d(2026, 4, 1)).unwrap();
        assert_eq!(april.expense, 2000.0);
        assert_eq!(april.financed_expense, 1200.0);
    }

    #[test]
    fn test_fixed_variable_split() {
        let db = Database::in_memory().unwrap();
        let calc = ProfileCalculator::new();

        add_with(&db, TransactionKind::Expense, 900.0, d(2026, 4, 1), Some("Rent"), 1);
        add_with(&db, TransactionKind::Expense, 400.0, d(2026, 4, 8), Some("Groceries"), 1);
        add_with(&db, TransactionKind::Expense, 900.0, d(2026, 5, 1), Some("Rent"), 1);
        add_with(&db, TransactionKind::Expense, 200.0, d(2026, 5, 8), Some("Groceries"), 1);

        let profile = calc.recompute_as_of(&db, 1, d(2026, 6, 10)).unwrap();
        assert_eq!(profile.fixed_expense_estimate, 900.0);
        assert_eq!(profile.variable_expense_estimate, 300.0);
    }

    #[test]
    fn test_recompute_is_idempotent() {
        let db = Database::in_memory().unwrap();
        let calc = ProfileCalculator::new();
        let today = d(2026, 6, 15);

        add(&db, TransactionKind::Income, 3000.0, d(2026, 4, 5));
        add(&db, TransactionKind::Expense, 1000.0, d(2026, 4, 10));

        let first = calc.recompute_as_of(&db, 1, today).unwrap();
        let second = calc.recompute_as_of(&db, 1, today).unwrap();

        assert_eq!(first.avg_monthly_income, second.avg_monthly_income);
        assert_eq!(first.avg_monthly_expense, second.avg_monthly_expense);
        assert_eq!(first.expense_volatility, second.expense_volatility);
        assert_eq!(first.days_of_history, second.days_of_history);
        assert_eq!(first.confidence, second.confidence);
    }

    #[test]
    fn test_dirty_flag_drives_recompute() {
        let db = Database::in_memory().unwrap();
        let calc = ProfileCalculator::new();
        let today = d(2026, 6, 15);

        add(&db, TransactionKind::Income, 3000.0, d(2026, 4, 5));
        let first = calc.get_or_compute_as_of(&db, 1, today).unwrap();
        assert_eq!(first.avg_monthly_income, 3000.0);

        // Inserting marks the profile dirty; the next read sees the new month
        add(&db, TransactionKind::Income, 5000.0, d(2026, 5, 5));
        assert!(db.get_profile(1).unwrap().unwrap().dirty);

        let second = calc.get_or_compute_as_of(&db, 1, today).unwrap();
        assert!(second.avg_monthly_income > 3000.0);
        assert!(!second.dirty);

        // Clean profile is served from cache untouched
        let third = calc.get_or_compute_as_of(&db, 1, today).unwrap();
        assert_eq!(second.avg_monthly_income, third.avg_monthly_income);
    }

    #[test]
    fn test_confidence_grows_with_history() {
        let db = Database::in_memory().unwrap();
        let calc = ProfileCalculator::new();

        add(&db, TransactionKind::Income, 3000.0, d(2026, 6, 1));
        let fresh = calc.recompute_as_of(&db, 1, d(2026, 6, 10)).unwrap();
        assert_eq!(fresh.confidence, Confidence::Low);

        let later = calc.recompute_as_of(&db, 1, d(2026, 7, 15)).unwrap();
        assert_eq!(later.confidence, Confidence::Medium);

        let much_later = calc.recompute_as_of(&db, 1, d(2026, 9, 15)).unwrap();
        assert_eq!(much_later.confidence, Confidence::High);
        assert!(much_later.days_of_history > later.days_of_history);
    }
}
