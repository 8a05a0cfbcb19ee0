//! Health Score Engine
//!
//! Converts the financial profile plus auxiliary signals (credit usage,
//! negative months, expense trend) into a weighted 0-100 score with
//! explainable factors. Snapshots are cached for up to 24 hours and written
//! back to the score store for reuse by the decision engine.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use tracing::debug;

use crate::config::EngineConfig;
use crate::dates::month_start;
use crate::db::Database;
use crate::error::Result;
use crate::models::{
    round_cents, FinancialProfile, HealthScoreSnapshot, ScoreClassification, ScoreFactor,
};
use crate::profile::ProfileCalculator;

/// How long a snapshot stays served from cache
const CACHE_MAX_AGE_HOURS: i64 = 24;

/// Inverse ramp: 1 at or below `good`, 0 at or above `bad`, linear between
fn ramp(ratio: f64, good: f64, bad: f64) -> f64 {
    if ratio <= good {
        1.0
    } else if ratio >= bad {
        0.0
    } else {
        1.0 - (ratio - good) / (bad - good)
    }
}

/// Discrete lookup for the count of negative months in the 6-month window
fn negative_months_fraction(count: i64) -> f64 {
    match count {
        0 => 1.0,
        1 => 0.7,
        2 => 0.4,
        n => (0.4 - 0.15 * (n - 2) as f64).max(0.0),
    }
}

/// Discrete bands on the 3-month expense growth rate
fn trend_fraction(growth: f64) -> f64 {
    if growth <= -0.10 {
        1.0
    } else if growth <= 0.0 {
        0.8
    } else if growth <= 0.10 {
        0.5
    } else if growth <= 0.25 {
        0.25
    } else {
        0.0
    }
}

/// Discrete bands on the free-margin ratio (income - expense) / income
fn free_margin_fraction(ratio: f64) -> f64 {
    if ratio >= 0.30 {
        1.0
    } else if ratio >= 0.15 {
        0.75
    } else if ratio >= 0.05 {
        0.5
    } else if ratio > 0.0 {
        0.25
    } else {
        0.0
    }
}

/// Computes and caches health score snapshots
pub struct HealthScoreEngine {
    config: EngineConfig,
    profiles: ProfileCalculator,
}

impl HealthScoreEngine {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        let profiles = ProfileCalculator::with_config(config.clone());
        Self { config, profiles }
    }

    /// Current snapshot, recomputing when the cache is older than 24h
    pub fn current(&self, db: &Database, user_id: i64) -> Result<HealthScoreSnapshot> {
        self.current_as_of(db, user_id, Utc::now().date_naive(), Utc::now())
    }

    /// Current score as a bare number (cached)
    pub fn current_score(&self, db: &Database, user_id: i64) -> Result<f64> {
        Ok(self.current(db, user_id)?.score)
    }

    pub(crate) fn current_as_of(
        &self,
        db: &Database,
        user_id: i64,
        today: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<HealthScoreSnapshot> {
        if let Some(snapshot) = db.get_health_score(user_id)? {
            if now - snapshot.updated_at < Duration::hours(CACHE_MAX_AGE_HOURS) {
                return Ok(snapshot);
            }
        }
        self.compute_as_of(db, user_id, today)
    }

    /// Recompute the six factors and persist a fresh snapshot
    pub fn compute(&self, db: &Database, user_id: i64) -> Result<HealthScoreSnapshot> {
        self.compute_as_of(db, user_id, Utc::now().date_naive())
    }

    /// As `compute`, with an explicit "today" for deterministic runs
    pub fn compute_as_of(
        &self,
        db: &Database,
        user_id: i64,
        today: NaiveDate,
    ) -> Result<HealthScoreSnapshot> {
        let profile = self.profiles.get_or_compute_as_of(db, user_id, today)?;
        let factors = self.factors(db, &profile, today)?;

        let score = factors
            .iter()
            .map(|f| f.points())
            .sum::<f64>()
            .clamp(0.0, 100.0);
        let score = round_cents(score);

        let snapshot = HealthScoreSnapshot {
            user_id,
            score,
            classification: ScoreClassification::from_score(score),
            factors,
            updated_at: Utc::now(),
        };

        db.upsert_health_score(&snapshot)?;
        debug!(
            user_id,
            score,
            classification = %snapshot.classification,
            "Health score recomputed"
        );

        Ok(snapshot)
    }

    fn factors(
        &self,
        db: &Database,
        profile: &FinancialProfile,
        today: NaiveDate,
    ) -> Result<Vec<ScoreFactor>> {
        let income = profile.avg_monthly_income;
        let expense = profile.avg_monthly_expense;

        // Ratio factors stay neutral until the profile has income to
        // measure against (insufficient data is not a penalty).
        let has_income = income > 0.0;

        let income_commitment = if has_income {
            ramp(expense / income, 0.5, 0.9)
        } else {
            0.5
        };

        let volatility = if has_income {
            ramp(profile.expense_volatility / income, 0.1, 0.5)
        } else {
            0.5
        };

        let credit_usage = if has_income {
            let exposure = income * self.config.credit_income_multiplier;
            ramp(profile.open_installment_total / exposure, 0.2, 0.6)
        } else {
            0.5
        };

        let window = db.monthly_analysis_before(profile.user_id, month_start(today), 6)?;
        let negative = window
            .iter()
            .filter(|m| m.income - m.expense < 0.0)
            .count() as i64;
        let negative_months = negative_months_fraction(negative);

        let free_margin = if has_income {
            free_margin_fraction((income - expense) / income)
        } else {
            0.5
        };

        let trend_window = db.monthly_analysis_before(profile.user_id, month_start(today), 3)?;
        let growth = expense_growth(&trend_window);
        let trend = trend_fraction(growth);

        Ok(vec![
            ScoreFactor::new("income_commitment", 25.0, income_commitment),
            ScoreFactor::new("expense_volatility", 15.0, volatility),
            ScoreFactor::new("credit_usage", 15.0, credit_usage),
            ScoreFactor::new("negative_months", 15.0, negative_months),
            ScoreFactor::new("free_margin", 15.0, free_margin),
            ScoreFactor::new("expense_trend", 15.0, trend),
        ])
    }
}

/// Endpoint growth rate over a newest-first window of monthly rows
///
/// Compares the newest and oldest entries; the months in between do not
/// enter the slope. Returns 0 with fewer than two usable months.
pub(crate) fn expense_growth(window_newest_first: &[crate::models::MonthlyAnalysis]) -> f64 {
    if window_newest_first.len() < 2 {
        return 0.0;
    }
    let newest = window_newest_first.first().map(|m| m.expense).unwrap_or(0.0);
    let oldest = window_newest_first.last().map(|m| m.expense).unwrap_or(0.0);
    if oldest <= 0.0 {
        return 0.0;
    }
    (newest - oldest) / oldest
}

impl Default for HealthScoreEngine {
    fn default() -> Self {
        Self::new()
    }
}
