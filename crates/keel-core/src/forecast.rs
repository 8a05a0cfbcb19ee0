//! Forecast/Simulation Engine
//!
//! Projects 12 months of cash flow with and without a candidate purchase,
//! classifies risk per scenario with confidence- and volatility-scaled
//! thresholds, and enumerates alternative installment counts. Every
//! simulation is persisted for history.

use chrono::{Datelike, NaiveDate, Utc};
use tracing::debug;

use crate::config::EngineConfig;
use crate::dates::{add_months, month_start};
use crate::db::Database;
use crate::error::{Error, Result};
use crate::models::{
    round_cents, Confidence, FinancialProfile, InstallmentScenario, MonthlyProjection,
    PaymentMethod, Recommendation, RiskLevel, Simulation, SimulationRequest,
};
use crate::profile::ProfileCalculator;

/// Months projected by every simulation
const HORIZON_MONTHS: i64 = 12;

pub struct Simulator {
    config: EngineConfig,
    profiles: ProfileCalculator,
}

impl Simulator {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Self {
            profiles: ProfileCalculator::with_config(config.clone()),
            config,
        }
    }

    /// Run and persist a 12-month simulation
    pub fn simulate(
        &self,
        db: &Database,
        user_id: i64,
        request: &SimulationRequest,
    ) -> Result<Simulation> {
        self.simulate_as_of(db, user_id, request, Utc::now().date_naive())
    }

    /// As `simulate`, with an explicit "today" for deterministic runs
    pub fn simulate_as_of(
        &self,
        db: &Database,
        user_id: i64,
        request: &SimulationRequest,
        today: NaiveDate,
    ) -> Result<Simulation> {
        if request.amount <= 0.0 {
            return Err(Error::InvalidData(format!(
                "Simulation amount must be positive, got {}",
                request.amount
            )));
        }
        if request.installment_count < 1 {
            return Err(Error::InvalidData(format!(
                "Installment count must be at least 1, got {}",
                request.installment_count
            )));
        }

        let profile = self.profiles.get_or_compute_as_of(db, user_id, today)?;
        let planned_date = request.planned_date.unwrap_or(today);
        let horizon_start = month_start(today);

        let months = self.project(
            db,
            user_id,
            &profile,
            horizon_start,
            planned_date,
            request.amount,
            request.payment_method,
            request.installment_count,
        )?;

        let min_balance = months
            .iter()
            .map(|m| m.balance_with_purchase)
            .fold(f64::INFINITY, f64::min);
        let min_balance = if min_balance.is_finite() { min_balance } else { 0.0 };

        let risk = self.classify_risk(min_balance, &profile);
        let recommendation = recommend(risk, request.amount, request.installment_count, &profile);

        // Alternative splits only make sense for multi-installment credit
        let mut alternatives = Vec::new();
        let mut suggested_installments = None;
        if request.payment_method == PaymentMethod::Credit && request.installment_count > 1 {
            for &count in &self.config.installment_options {
                let scenario_months = self.project(
                    db,
                    user_id,
                    &profile,
                    horizon_start,
                    planned_date,
                    request.amount,
                    request.payment_method,
                    count,
                )?;
                let scenario_min = scenario_months
                    .iter()
                    .map(|m| m.balance_with_purchase)
                    .fold(f64::INFINITY, f64::min);
                let scenario_min = if scenario_min.is_finite() { scenario_min } else { 0.0 };

                alternatives.push(InstallmentScenario {
                    installments: count,
                    monthly_amount: round_cents(request.amount / count as f64),
                    min_balance: round_cents(scenario_min),
                    risk: self.classify_risk(scenario_min, &profile),
                });
            }

            suggested_installments = alternatives
                .iter()
                .max_by(|a, b| {
                    a.min_balance
                        .partial_cmp(&b.min_balance)
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
                .filter(|best| {
                    best.installments != request.installment_count
                        && best.min_balance > min_balance
                })
                .map(|best| best.installments);
        }

        let mut simulation = Simulation {
            id: 0,
            user_id,
            description: request.description.clone(),
            amount: round_cents(request.amount),
            payment_method: request.payment_method,
            installment_count: request.installment_count,
            planned_date,
            months,
            min_balance: round_cents(min_balance),
            risk,
            recommendation,
            alternatives,
            suggested_installments,
            created_at: Utc::now(),
        };

        simulation.id = db.insert_simulation(&simulation)?;
        debug!(
            user_id,
            amount = simulation.amount,
            risk = %simulation.risk,
            recommendation = %simulation.recommendation,
            "Simulation persisted"
        );

        Ok(simulation)
    }

    /// Build the 12 projection rows for one payment schedule
    #[allow(clippy::too_many_arguments)]
    fn project(
        &self,
        db: &Database,
        user_id: i64,
        profile: &FinancialProfile,
        horizon_start: NaiveDate,
        planned_date: NaiveDate,
        amount: f64,
        payment_method: PaymentMethod,
        installment_count: i64,
    ) -> Result<Vec<MonthlyProjection>> {
        let impacts = impact_schedule(
            horizon_start,
            planned_date,
            amount,
            payment_method,
            installment_count,
        );

        let mut months = Vec::with_capacity(HORIZON_MONTHS as usize);
        for index in 0..HORIZON_MONTHS {
            let month = add_months(horizon_start, index);
            let month_end = add_months(month, 1).pred_opt().unwrap_or(month);

            let commitments = db.installments_due_between(user_id, month, month_end)?;
            let impact = impacts[index as usize];

            let balance_without =
                profile.avg_monthly_income - profile.avg_monthly_expense - commitments;
            let balance_with = balance_without - impact;

            months.push(MonthlyProjection {
                month,
                income: round_cents(profile.avg_monthly_income),
                expense: round_cents(profile.avg_monthly_expense),
                commitments: round_cents(commitments),
                purchase_impact: round_cents(impact),
                balance_without_purchase: round_cents(balance_without),
                balance_with_purchase: round_cents(balance_with),
            });
        }

        Ok(months)
    }

    /// Risk from the worst projected balance, with thresholds scaled up for
    /// low-confidence profiles and volatile spenders
    fn classify_risk(&self, min_balance: f64, profile: &FinancialProfile) -> RiskLevel {
        let income = profile.avg_monthly_income;
        if income <= 0.0 {
            return RiskLevel::High;
        }

        let confidence_factor = match profile.confidence {
            Confidence::High => 1.0,
            Confidence::Medium => 1.25,
            Confidence::Low => 1.5,
        };
        // Volatile spending raises the bar; the inflation is capped at 2x
        let volatility_factor = (1.0 + profile.expense_volatility / income).min(2.0);
        let scale = confidence_factor * volatility_factor;

        let ratio = min_balance / income;
        if ratio >= self.config.low_risk_margin_ratio * scale {
            RiskLevel::Low
        } else if ratio >= self.config.medium_risk_margin_ratio * scale {
            RiskLevel::Medium
        } else {
            RiskLevel::High
        }
    }

    /// A user's simulation history, newest first
    pub fn history(&self, db: &Database, user_id: i64) -> Result<Vec<Simulation>> {
        db.list_simulations(user_id)
    }
}

/// Per-month share of the candidate purchase across the horizon
///
/// Immediate payments land in the purchase month; single-installment credit
/// shifts one month; multi-installment credit splits evenly (remainder in
/// the last part) starting one month after the purchase.
fn impact_schedule(
    horizon_start: NaiveDate,
    planned_date: NaiveDate,
    amount: f64,
    payment_method: PaymentMethod,
    installment_count: i64,
) -> Vec<f64> {
    let mut impacts = vec![0.0; HORIZON_MONTHS as usize];

    let purchase_month = month_start(planned_date);
    let offset = (purchase_month.year() as i64 * 12 + purchase_month.month0() as i64)
        - (horizon_start.year() as i64 * 12 + horizon_start.month0() as i64);

    let mut land = |index: i64, value: f64| {
        if (0..HORIZON_MONTHS).contains(&index) {
            impacts[index as usize] += value;
        }
    };

    match (payment_method, installment_count) {
        (PaymentMethod::Credit, 1) => land(offset + 1, amount),
        (PaymentMethod::Credit, count) => {
            let per = round_cents(amount / count as f64);
            let last = round_cents(amount - per * (count - 1) as f64);
            for seq in 1..=count {
                let value = if seq == count { last } else { per };
                land(offset + seq, value);
            }
        }
        // Cash, debit and unspecified hit the purchase month in full
        (_, _) => land(offset, amount),
    }

    impacts
}

impl Default for Simulator {
    fn default() -> Self {
        Self::new()
    }
}

/// Map scenario risk to a recommendation
fn recommend(
    risk: RiskLevel,
    amount: f64,
    installment_count: i64,
    profile: &FinancialProfile,
) -> Recommendation {
    match risk {
        RiskLevel::Low => Recommendation::Proceed,
        RiskLevel::Medium if installment_count > 1 => Recommendation::AdjustInstallments,
        RiskLevel::Medium => Recommendation::Postpone,
        RiskLevel::High if amount > profile.avg_monthly_income => Recommendation::ReduceAmount,
        RiskLevel::High => Recommendation::Postpone,
    }
}
