//! Decision Engine
//!
//! Given a candidate expense, runs a 4-layer evaluation (mathematical,
//! historical, trend, behavioral) and renders a proceed/caution/hold
//! verdict. Large or installment purchases instead get a comparative
//! at-once vs installments analysis.
//!
//! The mathematical layer is an absolute ceiling: when it says Hold, the
//! final verdict is Hold no matter what the other layers vote.

use chrono::{NaiveDate, Utc};
use serde::Serialize;
use tracing::warn;

use crate::config::EngineConfig;
use crate::dates::{add_months, days_in_month, days_remaining_in_month, month_start};
use crate::db::Database;
use crate::error::{Error, Result};
use crate::goal_impact::GoalImpactCalculator;
use crate::models::{
    round_cents, DecisionLayer, DecisionResult, DecisionType, LayerVote, LimitAlert,
    NewAuditRecord, PaymentMethod, PurchaseEvaluation, PurchaseOption, RiskLevel,
    TransactionKind, Verdict,
};
use crate::profile::ProfileCalculator;
use crate::score::{expense_growth, HealthScoreEngine};

/// Breakdown of the month's free balance
#[derive(Debug, Clone, Serialize)]
pub struct FreeBalance {
    /// Projected income: this month's actual when positive, else effective
    pub income: f64,
    /// max(declared monthly income, profile average income)
    pub effective_income: f64,
    /// Expense accumulated so far this month
    pub month_expense: f64,
    /// Unpaid installments due this month
    pub commitments: f64,
    /// Monthly obligation toward active goals
    pub goal_reserve: f64,
    pub free_balance: f64,
    pub days_remaining: i64,
    pub daily_income_budget: f64,
}

pub struct DecisionEngine {
    config: EngineConfig,
    profiles: ProfileCalculator,
    scores: HealthScoreEngine,
    goal_impacts: GoalImpactCalculator,
}

impl DecisionEngine {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Self {
            profiles: ProfileCalculator::with_config(config.clone()),
            scores: HealthScoreEngine::with_config(config.clone()),
            goal_impacts: GoalImpactCalculator::with_config(config.clone()),
            config,
        }
    }

    /// Whether a candidate expense is small enough for the fast verdict path
    ///
    /// Installment purchases always take the full path; otherwise the amount
    /// must stay under 5% of effective income and 15% of the free balance.
    pub fn should_use_fast_path(
        &self,
        db: &Database,
        user_id: i64,
        amount: f64,
        is_installment: bool,
    ) -> Result<bool> {
        self.should_use_fast_path_as_of(db, user_id, amount, is_installment, Utc::now().date_naive())
    }

    pub fn should_use_fast_path_as_of(
        &self,
        db: &Database,
        user_id: i64,
        amount: f64,
        is_installment: bool,
        today: NaiveDate,
    ) -> Result<bool> {
        if amount <= 0.0 {
            return Err(Error::InvalidData(format!(
                "Amount must be positive, got {}",
                amount
            )));
        }
        if is_installment {
            return Ok(false);
        }

        let balance = self.free_balance_as_of(db, user_id, today)?;
        if balance.effective_income <= 0.0 || balance.free_balance <= 0.0 {
            return Ok(false);
        }

        Ok(amount / balance.effective_income < self.config.fast_path_income_ratio
            && amount / balance.free_balance < self.config.fast_path_balance_ratio)
    }

    /// Evaluate a single small expense through the four decision layers
    pub fn evaluate_quick_spend(
        &self,
        db: &Database,
        user_id: i64,
        amount: f64,
        description: Option<&str>,
        category: Option<&str>,
    ) -> Result<DecisionResult> {
        self.evaluate_quick_spend_as_of(
            db,
            user_id,
            amount,
            description,
            category,
            Utc::now().date_naive(),
        )
    }

    pub fn evaluate_quick_spend_as_of(
        &self,
        db: &Database,
        user_id: i64,
        amount: f64,
        description: Option<&str>,
        category: Option<&str>,
        today: NaiveDate,
    ) -> Result<DecisionResult> {
        if amount <= 0.0 {
            return Err(Error::InvalidData(format!(
                "Amount must be positive, got {}",
                amount
            )));
        }

        let balance = self.free_balance_as_of(db, user_id, today)?;

        let mathematical = self.mathematical_layer(amount, &balance);
        let historical = self.historical_layer(db, user_id, amount, &balance, today)?;
        let trend = self.trend_layer(db, user_id, today)?;
        let behavioral = self.behavioral_layer(db, user_id, today);

        let layers = vec![mathematical, historical, trend, behavioral];
        let verdict = consolidate(&layers);

        // Informational enrichments: failures are logged and omitted, never
        // allowed to abort the verdict.
        let limit_alert = category.and_then(|raw| {
            match self.check_category_limit(db, user_id, raw, amount, today) {
                Ok(alert) => alert,
                Err(e) => {
                    warn!(user_id, error = %e, "Category limit check failed");
                    None
                }
            }
        });

        let goal_impacts = match self.goal_impacts.compute_as_of(db, user_id, amount, today) {
            Ok(impacts) => Some(impacts),
            Err(e) => {
                warn!(user_id, error = %e, "Goal impact computation failed");
                None
            }
        };

        let result = DecisionResult {
            verdict,
            amount: round_cents(amount),
            free_balance: round_cents(balance.free_balance),
            layers,
            limit_alert,
            goal_impacts,
        };

        self.audit_quick_spend(db, user_id, description, &balance, &result);

        Ok(result)
    }

    /// Comparative at-once vs installments analysis for a large purchase
    pub fn evaluate_full_purchase(
        &self,
        db: &Database,
        user_id: i64,
        amount: f64,
        description: &str,
        payment_method: Option<PaymentMethod>,
        installments: i64,
    ) -> Result<PurchaseEvaluation> {
        self.evaluate_full_purchase_as_of(
            db,
            user_id,
            amount,
            description,
            payment_method,
            installments,
            Utc::now().date_naive(),
        )
    }

    pub fn evaluate_full_purchase_as_of(
        &self,
        db: &Database,
        user_id: i64,
        amount: f64,
        description: &str,
        payment_method: Option<PaymentMethod>,
        installments: i64,
        today: NaiveDate,
    ) -> Result<PurchaseEvaluation> {
        if amount <= 0.0 {
            return Err(Error::InvalidData(format!(
                "Amount must be positive, got {}",
                amount
            )));
        }

        let balance = self.free_balance_as_of(db, user_id, today)?;
        let profile = self.profiles.get_or_compute_as_of(db, user_id, today)?;
        let income = balance.effective_income;

        // Candidate counts: pay at once, then each configured split
        let mut counts = vec![1_i64];
        counts.extend(
            self.config
                .installment_options
                .iter()
                .copied()
                .filter(|n| *n > 1),
        );

        let options: Vec<PurchaseOption> = counts
            .iter()
            .map(|&count| {
                let per = amount / count as f64;
                // Margin with commitments held at their current monthly level
                let margin = income - profile.avg_monthly_expense - balance.commitments - per;
                PurchaseOption {
                    installments: count,
                    installment_amount: round_cents(per),
                    monthly_margin: round_cents(margin),
                    risk: self.margin_risk(margin, income),
                }
            })
            .collect();

        let recommended_installments = options
            .iter()
            .find(|o| o.risk == RiskLevel::Low)
            .or_else(|| options.iter().find(|o| o.risk == RiskLevel::Medium))
            .map(|o| o.installments);

        let evaluation = PurchaseEvaluation {
            amount: round_cents(amount),
            free_balance: round_cents(balance.free_balance),
            options,
            recommended_installments,
        };

        let outcome = match recommended_installments {
            Some(1) => "pay_at_once".to_string(),
            Some(n) => format!("{}x_installments", n),
            None => "postpone".to_string(),
        };
        let record = NewAuditRecord {
            user_id,
            decision_type: DecisionType::FullPurchase,
            amount: round_cents(amount),
            outcome,
            rationale: format!(
                "{} (requested {}x via {})",
                description,
                installments,
                payment_method.unwrap_or_default()
            ),
            inputs: serde_json::json!({
                "free_balance": round_cents(balance.free_balance),
                "effective_income": round_cents(income),
                "avg_monthly_expense": round_cents(profile.avg_monthly_expense),
                "commitments": round_cents(balance.commitments),
            }),
        };
        if let Err(e) = db.append_audit(&record) {
            warn!(user_id, error = %e, "Failed to append purchase audit row");
        }

        Ok(evaluation)
    }

    /// Human-readable report for a full purchase evaluation
    pub fn render_report(&self, evaluation: &PurchaseEvaluation) -> String {
        let mut out = String::new();
        out.push_str(&format!(
            "Purchase of ${:.2} (free balance this month: ${:.2})\n",
            evaluation.amount, evaluation.free_balance
        ));
        out.push_str("   Option        │ Per month  │ Margin     │ Risk\n");
        out.push_str("   ──────────────┼────────────┼────────────┼───────\n");
        for option in &evaluation.options {
            let label = if option.installments == 1 {
                "at once".to_string()
            } else {
                format!("{}x", option.installments)
            };
            out.push_str(&format!(
                "   {:13} │ {:>10.2} │ {:>10.2} │ {}\n",
                label, option.installment_amount, option.monthly_margin, option.risk
            ));
        }
        match evaluation.recommended_installments {
            Some(1) => out.push_str("   Recommendation: pay at once\n"),
            Some(n) => out.push_str(&format!("   Recommendation: split into {} installments\n", n)),
            None => out.push_str("   Recommendation: postpone this purchase\n"),
        }
        out
    }

    /// Compute the month's free balance breakdown
    pub fn free_balance_as_of(
        &self,
        db: &Database,
        user_id: i64,
        today: NaiveDate,
    ) -> Result<FreeBalance> {
        let profile = self.profiles.get_or_compute_as_of(db, user_id, today)?;
        let settings = db.user_settings(user_id)?;
        let effective_income = settings
            .declared_monthly_income
            .max(profile.avg_monthly_income);

        let start = month_start(today);
        let month_end = add_months(start, 1).pred_opt().unwrap_or(start);

        let actual_income = db.sum_transactions(user_id, TransactionKind::Income, start, month_end)?;
        let income = if actual_income > 0.0 {
            actual_income
        } else {
            effective_income
        };

        let month_expense =
            db.sum_transactions(user_id, TransactionKind::Expense, start, month_end)?;
        let commitments = db.installments_due_between(user_id, start, month_end)?;
        let goal_reserve = self.goal_reserve(db, user_id, today)?;

        let free_balance = income - month_expense - commitments - goal_reserve;
        let days_remaining = days_remaining_in_month(today);
        let daily_income_budget = income / days_in_month(today) as f64;

        Ok(FreeBalance {
            income,
            effective_income,
            month_expense,
            commitments,
            goal_reserve,
            free_balance,
            days_remaining,
            daily_income_budget,
        })
    }

    /// Monthly obligation toward active goals: flat reserve amounts plus
    /// straight-line contributions for unmet accumulation goals
    fn goal_reserve(&self, db: &Database, user_id: i64, today: NaiveDate) -> Result<f64> {
        use crate::dates::months_until;
        use crate::models::{GoalKind, GoalStatus};

        let goals = db.list_goals(user_id, Some(GoalStatus::Active))?;
        let mut reserve = 0.0;

        for goal in goals {
            match goal.kind {
                GoalKind::MonthlyReserve => reserve += goal.monthly_reserve,
                GoalKind::AccumulateAmount => {
                    if goal.is_met() {
                        continue;
                    }
                    let months = goal
                        .deadline
                        .map(|deadline| months_until(today, deadline))
                        .unwrap_or(1)
                        .max(1);
                    reserve += goal.remaining() / months as f64;
                }
                GoalKind::ReduceSpending => {}
            }
        }

        Ok(reserve)
    }

    fn mathematical_layer(&self, amount: f64, balance: &FreeBalance) -> LayerVote {
        let free = balance.free_balance;

        let (verdict, rationale) = if free <= 0.0 {
            (
                Verdict::Hold,
                format!("no free balance this month ({:.2})", free),
            )
        } else if amount > free {
            (
                Verdict::Hold,
                format!("amount {:.2} exceeds free balance {:.2}", amount, free),
            )
        } else if amount / free > self.config.caution_balance_ratio {
            (
                Verdict::Caution,
                format!(
                    "amount is {:.0}% of the remaining free balance",
                    amount / free * 100.0
                ),
            )
        } else {
            let remaining_daily = (free - amount) / balance.days_remaining as f64;
            let floor = balance.daily_income_budget * self.config.caution_daily_budget_ratio;
            if remaining_daily < floor {
                (
                    Verdict::Caution,
                    format!(
                        "leaves only {:.2}/day for the rest of the month",
                        remaining_daily
                    ),
                )
            } else {
                (
                    Verdict::Proceed,
                    format!("fits the free balance of {:.2}", free),
                )
            }
        };

        LayerVote {
            layer: DecisionLayer::Mathematical,
            verdict,
            rationale,
        }
    }

    fn historical_layer(
        &self,
        db: &Database,
        user_id: i64,
        amount: f64,
        balance: &FreeBalance,
        today: NaiveDate,
    ) -> Result<LayerVote> {
        // The three most recent preceding months that actually saw spending;
        // empty gap months do not water down the average
        let prior = db.monthly_analysis_before(user_id, month_start(today), 12)?;
        let with_data: Vec<_> = prior
            .iter()
            .filter(|m| m.expense > 0.0)
            .take(3)
            .collect();

        if with_data.is_empty() {
            return Ok(LayerVote {
                layer: DecisionLayer::Historical,
                verdict: Verdict::Proceed,
                rationale: "no prior months to compare against".to_string(),
            });
        }

        let mean =
            with_data.iter().map(|m| m.expense).sum::<f64>() / with_data.len() as f64;
        let projected = balance.month_expense + amount;
        let over = (projected - mean) / mean;

        let (verdict, rationale) = if over > 0.30 {
            (
                Verdict::Hold,
                format!("month would run {:.0}% over the recent average", over * 100.0),
            )
        } else if over > 0.15 {
            (
                Verdict::Caution,
                format!("month would run {:.0}% over the recent average", over * 100.0),
            )
        } else {
            (
                Verdict::Proceed,
                format!("month stays near the recent average ({:.2})", mean),
            )
        };

        Ok(LayerVote {
            layer: DecisionLayer::Historical,
            verdict,
            rationale,
        })
    }

    fn trend_layer(&self, db: &Database, user_id: i64, today: NaiveDate) -> Result<LayerVote> {
        let window = db.monthly_analysis_before(user_id, month_start(today), 3)?;
        let growth = expense_growth(&window);

        let (verdict, rationale) = if growth > 0.20 {
            (
                Verdict::Hold,
                format!("expenses grew {:.0}% over the last three months", growth * 100.0),
            )
        } else if growth > 0.10 {
            (
                Verdict::Caution,
                format!("expenses grew {:.0}% over the last three months", growth * 100.0),
            )
        } else {
            (
                Verdict::Proceed,
                format!("expense trend is stable ({:+.0}%)", growth * 100.0),
            )
        };

        Ok(LayerVote {
            layer: DecisionLayer::Trend,
            verdict,
            rationale,
        })
    }

    /// Behavioral vote from the cached health score; an unavailable score
    /// skips the layer rather than aborting the decision
    fn behavioral_layer(&self, db: &Database, user_id: i64, today: NaiveDate) -> LayerVote {
        match self.scores.current_as_of(db, user_id, today, Utc::now()) {
            Ok(snapshot) => {
                let (verdict, rationale) = if snapshot.score < 40.0 {
                    (
                        Verdict::Hold,
                        format!("health score is {:.0} ({})", snapshot.score, snapshot.classification),
                    )
                } else if snapshot.score < 70.0 {
                    (
                        Verdict::Caution,
                        format!("health score is {:.0} ({})", snapshot.score, snapshot.classification),
                    )
                } else {
                    (
                        Verdict::Proceed,
                        format!("health score is {:.0} ({})", snapshot.score, snapshot.classification),
                    )
                };
                LayerVote {
                    layer: DecisionLayer::Behavioral,
                    verdict,
                    rationale,
                }
            }
            Err(e) => {
                warn!(user_id, error = %e, "Health score unavailable, skipping behavioral layer");
                LayerVote {
                    layer: DecisionLayer::Behavioral,
                    verdict: Verdict::Proceed,
                    rationale: "health score unavailable".to_string(),
                }
            }
        }
    }

    fn check_category_limit(
        &self,
        db: &Database,
        user_id: i64,
        raw_category: &str,
        amount: f64,
        today: NaiveDate,
    ) -> Result<Option<LimitAlert>> {
        let category = self.config.canonical_category(Some(raw_category));
        let Some(monthly_limit) = db.category_limit(user_id, &category)? else {
            return Ok(None);
        };

        let start = month_start(today);
        let month_end = add_months(start, 1).pred_opt().unwrap_or(start);
        let spent = db.sum_category_expense(user_id, &category, start, month_end)?;
        let projected = spent + amount;

        if projected > monthly_limit {
            Ok(Some(LimitAlert {
                category,
                monthly_limit,
                spent: round_cents(spent),
                projected: round_cents(projected),
            }))
        } else {
            Ok(None)
        }
    }

    fn margin_risk(&self, margin: f64, income: f64) -> RiskLevel {
        if income <= 0.0 {
            return RiskLevel::High;
        }
        if margin >= income * self.config.low_risk_margin_ratio {
            RiskLevel::Low
        } else if margin >= income * self.config.medium_risk_margin_ratio {
            RiskLevel::Medium
        } else {
            RiskLevel::High
        }
    }

    /// Append the quick-spend audit row; a failed append is logged, not fatal
    fn audit_quick_spend(
        &self,
        db: &Database,
        user_id: i64,
        description: Option<&str>,
        balance: &FreeBalance,
        result: &DecisionResult,
    ) {
        let rationale = result
            .layers
            .iter()
            .map(|l| format!("{}: {}", l.layer, l.rationale))
            .collect::<Vec<_>>()
            .join("; ");
        let rationale = match description {
            Some(text) => format!("{}: {}", text, rationale),
            None => rationale,
        };

        let record = NewAuditRecord {
            user_id,
            decision_type: DecisionType::QuickSpend,
            amount: result.amount,
            outcome: result.verdict.as_str().to_string(),
            rationale,
            inputs: serde_json::json!({
                "free_balance": round_cents(balance.free_balance),
                "income": round_cents(balance.income),
                "month_expense": round_cents(balance.month_expense),
                "commitments": round_cents(balance.commitments),
                "goal_reserve": round_cents(balance.goal_reserve),
            }),
        };

        if let Err(e) = db.append_audit(&record) {
            warn!(user_id, error = %e, "Failed to append decision audit row");
        }
    }
}

/// Combine layer votes into the final verdict
///
/// The mathematical layer is a ceiling: its Hold is final. Otherwise two
/// Holds force Hold; one Hold or two Cautions force Caution.
fn consolidate(layers: &[LayerVote]) -> Verdict {
    let mathematical_hold = layers
        .iter()
        .any(|l| l.layer == DecisionLayer::Mathematical && l.verdict == Verdict::Hold);
    if mathematical_hold {
        return Verdict::Hold;
    }

    let holds = layers.iter().filter(|l| l.verdict == Verdict::Hold).count();
    let cautions = layers
        .iter()
        .filter(|l| l.verdict == Verdict::Caution)
        .count();

    if holds >= 2 {
        Verdict::Hold
    } else if holds >= 1 || cautions >= 2 {
        Verdict::Caution
    } else {
        Verdict::Proceed
    }
}

impl Default for DecisionEngine {
    fn default() -> Self {
        Self::new()
    }
}
