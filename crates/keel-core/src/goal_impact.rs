//! Goal Impact Calculator
//!
//! Estimates how a hypothetical expense delays active savings/reduction
//! goals. Pure what-if math: goals are read, never mutated.

use chrono::{NaiveDate, Utc};
use tracing::debug;

use crate::config::EngineConfig;
use crate::dates::months_until;
use crate::db::Database;
use crate::error::{Error, Result};
use crate::models::{round_cents, GoalImpact, GoalKind, GoalStatus};
use crate::profile::ProfileCalculator;

pub struct GoalImpactCalculator {
    profiles: ProfileCalculator,
}

impl GoalImpactCalculator {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Self {
            profiles: ProfileCalculator::with_config(config),
        }
    }

    /// Impact of a candidate amount on every active goal
    pub fn compute(&self, db: &Database, user_id: i64, amount: f64) -> Result<Vec<GoalImpact>> {
        self.compute_as_of(db, user_id, amount, Utc::now().date_naive())
    }

    /// As `compute`, with an explicit "today" for deterministic runs
    pub fn compute_as_of(
        &self,
        db: &Database,
        user_id: i64,
        amount: f64,
        today: NaiveDate,
    ) -> Result<Vec<GoalImpact>> {
        if amount <= 0.0 {
            return Err(Error::InvalidData(format!(
                "Impact amount must be positive, got {}",
                amount
            )));
        }

        let profile = self.profiles.get_or_compute_as_of(db, user_id, today)?;
        let free_margin = profile.free_margin();

        let goals = db.list_goals(user_id, Some(GoalStatus::Active))?;
        let mut impacts = Vec::new();

        for goal in goals {
            match goal.kind {
                GoalKind::MonthlyReserve => {
                    // A reserve goal is never delayed; it is flagged when the
                    // purchase eats past the monthly free margin.
                    if amount > free_margin {
                        impacts.push(GoalImpact {
                            goal_id: goal.id,
                            goal_name: goal.name.clone(),
                            kind: goal.kind,
                            delay_months: 0,
                            required_before: round_cents(goal.monthly_reserve),
                            required_after: round_cents(goal.monthly_reserve),
                            reserve_exceeded: true,
                        });
                    }
                }
                GoalKind::AccumulateAmount | GoalKind::ReduceSpending => {
                    if goal.is_met() {
                        continue;
                    }

                    let remaining = goal.remaining();
                    // A missing or past deadline still leaves at least one
                    // month of runway
                    let months = goal
                        .deadline
                        .map(|deadline| months_until(today, deadline))
                        .unwrap_or(1)
                        .max(1);

                    let required_before = remaining / months as f64;
                    let capacity = required_before.min(free_margin);

                    let delay_months = if capacity <= 0.0 {
                        0
                    } else {
                        (amount / capacity).ceil() as i64
                    };

                    let required_after = remaining / (months - 1).max(1) as f64;

                    impacts.push(GoalImpact {
                        goal_id: goal.id,
                        goal_name: goal.name.clone(),
                        kind: goal.kind,
                        delay_months: delay_months.max(0),
                        required_before: round_cents(required_before),
                        required_after: round_cents(required_after),
                        reserve_exceeded: false,
                    });
                }
            }
        }

        debug!(user_id, amount, impacts = impacts.len(), "Goal impact computed");
        Ok(impacts)
    }
}

impl Default for GoalImpactCalculator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewGoal, NewTransaction, PaymentMethod, TransactionKind};

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    /// Seed two elapsed months so the profile has income 3000 and the given
    /// monthly expense, leaving free margin = 3000 - expense.
    fn seed_margin(db: &Database, monthly_expense: f64) {
        for month in 4..6u32 {
            db.insert_transaction(&NewTransaction {
                user_id: 1,
                kind: TransactionKind::Income,
                amount: 3000.0,
                category: None,
                payment_method: PaymentMethod::Unspecified,
                occurred_on: d(2026, month, 5),
                installment_count: 1,
                import_hash: None,
            })
            .unwrap();
            db.insert_transaction(&NewTransaction {
                user_id: 1,
                kind: TransactionKind::Expense,
                amount: monthly_expense,
                category: None,
                payment_method: PaymentMethod::Debit,
                occurred_on: d(2026, month, 10),
                installment_count: 1,
                import_hash: None,
            })
            .unwrap();
        }
    }

    fn accumulate_goal(target: f64, current: f64, deadline: NaiveDate) -> NewGoal {
        NewGoal {
            user_id: 1,
            name: "Trip".to_string(),
            kind: GoalKind::AccumulateAmount,
            target_amount: target,
            current_amount: current,
            monthly_reserve: 0.0,
            deadline: Some(deadline),
        }
    }

    #[test]
    fn test_two_month_delay() {
        let db = Database::in_memory().unwrap();
        let calc = GoalImpactCalculator::new();
        let today = d(2026, 6, 15);

        // Free margin = 3000 - 2950 = 50; remaining 1200 over 12 months
        // needs 100/month, so capacity is min(100, 50) = 50 and a 100
        // purchase delays by ceil(100 / 50) = 2 months.
        seed_margin(&db, 2950.0);
        db.insert_goal(&accumulate_goal(1200.0, 0.0, d(2027, 6, 15))).unwrap();

        let impacts = calc.compute_as_of(&db, 1, 100.0, today).unwrap();
        assert_eq!(impacts.len(), 1);
        assert_eq!(impacts[0].delay_months, 2);
        assert_eq!(impacts[0].required_before, 100.0);
        assert!((impacts[0].required_after - 1200.0 / 11.0).abs() < 0.01);
    }

    #[test]
    fn test_met_goal_skipped() {
        let db = Database::in_memory().unwrap();
        let calc = GoalImpactCalculator::new();

        seed_margin(&db, 2000.0);
        db.insert_goal(&accumulate_goal(1000.0, 1000.0, d(2027, 6, 15))).unwrap();

        let impacts = calc.compute_as_of(&db, 1, 100.0, d(2026, 6, 15)).unwrap();
        assert!(impacts.is_empty());
    }

    #[test]
    fn test_non_positive_capacity_means_zero_delay() {
        let db = Database::in_memory().unwrap();
        let calc = GoalImpactCalculator::new();

        // Expense above income: free margin is negative
        seed_margin(&db, 3500.0);
        db.insert_goal(&accumulate_goal(1200.0, 0.0, d(2027, 6, 15))).unwrap();

        let impacts = calc.compute_as_of(&db, 1, 100.0, d(2026, 6, 15)).unwrap();
        assert_eq!(impacts.len(), 1);
        assert_eq!(impacts[0].delay_months, 0);
    }

    #[test]
    fn test_monthly_reserve_flagged_never_delayed() {
        let db = Database::in_memory().unwrap();
        let calc = GoalImpactCalculator::new();
        let today = d(2026, 6, 15);

        // Free margin = 200
        seed_margin(&db, 2800.0);
        db.insert_goal(&NewGoal {
            user_id: 1,
            name: "Buffer".to_string(),
            kind: GoalKind::MonthlyReserve,
            target_amount: 0.0,
            current_amount: 0.0,
            monthly_reserve: 150.0,
            deadline: None,
        })
        .unwrap();

        // Within the margin: no impact entry
        let quiet = calc.compute_as_of(&db, 1, 100.0, today).unwrap();
        assert!(quiet.is_empty());

        // Past the margin: flagged, delay stays zero
        let flagged = calc.compute_as_of(&db, 1, 500.0, today).unwrap();
        assert_eq!(flagged.len(), 1);
        assert!(flagged[0].reserve_exceeded);
        assert_eq!(flagged[0].delay_months, 0);
    }

    #[test]
    fn test_rejects_non_positive_amount() {
        let db = Database::in_memory().unwrap();
        let calc = GoalImpactCalculator::new();
        assert!(calc.compute_as_of(&db, 1, 0.0, d(2026, 6, 15)).is_err());
    }
}
