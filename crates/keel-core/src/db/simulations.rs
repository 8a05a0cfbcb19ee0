//! Persisted cash-flow simulations (immutable after creation)

use rusqlite::params;

use super::{parse_date, parse_datetime, Database};
use crate::error::Result;
use crate::models::{PaymentMethod, Recommendation, RiskLevel, Simulation};

impl Database {
    /// Persist a simulation; returns its id
    pub fn insert_simulation(&self, sim: &Simulation) -> Result<i64> {
        let conn = self.conn()?;

        let months_json = serde_json::to_string(&sim.months)?;
        let alternatives_json = serde_json::to_string(&sim.alternatives)?;

        conn.execute(
            r#"
            INSERT INTO simulations (
                user_id, description, amount, payment_method, installment_count,
                planned_date, months, min_balance, risk, recommendation,
                alternatives, suggested_installments
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                sim.user_id,
                sim.description,
                sim.amount,
                sim.payment_method.as_str(),
                sim.installment_count,
                sim.planned_date.to_string(),
                months_json,
                sim.min_balance,
                sim.risk.as_str(),
                sim.recommendation.as_str(),
                alternatives_json,
                sim.suggested_installments,
            ],
        )?;

        Ok(conn.last_insert_rowid())
    }

    /// A user's simulation history, newest first
    pub fn list_simulations(&self, user_id: i64) -> Result<Vec<Simulation>> {
        let conn = self.conn()?;

        let mut stmt = conn.prepare(
            r#"
            SELECT id, user_id, description, amount, payment_method, installment_count,
                   planned_date, months, min_balance, risk, recommendation,
                   alternatives, suggested_installments, created_at
            FROM simulations
            WHERE user_id = ?
            ORDER BY created_at DESC, id DESC
            "#,
        )?;
        let rows = stmt.query_map(params![user_id], |row| Self::row_to_simulation(row))?;

        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    fn row_to_simulation(row: &rusqlite::Row) -> rusqlite::Result<Simulation> {
        let method_str: String = row.get(4)?;
        let planned_str: String = row.get(6)?;
        let months_json: String = row.get(7)?;
        let risk_str: String = row.get(9)?;
        let recommendation_str: String = row.get(10)?;
        let alternatives_json: String = row.get(11)?;
        let created_str: String = row.get(13)?;

        Ok(Simulation {
            id: row.get(0)?,
            user_id: row.get(1)?,
            description: row.get(2)?,
            amount: row.get(3)?,
            payment_method: method_str.parse().unwrap_or(PaymentMethod::Unspecified),
            installment_count: row.get(5)?,
            planned_date: parse_date(&planned_str),
            months: serde_json::from_str(&months_json).unwrap_or_default(),
            min_balance: row.get(8)?,
            risk: risk_str.parse().unwrap_or(RiskLevel::High),
            recommendation: recommendation_str.parse().unwrap_or(Recommendation::Postpone),
            alternatives: serde_json::from_str(&alternatives_json).unwrap_or_default(),
            suggested_installments: row.get(12)?,
            created_at: parse_datetime(&created_str),
        })
    }
}
