//! Append-only decision audit log
//!
//! One compact row per evaluation, for observability only. Rows are never
//! updated or deleted.

use rusqlite::params;

use super::{parse_datetime, Database};
use crate::error::Result;
use crate::models::{AuditRecord, DecisionType, NewAuditRecord};

impl Database {
    /// Append one audit row
    pub fn append_audit(&self, record: &NewAuditRecord) -> Result<i64> {
        let conn = self.conn()?;

        let inputs_json = serde_json::to_string(&record.inputs)?;

        conn.execute(
            r#"
            INSERT INTO audit_log (user_id, decision_type, amount, outcome, rationale, inputs)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
            params![
                record.user_id,
                record.decision_type.as_str(),
                record.amount,
                record.outcome,
                record.rationale,
                inputs_json,
            ],
        )?;

        Ok(conn.last_insert_rowid())
    }

    /// Most recent audit rows for a user
    pub fn list_audit(&self, user_id: i64, limit: i64) -> Result<Vec<AuditRecord>> {
        let conn = self.conn()?;

        let mut stmt = conn.prepare(
            r#"
            SELECT id, user_id, decision_type, amount, outcome, rationale, inputs, created_at
            FROM audit_log
            WHERE user_id = ?
            ORDER BY id DESC
            LIMIT ?
            "#,
        )?;
        let rows = stmt.query_map(params![user_id, limit], |row| {
            let type_str: String = row.get(2)?;
            let inputs_json: String = row.get(6)?;
            let created: String = row.get(7)?;

            Ok(AuditRecord {
                id: row.get(0)?,
                user_id: row.get(1)?,
                decision_type: type_str.parse().unwrap_or(DecisionType::QuickSpend),
                amount: row.get(3)?,
                outcome: row.get(4)?,
                rationale: row.get(5)?,
                inputs: serde_json::from_str(&inputs_json).unwrap_or_default(),
                created_at: parse_datetime(&created),
            })
        })?;

        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_and_list() {
        let db = Database::in_memory().unwrap();

        db.append_audit(&NewAuditRecord {
            user_id: 1,
            decision_type: DecisionType::QuickSpend,
            amount: 50.0,
            outcome: "proceed".to_string(),
            rationale: "well within free balance".to_string(),
            inputs: serde_json::json!({"free_balance": 900.0}),
        })
        .unwrap();
        db.append_audit(&NewAuditRecord {
            user_id: 1,
            decision_type: DecisionType::FullPurchase,
            amount: 1200.0,
            outcome: "hold".to_string(),
            rationale: "exceeds free balance".to_string(),
            inputs: serde_json::json!({"free_balance": 900.0}),
        })
        .unwrap();

        let rows = db.list_audit(1, 10).unwrap();
        assert_eq!(rows.len(), 2);
        // Newest first
        assert_eq!(rows[0].decision_type, DecisionType::FullPurchase);
        assert_eq!(rows[0].inputs["free_balance"], 900.0);
    }
}
