//! Health score snapshot cache

use rusqlite::{params, OptionalExtension};

use super::{parse_datetime, Database};
use crate::error::Result;
use crate::models::{HealthScoreSnapshot, ScoreClassification};

impl Database {
    /// Fetch the cached score snapshot for a user
    pub fn get_health_score(&self, user_id: i64) -> Result<Option<HealthScoreSnapshot>> {
        let conn = self.conn()?;

        let snapshot = conn
            .query_row(
                r#"
                SELECT user_id, score, classification, factors, updated_at
                FROM health_scores
                WHERE user_id = ?
                "#,
                params![user_id],
                |row| {
                    let classification_str: String = row.get(2)?;
                    let factors_json: String = row.get(3)?;
                    let updated: String = row.get(4)?;
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, f64>(1)?,
                        classification_str,
                        factors_json,
                        updated,
                    ))
                },
            )
            .optional()?;

        let Some((user_id, score, classification_str, factors_json, updated)) = snapshot else {
            return Ok(None);
        };

        Ok(Some(HealthScoreSnapshot {
            user_id,
            score,
            classification: classification_str
                .parse()
                .unwrap_or(ScoreClassification::Critical),
            factors: serde_json::from_str(&factors_json).unwrap_or_default(),
            updated_at: parse_datetime(&updated),
        }))
    }

    /// Write a score snapshot back into the behavioral-profile store
    pub fn upsert_health_score(&self, snapshot: &HealthScoreSnapshot) -> Result<()> {
        let conn = self.conn()?;

        let factors_json = serde_json::to_string(&snapshot.factors)?;

        conn.execute(
            r#"
            INSERT INTO health_scores (user_id, score, classification, factors, updated_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(user_id) DO UPDATE SET
                score = excluded.score,
                classification = excluded.classification,
                factors = excluded.factors,
                updated_at = excluded.updated_at
            "#,
            params![
                snapshot.user_id,
                snapshot.score,
                snapshot.classification.as_str(),
                factors_json,
                snapshot.updated_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            ],
        )?;

        Ok(())
    }
}
