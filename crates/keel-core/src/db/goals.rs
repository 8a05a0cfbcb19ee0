//! Goal store (read-only to the engine; the CLI can create rows)

use rusqlite::params;

use super::{parse_date, parse_datetime, Database};
use crate::error::Result;
use crate::models::{Goal, GoalKind, GoalStatus, NewGoal};

impl Database {
    /// Insert a goal
    pub fn insert_goal(&self, goal: &NewGoal) -> Result<i64> {
        let conn = self.conn()?;

        conn.execute(
            r#"
            INSERT INTO goals (user_id, name, kind, target_amount, current_amount, monthly_reserve, deadline, status)
            VALUES (?, ?, ?, ?, ?, ?, ?, 'active')
            "#,
            params![
                goal.user_id,
                goal.name,
                goal.kind.as_str(),
                goal.target_amount,
                goal.current_amount,
                goal.monthly_reserve,
                goal.deadline.map(|d| d.to_string()),
            ],
        )?;

        Ok(conn.last_insert_rowid())
    }

    /// List a user's goals, optionally filtered by status
    pub fn list_goals(&self, user_id: i64, status: Option<GoalStatus>) -> Result<Vec<Goal>> {
        let conn = self.conn()?;

        let goals = if let Some(s) = status {
            let mut stmt = conn.prepare(
                r#"
                SELECT id, user_id, name, kind, target_amount, current_amount, monthly_reserve, deadline, status, created_at
                FROM goals
                WHERE user_id = ? AND status = ?
                ORDER BY created_at ASC
                "#,
            )?;
            let rows = stmt.query_map(params![user_id, s.as_str()], |row| Self::row_to_goal(row))?;
            rows.collect::<std::result::Result<Vec<_>, _>>()?
        } else {
            let mut stmt = conn.prepare(
                r#"
                SELECT id, user_id, name, kind, target_amount, current_amount, monthly_reserve, deadline, status, created_at
                FROM goals
                WHERE user_id = ?
                ORDER BY created_at ASC
                "#,
            )?;
            let rows = stmt.query_map(params![user_id], |row| Self::row_to_goal(row))?;
            rows.collect::<std::result::Result<Vec<_>, _>>()?
        };

        Ok(goals)
    }

    fn row_to_goal(row: &rusqlite::Row) -> rusqlite::Result<Goal> {
        let kind_str: String = row.get(3)?;
        let deadline: Option<String> = row.get(7)?;
        let status_str: String = row.get(8)?;
        let created: String = row.get(9)?;

        Ok(Goal {
            id: row.get(0)?,
            user_id: row.get(1)?,
            name: row.get(2)?,
            kind: kind_str.parse().unwrap_or(GoalKind::AccumulateAmount),
            target_amount: row.get(4)?,
            current_amount: row.get(5)?,
            monthly_reserve: row.get(6)?,
            deadline: deadline.map(|d| parse_date(&d)),
            status: status_str.parse().unwrap_or(GoalStatus::Active),
            created_at: parse_datetime(&created),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_insert_and_filter_by_status() {
        let db = Database::in_memory().unwrap();

        db.insert_goal(&NewGoal {
            user_id: 1,
            name: "Emergency fund".to_string(),
            kind: GoalKind::AccumulateAmount,
            target_amount: 5000.0,
            current_amount: 1200.0,
            monthly_reserve: 0.0,
            deadline: NaiveDate::from_ymd_opt(2027, 1, 1),
        })
        .unwrap();

        let active = db.list_goals(1, Some(GoalStatus::Active)).unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].kind, GoalKind::AccumulateAmount);
        assert_eq!(active[0].remaining(), 3800.0);

        assert!(db.list_goals(1, Some(GoalStatus::Completed)).unwrap().is_empty());
        assert!(db.list_goals(2, None).unwrap().is_empty());
    }
}
