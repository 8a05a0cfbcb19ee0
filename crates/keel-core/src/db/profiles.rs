//! Derived financial profile, monthly analysis rows and user settings

use chrono::NaiveDate;
use rusqlite::{params, OptionalExtension};

use super::{parse_date, parse_datetime, Database};
use crate::error::Result;
use crate::models::{Confidence, FinancialProfile, MonthlyAnalysis, UserSettings};

impl Database {
    /// Fetch the cached profile for a user, if one has been computed
    pub fn get_profile(&self, user_id: i64) -> Result<Option<FinancialProfile>> {
        let conn = self.conn()?;

        let profile = conn
            .query_row(
                r#"
                SELECT user_id, avg_monthly_income, avg_monthly_expense, fixed_expense_estimate,
                       variable_expense_estimate, open_installment_total, open_installment_count,
                       days_of_history, months_with_data, expense_volatility, confidence, dirty, updated_at
                FROM financial_profiles
                WHERE user_id = ?
                "#,
                params![user_id],
                |row| {
                    let confidence_str: String = row.get(10)?;
                    let dirty: i64 = row.get(11)?;
                    let updated: String = row.get(12)?;
                    Ok(FinancialProfile {
                        user_id: row.get(0)?,
                        avg_monthly_income: row.get(1)?,
                        avg_monthly_expense: row.get(2)?,
                        fixed_expense_estimate: row.get(3)?,
                        variable_expense_estimate: row.get(4)?,
                        open_installment_total: row.get(5)?,
                        open_installment_count: row.get(6)?,
                        days_of_history: row.get(7)?,
                        months_with_data: row.get(8)?,
                        expense_volatility: row.get(9)?,
                        confidence: confidence_str.parse().unwrap_or(Confidence::Low),
                        dirty: dirty != 0,
                        updated_at: parse_datetime(&updated),
                    })
                },
            )
            .optional()?;

        Ok(profile)
    }

    /// Write a freshly computed profile (replaces any previous snapshot)
    pub fn upsert_profile(&self, profile: &FinancialProfile) -> Result<()> {
        let conn = self.conn()?;

        conn.execute(
            r#"
            INSERT INTO financial_profiles (
                user_id, avg_monthly_income, avg_monthly_expense, fixed_expense_estimate,
                variable_expense_estimate, open_installment_total, open_installment_count,
                days_of_history, months_with_data, expense_volatility, confidence, dirty, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(user_id) DO UPDATE SET
                avg_monthly_income = excluded.avg_monthly_income,
                avg_monthly_expense = excluded.avg_monthly_expense,
                fixed_expense_estimate = excluded.fixed_expense_estimate,
                variable_expense_estimate = excluded.variable_expense_estimate,
                open_installment_total = excluded.open_installment_total,
                open_installment_count = excluded.open_installment_count,
                days_of_history = excluded.days_of_history,
                months_with_data = excluded.months_with_data,
                expense_volatility = excluded.expense_volatility,
                confidence = excluded.confidence,
                dirty = excluded.dirty,
                updated_at = excluded.updated_at
            "#,
            params![
                profile.user_id,
                profile.avg_monthly_income,
                profile.avg_monthly_expense,
                profile.fixed_expense_estimate,
                profile.variable_expense_estimate,
                profile.open_installment_total,
                profile.open_installment_count,
                profile.days_of_history,
                profile.months_with_data,
                profile.expense_volatility,
                profile.confidence.as_str(),
                profile.dirty as i64,
                profile.updated_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            ],
        )?;

        Ok(())
    }

    /// Mark a user's profile stale so the next read recomputes it
    ///
    /// Level-triggered and idempotent: setting the flag twice is the same as
    /// setting it once, and a user without a profile is a no-op.
    pub fn invalidate_profile(&self, user_id: i64) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE financial_profiles SET dirty = 1 WHERE user_id = ?",
            params![user_id],
        )?;
        Ok(())
    }

    /// Upsert one per-month analysis row
    pub fn upsert_monthly_analysis(&self, row: &MonthlyAnalysis) -> Result<()> {
        let conn = self.conn()?;

        conn.execute(
            r#"
            INSERT INTO monthly_analysis (
                user_id, month_start, income, expense, fixed_expense, variable_expense,
                financed_expense, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, datetime('now'))
            ON CONFLICT(user_id, month_start) DO UPDATE SET
                income = excluded.income,
                expense = excluded.expense,
                fixed_expense = excluded.fixed_expense,
                variable_expense = excluded.variable_expense,
                financed_expense = excluded.financed_expense,
                updated_at = excluded.updated_at
            "#,
            params![
                row.user_id,
                row.month_start.to_string(),
                row.income,
                row.expense,
                row.fixed_expense,
                row.variable_expense,
                row.financed_expense,
            ],
        )?;

        Ok(())
    }

    /// Analysis rows for months strictly before `before`, newest first
    pub fn monthly_analysis_before(
        &self,
        user_id: i64,
        before: NaiveDate,
        limit: i64,
    ) -> Result<Vec<MonthlyAnalysis>> {
        let conn = self.conn()?;

        let mut stmt = conn.prepare(
            r#"
            SELECT user_id, month_start, income, expense, fixed_expense, variable_expense, financed_expense
            FROM monthly_analysis
            WHERE user_id = ? AND month_start < ?
            ORDER BY month_start DESC
            LIMIT ?
            "#,
        )?;
        let rows = stmt.query_map(params![user_id, before.to_string(), limit], |row| {
            Self::row_to_monthly_analysis(row)
        })?;

        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    /// All analysis rows for a user, oldest first
    pub fn list_monthly_analysis(&self, user_id: i64) -> Result<Vec<MonthlyAnalysis>> {
        let conn = self.conn()?;

        let mut stmt = conn.prepare(
            r#"
            SELECT user_id, month_start, income, expense, fixed_expense, variable_expense, financed_expense
            FROM monthly_analysis
            WHERE user_id = ?
            ORDER BY month_start ASC
            "#,
        )?;
        let rows = stmt.query_map(params![user_id], |row| Self::row_to_monthly_analysis(row))?;

        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    /// Per-user settings; defaults when the user has never configured any
    pub fn user_settings(&self, user_id: i64) -> Result<UserSettings> {
        let conn = self.conn()?;

        let settings = conn
            .query_row(
                "SELECT user_id, declared_monthly_income FROM user_settings WHERE user_id = ?",
                params![user_id],
                |row| {
                    Ok(UserSettings {
                        user_id: row.get(0)?,
                        declared_monthly_income: row.get(1)?,
                    })
                },
            )
            .optional()?;

        Ok(settings.unwrap_or(UserSettings {
            user_id,
            declared_monthly_income: 0.0,
        }))
    }

    /// Set a user's self-declared monthly income
    pub fn set_declared_income(&self, user_id: i64, amount: f64) -> Result<()> {
        let conn = self.conn()?;

        conn.execute(
            r#"
            INSERT INTO user_settings (user_id, declared_monthly_income)
            VALUES (?, ?)
            ON CONFLICT(user_id) DO UPDATE SET
                declared_monthly_income = excluded.declared_monthly_income
            "#,
            params![user_id, amount],
        )?;

        Ok(())
    }

    fn row_to_monthly_analysis(row: &rusqlite::Row) -> rusqlite::Result<MonthlyAnalysis> {
        let month_str: String = row.get(1)?;

        Ok(MonthlyAnalysis {
            user_id: row.get(0)?,
            month_start: parse_date(&month_str),
            income: row.get(2)?,
            expense: row.get(3)?,
            fixed_expense: row.get(4)?,
            variable_expense: row.get(5)?,
            financed_expense: row.get(6)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FinancialProfile;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn analysis(month_start: NaiveDate, income: f64, expense: f64) -> MonthlyAnalysis {
        MonthlyAnalysis {
            user_id: 1,
            month_start,
            income,
            expense,
            fixed_expense: 0.0,
            variable_expense: expense,
            financed_expense: 0.0,
        }
    }

    #[test]
    fn test_profile_round_trip() {
        let db = Database::in_memory().unwrap();

        let mut profile = FinancialProfile::zero(1);
        profile.avg_monthly_income = 3000.0;
        profile.avg_monthly_expense = 2000.0;
        profile.confidence = Confidence::High;
        db.upsert_profile(&profile).unwrap();

        let stored = db.get_profile(1).unwrap().unwrap();
        assert_eq!(stored.avg_monthly_income, 3000.0);
        assert_eq!(stored.confidence, Confidence::High);
        assert!(!stored.dirty);
    }

    #[test]
    fn test_invalidate_is_idempotent() {
        let db = Database::in_memory().unwrap();

        // No profile yet: no-op, not an error
        db.invalidate_profile(1).unwrap();

        db.upsert_profile(&FinancialProfile::zero(1)).unwrap();
        db.invalidate_profile(1).unwrap();
        db.invalidate_profile(1).unwrap();

        assert!(db.get_profile(1).unwrap().unwrap().dirty);
    }

    #[test]
    fn test_monthly_analysis_windows() {
        let db = Database::in_memory().unwrap();

        db.upsert_monthly_analysis(&analysis(d(2026, 1, 1), 3000.0, 1000.0)).unwrap();
        db.upsert_monthly_analysis(&analysis(d(2026, 2, 1), 3000.0, 1100.0)).unwrap();
        db.upsert_monthly_analysis(&analysis(d(2026, 3, 1), 3000.0, 1050.0)).unwrap();
        // Re-upsert replaces, not duplicates
        db.upsert_monthly_analysis(&analysis(d(2026, 3, 1), 3000.0, 1075.0)).unwrap();

        let all = db.list_monthly_analysis(1).unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[2].expense, 1075.0);

        let before_march = db.monthly_analysis_before(1, d(2026, 3, 1), 6).unwrap();
        assert_eq!(before_march.len(), 2);
        // Newest first
        assert_eq!(before_march[0].month_start, d(2026, 2, 1));
    }

    #[test]
    fn test_user_settings_default_and_set() {
        let db = Database::in_memory().unwrap();

        assert_eq!(db.user_settings(1).unwrap().declared_monthly_income, 0.0);
        db.set_declared_income(1, 3500.0).unwrap();
        assert_eq!(db.user_settings(1).unwrap().declared_monthly_income, 3500.0);
    }
}
