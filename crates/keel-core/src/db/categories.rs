//! Category lookup/creation and per-category monthly limits

use rusqlite::{params, OptionalExtension};

use super::{parse_datetime, Database};
use crate::error::Result;
use crate::models::{Category, CategoryLimit};

impl Database {
    /// Look up a category by name, creating it if missing
    pub fn ensure_category(&self, name: &str) -> Result<Category> {
        let conn = self.conn()?;

        conn.execute(
            "INSERT OR IGNORE INTO categories (name) VALUES (?)",
            params![name],
        )?;

        let category = conn.query_row(
            "SELECT id, name, created_at FROM categories WHERE name = ? COLLATE NOCASE",
            params![name],
            |row| {
                let created: String = row.get(2)?;
                Ok(Category {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    created_at: parse_datetime(&created),
                })
            },
        )?;

        Ok(category)
    }

    /// List all known categories
    pub fn list_categories(&self) -> Result<Vec<Category>> {
        let conn = self.conn()?;

        let mut stmt =
            conn.prepare("SELECT id, name, created_at FROM categories ORDER BY name ASC")?;
        let rows = stmt.query_map([], |row| {
            let created: String = row.get(2)?;
            Ok(Category {
                id: row.get(0)?,
                name: row.get(1)?,
                created_at: parse_datetime(&created),
            })
        })?;

        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    /// Set (or replace) a user's monthly limit for a category
    pub fn set_category_limit(&self, user_id: i64, category: &str, monthly_limit: f64) -> Result<()> {
        let conn = self.conn()?;

        conn.execute(
            r#"
            INSERT INTO category_limits (user_id, category, monthly_limit)
            VALUES (?, ?, ?)
            ON CONFLICT(user_id, category) DO UPDATE SET monthly_limit = excluded.monthly_limit
            "#,
            params![user_id, category, monthly_limit],
        )?;

        Ok(())
    }

    /// A user's monthly limit for one category, if any
    pub fn category_limit(&self, user_id: i64, category: &str) -> Result<Option<f64>> {
        let conn = self.conn()?;

        let limit: Option<f64> = conn
            .query_row(
                "SELECT monthly_limit FROM category_limits WHERE user_id = ? AND category = ? COLLATE NOCASE",
                params![user_id, category],
                |row| row.get(0),
            )
            .optional()?;

        Ok(limit)
    }

    /// All limits configured by a user
    pub fn list_category_limits(&self, user_id: i64) -> Result<Vec<CategoryLimit>> {
        let conn = self.conn()?;

        let mut stmt = conn.prepare(
            r#"
            SELECT id, user_id, category, monthly_limit
            FROM category_limits
            WHERE user_id = ?
            ORDER BY category ASC
            "#,
        )?;
        let rows = stmt.query_map(params![user_id], |row| {
            Ok(CategoryLimit {
                id: row.get(0)?,
                user_id: row.get(1)?,
                category: row.get(2)?,
                monthly_limit: row.get(3)?,
            })
        })?;

        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }
}
