//! Ledger transaction operations
//!
//! The ledger is append-only from the engine's point of view; any write
//! marks the owner's profile dirty so the next read recomputes it.

use chrono::NaiveDate;
use rusqlite::{params, OptionalExtension};

use super::{parse_date, parse_datetime, Database};
use crate::error::{Error, Result};
use crate::models::{NewTransaction, PaymentMethod, Transaction, TransactionKind};

impl Database {
    /// Append a transaction to the ledger (skips duplicates by import hash)
    ///
    /// Generates the installment schedule when `installment_count > 1` and
    /// marks the user's profile dirty. Returns `None` for duplicates.
    pub fn insert_transaction(&self, tx: &NewTransaction) -> Result<Option<i64>> {
        if tx.amount <= 0.0 {
            return Err(Error::InvalidData(format!(
                "Transaction amount must be positive, got {}",
                tx.amount
            )));
        }
        if tx.installment_count < 1 {
            return Err(Error::InvalidData(format!(
                "Installment count must be at least 1, got {}",
                tx.installment_count
            )));
        }

        let conn = self.conn()?;

        if let Some(hash) = &tx.import_hash {
            let existing: Option<i64> = conn
                .query_row(
                    "SELECT id FROM transactions WHERE import_hash = ?",
                    params![hash],
                    |row| row.get(0),
                )
                .optional()?;

            if existing.is_some() {
                return Ok(None); // Duplicate, skip
            }
        }

        conn.execute(
            r#"
            INSERT INTO transactions (user_id, kind, amount, category, payment_method, occurred_on, installment_count, import_hash)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                tx.user_id,
                tx.kind.as_str(),
                tx.amount,
                tx.category,
                tx.payment_method.as_str(),
                tx.occurred_on.to_string(),
                tx.installment_count,
                tx.import_hash,
            ],
        )?;
        let id = conn.last_insert_rowid();
        drop(conn);

        if tx.installment_count > 1 {
            self.generate_installments(id, tx.amount, tx.installment_count, tx.occurred_on)?;
        }

        self.invalidate_profile(tx.user_id)?;

        Ok(Some(id))
    }

    /// Delete a ledger transaction (cascades to its installments)
    pub fn delete_transaction(&self, id: i64) -> Result<bool> {
        let conn = self.conn()?;

        let user_id: Option<i64> = conn
            .query_row(
                "SELECT user_id FROM transactions WHERE id = ?",
                params![id],
                |row| row.get(0),
            )
            .optional()?;

        let Some(user_id) = user_id else {
            return Ok(false);
        };

        conn.execute("DELETE FROM transactions WHERE id = ?", params![id])?;
        drop(conn);

        self.invalidate_profile(user_id)?;
        Ok(true)
    }

    /// List a user's transactions, optionally filtered by kind and date range
    pub fn list_transactions(
        &self,
        user_id: i64,
        kind: Option<TransactionKind>,
        date_range: Option<(NaiveDate, NaiveDate)>,
    ) -> Result<Vec<Transaction>> {
        let conn = self.conn()?;

        let mut conditions = vec!["user_id = ?".to_string()];
        let mut query_params: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(user_id)];

        if let Some(k) = kind {
            conditions.push("kind = ?".to_string());
            query_params.push(Box::new(k.as_str()));
        }

        if let Some((from, to)) = date_range {
            conditions.push("occurred_on >= ? AND occurred_on <= ?".to_string());
            query_params.push(Box::new(from.to_string()));
            query_params.push(Box::new(to.to_string()));
        }

        let sql = format!(
            r#"
            SELECT id, user_id, kind, amount, category, payment_method, occurred_on, installment_count, created_at
            FROM transactions
            WHERE {}
            ORDER BY occurred_on ASC, id ASC
            "#,
            conditions.join(" AND ")
        );

        let params_refs: Vec<&dyn rusqlite::ToSql> =
            query_params.iter().map(|p| p.as_ref()).collect();

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_refs.as_slice(), |row| Self::row_to_transaction(row))?;

        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    /// Most recent transactions for display
    pub fn recent_transactions(&self, user_id: i64, limit: i64) -> Result<Vec<Transaction>> {
        let conn = self.conn()?;

        let mut stmt = conn.prepare(
            r#"
            SELECT id, user_id, kind, amount, category, payment_method, occurred_on, installment_count, created_at
            FROM transactions
            WHERE user_id = ?
            ORDER BY occurred_on DESC, id DESC
            LIMIT ?
            "#,
        )?;
        let rows = stmt.query_map(params![user_id, limit], |row| Self::row_to_transaction(row))?;

        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    /// Date of the user's earliest ledger entry
    pub fn earliest_transaction_date(&self, user_id: i64) -> Result<Option<NaiveDate>> {
        let conn = self.conn()?;

        let date: Option<String> = conn
            .query_row(
                "SELECT MIN(occurred_on) FROM transactions WHERE user_id = ?",
                params![user_id],
                |row| row.get(0),
            )
            .optional()?
            .flatten();

        Ok(date.map(|d| parse_date(&d)))
    }

    /// Sum of amounts in a date range for one kind
    pub fn sum_transactions(
        &self,
        user_id: i64,
        kind: TransactionKind,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<f64> {
        let conn = self.conn()?;

        let total: f64 = conn.query_row(
            r#"
            SELECT COALESCE(SUM(amount), 0)
            FROM transactions
            WHERE user_id = ? AND kind = ? AND occurred_on >= ? AND occurred_on <= ?
            "#,
            params![user_id, kind.as_str(), from.to_string(), to.to_string()],
            |row| row.get(0),
        )?;

        Ok(total)
    }

    /// Sum of expenses in one category over a date range
    pub fn sum_category_expense(
        &self,
        user_id: i64,
        category: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<f64> {
        let conn = self.conn()?;

        let total: f64 = conn.query_row(
            r#"
            SELECT COALESCE(SUM(amount), 0)
            FROM transactions
            WHERE user_id = ? AND kind = 'expense' AND category = ? COLLATE NOCASE
              AND occurred_on >= ? AND occurred_on <= ?
            "#,
            params![user_id, category, from.to_string(), to.to_string()],
            |row| row.get(0),
        )?;

        Ok(total)
    }

    pub(crate) fn row_to_transaction(row: &rusqlite::Row) -> rusqlite::Result<Transaction> {
        let kind_str: String = row.get(2)?;
        let method_str: String = row.get(5)?;
        let date_str: String = row.get(6)?;
        let created_str: String = row.get(8)?;

        Ok(Transaction {
            id: row.get(0)?,
            user_id: row.get(1)?,
            kind: kind_str.parse().unwrap_or(TransactionKind::Expense),
            amount: row.get(3)?,
            category: row.get(4)?,
            payment_method: method_str.parse().unwrap_or(PaymentMethod::Unspecified),
            occurred_on: parse_date(&date_str),
            installment_count: row.get(7)?,
            created_at: parse_datetime(&created_str),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn expense(user_id: i64, amount: f64, date: NaiveDate) -> NewTransaction {
        NewTransaction {
            user_id,
            kind: TransactionKind::Expense,
            amount,
            category: Some("Groceries".to_string()),
            payment_method: PaymentMethod::Debit,
            occurred_on: date,
            installment_count: 1,
            import_hash: None,
        }
    }

    #[test]
    fn test_insert_and_list() {
        let db = Database::in_memory().unwrap();

        db.insert_transaction(&expense(1, 50.0, d(2026, 3, 10))).unwrap();
        db.insert_transaction(&expense(1, 75.0, d(2026, 3, 12))).unwrap();
        db.insert_transaction(&expense(2, 10.0, d(2026, 3, 12))).unwrap();

        let mine = db.list_transactions(1, None, None).unwrap();
        assert_eq!(mine.len(), 2);
        assert_eq!(mine[0].amount, 50.0);
        assert_eq!(mine[0].kind, TransactionKind::Expense);
    }

    #[test]
    fn test_rejects_non_positive_amount() {
        let db = Database::in_memory().unwrap();
        let result = db.insert_transaction(&expense(1, 0.0, d(2026, 3, 10)));
        assert!(matches!(result, Err(Error::InvalidData(_))));
    }

    #[test]
    fn test_import_hash_dedup() {
        let db = Database::in_memory().unwrap();

        let mut tx = expense(1, 50.0, d(2026, 3, 10));
        tx.import_hash = Some("abc123".to_string());

        assert!(db.insert_transaction(&tx).unwrap().is_some());
        assert!(db.insert_transaction(&tx).unwrap().is_none());
        assert_eq!(db.list_transactions(1, None, None).unwrap().len(), 1);
    }

    #[test]
    fn test_insert_generates_installments() {
        let db = Database::in_memory().unwrap();

        let mut tx = expense(1, 1200.0, d(2026, 3, 10));
        tx.payment_method = PaymentMethod::Credit;
        tx.installment_count = 12;
        let id = db.insert_transaction(&tx).unwrap().unwrap();

        let parts = db.installments_for_transaction(id).unwrap();
        assert_eq!(parts.len(), 12);
        assert_eq!(parts[0].due_date, d(2026, 4, 10));
        assert_eq!(parts[11].due_date, d(2027, 3, 10));
        let total: f64 = parts.iter().map(|p| p.amount).sum();
        assert!((total - 1200.0).abs() < 0.001);
    }

    #[test]
    fn test_delete_invalidates_profile() {
        let db = Database::in_memory().unwrap();

        let id = db
            .insert_transaction(&expense(1, 50.0, d(2026, 3, 10)))
            .unwrap()
            .unwrap();

        // Simulate a clean profile, then delete
        let profile = crate::models::FinancialProfile::zero(1);
        db.upsert_profile(&profile).unwrap();
        assert!(db.delete_transaction(id).unwrap());

        let stored = db.get_profile(1).unwrap().unwrap();
        assert!(stored.dirty);
        assert!(db.list_transactions(1, None, None).unwrap().is_empty());
    }

    #[test]
    fn test_sum_and_filters() {
        let db = Database::in_memory().unwrap();

        db.insert_transaction(&expense(1, 50.0, d(2026, 3, 10))).unwrap();
        db.insert_transaction(&expense(1, 30.0, d(2026, 4, 2))).unwrap();
        db.insert_transaction(&NewTransaction {
            kind: TransactionKind::Income,
            amount: 3000.0,
            category: None,
            ..expense(1, 1.0, d(2026, 3, 1))
        })
        .unwrap();

        let march_expense = db
            .sum_transactions(1, TransactionKind::Expense, d(2026, 3, 1), d(2026, 3, 31))
            .unwrap();
        assert_eq!(march_expense, 50.0);

        let groceries = db
            .sum_category_expense(1, "groceries", d(2026, 3, 1), d(2026, 4, 30))
            .unwrap();
        assert_eq!(groceries, 80.0);

        let incomes = db
            .list_transactions(1, Some(TransactionKind::Income), None)
            .unwrap();
        assert_eq!(incomes.len(), 1);
    }
}
