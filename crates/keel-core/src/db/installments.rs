//! Installment schedule operations
//!
//! Rows are generated by the ledger when a purchase has more than one
//! installment; the engine only reads them.

use chrono::NaiveDate;
use rusqlite::params;

use super::{parse_date, Database};
use crate::dates::add_months;
use crate::error::Result;
use crate::models::{round_cents, Installment};

impl Database {
    /// Generate the installment schedule for a purchase
    ///
    /// Amounts are split evenly with the rounding remainder absorbed by the
    /// last installment; due dates start one month after the purchase and
    /// recur monthly.
    pub(crate) fn generate_installments(
        &self,
        transaction_id: i64,
        amount: f64,
        count: i64,
        purchased_on: NaiveDate,
    ) -> Result<()> {
        let conn = self.conn()?;

        let per = round_cents(amount / count as f64);
        let last = round_cents(amount - per * (count - 1) as f64);

        for seq in 1..=count {
            let part = if seq == count { last } else { per };
            let due = add_months(purchased_on, seq);

            conn.execute(
                r#"
                INSERT INTO installments (transaction_id, sequence, total_in_series, amount, due_date, paid)
                VALUES (?, ?, ?, ?, ?, 0)
                "#,
                params![transaction_id, seq, count, part, due.to_string()],
            )?;
        }

        Ok(())
    }

    /// All installments of one purchase, in sequence order
    pub fn installments_for_transaction(&self, transaction_id: i64) -> Result<Vec<Installment>> {
        let conn = self.conn()?;

        let mut stmt = conn.prepare(
            r#"
            SELECT id, transaction_id, sequence, total_in_series, amount, due_date, paid
            FROM installments
            WHERE transaction_id = ?
            ORDER BY sequence ASC
            "#,
        )?;
        let rows = stmt.query_map(params![transaction_id], |row| Self::row_to_installment(row))?;

        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    /// Sum and count of a user's unpaid installments due strictly after `after`
    pub fn open_installments(&self, user_id: i64, after: NaiveDate) -> Result<(f64, i64)> {
        let conn = self.conn()?;

        let (total, count): (f64, i64) = conn.query_row(
            r#"
            SELECT COALESCE(SUM(i.amount), 0), COUNT(i.id)
            FROM installments i
            JOIN transactions t ON t.id = i.transaction_id
            WHERE t.user_id = ? AND i.paid = 0 AND i.due_date > ?
            "#,
            params![user_id, after.to_string()],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        Ok((total, count))
    }

    /// Sum of a user's unpaid installments due within [from, to]
    pub fn installments_due_between(
        &self,
        user_id: i64,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<f64> {
        let conn = self.conn()?;

        let total: f64 = conn.query_row(
            r#"
            SELECT COALESCE(SUM(i.amount), 0)
            FROM installments i
            JOIN transactions t ON t.id = i.transaction_id
            WHERE t.user_id = ? AND i.paid = 0 AND i.due_date >= ? AND i.due_date <= ?
            "#,
            params![user_id, from.to_string(), to.to_string()],
            |row| row.get(0),
        )?;

        Ok(total)
    }

    /// Mark an installment as paid (ledger-side bookkeeping)
    pub fn mark_installment_paid(&self, id: i64) -> Result<bool> {
        let conn = self.conn()?;
        let updated = conn.execute("UPDATE installments SET paid = 1 WHERE id = ?", params![id])?;
        Ok(updated > 0)
    }

    fn row_to_installment(row: &rusqlite::Row) -> rusqlite::Result<Installment> {
        let due_str: String = row.get(5)?;
        let paid: i64 = row.get(6)?;

        Ok(Installment {
            id: row.get(0)?,
            transaction_id: row.get(1)?,
            sequence: row.get(2)?,
            total_in_series: row.get(3)?,
            amount: row.get(4)?,
            due_date: parse_date(&due_str),
            paid: paid != 0,
        })
    }
}
