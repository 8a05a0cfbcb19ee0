//! CSV ledger import
//!
//! Format: `date,kind,amount,category,payment_method,installments` with a
//! header row. Category and payment method may be empty; installments
//! defaults to 1. Rows are deduplicated by a content hash so re-importing
//! the same file is a no-op.

use chrono::NaiveDate;
use csv::ReaderBuilder;
use sha2::{Digest, Sha256};
use std::io::Read;
use tracing::debug;

use crate::db::Database;
use crate::error::{Error, Result};
use crate::models::{NewTransaction, PaymentMethod, TransactionKind};

/// Result counts for one import run
#[derive(Debug, Clone, Copy, Default)]
pub struct ImportStats {
    pub imported: usize,
    pub skipped: usize,
}

/// Generate a unique hash for deduplication
fn generate_hash(
    user_id: i64,
    date: &NaiveDate,
    kind: TransactionKind,
    amount: f64,
    category: Option<&str>,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(user_id.to_be_bytes());
    hasher.update(date.to_string().as_bytes());
    hasher.update(kind.as_str().as_bytes());
    hasher.update(amount.to_be_bytes());
    hasher.update(category.unwrap_or("").as_bytes());
    hex::encode(hasher.finalize())
}

/// Parse ledger CSV data into new transactions
pub fn parse_csv<R: Read>(reader: R, user_id: i64) -> Result<Vec<NewTransaction>> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut transactions = Vec::new();

    for (index, record) in rdr.records().enumerate() {
        let record = record?;
        let line = index + 2; // 1-based, after the header

        let date_str = record
            .get(0)
            .ok_or_else(|| Error::Import(format!("Line {}: missing date", line)))?;
        let date = NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
            .map_err(|_| Error::Import(format!("Line {}: invalid date '{}'", line, date_str)))?;

        let kind: TransactionKind = record
            .get(1)
            .unwrap_or("")
            .parse()
            .map_err(|e| Error::Import(format!("Line {}: {}", line, e)))?;

        let amount: f64 = record
            .get(2)
            .unwrap_or("")
            .parse()
            .map_err(|_| Error::Import(format!("Line {}: invalid amount", line)))?;
        if amount <= 0.0 {
            return Err(Error::Import(format!(
                "Line {}: amount must be positive",
                line
            )));
        }

        let category = record
            .get(3)
            .filter(|c| !c.is_empty())
            .map(|c| c.to_string());

        let payment_method: PaymentMethod = record
            .get(4)
            .unwrap_or("")
            .parse()
            .map_err(|e| Error::Import(format!("Line {}: {}", line, e)))?;

        let installment_count: i64 = match record.get(5).filter(|v| !v.is_empty()) {
            Some(raw) => raw
                .parse()
                .map_err(|_| Error::Import(format!("Line {}: invalid installment count", line)))?,
            None => 1,
        };

        let import_hash = generate_hash(user_id, &date, kind, amount, category.as_deref());

        transactions.push(NewTransaction {
            user_id,
            kind,
            amount,
            category,
            payment_method,
            occurred_on: date,
            installment_count,
            import_hash: Some(import_hash),
        });
    }

    debug!(count = transactions.len(), "Parsed ledger CSV");
    Ok(transactions)
}

/// Parse and insert a ledger CSV for one user
pub fn import_ledger<R: Read>(db: &Database, user_id: i64, reader: R) -> Result<ImportStats> {
    let transactions = parse_csv(reader, user_id)?;
    let mut stats = ImportStats::default();

    for tx in &transactions {
        match db.insert_transaction(tx)? {
            Some(_) => stats.imported += 1,
            None => stats.skipped += 1,
        }
    }

    debug!(
        user_id,
        imported = stats.imported,
        skipped = stats.skipped,
        "Ledger import complete"
    );
    Ok(stats)
}
