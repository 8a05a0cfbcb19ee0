//! Database access layer with connection pooling and migrations
//!
//! This module is organized by domain:
//! - `transactions` - The append-only ledger and its filters
//! - `installments` - Installment schedules generated from credit purchases
//! - `categories` - Category lookup/creation and per-category limits
//! - `goals` - Savings and reduction goals
//! - `profiles` - Derived financial profiles, monthly analysis, user settings
//! - `scores` - Health score snapshot cache
//! - `simulations` - Persisted cash-flow simulations
//! - `audit` - Append-only decision audit log

use chrono::{DateTime, NaiveDate, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;

use crate::error::Result;

mod audit;
mod categories;
mod goals;
mod installments;
mod profiles;
mod scores;
mod simulations;
mod transactions;

pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConn = PooledConnection<SqliteConnectionManager>;

/// Parse a SQLite datetime string into a DateTime<Utc>
pub(crate) fn parse_datetime(s: &str) -> DateTime<Utc> {
    // SQLite stores as "YYYY-MM-DD HH:MM:SS" format
    chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .map(|dt| dt.and_utc())
        .unwrap_or_else(|_| Utc::now())
}

/// Parse a SQLite date string into a NaiveDate
pub(crate) fn parse_date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap_or_default()
}

/// Database wrapper with connection pooling
#[derive(Clone)]
pub struct Database {
    pool: DbPool,
    /// Path to the database file
    db_path: String,
}

impl Database {
    /// Open (or create) a database at the given path
    pub fn open(path: &str) -> Result<Self> {
        // Foreign keys are per-connection in SQLite, so every pooled
        // connection enables them on checkout
        let manager = SqliteConnectionManager::file(path).with_init(|conn| {
            conn.execute_batch("PRAGMA foreign_keys = ON;")?;
            Ok(())
        });
        let pool = Pool::builder().max_size(10).build(manager)?;

        let db = Self {
            pool,
            db_path: path.to_string(),
        };
        db.run_migrations()?;

        Ok(db)
    }

    /// Get the path to the database file
    pub fn path(&self) -> &str {
        &self.db_path
    }

    /// Create a throwaway database (for testing)
    ///
    /// Note: Uses a temporary file rather than `:memory:` because pooled
    /// connections each see their own private in-memory database.
    pub fn in_memory() -> Result<Self> {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(0);

        let id = COUNTER.fetch_add(1, Ordering::SeqCst);
        let path = format!(
            "{}/keel_test_{}_{}.db",
            std::env::temp_dir().display(),
            std::process::id(),
            id
        );

        // Remove any existing file
        let _ = std::fs::remove_file(&path);

        Self::open(&path)
    }

    /// Get a connection from the pool
    pub fn conn(&self) -> Result<DbConn> {
        Ok(self.pool.get()?)
    }

    /// Run database migrations
    fn run_migrations(&self) -> Result<()> {
        let conn = self.conn()?;

        conn.execute_batch(
            r#"
            -- Enable foreign keys
            PRAGMA foreign_keys = ON;

            -- WAL mode: better concurrency, readers don't block writers
            PRAGMA journal_mode = WAL;

            -- Cache size: ~8MB (2000 pages * 4KB default page size)
            PRAGMA cache_size = 2000;

            -- Synchronous NORMAL: good balance of safety and performance
            PRAGMA synchronous = NORMAL;

            -- Store temp tables in memory (faster for complex queries)
            PRAGMA temp_store = MEMORY;

            -- Per-user settings consumed by the decision engine
            CREATE TABLE IF NOT EXISTS user_settings (
                user_id INTEGER PRIMARY KEY,
                declared_monthly_income REAL NOT NULL DEFAULT 0
            );

            -- Categories (lookup/create by name)
            CREATE TABLE IF NOT EXISTS categories (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL UNIQUE,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            -- Per-user monthly spending limits by category
            CREATE TABLE IF NOT EXISTS category_limits (
                id INTEGER PRIMARY KEY,
                user_id INTEGER NOT NULL,
                category TEXT NOT NULL,
                monthly_limit REAL NOT NULL,
                UNIQUE(user_id, category)
            );

            -- The transaction ledger
            CREATE TABLE IF NOT EXISTS transactions (
                id INTEGER PRIMARY KEY,
                user_id INTEGER NOT NULL,
                kind TEXT NOT NULL,
                amount REAL NOT NULL CHECK (amount > 0),
                category TEXT,
                payment_method TEXT NOT NULL DEFAULT 'unspecified',
                occurred_on DATE NOT NULL,
                installment_count INTEGER NOT NULL DEFAULT 1,
                import_hash TEXT UNIQUE,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX IF NOT EXISTS idx_transactions_user_date
                ON transactions(user_id, occurred_on);

            -- Installment schedule rows for installment purchases
            CREATE TABLE IF NOT EXISTS installments (
                id INTEGER PRIMARY KEY,
                transaction_id INTEGER NOT NULL REFERENCES transactions(id) ON DELETE CASCADE,
                sequence INTEGER NOT NULL,
                total_in_series INTEGER NOT NULL,
                amount REAL NOT NULL,
                due_date DATE NOT NULL,
                paid INTEGER NOT NULL DEFAULT 0
            );

            CREATE INDEX IF NOT EXISTS idx_installments_due ON installments(due_date);
            CREATE INDEX IF NOT EXISTS idx_installments_tx ON installments(transaction_id);

            -- Derived financial profile, one row per user
            CREATE TABLE IF NOT EXISTS financial_profiles (
                user_id INTEGER PRIMARY KEY,
                avg_monthly_income REAL NOT NULL,
                avg_monthly_expense REAL NOT NULL,
                fixed_expense_estimate REAL NOT NULL,
                variable_expense_estimate REAL NOT NULL,
                open_installment_total REAL NOT NULL,
                open_installment_count INTEGER NOT NULL,
                days_of_history INTEGER NOT NULL,
                months_with_data INTEGER NOT NULL,
                expense_volatility REAL NOT NULL,
                confidence TEXT NOT NULL,
                dirty INTEGER NOT NULL DEFAULT 0,
                updated_at DATETIME NOT NULL
            );

            -- One analysis row per user per calendar month
            CREATE TABLE IF NOT EXISTS monthly_analysis (
                user_id INTEGER NOT NULL,
                month_start DATE NOT NULL,
                income REAL NOT NULL,
                expense REAL NOT NULL,
                fixed_expense REAL NOT NULL,
                variable_expense REAL NOT NULL,
                financed_expense REAL NOT NULL,
                updated_at DATETIME NOT NULL,
                PRIMARY KEY (user_id, month_start)
            );

            -- Health score snapshot cache (factors stored as JSON)
            CREATE TABLE IF NOT EXISTS health_scores (
                user_id INTEGER PRIMARY KEY,
                score REAL NOT NULL,
                classification TEXT NOT NULL,
                factors TEXT NOT NULL,
                updated_at DATETIME NOT NULL
            );

            -- Persisted simulations (immutable after insert)
            CREATE TABLE IF NOT EXISTS simulations (
                id INTEGER PRIMARY KEY,
                user_id INTEGER NOT NULL,
                description TEXT NOT NULL,
                amount REAL NOT NULL,
                payment_method TEXT NOT NULL,
                installment_count INTEGER NOT NULL,
                planned_date DATE NOT NULL,
                months TEXT NOT NULL,
                min_balance REAL NOT NULL,
                risk TEXT NOT NULL,
                recommendation TEXT NOT NULL,
                alternatives TEXT NOT NULL,
                suggested_installments INTEGER,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX IF NOT EXISTS idx_simulations_user
                ON simulations(user_id, created_at);

            -- Append-only decision audit log
            CREATE TABLE IF NOT EXISTS audit_log (
                id INTEGER PRIMARY KEY,
                user_id INTEGER NOT NULL,
                decision_type TEXT NOT NULL,
                amount REAL NOT NULL,
                outcome TEXT NOT NULL,
                rationale TEXT NOT NULL,
                inputs TEXT NOT NULL,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX IF NOT EXISTS idx_audit_user ON audit_log(user_id, created_at);

            -- Savings/reduction goals
            CREATE TABLE IF NOT EXISTS goals (
                id INTEGER PRIMARY KEY,
                user_id INTEGER NOT NULL,
                name TEXT NOT NULL,
                kind TEXT NOT NULL,
                target_amount REAL NOT NULL,
                current_amount REAL NOT NULL DEFAULT 0,
                monthly_reserve REAL NOT NULL DEFAULT 0,
                deadline DATE,
                status TEXT NOT NULL DEFAULT 'active',
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX IF NOT EXISTS idx_goals_user ON goals(user_id, status);
            "#,
        )?;

        Ok(())
    }
}
