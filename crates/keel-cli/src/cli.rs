//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI
//! arguments. The actual command implementations are in the `commands`
//! module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Keel - Spend decisions and cash-flow forecasts from your ledger
#[derive(Parser)]
#[command(name = "keel")]
#[command(about = "Personal finance decision & forecasting assistant", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Database path
    #[arg(long, default_value = "keel.db", global = true)]
    pub db: PathBuf,

    /// User to operate on
    #[arg(short, long, default_value = "1", global = true)]
    pub user: i64,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the database
    Init,

    /// Show database status
    Status,

    /// Record an income entry
    AddIncome {
        /// Amount received
        amount: f64,

        /// Date (YYYY-MM-DD, defaults to today)
        #[arg(short, long)]
        date: Option<String>,

        /// Category name
        #[arg(short, long)]
        category: Option<String>,
    },

    /// Record an expense entry
    AddExpense {
        /// Amount spent
        amount: f64,

        /// Date (YYYY-MM-DD, defaults to today)
        #[arg(short, long)]
        date: Option<String>,

        /// Category name
        #[arg(short, long)]
        category: Option<String>,

        /// Payment method: cash, debit, credit
        #[arg(short, long, default_value = "unspecified")]
        method: String,

        /// Number of installments (credit purchases)
        #[arg(short, long, default_value = "1")]
        installments: i64,
    },

    /// Import ledger rows from CSV
    Import {
        /// CSV file to import
        #[arg(short, long)]
        file: PathBuf,
    },

    /// List recent transactions
    Transactions {
        /// Maximum rows to show
        #[arg(short, long, default_value = "20")]
        limit: i64,
    },

    /// Show the financial profile
    Profile,

    /// Show the health score and its factors
    Score,

    /// Check whether a spend is safe right now
    Check {
        /// Candidate amount
        amount: f64,

        /// What the money is for
        #[arg(short, long)]
        description: Option<String>,

        /// Category (for limit checks)
        #[arg(short, long)]
        category: Option<String>,
    },

    /// Analyze a large purchase: at once vs installments
    Purchase {
        /// Purchase amount
        amount: f64,

        /// What is being bought
        #[arg(short, long, default_value = "purchase")]
        description: String,

        /// Payment method: cash, debit, credit
        #[arg(short, long)]
        method: Option<String>,

        /// Requested installment count
        #[arg(short, long, default_value = "1")]
        installments: i64,
    },

    /// Simulate 12 months of cash flow around a purchase
    Simulate {
        /// Purchase amount
        amount: f64,

        /// What is being bought
        #[arg(short, long, default_value = "purchase")]
        description: String,

        /// Payment method: cash, debit, credit
        #[arg(short, long, default_value = "credit")]
        method: String,

        /// Installment count
        #[arg(short, long, default_value = "1")]
        installments: i64,

        /// Planned purchase date (YYYY-MM-DD, defaults to today)
        #[arg(long)]
        date: Option<String>,
    },

    /// List past simulations
    Simulations,

    /// Manage goals (list, add)
    Goals {
        #[command(subcommand)]
        action: Option<GoalsAction>,
    },

    /// Manage category limits (list, set)
    Limits {
        #[command(subcommand)]
        action: Option<LimitsAction>,
    },

    /// Set the declared monthly income
    SetIncome {
        /// Declared monthly income
        amount: f64,
    },

    /// Show recent decision audit entries
    Audit {
        /// Maximum rows to show
        #[arg(short, long, default_value = "20")]
        limit: i64,
    },
}

#[derive(Subcommand)]
pub enum GoalsAction {
    /// Add a goal
    Add {
        /// Goal name
        name: String,

        /// Goal kind: accumulate_amount, reduce_spending, monthly_reserve
        #[arg(short, long, default_value = "accumulate_amount")]
        kind: String,

        /// Target amount
        #[arg(short, long, default_value = "0")]
        target: f64,

        /// Amount already saved
        #[arg(long, default_value = "0")]
        current: f64,

        /// Monthly reserve (monthly_reserve goals)
        #[arg(short, long, default_value = "0")]
        reserve: f64,

        /// Deadline (YYYY-MM-DD)
        #[arg(long)]
        deadline: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum LimitsAction {
    /// Set a monthly limit for a category
    Set {
        /// Category name
        category: String,

        /// Monthly limit
        amount: f64,
    },
}
