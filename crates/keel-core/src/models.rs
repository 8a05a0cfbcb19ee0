//! Domain models for Keel

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Round a monetary value to 2 decimal places.
///
/// All money in Keel is fixed-point with 2 decimals; this is applied at
/// persistence and reporting boundaries.
pub fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Direction of a ledger entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Income,
    Expense,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Income => "income",
            Self::Expense => "expense",
        }
    }
}

impl std::str::FromStr for TransactionKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "income" => Ok(Self::Income),
            "expense" => Ok(Self::Expense),
            _ => Err(format!("Unknown transaction kind: {}", s)),
        }
    }
}

impl std::fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Payment method used for a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Cash,
    Debit,
    /// Credit card; the only method that defers or splits cash impact
    Credit,
    #[default]
    Unspecified,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cash => "cash",
            Self::Debit => "debit",
            Self::Credit => "credit",
            Self::Unspecified => "unspecified",
        }
    }
}

impl std::str::FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cash" => Ok(Self::Cash),
            "debit" => Ok(Self::Debit),
            "credit" => Ok(Self::Credit),
            "unspecified" | "" => Ok(Self::Unspecified),
            _ => Err(format!("Unknown payment method: {}", s)),
        }
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A ledger transaction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    pub user_id: i64,
    pub kind: TransactionKind,
    /// Always positive; direction comes from `kind`
    pub amount: f64,
    pub category: Option<String>,
    pub payment_method: PaymentMethod,
    pub occurred_on: NaiveDate,
    /// 1 for single payments, >1 when paid in installments
    pub installment_count: i64,
    pub created_at: DateTime<Utc>,
}

/// A new transaction to be appended to the ledger
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub user_id: i64,
    pub kind: TransactionKind,
    pub amount: f64,
    pub category: Option<String>,
    pub payment_method: PaymentMethod,
    pub occurred_on: NaiveDate,
    pub installment_count: i64,
    /// Dedup hash for imported rows (None for manual entries)
    pub import_hash: Option<String>,
}

/// One scheduled part of an installment purchase
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Installment {
    pub id: i64,
    pub transaction_id: i64,
    /// 1-based position in the series
    pub sequence: i64,
    pub total_in_series: i64,
    pub amount: f64,
    pub due_date: NaiveDate,
    pub paid: bool,
}

// ========== Financial Profile ==========

/// Qualitative reliability tier of a profile, driven by history length
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl Confidence {
    /// Confidence is a monotonic function of history length:
    /// <30 days Low, <90 Medium, else High.
    pub fn from_days(days_of_history: i64) -> Self {
        if days_of_history < 30 {
            Self::Low
        } else if days_of_history < 90 {
            Self::Medium
        } else {
            Self::High
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl std::str::FromStr for Confidence {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            _ => Err(format!("Unknown confidence: {}", s)),
        }
    }
}

impl std::fmt::Display for Confidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Smoothed per-user summary of income/expense behavior (derived, cached)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinancialProfile {
    pub user_id: i64,
    /// Exponentially weighted average of elapsed-month income
    pub avg_monthly_income: f64,
    /// Exponentially weighted average of elapsed-month non-installment expense
    pub avg_monthly_expense: f64,
    pub fixed_expense_estimate: f64,
    pub variable_expense_estimate: f64,
    /// Sum of unpaid installments with a future due date
    pub open_installment_total: f64,
    pub open_installment_count: i64,
    pub days_of_history: i64,
    pub months_with_data: i64,
    /// Population standard deviation of the non-installment expense series
    pub expense_volatility: f64,
    pub confidence: Confidence,
    /// Level-triggered invalidation flag; set on any ledger change
    pub dirty: bool,
    pub updated_at: DateTime<Utc>,
}

impl FinancialProfile {
    /// Profile for a user with an empty ledger
    pub fn zero(user_id: i64) -> Self {
        Self {
            user_id,
            avg_monthly_income: 0.0,
            avg_monthly_expense: 0.0,
            fixed_expense_estimate: 0.0,
            variable_expense_estimate: 0.0,
            open_installment_total: 0.0,
            open_installment_count: 0,
            days_of_history: 0,
            months_with_data: 0,
            expense_volatility: 0.0,
            confidence: Confidence::Low,
            dirty: false,
            updated_at: Utc::now(),
        }
    }

    /// Average monthly income minus average monthly expense
    pub fn free_margin(&self) -> f64 {
        self.avg_monthly_income - self.avg_monthly_expense
    }
}

/// Per-month aggregation row persisted during profile recomputation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonthlyAnalysis {
    pub user_id: i64,
    /// First day of the calendar month
    pub month_start: NaiveDate,
    pub income: f64,
    /// Total expense, installment purchases included
    pub expense: f64,
    pub fixed_expense: f64,
    pub variable_expense: f64,
    /// Expense paid in installments (excluded from the smoothing series)
    pub financed_expense: f64,
}

impl MonthlyAnalysis {
    /// Expense excluding installment purchases
    pub fn cash_expense(&self) -> f64 {
        self.expense - self.financed_expense
    }
}

// ========== Health Score ==========

/// Qualitative classification of a health score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoreClassification {
    Excellent,
    Good,
    Fair,
    Poor,
    Critical,
}

impl ScoreClassification {
    pub fn from_score(score: f64) -> Self {
        if score >= 80.0 {
            Self::Excellent
        } else if score >= 60.0 {
            Self::Good
        } else if score >= 40.0 {
            Self::Fair
        } else if score >= 20.0 {
            Self::Poor
        } else {
            Self::Critical
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Excellent => "excellent",
            Self::Good => "good",
            Self::Fair => "fair",
            Self::Poor => "poor",
            Self::Critical => "critical",
        }
    }
}

impl std::str::FromStr for ScoreClassification {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "excellent" => Ok(Self::Excellent),
            "good" => Ok(Self::Good),
            "fair" => Ok(Self::Fair),
            "poor" => Ok(Self::Poor),
            "critical" => Ok(Self::Critical),
            _ => Err(format!("Unknown score classification: {}", s)),
        }
    }
}

impl std::fmt::Display for ScoreClassification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One weighted component of the health score
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreFactor {
    pub name: String,
    /// Share of the total score this factor can contribute
    pub weight: f64,
    /// Normalized factor value in [0, 1]
    pub fraction: f64,
}

impl ScoreFactor {
    pub fn new(name: impl Into<String>, weight: f64, fraction: f64) -> Self {
        Self {
            name: name.into(),
            weight,
            fraction: fraction.clamp(0.0, 1.0),
        }
    }

    /// Points contributed to the final score
    pub fn points(&self) -> f64 {
        self.weight * self.fraction
    }
}

/// Weighted 0-100 financial health score with explainable factors
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthScoreSnapshot {
    pub user_id: i64,
    pub score: f64,
    pub classification: ScoreClassification,
    pub factors: Vec<ScoreFactor>,
    pub updated_at: DateTime<Utc>,
}

// ========== Decisions ==========

/// Spend/no-spend verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Proceed,
    Caution,
    Hold,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Proceed => "proceed",
            Self::Caution => "caution",
            Self::Hold => "hold",
        }
    }
}

impl std::str::FromStr for Verdict {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "proceed" => Ok(Self::Proceed),
            "caution" => Ok(Self::Caution),
            "hold" => Ok(Self::Hold),
            _ => Err(format!("Unknown verdict: {}", s)),
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One independent heuristic vote in the quick-spend evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecisionLayer {
    /// Free-balance arithmetic; an absolute ceiling on the final verdict
    Mathematical,
    /// Month expense vs the mean of preceding months
    Historical,
    /// Expense growth over the last three elapsed months
    Trend,
    /// Current health score
    Behavioral,
}

impl DecisionLayer {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mathematical => "mathematical",
            Self::Historical => "historical",
            Self::Trend => "trend",
            Self::Behavioral => "behavioral",
        }
    }
}

impl std::fmt::Display for DecisionLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single layer's verdict with its rationale
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayerVote {
    pub layer: DecisionLayer,
    pub verdict: Verdict,
    pub rationale: String,
}

/// Informational category-limit annotation; never overrides the verdict
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitAlert {
    pub category: String,
    pub monthly_limit: f64,
    /// Spent this month before the candidate purchase
    pub spent: f64,
    /// Spent this month including the candidate purchase
    pub projected: f64,
}

/// Result of a quick-spend evaluation (transient; only audited, not stored)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionResult {
    pub verdict: Verdict,
    pub amount: f64,
    /// Income minus expenses, commitments and goal reserves this month
    pub free_balance: f64,
    pub layers: Vec<LayerVote>,
    pub limit_alert: Option<LimitAlert>,
    pub goal_impacts: Option<Vec<GoalImpact>>,
}

/// What kind of evaluation an audit row records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionType {
    QuickSpend,
    FullPurchase,
}

impl DecisionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::QuickSpend => "quick_spend",
            Self::FullPurchase => "full_purchase",
        }
    }
}

impl std::str::FromStr for DecisionType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "quick_spend" => Ok(Self::QuickSpend),
            "full_purchase" => Ok(Self::FullPurchase),
            _ => Err(format!("Unknown decision type: {}", s)),
        }
    }
}

/// Append-only observability record for a decision
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: i64,
    pub user_id: i64,
    pub decision_type: DecisionType,
    pub amount: f64,
    /// Final verdict or risk tag
    pub outcome: String,
    pub rationale: String,
    /// Snapshot of the inputs the decision was made from
    pub inputs: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// New audit record before insertion
#[derive(Debug, Clone)]
pub struct NewAuditRecord {
    pub user_id: i64,
    pub decision_type: DecisionType,
    pub amount: f64,
    pub outcome: String,
    pub rationale: String,
    pub inputs: serde_json::Value,
}

// ========== Purchase evaluation (large/installment path) ==========

/// One payment option in a full purchase evaluation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseOption {
    /// 1 = pay at once
    pub installments: i64,
    pub installment_amount: f64,
    /// Monthly margin left after income, average expense, commitments
    /// and this option's installment
    pub monthly_margin: f64,
    pub risk: RiskLevel,
}

/// Comparative at-once vs installments analysis for a large purchase
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseEvaluation {
    pub amount: f64,
    pub free_balance: f64,
    pub options: Vec<PurchaseOption>,
    /// Smallest installment count reaching Low risk, else Medium; None
    /// means postponing is advised
    pub recommended_installments: Option<i64>,
}

// ========== Simulation ==========

/// Risk classification for a projected scenario
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl std::str::FromStr for RiskLevel {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            _ => Err(format!("Unknown risk level: {}", s)),
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What the simulation advises the user to do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    Proceed,
    AdjustInstallments,
    Postpone,
    ReduceAmount,
}

impl Recommendation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Proceed => "proceed",
            Self::AdjustInstallments => "adjust_installments",
            Self::Postpone => "postpone",
            Self::ReduceAmount => "reduce_amount",
        }
    }
}

impl std::str::FromStr for Recommendation {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "proceed" => Ok(Self::Proceed),
            "adjust_installments" => Ok(Self::AdjustInstallments),
            "postpone" => Ok(Self::Postpone),
            "reduce_amount" => Ok(Self::ReduceAmount),
            _ => Err(format!("Unknown recommendation: {}", s)),
        }
    }
}

impl std::fmt::Display for Recommendation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One projected month in a simulation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonthlyProjection {
    /// First day of the projected month
    pub month: NaiveDate,
    pub income: f64,
    pub expense: f64,
    /// Unpaid installments from prior purchases due this month
    pub commitments: f64,
    /// Share of the candidate purchase landing this month
    pub purchase_impact: f64,
    pub balance_without_purchase: f64,
    pub balance_with_purchase: f64,
}

/// An alternative installment count explored by the simulator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstallmentScenario {
    pub installments: i64,
    pub monthly_amount: f64,
    /// Worst projected balance across the horizon
    pub min_balance: f64,
    pub risk: RiskLevel,
}

/// Inputs for a cash-flow simulation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationRequest {
    pub description: String,
    pub amount: f64,
    pub payment_method: PaymentMethod,
    pub installment_count: i64,
    pub card_id: Option<i64>,
    /// Defaults to today when absent
    pub planned_date: Option<NaiveDate>,
}

/// A persisted 12-month cash-flow simulation (immutable after creation)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Simulation {
    pub id: i64,
    pub user_id: i64,
    pub description: String,
    pub amount: f64,
    pub payment_method: PaymentMethod,
    pub installment_count: i64,
    pub planned_date: NaiveDate,
    pub months: Vec<MonthlyProjection>,
    pub min_balance: f64,
    pub risk: RiskLevel,
    pub recommendation: Recommendation,
    pub alternatives: Vec<InstallmentScenario>,
    /// Alternative count with the best minimum balance, when it beats the
    /// requested one
    pub suggested_installments: Option<i64>,
    pub created_at: DateTime<Utc>,
}

// ========== Goals ==========

/// What kind of target a goal tracks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalKind {
    /// Save up to a target amount by a deadline
    AccumulateAmount,
    /// Bring recurring spending down by a target amount
    ReduceSpending,
    /// Keep a fixed amount reserved every month
    MonthlyReserve,
}

impl GoalKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AccumulateAmount => "accumulate_amount",
            Self::ReduceSpending => "reduce_spending",
            Self::MonthlyReserve => "monthly_reserve",
        }
    }
}

impl std::str::FromStr for GoalKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "accumulate_amount" => Ok(Self::AccumulateAmount),
            "reduce_spending" => Ok(Self::ReduceSpending),
            "monthly_reserve" => Ok(Self::MonthlyReserve),
            _ => Err(format!("Unknown goal kind: {}", s)),
        }
    }
}

impl std::fmt::Display for GoalKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Goal lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GoalStatus {
    Active,
    Completed,
    Abandoned,
}

impl GoalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Abandoned => "abandoned",
        }
    }
}

impl std::str::FromStr for GoalStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(Self::Active),
            "completed" => Ok(Self::Completed),
            "abandoned" => Ok(Self::Abandoned),
            _ => Err(format!("Unknown goal status: {}", s)),
        }
    }
}

/// A savings/reduction goal (owned externally; read-only to the engine)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Goal {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub kind: GoalKind,
    pub target_amount: f64,
    pub current_amount: f64,
    /// Fixed amount set aside each month (MonthlyReserve goals)
    pub monthly_reserve: f64,
    pub deadline: Option<NaiveDate>,
    pub status: GoalStatus,
    pub created_at: DateTime<Utc>,
}

impl Goal {
    pub fn remaining(&self) -> f64 {
        (self.target_amount - self.current_amount).max(0.0)
    }

    pub fn is_met(&self) -> bool {
        self.current_amount >= self.target_amount
    }
}

/// A new goal before insertion
#[derive(Debug, Clone)]
pub struct NewGoal {
    pub user_id: i64,
    pub name: String,
    pub kind: GoalKind,
    pub target_amount: f64,
    pub current_amount: f64,
    pub monthly_reserve: f64,
    pub deadline: Option<NaiveDate>,
}

/// Estimated effect of a candidate purchase on one goal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoalImpact {
    pub goal_id: i64,
    pub goal_name: String,
    pub kind: GoalKind,
    /// Whole months the goal would be pushed back (never negative)
    pub delay_months: i64,
    /// Monthly contribution needed before the purchase
    pub required_before: f64,
    /// Monthly contribution needed after absorbing the purchase
    pub required_after: f64,
    /// MonthlyReserve only: the purchase exceeds the monthly free margin
    pub reserve_exceeded: bool,
}

// ========== Categories & limits ==========

/// A spending category
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// A per-user monthly spending limit for one category
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryLimit {
    pub id: i64,
    pub user_id: i64,
    pub category: String,
    pub monthly_limit: f64,
}

/// Per-user settings consumed by the decision engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSettings {
    pub user_id: i64,
    /// Self-declared monthly income; effective income is
    /// max(declared, profile average)
    pub declared_monthly_income: f64,
}
