//! Engine configuration
//!
//! Tunable thresholds for the profile, score, decision and simulation
//! components. Config is loaded with a two-layer resolution:
//! 1. Check for an override file in the data dir
//!    (~/.local/share/keel/config/engine.toml)
//! 2. Fall back to compiled-in defaults
//!
//! Every field has a default, so an override file only needs the keys it
//! changes.

use std::fs;
use std::path::PathBuf;

use serde::Deserialize;

use crate::error::{Error, Result};

/// Thresholds and tunables for the decision & forecasting engine
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// EWMA smoothing factor for monthly income/expense averages
    pub smoothing_alpha: f64,

    /// Minimum divisor (days) when extrapolating a partial month, so one
    /// early large expense cannot explode the projection
    pub partial_month_floor_days: i64,

    /// Fast path applies below this share of effective income
    pub fast_path_income_ratio: f64,
    /// ...and below this share of the month's free balance
    pub fast_path_balance_ratio: f64,

    /// Quick verdict turns Caution above this share of free balance
    pub caution_balance_ratio: f64,
    /// ...or when the remaining daily budget drops below this share of the
    /// daily income budget
    pub caution_daily_budget_ratio: f64,

    /// Open installment debt is measured against income times this
    /// multiplier in the credit-usage score factor
    pub credit_income_multiplier: f64,

    /// Monthly margin at or above this share of income is Low risk
    pub low_risk_margin_ratio: f64,
    /// ...at or above this share is Medium risk; below is High
    pub medium_risk_margin_ratio: f64,

    /// Installment counts explored by the full evaluation and the simulator
    pub installment_options: Vec<i64>,

    /// Categories treated as fixed expenses in the profile split
    pub fixed_categories: Vec<String>,

    /// Bucket for transactions with an unknown category
    pub fallback_category: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            smoothing_alpha: 0.3,
            partial_month_floor_days: 7,
            fast_path_income_ratio: 0.05,
            fast_path_balance_ratio: 0.15,
            caution_balance_ratio: 0.30,
            caution_daily_budget_ratio: 0.20,
            credit_income_multiplier: 12.0,
            low_risk_margin_ratio: 0.20,
            medium_risk_margin_ratio: 0.05,
            installment_options: vec![2, 3, 4, 6, 8, 10, 12],
            fixed_categories: vec![
                "Housing".to_string(),
                "Rent".to_string(),
                "Utilities".to_string(),
                "Insurance".to_string(),
                "Internet".to_string(),
                "Phone".to_string(),
                "Education".to_string(),
                "Subscriptions".to_string(),
            ],
            fallback_category: "Other".to_string(),
        }
    }
}

impl EngineConfig {
    /// Load config, applying the data-dir override file when present
    pub fn load() -> Self {
        match Self::override_path() {
            Some(path) if path.exists() => match Self::from_file(&path) {
                Ok(config) => {
                    tracing::debug!(path = %path.display(), "Loaded engine config override");
                    config
                }
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "Failed to parse engine config override, using defaults"
                    );
                    Self::default()
                }
            },
            _ => Self::default(),
        }
    }

    /// Parse a config file
    pub fn from_file(path: &PathBuf) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    /// Parse a TOML string
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| Error::Config(e.to_string()))
    }

    /// Location of the override file (~/.local/share/keel/config/engine.toml)
    pub fn override_path() -> Option<PathBuf> {
        dirs::data_dir().map(|d| d.join("keel").join("config").join("engine.toml"))
    }

    /// Resolve a raw category name to the canonical one, applying the
    /// unknown-category fallback for empty names.
    pub fn canonical_category(&self, category: Option<&str>) -> String {
        match category {
            Some(name) if !name.trim().is_empty() => name.trim().to_string(),
            _ => self.fallback_category.clone(),
        }
    }

    /// Whether a category counts as a fixed expense
    pub fn is_fixed_category(&self, category: &str) -> bool {
        self.fixed_categories
            .iter()
            .any(|c| c.eq_ignore_ascii_case(category))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.smoothing_alpha, 0.3);
        assert_eq!(config.partial_month_floor_days, 7);
        assert_eq!(config.installment_options, vec![2, 3, 4, 6, 8, 10, 12]);
    }

    #[test]
    fn test_partial_override() {
        let config = EngineConfig::from_toml("smoothing_alpha = 0.5\n").unwrap();
        assert_eq!(config.smoothing_alpha, 0.5);
        // Untouched keys keep their defaults
        assert_eq!(config.fast_path_income_ratio, 0.05);
        assert_eq!(config.fallback_category, "Other");
    }

    #[test]
    fn test_invalid_toml_rejected() {
        assert!(EngineConfig::from_toml("smoothing_alpha = [").is_err());
    }

    #[test]
    fn test_fixed_category_match_is_case_insensitive() {
        let config = EngineConfig::default();
        assert!(config.is_fixed_category("rent"));
        assert!(config.is_fixed_category("RENT"));
        assert!(!config.is_fixed_category("Dining"));
    }

    #[test]
    fn test_canonical_category_fallback() {
        let config = EngineConfig::default();
        assert_eq!(config.canonical_category(Some("Groceries")), "Groceries");
        assert_eq!(config.canonical_category(Some("  ")), "Other");
        assert_eq!(config.canonical_category(None), "Other");
    }
}
