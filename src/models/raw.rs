//! Loosely typed input rows as they come off disk. Numeric fields that did
//! not parse are `None`; the lookup builders decide what to skip.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::option::ProbabilitySet;

/// One line of the recovery report.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecoveryRow {
    /// `scenario` for aggregated rows, `stock` for per-stock rows.
    pub data_type: String,
    pub stock: String,
    pub historical_peak_threshold: Option<f64>,
    /// Method label, e.g. "Bayesian Calibrated".
    pub prob_method: String,
    pub current_prob_bin: String,
    pub dte_bin: String,
    pub worthless_rate_pct: Option<f64>,
    pub candidate_n: Option<u64>,
    pub baseline_n: Option<u64>,
}

impl RecoveryRow {
    /// Aggregated rows only; per-stock rows are left out of the lookup.
    pub fn is_aggregated(&self) -> bool {
        self.data_type.trim() == "scenario" || self.stock.trim().is_empty()
    }
}

/// One (stock, year, month) line of the monthly returns file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MonthlyReturnRow {
    pub name: String,
    pub year: Option<i32>,
    pub month: u32,
    pub pct_return_month: Option<f64>,
    pub day_low_day_of_month: Option<u32>,
    pub pct_open_to_low: Option<f64>,
}

/// A daily snapshot of an option's probability estimates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProbabilityHistoryRow {
    pub option_name: String,
    pub update_date: Option<NaiveDate>,
    pub probabilities: ProbabilitySet,
}
