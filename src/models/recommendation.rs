use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::support::PatternType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataStatus {
    Available,
    Unavailable,
}

impl fmt::Display for DataStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataStatus::Available => write!(f, "available"),
            DataStatus::Unavailable => write!(f, "unavailable"),
        }
    }
}

/// One factor's contribution to the composite score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreComponent {
    pub raw: Option<f64>,
    pub normalized: f64,
    pub weighted: f64,
    pub has_data: bool,
    pub data_status: DataStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreBreakdown {
    pub support_strength: ScoreComponent,
    pub days_since_break: ScoreComponent,
    pub recovery_advantage: ScoreComponent,
    pub historical_peak: ScoreComponent,
    pub monthly_seasonality: ScoreComponent,
    pub current_performance: ScoreComponent,
}

impl ScoreBreakdown {
    pub fn components(&self) -> [&ScoreComponent; 6] {
        [
            &self.support_strength,
            &self.days_since_break,
            &self.recovery_advantage,
            &self.historical_peak,
            &self.monthly_seasonality,
            &self.current_performance,
        ]
    }

    pub fn composite(&self) -> f64 {
        self.components().iter().map(|c| c.weighted).sum()
    }

    pub fn available_factors(&self) -> usize {
        self.components().iter().filter(|c| c.has_data).count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoreGrade {
    Strong,
    Moderate,
    Weak,
}

impl ScoreGrade {
    pub fn from_score(score: f64) -> Self {
        if score >= 70.0 {
            ScoreGrade::Strong
        } else if score >= 50.0 {
            ScoreGrade::Moderate
        } else {
            ScoreGrade::Weak
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ScoreGrade::Strong => "strong",
            ScoreGrade::Moderate => "moderate",
            ScoreGrade::Weak => "weak",
        }
    }
}

impl fmt::Display for ScoreGrade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A scored option ready for presentation. `rank` is assigned after sorting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendedOption {
    pub rank: usize,
    pub option_name: String,
    pub stock_name: String,
    pub strike_price: f64,
    pub current_price: Option<f64>,
    pub expiry_date: NaiveDate,
    pub days_to_expiry: i64,
    pub premium: f64,

    // Support context
    pub rolling_low: Option<f64>,
    pub distance_to_support_pct: Option<f64>,
    pub days_since_last_break: Option<i64>,
    pub support_strength_score: f64,
    pub pattern_type: PatternType,

    // Probability context
    pub current_probability: f64,
    pub historical_peak_probability: Option<f64>,
    pub recovery_advantage: Option<f64>,
    pub current_prob_bin: String,
    pub dte_bin: String,

    // Seasonality context
    pub monthly_positive_rate: Option<f64>,
    pub monthly_avg_return: Option<f64>,
    pub typical_low_day: Option<u32>,
    pub current_month_performance: Option<f64>,
    pub months_in_historical_data: Option<usize>,
    pub worst_month_drawdown: Option<f64>,

    pub composite_score: f64,
    pub score_grade: ScoreGrade,
    pub score_breakdown: ScoreBreakdown,
}
