use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Rolling windows (calendar days) the support analysis is run for.
pub const ROLLING_PERIODS: [u32; 5] = [30, 90, 180, 270, 365];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StabilityTrend {
    Improving,
    Stable,
    Weakening,
}

impl fmt::Display for StabilityTrend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl StabilityTrend {
    pub fn as_str(&self) -> &'static str {
        match self {
            StabilityTrend::Improving => "improving",
            StabilityTrend::Stable => "stable",
            StabilityTrend::Weakening => "weakening",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "improving" => Some(StabilityTrend::Improving),
            "stable" => Some(StabilityTrend::Stable),
            "weakening" => Some(StabilityTrend::Weakening),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternType {
    NeverBreaks,
    ExhaustedCascade,
    ShallowBreaker,
    Volatile,
    Stable,
    PredictableCycles,
}

impl fmt::Display for PatternType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl PatternType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PatternType::NeverBreaks => "never_breaks",
            PatternType::ExhaustedCascade => "exhausted_cascade",
            PatternType::ShallowBreaker => "shallow_breaker",
            PatternType::Volatile => "volatile",
            PatternType::Stable => "stable",
            PatternType::PredictableCycles => "predictable_cycles",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "never_breaks" => Some(PatternType::NeverBreaks),
            "exhausted_cascade" => Some(PatternType::ExhaustedCascade),
            "shallow_breaker" => Some(PatternType::ShallowBreaker),
            "volatile" => Some(PatternType::Volatile),
            "stable" => Some(PatternType::Stable),
            "predictable_cycles" => Some(PatternType::PredictableCycles),
            _ => None,
        }
    }
}

/// A day on which the rolling low moved down.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakEvent {
    pub date: NaiveDate,
    pub previous_support: f64,
    pub new_support: f64,
    /// Negative percentage move of the rolling low.
    pub drop_pct: f64,
    /// Calendar days since the previous break; `None` for the first one.
    pub days_since_previous: Option<i64>,
}

/// A maximal run of breaks whose adjacent gaps stay within the max gap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakCluster {
    pub id: usize,
    pub num_breaks: usize,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub duration_days: i64,
    pub avg_gap: Option<f64>,
    pub min_gap: Option<i64>,
    pub max_gap: Option<i64>,
    pub total_drop: f64,
    pub avg_drop: f64,
    pub median_drop: f64,
    pub breaks: Vec<BreakEvent>,
}

/// Rolling low on one bar, for charting.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RollingLowPoint {
    pub date: NaiveDate,
    pub close: f64,
    pub low: f64,
    pub rolling_low: Option<f64>,
}

/// Full break history for one stock and window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupportBreakdown {
    pub stock_name: String,
    pub rolling_period: u32,
    pub rolling_lows: Vec<RollingLowPoint>,
    pub breaks: Vec<BreakEvent>,
    pub clusters: Vec<BreakCluster>,
}

/// Support behaviour summary for one (stock, rolling period).
///
/// Field names follow the columns of the support metrics file so that a
/// precomputed table and a freshly analyzed one serialize identically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupportMetric {
    pub stock_name: String,
    pub rolling_period: u32,
    pub current_price: Option<f64>,
    pub rolling_low: Option<f64>,
    pub distance_to_support_pct: Option<f64>,

    // Breaks
    pub total_breaks: usize,
    pub days_since_last_break: Option<i64>,
    pub last_break_date: Option<NaiveDate>,

    // Stability
    pub support_stability_pct: f64,
    pub stability_trend: StabilityTrend,

    // Drop statistics
    pub median_drop_per_break_pct: Option<f64>,
    pub avg_drop_per_break_pct: Option<f64>,
    pub max_drop_pct: Option<f64>,
    pub drop_std_dev_pct: f64,

    // Break frequency
    pub avg_days_between_breaks: Option<f64>,
    pub median_days_between_breaks: Option<f64>,
    pub trading_days_per_break: f64,

    // Clusters
    pub num_clusters: usize,
    pub max_consecutive_breaks: usize,
    pub current_consecutive_breaks: usize,

    // Derived
    pub support_strength_score: f64,
    pub pattern_type: PatternType,
    pub break_probability_30d: f64,
    pub break_probability_60d: f64,

    pub data_through_date: Option<NaiveDate>,
}

/// Immutable lookup of support metrics by (stock, rolling period).
#[derive(Debug, Clone, Default)]
pub struct SupportMetrics {
    metrics: HashMap<(String, u32), SupportMetric>,
}

impl SupportMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, metric: SupportMetric) {
        self.metrics
            .insert((metric.stock_name.clone(), metric.rolling_period), metric);
    }

    pub fn get(&self, stock: &str, period: u32) -> Option<&SupportMetric> {
        self.metrics.get(&(stock.to_string(), period))
    }

    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    /// Whether any stock has a metric for `period`.
    pub fn has_period(&self, period: u32) -> bool {
        self.metrics.keys().any(|(_, p)| *p == period)
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }

    /// Metrics sorted by stock then period.
    pub fn sorted(&self) -> Vec<&SupportMetric> {
        let mut all: Vec<&SupportMetric> = self.metrics.values().collect();
        all.sort_by(|a, b| {
            a.stock_name
                .cmp(&b.stock_name)
                .then(a.rolling_period.cmp(&b.rolling_period))
        });
        all
    }
}

impl FromIterator<SupportMetric> for SupportMetrics {
    fn from_iter<I: IntoIterator<Item = SupportMetric>>(iter: I) -> Self {
        let mut out = SupportMetrics::new();
        for metric in iter {
            out.insert(metric);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enums_use_wire_names() {
        assert_eq!(
            serde_json::to_string(&PatternType::ExhaustedCascade).unwrap(),
            "\"exhausted_cascade\""
        );
        assert_eq!(
            serde_json::to_string(&StabilityTrend::Weakening).unwrap(),
            "\"weakening\""
        );
        assert_eq!(PatternType::parse("predictable_cycles"), Some(PatternType::PredictableCycles));
        assert_eq!(StabilityTrend::parse("sideways"), None);
    }
}
