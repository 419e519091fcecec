use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Factor {
    SupportStrength,
    DaysSinceBreak,
    RecoveryAdvantage,
    HistoricalPeak,
    MonthlySeasonality,
    CurrentPerformance,
}

impl Factor {
    pub const ALL: [Factor; 6] = [
        Factor::SupportStrength,
        Factor::DaysSinceBreak,
        Factor::RecoveryAdvantage,
        Factor::HistoricalPeak,
        Factor::MonthlySeasonality,
        Factor::CurrentPerformance,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Factor::SupportStrength => "supportStrength",
            Factor::DaysSinceBreak => "daysSinceBreak",
            Factor::RecoveryAdvantage => "recoveryAdvantage",
            Factor::HistoricalPeak => "historicalPeak",
            Factor::MonthlySeasonality => "monthlySeasonality",
            Factor::CurrentPerformance => "currentPerformance",
        }
    }
}

impl fmt::Display for Factor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Relative importance of the six factors. Any non-negative values are
/// accepted; `normalize` scales them to sum to 100.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreWeights {
    pub support_strength: f64,
    pub days_since_break: f64,
    pub recovery_advantage: f64,
    pub historical_peak: f64,
    pub monthly_seasonality: f64,
    pub current_performance: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            support_strength: 20.0,
            days_since_break: 15.0,
            recovery_advantage: 25.0,
            historical_peak: 15.0,
            monthly_seasonality: 15.0,
            current_performance: 10.0,
        }
    }
}

impl ScoreWeights {
    pub fn get(&self, factor: Factor) -> f64 {
        match factor {
            Factor::SupportStrength => self.support_strength,
            Factor::DaysSinceBreak => self.days_since_break,
            Factor::RecoveryAdvantage => self.recovery_advantage,
            Factor::HistoricalPeak => self.historical_peak,
            Factor::MonthlySeasonality => self.monthly_seasonality,
            Factor::CurrentPerformance => self.current_performance,
        }
    }

    pub fn sum(&self) -> f64 {
        Factor::ALL.iter().map(|f| self.get(*f)).sum()
    }

    /// All weights zero. Composite scores will all be 0.
    pub fn is_degenerate(&self) -> bool {
        self.sum() == 0.0
    }

    /// Scale to sum to 100. A zero-sum vector is returned unchanged.
    pub fn normalize(&self) -> ScoreWeights {
        let total = self.sum();
        if total == 0.0 {
            return *self;
        }
        let scale = |w: f64| w / total * 100.0;
        ScoreWeights {
            support_strength: scale(self.support_strength),
            days_since_break: scale(self.days_since_break),
            recovery_advantage: scale(self.recovery_advantage),
            historical_peak: scale(self.historical_peak),
            monthly_seasonality: scale(self.monthly_seasonality),
            current_performance: scale(self.current_performance),
        }
    }
}
