use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which probability-of-worthless estimate to read from an option row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProbabilityMethod {
    #[serde(rename = "ProbWorthless_Bayesian_IsoCal")]
    BayesianCalibrated,
    #[serde(rename = "1_2_3_ProbOfWorthless_Weighted")]
    WeightedAverage,
    #[serde(rename = "1_ProbOfWorthless_Original")]
    OriginalBlackScholes,
    #[serde(rename = "2_ProbOfWorthless_Calibrated")]
    BiasCorrected,
    #[serde(rename = "3_ProbOfWorthless_Historical_IV")]
    HistoricalIv,
}

impl ProbabilityMethod {
    pub const ALL: [ProbabilityMethod; 5] = [
        ProbabilityMethod::BayesianCalibrated,
        ProbabilityMethod::WeightedAverage,
        ProbabilityMethod::OriginalBlackScholes,
        ProbabilityMethod::BiasCorrected,
        ProbabilityMethod::HistoricalIv,
    ];

    /// Column name in the option and probability-history files.
    pub fn field_name(&self) -> &'static str {
        match self {
            ProbabilityMethod::BayesianCalibrated => "ProbWorthless_Bayesian_IsoCal",
            ProbabilityMethod::WeightedAverage => "1_2_3_ProbOfWorthless_Weighted",
            ProbabilityMethod::OriginalBlackScholes => "1_ProbOfWorthless_Original",
            ProbabilityMethod::BiasCorrected => "2_ProbOfWorthless_Calibrated",
            ProbabilityMethod::HistoricalIv => "3_ProbOfWorthless_Historical_IV",
        }
    }

    /// Label used by the recovery report's `ProbMethod` column.
    pub fn recovery_label(&self) -> &'static str {
        match self {
            ProbabilityMethod::BayesianCalibrated => "Bayesian Calibrated",
            ProbabilityMethod::WeightedAverage => "Weighted Average",
            ProbabilityMethod::OriginalBlackScholes => "Original Black-Scholes",
            ProbabilityMethod::BiasCorrected => "Bias Corrected",
            ProbabilityMethod::HistoricalIv => "Historical IV",
        }
    }

    pub fn from_field_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.field_name() == name.trim())
    }

    pub fn from_recovery_label(label: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|m| m.recovery_label() == label.trim())
    }
}

impl fmt::Display for ProbabilityMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.recovery_label())
    }
}

/// The five probability-of-worthless estimates carried by an option row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ProbabilitySet {
    pub bayesian_calibrated: Option<f64>,
    pub weighted_average: Option<f64>,
    pub original_black_scholes: Option<f64>,
    pub bias_corrected: Option<f64>,
    pub historical_iv: Option<f64>,
}

impl ProbabilitySet {
    pub fn get(&self, method: ProbabilityMethod) -> Option<f64> {
        match method {
            ProbabilityMethod::BayesianCalibrated => self.bayesian_calibrated,
            ProbabilityMethod::WeightedAverage => self.weighted_average,
            ProbabilityMethod::OriginalBlackScholes => self.original_black_scholes,
            ProbabilityMethod::BiasCorrected => self.bias_corrected,
            ProbabilityMethod::HistoricalIv => self.historical_iv,
        }
    }

    pub fn set(&mut self, method: ProbabilityMethod, value: Option<f64>) {
        let slot = match method {
            ProbabilityMethod::BayesianCalibrated => &mut self.bayesian_calibrated,
            ProbabilityMethod::WeightedAverage => &mut self.weighted_average,
            ProbabilityMethod::OriginalBlackScholes => &mut self.original_black_scholes,
            ProbabilityMethod::BiasCorrected => &mut self.bias_corrected,
            ProbabilityMethod::HistoricalIv => &mut self.historical_iv,
        };
        *slot = value;
    }
}

/// One put option row as delivered by the options file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionRecord {
    pub option_name: String,
    pub stock_name: String,
    pub strike_price: f64,
    pub expiry_date: NaiveDate,
    pub premium: f64,
    pub bid: Option<f64>,
    pub ask: Option<f64>,
    pub probabilities: ProbabilitySet,
    pub potential_loss: Option<f64>,
}

impl OptionRecord {
    pub fn probability(&self, method: ProbabilityMethod) -> Option<f64> {
        self.probabilities.get(method)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_names_round_trip() {
        for m in ProbabilityMethod::ALL {
            assert_eq!(ProbabilityMethod::from_field_name(m.field_name()), Some(m));
            assert_eq!(ProbabilityMethod::from_recovery_label(m.recovery_label()), Some(m));
        }
        assert_eq!(ProbabilityMethod::from_field_name("nope"), None);
    }

    #[test]
    fn method_serializes_as_column_name() {
        let json = serde_json::to_string(&ProbabilityMethod::WeightedAverage).unwrap();
        assert_eq!(json, "\"1_2_3_ProbOfWorthless_Weighted\"");
    }
}
