use thiserror::Error;

/// Invalid run configuration.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Unsupported rolling period: {0} (expected one of 30, 90, 180, 270, 365)")]
    UnsupportedRollingPeriod(u32),

    #[error("Weight for {factor} is negative: {value}")]
    NegativeWeight { factor: &'static str, value: f64 },

    #[error("Historical peak threshold must be in (0, 1], got {0}")]
    InvalidThreshold(f64),

    #[error("{name} must be positive, got {value}")]
    NonPositive { name: &'static str, value: f64 },

    #[error("Invalid DTE window: {min}..={max}")]
    InvalidDteWindow { min: i64, max: i64 },

    #[error("Invalid value for {key}: {value:?}")]
    InvalidValue { key: String, value: String },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisError {
    #[error("No price history for {0}")]
    EmptyHistory(String),
}

/// Failure scoring a single option. The option is logged and excluded.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScoringError {
    #[error("Composite score for {option} is not finite: {value}")]
    NonFiniteScore { option: String, value: f64 },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PortfolioError {
    #[error("Option {option} has a non-positive strike: {strike}")]
    InvalidStrike { option: String, strike: f64 },

    #[error("Option {0} has no bid")]
    MissingBid(String),
}

#[derive(Error, Debug)]
pub enum DataError {
    #[error("Missing required data: {0}")]
    MissingRequiredData(&'static str),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
