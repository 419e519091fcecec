use chrono::{NaiveDate, Utc};
use chrono_tz::Europe::Stockholm;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::core::day_count::DayCountKind;
use crate::error::ConfigError;
use crate::models::{ProbabilityMethod, ROLLING_PERIODS};
use crate::scoring::weights::{Factor, ScoreWeights};

/// Filters applied before scoring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationFilters {
    /// Only score options expiring on this date. `None` scores every expiry.
    pub expiry_date: Option<NaiveDate>,
    pub rolling_period: u32,
    pub min_days_since_break: i64,
    pub probability_method: ProbabilityMethod,
    pub historical_peak_threshold: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioSettings {
    pub target_premium: f64,
    pub underlying_value: f64,
    pub transaction_cost: f64,
    /// Keep strikes at or below the lowest close of the last N days.
    pub strike_below_period: Option<i64>,
    pub expiry_date: Option<NaiveDate>,
    /// Minimum probability of worthless in percent (e.g. 80 = 0.80).
    pub min_probability_pct: Option<f64>,
    pub probability_method: ProbabilityMethod,
    pub currency: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestSettings {
    pub min_dte: i64,
    pub max_dte: i64,
    pub day_count: DayCountKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // Data
    pub data_dir: String,
    pub output_dir: String,
    pub use_precomputed_support: bool,

    // Run date used for DTE, seasonality month and month-to-date performance
    pub as_of: NaiveDate,

    // Support analysis
    pub rolling_periods: Vec<u32>,
    pub max_gap_days: i64,
    pub analysis_workers: usize,

    // Scoring
    pub filters: RecommendationFilters,
    pub weights: ScoreWeights,

    // Portfolio
    pub portfolio: PortfolioSettings,

    // Backtest
    pub backtest: BacktestSettings,

    // Logging
    pub log_level: String,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Unset or blank keys take their default;
    /// a value that does not parse is an error.
    pub fn from_vars<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars(lookup);
        let defaults = ScoreWeights::default();

        let rolling_periods = match vars.get("ROLLING_PERIODS") {
            Some(v) => v
                .split(',')
                .map(|p| {
                    p.trim().parse::<u32>().map_err(|_| ConfigError::InvalidValue {
                        key: "ROLLING_PERIODS".into(),
                        value: v.clone(),
                    })
                })
                .collect::<Result<Vec<u32>, _>>()?,
            None => ROLLING_PERIODS.to_vec(),
        };

        let workers = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);

        let day_count = match vars.get("BACKTEST_DAY_COUNT") {
            Some(v) => DayCountKind::parse(&v).ok_or(ConfigError::InvalidValue {
                key: "BACKTEST_DAY_COUNT".into(),
                value: v,
            })?,
            None => DayCountKind::FiveSevenths,
        };

        Ok(Config {
            data_dir: vars.string("DATA_DIR", "data"),
            output_dir: vars.string("OUTPUT_DIR", "output"),
            use_precomputed_support: vars.flag("USE_PRECOMPUTED_SUPPORT", false)?,
            as_of: vars.date("AS_OF_DATE")?.unwrap_or_else(market_today),
            rolling_periods,
            max_gap_days: vars.parse("MAX_GAP_DAYS", 30)?,
            analysis_workers: vars.parse("ANALYSIS_WORKERS", workers)?,
            filters: RecommendationFilters {
                expiry_date: vars.date("EXPIRY_DATE")?,
                rolling_period: vars.parse("ROLLING_PERIOD", 365)?,
                min_days_since_break: vars.parse("MIN_DAYS_SINCE_BREAK", 10)?,
                probability_method: vars.method("PROBABILITY_METHOD")?,
                historical_peak_threshold: vars.parse("HISTORICAL_PEAK_THRESHOLD", 0.90)?,
            },
            weights: ScoreWeights {
                support_strength: vars
                    .parse("WEIGHT_SUPPORT_STRENGTH", defaults.support_strength)?,
                days_since_break: vars
                    .parse("WEIGHT_DAYS_SINCE_BREAK", defaults.days_since_break)?,
                recovery_advantage: vars
                    .parse("WEIGHT_RECOVERY_ADVANTAGE", defaults.recovery_advantage)?,
                historical_peak: vars.parse("WEIGHT_HISTORICAL_PEAK", defaults.historical_peak)?,
                monthly_seasonality: vars
                    .parse("WEIGHT_MONTHLY_SEASONALITY", defaults.monthly_seasonality)?,
                current_performance: vars
                    .parse("WEIGHT_CURRENT_PERFORMANCE", defaults.current_performance)?,
            },
            portfolio: PortfolioSettings {
                target_premium: vars.parse("TARGET_PREMIUM", 500.0)?,
                underlying_value: vars.parse("UNDERLYING_VALUE", 100_000.0)?,
                transaction_cost: vars.parse("TRANSACTION_COST", 99.0)?,
                strike_below_period: vars.parse_opt("STRIKE_BELOW_PERIOD")?,
                expiry_date: vars.date("PORTFOLIO_EXPIRY_DATE")?,
                min_probability_pct: vars.parse_opt("MIN_PROBABILITY_PCT")?,
                probability_method: vars.method("PORTFOLIO_PROBABILITY_METHOD")?,
                currency: vars.string("CURRENCY", "SEK"),
            },
            backtest: BacktestSettings {
                min_dte: vars.parse("BACKTEST_MIN_DTE", 1)?,
                max_dte: vars.parse("BACKTEST_MAX_DTE", 45)?,
                day_count,
            },
            log_level: vars.string("LOG_LEVEL", "info"),
        })
    }

    /// Reject settings no stage can work with. All-zero weights are allowed
    /// and only warned about by the scoring engine.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for &period in self
            .rolling_periods
            .iter()
            .chain(std::iter::once(&self.filters.rolling_period))
        {
            if !ROLLING_PERIODS.contains(&period) {
                return Err(ConfigError::UnsupportedRollingPeriod(period));
            }
        }

        for factor in Factor::ALL {
            let value = self.weights.get(factor);
            if value < 0.0 || !value.is_finite() {
                return Err(ConfigError::NegativeWeight {
                    factor: factor.as_str(),
                    value,
                });
            }
        }

        let threshold = self.filters.historical_peak_threshold;
        if !(threshold > 0.0 && threshold <= 1.0) {
            return Err(ConfigError::InvalidThreshold(threshold));
        }

        if self.portfolio.target_premium <= 0.0 {
            return Err(ConfigError::NonPositive {
                name: "target_premium",
                value: self.portfolio.target_premium,
            });
        }
        if self.portfolio.underlying_value <= 0.0 {
            return Err(ConfigError::NonPositive {
                name: "underlying_value",
                value: self.portfolio.underlying_value,
            });
        }
        if self.max_gap_days <= 0 {
            return Err(ConfigError::NonPositive {
                name: "max_gap_days",
                value: self.max_gap_days as f64,
            });
        }

        if self.backtest.min_dte > self.backtest.max_dte {
            return Err(ConfigError::InvalidDteWindow {
                min: self.backtest.min_dte,
                max: self.backtest.max_dte,
            });
        }

        Ok(())
    }
}

/// Typed access to a key lookup.
struct Vars<F>(F);

impl<F: Fn(&str) -> Option<String>> Vars<F> {
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn string(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| default.to_string())
    }

    fn parse_opt<T: FromStr>(&self, key: &str) -> Result<Option<T>, ConfigError> {
        match self.get(key) {
            Some(v) => v.parse().map(Some).map_err(|_| ConfigError::InvalidValue {
                key: key.to_string(),
                value: v,
            }),
            None => Ok(None),
        }
    }

    fn parse<T: FromStr>(&self, key: &str, default: T) -> Result<T, ConfigError> {
        Ok(self.parse_opt(key)?.unwrap_or(default))
    }

    fn date(&self, key: &str) -> Result<Option<NaiveDate>, ConfigError> {
        match self.get(key) {
            Some(v) => NaiveDate::parse_from_str(&v, "%Y-%m-%d")
                .map(Some)
                .map_err(|_| ConfigError::InvalidValue {
                    key: key.to_string(),
                    value: v,
                }),
            None => Ok(None),
        }
    }

    fn flag(&self, key: &str, default: bool) -> Result<bool, ConfigError> {
        match self.get(key).map(|v| v.to_lowercase()) {
            Some(v) if v == "true" || v == "1" => Ok(true),
            Some(v) if v == "false" || v == "0" => Ok(false),
            Some(v) => Err(ConfigError::InvalidValue {
                key: key.to_string(),
                value: v,
            }),
            None => Ok(default),
        }
    }

    fn method(&self, key: &str) -> Result<ProbabilityMethod, ConfigError> {
        match self.get(key) {
            Some(v) => ProbabilityMethod::from_field_name(&v).ok_or(ConfigError::InvalidValue {
                key: key.to_string(),
                value: v,
            }),
            None => Ok(ProbabilityMethod::BayesianCalibrated),
        }
    }
}

/// Today's date on the Stockholm exchange.
pub fn market_today() -> NaiveDate {
    Utc::now().with_timezone(&Stockholm).date_naive()
}
