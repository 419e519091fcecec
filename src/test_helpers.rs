use chrono::{Duration, NaiveDate};

use crate::config::{BacktestSettings, Config, PortfolioSettings, RecommendationFilters};
use crate::core::day_count::DayCountKind;
use crate::models::{
    BreakEvent, MonthlyReturnRow, OptionRecord, PatternType, PriceBar, PriceSeries,
    ProbabilityMethod, ProbabilitySet, RecoveryRow, StabilityTrend, SupportMetric,
    ROLLING_PERIODS,
};
use crate::scoring::weights::ScoreWeights;

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// One bar per calendar day from `start`, with open = high = low = close.
pub fn make_bars(start: NaiveDate, closes: &[f64]) -> PriceSeries {
    let bars = closes
        .iter()
        .enumerate()
        .map(|(i, &c)| PriceBar {
            date: start + Duration::days(i as i64),
            open: c,
            high: c,
            low: c,
            close: c,
        })
        .collect();
    PriceSeries::new(bars)
}

/// One bar per calendar day from `start` from (open, high, low, close) tuples.
pub fn make_ohlc(start: NaiveDate, data: &[(f64, f64, f64, f64)]) -> PriceSeries {
    let bars = data
        .iter()
        .enumerate()
        .map(|(i, &(o, h, l, c))| PriceBar {
            date: start + Duration::days(i as i64),
            open: o,
            high: h,
            low: l,
            close: c,
        })
        .collect();
    PriceSeries::new(bars)
}

/// Ten-day cycles drifting down, so every cycle sets a new low.
pub fn saw_tooth_series(start: NaiveDate, n: usize) -> PriceSeries {
    let data: Vec<(f64, f64, f64, f64)> = (0..n)
        .map(|i| {
            let close = 100.0 - i as f64 * 0.3 + (i % 10) as f64;
            (close, close + 0.5, close - 1.0, close)
        })
        .collect();
    make_ohlc(start, &data)
}

pub fn break_at(d: NaiveDate, drop_pct: f64) -> BreakEvent {
    BreakEvent {
        date: d,
        previous_support: 100.0,
        new_support: 100.0 * (1.0 + drop_pct / 100.0),
        drop_pct,
        days_since_previous: None,
    }
}

/// Strike and expiry as given; bid 1.0, ask 1.2, Bayesian 0.80, weighted 0.75.
pub fn sample_option(name: &str, stock: &str, strike: f64, expiry: NaiveDate) -> OptionRecord {
    OptionRecord {
        option_name: name.to_string(),
        stock_name: stock.to_string(),
        strike_price: strike,
        expiry_date: expiry,
        premium: 100.0,
        bid: Some(1.0),
        ask: Some(1.2),
        probabilities: ProbabilitySet {
            bayesian_calibrated: Some(0.80),
            weighted_average: Some(0.75),
            ..Default::default()
        },
        potential_loss: None,
    }
}

/// A well-supported stock: rolling low 100, last break 60 days ago.
pub fn sample_metric(stock: &str, period: u32) -> SupportMetric {
    SupportMetric {
        stock_name: stock.to_string(),
        rolling_period: period,
        current_price: Some(110.0),
        rolling_low: Some(100.0),
        distance_to_support_pct: Some(10.0),
        total_breaks: 4,
        days_since_last_break: Some(60),
        last_break_date: Some(date(2024, 1, 15)),
        support_stability_pct: 98.5,
        stability_trend: StabilityTrend::Stable,
        median_drop_per_break_pct: Some(-1.5),
        avg_drop_per_break_pct: Some(-1.75),
        max_drop_pct: Some(-3.25),
        drop_std_dev_pct: 0.75,
        avg_days_between_breaks: Some(45.5),
        median_days_between_breaks: Some(40.0),
        trading_days_per_break: 62.5,
        num_clusters: 3,
        max_consecutive_breaks: 2,
        current_consecutive_breaks: 0,
        support_strength_score: 72.25,
        pattern_type: PatternType::ShallowBreaker,
        break_probability_30d: 0.0123,
        break_probability_60d: 0.0246,
        data_through_date: Some(date(2024, 3, 15)),
    }
}

pub fn recovery_row(threshold: f64, method: &str, prob_bin: &str, dte_bin: &str, rate_pct: f64) -> RecoveryRow {
    RecoveryRow {
        data_type: "scenario".into(),
        stock: String::new(),
        historical_peak_threshold: Some(threshold),
        prob_method: method.into(),
        current_prob_bin: prob_bin.into(),
        dte_bin: dte_bin.into(),
        worthless_rate_pct: Some(rate_pct),
        candidate_n: Some(120),
        baseline_n: Some(900),
    }
}

pub fn monthly_row(name: &str, year: i32, month: u32, ret: f64, low_day: u32, open_to_low: f64) -> MonthlyReturnRow {
    MonthlyReturnRow {
        name: name.into(),
        year: Some(year),
        month,
        pct_return_month: Some(ret),
        day_low_day_of_month: Some(low_day),
        pct_open_to_low: Some(open_to_low),
    }
}

/// Valid config independent of the environment.
pub fn default_test_config() -> Config {
    Config {
        data_dir: "data".into(),
        output_dir: "output".into(),
        use_precomputed_support: false,
        as_of: date(2024, 3, 14),
        rolling_periods: ROLLING_PERIODS.to_vec(),
        max_gap_days: 30,
        analysis_workers: 2,
        filters: RecommendationFilters {
            expiry_date: None,
            rolling_period: 365,
            min_days_since_break: 10,
            probability_method: ProbabilityMethod::BayesianCalibrated,
            historical_peak_threshold: 0.90,
        },
        weights: ScoreWeights::default(),
        portfolio: PortfolioSettings {
            target_premium: 500.0,
            underlying_value: 100_000.0,
            transaction_cost: 99.0,
            strike_below_period: None,
            expiry_date: None,
            min_probability_pct: None,
            probability_method: ProbabilityMethod::BayesianCalibrated,
            currency: "SEK".into(),
        },
        backtest: BacktestSettings {
            min_dte: 1,
            max_dte: 45,
            day_count: DayCountKind::FiveSevenths,
        },
        log_level: "info".into(),
    }
}
