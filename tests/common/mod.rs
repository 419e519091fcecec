#![allow(dead_code)]

use chrono::{Duration, NaiveDate};

use put_recommender::config::{BacktestSettings, Config, PortfolioSettings, RecommendationFilters};
use put_recommender::core::day_count::DayCountKind;
use put_recommender::models::{
    OptionRecord, PatternType, PriceBar, PriceSeries, ProbabilityMethod, ProbabilitySet,
    StabilityTrend, SupportMetric, ROLLING_PERIODS,
};
use put_recommender::scoring::ScoreWeights;

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// One flat bar per calendar day from `start`.
pub fn daily_closes(start: NaiveDate, closes: &[f64]) -> PriceSeries {
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

/// `n` days ending on `end`, rising one tenth per day from 50.
pub fn steady_climb(end: NaiveDate, n: usize) -> PriceSeries {
    let closes: Vec<f64> = (0..n).map(|i| 50.0 + i as f64 * 0.1).collect();
    daily_closes(end - Duration::days(n as i64 - 1), &closes)
}

/// `n` days ending on `end` in ten-day cycles, each starting at a new low.
pub fn falling_cycles(end: NaiveDate, n: usize) -> PriceSeries {
    let closes: Vec<f64> = (0..n)
        .map(|i| 200.0 - i as f64 * 0.2 + (i % 10) as f64)
        .collect();
    daily_closes(end - Duration::days(n as i64 - 1), &closes)
}

pub fn put_option(
    name: &str,
    stock: &str,
    strike: f64,
    expiry: NaiveDate,
    bid: f64,
    bayesian: f64,
) -> OptionRecord {
    OptionRecord {
        option_name: name.to_string(),
        stock_name: stock.to_string(),
        strike_price: strike,
        expiry_date: expiry,
        premium: 100.0,
        bid: Some(bid),
        ask: Some(bid + 0.2),
        probabilities: ProbabilitySet {
            bayesian_calibrated: Some(bayesian),
            weighted_average: Some(bayesian - 0.05),
            ..Default::default()
        },
        potential_loss: None,
    }
}

pub fn support_metric(stock: &str, period: u32) -> SupportMetric {
    SupportMetric {
        stock_name: stock.to_string(),
        rolling_period: period,
        current_price: Some(101.0),
        rolling_low: Some(90.0),
        distance_to_support_pct: Some(-10.89),
        total_breaks: 12,
        days_since_last_break: Some(40),
        last_break_date: Some(date(2024, 2, 3)),
        support_stability_pct: 96.7,
        stability_trend: StabilityTrend::Stable,
        median_drop_per_break_pct: Some(-1.2),
        avg_drop_per_break_pct: Some(-1.4),
        max_drop_pct: Some(-4.1),
        drop_std_dev_pct: 0.9,
        avg_days_between_breaks: Some(28.0),
        median_days_between_breaks: Some(25.0),
        trading_days_per_break: 30.0,
        num_clusters: 5,
        max_consecutive_breaks: 3,
        current_consecutive_breaks: 0,
        support_strength_score: 75.0,
        pattern_type: PatternType::ShallowBreaker,
        break_probability_30d: 0.35,
        break_probability_60d: 0.58,
        data_through_date: Some(date(2024, 3, 14)),
    }
}

pub fn test_config() -> Config {
    Config {
        data_dir: "data".into(),
        output_dir: std::env::temp_dir()
            .join(format!("put_recommender_integ_{}", std::process::id()))
            .to_string_lossy()
            .to_string(),
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
            target_premium: 2000.0,
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
