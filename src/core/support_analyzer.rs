use chrono::NaiveDate;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::core::clusters::{cluster_breaks, current_consecutive_breaks, max_consecutive_breaks};
use crate::core::stats::{mean, median, round_dp, std_dev};
use crate::core::support_breaks::{detect_breaks, rolling_lows};
use crate::error::AnalysisError;
use crate::models::{
    BreakEvent, PatternType, PriceHistories, PriceSeries, RollingLowPoint, StabilityTrend,
    SupportBreakdown, SupportMetric, SupportMetrics,
};

pub const DEFAULT_MAX_GAP_DAYS: i64 = 30;
/// Bars needed before a first-half / second-half trend is meaningful.
const MIN_BARS_FOR_TREND: usize = 10;
/// Stability difference (percentage points) that counts as a trend.
const TREND_THRESHOLD: f64 = 5.0;

/// Turns one stock's price history into support-level statistics.
pub struct SupportAnalyzer {
    max_gap_days: i64,
}

impl SupportAnalyzer {
    pub fn new() -> Self {
        Self {
            max_gap_days: DEFAULT_MAX_GAP_DAYS,
        }
    }

    pub fn with_max_gap(max_gap_days: i64) -> Self {
        Self { max_gap_days }
    }

    /// Analyze one (stock, window). `latest` is the reference date for
    /// "days since" measures, normally the newest date in the whole dataset.
    pub fn analyze(
        &self,
        stock: &str,
        series: &PriceSeries,
        period: u32,
        latest: NaiveDate,
    ) -> Result<SupportMetric, AnalysisError> {
        if series.is_empty() {
            return Err(AnalysisError::EmptyHistory(stock.to_string()));
        }

        let points = rolling_lows(series, period);
        let breaks = detect_breaks(&points);
        let clusters = cluster_breaks(&breaks, self.max_gap_days);

        let last_point = points.last().copied();
        let current_price = last_point.map(|p| p.close);
        let rolling_low = last_point.and_then(|p| p.rolling_low);
        let distance_to_support_pct = match (current_price, rolling_low) {
            (Some(price), Some(low)) if price != 0.0 => Some(round_dp((low - price) / price * 100.0, 2)),
            _ => None,
        };

        let total_days = points.len();
        let total_breaks = breaks.len();
        let stability = stability_pct(total_days, total_breaks);

        let last_break_date = breaks.last().map(|b| b.date);
        let days_since_last_break = last_break_date.map(|d| (latest - d).num_days());

        let drops: Vec<f64> = breaks.iter().map(|b| b.drop_pct).collect();
        let median_drop = median(&drops);
        let avg_drop = mean(&drops);
        let max_drop = drops.iter().copied().reduce(f64::min);
        let drop_std = std_dev(&drops).unwrap_or(0.0);

        let gaps: Vec<f64> = breaks
            .iter()
            .filter_map(|b| b.days_since_previous)
            .map(|d| d as f64)
            .collect();
        let avg_days_between = mean(&gaps).filter(|v| *v != 0.0);
        let median_days_between = median(&gaps).filter(|v| *v != 0.0);

        let trading_days_per_break = if total_breaks > 0 {
            total_days as f64 / total_breaks as f64
        } else {
            total_days as f64
        };

        let max_consecutive = max_consecutive_breaks(&clusters);
        let current_consecutive = current_consecutive_breaks(&clusters, latest, self.max_gap_days);

        let trend = stability_trend(&points, &breaks);
        let strength = support_strength_score(
            stability,
            days_since_last_break,
            trading_days_per_break,
            drop_std,
        );
        let pattern = classify_pattern(
            stability,
            max_consecutive,
            current_consecutive,
            median_drop,
            total_breaks,
        );

        debug!(
            "{} {}d: {} breaks, stability {:.1}%, pattern {}",
            stock, period, total_breaks, stability, pattern
        );

        Ok(SupportMetric {
            stock_name: stock.to_string(),
            rolling_period: period,
            current_price: current_price.map(|p| round_dp(p, 2)),
            rolling_low: rolling_low.map(|l| round_dp(l, 2)),
            distance_to_support_pct,
            total_breaks,
            days_since_last_break,
            last_break_date,
            support_stability_pct: round_dp(stability, 2),
            stability_trend: trend,
            median_drop_per_break_pct: median_drop.map(|v| round_dp(v, 2)),
            avg_drop_per_break_pct: avg_drop.map(|v| round_dp(v, 2)),
            max_drop_pct: max_drop.map(|v| round_dp(v, 2)),
            drop_std_dev_pct: round_dp(drop_std, 2),
            avg_days_between_breaks: avg_days_between.map(|v| round_dp(v, 1)),
            median_days_between_breaks: median_days_between.map(|v| round_dp(v, 1)),
            trading_days_per_break: round_dp(trading_days_per_break, 1),
            num_clusters: clusters.len(),
            max_consecutive_breaks: max_consecutive,
            current_consecutive_breaks: current_consecutive,
            support_strength_score: strength,
            pattern_type: pattern,
            break_probability_30d: break_probability(
                days_since_last_break,
                avg_days_between,
                stability,
                30,
            ),
            break_probability_60d: break_probability(
                days_since_last_break,
                avg_days_between,
                stability,
                60,
            ),
            data_through_date: Some(latest),
        })
    }

    /// Rolling lows, breaks and clusters for charting one stock and window.
    pub fn breakdown(&self, stock: &str, series: &PriceSeries, period: u32) -> SupportBreakdown {
        let rolling_lows = rolling_lows(series, period);
        let breaks = detect_breaks(&rolling_lows);
        let clusters = cluster_breaks(&breaks, self.max_gap_days);
        SupportBreakdown {
            stock_name: stock.to_string(),
            rolling_period: period,
            rolling_lows,
            breaks,
            clusters,
        }
    }
}

impl Default for SupportAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

/// Share of bars without a break, in percent. 100 when there are no bars.
pub fn stability_pct(total_bars: usize, total_breaks: usize) -> f64 {
    if total_bars == 0 {
        return 100.0;
    }
    (total_bars - total_breaks.min(total_bars)) as f64 / total_bars as f64 * 100.0
}

/// Compare stability of the second half of the bars against the first.
pub fn stability_trend(points: &[RollingLowPoint], breaks: &[BreakEvent]) -> StabilityTrend {
    if points.len() < MIN_BARS_FOR_TREND {
        return StabilityTrend::Stable;
    }

    let mid = points.len() / 2;
    let split_date = points[mid].date;
    let first_breaks = breaks.iter().filter(|b| b.date < split_date).count();
    let second_breaks = breaks.len() - first_breaks;

    let first = stability_pct(mid, first_breaks);
    let second = stability_pct(points.len() - mid, second_breaks);
    let diff = second - first;

    if diff > TREND_THRESHOLD {
        StabilityTrend::Improving
    } else if diff < -TREND_THRESHOLD {
        StabilityTrend::Weakening
    } else {
        StabilityTrend::Stable
    }
}

/// First matching rule wins.
pub fn classify_pattern(
    stability: f64,
    max_consecutive: usize,
    current_consecutive: usize,
    median_drop: Option<f64>,
    total_breaks: usize,
) -> PatternType {
    if stability >= 99.5 {
        return PatternType::NeverBreaks;
    }
    if max_consecutive > 0 && current_consecutive as f64 >= 0.8 * max_consecutive as f64 {
        return PatternType::ExhaustedCascade;
    }
    if median_drop.is_some_and(|d| d > -2.0) {
        return PatternType::ShallowBreaker;
    }
    if stability < 70.0 && median_drop.is_some_and(|d| d < -5.0) {
        return PatternType::Volatile;
    }
    if stability >= 85.0 && total_breaks < 10 {
        return PatternType::Stable;
    }
    PatternType::PredictableCycles
}

/// Weighted 0-100 blend of stability, recency, frequency and drop consistency.
pub fn support_strength_score(
    stability: f64,
    days_since_last_break: Option<i64>,
    trading_days_per_break: f64,
    drop_std_dev: f64,
) -> f64 {
    let days_since_score = match days_since_last_break {
        None => 100.0,
        Some(days) => (days as f64 / 365.0 * 100.0).min(100.0),
    };
    let frequency_score = (trading_days_per_break / 365.0 * 100.0).min(100.0);
    let consistency_score = (100.0 - drop_std_dev * 10.0).max(0.0);

    round_dp(
        stability * 0.30
            + days_since_score * 0.25
            + frequency_score * 0.25
            + consistency_score * 0.20,
        2,
    )
}

/// Chance the support breaks within `horizon_days`.
pub fn break_probability(
    days_since_last_break: Option<i64>,
    avg_days_between: Option<f64>,
    stability: f64,
    horizon_days: u32,
) -> f64 {
    let base = (100.0 - stability) / 100.0;

    let (days, avg_gap) = match (days_since_last_break, avg_days_between) {
        (Some(days), Some(avg)) if avg != 0.0 => (days as f64, avg),
        _ => return base,
    };

    let time_factor = (days / avg_gap).min(2.0);
    let probability = (base * (1.0 + time_factor) / 2.0).min(1.0);
    let horizon_factor = (horizon_days as f64 / avg_gap).min(1.0);

    round_dp(probability * horizon_factor, 4)
}

/// Newest bar date across every stock.
pub fn latest_date(histories: &PriceHistories) -> Option<NaiveDate> {
    histories
        .values()
        .filter_map(|s| s.last().map(|b| b.date))
        .max()
}

/// Analyze every (stock, period) pair on the blocking pool, at most
/// `workers` stocks at a time, and merge into one map.
pub async fn analyze_universe(
    histories: Arc<PriceHistories>,
    periods: &[u32],
    max_gap_days: i64,
    latest: NaiveDate,
    workers: usize,
) -> SupportMetrics {
    let permits = Arc::new(Semaphore::new(workers.max(1)));
    let periods: Arc<Vec<u32>> = Arc::new(periods.to_vec());
    let mut set = JoinSet::new();

    for stock in histories.keys().cloned() {
        let histories = Arc::clone(&histories);
        let periods = Arc::clone(&periods);
        let permits = Arc::clone(&permits);

        set.spawn(async move {
            let _permit = permits.acquire_owned().await;
            tokio::task::spawn_blocking(move || {
                let analyzer = SupportAnalyzer::with_max_gap(max_gap_days);
                let mut out = Vec::with_capacity(periods.len());
                if let Some(series) = histories.get(&stock) {
                    for &period in periods.iter() {
                        match analyzer.analyze(&stock, series, period, latest) {
                            Ok(metric) => out.push(metric),
                            Err(e) => warn!("Support analysis skipped: {}", e),
                        }
                    }
                }
                out
            })
            .await
        });
    }

    let mut metrics = SupportMetrics::new();
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok(Ok(batch)) => batch.into_iter().for_each(|m| metrics.insert(m)),
            Ok(Err(e)) | Err(e) => warn!("Support analysis task failed: {}", e),
        }
    }

    info!(
        "Analyzed {} stock/period pairs across {} stocks",
        metrics.len(),
        histories.len()
    );
    metrics
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{date, make_bars, saw_tooth_series};

    #[test]
    fn flat_history_never_breaks() {
        let s = make_bars(date(2024, 1, 1), &[100.0; 40]);
        let m = SupportAnalyzer::new()
            .analyze("FLAT", &s, 30, date(2024, 2, 9))
            .unwrap();
        assert_eq!(m.total_breaks, 0);
        assert!(m.days_since_last_break.is_none());
        assert!((m.support_stability_pct - 100.0).abs() < 1e-9);
        assert_eq!(m.pattern_type, PatternType::NeverBreaks);
        assert!((m.break_probability_30d - 0.0).abs() < 1e-9);
        // 0.30*100 + 0.25*100 + 0.25*(40/365*100) + 0.20*100
        let expected = round_dp(30.0 + 25.0 + 0.25 * (40.0 / 365.0 * 100.0) + 20.0, 2);
        assert!((m.support_strength_score - expected).abs() < 1e-9);
        assert_eq!(m.distance_to_support_pct, Some(0.0));
    }

    #[test]
    fn empty_history_is_an_error() {
        let r = SupportAnalyzer::new().analyze("NONE", &PriceSeries::default(), 30, date(2024, 1, 1));
        assert_eq!(r, Err(AnalysisError::EmptyHistory("NONE".into())));
    }

    #[test]
    fn analysis_is_deterministic() {
        let s = saw_tooth_series(date(2023, 1, 2), 200);
        let a = SupportAnalyzer::new();
        let latest = s.last().unwrap().date;
        let m1 = a.analyze("SAW", &s, 90, latest).unwrap();
        let m2 = a.analyze("SAW", &s, 90, latest).unwrap();
        assert_eq!(m1, m2);
        assert!(m1.total_breaks > 0);
        assert!(m1.break_probability_30d >= 0.0 && m1.break_probability_30d <= 1.0);
        assert!(m1.support_strength_score >= 0.0 && m1.support_strength_score <= 100.0);
    }

    #[test]
    fn breakdown_matches_metric_counts() {
        let s = saw_tooth_series(date(2023, 1, 2), 120);
        let a = SupportAnalyzer::new();
        let latest = s.last().unwrap().date;
        let m = a.analyze("SAW", &s, 30, latest).unwrap();
        let b = a.breakdown("SAW", &s, 30);
        assert_eq!(b.breaks.len(), m.total_breaks);
        assert_eq!(b.clusters.len(), m.num_clusters);
        assert_eq!(b.rolling_lows.len(), s.len());
    }

    #[test]
    fn trend_needs_ten_bars() {
        let s = make_bars(date(2024, 1, 1), &[9.0, 8.0, 7.0, 6.0, 5.0]);
        let pts = rolling_lows(&s, 365);
        let breaks = detect_breaks(&pts);
        assert_eq!(stability_trend(&pts, &breaks), StabilityTrend::Stable);
    }

    #[test]
    fn trend_improves_when_breaks_stop() {
        // 10 falling bars then 10 flat bars
        let mut closes: Vec<f64> = (0..10).map(|i| 100.0 - i as f64).collect();
        closes.extend(std::iter::repeat(91.0).take(10));
        let s = make_bars(date(2024, 1, 1), &closes);
        let pts = rolling_lows(&s, 365);
        let breaks = detect_breaks(&pts);
        assert_eq!(stability_trend(&pts, &breaks), StabilityTrend::Improving);

        let reversed: Vec<f64> = std::iter::repeat(100.0)
            .take(10)
            .chain((1..=10).map(|i| 100.0 - i as f64))
            .collect();
        let s = make_bars(date(2024, 1, 1), &reversed);
        let pts = rolling_lows(&s, 365);
        let breaks = detect_breaks(&pts);
        assert_eq!(stability_trend(&pts, &breaks), StabilityTrend::Weakening);
    }

    #[test]
    fn pattern_priority_order() {
        assert_eq!(classify_pattern(99.5, 5, 5, Some(-10.0), 1), PatternType::NeverBreaks);
        assert_eq!(classify_pattern(90.0, 5, 4, Some(-10.0), 3), PatternType::ExhaustedCascade);
        assert_eq!(classify_pattern(90.0, 5, 3, Some(-1.5), 3), PatternType::ShallowBreaker);
        assert_eq!(classify_pattern(60.0, 5, 0, Some(-6.0), 30), PatternType::Volatile);
        assert_eq!(classify_pattern(90.0, 5, 0, Some(-3.0), 9), PatternType::Stable);
        assert_eq!(classify_pattern(80.0, 5, 0, Some(-3.0), 12), PatternType::PredictableCycles);
        // max 0 never triggers a cascade
        assert_eq!(classify_pattern(90.0, 0, 0, None, 0), PatternType::Stable);
    }

    #[test]
    fn strength_components() {
        // stability 80, 73 days since, 36.5 days per break, std 2
        // 24 + 0.25*20 + 0.25*10 + 0.20*80 = 47.5
        let s = support_strength_score(80.0, Some(73), 36.5, 2.0);
        assert!((s - 47.5).abs() < 1e-9);
        // huge std dev floors consistency at 0
        let s = support_strength_score(0.0, Some(0), 0.0, 50.0);
        assert!((s - 0.0).abs() < 1e-9);
    }

    #[test]
    fn probability_formula() {
        // base 0.2, ratio 20/10 = 2, p = min(1, 0.2*3/2) = 0.3, horizon min(1, 30/10) = 1
        assert!((break_probability(Some(20), Some(10.0), 80.0, 30) - 0.3).abs() < 1e-9);
        // horizon shorter than avg gap scales down: 30/60 = 0.5
        // ratio 30/60 = 0.5, p = 0.2*1.5/2 = 0.15, * 0.5 = 0.075
        assert!((break_probability(Some(30), Some(60.0), 80.0, 30) - 0.075).abs() < 1e-9);
        // no gap history falls back to base
        assert!((break_probability(Some(5), None, 80.0, 30) - 0.2).abs() < 1e-9);
        assert!((break_probability(None, Some(10.0), 90.0, 60) - 0.1).abs() < 1e-9);
    }

    #[test]
    fn probability_is_capped_at_one() {
        // base 1.0, ratio capped at 2, 1.0*3/2 = 1.5 -> 1.0, horizon 60/10 -> 1
        assert!((break_probability(Some(100), Some(10.0), 0.0, 60) - 1.0).abs() < 1e-9);
        // same cap before the horizon scale: 1.0 * 30/60
        assert!((break_probability(Some(100), Some(60.0), 0.0, 30) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn stability_handles_zero_bars() {
        assert!((stability_pct(0, 0) - 100.0).abs() < 1e-9);
        assert!((stability_pct(10, 2) - 80.0).abs() < 1e-9);
    }

    #[test]
    fn days_since_counts_from_latest() {
        let s = make_bars(date(2024, 1, 1), &[10.0, 9.0, 9.0]);
        let m = SupportAnalyzer::new()
            .analyze("X", &s, 365, date(2024, 1, 12))
            .unwrap();
        assert_eq!(m.last_break_date, Some(date(2024, 1, 2)));
        assert_eq!(m.days_since_last_break, Some(10));
    }

    #[tokio::test]
    async fn universe_analysis_covers_every_pair() {
        let mut histories = PriceHistories::new();
        histories.insert("A".into(), saw_tooth_series(date(2023, 1, 2), 100));
        histories.insert("B".into(), make_bars(date(2023, 1, 2), &[50.0; 100]));
        let latest = latest_date(&histories).unwrap();
        let metrics = analyze_universe(Arc::new(histories), &[30, 90], 30, latest, 2).await;
        assert_eq!(metrics.len(), 4);
        assert_eq!(metrics.get("B", 90).unwrap().pattern_type, PatternType::NeverBreaks);
    }
}
