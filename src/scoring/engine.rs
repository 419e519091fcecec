use chrono::{Datelike, NaiveDate};
use tracing::{debug, info, warn};

use crate::config::RecommendationFilters;
use crate::core::day_count::{CalendarDays, DayCount, DayCountKind};
use crate::core::stats::{mean, round_dp};
use crate::error::ScoringError;
use crate::models::{
    OptionRecord, RecommendedOption, ScoreBreakdown, ScoreComponent, ScoreGrade, SupportMetric,
    SupportMetrics,
};
use crate::scoring::binning::{DteBin, ProbabilityBin};
use crate::scoring::lookups::LookupTables;
use crate::scoring::normalize::{self, Normalized};
use crate::scoring::weights::ScoreWeights;

/// Filters, scores and ranks put options against support and lookup data.
pub struct ScoringEngine {
    filters: RecommendationFilters,
    weights: ScoreWeights,
    day_count: Box<dyn DayCount>,
}

impl ScoringEngine {
    /// Weights are normalized to sum to 100. An all-zero vector is kept as
    /// is and every composite score will be 0.
    pub fn new(filters: RecommendationFilters, weights: &ScoreWeights) -> Self {
        if weights.is_degenerate() {
            warn!("All factor weights are zero; every composite score will be 0");
        }
        let weights = weights.normalize();
        debug!(
            "Normalized weights: support {:.1}, days {:.1}, recovery {:.1}, peak {:.1}, seasonality {:.1}, performance {:.1}",
            weights.support_strength,
            weights.days_since_break,
            weights.recovery_advantage,
            weights.historical_peak,
            weights.monthly_seasonality,
            weights.current_performance
        );
        Self {
            filters,
            weights,
            day_count: Box::new(CalendarDays),
        }
    }

    /// Day count used for days to expiry and the DTE bin. Calendar by default.
    pub fn with_day_count(mut self, kind: DayCountKind) -> Self {
        self.day_count = kind.strategy();
        self
    }

    pub fn days_to_expiry(&self, option: &OptionRecord, as_of: NaiveDate) -> i64 {
        self.day_count.days_between(as_of, option.expiry_date)
    }

    /// Expiry match, support metric present, strike at or below the rolling
    /// low, and enough days since the last break, in that order. Options
    /// without a metric for the selected window are dropped.
    pub fn filter<'a>(
        &self,
        options: &'a [OptionRecord],
        support: &'a SupportMetrics,
    ) -> Vec<(&'a OptionRecord, &'a SupportMetric)> {
        let period = self.filters.rolling_period;

        let by_expiry: Vec<&OptionRecord> = options
            .iter()
            .filter(|o| self.filters.expiry_date.map_or(true, |d| o.expiry_date == d))
            .collect();

        let with_support: Vec<(&OptionRecord, &SupportMetric)> = by_expiry
            .iter()
            .filter_map(|o| support.get(&o.stock_name, period).map(|m| (*o, m)))
            .collect();

        let below_support: Vec<(&OptionRecord, &SupportMetric)> = with_support
            .iter()
            .copied()
            .filter(|(o, m)| m.rolling_low.map_or(true, |low| o.strike_price <= low))
            .collect();

        let min_days = self.filters.min_days_since_break;
        let kept: Vec<(&OptionRecord, &SupportMetric)> = below_support
            .iter()
            .copied()
            .filter(|(_, m)| m.days_since_last_break.map_or(true, |d| d >= min_days))
            .collect();

        info!(
            "Filter: {} options -> {} expiry -> {} with {}d support -> {} below support -> {} past {}d since break",
            options.len(),
            by_expiry.len(),
            with_support.len(),
            period,
            below_support.len(),
            kept.len(),
            min_days
        );
        kept
    }

    /// Score one option that already passed `filter`.
    pub fn score_option(
        &self,
        option: &OptionRecord,
        metric: &SupportMetric,
        tables: &LookupTables,
        as_of: NaiveDate,
    ) -> Result<RecommendedOption, ScoringError> {
        let method = self.filters.probability_method;
        let threshold = self.filters.historical_peak_threshold;

        let current_probability = option.probability(method).unwrap_or(0.0);
        let days_to_expiry = self.days_to_expiry(option, as_of);
        let prob_bin = ProbabilityBin::of(current_probability);
        let dte_bin = DteBin::of(days_to_expiry);

        let recovery_rate = tables
            .recovery
            .lookup(threshold, method, prob_bin, dte_bin)
            .map(|p| p.recovery_rate);
        let peak = tables.peaks.get(&option.option_name);
        let monthly = tables.monthly.get(&option.stock_name);
        let month_to_date = tables.performance.get(&option.stock_name);

        let positive_rate = monthly.map(|m| m.positive_month_rate_pct);
        let avg_return = monthly.map(|m| m.mean_return_pct);
        let typical_low_day = monthly.and_then(|m| m.typical_low_day);

        let w = &self.weights;
        let component = |raw: Option<f64>, n: Normalized, weight: f64| ScoreComponent {
            raw,
            normalized: n.normalized,
            weighted: n.normalized * weight / 100.0,
            has_data: n.has_data,
            data_status: n.status,
        };

        let avg_gap = Some(metric.trading_days_per_break);
        let breakdown = ScoreBreakdown {
            support_strength: component(
                Some(metric.support_strength_score),
                normalize::support_strength(Some(metric.support_strength_score)),
                w.support_strength,
            ),
            days_since_break: component(
                metric.days_since_last_break.map(|d| d as f64),
                normalize::days_since_break(metric.days_since_last_break, avg_gap),
                w.days_since_break,
            ),
            recovery_advantage: component(
                recovery_rate,
                normalize::recovery_advantage(recovery_rate),
                w.recovery_advantage,
            ),
            historical_peak: component(
                peak,
                normalize::historical_peak(current_probability, peak, threshold, w.historical_peak),
                w.historical_peak,
            ),
            monthly_seasonality: component(
                positive_rate,
                normalize::monthly_seasonality(positive_rate, as_of.day(), typical_low_day),
                w.monthly_seasonality,
            ),
            current_performance: component(
                month_to_date,
                normalize::current_performance(month_to_date, avg_return),
                w.current_performance,
            ),
        };

        let composite = breakdown.composite();
        if !composite.is_finite() {
            return Err(ScoringError::NonFiniteScore {
                option: option.option_name.clone(),
                value: composite,
            });
        }
        let composite_score = round_dp(composite, 2);

        Ok(RecommendedOption {
            rank: 0,
            option_name: option.option_name.clone(),
            stock_name: option.stock_name.clone(),
            strike_price: option.strike_price,
            current_price: metric.current_price,
            expiry_date: option.expiry_date,
            days_to_expiry,
            premium: option.premium,
            rolling_low: metric.rolling_low,
            distance_to_support_pct: metric.distance_to_support_pct,
            days_since_last_break: metric.days_since_last_break,
            support_strength_score: metric.support_strength_score,
            pattern_type: metric.pattern_type,
            current_probability,
            historical_peak_probability: peak,
            recovery_advantage: recovery_rate,
            current_prob_bin: prob_bin.label().to_string(),
            dte_bin: dte_bin.label().to_string(),
            monthly_positive_rate: positive_rate,
            monthly_avg_return: avg_return,
            typical_low_day,
            current_month_performance: month_to_date,
            months_in_historical_data: monthly.map(|m| m.months_available),
            worst_month_drawdown: monthly.and_then(|m| m.worst_drawdown_pct),
            composite_score,
            score_grade: ScoreGrade::from_score(composite_score),
            score_breakdown: breakdown,
        })
    }

    /// Filter, score and rank. Equal scores keep input order.
    pub fn analyze(
        &self,
        options: &[OptionRecord],
        support: &SupportMetrics,
        tables: &LookupTables,
        as_of: NaiveDate,
    ) -> Vec<RecommendedOption> {
        let candidates = self.filter(options, support);

        let mut scored: Vec<RecommendedOption> = Vec::with_capacity(candidates.len());
        for (option, metric) in candidates {
            match self.score_option(option, metric, tables, as_of) {
                Ok(rec) => scored.push(rec),
                Err(e) => warn!("Skipping {}: {}", option.option_name, e),
            }
        }

        scored.sort_by(|a, b| b.composite_score.total_cmp(&a.composite_score));
        for (i, rec) in scored.iter_mut().enumerate() {
            rec.rank = i + 1;
        }

        info!("Scored {} options as of {}", scored.len(), as_of);
        scored
    }
}

/// Print a ranked recommendation list.
pub fn print_summary(recommendations: &[RecommendedOption]) {
    println!("\n{}", "=".repeat(70));
    println!("  PUT RECOMMENDATIONS");
    println!("{}", "=".repeat(70));

    if recommendations.is_empty() {
        println!("  No options passed the filters.");
        println!("{}\n", "=".repeat(70));
        return;
    }

    let scores: Vec<f64> = recommendations.iter().map(|r| r.composite_score).collect();
    let top = scores.iter().copied().fold(f64::MIN, f64::max);
    let bottom = scores.iter().copied().fold(f64::MAX, f64::min);

    println!("  Options:     {}", recommendations.len());
    println!("  Avg Score:   {:.1}", mean(&scores).unwrap_or(0.0));
    println!("  Top Score:   {:.1}", top);
    println!("  Bottom:      {:.1}", bottom);
    println!();
    println!("  TOP 10");
    println!("  ───────────────────────────────────");
    for rec in recommendations.iter().take(10) {
        println!(
            "  {:>3}. {:<22} {:<12} strike {:>8.2} | prob {:>5.1}% | score {:>5.1} ({})",
            rec.rank,
            rec.option_name,
            rec.stock_name,
            rec.strike_price,
            rec.current_probability * 100.0,
            rec.composite_score,
            rec.score_grade
        );
    }
    println!("{}\n", "=".repeat(70));
}
