use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};

use crate::core::stats::{mean, median};
use crate::models::{
    MonthlyReturnRow, PriceHistories, ProbabilityHistoryRow, ProbabilityMethod, RecoveryRow,
};
use crate::scoring::binning::{DteBin, ProbabilityBin};

/// Composite key of the recovery table. The threshold is held in
/// hundredths so 0.90 and 0.9 hit the same entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecoveryKey {
    pub threshold_hundredths: u32,
    pub method: ProbabilityMethod,
    pub prob_bin: ProbabilityBin,
    pub dte_bin: DteBin,
}

impl RecoveryKey {
    pub fn new(threshold: f64, method: ProbabilityMethod, prob_bin: ProbabilityBin, dte_bin: DteBin) -> Self {
        Self {
            threshold_hundredths: (threshold * 100.0).round() as u32,
            method,
            prob_bin,
            dte_bin,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RecoveryPoint {
    /// Share of recovery candidates that expired worthless, 0-1.
    pub recovery_rate: f64,
    pub sample_size_candidate: Option<u64>,
    pub sample_size_baseline: Option<u64>,
}

/// Historical worthless rate of options that dropped from a high peak.
#[derive(Debug, Clone, Default)]
pub struct RecoveryTable {
    points: HashMap<RecoveryKey, RecoveryPoint>,
}

impl RecoveryTable {
    /// Aggregated rows only. Rows with an unknown method, bin or missing
    /// rate are skipped; later rows overwrite earlier ones for the same key.
    pub fn from_rows(rows: &[RecoveryRow]) -> Self {
        let mut points = HashMap::new();
        let mut skipped = 0usize;

        for row in rows.iter().filter(|r| r.is_aggregated()) {
            let method = ProbabilityMethod::from_recovery_label(&row.prob_method)
                .or_else(|| ProbabilityMethod::from_field_name(&row.prob_method));
            let parsed = (
                row.historical_peak_threshold,
                method,
                ProbabilityBin::from_label(&row.current_prob_bin),
                DteBin::from_label(&row.dte_bin),
                row.worthless_rate_pct,
            );
            let (Some(threshold), Some(method), Some(prob_bin), Some(dte_bin), Some(rate_pct)) =
                parsed
            else {
                skipped += 1;
                continue;
            };

            points.insert(
                RecoveryKey::new(threshold, method, prob_bin, dte_bin),
                RecoveryPoint {
                    recovery_rate: rate_pct / 100.0,
                    sample_size_candidate: row.candidate_n,
                    sample_size_baseline: row.baseline_n,
                },
            );
        }

        info!(
            "Recovery table: {} entries from {} rows ({} skipped)",
            points.len(),
            rows.len(),
            skipped
        );
        Self { points }
    }

    pub fn get(&self, key: &RecoveryKey) -> Option<&RecoveryPoint> {
        self.points.get(key)
    }

    pub fn lookup(
        &self,
        threshold: f64,
        method: ProbabilityMethod,
        prob_bin: ProbabilityBin,
        dte_bin: DteBin,
    ) -> Option<&RecoveryPoint> {
        self.get(&RecoveryKey::new(threshold, method, prob_bin, dte_bin))
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Seasonality of one stock for one calendar month across all years.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyStat {
    pub positive_month_rate_pct: f64,
    pub mean_return_pct: f64,
    /// Median day of month of the monthly low across years, rounded.
    pub typical_low_day: Option<u32>,
    pub months_available: usize,
    /// Most negative open-to-low move seen in this month.
    pub worst_drawdown_pct: Option<f64>,
}

#[derive(Debug, Clone, Default)]
pub struct MonthlyStats {
    month: u32,
    stats: HashMap<String, MonthlyStat>,
}

impl MonthlyStats {
    /// Aggregate raw monthly rows for a single calendar month (1-12).
    pub fn for_month(rows: &[MonthlyReturnRow], month: u32) -> Self {
        let mut by_stock: HashMap<&str, Vec<&MonthlyReturnRow>> = HashMap::new();
        for row in rows.iter().filter(|r| r.month == month) {
            let name = row.name.trim();
            if !name.is_empty() {
                by_stock.entry(name).or_default().push(row);
            }
        }

        let stats: HashMap<String, MonthlyStat> = by_stock
            .into_iter()
            .filter_map(|(name, rows)| aggregate_month(&rows).map(|s| (name.to_string(), s)))
            .collect();

        debug!("Monthly stats for month {}: {} stocks", month, stats.len());
        Self { month, stats }
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn get(&self, stock: &str) -> Option<&MonthlyStat> {
        self.stats.get(stock)
    }

    pub fn len(&self) -> usize {
        self.stats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stats.is_empty()
    }
}

/// Fold one stock's rows for a month. The typical low day is the median of
/// every year's low day rather than the value of any single row, so the
/// row order of the input file does not matter.
fn aggregate_month(rows: &[&MonthlyReturnRow]) -> Option<MonthlyStat> {
    let returns: Vec<f64> = rows.iter().filter_map(|r| r.pct_return_month).collect();
    if returns.is_empty() {
        return None;
    }
    let positive = returns.iter().filter(|r| **r > 0.0).count();
    let low_days: Vec<f64> = rows
        .iter()
        .filter_map(|r| r.day_low_day_of_month)
        .filter(|d| *d > 0)
        .map(|d| d as f64)
        .collect();

    Some(MonthlyStat {
        positive_month_rate_pct: positive as f64 / returns.len() as f64 * 100.0,
        mean_return_pct: mean(&returns).unwrap_or(0.0),
        typical_low_day: median(&low_days).map(|d| d.round() as u32),
        months_available: returns.len(),
        worst_drawdown_pct: rows
            .iter()
            .filter_map(|r| r.pct_open_to_low)
            .reduce(f64::min),
    })
}

/// Month-to-date price change per stock, in percent.
#[derive(Debug, Clone, Default)]
pub struct StockPerformance {
    month_to_date: HashMap<String, f64>,
}

impl StockPerformance {
    /// Stocks without a close in the previous month are left out.
    pub fn as_of(histories: &PriceHistories, as_of: NaiveDate) -> Self {
        let month_to_date = histories
            .iter()
            .filter_map(|(name, series)| {
                series
                    .month_to_date_change_pct(as_of)
                    .map(|pct| (name.clone(), pct))
            })
            .collect();
        Self { month_to_date }
    }

    pub fn get(&self, stock: &str) -> Option<f64> {
        self.month_to_date.get(stock).copied()
    }

    pub fn len(&self) -> usize {
        self.month_to_date.len()
    }

    pub fn is_empty(&self) -> bool {
        self.month_to_date.is_empty()
    }
}

impl FromIterator<(String, f64)> for StockPerformance {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        Self {
            month_to_date: iter.into_iter().collect(),
        }
    }
}

/// Highest Bayesian-calibrated probability each option has reached.
#[derive(Debug, Clone, Default)]
pub struct ProbabilityPeaks {
    peaks: HashMap<String, f64>,
}

impl ProbabilityPeaks {
    pub fn from_history(rows: &[ProbabilityHistoryRow]) -> Self {
        Self::from_history_until(rows, None)
    }

    /// Peaks from snapshots dated on or before `until`. Undated rows are
    /// only used when no cut-off is given.
    pub fn from_history_until(rows: &[ProbabilityHistoryRow], until: Option<NaiveDate>) -> Self {
        let mut peaks: HashMap<String, f64> = HashMap::new();
        for row in rows {
            let in_range = match (until, row.update_date) {
                (None, _) => true,
                (Some(cut), Some(d)) => d <= cut,
                (Some(_), None) => false,
            };
            let name = row.option_name.trim();
            if !in_range || name.is_empty() {
                continue;
            }
            let Some(p) = row.probabilities.get(ProbabilityMethod::BayesianCalibrated) else {
                continue;
            };
            peaks
                .entry(name.to_string())
                .and_modify(|max| *max = max.max(p))
                .or_insert(p);
        }
        Self { peaks }
    }

    pub fn get(&self, option: &str) -> Option<f64> {
        self.peaks.get(option).copied()
    }

    pub fn len(&self) -> usize {
        self.peaks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peaks.is_empty()
    }
}

impl FromIterator<(String, f64)> for ProbabilityPeaks {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        Self {
            peaks: iter.into_iter().collect(),
        }
    }
}

/// Every read-only table the scoring engine consults.
#[derive(Debug, Clone, Default)]
pub struct LookupTables {
    pub recovery: RecoveryTable,
    pub monthly: MonthlyStats,
    pub performance: StockPerformance,
    pub peaks: ProbabilityPeaks,
}

impl LookupTables {
    /// Build every table for a run dated `as_of`. Seasonality uses the
    /// calendar month of `as_of`.
    pub fn build(
        recovery_rows: &[RecoveryRow],
        monthly_rows: &[MonthlyReturnRow],
        histories: &PriceHistories,
        probability_history: &[ProbabilityHistoryRow],
        as_of: NaiveDate,
    ) -> Self {
        let tables = Self {
            recovery: RecoveryTable::from_rows(recovery_rows),
            monthly: MonthlyStats::for_month(monthly_rows, as_of.month()),
            performance: StockPerformance::as_of(histories, as_of),
            peaks: ProbabilityPeaks::from_history(probability_history),
        };
        info!(
            "Lookup tables: {} recovery, {} monthly, {} performance, {} peaks",
            tables.recovery.len(),
            tables.monthly.len(),
            tables.performance.len(),
            tables.peaks.len()
        );
        tables
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ProbabilitySet;
    use crate::test_helpers::{date, make_bars, monthly_row, recovery_row};

    #[test]
    fn recovery_table_keeps_aggregated_rows_only() {
        let mut stock_row = recovery_row(0.90, "Bayesian Calibrated", "70-80%", "8-14", 55.0);
        stock_row.data_type = "stock".into();
        stock_row.stock = "ABB".into();

        let rows = vec![
            recovery_row(0.90, "Bayesian Calibrated", "70-80%", "8-14", 80.0),
            stock_row,
            recovery_row(0.90, "Nonsense Method", "70-80%", "8-14", 10.0),
        ];
        let table = RecoveryTable::from_rows(&rows);
        assert_eq!(table.len(), 1);

        let hit = table
            .lookup(0.9, ProbabilityMethod::BayesianCalibrated, ProbabilityBin::From70To80, DteBin::UpTo14)
            .unwrap();
        assert!((hit.recovery_rate - 0.8).abs() < 1e-9);
        assert!(table
            .lookup(0.95, ProbabilityMethod::BayesianCalibrated, ProbabilityBin::From70To80, DteBin::UpTo14)
            .is_none());
    }

    #[test]
    fn monthly_stats_filter_to_month() {
        let rows = vec![
            monthly_row("ABB", 2021, 3, 2.0, 10, -3.0),
            monthly_row("ABB", 2022, 3, -1.0, 14, -6.0),
            monthly_row("ABB", 2023, 3, 4.0, 16, -2.0),
            monthly_row("ABB", 2023, 4, 9.0, 2, -9.0),
        ];
        let stats = MonthlyStats::for_month(&rows, 3);
        let abb = stats.get("ABB").unwrap();
        assert_eq!(abb.months_available, 3);
        assert!((abb.positive_month_rate_pct - 200.0 / 3.0).abs() < 1e-9);
        assert!((abb.mean_return_pct - 5.0 / 3.0).abs() < 1e-9);
        assert_eq!(abb.typical_low_day, Some(14));
        assert_eq!(abb.worst_drawdown_pct, Some(-6.0));
        assert!(MonthlyStats::for_month(&rows, 5).is_empty());
    }

    #[test]
    fn performance_needs_previous_month() {
        let mut histories = PriceHistories::new();
        histories.insert("A".into(), make_bars(date(2024, 1, 30), &[100.0, 100.0, 102.0]));
        histories.insert("B".into(), make_bars(date(2024, 2, 1), &[50.0, 51.0]));
        let perf = StockPerformance::as_of(&histories, date(2024, 2, 1));
        assert!((perf.get("A").unwrap() - 2.0).abs() < 1e-9);
        assert!(perf.get("B").is_none());
    }

    #[test]
    fn peaks_take_max_bayesian() {
        let row = |name: &str, d: NaiveDate, p: Option<f64>| ProbabilityHistoryRow {
            option_name: name.into(),
            update_date: Some(d),
            probabilities: ProbabilitySet {
                bayesian_calibrated: p,
                weighted_average: Some(0.99),
                ..Default::default()
            },
        };
        let rows = vec![
            row("OPT1", date(2024, 1, 1), Some(0.80)),
            row("OPT1", date(2024, 1, 2), Some(0.95)),
            row("OPT1", date(2024, 1, 3), None),
            row("OPT2", date(2024, 1, 1), Some(0.40)),
        ];
        let peaks = ProbabilityPeaks::from_history(&rows);
        assert_eq!(peaks.get("OPT1"), Some(0.95));
        assert_eq!(peaks.get("OPT2"), Some(0.40));
        assert_eq!(peaks.get("OPT3"), None);

        let early = ProbabilityPeaks::from_history_until(&rows, Some(date(2024, 1, 1)));
        assert_eq!(early.get("OPT1"), Some(0.80));
    }
}
