use anyhow::Result;
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::core::support_analyzer::SupportAnalyzer;
use crate::data::MarketData;
use crate::models::{MonthlyReturnRow, OptionRecord, ProbabilitySet, SupportMetrics};
use crate::scoring::lookups::{
    LookupTables, MonthlyStats, ProbabilityPeaks, RecoveryTable, StockPerformance,
};
use crate::scoring::ScoringEngine;

use super::report::BacktestReport;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Outcome {
    #[serde(rename = "worthless")]
    Worthless,
    #[serde(rename = "ITM")]
    InTheMoney,
}

impl Outcome {
    /// A put expires worthless when the close on expiry is above strike.
    pub fn at_expiry(close: f64, strike: f64) -> Self {
        if close > strike {
            Outcome::Worthless
        } else {
            Outcome::InTheMoney
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Worthless => write!(f, "worthless"),
            Outcome::InTheMoney => write!(f, "ITM"),
        }
    }
}

/// One option scored on one historical day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestRecord {
    pub date: NaiveDate,
    pub option_name: String,
    pub stock_name: String,
    pub strike_price: f64,
    pub expiry_date: NaiveDate,
    pub days_to_expiry: i64,
    pub current_probability: f64,
    pub composite_score: f64,
    pub outcome: Option<Outcome>,
    pub premium: f64,
}

/// Probability snapshots per option, oldest first.
type Snapshots = HashMap<String, Vec<(NaiveDate, ProbabilitySet)>>;

/// Read-only inputs shared by every per-day task.
struct Shared {
    data: MarketData,
    config: Config,
    recovery: RecoveryTable,
    snapshots: Snapshots,
}

/// Replays the recommendation pipeline over historical trading days and
/// scores the outcome of every option that expired inside the window.
pub struct BacktestRunner {
    shared: Arc<Shared>,
}

impl BacktestRunner {
    pub fn new(data: MarketData, config: Config) -> Self {
        let recovery = RecoveryTable::from_rows(&data.recovery_rows);

        let mut snapshots: Snapshots = HashMap::new();
        for row in &data.probability_history {
            if let Some(d) = row.update_date {
                snapshots
                    .entry(row.option_name.trim().to_string())
                    .or_default()
                    .push((d, row.probabilities));
            }
        }
        for list in snapshots.values_mut() {
            list.sort_by_key(|(d, _)| *d);
        }

        Self {
            shared: Arc::new(Shared {
                data,
                config,
                recovery,
                snapshots,
            }),
        }
    }

    /// Dates with at least one price bar in [start, end].
    pub fn trading_days(&self, start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
        let days: BTreeSet<NaiveDate> = self
            .shared
            .data
            .histories
            .values()
            .flat_map(|s| s.dates())
            .filter(|d| *d >= start && *d <= end)
            .collect();
        days.into_iter().collect()
    }

    /// Run every trading day as an independent blocking task. Records are
    /// returned in chronological order, then by rank within a day.
    pub async fn run(&self, start: NaiveDate, end: NaiveDate) -> Result<BacktestReport> {
        let days = self.trading_days(start, end);
        let total = days.len();
        let cfg = &self.shared.config;

        info!("=== BACKTEST START ===");
        info!(
            "Period: {} to {} ({} trading days, {}d support, DTE {}..={} {})",
            start.format("%Y-%m-%d"),
            end.format("%Y-%m-%d"),
            total,
            cfg.filters.rolling_period,
            cfg.backtest.min_dte,
            cfg.backtest.max_dte,
            cfg.backtest.day_count
        );

        let permits = Arc::new(Semaphore::new(cfg.analysis_workers.max(1)));
        let mut set = JoinSet::new();
        for day in days {
            let shared = Arc::clone(&self.shared);
            let permits = Arc::clone(&permits);
            set.spawn(async move {
                let _permit = permits.acquire_owned().await;
                let records =
                    tokio::task::spawn_blocking(move || evaluate_day(&shared, day, end)).await;
                (day, records)
            });
        }

        let log_interval = (total / 10).max(1);
        let mut per_day: Vec<(NaiveDate, Vec<BacktestRecord>)> = Vec::with_capacity(total);
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((day, Ok(records))) => per_day.push((day, records)),
                Ok((day, Err(e))) => warn!("Backtest day {} failed: {}", day, e),
                Err(e) => warn!("Backtest task failed: {}", e),
            }
            if per_day.len() % log_interval == 0 {
                info!(
                    "  Progress: {}/{} days ({:.0}%)",
                    per_day.len(),
                    total,
                    per_day.len() as f64 / total.max(1) as f64 * 100.0
                );
            }
        }

        per_day.sort_by_key(|(day, _)| *day);
        let evaluated = per_day.len();
        let records: Vec<BacktestRecord> =
            per_day.into_iter().flat_map(|(_, r)| r).collect();

        info!("=== BACKTEST COMPLETE === {} scored rows", records.len());
        Ok(BacktestReport::from_records(start, end, evaluated, records))
    }
}

/// Score every eligible option as of `day` using only data known then.
fn evaluate_day(shared: &Shared, day: NaiveDate, end: NaiveDate) -> Vec<BacktestRecord> {
    let cfg = &shared.config;
    let data = &shared.data;
    let day_count = cfg.backtest.day_count.strategy();

    let active: Vec<OptionRecord> = data
        .options
        .iter()
        .filter(|o| o.expiry_date >= day)
        .filter(|o| {
            let dte = day_count.days_between(day, o.expiry_date);
            dte >= cfg.backtest.min_dte && dte <= cfg.backtest.max_dte
        })
        .map(|o| as_of_snapshot(o, &shared.snapshots, day))
        .collect();
    if active.is_empty() {
        return Vec::new();
    }

    let analyzer = SupportAnalyzer::with_max_gap(cfg.max_gap_days);
    let period = cfg.filters.rolling_period;
    let stocks: HashSet<&str> = active.iter().map(|o| o.stock_name.as_str()).collect();
    let support: SupportMetrics = stocks
        .into_iter()
        .filter_map(|stock| {
            let series = data.histories.get(stock)?.until(day);
            match analyzer.analyze(stock, &series, period, day) {
                Ok(metric) => Some(metric),
                Err(e) => {
                    debug!("{}: no support for {}: {}", day, stock, e);
                    None
                }
            }
        })
        .collect();

    let known_monthly = months_before(&data.monthly_rows, day);

    let tables = LookupTables {
        recovery: shared.recovery.clone(),
        monthly: MonthlyStats::for_month(&known_monthly, day.month()),
        performance: StockPerformance::as_of(&data.histories, day),
        peaks: ProbabilityPeaks::from_history_until(&data.probability_history, Some(day)),
    };

    let mut filters = cfg.filters.clone();
    filters.expiry_date = None;
    let engine = ScoringEngine::new(filters, &cfg.weights).with_day_count(cfg.backtest.day_count);
    let ranked = engine.analyze(&active, &support, &tables, day);

    debug!("{}: {} active, {} scored", day, active.len(), ranked.len());

    ranked
        .into_iter()
        .map(|rec| {
            let outcome = if rec.expiry_date <= end {
                data.histories
                    .get(&rec.stock_name)
                    .and_then(|s| s.close_on(rec.expiry_date))
                    .map(|close| Outcome::at_expiry(close, rec.strike_price))
            } else {
                None
            };
            BacktestRecord {
                date: day,
                option_name: rec.option_name,
                stock_name: rec.stock_name,
                strike_price: rec.strike_price,
                expiry_date: rec.expiry_date,
                days_to_expiry: rec.days_to_expiry,
                current_probability: rec.current_probability,
                composite_score: rec.composite_score,
                outcome,
                premium: rec.premium,
            }
        })
        .collect()
}

/// The option with its probabilities replaced by the newest snapshot on or
/// before `day`, when one exists.
fn as_of_snapshot(option: &OptionRecord, snapshots: &Snapshots, day: NaiveDate) -> OptionRecord {
    let mut out = option.clone();
    if let Some(list) = snapshots.get(&option.option_name) {
        let idx = list.partition_point(|(d, _)| *d <= day);
        if let Some((_, probs)) = idx.checked_sub(1).map(|i| list[i]) {
            out.probabilities = probs;
        }
    }
    out
}

/// Monthly rows for months that closed before `day`. Rows without a year
/// cannot be placed in time and are left out.
fn months_before(rows: &[MonthlyReturnRow], day: NaiveDate) -> Vec<MonthlyReturnRow> {
    rows.iter()
        .filter(|r| r.year.map_or(false, |y| (y, r.month) < (day.year(), day.month())))
        .cloned()
        .collect()
}
