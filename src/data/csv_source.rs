use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::data::DataSource;
use crate::error::DataError;
use crate::models::{
    MonthlyReturnRow, OptionRecord, PatternType, PriceBar, PriceHistories, PriceSeries,
    ProbabilityHistoryRow, ProbabilityMethod, ProbabilitySet, RecoveryRow, StabilityTrend,
    SupportMetric, SupportMetrics,
};

pub const STOCK_DATA_FILE: &str = "stock_data.csv";
pub const OPTIONS_FILE: &str = "data.csv";
pub const RECOVERY_FILE: &str = "recovery_report_data.csv";
pub const MONTHLY_FILE: &str = "Stocks_Monthly_Data.csv";
pub const PROBABILITY_HISTORY_FILE: &str = "probability_history.csv";
pub const SUPPORT_METRICS_FILE: &str = "support_level_metrics.csv";

/// Reads the pipe-delimited export files from one directory.
pub struct CsvDataSource {
    dir: PathBuf,
}

impl CsvDataSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path(&self, file: &str) -> PathBuf {
        self.dir.join(file)
    }
}

/// A record with columns looked up by header name. Empty cells read as
/// missing and unparseable numbers degrade to `None`.
struct Row<'a> {
    columns: &'a HashMap<String, usize>,
    record: &'a StringRecord,
}

impl<'a> Row<'a> {
    fn str(&self, name: &str) -> Option<&'a str> {
        let idx = *self.columns.get(name)?;
        self.record
            .get(idx)
            .map(str::trim)
            .filter(|v| !v.is_empty() && !v.eq_ignore_ascii_case("nan"))
    }

    fn string(&self, name: &str) -> String {
        self.str(name).unwrap_or_default().to_string()
    }

    fn f64(&self, name: &str) -> Option<f64> {
        self.str(name)?.parse::<f64>().ok().filter(|v| v.is_finite())
    }

    /// Integers written by float-typed exporters ("40.0") are accepted.
    fn i64(&self, name: &str) -> Option<i64> {
        let raw = self.str(name)?;
        raw.parse::<i64>()
            .ok()
            .or_else(|| raw.parse::<f64>().ok().filter(|v| v.is_finite()).map(|v| v as i64))
    }

    fn u32(&self, name: &str) -> Option<u32> {
        self.i64(name).and_then(|v| u32::try_from(v).ok())
    }

    fn u64(&self, name: &str) -> Option<u64> {
        self.i64(name).and_then(|v| u64::try_from(v).ok())
    }

    fn date(&self, name: &str) -> Option<NaiveDate> {
        parse_date(self.str(name)?)
    }

    fn probabilities(&self) -> ProbabilitySet {
        let mut set = ProbabilitySet::default();
        for method in ProbabilityMethod::ALL {
            set.set(method, self.f64(method.field_name()));
        }
        set
    }
}

/// `YYYY-MM-DD`, optionally followed by a time part.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let day = raw.trim().get(..10)?;
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}

/// Read every record of a delimited file and map it through `parse`.
/// Rows `parse` rejects are counted and skipped.
fn read_rows<T>(
    path: &Path,
    delimiter: u8,
    mut parse: impl FnMut(&Row<'_>) -> Option<T>,
) -> Result<Vec<T>, DataError> {
    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .inspect_err(|e| warn!("Failed to open {}: {}", path.display(), e))?;

    let columns: HashMap<String, usize> = reader
        .headers()
        .inspect_err(|e| warn!("Failed to read header of {}: {}", path.display(), e))?
        .iter()
        .enumerate()
        .map(|(i, h)| (h.trim().trim_start_matches('\u{feff}').to_string(), i))
        .collect();

    let mut out = Vec::new();
    let mut skipped = 0usize;
    for result in reader.records() {
        let record = match result {
            Ok(r) => r,
            Err(e) => {
                warn!("Bad record in {}: {}", path.display(), e);
                skipped += 1;
                continue;
            }
        };
        match parse(&Row {
            columns: &columns,
            record: &record,
        }) {
            Some(row) => out.push(row),
            None => skipped += 1,
        }
    }

    if skipped > 0 {
        warn!("Skipped {} unusable rows in {}", skipped, path.display());
    }
    info!("Loaded {} rows from {}", out.len(), path.display());
    Ok(out)
}

/// Like `read_rows`, but a missing file yields no rows.
fn read_optional_rows<T>(
    path: &Path,
    parse: impl FnMut(&Row<'_>) -> Option<T>,
) -> Result<Vec<T>, DataError> {
    if !path.exists() {
        warn!("{} not found, continuing without it", path.display());
        return Ok(Vec::new());
    }
    read_rows(path, b'|', parse)
}

/// Pipe unless the header line has commas and no pipes.
fn sniff_delimiter(path: &Path) -> Result<u8, DataError> {
    let content = std::fs::read_to_string(path)
        .inspect_err(|e| warn!("Failed to open {}: {}", path.display(), e))?;
    let header = content.lines().next().unwrap_or_default();
    Ok(if !header.contains('|') && header.contains(',') {
        b','
    } else {
        b'|'
    })
}

fn parse_support_metric(row: &Row<'_>) -> Option<SupportMetric> {
    let stock_name = row.str("stock_name")?.to_string();
    let rolling_period = row.u32("rolling_period")?;
    Some(SupportMetric {
        stock_name,
        rolling_period,
        current_price: row.f64("current_price"),
        rolling_low: row.f64("rolling_low"),
        distance_to_support_pct: row.f64("distance_to_support_pct"),
        total_breaks: row.u64("total_breaks").unwrap_or(0) as usize,
        days_since_last_break: row.i64("days_since_last_break"),
        last_break_date: row.date("last_break_date"),
        support_stability_pct: row.f64("support_stability_pct").unwrap_or(100.0),
        stability_trend: row
            .str("stability_trend")
            .and_then(StabilityTrend::parse)
            .unwrap_or(StabilityTrend::Stable),
        median_drop_per_break_pct: row.f64("median_drop_per_break_pct"),
        avg_drop_per_break_pct: row.f64("avg_drop_per_break_pct"),
        max_drop_pct: row.f64("max_drop_pct"),
        drop_std_dev_pct: row.f64("drop_std_dev_pct").unwrap_or(0.0),
        avg_days_between_breaks: row.f64("avg_days_between_breaks"),
        median_days_between_breaks: row.f64("median_days_between_breaks"),
        trading_days_per_break: row.f64("trading_days_per_break").unwrap_or(0.0),
        num_clusters: row.u64("num_clusters").unwrap_or(0) as usize,
        max_consecutive_breaks: row.u64("max_consecutive_breaks").unwrap_or(0) as usize,
        current_consecutive_breaks: row.u64("current_consecutive_breaks").unwrap_or(0) as usize,
        support_strength_score: row.f64("support_strength_score").unwrap_or(0.0),
        pattern_type: row
            .str("pattern_type")
            .and_then(PatternType::parse)
            .unwrap_or(PatternType::PredictableCycles),
        break_probability_30d: row.f64("break_probability_30d").unwrap_or(0.0),
        break_probability_60d: row.f64("break_probability_60d").unwrap_or(0.0),
        data_through_date: row.date("data_through_date"),
    })
}

#[async_trait]
impl DataSource for CsvDataSource {
    async fn price_histories(&self) -> Result<PriceHistories> {
        let rows = read_rows(&self.path(STOCK_DATA_FILE), b'|', |row| {
            let name = row.str("name")?.to_string();
            let close = row.f64("close")?;
            let bar = PriceBar {
                date: row.date("date")?,
                open: row.f64("open").unwrap_or(close),
                high: row.f64("high").unwrap_or(close),
                low: row.f64("low").unwrap_or(close),
                close,
            };
            Some((name, bar))
        })?;

        let mut grouped: BTreeMap<String, Vec<PriceBar>> = BTreeMap::new();
        for (name, bar) in rows {
            grouped.entry(name).or_default().push(bar);
        }
        Ok(grouped
            .into_iter()
            .map(|(name, bars)| (name, PriceSeries::new(bars)))
            .collect())
    }

    async fn options(&self) -> Result<Vec<OptionRecord>> {
        let rows = read_rows(&self.path(OPTIONS_FILE), b'|', |row| {
            Some(OptionRecord {
                option_name: row.str("OptionName")?.to_string(),
                stock_name: row.str("StockName")?.to_string(),
                strike_price: row.f64("StrikePrice")?,
                expiry_date: row.date("ExpiryDate")?,
                premium: row.f64("Premium").unwrap_or(0.0),
                bid: row.f64("Bid"),
                ask: row.f64("Ask"),
                probabilities: row.probabilities(),
                potential_loss: row.f64("PotentialLossAtLowerBound"),
            })
        })?;
        Ok(rows)
    }

    async fn recovery_rows(&self) -> Result<Vec<RecoveryRow>> {
        let rows = read_optional_rows(&self.path(RECOVERY_FILE), |row| {
            Some(RecoveryRow {
                data_type: row.string("DataType"),
                stock: row.string("Stock"),
                historical_peak_threshold: row.f64("HistoricalPeakThreshold"),
                prob_method: row.string("ProbMethod"),
                current_prob_bin: row.string("CurrentProb_Bin"),
                dte_bin: row.string("DTE_Bin"),
                worthless_rate_pct: row.f64("RecoveryCandidate_WorthlessRate_pct"),
                candidate_n: row.u64("RecoveryCandidate_N"),
                baseline_n: row.u64("AllOptions_N"),
            })
        })?;
        Ok(rows)
    }

    async fn monthly_rows(&self) -> Result<Vec<MonthlyReturnRow>> {
        let rows = read_optional_rows(&self.path(MONTHLY_FILE), |row| {
            Some(MonthlyReturnRow {
                name: row.str("name")?.to_string(),
                year: row.i64("year").and_then(|y| i32::try_from(y).ok()),
                month: row.u32("month").filter(|m| (1..=12).contains(m))?,
                pct_return_month: row.f64("pct_return_month"),
                day_low_day_of_month: row.u32("day_low_day_of_month"),
                pct_open_to_low: row.f64("pct_open_to_low"),
            })
        })?;
        Ok(rows)
    }

    async fn probability_history(&self) -> Result<Vec<ProbabilityHistoryRow>> {
        let rows = read_optional_rows(&self.path(PROBABILITY_HISTORY_FILE), |row| {
            Some(ProbabilityHistoryRow {
                option_name: row.str("OptionName")?.to_string(),
                update_date: row.date("Update_date"),
                probabilities: row.probabilities(),
            })
        })?;
        Ok(rows)
    }

    async fn support_metrics(&self) -> Result<Option<SupportMetrics>> {
        let path = self.path(SUPPORT_METRICS_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let delimiter = sniff_delimiter(&path)?;
        let rows = read_rows(&path, delimiter, parse_support_metric)?;
        Ok(Some(rows.into_iter().collect()))
    }
}

/// Write metrics in the same layout `support_metrics` reads.
pub fn write_support_metrics(path: &Path, metrics: &SupportMetrics) -> Result<(), DataError> {
    let mut writer = WriterBuilder::new()
        .delimiter(b'|')
        .from_path(path)
        .inspect_err(|e| warn!("Failed to create {}: {}", path.display(), e))?;
    for metric in metrics.sorted() {
        writer.serialize(metric)?;
    }
    writer.flush()?;
    info!("Wrote {} support metrics to {}", metrics.len(), path.display());
    Ok(())
}
