use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::core::stats::{mean, quantile};
use crate::error::DataError;

use super::runner::{BacktestRecord, Outcome};

/// Score buckets as (label, min inclusive, max exclusive). The top bucket
/// also takes a score of exactly 100.
const SCORE_BUCKETS: [(&str, f64, f64); 6] = [
    ("90-100", 90.0, 100.0),
    ("80-90", 80.0, 90.0),
    ("70-80", 70.0, 80.0),
    ("60-70", 60.0, 70.0),
    ("50-60", 50.0, 60.0),
    ("<50", 0.0, 50.0),
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreBucket {
    pub label: String,
    pub min_score: f64,
    pub max_score: f64,
    pub n: usize,
    pub worthless_count: usize,
    pub hit_rate_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestReport {
    // Period
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub trading_days: usize,

    // Outcomes
    pub total_records: usize,
    pub with_outcome: usize,
    pub worthless: usize,
    pub in_the_money: usize,

    // Hit rates
    pub buckets: Vec<ScoreBucket>,
    pub overall_hit_rate: Option<f64>,
    pub avg_score: Option<f64>,
    pub top_quartile_hit_rate: Option<f64>,
    pub bottom_quartile_hit_rate: Option<f64>,
    pub score_spread: Option<f64>,

    pub records: Vec<BacktestRecord>,
}

fn hit_rate(rows: &[&BacktestRecord]) -> Option<f64> {
    if rows.is_empty() {
        return None;
    }
    let worthless = rows
        .iter()
        .filter(|r| r.outcome == Some(Outcome::Worthless))
        .count();
    Some(worthless as f64 / rows.len() as f64 * 100.0)
}

impl BacktestReport {
    /// Hit-rate statistics over the records whose outcome is known.
    pub fn from_records(
        start: NaiveDate,
        end: NaiveDate,
        trading_days: usize,
        records: Vec<BacktestRecord>,
    ) -> Self {
        let known: Vec<&BacktestRecord> = records.iter().filter(|r| r.outcome.is_some()).collect();
        let worthless = known
            .iter()
            .filter(|r| r.outcome == Some(Outcome::Worthless))
            .count();

        let buckets = SCORE_BUCKETS
            .iter()
            .filter_map(|&(label, min, max)| {
                let rows: Vec<&BacktestRecord> = known
                    .iter()
                    .copied()
                    .filter(|r| {
                        let s = r.composite_score;
                        s >= min && (s < max || (max == 100.0 && s <= max))
                    })
                    .collect();
                let n = rows.len();
                hit_rate(&rows).map(|rate| ScoreBucket {
                    label: label.to_string(),
                    min_score: min,
                    max_score: max,
                    n,
                    worthless_count: rows
                        .iter()
                        .filter(|r| r.outcome == Some(Outcome::Worthless))
                        .count(),
                    hit_rate_pct: rate,
                })
            })
            .collect();

        let scores: Vec<f64> = known.iter().map(|r| r.composite_score).collect();
        let (top, bottom) = match (quantile(&scores, 0.75), quantile(&scores, 0.25)) {
            (Some(q75), Some(q25)) => {
                let top: Vec<&BacktestRecord> =
                    known.iter().copied().filter(|r| r.composite_score >= q75).collect();
                let bottom: Vec<&BacktestRecord> =
                    known.iter().copied().filter(|r| r.composite_score <= q25).collect();
                (hit_rate(&top), hit_rate(&bottom))
            }
            _ => (None, None),
        };

        Self {
            start,
            end,
            trading_days,
            total_records: records.len(),
            with_outcome: known.len(),
            worthless,
            in_the_money: known.len() - worthless,
            buckets,
            overall_hit_rate: hit_rate(&known),
            avg_score: mean(&scores),
            top_quartile_hit_rate: top,
            bottom_quartile_hit_rate: bottom,
            score_spread: top.zip(bottom).map(|(t, b)| t - b),
            records,
        }
    }

    pub fn print_summary(&self) {
        let pct = |v: Option<f64>| v.map_or("n/a".to_string(), |v| format!("{:.1}%", v));

        println!("\n{}", "=".repeat(70));
        println!("  BACKTEST REPORT");
        println!("{}", "=".repeat(70));
        println!(
            "  Period:      {} to {} ({} trading days)",
            self.start.format("%Y-%m-%d"),
            self.end.format("%Y-%m-%d"),
            self.trading_days
        );
        println!();
        println!("  OUTCOMES");
        println!("  ───────────────────────────────────");
        println!("  Scored:      {}", self.total_records);
        println!("  Known:       {}", self.with_outcome);
        println!("  Worthless:   {}", self.worthless);
        println!("  ITM:         {}", self.in_the_money);

        if self.with_outcome == 0 {
            println!();
            println!("  No options with known outcomes.");
            println!("{}\n", "=".repeat(70));
            return;
        }

        println!();
        println!("  BY SCORE");
        println!("  ───────────────────────────────────");
        for b in &self.buckets {
            println!(
                "  {:>8}: {:5.1}% worthless (n={:4})",
                b.label, b.hit_rate_pct, b.n
            );
        }
        println!();
        println!("  OVERALL");
        println!("  ───────────────────────────────────");
        println!("  Hit Rate:    {}", pct(self.overall_hit_rate));
        println!("  Avg Score:   {:.1}", self.avg_score.unwrap_or(0.0));
        println!("  Top 25%:     {}", pct(self.top_quartile_hit_rate));
        println!("  Bottom 25%:  {}", pct(self.bottom_quartile_hit_rate));
        println!(
            "  Spread:      {}",
            self.score_spread
                .map_or("n/a".to_string(), |s| format!("{:+.1} pp", s))
        );
        println!("{}\n", "=".repeat(70));
    }

    pub fn save_json(&self, path: &Path) -> Result<(), DataError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}
