use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::Config;
use crate::core::support_analyzer::{analyze_universe, latest_date};
use crate::data::{load_all, DataSource};
use crate::error::DataError;
use crate::models::{RecommendedOption, SupportMetrics};
use crate::portfolio::{PortfolioConstructor, PortfolioSelection};
use crate::scoring::{LookupTables, ScoringEngine};

/// Results of one recommendation run.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub as_of: NaiveDate,
    pub support: SupportMetrics,
    pub recommendations: Vec<RecommendedOption>,
    pub portfolio: PortfolioSelection,
}

impl RunOutput {
    /// Write recommendations, portfolio and support metrics under `dir`.
    pub fn save(&self, dir: &Path) -> Result<()> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
        let stamp = self.as_of.format("%Y%m%d");

        write_json(
            &dir.join(format!("recommendations_{}.json", stamp)),
            &self.recommendations,
        )?;
        write_json(&dir.join(format!("portfolio_{}.json", stamp)), &self.portfolio)?;
        crate::data::csv_source::write_support_metrics(
            &dir.join(crate::data::csv_source::SUPPORT_METRICS_FILE),
            &self.support,
        )?;
        info!("Results written to {}", dir.display());
        Ok(())
    }
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), DataError> {
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, json)
        .inspect_err(|e| warn!("Failed to write {}: {}", path.display(), e))?;
    Ok(())
}

/// Load, analyze support, score, rank and build a portfolio.
pub struct Recommender {
    config: Config,
    source: Box<dyn DataSource>,
}

impl Recommender {
    pub fn new(config: Config, source: Box<dyn DataSource>) -> Self {
        info!("{}", "=".repeat(60));
        info!("Put recommender as of {}", config.as_of);
        info!(
            "Window: {}d | min days since break: {} | method: {} | peak threshold: {:.2}",
            config.filters.rolling_period,
            config.filters.min_days_since_break,
            config.filters.probability_method,
            config.filters.historical_peak_threshold
        );
        info!(
            "Portfolio: target {:.0} {} | underlying {:.0} | cost {:.0}",
            config.portfolio.target_premium,
            config.portfolio.currency,
            config.portfolio.underlying_value,
            config.portfolio.transaction_cost
        );
        info!("{}", "=".repeat(60));
        Self { config, source }
    }

    pub async fn run(&self) -> Result<RunOutput> {
        let cfg = &self.config;
        cfg.validate()?;

        let data = load_all(self.source.as_ref(), cfg.use_precomputed_support).await?;
        let as_of = cfg.as_of;
        let histories = Arc::new(data.histories);

        let support = match data.support {
            Some(precomputed) if precomputed.has_period(cfg.filters.rolling_period) => {
                info!("Using {} precomputed support metrics", precomputed.len());
                precomputed
            }
            _ => {
                let latest = latest_date(&histories).unwrap_or(as_of);
                let mut periods = cfg.rolling_periods.clone();
                if !periods.contains(&cfg.filters.rolling_period) {
                    periods.push(cfg.filters.rolling_period);
                }
                analyze_universe(
                    Arc::clone(&histories),
                    &periods,
                    cfg.max_gap_days,
                    latest,
                    cfg.analysis_workers,
                )
                .await
            }
        };

        // Build phase ends here: every table is complete before scoring.
        let tables = LookupTables::build(
            &data.recovery_rows,
            &data.monthly_rows,
            &histories,
            &data.probability_history,
            as_of,
        );

        let engine = ScoringEngine::new(cfg.filters.clone(), &cfg.weights);
        let recommendations = engine.analyze(&data.options, &support, &tables, as_of);

        let portfolio =
            PortfolioConstructor::new(cfg.portfolio.clone()).build(&data.options, &histories, as_of);

        Ok(RunOutput {
            as_of,
            support,
            recommendations,
            portfolio,
        })
    }
}
