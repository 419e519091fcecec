pub mod csv_source;
pub mod memory;

pub use csv_source::CsvDataSource;
pub use memory::InMemorySource;

use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

use crate::error::DataError;
use crate::models::{
    MonthlyReturnRow, OptionRecord, PriceHistories, ProbabilityHistoryRow, RecoveryRow,
    SupportMetrics,
};

/// Supplies the input records the pipeline runs on.
#[async_trait]
pub trait DataSource: Send + Sync {
    async fn price_histories(&self) -> Result<PriceHistories>;
    async fn options(&self) -> Result<Vec<OptionRecord>>;
    async fn recovery_rows(&self) -> Result<Vec<RecoveryRow>>;
    async fn monthly_rows(&self) -> Result<Vec<MonthlyReturnRow>>;
    async fn probability_history(&self) -> Result<Vec<ProbabilityHistoryRow>>;
    /// Precomputed support metrics, if the source has any.
    async fn support_metrics(&self) -> Result<Option<SupportMetrics>>;
}

/// Everything loaded for one run.
#[derive(Debug, Clone, Default)]
pub struct MarketData {
    pub histories: PriceHistories,
    pub options: Vec<OptionRecord>,
    pub recovery_rows: Vec<RecoveryRow>,
    pub monthly_rows: Vec<MonthlyReturnRow>,
    pub probability_history: Vec<ProbabilityHistoryRow>,
    pub support: Option<SupportMetrics>,
}

/// Load every input. Price history and options are required; the other
/// tables may be empty and only make their factors unavailable.
pub async fn load_all(source: &dyn DataSource, with_precomputed_support: bool) -> Result<MarketData> {
    let histories = source.price_histories().await?;
    if histories.values().all(|s| s.is_empty()) {
        return Err(DataError::MissingRequiredData("price history").into());
    }
    let options = source.options().await?;
    if options.is_empty() {
        return Err(DataError::MissingRequiredData("option list").into());
    }

    let support = if with_precomputed_support {
        source.support_metrics().await?
    } else {
        None
    };

    let data = MarketData {
        histories,
        options,
        recovery_rows: source.recovery_rows().await?,
        monthly_rows: source.monthly_rows().await?,
        probability_history: source.probability_history().await?,
        support,
    };

    info!(
        "Loaded {} stocks, {} options, {} recovery rows, {} monthly rows, {} probability snapshots",
        data.histories.len(),
        data.options.len(),
        data.recovery_rows.len(),
        data.monthly_rows.len(),
        data.probability_history.len()
    );
    Ok(data)
}
