use anyhow::Result;
use async_trait::async_trait;

use crate::data::{DataSource, MarketData};
use crate::models::{
    MonthlyReturnRow, OptionRecord, PriceHistories, ProbabilityHistoryRow, RecoveryRow,
    SupportMetrics,
};

/// A `DataSource` over records already in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    data: MarketData,
}

impl InMemorySource {
    pub fn new(data: MarketData) -> Self {
        Self { data }
    }

    pub fn with_histories(mut self, histories: PriceHistories) -> Self {
        self.data.histories = histories;
        self
    }

    pub fn with_options(mut self, options: Vec<OptionRecord>) -> Self {
        self.data.options = options;
        self
    }

    pub fn with_recovery_rows(mut self, rows: Vec<RecoveryRow>) -> Self {
        self.data.recovery_rows = rows;
        self
    }

    pub fn with_monthly_rows(mut self, rows: Vec<MonthlyReturnRow>) -> Self {
        self.data.monthly_rows = rows;
        self
    }

    pub fn with_probability_history(mut self, rows: Vec<ProbabilityHistoryRow>) -> Self {
        self.data.probability_history = rows;
        self
    }

    pub fn with_support(mut self, support: SupportMetrics) -> Self {
        self.data.support = Some(support);
        self
    }
}

#[async_trait]
impl DataSource for InMemorySource {
    async fn price_histories(&self) -> Result<PriceHistories> {
        Ok(self.data.histories.clone())
    }

    async fn options(&self) -> Result<Vec<OptionRecord>> {
        Ok(self.data.options.clone())
    }

    async fn recovery_rows(&self) -> Result<Vec<RecoveryRow>> {
        Ok(self.data.recovery_rows.clone())
    }

    async fn monthly_rows(&self) -> Result<Vec<MonthlyReturnRow>> {
        Ok(self.data.monthly_rows.clone())
    }

    async fn probability_history(&self) -> Result<Vec<ProbabilityHistoryRow>> {
        Ok(self.data.probability_history.clone())
    }

    async fn support_metrics(&self) -> Result<Option<SupportMetrics>> {
        Ok(self.data.support.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::load_all;
    use crate::error::DataError;
    use crate::test_helpers::{date, make_bars, sample_option};

    #[tokio::test]
    async fn missing_prices_or_options_is_fatal() {
        let err = load_all(&InMemorySource::default(), false).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DataError>(),
            Some(DataError::MissingRequiredData("price history"))
        ));

        let mut histories = PriceHistories::new();
        histories.insert("ABB".into(), make_bars(date(2024, 1, 1), &[10.0, 11.0]));
        let source = InMemorySource::default().with_histories(histories.clone());
        let err = load_all(&source, false).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DataError>(),
            Some(DataError::MissingRequiredData("option list"))
        ));

        let source = source.with_options(vec![sample_option("ABB4P10", "ABB", 10.0, date(2024, 2, 16))]);
        let data = load_all(&source, true).await.unwrap();
        assert_eq!(data.options.len(), 1);
        assert!(data.support.is_none());
        assert!(data.recovery_rows.is_empty());
    }
}
