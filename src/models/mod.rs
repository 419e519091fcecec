pub mod option;
pub mod price_bar;
pub mod raw;
pub mod recommendation;
pub mod support;

pub use option::{OptionRecord, ProbabilityMethod, ProbabilitySet};
pub use price_bar::{PriceBar, PriceHistories, PriceSeries};
pub use raw::{MonthlyReturnRow, ProbabilityHistoryRow, RecoveryRow};
pub use recommendation::{
    DataStatus, RecommendedOption, ScoreBreakdown, ScoreComponent, ScoreGrade,
};
pub use support::{
    BreakCluster, BreakEvent, PatternType, RollingLowPoint, StabilityTrend, SupportBreakdown,
    SupportMetric, SupportMetrics, ROLLING_PERIODS,
};
