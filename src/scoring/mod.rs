pub mod binning;
pub mod engine;
pub mod lookups;
pub mod normalize;
pub mod weights;

pub use binning::{DteBin, ProbabilityBin};
pub use engine::ScoringEngine;
pub use lookups::{LookupTables, MonthlyStats, ProbabilityPeaks, RecoveryTable, StockPerformance};
pub use weights::{Factor, ScoreWeights};
