pub mod report;
pub mod runner;

pub use report::{BacktestReport, ScoreBucket};
pub use runner::{BacktestRecord, BacktestRunner, Outcome};
