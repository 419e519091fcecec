pub mod backtesting;
pub mod config;
pub mod core;
pub mod data;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod portfolio;
pub mod scoring;
#[cfg(test)]
pub mod test_helpers;
