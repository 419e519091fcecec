pub mod clusters;
pub mod day_count;
pub mod stats;
pub mod support_analyzer;
pub mod support_breaks;
