pub mod constructor;
pub mod pricing;

pub use constructor::{Candidate, PortfolioConstructor, PortfolioSelection};
pub use pricing::PricedOption;
