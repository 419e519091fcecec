use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::PortfolioError;
use crate::models::{OptionRecord, ProbabilitySet};

/// Shares per option contract.
pub const CONTRACT_MULTIPLIER: f64 = 100.0;

/// An option re-priced for a fixed notional per position. Joined to its
/// raw row by `option_name`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricedOption {
    pub option_name: String,
    pub stock_name: String,
    pub strike_price: f64,
    pub expiry_date: NaiveDate,
    pub contracts: i64,
    pub mid_price: f64,
    /// Net premium after transaction cost, whole currency units.
    pub premium: f64,
    pub probabilities: ProbabilitySet,
    pub potential_loss: Option<f64>,
}

impl PricedOption {
    pub fn price(
        option: &OptionRecord,
        underlying_value: f64,
        transaction_cost: f64,
    ) -> Result<Self, PortfolioError> {
        if !(option.strike_price > 0.0) {
            return Err(PortfolioError::InvalidStrike {
                option: option.option_name.clone(),
                strike: option.strike_price,
            });
        }
        let bid = option
            .bid
            .ok_or_else(|| PortfolioError::MissingBid(option.option_name.clone()))?;
        let ask = option.ask.unwrap_or(bid);

        let contracts = (underlying_value / option.strike_price / CONTRACT_MULTIPLIER).round();
        let mid_price = (bid + ask) / 2.0;
        let premium = (mid_price * contracts * CONTRACT_MULTIPLIER - transaction_cost).round();

        Ok(Self {
            option_name: option.option_name.clone(),
            stock_name: option.stock_name.clone(),
            strike_price: option.strike_price,
            expiry_date: option.expiry_date,
            contracts: contracts as i64,
            mid_price,
            premium,
            probabilities: option.probabilities,
            potential_loss: option.potential_loss,
        })
    }

    /// Strike exposure of the position.
    pub fn notional(&self) -> f64 {
        self.contracts as f64 * self.strike_price * CONTRACT_MULTIPLIER
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{date, sample_option};

    #[test]
    fn premium_from_mid_and_contracts() {
        let mut o = sample_option("ABB4P100", "ABB", 100.0, date(2024, 4, 19));
        o.bid = Some(2.0);
        o.ask = Some(2.4);
        let p = PricedOption::price(&o, 100_000.0, 99.0).unwrap();
        assert_eq!(p.contracts, 10);
        assert!((p.mid_price - 2.2).abs() < 1e-9);
        // 2.2 * 10 * 100 - 99 = 2101
        assert!((p.premium - 2101.0).abs() < 1e-9);
        assert!((p.notional() - 100_000.0).abs() < 1e-9);
    }

    #[test]
    fn ask_falls_back_to_bid() {
        let mut o = sample_option("VOLV4P300", "VOLV", 300.0, date(2024, 4, 19));
        o.bid = Some(1.5);
        o.ask = None;
        let p = PricedOption::price(&o, 100_000.0, 0.0).unwrap();
        // 100000 / 300 / 100 = 3.33 -> 3
        assert_eq!(p.contracts, 3);
        assert!((p.premium - 450.0).abs() < 1e-9);
    }

    #[test]
    fn rejects_bad_rows() {
        let mut o = sample_option("BAD", "BAD", 0.0, date(2024, 4, 19));
        o.bid = Some(1.0);
        assert!(matches!(
            PricedOption::price(&o, 100_000.0, 0.0),
            Err(PortfolioError::InvalidStrike { .. })
        ));
        let mut o = sample_option("NOBID", "X", 10.0, date(2024, 4, 19));
        o.bid = None;
        assert_eq!(
            PricedOption::price(&o, 100_000.0, 0.0),
            Err(PortfolioError::MissingBid("NOBID".into()))
        );
    }
}
