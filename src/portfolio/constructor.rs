use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, info};

use crate::config::PortfolioSettings;
use crate::models::{OptionRecord, PriceHistories, ProbabilityMethod};
use crate::portfolio::pricing::PricedOption;

/// A priced option with the probability used to rank it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    #[serde(flatten)]
    pub option: PricedOption,
    pub probability: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioSelection {
    pub selected: Vec<Candidate>,
    pub total_premium: f64,
    pub total_underlying_value: f64,
    pub total_potential_loss: f64,
    pub target_premium: f64,
    pub achieved: bool,
    pub candidates_considered: usize,
    pub currency: String,
    pub message: String,
}

impl PortfolioSelection {
    pub fn shortfall(&self) -> f64 {
        (self.target_premium - self.total_premium).max(0.0)
    }

    pub fn print_summary(&self) {
        println!("\n{}", "=".repeat(70));
        println!("  PORTFOLIO");
        println!("{}", "=".repeat(70));
        println!("  {}", self.message);
        println!();
        println!("  TOTALS");
        println!("  ───────────────────────────────────");
        println!("  Positions:   {}", self.selected.len());
        println!("  Candidates:  {}", self.candidates_considered);
        println!("  Premium:     {:.0} / {:.0} {}", self.total_premium, self.target_premium, self.currency);
        println!("  Underlying:  {:.0} {}", self.total_underlying_value, self.currency);
        println!("  Pot. Loss:   {:.0} {}", self.total_potential_loss, self.currency);

        if !self.selected.is_empty() {
            println!();
            println!("  POSITIONS");
            println!("  ───────────────────────────────────");
            for (i, c) in self.selected.iter().enumerate() {
                println!(
                    "  {:>3}. {:<12} {:<22} strike {:>8.2} | x{:<3} | {:>7.0} {} | prob {:.1}%",
                    i + 1,
                    c.option.stock_name,
                    c.option.option_name,
                    c.option.strike_price,
                    c.option.contracts,
                    c.option.premium,
                    self.currency,
                    c.probability * 100.0
                );
            }
        }
        println!("{}\n", "=".repeat(70));
    }
}

/// Greedy premium-budget selection, at most one position per stock.
pub struct PortfolioConstructor {
    settings: PortfolioSettings,
}

impl PortfolioConstructor {
    pub fn new(settings: PortfolioSettings) -> Self {
        Self { settings }
    }

    /// Probability sources tried in order. Zero counts as missing, so an
    /// option with a genuine 0.0 takes the weighted average instead.
    pub fn probability_sources(&self) -> [ProbabilityMethod; 2] {
        [self.settings.probability_method, ProbabilityMethod::WeightedAverage]
    }

    pub fn effective_probability(&self, option: &PricedOption) -> f64 {
        self.probability_sources()
            .into_iter()
            .filter_map(|m| option.probabilities.get(m))
            .find(|p| *p != 0.0 && !p.is_nan())
            .unwrap_or(0.0)
    }

    fn min_probability(&self) -> Option<f64> {
        self.settings
            .min_probability_pct
            .filter(|p| *p != 0.0)
            .map(|p| p / 100.0)
    }

    /// Price every option and apply the optional filters.
    pub fn candidates(
        &self,
        options: &[OptionRecord],
        histories: &PriceHistories,
        as_of: NaiveDate,
    ) -> Vec<Candidate> {
        let s = &self.settings;
        let low_since = s
            .strike_below_period
            .filter(|days| *days > 0)
            .map(|days| as_of - Duration::days(days));
        let min_prob = self.min_probability();

        let mut unpriced = 0usize;
        let mut out = Vec::new();
        for option in options {
            let priced = match PricedOption::price(option, s.underlying_value, s.transaction_cost) {
                Ok(p) => p,
                Err(e) => {
                    debug!("Not priced: {}", e);
                    unpriced += 1;
                    continue;
                }
            };
            if !(priced.premium > 0.0) {
                continue;
            }
            if let Some(since) = low_since {
                let low = histories
                    .get(&priced.stock_name)
                    .and_then(|series| series.until(as_of).lowest_close_since(since));
                match low {
                    Some(low) if priced.strike_price <= low => {}
                    _ => continue,
                }
            }
            if s.expiry_date.is_some_and(|d| priced.expiry_date != d) {
                continue;
            }
            let probability = self.effective_probability(&priced);
            if min_prob.is_some_and(|min| probability < min) {
                continue;
            }
            out.push(Candidate {
                option: priced,
                probability,
            });
        }

        info!(
            "Portfolio candidates: {} of {} options ({} could not be priced)",
            out.len(),
            options.len(),
            unpriced
        );
        out
    }

    /// Closest to the minimum probability first when one is set, otherwise
    /// highest probability first. Higher premium breaks ties.
    pub fn sort_candidates(&self, candidates: &mut [Candidate]) {
        match self.min_probability() {
            Some(target) => candidates.sort_by(|a, b| {
                (a.probability - target)
                    .abs()
                    .total_cmp(&(b.probability - target).abs())
                    .then(b.option.premium.total_cmp(&a.option.premium))
            }),
            None => candidates.sort_by(|a, b| {
                b.probability
                    .total_cmp(&a.probability)
                    .then(b.option.premium.total_cmp(&a.option.premium))
            }),
        }
    }

    /// Select from an already sorted candidate list.
    pub fn select(&self, sorted: &[Candidate]) -> PortfolioSelection {
        let target = self.settings.target_premium;
        let mut used: HashSet<&str> = HashSet::new();
        let mut chosen: Vec<usize> = Vec::new();
        let mut total = 0.0;

        for (i, c) in sorted.iter().enumerate() {
            if used.contains(c.option.stock_name.as_str()) {
                continue;
            }
            if total + c.option.premium <= target {
                used.insert(&c.option.stock_name);
                chosen.push(i);
                total += c.option.premium;
            }
        }

        if total < target {
            let remaining = target - total;
            let backfill: Vec<usize> = sorted
                .iter()
                .enumerate()
                .filter(|(_, c)| {
                    !used.contains(c.option.stock_name.as_str()) && c.option.premium <= remaining
                })
                .map(|(i, _)| i)
                .collect();
            for i in backfill {
                let c = &sorted[i];
                if used.contains(c.option.stock_name.as_str()) {
                    continue;
                }
                if total + c.option.premium <= target {
                    used.insert(&c.option.stock_name);
                    chosen.push(i);
                    total += c.option.premium;
                }
            }
        }

        let selected: Vec<Candidate> = chosen.into_iter().map(|i| sorted[i].clone()).collect();
        let total_underlying_value = selected.iter().map(|c| c.option.notional()).sum();
        let total_potential_loss = selected
            .iter()
            .filter_map(|c| c.option.potential_loss)
            .sum();
        let achieved = total >= target;
        let currency = self.settings.currency.clone();
        let message = if achieved {
            format!(
                "Portfolio generated with {:.0} {} premium, meeting the target.",
                total, currency
            )
        } else {
            format!(
                "Portfolio generated with {:.0} {} premium ({:.0} {} below target). Available options could not reach the full target amount.",
                total,
                currency,
                target - total,
                currency
            )
        };

        info!(
            "Selected {} positions, premium {:.0}/{:.0} {}",
            selected.len(),
            total,
            target,
            currency
        );

        PortfolioSelection {
            selected,
            total_premium: total,
            total_underlying_value,
            total_potential_loss,
            target_premium: target,
            achieved,
            candidates_considered: sorted.len(),
            currency,
            message,
        }
    }

    /// Price, filter, sort once, then run the greedy and backfill passes.
    pub fn build(
        &self,
        options: &[OptionRecord],
        histories: &PriceHistories,
        as_of: NaiveDate,
    ) -> PortfolioSelection {
        let mut candidates = self.candidates(options, histories, as_of);
        self.sort_candidates(&mut candidates);
        self.select(&candidates)
    }
}
