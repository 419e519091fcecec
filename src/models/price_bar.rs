use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

/// One stock's daily bars, ordered by date with at most one bar per day.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct PriceSeries {
    bars: Vec<PriceBar>,
}

/// Price history for every stock in the universe, keyed by stock name.
pub type PriceHistories = BTreeMap<String, PriceSeries>;

impl PriceSeries {
    /// Sorts by date and keeps the last bar seen for any duplicated day.
    pub fn new(mut bars: Vec<PriceBar>) -> Self {
        bars.sort_by_key(|b| b.date);
        let mut deduped: Vec<PriceBar> = Vec::with_capacity(bars.len());
        for bar in bars {
            match deduped.last_mut() {
                Some(last) if last.date == bar.date => *last = bar,
                _ => deduped.push(bar),
            }
        }
        Self { bars: deduped }
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn last(&self) -> Option<&PriceBar> {
        self.bars.last()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PriceBar> {
        self.bars.iter()
    }

    pub fn as_slice(&self) -> &[PriceBar] {
        &self.bars
    }

    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.bars.iter().map(|b| b.date)
    }

    /// Bars dated on or before `date`.
    pub fn until(&self, date: NaiveDate) -> PriceSeries {
        let end = self.bars.partition_point(|b| b.date <= date);
        PriceSeries {
            bars: self.bars[..end].to_vec(),
        }
    }

    /// Close on exactly `date`, if the stock traded that day.
    pub fn close_on(&self, date: NaiveDate) -> Option<f64> {
        self.bars
            .binary_search_by_key(&date, |b| b.date)
            .ok()
            .map(|i| self.bars[i].close)
    }

    /// Most recent close on or before `date`.
    pub fn close_on_or_before(&self, date: NaiveDate) -> Option<f64> {
        let end = self.bars.partition_point(|b| b.date <= date);
        end.checked_sub(1).map(|i| self.bars[i].close)
    }

    /// Most recent close strictly before `date`.
    pub fn last_close_before(&self, date: NaiveDate) -> Option<f64> {
        let end = self.bars.partition_point(|b| b.date < date);
        end.checked_sub(1).map(|i| self.bars[i].close)
    }

    /// Lowest close over bars dated on or after `since`.
    pub fn lowest_close_since(&self, since: NaiveDate) -> Option<f64> {
        let start = self.bars.partition_point(|b| b.date < since);
        self.bars[start..]
            .iter()
            .map(|b| b.close)
            .reduce(f64::min)
    }

    /// Month-to-date change in percent: last close on or before `as_of`
    /// against the last close before the first day of that month.
    pub fn month_to_date_change_pct(&self, as_of: NaiveDate) -> Option<f64> {
        let month_start = as_of.with_day(1)?;
        let previous_close = self.last_close_before(month_start)?;
        if previous_close <= 0.0 {
            return None;
        }
        let current = self.close_on_or_before(as_of)?;
        Some((current - previous_close) / previous_close * 100.0)
    }
}

impl std::ops::Index<usize> for PriceSeries {
    type Output = PriceBar;
    fn index(&self, index: usize) -> &Self::Output {
        &self.bars[index]
    }
}

impl IntoIterator for PriceSeries {
    type Item = PriceBar;
    type IntoIter = std::vec::IntoIter<PriceBar>;
    fn into_iter(self) -> Self::IntoIter {
        self.bars.into_iter()
    }
}

impl<'a> IntoIterator for &'a PriceSeries {
    type Item = &'a PriceBar;
    type IntoIter = std::slice::Iter<'a, PriceBar>;
    fn into_iter(self) -> Self::IntoIter {
        self.bars.iter()
    }
}
