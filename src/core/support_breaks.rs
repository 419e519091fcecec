use chrono::Duration;
use std::collections::VecDeque;

use crate::models::{BreakEvent, PriceSeries, RollingLowPoint};

/// Rolling minimum of `low` over bars dated in `[t - period_days, t]`.
///
/// Uses a monotonic deque so each bar enters and leaves the window once.
pub fn rolling_lows(series: &PriceSeries, period_days: u32) -> Vec<RollingLowPoint> {
    let bars = series.as_slice();
    let span = Duration::days(period_days as i64);
    let mut window: VecDeque<usize> = VecDeque::new();
    let mut points = Vec::with_capacity(bars.len());

    for (i, bar) in bars.iter().enumerate() {
        while let Some(&back) = window.back() {
            if bars[back].low >= bar.low {
                window.pop_back();
            } else {
                break;
            }
        }
        window.push_back(i);

        let lookback = bar.date - span;
        while let Some(&front) = window.front() {
            if bars[front].date < lookback {
                window.pop_front();
            } else {
                break;
            }
        }

        points.push(RollingLowPoint {
            date: bar.date,
            close: bar.close,
            low: bar.low,
            rolling_low: window.front().map(|&j| bars[j].low),
        });
    }

    points
}

/// A break is any bar whose rolling low is strictly below the previous bar's.
pub fn detect_breaks(points: &[RollingLowPoint]) -> Vec<BreakEvent> {
    let mut breaks: Vec<BreakEvent> = Vec::new();

    for pair in points.windows(2) {
        let (prev, curr) = match (pair[0].rolling_low, pair[1].rolling_low) {
            (Some(p), Some(c)) => (p, c),
            _ => continue,
        };
        if curr >= prev {
            continue;
        }

        let date = pair[1].date;
        let days_since_previous = breaks.last().map(|b| (date - b.date).num_days());
        breaks.push(BreakEvent {
            date,
            previous_support: prev,
            new_support: curr,
            drop_pct: (curr - prev) / prev * 100.0,
            days_since_previous,
        });
    }

    breaks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{date, make_bars};

    #[test]
    fn rolling_low_respects_calendar_window() {
        // lows on consecutive days: 10, 8, 9, 9, 9
        let s = make_bars(date(2024, 1, 1), &[10.0, 8.0, 9.0, 9.0, 9.0]);
        let pts = rolling_lows(&s, 2);
        let lows: Vec<f64> = pts.iter().map(|p| p.rolling_low.unwrap()).collect();
        // window [t-2, t] inclusive: day 4 still sees day 2 (8), day 5 does not
        assert_eq!(lows, vec![10.0, 8.0, 8.0, 8.0, 9.0]);
    }

    #[test]
    fn rolling_low_uses_calendar_not_bar_count() {
        // two bars 10 days apart; a 5-day window never sees the older one
        let mut s = make_bars(date(2024, 1, 1), &[5.0]).into_iter().collect::<Vec<_>>();
        s.extend(make_bars(date(2024, 1, 11), &[7.0]));
        let pts = rolling_lows(&PriceSeries::new(s), 5);
        assert_eq!(pts[1].rolling_low, Some(7.0));
    }

    #[test]
    fn breaks_are_strict_decreases() {
        let s = make_bars(date(2024, 1, 1), &[10.0, 10.0, 9.0, 9.5, 8.0]);
        let breaks = detect_breaks(&rolling_lows(&s, 365));
        assert_eq!(breaks.len(), 2);
        assert_eq!(breaks[0].date, date(2024, 1, 3));
        assert!(breaks[0].days_since_previous.is_none());
        assert!((breaks[0].drop_pct - -10.0).abs() < 1e-9);
        assert_eq!(breaks[1].days_since_previous, Some(2));
        assert!(breaks.iter().all(|b| b.new_support < b.previous_support));
    }

    #[test]
    fn empty_series_has_no_breaks() {
        let pts = rolling_lows(&PriceSeries::default(), 30);
        assert!(pts.is_empty());
        assert!(detect_breaks(&pts).is_empty());
    }
}
