//! Factor normalizers. Each maps a raw signal onto 0-100 and reports
//! whether the signal was present.

use serde::{Deserialize, Serialize};

use crate::models::DataStatus;

/// Fallback average gap between breaks when none is known.
pub const DEFAULT_AVG_GAP_DAYS: f64 = 30.0;
/// Score given when the peak never reached the threshold.
pub const BELOW_THRESHOLD_PEAK_SCORE: f64 = 30.0;
/// Seasonality bonus when today is near the month's typical low day.
pub const LOW_DAY_BONUS: f64 = 10.0;
pub const LOW_DAY_WINDOW: i64 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Normalized {
    pub normalized: f64,
    pub has_data: bool,
    pub status: DataStatus,
}

impl Normalized {
    pub fn available(value: f64) -> Self {
        Self {
            normalized: value,
            has_data: true,
            status: DataStatus::Available,
        }
    }

    pub fn unavailable() -> Self {
        Self {
            normalized: 0.0,
            has_data: false,
            status: DataStatus::Unavailable,
        }
    }
}

fn clamp100(x: f64) -> f64 {
    x.clamp(0.0, 100.0)
}

pub fn support_strength(score: Option<f64>) -> Normalized {
    match score {
        Some(s) => Normalized::available(clamp100(s)),
        None => Normalized::unavailable(),
    }
}

/// Days since the last break relative to the typical gap; reaching the
/// typical gap scores 50.
pub fn days_since_break(days: Option<i64>, avg_gap: Option<f64>) -> Normalized {
    let Some(days) = days else {
        return Normalized::unavailable();
    };
    let gap = avg_gap
        .filter(|g| *g != 0.0)
        .unwrap_or(DEFAULT_AVG_GAP_DAYS);
    Normalized::available(clamp100(days as f64 / gap * 50.0))
}

/// Recovery rate in [0, 1].
pub fn recovery_advantage(rate: Option<f64>) -> Normalized {
    match rate {
        Some(r) => Normalized::available(clamp100(r * 100.0)),
        None => Normalized::unavailable(),
    }
}

/// Rewards options whose probability has dropped from a peak above the
/// threshold. Disabled when its weight is zero.
pub fn historical_peak(current: f64, peak: Option<f64>, threshold: f64, weight: f64) -> Normalized {
    if weight == 0.0 {
        return Normalized::unavailable();
    }
    let Some(peak) = peak else {
        return Normalized::unavailable();
    };
    if peak < threshold {
        return Normalized::available(BELOW_THRESHOLD_PEAK_SCORE);
    }
    Normalized::available(clamp100(50.0 + (peak - current) * 200.0))
}

pub fn monthly_seasonality(
    positive_rate: Option<f64>,
    current_day: u32,
    typical_low_day: Option<u32>,
) -> Normalized {
    let Some(rate) = positive_rate else {
        return Normalized::unavailable();
    };
    let near_low = typical_low_day
        .is_some_and(|low| (current_day as i64 - low as i64).abs() <= LOW_DAY_WINDOW);
    let bonus = if near_low { LOW_DAY_BONUS } else { 0.0 };
    Normalized::available(clamp100(rate + bonus))
}

/// Underperformance against the month's historical average raises the score.
pub fn current_performance(current_month_pct: Option<f64>, avg_month_pct: Option<f64>) -> Normalized {
    match (current_month_pct, avg_month_pct) {
        (Some(current), Some(avg)) => Normalized::available(clamp100(50.0 + (avg - current) * 10.0)),
        _ => Normalized::unavailable(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn support_strength_clamps() {
        assert!((support_strength(Some(150.0)).normalized - 100.0).abs() < 1e-9);
        assert!((support_strength(Some(-10.0)).normalized - 0.0).abs() < 1e-9);
        let n = support_strength(None);
        assert!(!n.has_data);
        assert_eq!(n.status, DataStatus::Unavailable);
    }

    #[test]
    fn days_since_break_defaults_gap() {
        assert!((days_since_break(Some(40), Some(30.0)).normalized - 66.666_666_666).abs() < 1e-6);
        assert!((days_since_break(Some(15), None).normalized - 25.0).abs() < 1e-9);
        assert!((days_since_break(Some(15), Some(0.0)).normalized - 25.0).abs() < 1e-9);
        assert!((days_since_break(Some(500), Some(10.0)).normalized - 100.0).abs() < 1e-9);
        assert!(!days_since_break(None, Some(10.0)).has_data);
    }

    #[test]
    fn historical_peak_rules() {
        let off = historical_peak(0.5, Some(0.99), 0.9, 0.0);
        assert!((off.normalized - 0.0).abs() < 1e-9);
        assert!(!off.has_data);

        assert!((historical_peak(0.5, Some(0.85), 0.9, 15.0).normalized - 30.0).abs() < 1e-9);
        assert!((historical_peak(0.72, Some(0.95), 0.9, 15.0).normalized - 96.0).abs() < 1e-9);
        // current above peak lowers the score: 50 - 0.09 * 200
        assert!((historical_peak(0.99, Some(0.9), 0.9, 15.0).normalized - 32.0).abs() < 1e-9);
        assert!((historical_peak(1.0, Some(0.9), 0.5, 15.0).normalized - 30.0).abs() < 1e-9);
        assert!(!historical_peak(0.5, None, 0.9, 15.0).has_data);
    }

    #[test]
    fn historical_peak_lower_clamp() {
        // 50 + (0.6 - 0.95) * 200 = -20 -> 0
        let n = historical_peak(0.95, Some(0.6), 0.5, 10.0);
        assert!((n.normalized - 0.0).abs() < 1e-9);
        assert!(n.has_data);
    }

    #[test]
    fn seasonality_bonus_window() {
        assert!((monthly_seasonality(Some(60.0), 14, Some(15)).normalized - 70.0).abs() < 1e-9);
        assert!((monthly_seasonality(Some(60.0), 19, Some(15)).normalized - 60.0).abs() < 1e-9);
        assert!((monthly_seasonality(Some(95.0), 12, Some(15)).normalized - 100.0).abs() < 1e-9);
        assert!((monthly_seasonality(Some(60.0), 12, None).normalized - 60.0).abs() < 1e-9);
        assert!(!monthly_seasonality(None, 12, Some(12)).has_data);
    }

    #[test]
    fn current_performance_mean_reversion() {
        assert!((current_performance(Some(1.0), Some(3.0)).normalized - 70.0).abs() < 1e-9);
        assert!((current_performance(Some(10.0), Some(0.0)).normalized - 0.0).abs() < 1e-9);
        assert!(!current_performance(None, Some(3.0)).has_data);
    }

    #[test]
    fn recovery_scales_rate() {
        assert!((recovery_advantage(Some(0.8)).normalized - 80.0).abs() < 1e-9);
        assert!((recovery_advantage(Some(1.2)).normalized - 100.0).abs() < 1e-9);
        assert!(!recovery_advantage(None).has_data);
    }
}
