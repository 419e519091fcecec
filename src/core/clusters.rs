use chrono::NaiveDate;

use crate::core::stats::{mean, median};
use crate::models::{BreakCluster, BreakEvent};

/// Group chronologically ordered breaks into clusters. A gap larger than
/// `max_gap_days` between neighbouring breaks starts a new cluster.
pub fn cluster_breaks(breaks: &[BreakEvent], max_gap_days: i64) -> Vec<BreakCluster> {
    let mut clusters = Vec::new();
    let mut current: Vec<BreakEvent> = Vec::new();

    for brk in breaks {
        if let Some(last) = current.last() {
            if (brk.date - last.date).num_days() > max_gap_days {
                clusters.push(build_cluster(clusters.len(), std::mem::take(&mut current)));
            }
        }
        current.push(brk.clone());
    }

    if !current.is_empty() {
        clusters.push(build_cluster(clusters.len(), current));
    }

    clusters
}

/// Break count of the last cluster if it ended within `max_gap_days` of
/// `latest`, else 0.
pub fn current_consecutive_breaks(
    clusters: &[BreakCluster],
    latest: NaiveDate,
    max_gap_days: i64,
) -> usize {
    match clusters.last() {
        Some(last) if (latest - last.end_date).num_days() <= max_gap_days => last.num_breaks,
        _ => 0,
    }
}

pub fn max_consecutive_breaks(clusters: &[BreakCluster]) -> usize {
    clusters.iter().map(|c| c.num_breaks).max().unwrap_or(0)
}

fn build_cluster(id: usize, breaks: Vec<BreakEvent>) -> BreakCluster {
    let gaps: Vec<i64> = breaks
        .windows(2)
        .map(|w| (w[1].date - w[0].date).num_days())
        .collect();
    let gaps_f: Vec<f64> = gaps.iter().map(|&g| g as f64).collect();
    let drops: Vec<f64> = breaks.iter().map(|b| b.drop_pct).collect();
    let total_drop: f64 = drops.iter().sum();

    // Callers never pass an empty run.
    let start_date = breaks.first().map(|b| b.date).unwrap_or_default();
    let end_date = breaks.last().map(|b| b.date).unwrap_or_default();

    BreakCluster {
        id,
        num_breaks: breaks.len(),
        start_date,
        end_date,
        duration_days: (end_date - start_date).num_days(),
        avg_gap: mean(&gaps_f),
        min_gap: gaps.iter().copied().min(),
        max_gap: gaps.iter().copied().max(),
        total_drop,
        avg_drop: total_drop / breaks.len().max(1) as f64,
        median_drop: median(&drops).unwrap_or(0.0),
        breaks,
    }
}
