//! Progress reporting for the per-page measurement loops.

use serde::Serialize;
use tracing::info;

use crate::benchmarking::{Duration, TimingStats};

/// Point-in-time progress of one per-page loop.
#[derive(Debug, Clone, Serialize)]
pub struct ProgressSnapshot {
    pub operation: String,
    pub completed: usize,
    pub total: usize,
    pub elapsed: Duration,
    pub estimated_remaining: Duration,
}

impl ProgressSnapshot {
    /// Derive elapsed and remaining time from the running average for `op`
    pub fn from_stats(op: &str, completed: usize, total: usize, stats: &TimingStats) -> Self {
        let avg = stats
            .get(op)
            .map(|s| s.average.as_secs_f64())
            .unwrap_or(0.0);
        let remaining = total.saturating_sub(completed);
        Self {
            operation: op.to_string(),
            completed,
            total,
            elapsed: Duration::new_unchecked(completed as f64 * avg),
            estimated_remaining: Duration::new_unchecked(remaining as f64 * avg),
        }
    }
}

/// Log a progress line every `pivot` completed pages.
pub fn log_batch_progress(
    op: &str,
    completed: usize,
    total: usize,
    pivot: usize,
    stats: &TimingStats,
) {
    if completed == 0 || completed % pivot != 0 {
        return;
    }
    let snapshot = ProgressSnapshot::from_stats(op, completed, total, stats);
    info!(
        "{}: {} pages done, {} left, {} elapsed, {} est. remaining",
        op,
        snapshot.completed,
        snapshot.total - snapshot.completed,
        snapshot.elapsed,
        snapshot.estimated_remaining
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_estimates_from_running_average() {
        let mut stats = TimingStats::new();
        stats.record("Get crop coordinates", 2.0);
        stats.record("Get crop coordinates", 4.0);

        let snap = ProgressSnapshot::from_stats("Get crop coordinates", 10, 25, &stats);
        assert!((snap.elapsed.as_secs_f64() - 30.0).abs() < 1e-9);
        assert!((snap.estimated_remaining.as_secs_f64() - 45.0).abs() < 1e-9);
    }

    #[test]
    fn snapshot_without_samples_reports_zero() {
        let stats = TimingStats::new();
        let snap = ProgressSnapshot::from_stats("x", 5, 10, &stats);
        assert_eq!(snap.elapsed.as_secs_f64(), 0.0);
        assert_eq!(snap.estimated_remaining.as_secs_f64(), 0.0);
    }
}
