//! Timing statistics for pipeline operations.
//!
//! The pipeline records wall-clock seconds per named operation; the running
//! averages feed progress estimation and the end-of-run report. Timing is
//! never consulted by the decision stages.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use tracing::warn;

// 24 hours, a reasonable cap for a single tool invocation
const MAX_DURATION_SECS: f64 = 3600.0 * 24.0;

/// A strongly-typed duration value that ensures non-negative time values.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize)]
pub struct Duration(f64);

impl Duration {
    /// Creates a new Duration without validation, but with safety guards.
    /// Invalid values will be clamped to valid range with warning logs.
    pub fn new_unchecked(seconds: f64) -> Self {
        if !seconds.is_finite() || seconds < 0.0 {
            warn!("invalid duration provided: {:.2}s, using 0.0s instead", seconds);
            Self(0.0)
        } else if seconds > MAX_DURATION_SECS {
            warn!(
                "duration exceeds maximum allowed value: {:.2}s > {:.2}s, capping at maximum",
                seconds, MAX_DURATION_SECS
            );
            Self(MAX_DURATION_SECS)
        } else {
            Self(seconds)
        }
    }

    /// Returns the duration in seconds as an f64.
    pub fn as_secs_f64(&self) -> f64 {
        self.0
    }

    /// Returns a Duration representing zero seconds.
    pub fn zero() -> Self {
        Self(0.0)
    }
}

impl Default for Duration {
    fn default() -> Self {
        Self::zero()
    }
}

impl std::ops::Add for Duration {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self(self.0 + other.0)
    }
}

impl std::ops::AddAssign for Duration {
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl fmt::Display for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let total = self.0;
        if total >= 3600.0 {
            let hours = (total / 3600.0).floor();
            let minutes = ((total % 3600.0) / 60.0).floor();
            let seconds = total % 60.0;
            write!(f, "{:.0}h {:.0}m {:.2}s", hours, minutes, seconds)
        } else if total >= 60.0 {
            let minutes = (total / 60.0).floor();
            let seconds = total % 60.0;
            write!(f, "{:.0}m {:.2}s", minutes, seconds)
        } else {
            write!(f, "{:.2}s", total)
        }
    }
}

/// Accumulated timing for one named operation.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct OpStat {
    /// Cumulative seconds spent in this operation
    pub total: Duration,
    /// Number of invocations recorded
    pub count: usize,
    /// Running average per invocation
    pub average: Duration,
}

/// Append-only mapping from operation name to accumulated timing.
///
/// Grows monotonically over the run; `snapshot` hands out an owned copy in
/// stable (sorted) order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TimingStats {
    ops: BTreeMap<String, OpStat>,
}

impl TimingStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one invocation of `op` that took `seconds`
    pub fn record(&mut self, op: &str, seconds: f64) {
        let seconds = Duration::new_unchecked(seconds);
        match self.ops.get_mut(op) {
            Some(stat) => {
                stat.total += seconds;
                stat.count += 1;
                stat.average = Duration::new_unchecked(
                    stat.total.as_secs_f64() / stat.count as f64,
                );
            }
            None => {
                self.ops.insert(
                    op.to_string(),
                    OpStat {
                        total: seconds,
                        count: 1,
                        average: seconds,
                    },
                );
            }
        }
    }

    pub fn get(&self, op: &str) -> Option<&OpStat> {
        self.ops.get(op)
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Owned copy of the accumulated statistics, sorted by operation name
    pub fn snapshot(&self) -> Vec<(String, OpStat)> {
        self.ops.iter().map(|(k, v)| (k.clone(), *v)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_accumulates_total_count_and_average() {
        let mut stats = TimingStats::new();
        stats.record("Crop image", 2.0);
        stats.record("Crop image", 4.0);
        stats.record("Measure dimensions", 1.0);

        let crop = stats.get("Crop image").unwrap();
        assert_eq!(crop.count, 2);
        assert!((crop.total.as_secs_f64() - 6.0).abs() < 1e-9);
        assert!((crop.average.as_secs_f64() - 3.0).abs() < 1e-9);
        assert_eq!(stats.get("Measure dimensions").unwrap().count, 1);
    }

    #[test]
    fn snapshot_is_sorted_by_operation_name() {
        let mut stats = TimingStats::new();
        stats.record("b", 1.0);
        stats.record("a", 1.0);
        let names: Vec<_> = stats.snapshot().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn negative_durations_are_clamped_to_zero() {
        let mut stats = TimingStats::new();
        stats.record("op", -5.0);
        assert_eq!(stats.get("op").unwrap().total.as_secs_f64(), 0.0);
    }

    #[test]
    fn duration_display_covers_hours_minutes_seconds() {
        assert_eq!(Duration::new_unchecked(0.5).to_string(), "0.50s");
        assert_eq!(Duration::new_unchecked(75.0).to_string(), "1m 15.00s");
        assert_eq!(Duration::new_unchecked(3725.0).to_string(), "1h 2m 5.00s");
    }
}
