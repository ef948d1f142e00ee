use std::fmt;

use super::metrics::TimingStats;

/// Formats a timing snapshot as an end-of-run report.
pub struct TimingReporter {
    stats: TimingStats,
}

impl TimingReporter {
    pub fn from_stats(stats: TimingStats) -> Self {
        Self { stats }
    }
}

impl fmt::Display for TimingReporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Preprocessing Timing Report ===")?;
        if self.stats.is_empty() {
            writeln!(f, "(no operations recorded)")?;
            return Ok(());
        }
        for (op, stat) in self.stats.snapshot() {
            writeln!(
                f,
                "- {}: {} total, {} calls, {} avg",
                op, stat.total, stat.count, stat.average
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_lists_each_operation() {
        let mut stats = TimingStats::new();
        stats.record("Crop image", 1.5);
        stats.record("Merge document", 10.0);
        let report = TimingReporter::from_stats(stats).to_string();
        assert!(report.contains("Crop image"));
        assert!(report.contains("Merge document"));
        assert!(report.contains("2 calls") || report.contains("1 calls"));
    }
}
