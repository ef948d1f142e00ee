pub mod metrics;
pub mod reporter;

pub use metrics::{Duration, OpStat, TimingStats};
pub use reporter::TimingReporter;
