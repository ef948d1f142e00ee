//! Batch calibration.
//!
//! Raw per-page measurements are noisy; instead of trusting each one, the
//! batch derives an acceptance limit per margin (and one for the skew angle)
//! from the statistical distribution of all measurements. The decision stage
//! then accepts, overrides, or rejects individual measurements against these
//! limits.

use tracing::debug;

use crate::core::settings::LimitStat;
use crate::core::{CropCalibration, DeskewCalibration, Margin, PageRecord, PoolStats};

/// Measurements below this many pixels are noise and excluded from the pools.
pub const NOISE_FLOOR_PX: i32 = 5;

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

/// Compute mean, median, and the decision limit of one measurement pool.
/// An empty pool yields a zero limit.
pub fn pool_stats(mut pool: Vec<f64>, limit_adjust: f64, stat: LimitStat) -> PoolStats {
    if pool.is_empty() {
        return PoolStats::default();
    }
    pool.sort_by(|a, b| a.partial_cmp(b).expect("pool values are finite"));
    let mean = round3(pool.iter().sum::<f64>() / pool.len() as f64);
    let median = pool[pool.len() / 2];
    let selected = match stat {
        LimitStat::Mean => mean,
        LimitStat::Median => median,
    };
    PoolStats {
        mean,
        median,
        limit: round3(selected * limit_adjust),
        samples: pool.len(),
    }
}

/// Calibrate the four margin pools from the batch's raw crop boxes.
///
/// Spread pages still contribute measurements; they are only exempt from the
/// decisions themselves.
pub fn calibrate_crop(
    pages: &[PageRecord],
    limit_adjust: f64,
    stat: LimitStat,
) -> CropCalibration {
    let stats_for = |margin: Margin| {
        let pool: Vec<f64> = pages
            .iter()
            .filter_map(|p| p.raw_crop)
            .map(|raw| raw.margin(margin))
            .filter(|&m| m >= NOISE_FLOOR_PX)
            .map(|m| m as f64)
            .collect();
        let stats = pool_stats(pool, limit_adjust, stat);
        debug!(
            margin = margin.name(),
            limit = stats.limit,
            mean = stats.mean,
            median = stats.median,
            samples = stats.samples,
            "crop calibration"
        );
        stats
    };
    CropCalibration {
        left: stats_for(Margin::Left),
        top: stats_for(Margin::Top),
        right: stats_for(Margin::Right),
        bottom: stats_for(Margin::Bottom),
    }
}

/// Calibrate the deskew pool from the absolute values of all non-zero angles.
pub fn calibrate_deskew(
    pages: &[PageRecord],
    limit_adjust: f64,
    stat: LimitStat,
) -> DeskewCalibration {
    let pool: Vec<f64> = pages
        .iter()
        .map(|p| p.raw_angle)
        .filter(|&a| a != 0.0)
        .map(f64::abs)
        .collect();
    let angle = pool_stats(pool, limit_adjust, stat);
    debug!(
        limit = angle.limit,
        mean = angle.mean,
        median = angle.median,
        samples = angle.samples,
        "deskew calibration"
    );
    DeskewCalibration { angle }
}
