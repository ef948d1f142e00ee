//! Per-page decision engine.
//!
//! Applies the calibrated batch limits plus the fixed heuristic rules to turn
//! raw measurements into final crop and deskew decisions. Spread pages are
//! exempt; binding pages never reach this stage at all.

use tracing::debug;

use crate::core::{
    CropCalibration, CropDecision, DeskewCalibration, DeskewDecision, EdgeDecision, Margin,
    PageRecord,
};
use crate::processing::calibration::NOISE_FLOOR_PX;

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

/// Decide one crop edge.
///
/// A measurement inside `[5, limit]` is trusted as is. Outside that band it
/// is either overridden with the batch average (when its magnitude still
/// exceeds the unadjusted limit) or dropped.
fn decide_edge(m: i32, limit: f64, pool_mean: f64) -> EdgeDecision {
    if (m as f64) > limit || m < NOISE_FLOOR_PX {
        // The override comparison is against the limit itself (factor 1),
        // so only measurements whose magnitude exceeds it get averaged.
        if (m.abs() as f64) > limit {
            EdgeDecision::Averaged(pool_mean)
        } else {
            EdgeDecision::Skip
        }
    } else {
        EdgeDecision::Keep(m)
    }
}

/// Finalize the crop decision of every page in the batch.
pub fn select_crops(pages: &mut [PageRecord], calibration: &CropCalibration) {
    for page in pages.iter_mut() {
        if page.spread {
            page.crop = CropDecision::none();
            debug!(path = %page.path.display(), "spread, no crop");
            continue;
        }
        let Some(raw) = page.raw_crop else {
            page.crop = CropDecision::none();
            continue;
        };
        let mut decision = CropDecision::none();
        for margin in Margin::ALL {
            let stats = calibration.margin(margin);
            let edge = decide_edge(raw.margin(margin), stats.limit, stats.mean);
            decision.set_edge(margin, edge);
        }
        debug!(path = %page.path.display(), ?decision, "crop decision");
        page.crop = decision;
    }
}

/// Finalize the deskew decision of every page in the batch.
///
/// An empty calibration pool means there is nothing to calibrate against, so
/// no page in the batch is deskewed.
pub fn select_deskew(
    pages: &mut [PageRecord],
    calibration: &DeskewCalibration,
    abs_limit: f64,
) {
    for page in pages.iter_mut() {
        if page.spread {
            page.deskew = DeskewDecision::Skip;
            debug!(path = %page.path.display(), "spread, no deskew");
            continue;
        }
        if calibration.angle.is_empty() {
            page.deskew = DeskewDecision::Skip;
            continue;
        }
        let angle = round3(page.raw_angle);
        page.deskew = if angle == 0.0 {
            DeskewDecision::Skip
        } else if angle.abs() < abs_limit {
            // below the fixed floor, not worth the render
            DeskewDecision::Skip
        } else if angle.abs() > calibration.angle.limit {
            // outside the calibrated limit: an outlier measurement, not trusted
            DeskewDecision::Skip
        } else {
            DeskewDecision::Rotate(angle)
        };
        debug!(path = %page.path.display(), angle, decision = ?page.deskew, "deskew decision");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::settings::LimitStat;
    use crate::core::{PoolStats, RawCropBox};
    use crate::processing::calibration::pool_stats;
    use std::path::PathBuf;

    fn page_with_margins(name: &str, left: i32, top: i32, right: i32, bottom: i32) -> PageRecord {
        let mut page = PageRecord::new(PathBuf::from(name), 1000, 1500, 1000);
        page.raw_crop = Some(RawCropBox {
            left,
            top,
            right,
            bottom,
        });
        page
    }

    fn uniform_calibration(stats: PoolStats) -> CropCalibration {
        CropCalibration {
            left: stats,
            top: stats,
            right: stats,
            bottom: stats,
        }
    }

    #[test]
    fn margin_within_band_keeps_the_raw_value() {
        // pool [9, 10, 11, 12, 50], median 11, adjust 3 -> limit 33
        let stats = pool_stats(vec![10.0, 12.0, 11.0, 9.0, 50.0], 3.0, LimitStat::Median);
        assert_eq!(decide_edge(9, stats.limit, stats.mean), EdgeDecision::Keep(9));
        assert_eq!(decide_edge(33, stats.limit, stats.mean), EdgeDecision::Keep(33));
    }

    #[test]
    fn margin_over_limit_gets_the_averaged_override() {
        let stats = pool_stats(vec![10.0, 12.0, 11.0, 9.0, 50.0], 3.0, LimitStat::Median);
        // 50 > 33 and |50| > 33: override with the pool mean
        assert_eq!(
            decide_edge(50, stats.limit, stats.mean),
            EdgeDecision::Averaged(18.4)
        );
    }

    #[test]
    fn small_margin_is_dropped_not_averaged() {
        // limit well above the measurement magnitude
        assert_eq!(decide_edge(3, 33.0, 18.4), EdgeDecision::Skip);
        assert_eq!(decide_edge(0, 33.0, 18.4), EdgeDecision::Skip);
    }

    #[test]
    fn negative_margin_with_large_magnitude_is_averaged() {
        // m < 5 and |m| > limit: the detector corner fell outside the frame
        assert_eq!(decide_edge(-40, 33.0, 18.4), EdgeDecision::Averaged(18.4));
    }

    #[test]
    fn spread_pages_get_no_crop() {
        let mut pages = vec![page_with_margins("a", 10, 10, 10, 10)];
        pages[0].spread = true;
        let calibration = uniform_calibration(PoolStats {
            mean: 10.0,
            median: 10.0,
            limit: 30.0,
            samples: 4,
        });
        select_crops(&mut pages, &calibration);
        assert!(!pages[0].crop.any_active());
    }

    #[test]
    fn deskew_rules_cover_zero_floor_and_outlier() {
        let calibration = DeskewCalibration {
            angle: PoolStats {
                mean: 1.0,
                median: 1.0,
                limit: 1.5,
                samples: 5,
            },
        };
        let mut pages: Vec<PageRecord> = (0..4)
            .map(|i| PageRecord::new(PathBuf::from(format!("{i}.tif")), 1000, 1500, 1000))
            .collect();
        pages[0].raw_angle = 0.0; // zero: never deskew
        pages[1].raw_angle = 0.05; // below the 0.1 floor
        pages[2].raw_angle = 2.0; // outside the calibrated limit
        pages[3].raw_angle = 1.0; // inside: deskew at the raw angle

        select_deskew(&mut pages, &calibration, 0.1);
        assert_eq!(pages[0].deskew, DeskewDecision::Skip);
        assert_eq!(pages[1].deskew, DeskewDecision::Skip);
        assert_eq!(pages[2].deskew, DeskewDecision::Skip);
        assert_eq!(pages[3].deskew, DeskewDecision::Rotate(1.0));
    }

    #[test]
    fn negative_angle_inside_limit_is_deskewed() {
        let calibration = DeskewCalibration {
            angle: PoolStats {
                mean: 1.0,
                median: 1.0,
                limit: 1.5,
                samples: 2,
            },
        };
        let mut pages = vec![PageRecord::new(PathBuf::from("a.tif"), 1000, 1500, 1000)];
        pages[0].raw_angle = -1.2;
        select_deskew(&mut pages, &calibration, 0.1);
        assert_eq!(pages[0].deskew, DeskewDecision::Rotate(-1.2));
    }

    #[test]
    fn empty_deskew_pool_skips_the_whole_batch() {
        let calibration = DeskewCalibration {
            angle: PoolStats::default(),
        };
        let mut pages = vec![PageRecord::new(PathBuf::from("a.tif"), 1000, 1500, 1000)];
        pages[0].raw_angle = 1.0;
        select_deskew(&mut pages, &calibration, 0.1);
        assert_eq!(pages[0].deskew, DeskewDecision::Skip);
    }
}
