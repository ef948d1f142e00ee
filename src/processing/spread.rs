//! Spread detection.
//!
//! A spread (two adjacent physical pages in one scan) is markedly wider or
//! taller than the rest of the batch. Flagged pages are treated as already
//! correctly framed and never enter the crop/deskew decisions.

use tracing::debug;

use crate::core::PageRecord;

/// Median by the batch's convention: sorted values, index `len / 2`.
fn median_of(mut values: Vec<u32>) -> u32 {
    values.sort_unstable();
    values[values.len() / 2]
}

/// Flag pages whose width or height exceeds the median dimension times
/// `limit_adjust`. No-op on an empty batch.
pub fn flag_spreads(pages: &mut [PageRecord], limit_adjust: f64) {
    if pages.is_empty() {
        return;
    }
    let width_median = median_of(pages.iter().map(|p| p.width).collect());
    let height_median = median_of(pages.iter().map(|p| p.height).collect());
    let width_limit = width_median as f64 * limit_adjust;
    let height_limit = height_median as f64 * limit_adjust;

    for page in pages.iter_mut() {
        if page.height as f64 > height_limit || page.width as f64 > width_limit {
            page.spread = true;
            debug!(
                path = %page.path.display(),
                width = page.width,
                width_limit,
                height = page.height,
                height_limit,
                "detected spread"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn page(name: &str, width: u32, height: u32) -> PageRecord {
        PageRecord::new(PathBuf::from(name), width, height, 1000)
    }

    #[test]
    fn flags_pages_wider_than_the_limit() {
        let mut pages = vec![
            page("0001.tif", 1000, 1500),
            page("0002.tif", 1010, 1490),
            page("0003.tif", 990, 1510),
            page("0004.tif", 2000, 1500), // double width
        ];
        flag_spreads(&mut pages, 1.25);
        assert!(!pages[0].spread);
        assert!(!pages[1].spread);
        assert!(!pages[2].spread);
        assert!(pages[3].spread);
    }

    #[test]
    fn flags_pages_taller_than_the_limit() {
        let mut pages = vec![
            page("a.tif", 1000, 1500),
            page("b.tif", 1000, 1500),
            page("c.tif", 1000, 3000),
        ];
        flag_spreads(&mut pages, 1.25);
        assert!(pages[2].spread);
        assert!(!pages[0].spread);
    }

    #[test]
    fn median_uses_floor_index() {
        // sorted [10, 20, 30, 40]: index 4/2 = 2 -> 30
        assert_eq!(median_of(vec![40, 10, 30, 20]), 30);
        // sorted [10, 20, 30]: index 1 -> 20
        assert_eq!(median_of(vec![30, 10, 20]), 20);
    }

    #[test]
    fn empty_batch_is_a_no_op() {
        let mut pages: Vec<PageRecord> = Vec::new();
        flag_spreads(&mut pages, 1.25);
    }
}
