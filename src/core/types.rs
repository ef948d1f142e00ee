//! Core value types for per-page state and batch calibration.

use std::path::PathBuf;

use serde::Serialize;

/// One of the four raw crop measurements of a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Margin {
    Left,
    Top,
    Right,
    Bottom,
}

impl Margin {
    pub const ALL: [Margin; 4] = [Margin::Left, Margin::Top, Margin::Right, Margin::Bottom];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Top => "top",
            Self::Right => "right",
            Self::Bottom => "bottom",
        }
    }
}

/// Raw margin measurements reported by the crop-box detector.
///
/// Right and bottom are distances from the far edges, so a detector corner
/// outside the frame yields a negative margin.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct RawCropBox {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl RawCropBox {
    pub fn margin(&self, margin: Margin) -> i32 {
        match margin {
            Margin::Left => self.left,
            Margin::Top => self.top,
            Margin::Right => self.right,
            Margin::Bottom => self.bottom,
        }
    }
}

/// Finalized decision for one crop edge.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum EdgeDecision {
    /// Crop by the raw measurement
    Keep(i32),
    /// Crop by the batch-average margin instead of the raw outlier
    Averaged(f64),
    /// Leave this edge alone
    Skip,
}

impl EdgeDecision {
    pub fn is_active(&self) -> bool {
        !matches!(self, Self::Skip)
    }

    /// Inset from the edge in pixels, 0 when the edge is skipped
    fn inset(&self) -> f64 {
        match self {
            Self::Keep(v) => *v as f64,
            Self::Averaged(a) => *a,
            Self::Skip => 0.0,
        }
    }
}

/// Finalized crop decision for a page, one decision per edge.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct CropDecision {
    pub left: EdgeDecision,
    pub top: EdgeDecision,
    pub right: EdgeDecision,
    pub bottom: EdgeDecision,
}

impl CropDecision {
    /// No cropping on any edge
    pub fn none() -> Self {
        Self {
            left: EdgeDecision::Skip,
            top: EdgeDecision::Skip,
            right: EdgeDecision::Skip,
            bottom: EdgeDecision::Skip,
        }
    }

    pub fn edge(&self, margin: Margin) -> EdgeDecision {
        match margin {
            Margin::Left => self.left,
            Margin::Top => self.top,
            Margin::Right => self.right,
            Margin::Bottom => self.bottom,
        }
    }

    pub fn set_edge(&mut self, margin: Margin, decision: EdgeDecision) {
        match margin {
            Margin::Left => self.left = decision,
            Margin::Top => self.top = decision,
            Margin::Right => self.right = decision,
            Margin::Bottom => self.bottom = decision,
        }
    }

    pub fn any_active(&self) -> bool {
        self.left.is_active()
            || self.top.is_active()
            || self.right.is_active()
            || self.bottom.is_active()
    }

    /// Resolve the decision to page coordinates.
    ///
    /// Maintains `0 <= left < right <= width` and `0 <= top < bottom <= height`:
    /// insets are clamped to the frame, and a degenerate axis falls back to
    /// full frame.
    pub fn resolve(&self, width: u32, height: u32) -> CropRect {
        let w = width as f64;
        let h = height as f64;
        let left = self.left.inset().clamp(0.0, w);
        let top = self.top.inset().clamp(0.0, h);
        let right = (w - self.right.inset()).clamp(0.0, w);
        let bottom = (h - self.bottom.inset()).clamp(0.0, h);

        let (left, right) = if (left.round() as u32) < (right.round() as u32) {
            (left.round() as u32, right.round() as u32)
        } else {
            (0, width)
        };
        let (top, bottom) = if (top.round() as u32) < (bottom.round() as u32) {
            (top.round() as u32, bottom.round() as u32)
        } else {
            (0, height)
        };
        CropRect {
            left,
            top,
            right,
            bottom,
        }
    }
}

impl Default for CropDecision {
    fn default() -> Self {
        Self::none()
    }
}

/// Resolved crop coordinates in page space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CropRect {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

impl CropRect {
    pub fn width(&self) -> u32 {
        self.right - self.left
    }

    pub fn height(&self) -> u32 {
        self.bottom - self.top
    }
}

/// Finalized deskew decision for a page.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum DeskewDecision {
    /// Leave the page as is
    Skip,
    /// Rotate by the raw measured angle in degrees
    Rotate(f64),
}

impl DeskewDecision {
    pub fn is_rotate(&self) -> bool {
        matches!(self, Self::Rotate(_))
    }
}

/// Per-page state, created at enumeration and finalized by the decision stages.
#[derive(Debug, Clone, Serialize)]
pub struct PageRecord {
    /// Source image path
    pub path: PathBuf,
    /// Page width in pixels
    pub width: u32,
    /// Page height in pixels
    pub height: u32,
    /// Source file size in bytes
    pub file_size: u64,
    /// Raw margins from the crop-box detector, if that stage ran
    pub raw_crop: Option<RawCropBox>,
    /// Finalized crop decision
    pub crop: CropDecision,
    /// Raw skew angle in degrees, signed
    pub raw_angle: f64,
    /// Finalized deskew decision
    pub deskew: DeskewDecision,
    /// Flagged as a double-page spread
    pub spread: bool,
    /// Pre-cropped copy the skew probe ran against
    #[serde(skip)]
    pub deskew_probe: Option<PathBuf>,
}

impl PageRecord {
    pub fn new(path: PathBuf, width: u32, height: u32, file_size: u64) -> Self {
        Self {
            path,
            width,
            height,
            file_size,
            raw_crop: None,
            crop: CropDecision::none(),
            raw_angle: 0.0,
            deskew: DeskewDecision::Skip,
            spread: false,
            deskew_probe: None,
        }
    }

    /// Resolved crop coordinates for this page
    pub fn crop_rect(&self) -> CropRect {
        self.crop.resolve(self.width, self.height)
    }
}

/// Statistics of one calibration pool, immutable once computed.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct PoolStats {
    /// Arithmetic mean of the pool
    pub mean: f64,
    /// Value at index `len / 2` of the sorted pool
    pub median: f64,
    /// Decision limit: selected statistic times the adjustment factor
    pub limit: f64,
    /// Number of measurements that survived the noise floor
    pub samples: usize,
}

impl PoolStats {
    pub fn is_empty(&self) -> bool {
        self.samples == 0
    }
}

/// Per-batch crop thresholds, one pool per margin.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct CropCalibration {
    pub left: PoolStats,
    pub top: PoolStats,
    pub right: PoolStats,
    pub bottom: PoolStats,
}

impl CropCalibration {
    pub fn margin(&self, margin: Margin) -> &PoolStats {
        match margin {
            Margin::Left => &self.left,
            Margin::Top => &self.top,
            Margin::Right => &self.right,
            Margin::Bottom => &self.bottom,
        }
    }
}

/// Per-batch deskew threshold from the pool of absolute non-zero angles.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct DeskewCalibration {
    pub angle: PoolStats,
}

/// All calibration results of a run, for reporting.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct BatchStats {
    pub crop: CropCalibration,
    pub deskew: DeskewCalibration,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_keeps_active_edges_and_defaults_skipped_ones() {
        let decision = CropDecision {
            left: EdgeDecision::Keep(10),
            top: EdgeDecision::Skip,
            right: EdgeDecision::Averaged(20.4),
            bottom: EdgeDecision::Keep(30),
        };
        let rect = decision.resolve(1000, 2000);
        assert_eq!(rect.left, 10);
        assert_eq!(rect.top, 0);
        assert_eq!(rect.right, 980);
        assert_eq!(rect.bottom, 1970);
        assert_eq!(rect.width(), 970);
        assert_eq!(rect.height(), 1970);
    }

    #[test]
    fn resolve_clamps_negative_and_oversized_insets() {
        let decision = CropDecision {
            left: EdgeDecision::Keep(-50),
            top: EdgeDecision::Keep(10),
            right: EdgeDecision::Keep(-7),
            bottom: EdgeDecision::Skip,
        };
        let rect = decision.resolve(800, 600);
        assert_eq!(rect.left, 0);
        assert_eq!(rect.right, 800);
        assert!(rect.left < rect.right);
        assert!(rect.top < rect.bottom);
        assert!(rect.right <= 800 && rect.bottom <= 600);
    }

    #[test]
    fn resolve_falls_back_to_full_frame_on_degenerate_axis() {
        let decision = CropDecision {
            left: EdgeDecision::Keep(600),
            top: EdgeDecision::Skip,
            right: EdgeDecision::Keep(600),
            bottom: EdgeDecision::Skip,
        };
        let rect = decision.resolve(800, 600);
        assert_eq!((rect.left, rect.right), (0, 800));
    }

    #[test]
    fn none_decision_resolves_to_full_frame() {
        let rect = CropDecision::none().resolve(640, 480);
        assert_eq!(rect, CropRect { left: 0, top: 0, right: 640, bottom: 480 });
        assert!(!CropDecision::none().any_active());
    }
}
