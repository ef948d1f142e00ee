//! Run configuration for a preprocessing batch.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::utils::{PreprocessError, PreprocessResult};

/// Which statistic of a calibration pool the decision limit is derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LimitStat {
    Mean,
    Median,
}

/// Output mode forwarded to the innercrop detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InnercropMode {
    Box,
    Crop,
}

impl InnercropMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Box => "box",
            Self::Crop => "crop",
        }
    }
}

/// Immutable configuration snapshot for one preprocessing run.
///
/// Keys without a default must be present when deserializing; the remaining
/// keys carry the defaults the production step configuration used. Unknown
/// keys are rejected. `validate` must pass before the pipeline may start.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunSettings {
    /// File extensions considered page images, each with a leading dot
    pub valid_exts: Vec<String>,
    /// Destination directory for rendered per-page images
    pub output_image_location: PathBuf,
    /// Root directory for transient working files
    pub temp_location: PathBuf,
    /// Path to the innercrop executable
    pub innercrop_location: PathBuf,

    /// Emit rendered per-page images
    #[serde(default = "default_true")]
    pub output_images: bool,
    /// Emit a merged document from the rendered pages
    #[serde(default)]
    pub output_pdf: bool,

    /// Treat the first and last page as binding/cover and exempt them
    #[serde(default)]
    pub has_binding: bool,
    /// Drop binding pages from the output instead of passing them through
    #[serde(default)]
    pub remove_binding: bool,

    /// Master toggle for the crop stages
    #[serde(default = "default_true")]
    pub crop_images: bool,
    /// Master toggle for the deskew stages
    #[serde(default = "default_true")]
    pub deskew_images: bool,

    /// Detect double-page spreads and exempt them from crop/deskew
    #[serde(default = "default_true")]
    pub spread_detection: bool,
    /// Spread limit = median dimension times this factor
    #[serde(default = "default_spread_limit_adjust")]
    pub spread_select_limit_adjust: f64,

    /// Crop limit = selected pool statistic times this factor
    #[serde(default = "default_crop_limit_adjust")]
    pub crop_select_limit_adjust: f64,
    /// Statistic the crop limit is derived from
    #[serde(default = "default_crop_limit_type")]
    pub crop_select_limit_type: LimitStat,

    /// Deskew limit = selected pool statistic times this factor
    #[serde(default = "default_deskew_limit_adjust")]
    pub deskew_select_limit_adjust: f64,
    /// Statistic the deskew limit is derived from
    #[serde(default = "default_deskew_limit_type")]
    pub deskew_select_limit_type: LimitStat,
    /// Fixed floor: absolute angles below this are never deskewed
    #[serde(default = "default_deskew_abs_limit")]
    pub deskew_select_abs_limit: f64,

    /// Run the crop detector against a bilevel copy of the page
    #[serde(default)]
    pub bw_for_innercrop: bool,
    /// Threshold percentage for that bilevel copy
    #[serde(default = "default_bw_threshold")]
    pub innercrop_bw_src_threshold: u32,
    /// Fuzz percentage forwarded to the crop detector
    #[serde(default = "default_fuzzval")]
    pub innercrop_fuzzval: u32,
    /// Output mode forwarded to the crop detector
    #[serde(default = "default_innercrop_mode")]
    pub innercrop_mode: InnercropMode,

    /// Resize percentage for rendered outputs; 100 means no resize
    #[serde(default = "default_output_resize")]
    pub output_resize: u32,
    /// Return immediately if the merged output document already exists
    #[serde(default)]
    pub skip_if_pdf_exists: bool,
    /// Emit a progress line every N pages during per-page loops
    #[serde(default = "default_debug_pivot")]
    pub debug_pivot: usize,
}

fn default_true() -> bool {
    true
}

fn default_spread_limit_adjust() -> f64 {
    1.25
}

fn default_crop_limit_adjust() -> f64 {
    3.0
}

fn default_crop_limit_type() -> LimitStat {
    LimitStat::Median
}

fn default_deskew_limit_adjust() -> f64 {
    5.5
}

fn default_deskew_limit_type() -> LimitStat {
    LimitStat::Mean
}

fn default_deskew_abs_limit() -> f64 {
    0.1
}

fn default_bw_threshold() -> u32 {
    30
}

fn default_fuzzval() -> u32 {
    75
}

fn default_innercrop_mode() -> InnercropMode {
    InnercropMode::Box
}

fn default_output_resize() -> u32 {
    200
}

fn default_debug_pivot() -> usize {
    10
}

impl RunSettings {
    /// Deserialize a settings snapshot from JSON
    pub fn from_json(json: &str) -> PreprocessResult<Self> {
        let settings: Self = serde_json::from_str(json)
            .map_err(|e| PreprocessError::settings(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Validate value ranges; called before the pipeline starts
    pub fn validate(&self) -> PreprocessResult<()> {
        if self.valid_exts.is_empty() {
            return Err(PreprocessError::settings("valid_exts must not be empty"));
        }
        for ext in &self.valid_exts {
            if !ext.starts_with('.') || ext.len() < 2 {
                return Err(PreprocessError::settings(format!(
                    "valid_exts entries must be extensions with a leading dot, got {:?}",
                    ext
                )));
            }
        }
        if self.spread_select_limit_adjust <= 0.0 {
            return Err(PreprocessError::settings(
                "spread_select_limit_adjust must be positive",
            ));
        }
        if self.crop_select_limit_adjust <= 0.0 {
            return Err(PreprocessError::settings(
                "crop_select_limit_adjust must be positive",
            ));
        }
        if self.deskew_select_limit_adjust <= 0.0 {
            return Err(PreprocessError::settings(
                "deskew_select_limit_adjust must be positive",
            ));
        }
        if self.deskew_select_abs_limit < 0.0 {
            return Err(PreprocessError::settings(
                "deskew_select_abs_limit must not be negative",
            ));
        }
        if self.innercrop_bw_src_threshold > 100 {
            return Err(PreprocessError::settings(
                "innercrop_bw_src_threshold must be a percentage (0-100)",
            ));
        }
        if self.innercrop_fuzzval > 100 {
            return Err(PreprocessError::settings(
                "innercrop_fuzzval must be a percentage (0-100)",
            ));
        }
        if self.output_resize == 0 {
            return Err(PreprocessError::settings("output_resize must be positive"));
        }
        if self.debug_pivot == 0 {
            return Err(PreprocessError::settings("debug_pivot must be positive"));
        }
        Ok(())
    }

    /// Resize argument for final renders, or None when no resize is wanted
    pub fn output_resize_pct(&self) -> Option<u32> {
        if self.output_resize == 100 {
            None
        } else {
            Some(self.output_resize)
        }
    }
}
