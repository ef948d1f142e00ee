pub mod progress;
pub mod settings;
pub mod types;

pub use progress::ProgressSnapshot;
pub use settings::{InnercropMode, LimitStat, RunSettings};
pub use types::{
    BatchStats, CropCalibration, CropDecision, CropRect, DeskewCalibration, DeskewDecision,
    EdgeDecision, Margin, PageRecord, PoolStats, RawCropBox,
};
