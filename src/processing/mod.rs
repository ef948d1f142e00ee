pub mod calibration;
pub mod decision;
pub mod magick;
pub mod pipeline;
pub mod resources;
pub mod spread;

pub use magick::{ImageToolchain, MagickToolchain};
pub use pipeline::{BookPreprocessor, RunSummary};
pub use resources::WorkDirs;
