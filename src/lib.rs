//! Batch crop/deskew decision engine for scanned book pages.
//!
//! Given one folder of page images, the engine measures every page through an
//! external image toolchain, calibrates per-batch acceptance limits from the
//! raw measurements, decides per page whether to crop and deskew, and renders
//! the outputs with guaranteed cleanup of its working directories.

// Module declarations in dependency order
pub mod benchmarking;
pub mod core;
pub mod processing;
pub mod utils;

// Public exports for external consumers
pub use benchmarking::{TimingReporter, TimingStats};
pub use core::{BatchStats, PageRecord, RunSettings};
pub use processing::{BookPreprocessor, ImageToolchain, MagickToolchain, RunSummary};
pub use utils::{PreprocessError, PreprocessResult, ToolError};
