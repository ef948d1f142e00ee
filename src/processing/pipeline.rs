//! Pipeline orchestrator.
//!
//! Drives one batch (one physical book) through the stage sequence:
//! enumerate, detect spreads, detect raw crop boxes, calibrate and finalize
//! crops, render temp crops, measure skew, calibrate and finalize deskew,
//! render final outputs, merge, cleanup. Strictly sequential, pages always in
//! lexicographically sorted path order; any external-tool failure aborts the
//! whole batch, and cleanup runs on every exit path.

use std::path::{Path, PathBuf};
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::benchmarking::{TimingReporter, TimingStats};
use crate::core::progress::log_batch_progress;
use crate::core::{BatchStats, DeskewDecision, PageRecord, RunSettings};
use crate::processing::calibration::{calibrate_crop, calibrate_deskew};
use crate::processing::decision::{select_crops, select_deskew};
use crate::processing::magick::ImageToolchain;
use crate::processing::resources::WorkDirs;
use crate::processing::spread::flag_spreads;
use crate::utils::fs::{clear_dir, copy_into_dir, file_size, file_stem, list_page_files};
use crate::utils::{PreprocessError, PreprocessResult};

/// Quality for final page renders.
const FINAL_QUALITY_PCT: u32 = 50;
/// Quality for pass-through binding pages.
const BINDING_QUALITY_PCT: u32 = 33;
/// Resize for pass-through binding pages.
const BINDING_RESIZE_PCT: u32 = 50;

/// Outcome of one batch run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    /// Pages that went through the decision stages
    pub pages: usize,
    /// Binding pages set aside at enumeration
    pub bindings: usize,
    /// Pages flagged as spreads
    pub spreads: usize,
    /// Pages with at least one active crop edge
    pub cropped: usize,
    /// Pages deskewed in the final render
    pub deskewed: usize,
    /// The idempotent short-circuit was taken; nothing was measured or rendered
    pub skipped: bool,
    /// Path of the merged document, when one was produced
    pub merged_document: Option<PathBuf>,
    /// Calibration results, when the decision stages ran
    pub stats: Option<BatchStats>,
    /// Timing of every operation in the run
    pub timing: TimingStats,
}

impl RunSummary {
    fn skipped() -> Self {
        Self {
            pages: 0,
            bindings: 0,
            spreads: 0,
            cropped: 0,
            deskewed: 0,
            skipped: true,
            merged_document: None,
            stats: None,
            timing: TimingStats::new(),
        }
    }

    fn empty(timing: TimingStats) -> Self {
        Self {
            skipped: false,
            timing,
            ..Self::skipped()
        }
    }
}

/// Orchestrates the preprocessing of one book folder.
pub struct BookPreprocessor<'a> {
    settings: RunSettings,
    toolchain: &'a dyn ImageToolchain,
    source_dir: PathBuf,
    pdf_dest: PathBuf,
    temp_dir: PathBuf,
    intermediate_dir: PathBuf,
    timing: TimingStats,
}

impl<'a> BookPreprocessor<'a> {
    /// Validates the settings and derives the run's paths. `source_dir` is
    /// the directory holding the page images of one book.
    pub fn new(
        source_dir: impl Into<PathBuf>,
        settings: RunSettings,
        toolchain: &'a dyn ImageToolchain,
    ) -> PreprocessResult<Self> {
        settings.validate()?;
        let source_dir: PathBuf = source_dir.into();
        let source_name = source_dir
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.to_string())
            .ok_or_else(|| {
                PreprocessError::settings(format!(
                    "source directory has no usable name: {}",
                    source_dir.display()
                ))
            })?;
        let source_root = source_dir
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_default();
        let pdf_dest = settings
            .output_image_location
            .join(format!("{source_name}.pdf"));
        let temp_dir = settings.temp_location.join(&source_name);
        let intermediate_dir = source_root.join(format!("{source_name}_output"));
        Ok(Self {
            settings,
            toolchain,
            source_dir,
            pdf_dest,
            temp_dir,
            intermediate_dir,
            timing: TimingStats::new(),
        })
    }

    /// Path the merged document is (or would be) written to.
    pub fn merged_document_path(&self) -> &Path {
        &self.pdf_dest
    }

    /// Run the full pipeline. Cleanup of the temp and intermediate
    /// directories happens on every exit path before this returns.
    pub fn run(&mut self) -> PreprocessResult<RunSummary> {
        if self.settings.skip_if_pdf_exists && self.pdf_dest.exists() {
            info!(
                document = %self.pdf_dest.display(),
                "merged output already exists, skipping run"
            );
            crate::utils::fs::remove_dir_best_effort(&self.temp_dir);
            crate::utils::fs::remove_dir_best_effort(&self.intermediate_dir);
            return Ok(RunSummary::skipped());
        }

        let dirs = WorkDirs::create(
            &self.settings.output_image_location,
            &self.temp_dir,
            &self.intermediate_dir,
        )?;
        let result = self.process(&dirs);
        // deliberate release on success and failure alike; Drop covers unwinds
        dirs.release();
        let summary = result?;
        info!("{}", TimingReporter::from_stats(self.timing.clone()));
        Ok(summary)
    }

    fn timed<T>(
        &mut self,
        op: &str,
        f: impl FnOnce(&dyn ImageToolchain) -> PreprocessResult<T>,
    ) -> PreprocessResult<T> {
        let start = Instant::now();
        let result = f(self.toolchain);
        self.timing.record(op, start.elapsed().as_secs_f64());
        result
    }

    fn process(&mut self, dirs: &WorkDirs) -> PreprocessResult<RunSummary> {
        // Enumerate. Sorted path order is load-bearing from here on.
        let files = list_page_files(&self.source_dir, &self.settings.valid_exts)?;
        if files.is_empty() {
            warn!(source = %self.source_dir.display(), "no page images found");
            return Ok(RunSummary::empty(self.timing.clone()));
        }
        let (bindings, body) = self.split_bindings(files);
        info!(
            pages = body.len(),
            bindings = bindings.len(),
            source = %self.source_dir.display(),
            "starting preprocessing run"
        );

        let mut pages = Vec::with_capacity(body.len());
        for path in body {
            let size = file_size(&path)?;
            let (width, height) =
                self.timed("Measure dimensions", |tc| tc.measure_dimensions(&path))?;
            pages.push(PageRecord::new(path, width, height, size));
        }

        if self.settings.spread_detection {
            flag_spreads(&mut pages, self.settings.spread_select_limit_adjust);
        }

        let mut stats = BatchStats::default();
        if self.settings.crop_images {
            self.detect_raw_crops(&mut pages, dirs)?;
            stats.crop = calibrate_crop(
                &pages,
                self.settings.crop_select_limit_adjust,
                self.settings.crop_select_limit_type,
            );
            select_crops(&mut pages, &stats.crop);
        } else {
            debug!("crop stages bypassed by configuration");
        }

        if self.settings.deskew_images {
            self.render_temp_crops(&mut pages, dirs)?;
            self.detect_raw_skew(&mut pages)?;
            stats.deskew = calibrate_deskew(
                &pages,
                self.settings.deskew_select_limit_adjust,
                self.settings.deskew_select_limit_type,
            );
            select_deskew(&mut pages, &stats.deskew, self.settings.deskew_select_abs_limit);
        } else {
            debug!("deskew stages bypassed by configuration");
        }

        // the skew probes are consumed, reclaim the scratch space
        clear_dir(dirs.temp_dir())?;

        for page in &pages {
            self.render_page(page, dirs)?;
            clear_dir(dirs.temp_dir())?;
        }
        self.render_bindings(&bindings, dirs)?;

        let merged_document = if self.settings.output_pdf {
            let dest = self.pdf_dest.clone();
            let folder = dirs.intermediate_dir().to_path_buf();
            self.timed("Merge document", |tc| tc.merge_to_document(&folder, &dest))?;
            Some(dest)
        } else {
            None
        };

        Ok(RunSummary {
            pages: pages.len(),
            bindings: bindings.len(),
            spreads: pages.iter().filter(|p| p.spread).count(),
            cropped: pages.iter().filter(|p| p.crop.any_active()).count(),
            deskewed: pages.iter().filter(|p| p.deskew.is_rotate()).count(),
            skipped: false,
            merged_document,
            stats: Some(stats),
            timing: self.timing.clone(),
        })
    }

    /// Set the first and last page aside as binding/cover when enabled.
    fn split_bindings(&self, mut files: Vec<PathBuf>) -> (Vec<PathBuf>, Vec<PathBuf>) {
        if !self.settings.has_binding || files.len() < 2 {
            return (Vec::new(), files);
        }
        let last = files.pop().expect("checked length above");
        let first = files.remove(0);
        (vec![first, last], files)
    }

    fn detect_raw_crops(
        &mut self,
        pages: &mut [PageRecord],
        dirs: &WorkDirs,
    ) -> PreprocessResult<()> {
        let total = pages.len();
        debug!(total, "detecting raw crop boxes");
        for index in 0..total {
            let (path, width, height) = {
                let page = &pages[index];
                (page.path.clone(), page.width, page.height)
            };
            // the detector works better on a bilevel copy for some material
            let probe_src = if self.settings.bw_for_innercrop {
                let stem = file_stem(&path)?;
                let dest = dirs
                    .temp_dir()
                    .join(format!("{stem}_bw_for_innercrop.tif"));
                let threshold = self.settings.innercrop_bw_src_threshold;
                self.timed("Bilevel for crop detection", |tc| {
                    tc.convert_to_bilevel(&path, &dest, threshold)
                })?;
                dest
            } else {
                path.clone()
            };
            let mode = self.settings.innercrop_mode;
            let fuzzval = self.settings.innercrop_fuzzval;
            let temp = dirs.temp_dir().to_path_buf();
            let raw = self.timed("Get crop coordinates", |tc| {
                tc.detect_crop_box(&probe_src, width, height, mode, fuzzval, &temp)
            })?;
            pages[index].raw_crop = Some(raw);
            clear_dir(dirs.temp_dir())?;
            log_batch_progress(
                "Get crop coordinates",
                index + 1,
                total,
                self.settings.debug_pivot,
                &self.timing,
            );
        }
        Ok(())
    }

    /// Render a cropped bilevel copy of every page for the skew probe; skew
    /// measurement is more reliable once the margins are gone.
    fn render_temp_crops(
        &mut self,
        pages: &mut [PageRecord],
        dirs: &WorkDirs,
    ) -> PreprocessResult<()> {
        debug!(total = pages.len(), "rendering temp crops for the skew probe");
        for index in 0..pages.len() {
            let (path, rect) = {
                let page = &pages[index];
                (page.path.clone(), page.crop_rect())
            };
            let stem = file_stem(&path)?;
            let dest = dirs.temp_dir().join(format!("{stem}.tif"));
            self.timed("Render temp crop", |tc| {
                tc.render_crop(&path, &dest, &rect, true)
            })?;
            pages[index].deskew_probe = Some(dest);
        }
        Ok(())
    }

    fn detect_raw_skew(&mut self, pages: &mut [PageRecord]) -> PreprocessResult<()> {
        let total = pages.len();
        debug!(total, "measuring skew angles");
        for index in 0..total {
            let probe = pages[index]
                .deskew_probe
                .clone()
                .expect("temp crops render before the skew probe");
            let angle = self.timed("Get deskew angle", |tc| tc.measure_skew_angle(&probe))?;
            pages[index].raw_angle = angle;
            log_batch_progress(
                "Get deskew angle",
                index + 1,
                total,
                self.settings.debug_pivot,
                &self.timing,
            );
        }
        Ok(())
    }

    /// Final render of one page: crop, then deskew or plain compress, then
    /// copy to the image output and convert to a page document.
    fn render_page(&mut self, page: &PageRecord, dirs: &WorkDirs) -> PreprocessResult<()> {
        let stem = file_stem(&page.path)?;
        let ext = page
            .path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("tif")
            .to_string();
        debug!(page = %page.path.display(), "rendering final output");

        let cropped = dirs.temp_dir().join(format!("{stem}_cropped.{ext}"));
        let rect = page.crop_rect();
        let src = page.path.clone();
        self.timed("Crop image", |tc| tc.render_crop(&src, &cropped, &rect, false))?;

        let resize = self.settings.output_resize_pct();
        let rendered = match page.deskew {
            DeskewDecision::Rotate(angle) => {
                let dest = dirs.temp_dir().join(format!("{stem}_deskewed.{ext}"));
                self.timed("Deskew image", |tc| {
                    tc.render_rotate(&cropped, &dest, angle, Some(FINAL_QUALITY_PCT), resize)
                })?;
                dest
            }
            DeskewDecision::Skip => {
                let dest = dirs.temp_dir().join(format!("{stem}_compressed.jpg"));
                self.timed("Compress image", |tc| {
                    tc.render_compress(&cropped, &dest, FINAL_QUALITY_PCT, resize)
                })?;
                dest
            }
        };

        if self.settings.output_images {
            copy_into_dir(&rendered, dirs.output_dir())?;
        }
        if self.settings.output_pdf {
            let dest = dirs.intermediate_dir().join(format!("{stem}.pdf"));
            self.timed("Convert to document", |tc| {
                tc.render_compress(&rendered, &dest, FINAL_QUALITY_PCT, None)
            })?;
        }
        Ok(())
    }

    /// Binding pages bypass the decision stages: passed through verbatim to
    /// the image output and compressed hard for the merged document.
    fn render_bindings(&mut self, bindings: &[PathBuf], dirs: &WorkDirs) -> PreprocessResult<()> {
        if bindings.is_empty() || self.settings.remove_binding {
            return Ok(());
        }
        for binding in bindings {
            debug!(page = %binding.display(), "passing binding page through");
            if self.settings.output_images {
                copy_into_dir(binding, dirs.output_dir())?;
            }
            if self.settings.output_pdf {
                let stem = file_stem(binding)?;
                let dest = dirs.intermediate_dir().join(format!("{stem}.pdf"));
                self.timed("Convert to document", |tc| {
                    tc.render_compress(
                        binding,
                        &dest,
                        BINDING_QUALITY_PCT,
                        Some(BINDING_RESIZE_PCT),
                    )
                })?;
            }
        }
        Ok(())
    }
}
