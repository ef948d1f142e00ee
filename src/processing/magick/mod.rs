//! External image-toolchain boundary.
//!
//! Every image operation crosses a process boundary: the engine never decodes
//! pixels itself. `ImageToolchain` is the seam the pipeline calls through;
//! `MagickToolchain` implements it with ImageMagick, GraphicsMagick, the
//! innercrop script, and pdftk. All invocations are blocking, use structured
//! argument lists (never a shell string), and run with an explicit working
//! directory.

pub mod parse;

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tracing::debug;

use crate::core::{CropRect, InnercropMode, RawCropBox};
use crate::utils::{PreprocessError, PreprocessResult, ToolError};

/// Threshold forwarded to `-deskew` when probing the skew angle.
const SKEW_PROBE_THRESHOLD_PCT: u32 = 75;
/// Threshold used when rendering bilevel temp crops for the skew probe.
const TEMP_CROP_THRESHOLD_PCT: u32 = 60;

/// The synchronous process-level boundary to the image tools.
///
/// Each call may fail with a tool-specific error mapped into the crate's
/// taxonomy: probe methods report `PreprocessError::Measurement`, everything
/// else `PreprocessError::Tool`.
pub trait ImageToolchain {
    /// Width and height of an image in pixels
    fn measure_dimensions(&self, image: &Path) -> PreprocessResult<(u32, u32)>;

    /// Raw content-box margins of a page. `scratch_dir` receives the
    /// detector's throwaway render.
    fn detect_crop_box(
        &self,
        image: &Path,
        width: u32,
        height: u32,
        mode: InnercropMode,
        fuzzval: u32,
        scratch_dir: &Path,
    ) -> PreprocessResult<RawCropBox>;

    /// Render a thresholded bilevel copy of `src` at `dest`
    fn convert_to_bilevel(&self, src: &Path, dest: &Path, threshold_pct: u32)
    -> PreprocessResult<()>;

    /// Render `src` cropped to `rect` at `dest`, optionally as bilevel
    fn render_crop(&self, src: &Path, dest: &Path, rect: &CropRect, bilevel: bool)
    -> PreprocessResult<()>;

    /// Render `src` rotated by `angle` degrees at `dest`
    fn render_rotate(
        &self,
        src: &Path,
        dest: &Path,
        angle: f64,
        quality_pct: Option<u32>,
        resize_pct: Option<u32>,
    ) -> PreprocessResult<()>;

    /// Render a compressed (optionally resized) copy of `src` at `dest`
    fn render_compress(
        &self,
        src: &Path,
        dest: &Path,
        quality_pct: u32,
        resize_pct: Option<u32>,
    ) -> PreprocessResult<()>;

    /// Signed skew angle of an image in degrees
    fn measure_skew_angle(&self, image: &Path) -> PreprocessResult<f64>;

    /// Merge all page documents in `folder` into one document at `dest`
    fn merge_to_document(&self, folder: &Path, dest: &Path) -> PreprocessResult<()>;
}

/// ImageMagick/GraphicsMagick-backed toolchain.
pub struct MagickToolchain {
    innercrop_bin: PathBuf,
    workdir: PathBuf,
}

impl MagickToolchain {
    /// `workdir` is applied to every spawned process; pointing it at a
    /// ramdisk keeps the tools' own temp files off slow storage.
    pub fn new(innercrop_bin: impl Into<PathBuf>, workdir: impl Into<PathBuf>) -> Self {
        Self {
            innercrop_bin: innercrop_bin.into(),
            workdir: workdir.into(),
        }
    }

    fn run(
        &self,
        tool: &str,
        bin: &Path,
        args: &[String],
        context: &Path,
    ) -> Result<Output, ToolError> {
        debug!(tool, ?args, "invoking external tool");
        let output = Command::new(bin)
            .args(args)
            .current_dir(&self.workdir)
            .output()
            .map_err(|e| ToolError::spawn(tool, e))?;
        if !output.status.success() {
            return Err(ToolError::failed(
                tool,
                context,
                format!(
                    "exit status {:?}: {}",
                    output.status.code(),
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            ));
        }
        Ok(output)
    }

    fn run_named(
        &self,
        tool: &str,
        args: &[String],
        context: &Path,
    ) -> Result<Output, ToolError> {
        self.run(tool, Path::new(tool), args, context)
    }
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

impl ImageToolchain for MagickToolchain {
    fn measure_dimensions(&self, image: &Path) -> PreprocessResult<(u32, u32)> {
        let args = vec![
            "-format".to_string(),
            "%wx%h".to_string(),
            path_arg(image),
        ];
        let output = self
            .run_named("identify", &args, image)
            .map_err(|e| PreprocessError::measurement(image, e.to_string()))?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        parse::identify_dimensions(&stdout).ok_or_else(|| {
            PreprocessError::measurement(
                image,
                format!("unparseable identify output: {}", stdout.trim()),
            )
        })
    }

    fn detect_crop_box(
        &self,
        image: &Path,
        width: u32,
        height: u32,
        mode: InnercropMode,
        fuzzval: u32,
        scratch_dir: &Path,
    ) -> PreprocessResult<RawCropBox> {
        // The detector insists on writing a render; park it in the scratch
        // dir, the caller clears it between pages.
        let stem = crate::utils::fs::file_stem(image)?;
        let scratch = match mode {
            InnercropMode::Box => scratch_dir.join(format!("{}_innercrop.jpg", stem)),
            InnercropMode::Crop => {
                let ext = image.extension().and_then(|e| e.to_str()).unwrap_or("tif");
                scratch_dir.join(format!("{}_innercrop.{}", stem, ext))
            }
        };
        let args = vec![
            "-f".to_string(),
            fuzzval.to_string(),
            "-m".to_string(),
            mode.as_str().to_string(),
            path_arg(image),
            path_arg(&scratch),
        ];
        let output = self.run("innercrop", &self.innercrop_bin, &args, image)?;
        let stderr = String::from_utf8_lossy(&output.stderr);
        if stderr.to_lowercase().contains("error") {
            return Err(ToolError::failed("innercrop", image, stderr.trim().to_string()).into());
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        parse::innercrop_corners(&stdout, width, height)
            .ok_or_else(|| ToolError::unparseable("innercrop", image, stdout.trim().to_string()).into())
    }

    fn convert_to_bilevel(
        &self,
        src: &Path,
        dest: &Path,
        threshold_pct: u32,
    ) -> PreprocessResult<()> {
        let args = vec![
            path_arg(src),
            "-threshold".to_string(),
            format!("{}%", threshold_pct),
            "-compress".to_string(),
            "Group4".to_string(),
            path_arg(dest),
        ];
        self.run_named("convert", &args, src)?;
        Ok(())
    }

    fn render_crop(
        &self,
        src: &Path,
        dest: &Path,
        rect: &CropRect,
        bilevel: bool,
    ) -> PreprocessResult<()> {
        let mut args = vec![
            path_arg(src),
            "-crop".to_string(),
            format!(
                "{}x{}+{}+{}",
                rect.width(),
                rect.height(),
                rect.left,
                rect.top
            ),
        ];
        if bilevel {
            args.push("-threshold".to_string());
            args.push(format!("{}%", TEMP_CROP_THRESHOLD_PCT));
            args.push("-compress".to_string());
            args.push("Group4".to_string());
        }
        args.push(path_arg(dest));
        self.run_named("convert", &args, src)?;
        Ok(())
    }

    fn render_rotate(
        &self,
        src: &Path,
        dest: &Path,
        angle: f64,
        quality_pct: Option<u32>,
        resize_pct: Option<u32>,
    ) -> PreprocessResult<()> {
        let mut args = vec![path_arg(src), "-rotate".to_string(), angle.to_string()];
        if let Some(resize) = resize_pct {
            args.push("-resize".to_string());
            args.push(format!("{}%", resize));
        }
        if let Some(quality) = quality_pct {
            args.push("-quality".to_string());
            args.push(quality.to_string());
        }
        args.push(path_arg(dest));
        self.run_named("convert", &args, src)?;
        Ok(())
    }

    fn render_compress(
        &self,
        src: &Path,
        dest: &Path,
        quality_pct: u32,
        resize_pct: Option<u32>,
    ) -> PreprocessResult<()> {
        let mut args = vec!["convert".to_string(), path_arg(src)];
        if let Some(resize) = resize_pct {
            args.push("-resize".to_string());
            args.push(format!("{}%", resize));
        }
        args.push("-quality".to_string());
        args.push(quality_pct.to_string());
        args.push(path_arg(dest));
        self.run_named("gm", &args, src)?;
        Ok(())
    }

    fn measure_skew_angle(&self, image: &Path) -> PreprocessResult<f64> {
        let args = vec![
            path_arg(image),
            "-deskew".to_string(),
            format!("{}%", SKEW_PROBE_THRESHOLD_PCT),
            "-format".to_string(),
            "%[deskew:angle]".to_string(),
            "info:".to_string(),
        ];
        let output = self
            .run_named("convert", &args, image)
            .map_err(|e| PreprocessError::measurement(image, e.to_string()))?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        parse::skew_angle(&stdout).ok_or_else(|| {
            PreprocessError::measurement(
                image,
                format!("unparseable deskew output: {}", stdout.trim()),
            )
        })
    }

    fn merge_to_document(&self, folder: &Path, dest: &Path) -> PreprocessResult<()> {
        let mut pages: Vec<PathBuf> = std::fs::read_dir(folder)
            .map_err(|e| {
                PreprocessError::resource(format!("failed to read {}: {}", folder.display(), e))
            })?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| {
                p.extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| e.eq_ignore_ascii_case("pdf"))
            })
            .collect();
        if pages.is_empty() {
            return Err(ToolError::failed("pdftk", folder, "no page documents to merge").into());
        }
        pages.sort();

        let mut args: Vec<String> = pages.iter().map(|p| path_arg(p)).collect();
        args.push("cat".to_string());
        args.push("output".to_string());
        args.push(path_arg(dest));
        self.run_named("pdftk", &args, folder)?;
        Ok(())
    }
}
