//! Working-directory lifecycle for one batch run.
//!
//! The run owns three directories: the persistent image output directory,
//! a temp directory for per-page scratch renders, and an intermediate
//! directory collecting per-page documents for the final merge. The last two
//! must be gone after the run no matter how it ends, so removal lives both in
//! `release` (the deliberate path) and in `Drop` (unwind and interrupt paths).

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::utils::fs::{create_dir_idempotent, remove_dir_best_effort};
use crate::utils::PreprocessResult;

/// Scoped ownership of a run's working directories.
pub struct WorkDirs {
    output_dir: PathBuf,
    temp_dir: PathBuf,
    intermediate_dir: PathBuf,
    released: bool,
}

impl WorkDirs {
    /// Create all three directories (idempotently) before any stage runs.
    /// Failure here is a `ResourceError` and aborts the run before it starts.
    pub fn create(
        output_dir: impl Into<PathBuf>,
        temp_dir: impl Into<PathBuf>,
        intermediate_dir: impl Into<PathBuf>,
    ) -> PreprocessResult<Self> {
        let dirs = Self {
            output_dir: output_dir.into(),
            temp_dir: temp_dir.into(),
            intermediate_dir: intermediate_dir.into(),
            released: false,
        };
        create_dir_idempotent(&dirs.output_dir)?;
        create_dir_idempotent(&dirs.temp_dir)?;
        create_dir_idempotent(&dirs.intermediate_dir)?;
        debug!(
            output = %dirs.output_dir.display(),
            temp = %dirs.temp_dir.display(),
            intermediate = %dirs.intermediate_dir.display(),
            "created working directories"
        );
        Ok(dirs)
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn temp_dir(&self) -> &Path {
        &self.temp_dir
    }

    pub fn intermediate_dir(&self) -> &Path {
        &self.intermediate_dir
    }

    /// Remove the temp and intermediate directories. The output directory
    /// persists: it holds the run's artifacts.
    pub fn release(mut self) {
        self.remove_transient();
        self.released = true;
    }

    fn remove_transient(&self) {
        remove_dir_best_effort(&self.temp_dir);
        remove_dir_best_effort(&self.intermediate_dir);
    }
}

impl Drop for WorkDirs {
    fn drop(&mut self) {
        if !self.released {
            self.remove_transient();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_is_idempotent_and_release_removes_transient_dirs() {
        let root = tempfile::tempdir().unwrap();
        let output = root.path().join("out");
        let temp = root.path().join("temp");
        let intermediate = root.path().join("inter");

        let dirs = WorkDirs::create(&output, &temp, &intermediate).unwrap();
        assert!(temp.exists() && intermediate.exists() && output.exists());
        drop(dirs);

        // a second creation over the surviving output dir must succeed
        let dirs = WorkDirs::create(&output, &temp, &intermediate).unwrap();
        dirs.release();
        assert!(output.exists());
        assert!(!temp.exists());
        assert!(!intermediate.exists());
    }

    #[test]
    fn drop_removes_transient_dirs_on_unwind() {
        let root = tempfile::tempdir().unwrap();
        let output = root.path().join("out");
        let temp = root.path().join("temp");
        let intermediate = root.path().join("inter");

        let result = std::panic::catch_unwind(|| {
            let _dirs = WorkDirs::create(&output, &temp, &intermediate).unwrap();
            panic!("interrupted");
        });
        assert!(result.is_err());
        assert!(!temp.exists());
        assert!(!intermediate.exists());
        assert!(output.exists());
    }

    #[test]
    fn release_tolerates_already_removed_dirs() {
        let root = tempfile::tempdir().unwrap();
        let output = root.path().join("out");
        let temp = root.path().join("temp");
        let intermediate = root.path().join("inter");

        let dirs = WorkDirs::create(&output, &temp, &intermediate).unwrap();
        std::fs::remove_dir_all(&temp).unwrap();
        dirs.release();
        assert!(!intermediate.exists());
    }
}
