//! Error types for the preprocessing engine.
//!
//! Provides a hierarchy of error types using `thiserror` for ergonomic error handling.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors from invoking the external image toolchain.
///
/// Every toolchain operation runs as a separate process; this type captures
/// the three ways that boundary can fail.
#[derive(Error, Debug)]
pub enum ToolError {
    /// The tool binary could not be spawned at all
    #[error("failed to spawn {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: io::Error,
    },
    /// The tool ran but reported failure
    #[error("{tool} failed for {path}: {detail}")]
    Failed {
        tool: String,
        path: PathBuf,
        detail: String,
    },
    /// The tool succeeded but produced output the parsers do not understand
    #[error("unparseable {tool} output for {path}: {output}")]
    Unparseable {
        tool: String,
        path: PathBuf,
        output: String,
    },
}

/// Main error type for the preprocessing engine.
///
/// All fatal errors abort the batch; cleanup of the working directories is
/// guaranteed to have run before one of these reaches the caller.
#[derive(Error, Debug)]
pub enum PreprocessError {
    /// The run settings failed validation
    #[error("settings error: {0}")]
    Settings(String),

    /// An external tool invocation failed
    #[error("tool invocation error: {0}")]
    Tool(#[from] ToolError),

    /// A dimension or skew probe failed
    #[error("measurement error for {path}: {reason}")]
    Measurement { path: PathBuf, reason: String },

    /// A working directory or output file could not be created
    #[error("resource error: {0}")]
    Resource(String),
}

/// Convenience result type for preprocessing operations.
pub type PreprocessResult<T> = Result<T, PreprocessError>;

// Helper methods for error creation
impl PreprocessError {
    pub fn settings<T: Into<String>>(msg: T) -> Self {
        Self::Settings(msg.into())
    }

    pub fn measurement(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Measurement {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn resource<T: Into<String>>(msg: T) -> Self {
        Self::Resource(msg.into())
    }
}

impl ToolError {
    pub fn spawn(tool: impl Into<String>, source: io::Error) -> Self {
        Self::Spawn {
            tool: tool.into(),
            source,
        }
    }

    pub fn failed(
        tool: impl Into<String>,
        path: impl Into<PathBuf>,
        detail: impl Into<String>,
    ) -> Self {
        Self::Failed {
            tool: tool.into(),
            path: path.into(),
            detail: detail.into(),
        }
    }

    pub fn unparseable(
        tool: impl Into<String>,
        path: impl Into<PathBuf>,
        output: impl Into<String>,
    ) -> Self {
        Self::Unparseable {
            tool: tool.into(),
            path: path.into(),
            output: output.into(),
        }
    }
}
