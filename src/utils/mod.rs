pub mod error;
pub mod fs;

pub use error::{PreprocessError, PreprocessResult, ToolError};
