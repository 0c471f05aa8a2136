//! Error types for the render pipeline.

use std::path::PathBuf;
use thiserror::Error;

/// Broad failure class, used to pick a process exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Bad input or environment, detected before any engine resource exists.
    Precondition,
    /// Engine object, program or parameter could not be created or bound.
    Resource,
    /// The launch itself failed; the output buffer was never read.
    Execution,
    /// The image could not be written.
    Io,
}

/// Main error type for render operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Required environment variable is unset or empty
    #[error("Environment variable {0} is not set (expected a writable output directory)")]
    MissingEnv(&'static str),

    /// Output root does not exist or is not a directory
    #[error("Output root is not a directory: {0}")]
    OutputRootMissing(PathBuf),

    /// Image width or height is zero
    #[error("Invalid image dimensions {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    /// Bounding extent is not a positive finite number
    #[error("Bounding extent must be positive, got {0}")]
    InvalidExtent(f32),

    /// Group built with no instances
    #[error("Scene has no geometry instances")]
    EmptyScene,

    /// Request outside what this pipeline supports
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// Program module or entry symbol not found
    #[error("Program not found: {module}::{symbol}")]
    ProgramNotFound { module: String, symbol: String },

    /// Acceleration builder name not recognized
    #[error("Unknown acceleration builder: {0}")]
    UnknownAcceleration(String),

    /// Handle does not refer to a live object of the context
    #[error("Invalid {kind} handle {index}")]
    InvalidHandle { kind: &'static str, index: u32 },

    /// Engine reported a failure while creating or configuring objects
    #[error("Engine error: {0}")]
    Engine(String),

    /// Named parameter was read before being bound
    #[error("Variable not found: {0}")]
    VariableNotFound(String),

    /// Named parameter holds a different type than requested
    #[error("Type mismatch for {name}: expected {expected}, got {actual}")]
    TypeMismatch {
        name: String,
        expected: &'static str,
        actual: &'static str,
    },

    /// Launch could not run to completion
    #[error("Launch failed: {0}")]
    Launch(String),

    /// Buffer is already mapped
    #[error("Buffer {0} is already mapped")]
    BufferMapped(u32),

    /// Output image could not be written
    #[error("Cannot write {path}: {source}")]
    OutputFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    /// Create an engine error from a string.
    pub fn engine(msg: impl Into<String>) -> Self {
        Self::Engine(msg.into())
    }

    /// Create a launch error from a string.
    pub fn launch(msg: impl Into<String>) -> Self {
        Self::Launch(msg.into())
    }

    /// Create an unsupported-request error.
    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported(msg.into())
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::MissingEnv(_)
            | Self::OutputRootMissing(_)
            | Self::InvalidDimensions { .. }
            | Self::InvalidExtent(_)
            | Self::EmptyScene
            | Self::Unsupported(_) => ErrorCategory::Precondition,
            Self::ProgramNotFound { .. }
            | Self::UnknownAcceleration(_)
            | Self::InvalidHandle { .. }
            | Self::Engine(_)
            | Self::VariableNotFound(_)
            | Self::TypeMismatch { .. } => ErrorCategory::Resource,
            Self::Launch(_) | Self::BufferMapped(_) => ErrorCategory::Execution,
            Self::OutputFile { .. } => ErrorCategory::Io,
        }
    }

    /// Process exit code for this error. Always non-zero.
    pub fn exit_code(&self) -> i32 {
        match self.category() {
            ErrorCategory::Precondition => 2,
            ErrorCategory::Resource => 3,
            ErrorCategory::Execution => 4,
            ErrorCategory::Io => 5,
        }
    }
}

/// Result type alias for render operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let e = Error::MissingEnv("PREFIX");
        assert!(e.to_string().contains("PREFIX"));

        let e = Error::ProgramNotFound {
            module: "discwithholes".into(),
            symbol: "bounds".into(),
        };
        assert_eq!(e.to_string(), "Program not found: discwithholes::bounds");
    }

    #[test]
    fn test_exit_codes_distinct_and_nonzero() {
        let errs = [
            Error::EmptyScene,
            Error::UnknownAcceleration("Kd".into()),
            Error::launch("boom"),
            Error::OutputFile {
                path: "x".into(),
                source: std::io::Error::other("disk"),
            },
        ];
        let codes: Vec<i32> = errs.iter().map(Error::exit_code).collect();
        assert_eq!(codes, vec![2, 3, 4, 5]);
    }
}
