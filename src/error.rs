//! Unified error type for CLI output.
//!
//! Domain errors from the engine, inspections, and refactorings bridge into
//! one [`VbatError`] with stable integer output codes, so callers scripting
//! the CLI can dispatch on exit codes and JSON error payloads.

use std::fmt;

use thiserror::Error;

use crate::vba::engine::EngineError;
use crate::vba::ops::RefactoringError;
use crate::vba::source::{ApplyError, SourceError};

// ============================================================================
// Output Error Codes
// ============================================================================

/// Stable error codes for JSON output and process exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OutputErrorCode {
    /// Invalid arguments from caller (bad input, malformed location).
    InvalidArguments = 2,
    /// Resolution errors (declaration not found, module unavailable).
    ResolutionError = 3,
    /// Apply errors (failed to write changes, conflicting rename).
    ApplyError = 4,
    /// Cooperative cancellation observed; distinguished from failures.
    Cancelled = 5,
    /// Internal errors (bugs, unexpected state).
    InternalError = 10,
}

impl OutputErrorCode {
    /// Get the numeric code value.
    pub fn code(&self) -> u8 {
        *self as u8
    }
}

impl fmt::Display for OutputErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

// ============================================================================
// Unified Error Type
// ============================================================================

/// Unified error for the CLI boundary.
#[derive(Debug, Error)]
pub enum VbatError {
    /// Invalid arguments from caller.
    #[error("invalid arguments: {message}")]
    InvalidArguments { message: String },

    /// No declaration at the specified location.
    #[error("no declaration found at {location}")]
    DeclarationNotFound { location: String },

    /// A query needs data from a module that is not ready.
    #[error("module {module} is unavailable ({state})")]
    ModuleUnavailable { module: String, state: String },

    /// A refactoring precondition failed.
    #[error(transparent)]
    Refactoring(#[from] RefactoringError),

    /// Failed to apply computed edits.
    #[error("apply error: {0}")]
    Apply(#[from] ApplyError),

    /// Failed to enumerate or read sources.
    #[error("source error: {0}")]
    Source(#[from] SourceError),

    /// Cooperative cancellation observed.
    #[error("operation cancelled")]
    Cancelled,

    /// Internal error (bug or unexpected state).
    #[error("internal error: {message}")]
    Internal { message: String },
}

impl VbatError {
    /// Create an invalid-arguments error.
    pub fn invalid_args(message: impl Into<String>) -> Self {
        VbatError::InvalidArguments {
            message: message.into(),
        }
    }

    /// Get the output code for this error.
    pub fn error_code(&self) -> OutputErrorCode {
        OutputErrorCode::from(self)
    }
}

impl From<&VbatError> for OutputErrorCode {
    fn from(err: &VbatError) -> Self {
        match err {
            VbatError::InvalidArguments { .. } => OutputErrorCode::InvalidArguments,
            VbatError::DeclarationNotFound { .. } => OutputErrorCode::ResolutionError,
            VbatError::ModuleUnavailable { .. } => OutputErrorCode::ResolutionError,
            VbatError::Refactoring(error) => match error {
                RefactoringError::InvalidIdentifier { .. } => OutputErrorCode::InvalidArguments,
                RefactoringError::UnknownDeclaration => OutputErrorCode::ResolutionError,
                _ => OutputErrorCode::ApplyError,
            },
            VbatError::Apply(_) => OutputErrorCode::ApplyError,
            VbatError::Source(_) => OutputErrorCode::ResolutionError,
            VbatError::Cancelled => OutputErrorCode::Cancelled,
            VbatError::Internal { .. } => OutputErrorCode::InternalError,
        }
    }
}

impl From<VbatError> for OutputErrorCode {
    fn from(err: VbatError) -> Self {
        OutputErrorCode::from(&err)
    }
}

impl From<EngineError> for VbatError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Source(source) => VbatError::Source(source),
            EngineError::Cancelled => VbatError::Cancelled,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
