//! Shared error types for the core infrastructure.

use thiserror::Error;

use crate::patch::Span;

/// Errors raised when validating or applying an [`crate::patch::EditSet`].
#[derive(Debug, Error)]
pub enum PatchError {
    /// An edit targets a module that is not part of the supplied sources.
    #[error("edit targets unknown module: {module}")]
    UnknownModule { module: String },

    /// An edit's span extends past the end of the module's source.
    #[error("edit span {span} out of bounds in {module}")]
    SpanOutOfBounds { module: String, span: Span },

    /// Two edits in one module overlap; the set cannot apply atomically.
    #[error("overlapping edits in {module}")]
    OverlappingEdits { module: String },
}
