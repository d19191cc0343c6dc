//! Graphics error types.
//!
//! Every recoverable failure of the memory and view layer is reported through
//! [`GraphicsError`] at the point of detection. Broken allocator bookkeeping
//! (double frees, unknown handles) is a programming error and panics instead.

use thiserror::Error;

/// Errors that can occur in the graphics memory system.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphicsError {
    /// A caller-supplied shape or count violates a documented precondition.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// A heap could not satisfy the request.
    #[error("allocation failed: {0}")]
    AllocationFailure(String),
    /// A view description does not fit the resource it describes.
    #[error("incompatible view: {0}")]
    IncompatibleView(String),
    /// An update or copy region exceeds the resource bounds.
    #[error("out of bounds: {0}")]
    OutOfBounds(String),
    /// No GPU format can hold the requested pixel layout.
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),
    /// The graphics API rejected a call.
    #[error("graphics API error: {0}")]
    Backend(String),
}

/// Result alias used throughout the crate.
pub type GraphicsResult<T> = Result<T, GraphicsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = GraphicsError::InvalidArgument("array size must be at least one".to_string());
        assert_eq!(
            err.to_string(),
            "invalid argument: array size must be at least one"
        );
    }
}
