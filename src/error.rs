//! Error type shared by all fallible index operations.

use thiserror::Error;

/// Errors surfaced by [`ForestIndex`](crate::ForestIndex) operations.
///
/// Mutating operations on a memory-mapped index refuse with
/// [`ForestError::IndexLoaded`] and leave the index untouched.
#[derive(Debug, Error)]
pub enum ForestError {
    /// I/O failure during save or load.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A mutating operation was attempted on a loaded (memory-mapped) index.
    #[error("operation not permitted on a loaded index")]
    IndexLoaded,

    /// An input vector's length does not match the index dimension.
    #[error("vector has dimension {got} but index expects {expected}")]
    DimensionMismatch { expected: usize, got: usize },

    /// An index file's size is not a whole number of node records.
    #[error("file size {size} is not a multiple of the {node_size}-byte node record")]
    MalformedFile { size: u64, node_size: usize },
}
