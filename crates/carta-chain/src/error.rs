//! Error types for version chaining.

/// Result type for chain operations.
pub type ChainResult<T> = Result<T, ChainError>;

/// Errors that can occur while building or verifying version chains.
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum ChainError {
    /// A hash tree cannot be built over zero leaves.
    #[error("cannot build a hash tree from empty input")]
    EmptyInput,
}
