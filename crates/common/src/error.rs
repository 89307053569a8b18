use thiserror::Error;

/// Errors constructing or parsing the primitive types in this crate.
///
/// Mirrors the `encode` error category from the execution core's error
/// taxonomy (`invalid_character`, `invalid_length`), plus the narrow
/// account-tag validation error this crate alone owns.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommonError {
    #[error("invalid character in encoded input")]
    InvalidCharacter,
    #[error("invalid length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
    #[error("invalid account tag byte: {0}")]
    InvalidAccountTag(u8),
}
