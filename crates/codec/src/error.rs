use thiserror::Error;

/// The `encode` error category from the specification's error taxonomy
/// (§7): `invalid_character`, `invalid_length`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("invalid character in encoded input")]
    InvalidCharacter,
    #[error("invalid length: expected at least {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
    #[error("unknown tag byte: {0}")]
    UnknownTag(u8),
}

impl From<basalt_common::CommonError> for CodecError {
    fn from(value: basalt_common::CommonError) -> Self {
        match value {
            basalt_common::CommonError::InvalidCharacter => CodecError::InvalidCharacter,
            basalt_common::CommonError::InvalidLength { expected, actual } => {
                CodecError::InvalidLength { expected, actual }
            }
            basalt_common::CommonError::InvalidAccountTag(tag) => CodecError::UnknownTag(tag),
        }
    }
}
