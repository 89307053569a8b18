//! Human-readable id helpers. These wrap the `hex` and `bs58` crates rather
//! than hand-rolling the alphabets, per the specification's "out of scope"
//! note that base58/hex utilities are external collaborators.

use crate::error::CodecError;

pub fn to_hex(bytes: &[u8]) -> String {
    hex::encode(bytes)
}

pub fn from_hex(s: &str) -> Result<Vec<u8>, CodecError> {
    hex::decode(s).map_err(|_| CodecError::InvalidCharacter)
}

pub fn to_base58(bytes: &[u8]) -> String {
    bs58::encode(bytes).into_string()
}

pub fn from_base58(s: &str) -> Result<Vec<u8>, CodecError> {
    bs58::decode(s).into_vec().map_err(|_| CodecError::InvalidCharacter)
}
