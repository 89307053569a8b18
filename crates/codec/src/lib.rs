//! # Basalt Codec
//!
//! Canonical binary encoding for Basalt's wire types (§6 of the
//! specification) and the small hex/base58 helpers the rest of the
//! workspace uses for human-readable ids.
//!
//! Mirrors `ethrex-rlp`'s shape — `Encode`/`Decode` traits implemented per
//! type in canonical field order — with a fixed-layout wire format instead
//! of RLP, since every Basalt wire type has a statically known field order
//! rather than an open/recursive structure.

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

pub mod encode;
pub mod error;
pub mod hash_update;
pub mod text;

pub use encode::{Decode, Encode};
pub use error::CodecError;
pub use hash_update::HashUpdate;
