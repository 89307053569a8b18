//! # Basalt Crypto
//!
//! Pure-function wrappers around the two cryptographic primitives the
//! execution core treats as external collaborators: a 32-byte hash (BLAKE3)
//! and Ed25519 signatures over digest bytes.
//!
//! Nothing in this crate maintains mutable global state; [`Hasher`] is a
//! plain value type so structural hashing (see `basalt-codec`) can thread it
//! through nested `encode`/`hash_update` calls without a module singleton.

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

pub mod error;
pub mod hash;
pub mod signature;

pub use error::CryptoError;
pub use hash::{Hasher, hash};
pub use signature::{PublicKey, SecretKey, Signature, sign, verify};
