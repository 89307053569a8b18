//! System object-space ids and other cross-crate constants.
//!
//! Kept centralized so the state-db, chain and vm crates agree on where
//! system bookkeeping lives without depending on each other for it.

/// System space holding `payer -> last accepted nonce`.
pub const SPACE_TRANSACTION_NONCE: u32 = 0;
/// System space holding per-payer remaining resource credit.
pub const SPACE_ACCOUNT_RESOURCES: u32 = 1;
/// System space holding uploaded program bytecode, keyed by program id.
pub const SPACE_PROGRAM_DATA: u32 = 2;
/// System space holding the genesis-configured resource limits.
pub const SPACE_RESOURCE_LIMITS: u32 = 3;
/// System space holding chain-level bookkeeping not scoped to any one
/// account - currently just the last applied block's timestamp, read back
/// on the next block to enforce its minimum timestamp bound (§4.10).
pub const SPACE_CHAIN_META: u32 = 4;
/// Key under [`SPACE_CHAIN_META`] for the last applied block's timestamp.
pub const KEY_LAST_BLOCK_TIMESTAMP: &[u8] = b"last_block_timestamp";

/// Default call-stack depth bound (§4.7 / §8 Scenario E).
pub const DEFAULT_STACK_LIMIT: usize = 32;
/// Default module-cache capacity (§4.8).
pub const DEFAULT_MODULE_CACHE_CAPACITY: usize = 32;
