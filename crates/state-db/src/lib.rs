//! # Basalt State DB
//!
//! A forked, copy-on-write state database. Every block gets its own
//! [`StateDelta`] layered over its parent's; branches are cheap (an empty
//! overlay plus an `Arc` to the parent), reads resolve by walking the chain
//! and stopping at the first hit or tombstone, and a node only pays to
//! materialize its full contents when it is committed as the new root.
//!
//! [`Database`] is the index: it tracks every registered ("permanent") node
//! by id, knows the current head and fork-choice policy, and is the only
//! thing that can `commit` (flatten + prune) or `remove` (abandon) a
//! subtree. [`state_node::TemporaryStateNode`] sits one layer below that and
//! is never registered with the index at all - it is how a block's
//! transactions, and a transaction's nested program calls, get their own
//! speculative working set to squash or discard.
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

pub mod backend;
pub mod database;
pub mod delta;
pub mod error;
pub mod fork_choice;
pub mod state_node;

pub use backend::{Backend, InMemoryBackend};
pub use database::Database;
pub use delta::StateDelta;
pub use error::StateDbError;
pub use fork_choice::{FifoForkChoice, ForkChoice};
pub use state_node::{PermanentStateNode, TemporaryStateNode};
