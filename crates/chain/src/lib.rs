//! # Basalt Chain
//!
//! The execution controller (§4.10): block and transaction validation,
//! resource metering, call-stack discipline, and deterministic receipt
//! assembly, wired over `basalt-state-db`'s forked state graph and
//! `basalt-vm`'s sandboxed program runtime.
//!
//! [`controller::Controller`] is the component a node embeds directly: give
//! it a [`basalt_state_db::Database`], a [`basalt_vm::VirtualMachine`], and a
//! [`config::ControllerConfig`], and it exposes `apply_block` /
//! `read_program` as the only two ways state ever changes or is queried
//! against a program's logic. Everything else in this crate - wire types,
//! the resource session, the chronicler, the call stack, the host-API bridge
//! - exists to make those two entry points correct and deterministic.
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

pub mod call_stack;
pub mod chronicler;
pub mod config;
pub mod controller;
pub mod error;
pub mod host_bridge;
pub mod protocol;
pub mod resource;

pub use call_stack::{CallFrame, CallStack};
pub use chronicler::Chronicler;
pub use config::{ComputeWeights, ControllerConfig, ResourceLimits};
pub use controller::Controller;
pub use error::{ControllerError, ReversionError};
pub use host_bridge::ExecutionContext;
pub use protocol::{
    Authorization, Block, BlockReceipt, Event, Operation, ProgramFrame, ProgramInput,
    Transaction, TransactionReceipt, compute_block_id, compute_transaction_id, verify_block_id,
    verify_transaction_id,
};
pub use resource::{ResourceCategory, ResourceLimitExceeded, ResourceMeter, ResourceState, Session};
