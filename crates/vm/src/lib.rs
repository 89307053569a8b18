//! # Basalt VM
//!
//! A sandboxed WebAssembly program runtime: an LRU [`module_cache::ModuleCache`]
//! of parsed modules, a fixed [`host_api::HostApi`] surface modeled on WASI
//! but intercepted end-to-end (no real file descriptors, no
//! `wasi-common`/`wasmtime-wasi`), and [`vm::VirtualMachine`] tying the two
//! together over `wasmtime`.
//!
//! This crate knows nothing about state databases, controllers, or
//! receipts - `basalt-chain` implements [`host_api::HostApi`] against its own
//! state node and chronicler and drives [`vm::VirtualMachine::run`].
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

pub mod error;
pub mod host_api;
pub mod module_cache;
pub mod vm;

pub use error::VmError;
pub use host_api::{errno, HostApi, ProgramOutput};
pub use module_cache::ModuleCache;
pub use vm::{RunOutcome, VirtualMachine, WEIGHT_HEAVY, WEIGHT_LIGHT, WEIGHT_MEDIUM};
