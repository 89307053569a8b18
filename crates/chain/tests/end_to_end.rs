//! End-to-end coverage for the §8 scenarios that need a real running
//! program to exercise: compute exhaustion (Scenario D) and call-stack
//! overflow (Scenario E). Everything else in §8 is covered at the unit
//! level inside the crate (see `DESIGN.md`); these two need actual WASM
//! bytecode executing through the full `Controller::apply_block` pipeline
//! to be trustworthy.
#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;

use basalt_chain::{
    Authorization, Block, Controller, ControllerConfig, Operation, ProgramInput, ResourceLimits,
    Transaction, compute_block_id, compute_transaction_id,
};
use basalt_common::{Account, AccountTag, Digest};
use basalt_crypto::{SecretKey, sign};
use basalt_state_db::Database;
use basalt_vm::VirtualMachine;

struct Fixture {
    controller: Controller,
    payer_key: SecretKey,
    network_id: Digest,
}

fn fixture(limits: ResourceLimits) -> Fixture {
    let database = Database::new();
    database.open(Digest::ZERO).unwrap();
    let vm = Arc::new(VirtualMachine::new(4));
    let network_id = Digest::from_bytes([11u8; 32]);
    let controller = Controller::new(database, vm, ControllerConfig::default(), network_id, limits);
    Fixture {
        controller,
        payer_key: SecretKey::from_bytes([0x7au8; 32]),
        network_id,
    }
}

fn payer_account(fx: &Fixture) -> Account {
    Account {
        tag: AccountTag::User,
        address: *fx.payer_key.public_key().as_bytes(),
    }
}

fn signed_tx(fx: &Fixture, nonce: u64, resource_limit: u64, operations: Vec<Operation>) -> Transaction {
    let payer = payer_account(fx);
    let mut tx = Transaction {
        id: Digest::ZERO,
        network_id: fx.network_id,
        resource_limit,
        payer,
        payee: payer,
        nonce,
        operations,
        authorizations: vec![Authorization {
            signer: payer,
            signature: basalt_crypto::Signature::from_bytes([0u8; 64]),
        }],
    };
    tx.id = compute_transaction_id(&tx);
    tx.authorizations[0].signature = sign(&fx.payer_key, &tx.id);
    tx
}

fn signed_block(fx: &Fixture, height: u64, timestamp: u64, previous: Digest, txs: Vec<Transaction>) -> Block {
    let mut block = Block {
        id: Digest::ZERO,
        previous,
        height,
        timestamp,
        state_merkle_root: Digest::ZERO,
        transactions: txs,
        signer: Account {
            tag: AccountTag::User,
            address: *fx.payer_key.public_key().as_bytes(),
        },
        signature: basalt_crypto::Signature::from_bytes([0u8; 64]),
    };
    block.state_merkle_root = fx.controller.preview_state_root(&block).unwrap();
    block.id = compute_block_id(&block);
    block.signature = sign(&fx.payer_key, &block.id);
    block
}

/// An `_start` that never returns: a handful of instructions at a time,
/// metered per-instruction by wasmtime's fuel consumption, so it trips
/// `compute_bandwidth` without needing any host import at all.
fn infinite_loop_wasm() -> Vec<u8> {
    wat::parse_str(
        r#"
        (module
          (func (export "_start")
            (loop $l
              br $l)))
        "#,
    )
    .unwrap()
}

/// Encodes a WAT byte-string escape (`\HH` per byte) for embedding raw
/// account bytes in a `(data ...)` segment.
fn wat_bytes(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("\\{b:02x}")).collect()
}

/// An `_start` that calls `basalt::call_program` against its own account,
/// unconditionally and without a base case - every invocation makes the
/// call stack exactly one frame deeper than its caller. Data laid out in
/// the single exported memory page: a self-account buffer at offset 0,
/// plus three 4-byte output slots after it. `stdin`/`args` are passed as
/// zero-length (pointer value is irrelevant when the length is zero), and
/// the stdout/stderr capacity is zero since this program never writes to
/// either.
fn self_recursive_wasm(program: Account) -> Vec<u8> {
    let mut account_bytes = vec![program.tag as u8];
    account_bytes.extend_from_slice(&program.address);
    let data = wat_bytes(&account_bytes);
    let src = format!(
        r#"
        (module
          (import "basalt" "call_program"
            (func $call_program
              (param i32 i32 i32 i32 i32 i32 i32 i32 i32 i32 i32 i32) (result i32)))
          (memory (export "memory") 1)
          (data (i32.const 0) "{data}")
          (func (export "_start")
            (drop (call $call_program
              (i32.const 0)   ;; account_ptr
              (i32.const 0)   ;; stdin_ptr
              (i32.const 0)   ;; stdin_len
              (i32.const 0)   ;; args_ptr
              (i32.const 0)   ;; args_len
              (i32.const 64)  ;; out_code_ptr
              (i32.const 128) ;; out_stdout_ptr
              (i32.const 0)   ;; out_stdout_cap
              (i32.const 68)  ;; out_stdout_len_ptr
              (i32.const 128) ;; out_stderr_ptr
              (i32.const 0)   ;; out_stderr_cap
              (i32.const 72)  ;; out_stderr_len_ptr
            ))))
        "#
    );
    wat::parse_str(&src).unwrap()
}

#[test]
fn compute_exhaustion_reverts_the_transaction_and_charges_the_full_budget() {
    let limits = ResourceLimits::new(64 * 1024 * 1024, 16 * 1024 * 1024, 1_000_000);
    let fx = fixture(limits);

    let program = Account::program([3u8; 32]);
    let upload_tx = signed_tx(
        &fx,
        1,
        1_000_000,
        vec![Operation::UploadProgram {
            id: program,
            bytecode: infinite_loop_wasm(),
        }],
    );
    let upload_block = signed_block(&fx, 1, 1, Digest::ZERO, vec![upload_tx]);
    let upload_receipt = fx.controller.apply_block(&upload_block, 1000).unwrap();
    assert!(!upload_receipt.transaction_receipts[0].reverted);

    let call_tx = signed_tx(
        &fx,
        2,
        2_000_000,
        vec![Operation::CallProgram {
            id: program,
            input: ProgramInput::default(),
        }],
    );
    let call_block = signed_block(&fx, 2, 2, upload_block.id, vec![call_tx]);
    let call_receipt = fx.controller.apply_block(&call_block, 1000).unwrap();

    let tx_receipt = &call_receipt.transaction_receipts[0];
    assert!(tx_receipt.reverted);
    assert_eq!(tx_receipt.resources_used, limits.compute_bandwidth);

    // The program never wrote anything of its own; only the upload's bytes
    // are on disk afterward.
    assert_eq!(fx.controller.database().head().unwrap().id(), call_block.id);
}

#[test]
fn self_recursive_call_program_overflows_the_stack_and_reverts() {
    let limits = ResourceLimits::default();
    let fx = fixture(limits);
    assert_eq!(fx.controller.config().stack_limit, 32);

    let program = Account::program([4u8; 32]);
    let upload_tx = signed_tx(
        &fx,
        1,
        1_000_000,
        vec![Operation::UploadProgram {
            id: program,
            bytecode: self_recursive_wasm(program),
        }],
    );
    let upload_block = signed_block(&fx, 1, 1, Digest::ZERO, vec![upload_tx]);
    let upload_receipt = fx.controller.apply_block(&upload_block, 1000).unwrap();
    assert!(!upload_receipt.transaction_receipts[0].reverted);

    let call_tx = signed_tx(
        &fx,
        2,
        1_000_000,
        vec![Operation::CallProgram {
            id: program,
            input: ProgramInput::default(),
        }],
    );
    let call_block = signed_block(&fx, 2, 2, upload_block.id, vec![call_tx]);
    let call_receipt = fx.controller.apply_block(&call_block, 1000).unwrap();

    let tx_receipt = &call_receipt.transaction_receipts[0];
    assert!(tx_receipt.reverted);
    // A transaction that reverts on the outermost call never gets to
    // record that call's own frame (see `run_nested`'s hard-trap path),
    // so nothing made it into the receipt.
    assert!(tx_receipt.frames.is_empty());
    assert_eq!(fx.controller.database().head().unwrap().id(), call_block.id);
}
