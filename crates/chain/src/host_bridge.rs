//! Host-call bridge (§4.9): the concrete [`HostApi`] implementation that
//! wires a running WASM program to its transaction's state node, call
//! stack, and resource session.
//!
//! One [`ExecutionContext`] exists per VM invocation - the top-level
//! operation, every nested `call_program`, and every `authorize` check - but
//! all of them share the same [`Shared`] state through an `Arc<Mutex<_>>`,
//! so a nested frame sees the same call stack, state node, and resource
//! meter its caller does. `basalt_vm` requires `H: HostApi + Send +
//! 'static`, so the sharing has to cross a (nominal) thread boundary even
//! though nothing here ever runs concurrently (§5: single-threaded, no
//! suspension points inside host calls) - the lock is only ever held for a
//! short synchronous section and is always released before recursing into
//! [`VirtualMachine::run_entry`], so it is never contended in practice.

use std::sync::Arc;

use basalt_common::constants::SPACE_PROGRAM_DATA;
use basalt_common::{Account, Digest, ObjectSpace};
use basalt_state_db::TemporaryStateNode;
use basalt_vm::{HostApi, ProgramOutput, VirtualMachine, VmError};
use parking_lot::Mutex;

use crate::call_stack::{CallFrame, CallStack};
use crate::protocol::ProgramFrame;
use crate::resource::Session;

/// The `program_data` object space, keyed by a program account's raw
/// address. Shared with `controller.rs` so an `upload_program` write (issued
/// directly through [`HostApi::put_object`], never through the VM) and a
/// `call_program`'s own bytecode lookup agree on where bytecode lives.
pub(crate) fn program_data_space() -> ObjectSpace {
    ObjectSpace::system(SPACE_PROGRAM_DATA)
}

/// Exit code stamped on a frame whose target account has no uploaded
/// program. Treated as "not satisfied"/"call failed" rather than a trap -
/// §4.11 only special-cases a *defined* `authorize` export; a missing
/// program is simply never authoritative, and a `call_program` to one is a
/// caller mistake the callee program observes via its exit code, not a
/// transaction-ending fault. Applies at every nesting level, including the
/// outermost operation: calling an account with nothing uploaded is not
/// itself an error, only a frame with this exit code.
const NO_SUCH_PROGRAM: i32 = -1;
/// Exit code stamped on a *nested* run (one triggered by the `call_program`
/// or `authorize` host calls, not the outermost operation) that trapped for
/// a reason other than metered exhaustion or stack overflow. A calling
/// program observes this the way a process observes a child's exit status -
/// it never unwinds the caller. The outermost operation has no caller to
/// observe an exit code, so [`ExecutionContext::invoke`] propagates these
/// the same failures as a proper `Err` instead (see [`Propagation`]).
const NESTED_TRAP: i32 = -2;

/// Whether a run's unusual-but-not-resource/stack failures should propagate
/// as an `Err` or be swallowed into the popped frame's exit code.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Propagation {
    /// The outermost operation a transaction applies directly. There is no
    /// caller program to observe an exit code, so every `VmError` surfaces -
    /// the controller turns it into a reversion (§7's propagation policy).
    Propagate,
    /// A `call_program`/`authorize` triggered from already-running WASM.
    /// Only `ResourceLimitExceeded`/`StackOverflow` propagate; everything
    /// else becomes the popped frame's exit code.
    SwallowIntoExitCode,
}

struct Shared {
    state: TemporaryStateNode,
    call_stack: CallStack,
    session: Session,
    read_only: bool,
    write_attempted: bool,
}

/// Bridges one transaction's execution to the VM. Cheap to `Clone`: every
/// clone shares the same underlying state, call stack, and session, only
/// `args` (this context's own frame's command-line arguments) is per-clone.
#[derive(Clone)]
pub struct ExecutionContext {
    shared: Arc<Mutex<Shared>>,
    vm: Arc<VirtualMachine>,
    authorized_signers: Arc<Vec<Account>>,
    args: Vec<String>,
}

impl ExecutionContext {
    /// Builds a fresh context for one transaction's (or `read_program`'s)
    /// execution. `authorized_signers` is the verified set of user accounts
    /// whose signatures have already been checked to cover `t.id` - this
    /// bridge never re-verifies signatures, it only consults the set
    /// §4.11's `check_authority` needs.
    pub fn new(
        state: TemporaryStateNode,
        vm: Arc<VirtualMachine>,
        session: Session,
        authorized_signers: Vec<Account>,
        stack_limit: usize,
        read_only: bool,
    ) -> Self {
        ExecutionContext {
            shared: Arc::new(Mutex::new(Shared {
                state,
                call_stack: CallStack::new(stack_limit),
                session,
                read_only,
                write_attempted: false,
            })),
            vm,
            authorized_signers: Arc::new(authorized_signers),
            args: Vec::new(),
        }
    }

    /// Runs one transaction's `call_program` operation against `program`,
    /// pushing and popping the outermost call frame. Unlike a nested
    /// `call_program` host call, every `VmError` the run produces propagates
    /// as `Err` - there is no calling program here to observe an exit code
    /// instead, so the controller must see the failure and turn it into a
    /// reversion (or, for a program uploaded earlier in the same
    /// transaction, a `malformed_transaction`).
    pub fn invoke(
        &self,
        program: Account,
        arguments: Vec<String>,
        stdin: Vec<u8>,
    ) -> Result<ProgramFrame, VmError> {
        self.run_nested(program, stdin, arguments, "_start", Propagation::Propagate)
    }

    /// True if a write was attempted while this context was constructed
    /// read-only (`read_program`'s contract: §9's resolved open question).
    pub fn write_attempted(&self) -> bool {
        self.shared.lock().write_attempted
    }

    /// Consumes the context and hands back its [`Session`] for receipt
    /// assembly. Only valid once every nested clone created during
    /// execution (inside `call_program`/`check_authority`) has already been
    /// dropped - true once the top-level `vm.run`/`invoke` call this context
    /// drove has returned.
    pub fn into_session(self) -> Session {
        match Arc::try_unwrap(self.shared) {
            Ok(mutex) => mutex.into_inner().session,
            Err(_) => {
                unreachable!("ExecutionContext::into_session called while a clone is still live")
            }
        }
    }

    fn remaining_compute_budget(&self) -> u64 {
        let shared = self.shared.lock();
        let limits = shared.session.meter.limits();
        let used = shared.session.meter.used();
        limits.compute_bandwidth.saturating_sub(used.compute_bandwidth)
    }

    /// Pushes a frame for `program`, runs `entry_point` (looked up from
    /// `program_data`), and pops it - shared by `call_program` and the
    /// `authorize` consultation in [`check_authority`][HostApi::check_authority].
    fn run_nested(
        &self,
        program: Account,
        stdin: Vec<u8>,
        arguments: Vec<String>,
        entry_point: &str,
        propagation: Propagation,
    ) -> Result<ProgramFrame, VmError> {
        let depth;
        let bytecode;
        {
            let mut shared = self.shared.lock();
            depth = shared.call_stack.depth() as u32;
            shared
                .call_stack
                .push(CallFrame::new(program, arguments.clone(), stdin.clone()))
                .map_err(|_| VmError::StackOverflow)?;
            bytecode = shared.state.get(&program_data_space(), &program.address);
        }

        let nested = ExecutionContext {
            shared: self.shared.clone(),
            vm: self.vm.clone(),
            authorized_signers: self.authorized_signers.clone(),
            args: arguments,
        };

        let budget = self.remaining_compute_budget();
        let run_result = bytecode.map(|code| {
            let cache_id = Digest::from_bytes(program.address);
            self.vm.run_entry(nested, &code, cache_id, budget, entry_point)
        });

        let mut shared = self.shared.lock();
        let hard_trap = match &run_result {
            None => {
                shared.call_stack.current_mut().set_exit_code(NO_SUCH_PROGRAM);
                None
            }
            Some(Ok(outcome)) => {
                shared.call_stack.current_mut().set_exit_code(outcome.exit_code);
                shared
                    .session
                    .charge_compute_bandwidth(outcome.fuel_consumed)
                    .err()
                    .map(|_| VmError::ResourceLimitExceeded)
            }
            Some(Err(VmError::ResourceLimitExceeded)) => {
                // The run traps as soon as fuel hits zero, so the whole
                // budget it was handed is what got consumed (§8 Scenario D:
                // the payer is charged exactly the ticks consumed, not just
                // the ticks charged by individual host calls before the
                // trap).
                let _ = shared.session.charge_compute_bandwidth(budget);
                Some(VmError::ResourceLimitExceeded)
            }
            Some(Err(VmError::StackOverflow)) => Some(VmError::StackOverflow),
            Some(Err(e)) => match propagation {
                // The outermost operation has no caller to observe an exit
                // code - every other trap reason surfaces as `Err` too, not
                // just the two that always hard-trap above.
                Propagation::Propagate => Some(e.clone()),
                Propagation::SwallowIntoExitCode => {
                    shared.call_stack.current_mut().set_exit_code(NESTED_TRAP);
                    None
                }
            },
        };

        let frame = shared.call_stack.pop();
        if let Some(reason) = hard_trap {
            return Err(reason);
        }
        Ok(shared.session.recorder.record_frame(frame, depth))
    }
}

impl HostApi for ExecutionContext {
    fn args(&self) -> &[String] {
        &self.args
    }

    fn write_stdout(&mut self, bytes: &[u8]) {
        self.shared.lock().call_stack.current_mut().write_stdout(bytes);
    }

    fn write_stderr(&mut self, bytes: &[u8]) {
        self.shared.lock().call_stack.current_mut().write_stderr(bytes);
    }

    fn read_stdin(&mut self, buf: &mut [u8]) -> usize {
        self.shared.lock().call_stack.current_mut().read_stdin(buf)
    }

    fn proc_exit(&mut self, code: i32) {
        self.shared.lock().call_stack.current_mut().set_exit_code(code);
    }

    fn get_caller(&self) -> Account {
        self.shared.lock().call_stack.caller()
    }

    fn get_object(&mut self, space: ObjectSpace, key: &[u8]) -> Result<Option<Vec<u8>>, VmError> {
        Ok(self.shared.lock().state.get(&space, key))
    }

    fn put_object(&mut self, space: ObjectSpace, key: &[u8], value: Vec<u8>) -> Result<(), VmError> {
        let mut shared = self.shared.lock();
        if shared.read_only {
            shared.write_attempted = true;
            return Err(VmError::InvalidContext);
        }
        let delta = shared
            .state
            .put(&space, key, value)
            .map_err(|_| VmError::ExecutionEnvironmentFailure)?;
        shared
            .session
            .charge_disk_storage(delta)
            .map_err(|_| VmError::ResourceLimitExceeded)
    }

    fn remove_object(&mut self, space: ObjectSpace, key: &[u8]) -> Result<(), VmError> {
        let mut shared = self.shared.lock();
        if shared.read_only {
            shared.write_attempted = true;
            return Err(VmError::InvalidContext);
        }
        let delta = shared
            .state
            .remove(&space, key)
            .map_err(|_| VmError::ExecutionEnvironmentFailure)?;
        // Removals never grow the live key-space, so `charge_disk_storage`
        // (which only meters positive deltas) cannot fail here; the call
        // still goes through it so freed bytes are consistently accounted.
        let _ = shared.session.charge_disk_storage(delta);
        Ok(())
    }

    fn check_authority(&mut self, account: Account) -> Result<bool, VmError> {
        if account.is_user() {
            return Ok(self.authorized_signers.contains(&account));
        }
        if self.shared.lock().call_stack.caller_chain_includes(account) {
            return Ok(true);
        }
        match self.run_nested(
            account,
            Vec::new(),
            Vec::new(),
            "authorize",
            Propagation::SwallowIntoExitCode,
        ) {
            Ok(frame) => Ok(frame.code == 0),
            Err(e) => Err(e),
        }
    }

    fn log(&mut self, bytes: &[u8]) {
        self.shared.lock().session.recorder.log(bytes);
    }

    fn event(&mut self, name: String, data: Vec<u8>, impacted: Vec<Account>) {
        self.shared.lock().session.recorder.push_event(name, data, impacted);
    }

    fn call_program(
        &mut self,
        account: Account,
        stdin: Vec<u8>,
        arguments: Vec<String>,
    ) -> Result<ProgramOutput, VmError> {
        let frame = self.run_nested(
            account,
            stdin,
            arguments,
            "_start",
            Propagation::SwallowIntoExitCode,
        )?;
        Ok(ProgramOutput {
            code: frame.code,
            stdout: frame.stdout,
            stderr: frame.stderr,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use basalt_common::Digest as CommonDigest;
    use basalt_state_db::Database;

    fn temp_node() -> TemporaryStateNode {
        let db = Database::new();
        db.open(CommonDigest::ZERO).unwrap();
        let root_node = db.root_node().unwrap();
        root_node.make_temporary_child(CommonDigest::from_bytes([1u8; 32]))
    }

    fn ctx(read_only: bool) -> ExecutionContext {
        ExecutionContext::new(
            temp_node(),
            Arc::new(VirtualMachine::new(4)),
            Session::new(crate::config::ResourceLimits::default(), 1_000_000, 0),
            vec![Account::user([9u8; 32])],
            32,
            read_only,
        )
    }

    #[test]
    fn calling_an_unknown_program_reports_via_exit_code_not_a_trap() {
        let c = ctx(false);
        let frame = c
            .invoke(Account::program([2u8; 32]), vec![], vec![])
            .unwrap();
        assert_eq!(frame.code, NO_SUCH_PROGRAM);
    }

    #[test]
    fn write_in_read_only_context_is_recorded_and_soft_fails() {
        let mut c = ctx(true);
        let space = ObjectSpace::program([3u8; 32], 0);
        let err = c.put_object(space, b"k", b"v".to_vec()).unwrap_err();
        assert!(matches!(err, VmError::InvalidContext));
        assert!(c.write_attempted());
    }

    #[test]
    fn check_authority_recognizes_verified_signer() {
        let mut c = ctx(false);
        assert!(c.check_authority(Account::user([9u8; 32])).unwrap());
        assert!(!c.check_authority(Account::user([1u8; 32])).unwrap());
    }

    #[test]
    fn check_authority_recognizes_transitive_self_invocation() {
        let c = ctx(false);
        let inner_program = Account::program([4u8; 32]);
        {
            let mut shared = c.shared.lock();
            shared
                .call_stack
                .push(CallFrame::new(inner_program, vec![], vec![]))
                .unwrap();
        }
        let mut c = c;
        assert!(c.check_authority(inner_program).unwrap());
    }
}
