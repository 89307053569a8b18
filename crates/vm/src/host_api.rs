use basalt_common::{Account, ObjectSpace};

use crate::error::VmError;

/// The observable result of one `call_program` invocation, as seen by the
/// caller's host API - no depth/id bookkeeping here, that is the chain
/// crate's concern when it turns this into a receipt frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramOutput {
    pub code: i32,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

/// The fixed host-call surface a running program can reach (§4.9).
///
/// A running module never touches real file descriptors, the network, or
/// the host filesystem: every WASI stub and every chain-specific call is
/// routed through this trait into whatever the embedder (`basalt-chain`'s
/// controller) wants it to mean. [`crate::vm::VirtualMachine::run`] is
/// generic over `H: HostApi` and binds each of these methods as a
/// `wasmtime::Linker` import; nothing here depends on `wasmtime` itself so
/// the contract can be tested without spinning up a real module.
pub trait HostApi {
    /// The current frame's command-line-style arguments.
    fn args(&self) -> &[String];

    /// Appends to the current frame's captured stdout.
    fn write_stdout(&mut self, bytes: &[u8]);

    /// Appends to the current frame's captured stderr.
    fn write_stderr(&mut self, bytes: &[u8]);

    /// Reads up to `buf.len()` bytes from the current frame's stdin at its
    /// cursor, returning the number of bytes read (0 at end of input).
    fn read_stdin(&mut self, buf: &mut [u8]) -> usize;

    /// Records the frame's exit code ahead of a `proc_exit` trap.
    fn proc_exit(&mut self, code: i32);

    /// The caller's account, or [`Account::EMPTY`] for the outermost frame.
    fn get_caller(&self) -> Account;

    fn get_object(&mut self, space: ObjectSpace, key: &[u8]) -> Result<Option<Vec<u8>>, VmError>;

    fn put_object(&mut self, space: ObjectSpace, key: &[u8], value: Vec<u8>) -> Result<(), VmError>;

    fn remove_object(&mut self, space: ObjectSpace, key: &[u8]) -> Result<(), VmError>;

    /// See spec §4.11: true if the current authorization set satisfies
    /// `account`.
    fn check_authority(&mut self, account: Account) -> Result<bool, VmError>;

    fn log(&mut self, bytes: &[u8]);

    fn event(&mut self, name: String, data: Vec<u8>, impacted: Vec<Account>);

    /// Pushes a frame, recursively runs `account`'s program, pops the
    /// frame, and returns its output.
    fn call_program(
        &mut self,
        account: Account,
        stdin: Vec<u8>,
        arguments: Vec<String>,
    ) -> Result<ProgramOutput, VmError>;
}

/// WASI snapshot-preview1 errno values this surface actually returns.
/// Not the full WASI errno table - only the subset the stubs in
/// [`crate::vm`] need.
pub mod errno {
    pub const SUCCESS: i32 = 0;
    pub const BADF: i32 = 8;
    pub const INVAL: i32 = 28;
    pub const IO: i32 = 29;
    pub const NOSYS: i32 = 52;
}
