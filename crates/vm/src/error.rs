use thiserror::Error;

/// The `virtual_machine` error category from the specification's error
/// taxonomy (§7).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VmError {
    /// Execution trapped; carries the WASI-style exit code, if any, that
    /// was in flight when the trap occurred.
    #[error("program trapped (exit code {0:?})")]
    Trapped(Option<i32>),

    #[error("invalid arguments passed to a host call")]
    InvalidArguments,

    #[error("execution environment failure")]
    ExecutionEnvironmentFailure,

    #[error("entry point lookup failed")]
    FunctionLookupFailure,

    #[error("module failed to load")]
    LoadFailure,

    #[error("module failed to instantiate")]
    InstantiateFailure,

    #[error("host call received a pointer outside the module's memory")]
    InvalidPointer,

    #[error("bytecode is not a valid WASM module")]
    InvalidModule,

    #[error("invalid execution context")]
    InvalidContext,

    #[error("module does not export a _start entry point")]
    EntryPointNotFound,

    /// A host call's own metered budget (fuel, or a metered write) ran out.
    /// Always hard-traps rather than returning a soft errno (§5: "the
    /// host-call or meter tick returns a trap to the VM").
    #[error("resource limit exceeded")]
    ResourceLimitExceeded,

    /// `call_program` could not push another frame onto the call stack.
    /// Hard-traps like `ResourceLimitExceeded` - an attacker should never
    /// be able to observe and route around this via a soft errno.
    #[error("call stack overflow")]
    StackOverflow,
}
