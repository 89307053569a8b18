use std::fmt;
use std::sync::Arc;

use basalt_common::{Account, AccountTag, Digest, ObjectSpace};
use wasmtime::{Caller, Config, Engine, Extern, Linker, Memory, Module, Store};

use crate::error::VmError;
use crate::host_api::{errno, HostApi};
use crate::module_cache::ModuleCache;

/// A host-call "class" weight, per §4.5's design-default table. Charged as
/// extra wasmtime fuel on top of the per-instruction cost wasmtime already
/// meters, so both raw compute and host-call cost draw from the same
/// `compute_bandwidth` budget.
pub const WEIGHT_LIGHT: u64 = 100;
pub const WEIGHT_MEDIUM: u64 = 1_000;
pub const WEIGHT_HEAVY: u64 = 10_000;

/// The result of one `VirtualMachine::run`: the program's exit code and the
/// compute ticks it consumed, for the caller to apply against its own
/// resource session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOutcome {
    pub exit_code: i32,
    pub fuel_consumed: u64,
}

/// Trap marker used to unwind a `proc_exit` host call without treating it
/// as an abnormal trap at the `run` boundary.
#[derive(Debug)]
struct ProcExit(i32);

impl fmt::Display for ProcExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "proc_exit({})", self.0)
    }
}

impl std::error::Error for ProcExit {}

/// Carries a specific [`VmError`] through wasmtime's `Result<_,
/// wasmtime::Error>` boundary so `run` can recover it verbatim instead of
/// collapsing every trap to `VmError::Trapped(None)`. Used for the handful
/// of host-call failures that must hard-trap with a known cause: metered
/// resource exhaustion and call-stack overflow (see `put_object`,
/// `remove_object`, `call_program`, and `charge` below).
#[derive(Debug, Clone)]
struct HostTrap(VmError);

impl fmt::Display for HostTrap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "host trap: {}", self.0)
    }
}

impl std::error::Error for HostTrap {}

/// Parses, caches, instantiates, and runs WASM programs against a
/// caller-supplied [`HostApi`]. One `VirtualMachine` is shared across a
/// node's whole lifetime; its [`ModuleCache`] is the only mutable shared
/// state and is itself internally synchronized.
pub struct VirtualMachine {
    engine: Engine,
    cache: ModuleCache,
}

impl VirtualMachine {
    pub fn new(module_cache_capacity: usize) -> Self {
        let mut config = Config::new();
        config.consume_fuel(true);
        // Engine::new only fails on unsupported configuration, which `Config`
        // above never produces; a default engine is always available as a
        // fallback so `new` stays infallible.
        let engine = Engine::new(&config).unwrap_or_else(|_| Engine::default());
        Self {
            engine,
            cache: ModuleCache::new(module_cache_capacity),
        }
    }

    pub fn module_cache(&self) -> &ModuleCache {
        &self.cache
    }

    /// Runs `bytecode` (looked up by `id` in the module cache first) against
    /// `host`, with `compute_budget` fuel units available for both raw
    /// execution and host-call weights. Invokes the WASI `_start` entry
    /// point; see [`Self::run_entry`] to invoke a different export (e.g. a
    /// program's `authorize` entry point for §4.11 authority checks).
    pub fn run<H>(
        &self,
        host: H,
        bytecode: &[u8],
        id: Digest,
        compute_budget: u64,
    ) -> Result<RunOutcome, VmError>
    where
        H: HostApi + Send + 'static,
    {
        self.run_entry(host, bytecode, id, compute_budget, "_start")
    }

    /// As [`Self::run`], but invokes the export named `entry_point` instead
    /// of `_start`. A missing export is [`VmError::EntryPointNotFound`],
    /// same as a missing `_start`.
    pub fn run_entry<H>(
        &self,
        host: H,
        bytecode: &[u8],
        id: Digest,
        compute_budget: u64,
        entry_point: &str,
    ) -> Result<RunOutcome, VmError>
    where
        H: HostApi + Send + 'static,
    {
        if bytecode.is_empty() {
            return Err(VmError::InvalidModule);
        }

        let module = match self.cache.get(&id) {
            Some(m) => m,
            None => {
                let parsed = Module::new(&self.engine, bytecode).map_err(|_| VmError::InvalidModule)?;
                let arc = Arc::new(parsed);
                self.cache.put(id, arc.clone());
                arc
            }
        };

        let mut store = Store::new(&self.engine, host);
        store
            .set_fuel(compute_budget)
            .map_err(|_| VmError::ExecutionEnvironmentFailure)?;

        let mut linker: Linker<H> = Linker::new(&self.engine);
        bind_imports(&mut linker).map_err(|_| VmError::ExecutionEnvironmentFailure)?;

        let instance = linker
            .instantiate(&mut store, &module)
            .map_err(|_| VmError::InstantiateFailure)?;

        let start = instance
            .get_typed_func::<(), ()>(&mut store, entry_point)
            .map_err(|_| VmError::EntryPointNotFound)?;

        let result = start.call(&mut store, ());
        let fuel_consumed = compute_budget.saturating_sub(store.get_fuel().unwrap_or(0));

        match result {
            Ok(()) => Ok(RunOutcome {
                exit_code: 0,
                fuel_consumed,
            }),
            Err(err) => {
                if let Some(exit) = err.downcast_ref::<ProcExit>() {
                    Ok(RunOutcome {
                        exit_code: exit.0,
                        fuel_consumed,
                    })
                } else if let Some(HostTrap(reason)) = err.downcast_ref::<HostTrap>() {
                    Err(reason.clone())
                } else if matches!(err.downcast_ref::<wasmtime::Trap>(), Some(wasmtime::Trap::OutOfFuel)) {
                    // Raw compute (no metered host call in flight) exhausted
                    // the budget. Reported the same way a `charge()` host
                    // trap is, so the caller charges the full budget against
                    // the session exactly like any other resource exhaustion
                    // (§8 Scenario D: the payer is charged for every tick
                    // consumed, trap or not).
                    Err(VmError::ResourceLimitExceeded)
                } else {
                    Err(VmError::Trapped(None))
                }
            }
        }
    }
}

fn charge<H>(caller: &mut Caller<'_, H>, weight: u64) -> Result<(), wasmtime::Error> {
    let remaining = caller.get_fuel().unwrap_or(0);
    if remaining < weight {
        caller.set_fuel(0).ok();
        return Err(wasmtime::Error::new(HostTrap(VmError::ResourceLimitExceeded)));
    }
    caller.set_fuel(remaining - weight)?;
    Ok(())
}

fn memory_of<H>(caller: &mut Caller<'_, H>) -> Result<Memory, wasmtime::Error> {
    match caller.get_export("memory") {
        Some(Extern::Memory(m)) => Ok(m),
        _ => Err(wasmtime::Error::msg("module does not export linear memory")),
    }
}

fn read_bytes<H>(
    caller: &mut Caller<'_, H>,
    mem: Memory,
    ptr: u32,
    len: u32,
) -> Result<Vec<u8>, wasmtime::Error> {
    let data = mem.data(&caller);
    let start = ptr as usize;
    let end = start
        .checked_add(len as usize)
        .ok_or_else(|| wasmtime::Error::msg("pointer overflow"))?;
    data.get(start..end)
        .map(|s| s.to_vec())
        .ok_or_else(|| wasmtime::Error::msg("out of bounds read"))
}

fn write_bytes<H>(
    caller: &mut Caller<'_, H>,
    mem: Memory,
    ptr: u32,
    bytes: &[u8],
) -> Result<(), wasmtime::Error> {
    let data = mem.data_mut(caller);
    let start = ptr as usize;
    let end = start
        .checked_add(bytes.len())
        .ok_or_else(|| wasmtime::Error::msg("pointer overflow"))?;
    let slice = data
        .get_mut(start..end)
        .ok_or_else(|| wasmtime::Error::msg("out of bounds write"))?;
    slice.copy_from_slice(bytes);
    Ok(())
}

fn write_u32<H>(caller: &mut Caller<'_, H>, mem: Memory, ptr: u32, value: u32) -> Result<(), wasmtime::Error> {
    write_bytes(caller, mem, ptr, &value.to_le_bytes())
}

fn decode_account(bytes: &[u8]) -> Result<Account, wasmtime::Error> {
    if bytes.len() != Account::WIRE_LEN {
        return Err(wasmtime::Error::msg("malformed account buffer"));
    }
    let tag = AccountTag::try_from(bytes[0]).map_err(|_| wasmtime::Error::msg("invalid account tag"))?;
    let mut address = [0u8; 32];
    address.copy_from_slice(&bytes[1..33]);
    Ok(Account { tag, address })
}

fn encode_account(account: Account) -> [u8; Account::WIRE_LEN] {
    let mut out = [0u8; Account::WIRE_LEN];
    out[0] = account.tag as u8;
    out[1..33].copy_from_slice(&account.address);
    out
}

/// Binds the fixed host-call surface (§4.9) into `linker`: the WASI stubs
/// this program needs under `wasi_snapshot_preview1`, and the chain-specific
/// calls under `basalt`. Not `wasi-common`/`wasmtime-wasi` - every call is
/// intercepted and routed to `H`, never a real file descriptor.
fn bind_imports<H>(linker: &mut Linker<H>) -> Result<(), wasmtime::Error>
where
    H: HostApi + 'static,
{
    linker.func_wrap(
        "wasi_snapshot_preview1",
        "args_sizes_get",
        |mut caller: Caller<'_, H>, argc_ptr: u32, argv_buf_size_ptr: u32| -> Result<i32, wasmtime::Error> {
            charge(&mut caller, WEIGHT_LIGHT)?;
            let mem = memory_of(&mut caller)?;
            let args = caller.data().args().to_vec();
            let buf_size: usize = args.iter().map(|a| a.len() + 1).sum();
            write_u32(&mut caller, mem, argc_ptr, args.len() as u32)?;
            write_u32(&mut caller, mem, argv_buf_size_ptr, buf_size as u32)?;
            Ok(errno::SUCCESS)
        },
    )?;

    linker.func_wrap(
        "wasi_snapshot_preview1",
        "args_get",
        |mut caller: Caller<'_, H>, argv_ptr: u32, argv_buf_ptr: u32| -> Result<i32, wasmtime::Error> {
            charge(&mut caller, WEIGHT_LIGHT)?;
            let mem = memory_of(&mut caller)?;
            let args = caller.data().args().to_vec();
            let mut cursor = argv_buf_ptr;
            for (i, arg) in args.iter().enumerate() {
                write_u32(&mut caller, mem, argv_ptr + (i as u32 * 4), cursor)?;
                let mut bytes = arg.as_bytes().to_vec();
                bytes.push(0);
                write_bytes(&mut caller, mem, cursor, &bytes)?;
                cursor += bytes.len() as u32;
            }
            Ok(errno::SUCCESS)
        },
    )?;

    linker.func_wrap(
        "wasi_snapshot_preview1",
        "fd_write",
        |mut caller: Caller<'_, H>, fd: i32, iovs_ptr: u32, iovs_len: u32, nwritten_ptr: u32| -> Result<i32, wasmtime::Error> {
            charge(&mut caller, WEIGHT_LIGHT)?;
            if fd != 1 && fd != 2 {
                return Ok(errno::BADF);
            }
            let mem = memory_of(&mut caller)?;
            let mut total = 0u32;
            let mut all_bytes = Vec::new();
            for i in 0..iovs_len {
                let base = iovs_ptr + i * 8;
                let ptr_bytes = read_bytes(&mut caller, mem, base, 4)?;
                let len_bytes = read_bytes(&mut caller, mem, base + 4, 4)?;
                let ptr = u32::from_le_bytes(ptr_bytes.try_into().unwrap_or([0; 4]));
                let len = u32::from_le_bytes(len_bytes.try_into().unwrap_or([0; 4]));
                let chunk = read_bytes(&mut caller, mem, ptr, len)?;
                total += chunk.len() as u32;
                all_bytes.extend(chunk);
            }
            if fd == 1 {
                caller.data_mut().write_stdout(&all_bytes);
            } else {
                caller.data_mut().write_stderr(&all_bytes);
            }
            write_u32(&mut caller, mem, nwritten_ptr, total)?;
            Ok(errno::SUCCESS)
        },
    )?;

    linker.func_wrap(
        "wasi_snapshot_preview1",
        "fd_read",
        |mut caller: Caller<'_, H>, fd: i32, iovs_ptr: u32, iovs_len: u32, nread_ptr: u32| -> Result<i32, wasmtime::Error> {
            charge(&mut caller, WEIGHT_LIGHT)?;
            if fd != 0 {
                return Ok(errno::BADF);
            }
            let mem = memory_of(&mut caller)?;
            let mut total = 0u32;
            for i in 0..iovs_len {
                let base = iovs_ptr + i * 8;
                let ptr_bytes = read_bytes(&mut caller, mem, base, 4)?;
                let len_bytes = read_bytes(&mut caller, mem, base + 4, 4)?;
                let ptr = u32::from_le_bytes(ptr_bytes.try_into().unwrap_or([0; 4]));
                let len = u32::from_le_bytes(len_bytes.try_into().unwrap_or([0; 4]));
                let mut buf = vec![0u8; len as usize];
                let n = caller.data_mut().read_stdin(&mut buf);
                write_bytes(&mut caller, mem, ptr, &buf[..n])?;
                total += n as u32;
                if n < len as usize {
                    break;
                }
            }
            write_u32(&mut caller, mem, nread_ptr, total)?;
            Ok(errno::SUCCESS)
        },
    )?;

    linker.func_wrap(
        "wasi_snapshot_preview1",
        "fd_seek",
        |mut caller: Caller<'_, H>, _fd: i32, _offset: i64, _whence: i32, _newoffset_ptr: u32| -> Result<i32, wasmtime::Error> {
            charge(&mut caller, WEIGHT_LIGHT)?;
            Ok(errno::NOSYS)
        },
    )?;

    linker.func_wrap(
        "wasi_snapshot_preview1",
        "fd_close",
        |mut caller: Caller<'_, H>, _fd: i32| -> Result<i32, wasmtime::Error> {
            charge(&mut caller, WEIGHT_LIGHT)?;
            Ok(errno::SUCCESS)
        },
    )?;

    linker.func_wrap(
        "wasi_snapshot_preview1",
        "fd_fdstat_get",
        |mut caller: Caller<'_, H>, _fd: i32, _stat_ptr: u32| -> Result<i32, wasmtime::Error> {
            charge(&mut caller, WEIGHT_LIGHT)?;
            Ok(errno::NOSYS)
        },
    )?;

    linker.func_wrap(
        "wasi_snapshot_preview1",
        "proc_exit",
        |mut caller: Caller<'_, H>, code: i32| -> Result<(), wasmtime::Error> {
            caller.data_mut().proc_exit(code);
            Err(wasmtime::Error::new(ProcExit(code)))
        },
    )?;

    linker.func_wrap(
        "basalt",
        "get_caller",
        |mut caller: Caller<'_, H>, out_ptr: u32| -> Result<i32, wasmtime::Error> {
            charge(&mut caller, WEIGHT_LIGHT)?;
            let mem = memory_of(&mut caller)?;
            let account = caller.data().get_caller();
            write_bytes(&mut caller, mem, out_ptr, &encode_account(account))?;
            Ok(errno::SUCCESS)
        },
    )?;

    linker.func_wrap(
        "basalt",
        "get_object",
        |mut caller: Caller<'_, H>,
         system: i32,
         address_ptr: u32,
         space_id: u32,
         key_ptr: u32,
         key_len: u32,
         out_ptr: u32,
         out_cap: u32,
         out_len_ptr: u32|
         -> Result<i32, wasmtime::Error> {
            charge(&mut caller, WEIGHT_MEDIUM)?;
            let mem = memory_of(&mut caller)?;
            let address_bytes = read_bytes(&mut caller, mem, address_ptr, 32)?;
            let mut address = [0u8; 32];
            address.copy_from_slice(&address_bytes);
            let space = if system != 0 {
                ObjectSpace::system(space_id)
            } else {
                ObjectSpace::program(address, space_id)
            };
            let key = read_bytes(&mut caller, mem, key_ptr, key_len)?;
            let value = caller
                .data_mut()
                .get_object(space, &key)
                .map_err(|e| wasmtime::Error::msg(e.to_string()))?;
            match value {
                Some(bytes) => {
                    if bytes.len() as u32 > out_cap {
                        write_u32(&mut caller, mem, out_len_ptr, bytes.len() as u32)?;
                        return Ok(errno::IO);
                    }
                    write_bytes(&mut caller, mem, out_ptr, &bytes)?;
                    write_u32(&mut caller, mem, out_len_ptr, bytes.len() as u32)?;
                    Ok(errno::SUCCESS)
                }
                None => {
                    write_u32(&mut caller, mem, out_len_ptr, 0)?;
                    Ok(errno::SUCCESS)
                }
            }
        },
    )?;

    linker.func_wrap(
        "basalt",
        "put_object",
        |mut caller: Caller<'_, H>,
         system: i32,
         address_ptr: u32,
         space_id: u32,
         key_ptr: u32,
         key_len: u32,
         value_ptr: u32,
         value_len: u32|
         -> Result<i32, wasmtime::Error> {
            charge(&mut caller, WEIGHT_HEAVY)?;
            let mem = memory_of(&mut caller)?;
            let address_bytes = read_bytes(&mut caller, mem, address_ptr, 32)?;
            let mut address = [0u8; 32];
            address.copy_from_slice(&address_bytes);
            let space = if system != 0 {
                ObjectSpace::system(space_id)
            } else {
                ObjectSpace::program(address, space_id)
            };
            let key = read_bytes(&mut caller, mem, key_ptr, key_len)?;
            let value = read_bytes(&mut caller, mem, value_ptr, value_len)?;
            match caller.data_mut().put_object(space, &key, value) {
                Ok(()) => Ok(errno::SUCCESS),
                Err(VmError::ResourceLimitExceeded) => {
                    Err(wasmtime::Error::new(HostTrap(VmError::ResourceLimitExceeded)))
                }
                Err(e) => Ok(host_errno_for(&e)),
            }
        },
    )?;

    linker.func_wrap(
        "basalt",
        "remove_object",
        |mut caller: Caller<'_, H>, system: i32, address_ptr: u32, space_id: u32, key_ptr: u32, key_len: u32| -> Result<i32, wasmtime::Error> {
            charge(&mut caller, WEIGHT_MEDIUM)?;
            let mem = memory_of(&mut caller)?;
            let address_bytes = read_bytes(&mut caller, mem, address_ptr, 32)?;
            let mut address = [0u8; 32];
            address.copy_from_slice(&address_bytes);
            let space = if system != 0 {
                ObjectSpace::system(space_id)
            } else {
                ObjectSpace::program(address, space_id)
            };
            let key = read_bytes(&mut caller, mem, key_ptr, key_len)?;
            match caller.data_mut().remove_object(space, &key) {
                Ok(()) => Ok(errno::SUCCESS),
                Err(VmError::ResourceLimitExceeded) => {
                    Err(wasmtime::Error::new(HostTrap(VmError::ResourceLimitExceeded)))
                }
                Err(e) => Ok(host_errno_for(&e)),
            }
        },
    )?;

    linker.func_wrap(
        "basalt",
        "check_authority",
        |mut caller: Caller<'_, H>, account_ptr: u32, out_ptr: u32| -> Result<i32, wasmtime::Error> {
            charge(&mut caller, WEIGHT_LIGHT)?;
            let mem = memory_of(&mut caller)?;
            let bytes = read_bytes(&mut caller, mem, account_ptr, Account::WIRE_LEN as u32)?;
            let account = decode_account(&bytes)?;
            let authorized = caller
                .data_mut()
                .check_authority(account)
                .map_err(|e| wasmtime::Error::msg(e.to_string()))?;
            write_bytes(&mut caller, mem, out_ptr, &[authorized as u8])?;
            Ok(errno::SUCCESS)
        },
    )?;

    linker.func_wrap(
        "basalt",
        "log",
        |mut caller: Caller<'_, H>, ptr: u32, len: u32| -> Result<i32, wasmtime::Error> {
            charge(&mut caller, WEIGHT_LIGHT)?;
            let mem = memory_of(&mut caller)?;
            let bytes = read_bytes(&mut caller, mem, ptr, len)?;
            caller.data_mut().log(&bytes);
            Ok(errno::SUCCESS)
        },
    )?;

    linker.func_wrap(
        "basalt",
        "event",
        |mut caller: Caller<'_, H>,
         name_ptr: u32,
         name_len: u32,
         data_ptr: u32,
         data_len: u32,
         impacted_ptr: u32,
         impacted_count: u32|
         -> Result<i32, wasmtime::Error> {
            charge(&mut caller, WEIGHT_MEDIUM)?;
            let mem = memory_of(&mut caller)?;
            let name_bytes = read_bytes(&mut caller, mem, name_ptr, name_len)?;
            let name = String::from_utf8(name_bytes).map_err(|e| wasmtime::Error::msg(e.to_string()))?;
            let data = read_bytes(&mut caller, mem, data_ptr, data_len)?;
            let mut impacted = Vec::with_capacity(impacted_count as usize);
            for i in 0..impacted_count {
                let account_bytes = read_bytes(
                    &mut caller,
                    mem,
                    impacted_ptr + i * Account::WIRE_LEN as u32,
                    Account::WIRE_LEN as u32,
                )?;
                impacted.push(decode_account(&account_bytes)?);
            }
            caller.data_mut().event(name, data, impacted);
            Ok(errno::SUCCESS)
        },
    )?;

    linker.func_wrap(
        "basalt",
        "call_program",
        |mut caller: Caller<'_, H>,
         account_ptr: u32,
         stdin_ptr: u32,
         stdin_len: u32,
         args_ptr: u32,
         args_len: u32,
         out_code_ptr: u32,
         out_stdout_ptr: u32,
         out_stdout_cap: u32,
         out_stdout_len_ptr: u32,
         out_stderr_ptr: u32,
         out_stderr_cap: u32,
         out_stderr_len_ptr: u32|
         -> Result<i32, wasmtime::Error> {
            charge(&mut caller, WEIGHT_HEAVY)?;
            let mem = memory_of(&mut caller)?;
            let account_bytes = read_bytes(&mut caller, mem, account_ptr, Account::WIRE_LEN as u32)?;
            let account = decode_account(&account_bytes)?;
            let stdin = read_bytes(&mut caller, mem, stdin_ptr, stdin_len)?;
            let args_bytes = read_bytes(&mut caller, mem, args_ptr, args_len)?;
            let arguments: Vec<String> = String::from_utf8(args_bytes)
                .map_err(|e| wasmtime::Error::msg(e.to_string()))?
                .split('\0')
                .filter(|s| !s.is_empty())
                .map(str::to_owned)
                .collect();

            let outcome = caller
                .data_mut()
                .call_program(account, stdin, arguments)
                .map_err(|e| wasmtime::Error::new(HostTrap(e)))?;

            write_u32(&mut caller, mem, out_code_ptr, outcome.code as u32)?;
            if outcome.stdout.len() as u32 > out_stdout_cap || outcome.stderr.len() as u32 > out_stderr_cap {
                return Ok(errno::IO);
            }
            write_bytes(&mut caller, mem, out_stdout_ptr, &outcome.stdout)?;
            write_u32(&mut caller, mem, out_stdout_len_ptr, outcome.stdout.len() as u32)?;
            write_bytes(&mut caller, mem, out_stderr_ptr, &outcome.stderr)?;
            write_u32(&mut caller, mem, out_stderr_len_ptr, outcome.stderr.len() as u32)?;
            Ok(errno::SUCCESS)
        },
    )?;

    Ok(())
}

fn host_errno_for(error: &VmError) -> i32 {
    match error {
        VmError::InvalidArguments | VmError::InvalidPointer => errno::INVAL,
        _ => errno::IO,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host_api::ProgramOutput;

    struct NoopHost;

    impl HostApi for NoopHost {
        fn args(&self) -> &[String] {
            &[]
        }
        fn write_stdout(&mut self, _bytes: &[u8]) {}
        fn write_stderr(&mut self, _bytes: &[u8]) {}
        fn read_stdin(&mut self, _buf: &mut [u8]) -> usize {
            0
        }
        fn proc_exit(&mut self, _code: i32) {}
        fn get_caller(&self) -> Account {
            Account::EMPTY
        }
        fn get_object(&mut self, _space: ObjectSpace, _key: &[u8]) -> Result<Option<Vec<u8>>, VmError> {
            Ok(None)
        }
        fn put_object(&mut self, _space: ObjectSpace, _key: &[u8], _value: Vec<u8>) -> Result<(), VmError> {
            Ok(())
        }
        fn remove_object(&mut self, _space: ObjectSpace, _key: &[u8]) -> Result<(), VmError> {
            Ok(())
        }
        fn check_authority(&mut self, _account: Account) -> Result<bool, VmError> {
            Ok(false)
        }
        fn log(&mut self, _bytes: &[u8]) {}
        fn event(&mut self, _name: String, _data: Vec<u8>, _impacted: Vec<Account>) {}
        fn call_program(
            &mut self,
            _account: Account,
            _stdin: Vec<u8>,
            _arguments: Vec<String>,
        ) -> Result<ProgramOutput, VmError> {
            Ok(ProgramOutput {
                code: 0,
                stdout: Vec::new(),
                stderr: Vec::new(),
            })
        }
    }

    #[test]
    fn empty_bytecode_is_invalid_module() {
        let vm = VirtualMachine::new(4);
        let result = vm.run(NoopHost, &[], Digest::ZERO, 1_000);
        assert!(matches!(result, Err(VmError::InvalidModule)));
    }

    #[test]
    fn module_without_start_export_is_entry_point_not_found() {
        let vm = VirtualMachine::new(4);
        // Magic number + version only: a valid, empty WASM module.
        let result = vm.run(NoopHost, b"\0asm\x01\0\0\0", Digest::from_bytes([1u8; 32]), 1_000);
        assert!(matches!(result, Err(VmError::EntryPointNotFound)));
    }

    #[test]
    fn garbage_bytecode_is_invalid_module() {
        let vm = VirtualMachine::new(4);
        let result = vm.run(NoopHost, b"not wasm at all", Digest::from_bytes([2u8; 32]), 1_000);
        assert!(matches!(result, Err(VmError::InvalidModule)));
    }
}
