//! Call stack (§4.7).
//!
//! A bounded vector of live [`CallFrame`]s, one per nested `call_program`
//! invocation. Owns each frame's mutable I/O (`stdout`/`stderr` the VM
//! appends to, a `stdin` read cursor `fd_read` advances) while that
//! program is running, and doubles as the caller/callee linkage §4.11's
//! authority check walks. A frame is recorded into the transaction's
//! [`crate::chronicler::Chronicler`] only after it is popped.

use basalt_common::Account;

use crate::error::ReversionError;

/// One call's live I/O and identity (§3's "Call frame" entity). Exists only
/// between [`CallStack::push`] and the matching [`CallStack::pop`].
pub struct CallFrame {
    program_id: Account,
    arguments: Vec<String>,
    stdin: Vec<u8>,
    read_cursor: usize,
    stdout: Vec<u8>,
    stderr: Vec<u8>,
    exit_code: i32,
}

impl CallFrame {
    pub fn new(program_id: Account, arguments: Vec<String>, stdin: Vec<u8>) -> Self {
        CallFrame {
            program_id,
            arguments,
            stdin,
            read_cursor: 0,
            stdout: Vec::new(),
            stderr: Vec::new(),
            exit_code: 0,
        }
    }

    pub fn program_id(&self) -> Account {
        self.program_id
    }

    pub fn arguments(&self) -> &[String] {
        &self.arguments
    }

    pub fn stdin(&self) -> &[u8] {
        &self.stdin
    }

    pub fn stdout(&self) -> &[u8] {
        &self.stdout
    }

    pub fn stderr(&self) -> &[u8] {
        &self.stderr
    }

    pub fn exit_code(&self) -> i32 {
        self.exit_code
    }

    pub fn write_stdout(&mut self, bytes: &[u8]) {
        self.stdout.extend_from_slice(bytes);
    }

    pub fn write_stderr(&mut self, bytes: &[u8]) {
        self.stderr.extend_from_slice(bytes);
    }

    pub fn set_exit_code(&mut self, code: i32) {
        self.exit_code = code;
    }

    /// Reads up to `buf.len()` bytes from `stdin` at the frame's own
    /// cursor, advancing it, and returns the number of bytes read (`0` at
    /// end of input) - the `fd_read` host call's contract.
    pub fn read_stdin(&mut self, buf: &mut [u8]) -> usize {
        let remaining = &self.stdin[self.read_cursor.min(self.stdin.len())..];
        let n = remaining.len().min(buf.len());
        buf[..n].copy_from_slice(&remaining[..n]);
        self.read_cursor += n;
        n
    }
}

/// A bounded stack of [`CallFrame`]s, one per nested program invocation.
/// Exists for the duration of one outermost operation (§4.7); a fresh
/// stack is created per `call_program`/`upload_program` operation the
/// controller applies.
pub struct CallStack {
    frames: Vec<CallFrame>,
    limit: usize,
}

impl CallStack {
    pub fn new(limit: usize) -> Self {
        CallStack {
            frames: Vec::new(),
            limit,
        }
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Pushes a new frame, failing with [`ReversionError::StackOverflow`]
    /// when the stack is already at its configured limit. Frames already on
    /// the stack are left untouched on overflow (§8 property 6).
    pub fn push(&mut self, frame: CallFrame) -> Result<(), ReversionError> {
        if self.frames.len() >= self.limit {
            return Err(ReversionError::StackOverflow);
        }
        self.frames.push(frame);
        Ok(())
    }

    /// Pops the top frame. Calling this on an empty stack is a programmer
    /// error (§4.7/§9): the controller only ever pops a frame it itself
    /// pushed, in strict LIFO order.
    pub fn pop(&mut self) -> CallFrame {
        match self.frames.pop() {
            Some(frame) => frame,
            None => unreachable!("call stack popped while empty"),
        }
    }

    pub fn current(&self) -> &CallFrame {
        match self.frames.last() {
            Some(frame) => frame,
            None => unreachable!("call stack peeked while empty"),
        }
    }

    pub fn current_mut(&mut self) -> &mut CallFrame {
        match self.frames.last_mut() {
            Some(frame) => frame,
            None => unreachable!("call stack peeked while empty"),
        }
    }

    /// The calling frame's account, or [`Account::EMPTY`] when the current
    /// frame is the outermost one (§4.9's `get_caller`).
    pub fn caller(&self) -> Account {
        if self.frames.len() < 2 {
            Account::EMPTY
        } else {
            self.frames[self.frames.len() - 2].program_id
        }
    }

    /// True if `account` appears anywhere in the chain of callers *above*
    /// the current frame - i.e. the current execution was transitively
    /// invoked by `account`'s own program (§4.11's program-authority case).
    pub fn caller_chain_includes(&self, account: Account) -> bool {
        let Some((_, callers)) = self.frames.split_last() else {
            return false;
        };
        callers.iter().any(|f| f.program_id == account)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stdin_read_advances_cursor_and_reports_eof() {
        let mut frame = CallFrame::new(Account::EMPTY, vec![], b"hello".to_vec());
        let mut buf = [0u8; 3];
        assert_eq!(frame.read_stdin(&mut buf), 3);
        assert_eq!(&buf, b"hel");
        let mut buf2 = [0u8; 10];
        assert_eq!(frame.read_stdin(&mut buf2), 2);
        assert_eq!(&buf2[..2], b"lo");
        assert_eq!(frame.read_stdin(&mut buf2), 0);
    }

    #[test]
    fn push_respects_limit_without_corrupting_existing_frames() {
        let mut stack = CallStack::new(2);
        stack.push(CallFrame::new(Account::program([1u8; 32]), vec![], vec![])).unwrap();
        stack.push(CallFrame::new(Account::program([2u8; 32]), vec![], vec![])).unwrap();
        let err = stack
            .push(CallFrame::new(Account::program([3u8; 32]), vec![], vec![]))
            .unwrap_err();
        assert!(matches!(err, ReversionError::StackOverflow));
        assert_eq!(stack.depth(), 2);
    }

    #[test]
    fn caller_is_empty_account_for_outermost_frame() {
        let mut stack = CallStack::new(4);
        stack.push(CallFrame::new(Account::program([1u8; 32]), vec![], vec![])).unwrap();
        assert!(stack.caller().is_empty());
        stack.push(CallFrame::new(Account::program([2u8; 32]), vec![], vec![])).unwrap();
        assert_eq!(stack.caller(), Account::program([1u8; 32]));
    }

    #[test]
    fn caller_chain_detects_transitive_self_invocation() {
        let mut stack = CallStack::new(4);
        let p = Account::program([9u8; 32]);
        stack.push(CallFrame::new(p, vec![], vec![])).unwrap();
        stack.push(CallFrame::new(Account::program([1u8; 32]), vec![], vec![])).unwrap();
        assert!(stack.caller_chain_includes(p));
        assert!(!stack.caller_chain_includes(Account::program([2u8; 32])));
    }
}
