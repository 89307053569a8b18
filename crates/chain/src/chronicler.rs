//! Frame recorder / chronicler (§4.6).
//!
//! The live, in-progress half of a call frame (its mutable stdout/stderr
//! buffers and read cursor) lives on [`crate::call_stack::CallStack`] while
//! a program is actually running - that is also where the stack-overflow
//! bound and caller/callee linkage for §4.11 authority checks live (§4.7).
//! The chronicler's job starts once a frame is *popped*: it receives the
//! finished [`crate::call_stack::CallFrame`], stamps it with its call depth,
//! and appends it to the receipt's ordered frame list, plus independently
//! collecting `log` lines and assigning monotonically increasing sequence
//! numbers to `event` records.

use basalt_common::Account;

use crate::call_stack::CallFrame;
use crate::protocol::{Event, ProgramFrame};

/// Records program frames, log lines, and events for one transaction's
/// execution (nested `call_program`s included).
///
/// `event_seq` starts wherever the enclosing block's chronicler left off
/// (monotonic *across the block*, per §5) and is handed back via
/// [`Self::next_event_seq`] so the controller can seed the next
/// transaction's chronicler - a reverted transaction's chronicler is
/// simply dropped, so its sequence numbers are never consumed for real
/// (§9's resolved open question on event ordering under reversion).
pub struct Chronicler {
    completed: Vec<ProgramFrame>,
    logs: Vec<Vec<u8>>,
    events: Vec<Event>,
    next_event_seq: u64,
}

impl Chronicler {
    pub fn new(event_seq_start: u64) -> Self {
        Chronicler {
            completed: Vec::new(),
            logs: Vec::new(),
            events: Vec::new(),
            next_event_seq: event_seq_start,
        }
    }

    /// Records a just-popped call frame at `depth`, appending it to the
    /// ordered receipt frame list in call order (pop order, deepest-first
    /// within each call's own subtree).
    pub fn record_frame(&mut self, frame: CallFrame, depth: u32) -> ProgramFrame {
        let recorded = ProgramFrame {
            id: frame.program_id(),
            depth,
            arguments: frame.arguments().to_vec(),
            stdin: frame.stdin().to_vec(),
            code: frame.exit_code(),
            stdout: frame.stdout().to_vec(),
            stderr: frame.stderr().to_vec(),
        };
        self.completed.push(recorded.clone());
        recorded
    }

    pub fn log(&mut self, bytes: &[u8]) {
        self.logs.push(bytes.to_vec());
    }

    pub fn push_event(&mut self, name: String, data: Vec<u8>, impacted: Vec<Account>) -> u64 {
        let seq = self.next_event_seq;
        self.next_event_seq += 1;
        self.events.push(Event {
            seq,
            name,
            data,
            impacted,
        });
        seq
    }

    pub fn next_event_seq(&self) -> u64 {
        self.next_event_seq
    }

    pub fn frames(&self) -> &[ProgramFrame] {
        &self.completed
    }

    pub fn logs(&self) -> &[Vec<u8>] {
        &self.logs
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Consumes the chronicler into its receipt-facing parts: the frame
    /// list and event list, in the order described above.
    pub fn into_parts(self) -> (Vec<ProgramFrame>, Vec<Event>) {
        (self.completed, self.events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_are_recorded_with_their_depth() {
        let mut c = Chronicler::new(0);
        let mut outer = CallFrame::new(Account::program([1u8; 32]), vec![], vec![]);
        outer.write_stdout(b"outer");
        let mut inner = CallFrame::new(Account::program([2u8; 32]), vec![], vec![]);
        inner.write_stdout(b"inner");

        let recorded_inner = c.record_frame(inner, 1);
        let recorded_outer = c.record_frame(outer, 0);
        assert_eq!(recorded_inner.depth, 1);
        assert_eq!(recorded_outer.depth, 0);
        assert_eq!(c.frames(), &[recorded_inner, recorded_outer]);
    }

    #[test]
    fn event_sequence_numbers_are_monotonic() {
        let mut c = Chronicler::new(5);
        let a = c.push_event("a".to_string(), vec![], vec![]);
        let b = c.push_event("b".to_string(), vec![], vec![]);
        assert_eq!(a, 5);
        assert_eq!(b, 6);
        assert_eq!(c.next_event_seq(), 7);
    }
}
