//! Completed heap operations and the append-only log that orders them
//!
//! A `HeapOperation` is immutable once committed. The log keeps every
//! record for the life of the session, frees included, because fault
//! annotation deliberately searches the full history: an address that used
//! to belong to a now-freed chunk is exactly what a crash report wants to
//! show.

use std::fmt;
use std::sync::Mutex;

use crate::domain::{Addr, Pid, Timestamp};

/// The four observed operation kinds.
///
/// A closed set: the formatter and the capture protocol match on it
/// exhaustively, so a new kind is a compile-time concern everywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpKind {
    Allocate,
    Reallocate,
    VirtualReserve,
    Free,
}

impl OpKind {
    /// Short label used in operation lines and crash annotations.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            OpKind::Allocate => "alloc",
            OpKind::Reallocate => "realloc",
            OpKind::VirtualReserve => "virtualalloc",
            OpKind::Free => "free",
        }
    }

    /// Symbol the probe platform locates for this kind.
    #[must_use]
    pub fn symbol(self) -> &'static str {
        match self {
            OpKind::Allocate => "RtlAllocateHeap",
            OpKind::Reallocate => "RtlReAllocateHeap",
            OpKind::VirtualReserve => "VirtualAlloc",
            OpKind::Free => "RtlFreeHeap",
        }
    }
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The three kinds captured through the two-phase entry/exit protocol.
///
/// Free stands apart: it is single-phase, keyed by an argument instead of
/// a return value, so it never appears here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AllocKind {
    Allocate,
    Reallocate,
    VirtualReserve,
}

impl AllocKind {
    #[must_use]
    pub fn symbol(self) -> &'static str {
        OpKind::from(self).symbol()
    }
}

impl From<AllocKind> for OpKind {
    fn from(kind: AllocKind) -> Self {
        match kind {
            AllocKind::Allocate => OpKind::Allocate,
            AllocKind::Reallocate => OpKind::Reallocate,
            AllocKind::VirtualReserve => OpKind::VirtualReserve,
        }
    }
}

/// One completed heap operation.
///
/// For frees, `chunk_size`/`chunk_end` are reconstructed from the chunk
/// registry rather than observed; an address never seen allocated gets
/// size 0.
#[derive(Debug, Clone)]
pub struct HeapOperation {
    pub kind: OpKind,
    pub chunk_start: Addr,
    pub chunk_size: u64,
    pub chunk_end: Addr,
    /// Return address of the call that triggered the operation.
    pub caller: Addr,
    /// Module owning `caller`, empty when unresolved.
    pub caller_module: String,
    /// Present only when timestamping is enabled.
    pub timestamp: Option<Timestamp>,
    pub pid: Pid,
}

impl HeapOperation {
    /// Check if an address falls within this operation's chunk interval.
    /// Bounds are inclusive on both ends.
    #[must_use]
    pub fn contains(&self, addr: Addr) -> bool {
        self.chunk_start <= addr && addr <= self.chunk_end
    }

    /// Render the primary-log line for this record.
    #[must_use]
    pub fn format_line(&self) -> String {
        let stamp = match self.timestamp {
            Some(ts) => format!("{ts} | "),
            None => String::new(),
        };
        match self.kind {
            OpKind::Free => format!(
                "PID: {} | {}free({}) from {} (size was {:#x}) ({})",
                self.pid.0, stamp, self.chunk_start, self.caller, self.chunk_size, self.caller_module
            ),
            kind => format!(
                "PID: {} | {}{}({:#x}) at {} from {} ({})",
                self.pid.0,
                stamp,
                kind,
                self.chunk_size,
                self.chunk_start,
                self.caller,
                self.caller_module
            ),
        }
    }
}

/// Append-only, thread-shared sequence of committed operations.
///
/// One lock covers both the append and whatever the caller emits for it,
/// so emitted lines come out in a valid linearization of append order:
/// a thread's own operations always appear in the order it issued them.
#[derive(Debug, Default)]
pub struct OperationLog {
    ops: Mutex<Vec<HeapOperation>>,
}

impl OperationLog {
    #[must_use]
    pub fn new() -> Self {
        OperationLog::default()
    }

    /// Append `op`, running `emit` on it while the log lock is held.
    pub fn commit<F>(&self, op: HeapOperation, emit: F)
    where
        F: FnOnce(&HeapOperation),
    {
        let mut ops = self.ops.lock().unwrap();
        emit(&op);
        ops.push(op);
    }

    /// Number of committed operations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ops.lock().unwrap().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `(kind, chunk_size)` of every operation whose interval contains
    /// `addr`, in append order. Frees included.
    #[must_use]
    pub fn overlapping(&self, addr: Addr) -> Vec<(OpKind, u64)> {
        let ops = self.ops.lock().unwrap();
        ops.iter().filter(|op| op.contains(addr)).map(|op| (op.kind, op.chunk_size)).collect()
    }

    /// Copy of the full history, in append order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<HeapOperation> {
        self.ops.lock().unwrap().clone()
    }
}
