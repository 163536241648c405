//! # Shared Probe ABI (instrumentation glue ↔ engine)
//!
//! Defines the data structures and constants shared between the
//! instrumentation glue (which runs inside or next to the target and talks
//! to the probe platform directly) and the userspace engine. All types use
//! `#[repr(C)]` so the same layout works regardless of which side was built
//! first.
//!
//! ## Key Types
//!
//! - [`RegisterFile`] - General-purpose register snapshot delivered with a
//!   context change
//! - [`ContextChangeEvent`] - Raw context-change notification (reason code,
//!   exception code, registers)
//!
//! The engine never interprets these directly; it converts them into its own
//! domain types at the session boundary.

#![no_std]

/// ABI version, bumped on any layout change to the structs below. Glue
/// built against a different version must refuse to attach.
pub const PROBE_ABI_VERSION: u32 = 1;

// ============================================================================
// Context-Change Reason Codes
// ============================================================================

/// Target received a fatal, non-continuable signal. Not an exception; the
/// engine ignores it (the platform tears the target down itself).
pub const REASON_FATAL_SIGNAL: u32 = 0;

/// Target received an ordinary signal and is entering its handler.
pub const REASON_SIGNAL: u32 = 1;

/// Target is returning from a signal handler.
pub const REASON_SIGNAL_RETURN: u32 = 2;

/// Asynchronous procedure call delivery (Windows targets).
pub const REASON_APC: u32 = 3;

/// Target raised an exception. The only reason code the engine acts on:
/// the exception code is classified against the severe range and may
/// trigger a full fault report.
pub const REASON_EXCEPTION: u32 = 4;

/// Kernel-to-user callback dispatch (Windows targets).
pub const REASON_CALLBACK: u32 = 5;

// ============================================================================
// Register Snapshot
// ============================================================================

/// Number of general-purpose registers captured per context change.
pub const REGISTER_COUNT: usize = 17;

/// General-purpose register snapshot for an x86-64 target.
///
/// Field order matches report order: instruction pointer first, then the
/// classic eight, then `r8`-`r15`. The engine formats one report line per
/// field via [`RegisterFile::named`].
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct RegisterFile {
    /// Instruction pointer at the moment of the context change.
    pub rip: u64,
    pub rax: u64,
    pub rbx: u64,
    pub rcx: u64,
    pub rdx: u64,
    /// Frame base pointer (when the target keeps frame pointers).
    pub rbp: u64,
    /// Stack pointer.
    pub rsp: u64,
    pub rsi: u64,
    pub rdi: u64,
    pub r8: u64,
    pub r9: u64,
    pub r10: u64,
    pub r11: u64,
    pub r12: u64,
    pub r13: u64,
    pub r14: u64,
    pub r15: u64,
}

impl RegisterFile {
    /// All registers as (name, value) pairs, in report order.
    #[must_use]
    pub fn named(&self) -> [(&'static str, u64); REGISTER_COUNT] {
        [
            ("RIP", self.rip),
            ("RAX", self.rax),
            ("RBX", self.rbx),
            ("RCX", self.rcx),
            ("RDX", self.rdx),
            ("RBP", self.rbp),
            ("RSP", self.rsp),
            ("RSI", self.rsi),
            ("RDI", self.rdi),
            ("R8", self.r8),
            ("R9", self.r9),
            ("R10", self.r10),
            ("R11", self.r11),
            ("R12", self.r12),
            ("R13", self.r13),
            ("R14", self.r14),
            ("R15", self.r15),
        ]
    }
}

/// Raw context-change notification as delivered by the probe platform.
///
/// **Memory Layout**: `#[repr(C)]` so glue written against a different
/// compiler version still matches.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct ContextChangeEvent {
    /// Why the context changed (see the `REASON_*` constants).
    pub reason: u32,

    /// Platform exception code. Meaningful only when `reason` is
    /// [`REASON_EXCEPTION`]; zero otherwise.
    pub exception_code: u32,

    /// Register state at the moment of the change.
    pub registers: RegisterFile,
}
