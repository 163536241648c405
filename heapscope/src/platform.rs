//! Seam between the engine and the instrumentation platform
//!
//! The platform delivers raw `#[repr(C)]` notifications (shared ABI in
//! `heapscope-common`); everything here converts them into engine terms
//! exactly once, at the session boundary. Termination is also behind a
//! trait so the engine never exits a process itself.

use heapscope_common::{
    ContextChangeEvent, RegisterFile, REASON_APC, REASON_CALLBACK, REASON_EXCEPTION,
    REASON_FATAL_SIGNAL, REASON_SIGNAL, REASON_SIGNAL_RETURN,
};

/// Why the target's context changed.
///
/// Only [`ContextChangeReason::Exception`] carries a meaningful exception
/// code; the session ignores every other reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextChangeReason {
    FatalSignal,
    Signal,
    SignalReturn,
    Apc,
    Exception,
    Callback,
}

impl ContextChangeReason {
    /// Decode a raw platform reason code. Unknown codes yield `None` and
    /// are dropped at the session boundary.
    #[must_use]
    pub fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            REASON_FATAL_SIGNAL => Some(ContextChangeReason::FatalSignal),
            REASON_SIGNAL => Some(ContextChangeReason::Signal),
            REASON_SIGNAL_RETURN => Some(ContextChangeReason::SignalReturn),
            REASON_APC => Some(ContextChangeReason::Apc),
            REASON_EXCEPTION => Some(ContextChangeReason::Exception),
            REASON_CALLBACK => Some(ContextChangeReason::Callback),
            _ => None,
        }
    }
}

/// Context-change notification in engine terms.
#[derive(Debug, Clone, Copy)]
pub struct ContextChange {
    pub reason: ContextChangeReason,
    pub exception_code: u32,
    pub registers: RegisterFile,
}

impl ContextChange {
    /// Convert a raw ABI event. `None` when the reason code is unknown.
    #[must_use]
    pub fn from_event(event: &ContextChangeEvent) -> Option<Self> {
        Some(ContextChange {
            reason: ContextChangeReason::from_raw(event.reason)?,
            exception_code: event.exception_code,
            registers: event.registers,
        })
    }
}

/// Handle for stopping the observed process.
///
/// The engine requests termination in exactly one place: immediately after
/// a severe-fault report is written. The replay driver turns the request
/// into its own exit; tests merely record it.
pub trait TargetControl: Send + Sync {
    /// Ask the platform to terminate the target with `exit_code`.
    fn terminate(&self, exit_code: i32);
}
