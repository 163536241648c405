//! Exception classification and register-level fault reports
//!
//! Every target-raised exception gets a banner in the primary log. Only
//! codes inside the configured severe range also get the full register
//! dump in the diagnostic log; the session follows that up with teardown
//! and a termination request. Everything else keeps running.

use heapscope_common::RegisterFile;

use crate::annotate::AddressAnnotator;
use crate::config::SevereCodeRange;
use crate::domain::{Addr, Pid, Timestamp};
use crate::index::ModuleIndex;
use crate::oplog::OperationLog;
use crate::sink::LogSink;

/// Pointer for operators from the primary log to the diagnostic one.
pub const SEVERE_NOTICE: &str =
    "For more info about this exception, see exception log file ***";

/// What the session did with a context-change notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultOutcome {
    /// Not a target-raised exception; nothing was written.
    Ignored,
    /// Benign exception: banner only, target keeps running.
    Noted,
    /// Severe exception: full report written, termination requested.
    Fatal,
}

/// Renders fault output against the shared module index and operation
/// history. Reads both, writes into neither.
pub struct FaultReporter<'a> {
    annotator: AddressAnnotator<'a>,
    severity: SevereCodeRange,
    pid: Pid,
}

impl<'a> FaultReporter<'a> {
    #[must_use]
    pub fn new(
        modules: &'a ModuleIndex,
        history: &'a OperationLog,
        severity: SevereCodeRange,
        pid: Pid,
    ) -> Self {
        FaultReporter {
            annotator: AddressAnnotator::new(modules, history),
            severity,
            pid,
        }
    }

    /// Classify an exception code against the severe range.
    #[must_use]
    pub fn is_severe(&self, code: u32) -> bool {
        self.severity.contains(code)
    }

    /// Banner line written to the primary log for every exception.
    #[must_use]
    pub fn banner(rip: Addr, code: u32) -> String {
        format!("*** Exception at {rip}, code {code:#x} ***")
    }

    /// Write the register-by-register diagnostic block.
    ///
    /// One aligned line per register, each annotated the same way caller
    /// addresses are annotated in the event log.
    pub fn write_context(&self, registers: &RegisterFile, faults: &LogSink) {
        faults.line(format!("Exception timestamp: {}", Timestamp::now()));
        faults.line(format!("PID {} | Exception context:", self.pid.0));
        for (name, value) in registers.named() {
            let info = self.annotator.describe(Addr(value));
            faults.line(format!("{name:>3}: {value:#018x} {info}"));
        }
        faults.blank();
    }
}
