//! Probe-script replay
//!
//! Replays a recorded probe script through a real session, so the whole
//! pipeline (staging, correlation, annotation, sinks, fault handling)
//! runs without an instrumentation platform attached. Scripts are JSON
//! Lines: one event per line, tagged by `"event"`, addresses and sizes as
//! hex strings. The first line must declare the simulated target process.

use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use heapscope_common::RegisterFile;

use crate::capture::TraceSession;
use crate::domain::{Addr, Pid, ReplayError, Tid};
use crate::fault::FaultOutcome;
use crate::oplog::{AllocKind, OpKind};
use crate::platform::{ContextChange, ContextChangeReason, TargetControl};

/// Hex-string field encoding, `"0x1000"` on the wire both directions.
///
/// Generic over the integer width so addresses (`u64`) and exception
/// codes (`u32`) share one helper.
pub mod hex {
    use serde::{de::Error as _, Deserialize, Deserializer, Serializer};

    pub fn serialize<S, T>(value: &T, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        T: Copy + Into<u64>,
    {
        serializer.serialize_str(&format!("{:#x}", (*value).into()))
    }

    pub fn deserialize<'de, D, T>(deserializer: D) -> Result<T, D::Error>
    where
        D: Deserializer<'de>,
        T: TryFrom<u64>,
    {
        let s = String::deserialize(deserializer)?;
        let t = s.trim();
        let digits = t.strip_prefix("0x").or_else(|| t.strip_prefix("0X")).unwrap_or(t);
        let value = u64::from_str_radix(digits, 16)
            .map_err(|_| D::Error::custom(format!("invalid hex value \"{s}\"")))?;
        T::try_from(value).map_err(|_| D::Error::custom(format!("hex value {s} out of range")))
    }
}

/// Operation labels as scripts spell them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScriptOp {
    Alloc,
    Realloc,
    Virtualalloc,
    Free,
}

impl From<ScriptOp> for OpKind {
    fn from(op: ScriptOp) -> Self {
        match op {
            ScriptOp::Alloc => OpKind::Allocate,
            ScriptOp::Realloc => OpKind::Reallocate,
            ScriptOp::Virtualalloc => OpKind::VirtualReserve,
            ScriptOp::Free => OpKind::Free,
        }
    }
}

/// The labels valid where only two-phase kinds make sense. Serde rejects
/// `free` here at parse time, with the offending line number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScriptAllocOp {
    Alloc,
    Realloc,
    Virtualalloc,
}

impl From<ScriptAllocOp> for AllocKind {
    fn from(op: ScriptAllocOp) -> Self {
        match op {
            ScriptAllocOp::Alloc => AllocKind::Allocate,
            ScriptAllocOp::Realloc => AllocKind::Reallocate,
            ScriptAllocOp::Virtualalloc => AllocKind::VirtualReserve,
        }
    }
}

/// Context-change reasons as scripts spell them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScriptReason {
    FatalSignal,
    Signal,
    SignalReturn,
    Apc,
    Exception,
    Callback,
}

impl From<ScriptReason> for ContextChangeReason {
    fn from(reason: ScriptReason) -> Self {
        match reason {
            ScriptReason::FatalSignal => ContextChangeReason::FatalSignal,
            ScriptReason::Signal => ContextChangeReason::Signal,
            ScriptReason::SignalReturn => ContextChangeReason::SignalReturn,
            ScriptReason::Apc => ContextChangeReason::Apc,
            ScriptReason::Exception => ContextChangeReason::Exception,
            ScriptReason::Callback => ContextChangeReason::Callback,
        }
    }
}

/// Register values for a scripted fault. Absent registers read as zero,
/// so scripts only name what the scenario cares about.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegisterSpec {
    #[serde(with = "hex")]
    pub rip: u64,
    #[serde(with = "hex")]
    pub rax: u64,
    #[serde(with = "hex")]
    pub rbx: u64,
    #[serde(with = "hex")]
    pub rcx: u64,
    #[serde(with = "hex")]
    pub rdx: u64,
    #[serde(with = "hex")]
    pub rbp: u64,
    #[serde(with = "hex")]
    pub rsp: u64,
    #[serde(with = "hex")]
    pub rsi: u64,
    #[serde(with = "hex")]
    pub rdi: u64,
    #[serde(with = "hex")]
    pub r8: u64,
    #[serde(with = "hex")]
    pub r9: u64,
    #[serde(with = "hex")]
    pub r10: u64,
    #[serde(with = "hex")]
    pub r11: u64,
    #[serde(with = "hex")]
    pub r12: u64,
    #[serde(with = "hex")]
    pub r13: u64,
    #[serde(with = "hex")]
    pub r14: u64,
    #[serde(with = "hex")]
    pub r15: u64,
}

impl From<RegisterSpec> for RegisterFile {
    fn from(spec: RegisterSpec) -> Self {
        RegisterFile {
            rip: spec.rip,
            rax: spec.rax,
            rbx: spec.rbx,
            rcx: spec.rcx,
            rdx: spec.rdx,
            rbp: spec.rbp,
            rsp: spec.rsp,
            rsi: spec.rsi,
            rdi: spec.rdi,
            r8: spec.r8,
            r9: spec.r9,
            r10: spec.r10,
            r11: spec.r11,
            r12: spec.r12,
            r13: spec.r13,
            r14: spec.r14,
            r15: spec.r15,
        }
    }
}

/// One scripted probe event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ScriptEvent {
    /// Mandatory first line: the process the script simulates.
    Target { pid: u32 },
    ModuleLoad {
        name: String,
        #[serde(with = "hex")]
        base: u64,
        #[serde(with = "hex")]
        end: u64,
    },
    ProbeAttached {
        op: ScriptOp,
        #[serde(with = "hex")]
        address: u64,
    },
    AllocEntry {
        op: ScriptAllocOp,
        tid: u32,
        #[serde(with = "hex")]
        size: u64,
    },
    AllocExit {
        op: ScriptAllocOp,
        tid: u32,
        #[serde(with = "hex")]
        ret: u64,
        #[serde(with = "hex")]
        caller: u64,
    },
    Free {
        #[serde(with = "hex")]
        addr: u64,
        #[serde(with = "hex")]
        caller: u64,
    },
    Fault {
        reason: ScriptReason,
        #[serde(with = "hex")]
        code: u32,
        registers: RegisterSpec,
    },
    ChildProcess { pid: u32 },
}

/// A parsed script: the simulated pid plus its events in delivery order.
#[derive(Debug)]
pub struct Script {
    pub pid: Pid,
    pub events: Vec<ScriptEvent>,
}

impl Script {
    /// Parse JSON Lines text. Blank lines are skipped; the first real
    /// line must be the target declaration. Line numbers in errors are
    /// 1-based over the raw text.
    pub fn parse(text: &str) -> Result<Self, ReplayError> {
        let mut pid = None;
        let mut events = Vec::new();
        for (idx, raw) in text.lines().enumerate() {
            let raw = raw.trim();
            if raw.is_empty() {
                continue;
            }
            let event: ScriptEvent = serde_json::from_str(raw)
                .map_err(|source| ReplayError::Script { line: idx + 1, source })?;
            match (event, &pid) {
                (ScriptEvent::Target { pid: declared }, None) => pid = Some(Pid(declared)),
                (ScriptEvent::Target { .. }, Some(_)) => {} // repeated declarations are ignored
                (_, None) => return Err(ReplayError::MissingTarget),
                (event, Some(_)) => events.push(event),
            }
        }
        match pid {
            Some(pid) => Ok(Script { pid, events }),
            None => Err(ReplayError::MissingTarget),
        }
    }

    pub fn from_path(path: &Path) -> Result<Self, ReplayError> {
        Script::parse(&fs::read_to_string(path)?)
    }
}

/// What a replay run did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplaySummary {
    /// Events delivered before the run ended.
    pub events_delivered: usize,
    /// Operations the session committed.
    pub operations: usize,
    /// True when a severe fault ended the run early.
    pub fatal: bool,
}

/// Termination recorder standing in for the platform's kill switch.
///
/// A real embedding would stop the target process; replay just remembers
/// the request so the driver can exit with a matching status.
#[derive(Clone, Default)]
pub struct ReplayControl(Arc<Mutex<Option<i32>>>);

impl ReplayControl {
    #[must_use]
    pub fn new() -> Self {
        ReplayControl::default()
    }

    /// Exit code of the recorded termination request, if one was made.
    #[must_use]
    pub fn requested_exit(&self) -> Option<i32> {
        *self.0.lock().unwrap()
    }
}

impl TargetControl for ReplayControl {
    fn terminate(&self, exit_code: i32) {
        *self.0.lock().unwrap() = Some(exit_code);
    }
}

/// Deliver `script` through `session` the way the platform would.
///
/// A fatal fault stops delivery immediately (the target is gone, so are
/// its callbacks); otherwise the session is finished normally at end of
/// script.
pub fn run(session: &TraceSession, script: &Script) -> ReplaySummary {
    let mut delivered = 0;
    for event in &script.events {
        delivered += 1;
        match event {
            ScriptEvent::Target { .. } => {}
            ScriptEvent::ModuleLoad { name, base, end } => {
                session.on_module_load(name, Addr(*base), Addr(*end));
            }
            ScriptEvent::ProbeAttached { op, address } => {
                session.on_probe_attached((*op).into(), Addr(*address));
            }
            ScriptEvent::AllocEntry { op, tid, size } => {
                session.on_alloc_entry((*op).into(), Tid(*tid), *size);
            }
            ScriptEvent::AllocExit { op, tid, ret, caller } => {
                session.on_alloc_exit((*op).into(), Tid(*tid), Addr(*ret), Addr(*caller));
            }
            ScriptEvent::Free { addr, caller } => {
                session.on_free(Addr(*addr), Addr(*caller));
            }
            ScriptEvent::ChildProcess { pid } => {
                session.on_child_process(Pid(*pid));
            }
            ScriptEvent::Fault { reason, code, registers } => {
                let change = ContextChange {
                    reason: (*reason).into(),
                    exception_code: *code,
                    registers: (*registers).into(),
                };
                if session.on_context_change(&change) == FaultOutcome::Fatal {
                    return ReplaySummary {
                        events_delivered: delivered,
                        operations: session.operation_count(),
                        fatal: true,
                    };
                }
            }
        }
    }
    session.finish();
    ReplaySummary {
        events_delivered: delivered,
        operations: session.operation_count(),
        fatal: false,
    }
}
