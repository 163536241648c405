//! Capture session: shared state plus one method per platform callback
//!
//! The session owns every structure the callbacks touch, so there is no
//! process-global state anywhere; handlers receive `&self` and may run
//! concurrently on arbitrary threads. Teardown is a single idempotent
//! point reached from the normal-exit path and the fatal-fault path alike.

use std::io::Write;

use log::{info, warn};

use crate::capture::staging::ThreadCallStaging;
use crate::config::TraceConfig;
use crate::domain::{Addr, Pid, Tid, Timestamp};
use crate::fault::{FaultOutcome, FaultReporter, SEVERE_NOTICE};
use crate::index::{ChunkRegistry, ModuleIndex};
use crate::oplog::{AllocKind, HeapOperation, OpKind, OperationLog};
use crate::platform::{ContextChange, ContextChangeReason, TargetControl};
use crate::sink::LogSink;

const BANNER_RULE: &str = "==========================================";
const CHILD_RULE: &str = "*******************************";

pub struct TraceSession {
    config: TraceConfig,
    pid: Pid,
    modules: ModuleIndex,
    chunks: ChunkRegistry,
    staging: ThreadCallStaging,
    history: OperationLog,
    primary: LogSink,
    faults: LogSink,
    control: Box<dyn TargetControl>,
}

impl TraceSession {
    /// Build a session over two open destinations and write the start
    /// banner. Must complete before the first probe fires.
    #[must_use]
    pub fn new(
        config: TraceConfig,
        pid: Pid,
        primary_out: Box<dyn Write + Send>,
        faults_out: Box<dyn Write + Send>,
        control: Box<dyn TargetControl>,
    ) -> Self {
        let session = TraceSession {
            config,
            pid,
            modules: ModuleIndex::new(),
            chunks: ChunkRegistry::new(),
            staging: ThreadCallStaging::new(),
            history: OperationLog::new(),
            primary: LogSink::spawn(primary_out),
            faults: LogSink::spawn(faults_out),
            control,
        };
        session.write_start_banner();
        info!("capture session started for {}", session.pid);
        session
    }

    fn write_start_banner(&self) {
        let yes_no = |enabled: bool| if enabled { "YES" } else { "NO" };
        self.primary.line("Instrumentation started".to_string());
        self.primary.line(BANNER_RULE.to_string());
        self.primary.line(format!("Date & time: {}", Timestamp::now()));
        self.primary.line(format!("Adding output for PID {} into this file", self.pid.0));
        self.primary.line(format!("Logging heap alloc: {}", yes_no(self.config.log_alloc)));
        self.primary.line(format!("Logging heap free: {}", yes_no(self.config.log_free)));
        self.primary.line(BANNER_RULE.to_string());
        self.primary.blank();
    }

    fn kind_enabled(&self, kind: OpKind) -> bool {
        match kind {
            OpKind::Free => self.config.log_free,
            _ => self.config.log_alloc,
        }
    }

    /// Module-load notification. Arrives once per image, before any of its
    /// code runs.
    pub fn on_module_load(&self, name: &str, base: Addr, end: Addr) {
        self.modules.register(name, base, end);
        self.primary.line(format!("** Module {name} loaded at {base}**"));
    }

    /// The platform located and instrumented one monitored entry point.
    pub fn on_probe_attached(&self, kind: OpKind, address: Addr) {
        if !self.kind_enabled(kind) {
            return;
        }
        self.primary.line(format!("Adding instrumentation for {} ({address})", kind.symbol()));
    }

    /// Entry probe of an allocation-style call: park the requested size
    /// until the matching exit.
    pub fn on_alloc_entry(&self, kind: AllocKind, tid: Tid, size: u64) {
        if !self.config.log_alloc {
            return;
        }
        self.staging.stage(tid, kind, size);
    }

    /// Exit probe of an allocation-style call: commit one operation if the
    /// returned address looks like a real pointer, otherwise drop the call
    /// silently.
    pub fn on_alloc_exit(&self, kind: AllocKind, tid: Tid, ret: Addr, caller: Addr) {
        if !self.config.log_alloc {
            return;
        }
        if !self.config.window.contains(ret) {
            return;
        }
        let size = self.staging.take(tid, kind);
        self.commit(OpKind::from(kind), ret, size, caller);
        self.chunks.record(ret, size);
    }

    /// Free probe. Single-phase: the freed address is an argument, so
    /// there is no entry/exit split. The size is whatever the registry
    /// last recorded for the address, looked up before the entry is
    /// dropped.
    pub fn on_free(&self, addr: Addr, caller: Addr) {
        if !self.config.log_free {
            return;
        }
        if !self.config.window.contains(addr) {
            return;
        }
        let size = self.chunks.size_of(addr);
        self.commit(OpKind::Free, addr, size, caller);
        self.chunks.forget(addr);
    }

    fn commit(&self, kind: OpKind, start: Addr, size: u64, caller: Addr) {
        let op = HeapOperation {
            kind,
            chunk_start: start,
            chunk_size: size,
            chunk_end: start.offset(size),
            caller,
            caller_module: self.modules.resolve(caller).unwrap_or_default(),
            timestamp: self.config.show_timestamp.then(Timestamp::now),
            pid: self.pid,
        };
        self.history.commit(op, |op| {
            if !self.config.silent {
                self.primary.line(op.format_line());
            }
        });
    }

    /// Child-process notification. Tracing always follows the child; the
    /// primary log records the decision.
    pub fn on_child_process(&self, child: Pid) -> bool {
        info!("following child process {child}");
        self.primary.blank();
        self.primary.line(CHILD_RULE.to_string());
        self.primary.line(format!("Creating child process from parent PID {}", self.pid.0));
        self.primary.line(CHILD_RULE.to_string());
        self.primary.blank();
        true
    }

    /// Context-change notification. Only target-raised exceptions matter;
    /// a severe one ends the session and the target.
    pub fn on_context_change(&self, change: &ContextChange) -> FaultOutcome {
        if change.reason != ContextChangeReason::Exception {
            return FaultOutcome::Ignored;
        }
        let rip = Addr(change.registers.rip);
        let code = change.exception_code;

        self.primary.blank();
        self.primary.blank();
        self.primary.line(FaultReporter::banner(rip, code));

        let reporter =
            FaultReporter::new(&self.modules, &self.history, self.config.severity, self.pid);
        if !reporter.is_severe(code) {
            return FaultOutcome::Noted;
        }

        warn!("severe exception {code:#x} at {rip}, terminating target");
        self.primary.line(SEVERE_NOTICE.to_string());
        reporter.write_context(&change.registers, &self.faults);
        self.shutdown();
        self.control.terminate(-1);
        FaultOutcome::Fatal
    }

    /// Normal end of tracing: write the final count, then tear down.
    pub fn finish(&self) {
        self.primary.blank();
        self.primary.blank();
        self.primary.line(format!(
            "Number of heap operations logged: {}",
            self.history.len()
        ));
        self.shutdown();
    }

    /// Flush and close both destinations. Safe to call more than once.
    pub fn shutdown(&self) {
        self.primary.close();
        self.faults.close();
    }

    /// Committed operations so far.
    #[must_use]
    pub fn operation_count(&self) -> usize {
        self.history.len()
    }

    /// Full operation history, in commit order.
    #[must_use]
    pub fn operations(&self) -> Vec<HeapOperation> {
        self.history.snapshot()
    }

    #[must_use]
    pub fn chunks(&self) -> &ChunkRegistry {
        &self.chunks
    }

    #[must_use]
    pub fn modules(&self) -> &ModuleIndex {
        &self.modules
    }

    #[must_use]
    pub fn pid(&self) -> Pid {
        self.pid
    }
}
