//! # heapscope - Heap-Operation Capture and Address-Correlation Engine
//!
//! heapscope observes a target process's heap traffic (allocate, reallocate,
//! virtual-reserve, free) through probes placed by an external
//! instrumentation platform, and turns the raw entry/exit callbacks into an
//! ordered, human-readable event log where every operation is attributed to
//! the module that issued it. When the target raises a severe exception it
//! additionally writes a register-by-register diagnostic report, with each
//! register value resolved to the module or allocation that owns it.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                Instrumentation Platform (external)              │
//! │  • module-load notifications                                    │
//! │  • entry/exit probes on the four heap entry points              │
//! │  • context-change notifications (register snapshot + reason)    │
//! └───────────────────────┬─────────────────────────────────────────┘
//!                         │ callbacks, any target thread
//!                         ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                   TraceSession (this crate)                     │
//! │                                                                 │
//! │  entry ──▶ ThreadCallStaging ──┐                                │
//! │                                ▼                                │
//! │  exit ───▶ plausibility ──▶ commit ──▶ OperationLog ──▶ sink    │
//! │                 │              │                                │
//! │                 │              ├──▶ ChunkRegistry               │
//! │                 │              └──▶ ModuleIndex (caller)        │
//! │                 ▼                                               │
//! │  fault ──▶ FaultReporter ──▶ AddressAnnotator ──▶ fault sink    │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Structure
//!
//! - [`capture`]: the session object receiving every platform callback, and
//!   the per-thread staging that bridges a call's entry and exit probes
//! - [`index`]: the two shared lookup structures — loaded-module ranges and
//!   the live-chunk address→size registry
//! - [`oplog`]: completed operation records, their line formats, and the
//!   append-only log that orders them
//! - [`annotate`]: address-to-label resolution shared by operation lines
//!   and fault reports
//! - [`fault`]: exception classification and the register-level report
//! - [`sink`]: log destinations behind dedicated writer threads
//! - [`config`]: capture policy (pointer window, severe-code range, output
//!   knobs)
//! - [`replay`]: JSON Lines probe scripts and the driver that delivers them
//!   through a real session
//! - [`platform`]: the seam to the instrumentation platform (raw ABI
//!   conversion, target termination)
//! - [`domain`]: core domain types (Pid, Tid, Addr, Timestamp) and errors
//!
//! ## Key Concepts
//!
//! - **Hooked function**: a target function whose entry/exit the platform
//!   observes; the four monitored ones are the platform heap API.
//! - **Chunk**: the address range one allocation returned, tracked until its
//!   matching free so the free line can report a size it was never passed.
//! - **Plausibility window**: heuristic address range separating real
//!   pointers from sentinel return values; rejected calls are dropped
//!   silently.
//! - **Severe exception**: a fault code inside the configured range; the
//!   only condition under which the engine requests target termination.

// Expose modules for testing
pub mod annotate;
pub mod capture;
pub mod cli;
pub mod config;
pub mod domain;
pub mod fault;
pub mod index;
pub mod oplog;
pub mod platform;
pub mod replay;
pub mod sink;
