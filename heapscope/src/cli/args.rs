//! CLI argument definitions

use clap::Parser;
use std::path::PathBuf;

use crate::config::{PointerWindow, SevereCodeRange, TraceConfig};

#[derive(Parser)]
#[command(
    name = "heapscope",
    about = "Replay heap-probe scripts into an annotated operation log",
    after_help = "\
EXAMPLES:
    heapscope trace.jsonl                    Replay into ./heapscope.log
    heapscope trace.jsonl --dir out/         Write logs under out/
    heapscope trace.jsonl --split-files      Per-PID log file, truncated
    heapscope trace.jsonl --timestamp        Timestamp every operation line
    heapscope trace.jsonl --window 0x1000:0x7fffffffffff
                                             Widen the pointer filter

    cargo run --example record-script > trace.jsonl
                                             Generate a sample script"
)]
pub struct Args {
    /// Probe script to replay (JSON Lines, one event per line)
    #[arg(value_name = "SCRIPT")]
    pub script: PathBuf,

    /// Output directory for log files
    #[arg(long, value_name = "DIR", default_value = ".")]
    pub dir: PathBuf,

    /// Write a per-PID primary log (heapscope_<pid>.log, truncated) instead
    /// of appending to heapscope.log
    #[arg(long)]
    pub split_files: bool,

    /// Ignore allocate/reallocate/virtual-reserve probes entirely
    #[arg(long)]
    pub no_alloc: bool,

    /// Ignore free probes entirely
    #[arg(long)]
    pub no_free: bool,

    /// Prefix each operation line with a wall-clock timestamp
    #[arg(long)]
    pub timestamp: bool,

    /// Suppress primary-log output (capture and fault reports still run)
    #[arg(long)]
    pub silent: bool,

    /// Plausible-pointer window as LOW:HIGH hex bounds, both exclusive
    #[arg(long, value_name = "LOW:HIGH", default_value_t = PointerWindow::default(), value_parser = parse_window)]
    pub window: PointerWindow,

    /// Severe exception-code range as LOW:HIGH hex bounds, both inclusive
    #[arg(long, value_name = "LOW:HIGH", default_value_t = SevereCodeRange::default(), value_parser = parse_severe)]
    pub severe: SevereCodeRange,

    /// Suppress non-essential output
    #[arg(short, long)]
    pub quiet: bool,
}

impl Args {
    /// Capture policy implied by the flags.
    #[must_use]
    pub fn trace_config(&self) -> TraceConfig {
        TraceConfig {
            log_alloc: !self.no_alloc,
            log_free: !self.no_free,
            show_timestamp: self.timestamp,
            silent: self.silent,
            window: self.window,
            severity: self.severe,
        }
    }
}

fn parse_window(s: &str) -> Result<PointerWindow, String> {
    s.parse().map_err(|e| format!("{e}"))
}

fn parse_severe(s: &str) -> Result<SevereCodeRange, String> {
    s.parse().map_err(|e| format!("{e}"))
}
