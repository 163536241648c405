//! # heapscope - Main Entry Point
//!
//! Replays a recorded probe script through a full capture session and
//! writes the resulting logs:
//! - Primary: `heapscope.log` (append) or `heapscope_<pid>.log` with
//!   `--split-files` (truncate)
//! - Diagnostic: `heapscope_faults.log` (append), one block per severe
//!   fault
//!
//! A severe fault in the script stops the replay where the target would
//! have died; the process then exits with the target-fault status.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use log::info;

use heapscope::capture::TraceSession;
use heapscope::cli::Args;
use heapscope::domain::ReplayError;
use heapscope::replay::{self, ReplayControl, Script};

// Exit codes
const EXIT_SUCCESS: i32 = 0;
const EXIT_ERROR: i32 = 1;
const EXIT_USAGE: i32 = 2;
const EXIT_TARGET_FAULT: i32 = 3;

fn main() {
    env_logger::init();
    std::process::exit(match run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            exit_code_for(&e)
        }
    });
}

fn exit_code_for(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<ReplayError>() {
        Some(ReplayError::Script { .. } | ReplayError::MissingTarget) => EXIT_USAGE,
        _ => EXIT_ERROR,
    }
}

/// Open the primary log destination per the file-naming policy: one shared
/// append-mode file by default, a truncated per-PID file under
/// `--split-files`.
fn open_primary(dir: &Path, pid: u32, split_files: bool) -> Result<(PathBuf, File)> {
    let path = if split_files {
        dir.join(format!("heapscope_{pid}.log"))
    } else {
        dir.join("heapscope.log")
    };
    let file = if split_files {
        File::create(&path)
    } else {
        OpenOptions::new().create(true).append(true).open(&path)
    }
    .with_context(|| format!("failed to open primary log {}", path.display()))?;
    Ok((path, file))
}

fn open_faults(dir: &Path) -> Result<(PathBuf, File)> {
    let path = dir.join("heapscope_faults.log");
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("failed to open fault log {}", path.display()))?;
    Ok((path, file))
}

fn run() -> Result<i32> {
    let args = Args::parse();

    let script = Script::from_path(&args.script)
        .with_context(|| format!("failed to load script {}", args.script.display()))?;
    info!("loaded {} events for PID {}", script.events.len(), script.pid.0);

    fs::create_dir_all(&args.dir)
        .with_context(|| format!("failed to create output directory {}", args.dir.display()))?;
    let (primary_path, primary) = open_primary(&args.dir, script.pid.0, args.split_files)?;
    let (faults_path, faults) = open_faults(&args.dir)?;

    if !args.quiet {
        println!("heapscope v{}", env!("CARGO_PKG_VERSION"));
        println!("script: {}", args.script.display());
        println!("pid: {}", script.pid.0);
        println!("primary log: {}", primary_path.display());
        println!("fault log: {}", faults_path.display());
    }

    let control = ReplayControl::new();
    let session = TraceSession::new(
        args.trace_config(),
        script.pid,
        Box::new(primary),
        Box::new(faults),
        Box::new(control.clone()),
    );

    let summary = replay::run(&session, &script);

    if !args.quiet {
        println!(
            "replayed {} of {} events, {} operations logged",
            summary.events_delivered,
            script.events.len(),
            summary.operations
        );
    }

    if summary.fatal {
        // the recorded termination request becomes our exit status
        let requested = control.requested_exit().unwrap_or(-1);
        eprintln!("target terminated with code {requested} after severe fault");
        return Ok(EXIT_TARGET_FAULT);
    }
    Ok(EXIT_SUCCESS)
}
