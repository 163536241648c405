//! Replay the binary against scripted probe events and assert on the files
//! it leaves behind.

use std::fs;
use std::path::Path;
use std::process::Command;

const EOF_MARKER: &str = "############## EOF";

fn write_script(dir: &Path, name: &str, lines: &[&str]) -> std::path::PathBuf {
    let path = dir.join(name);
    fs::write(&path, lines.join("\n")).expect("Failed to write script");
    path
}

fn heapscope(script: &Path, out_dir: &Path, extra: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_heapscope"))
        .arg(script)
        .arg("--dir")
        .arg(out_dir)
        .args(extra)
        .output()
        .expect("Failed to run heapscope")
}

#[test]
fn test_replay_writes_annotated_log() {
    let tmp = tempfile::tempdir().expect("Failed to create temp dir");
    let script = write_script(
        tmp.path(),
        "trace.jsonl",
        &[
            r#"{"event":"target","pid":1234}"#,
            r#"{"event":"module_load","name":"app.exe","base":"0x400000","end":"0x450000"}"#,
            r#"{"event":"probe_attached","op":"alloc","address":"0x77001000"}"#,
            r#"{"event":"alloc_entry","op":"alloc","tid":1,"size":"0x40"}"#,
            r#"{"event":"alloc_exit","op":"alloc","tid":1,"ret":"0x10000","caller":"0x401000"}"#,
            r#"{"event":"free","addr":"0x10000","caller":"0x401020"}"#,
        ],
    );

    let output = heapscope(&script, tmp.path(), &[]);
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let log = fs::read_to_string(tmp.path().join("heapscope.log")).expect("no primary log");
    assert!(log.starts_with("Instrumentation started\n"));
    assert!(log.contains("Adding output for PID 1234 into this file"));
    assert!(log.contains("** Module app.exe loaded at 0x400000**"));
    assert!(log.contains("Adding instrumentation for RtlAllocateHeap (0x77001000)"));
    assert!(log.contains("PID: 1234 | alloc(0x40) at 0x10000 from 0x401000 (app.exe)"));
    assert!(log.contains("PID: 1234 | free(0x10000) from 0x401020 (size was 0x40) (app.exe)"));
    assert!(log.contains("Number of heap operations logged: 2"));
    assert!(log.ends_with(&format!("{EOF_MARKER}\n")));

    // no faults scripted: the diagnostic log holds only its close marker
    let faults = fs::read_to_string(tmp.path().join("heapscope_faults.log")).expect("no fault log");
    assert_eq!(faults, format!("{EOF_MARKER}\n"));
}

#[test]
fn test_severe_fault_exits_with_target_fault_status() {
    let tmp = tempfile::tempdir().expect("Failed to create temp dir");
    let script = write_script(
        tmp.path(),
        "crash.jsonl",
        &[
            r#"{"event":"target","pid":99}"#,
            r#"{"event":"module_load","name":"app.exe","base":"0x400000","end":"0x450000"}"#,
            r#"{"event":"fault","reason":"exception","code":"0xc0000005","registers":{"rip":"0x401000"}}"#,
            r#"{"event":"free","addr":"0x10000","caller":"0x401020"}"#,
        ],
    );

    let output = heapscope(&script, tmp.path(), &[]);
    assert_eq!(output.status.code(), Some(3));

    let log = fs::read_to_string(tmp.path().join("heapscope.log")).expect("no primary log");
    assert!(log.contains("*** Exception at 0x401000, code 0xc0000005 ***"));
    assert!(log.contains("For more info about this exception, see exception log file ***"));
    // delivery stopped at the fault: the free after it never ran
    assert!(!log.contains("free(0x10000)"));
    assert!(log.ends_with(&format!("{EOF_MARKER}\n")));

    let faults = fs::read_to_string(tmp.path().join("heapscope_faults.log")).expect("no fault log");
    assert!(faults.contains("PID 99 | Exception context:"));
    assert!(faults.contains("RIP: 0x0000000000401000 (app.exe)"));
    assert!(faults.contains("RSP: 0x0000000000000000"));
    assert!(faults.ends_with(&format!("{EOF_MARKER}\n")));
}

#[test]
fn test_benign_fault_continues_and_exits_cleanly() {
    let tmp = tempfile::tempdir().expect("Failed to create temp dir");
    let script = write_script(
        tmp.path(),
        "warn.jsonl",
        &[
            r#"{"event":"target","pid":7}"#,
            r#"{"event":"fault","reason":"exception","code":"0x4000001f","registers":{"rip":"0x414141"}}"#,
            r#"{"event":"alloc_entry","op":"alloc","tid":1,"size":"0x10"}"#,
            r#"{"event":"alloc_exit","op":"alloc","tid":1,"ret":"0x10000","caller":"0x401000"}"#,
        ],
    );

    let output = heapscope(&script, tmp.path(), &[]);
    assert!(output.status.success());

    let log = fs::read_to_string(tmp.path().join("heapscope.log")).expect("no primary log");
    assert!(log.contains("*** Exception at 0x414141, code 0x4000001f ***"));
    assert!(!log.contains("see exception log file"));
    assert!(log.contains("alloc(0x10) at 0x10000"));
    assert!(log.contains("Number of heap operations logged: 1"));
}

#[test]
fn test_split_files_names_log_after_pid() {
    let tmp = tempfile::tempdir().expect("Failed to create temp dir");
    let script = write_script(
        tmp.path(),
        "trace.jsonl",
        &[
            r#"{"event":"target","pid":4321}"#,
            r#"{"event":"child_process","pid":4400}"#,
        ],
    );

    let output = heapscope(&script, tmp.path(), &["--split-files"]);
    assert!(output.status.success());

    let log =
        fs::read_to_string(tmp.path().join("heapscope_4321.log")).expect("no per-pid log");
    assert!(log.contains("Creating child process from parent PID 4321"));
    assert!(!tmp.path().join("heapscope.log").exists());
}

#[test]
fn test_malformed_script_is_a_usage_error() {
    let tmp = tempfile::tempdir().expect("Failed to create temp dir");
    let script = write_script(
        tmp.path(),
        "bad.jsonl",
        &[r#"{"event":"target","pid":1}"#, "{not json}"],
    );

    let output = heapscope(&script, tmp.path(), &[]);
    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("line 2"), "stderr: {stderr}");
}

#[test]
fn test_timestamped_lines_carry_a_clock_reading() {
    let tmp = tempfile::tempdir().expect("Failed to create temp dir");
    let script = write_script(
        tmp.path(),
        "trace.jsonl",
        &[
            r#"{"event":"target","pid":1}"#,
            r#"{"event":"alloc_entry","op":"virtualalloc","tid":1,"size":"0x1000"}"#,
            r#"{"event":"alloc_exit","op":"virtualalloc","tid":1,"ret":"0x200000","caller":"0x401000"}"#,
        ],
    );

    let output = heapscope(&script, tmp.path(), &["--timestamp"]);
    assert!(output.status.success());

    let log = fs::read_to_string(tmp.path().join("heapscope.log")).expect("no primary log");
    let line = log
        .lines()
        .find(|l| l.contains("virtualalloc(0x1000)"))
        .expect("operation line missing");
    // "PID: 1 | <seconds>.<millis> | virtualalloc(...)"
    let stamp = line.split(" | ").nth(1).expect("no timestamp field");
    assert!(stamp.parse::<f64>().is_ok(), "bad timestamp: {stamp}");
}
