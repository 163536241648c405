//! Log destinations behind dedicated writer threads
//!
//! Capture callbacks ride the target's allocator, so the write path has to
//! cost no more than a channel send. Each destination gets one writer
//! thread owning the buffered output; ordering is whatever order lines
//! were enqueued in, which the session arranges to be append order.

use std::io::{BufWriter, Write};
use std::sync::Mutex;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{unbounded, Sender};

/// Final line of every destination on orderly close.
pub const EOF_MARKER: &str = "############## EOF";

enum SinkMsg {
    Line(String),
    Close,
}

/// Append-only text destination.
///
/// `close` writes the end-of-file marker, flushes, and joins the writer
/// thread. It is idempotent, so the normal shutdown path and the
/// fatal-fault path can both reach it without coordinating.
pub struct LogSink {
    tx: Sender<SinkMsg>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl LogSink {
    /// Spawn the writer thread over `out`.
    #[must_use]
    pub fn spawn(out: Box<dyn Write + Send>) -> Self {
        let (tx, rx) = unbounded();
        let handle = thread::spawn(move || {
            let mut out = BufWriter::new(out);
            for msg in rx {
                match msg {
                    SinkMsg::Line(line) => {
                        writeln!(out, "{line}").ok();
                    }
                    SinkMsg::Close => break,
                }
            }
            writeln!(out, "{EOF_MARKER}").ok();
            out.flush().ok();
        });
        LogSink { tx, handle: Mutex::new(Some(handle)) }
    }

    /// Enqueue one line. Lines enqueued after `close` are dropped.
    pub fn line(&self, line: String) {
        self.tx.send(SinkMsg::Line(line)).ok();
    }

    /// Enqueue an empty line.
    pub fn blank(&self) {
        self.line(String::new());
    }

    /// Write the end-of-file marker, flush, and join the writer thread.
    /// Only the first call does anything.
    pub fn close(&self) {
        let handle = self.handle.lock().unwrap().take();
        if let Some(handle) = handle {
            self.tx.send(SinkMsg::Close).ok();
            handle.join().ok();
        }
    }
}

impl Drop for LogSink {
    fn drop(&mut self) {
        self.close();
    }
}

/// In-memory destination that hands its contents back through clones.
///
/// The writer thread owns the `Write` half, so a plain `Vec<u8>` would be
/// unreadable afterwards; this keeps a shared handle. Tests and demos use
/// it wherever a real file would be overkill.
#[derive(Clone, Default)]
pub struct MemoryWriter(std::sync::Arc<Mutex<Vec<u8>>>);

impl MemoryWriter {
    #[must_use]
    pub fn new() -> Self {
        MemoryWriter::default()
    }

    /// Everything written so far. Call after `close` for complete output.
    #[must_use]
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl Write for MemoryWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lines_come_out_in_order_with_eof() {
        let buf = MemoryWriter::new();
        let sink = LogSink::spawn(Box::new(buf.clone()));
        sink.line("first".to_string());
        sink.line("second".to_string());
        sink.blank();
        sink.close();

        assert_eq!(buf.contents(), format!("first\nsecond\n\n{EOF_MARKER}\n"));
    }

    #[test]
    fn test_close_is_idempotent() {
        let buf = MemoryWriter::new();
        let sink = LogSink::spawn(Box::new(buf.clone()));
        sink.line("only".to_string());
        sink.close();
        sink.close();

        let contents = buf.contents();
        assert_eq!(contents.matches(EOF_MARKER).count(), 1);
    }

    #[test]
    fn test_lines_after_close_are_dropped() {
        let buf = MemoryWriter::new();
        let sink = LogSink::spawn(Box::new(buf.clone()));
        sink.close();
        sink.line("late".to_string());

        assert!(!buf.contents().contains("late"));
    }

    #[test]
    fn test_drop_closes_implicitly() {
        let buf = MemoryWriter::new();
        {
            let sink = LogSink::spawn(Box::new(buf.clone()));
            sink.line("scoped".to_string());
        }
        let contents = buf.contents();
        assert!(contents.contains("scoped"));
        assert!(contents.contains(EOF_MARKER));
    }
}
