//! Per-thread staging between a call's entry and exit probes
//!
//! Entry and exit are delivered as two independent callbacks with nothing
//! in common but the thread they fire on; the platform guarantees both
//! fire on that thread for a synchronous call. The requested size observed
//! at entry parks here until the exit probe consumes it.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::domain::Tid;
use crate::oplog::AllocKind;

/// Pending request sizes, keyed by (thread, hooked function).
///
/// Last writer wins: a second entry on the same thread before the matching
/// exit overwrites the first, so reentrant calls of the same function on
/// one thread are not correlated. Known limitation, kept as-is; there is
/// no call-depth tracking.
#[derive(Debug, Default)]
pub struct ThreadCallStaging {
    staged: Mutex<HashMap<(Tid, AllocKind), u64>>,
}

impl ThreadCallStaging {
    #[must_use]
    pub fn new() -> Self {
        ThreadCallStaging::default()
    }

    /// Record `size` as the pending request for `(tid, kind)`, replacing
    /// any unconsumed value.
    pub fn stage(&self, tid: Tid, kind: AllocKind, size: u64) {
        let mut staged = self.staged.lock().unwrap();
        staged.insert((tid, kind), size);
    }

    /// Consume the staged size for `(tid, kind)`. Returns 0 when nothing
    /// is staged, which is a valid, silent outcome rather than an error.
    #[must_use]
    pub fn take(&self, tid: Tid, kind: AllocKind) -> u64 {
        let mut staged = self.staged.lock().unwrap();
        staged.remove(&(tid, kind)).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_then_take() {
        let staging = ThreadCallStaging::new();
        staging.stage(Tid(1), AllocKind::Allocate, 64);
        assert_eq!(staging.take(Tid(1), AllocKind::Allocate), 64);
    }

    #[test]
    fn test_take_without_stage_is_zero() {
        let staging = ThreadCallStaging::new();
        assert_eq!(staging.take(Tid(7), AllocKind::Reallocate), 0);
    }

    #[test]
    fn test_take_consumes() {
        let staging = ThreadCallStaging::new();
        staging.stage(Tid(1), AllocKind::Allocate, 64);
        let _ = staging.take(Tid(1), AllocKind::Allocate);
        assert_eq!(staging.take(Tid(1), AllocKind::Allocate), 0);
    }

    #[test]
    fn test_double_entry_last_writer_wins() {
        let staging = ThreadCallStaging::new();
        staging.stage(Tid(1), AllocKind::Allocate, 64);
        staging.stage(Tid(1), AllocKind::Allocate, 128);
        assert_eq!(staging.take(Tid(1), AllocKind::Allocate), 128);
    }

    #[test]
    fn test_threads_and_kinds_do_not_interfere() {
        let staging = ThreadCallStaging::new();
        staging.stage(Tid(1), AllocKind::Allocate, 64);
        staging.stage(Tid(2), AllocKind::Allocate, 96);
        staging.stage(Tid(1), AllocKind::VirtualReserve, 0x1000);

        assert_eq!(staging.take(Tid(2), AllocKind::Allocate), 96);
        assert_eq!(staging.take(Tid(1), AllocKind::VirtualReserve), 0x1000);
        assert_eq!(staging.take(Tid(1), AllocKind::Allocate), 64);
    }
}
