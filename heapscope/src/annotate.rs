//! Address-to-label resolution
//!
//! The same resolution logic serves two consumers: caller attribution on
//! every committed operation line, and register annotation in fault
//! reports. Keeping one implementation means a crash report and the event
//! log never disagree about what an address is.

use crate::domain::Addr;
use crate::index::ModuleIndex;
use crate::oplog::OperationLog;

/// Resolves an address to a short human-meaningful label.
///
/// Resolution order, first rule that applies wins:
/// 1. the null address has no label;
/// 2. an address inside a registered module resolves to `"(<module>)"`;
/// 3. otherwise every recorded operation whose chunk interval contains the
///    address contributes `"<kind>(0x<size>) "`, in log order;
/// 4. no match, no label.
///
/// Step 3 scans the full operation history, frees included, rather than
/// only live chunks. At crash time "this used to be a freed 0x40 chunk" is
/// the interesting answer.
pub struct AddressAnnotator<'a> {
    modules: &'a ModuleIndex,
    history: &'a OperationLog,
}

impl<'a> AddressAnnotator<'a> {
    #[must_use]
    pub fn new(modules: &'a ModuleIndex, history: &'a OperationLog) -> Self {
        AddressAnnotator { modules, history }
    }

    /// Label for `addr`; empty when nothing is known about it.
    #[must_use]
    pub fn describe(&self, addr: Addr) -> String {
        if addr.is_null() {
            return String::new();
        }
        if let Some(name) = self.modules.resolve(addr) {
            return format!("({name})");
        }
        let mut label = String::new();
        for (kind, size) in self.history.overlapping(addr) {
            label.push_str(&format!("{kind}({size:#x}) "));
        }
        label
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Pid;
    use crate::oplog::{HeapOperation, OpKind};

    fn commit(log: &OperationLog, kind: OpKind, start: u64, size: u64) {
        log.commit(
            HeapOperation {
                kind,
                chunk_start: Addr(start),
                chunk_size: size,
                chunk_end: Addr(start).offset(size),
                caller: Addr(0x40_1000),
                caller_module: String::new(),
                timestamp: None,
                pid: Pid(1),
            },
            |_| {},
        );
    }

    #[test]
    fn test_null_address_has_no_label() {
        let modules = ModuleIndex::new();
        let history = OperationLog::new();
        let annotator = AddressAnnotator::new(&modules, &history);
        assert_eq!(annotator.describe(Addr(0)), "");
    }

    #[test]
    fn test_module_wins_over_chunk_overlap() {
        let modules = ModuleIndex::new();
        modules.register("app.exe", Addr(0x40_0000), Addr(0x45_0000));
        let history = OperationLog::new();
        // chunk interval covering the same address as the module
        commit(&history, OpKind::Allocate, 0x40_0800, 0x1000);

        let annotator = AddressAnnotator::new(&modules, &history);
        assert_eq!(annotator.describe(Addr(0x40_1000)), "(app.exe)");
    }

    #[test]
    fn test_overlapping_history_is_concatenated_in_log_order() {
        let modules = ModuleIndex::new();
        let history = OperationLog::new();
        commit(&history, OpKind::Allocate, 0x1_0000, 0x40);
        commit(&history, OpKind::Free, 0x1_0000, 0x40);
        commit(&history, OpKind::Reallocate, 0x1_0020, 0x100);

        let annotator = AddressAnnotator::new(&modules, &history);
        assert_eq!(
            annotator.describe(Addr(0x1_0020)),
            "alloc(0x40) free(0x40) realloc(0x100) "
        );
    }

    #[test]
    fn test_unknown_address_has_no_label() {
        let modules = ModuleIndex::new();
        let history = OperationLog::new();
        commit(&history, OpKind::Allocate, 0x1_0000, 0x40);

        let annotator = AddressAnnotator::new(&modules, &history);
        assert_eq!(annotator.describe(Addr(0xdead_0000)), "");
    }
}
