//! Live-chunk registry: allocation base address to last recorded size
//!
//! Frees only carry an address, so the size reported on a free line has to
//! come from here. The registry keeps only the most recent size per base
//! address; it is consulted, not policed, and detects neither double frees
//! nor use-after-free on its own.

use std::collections::BTreeMap;
use std::sync::Mutex;

use crate::domain::Addr;

#[derive(Debug, Default)]
pub struct ChunkRegistry {
    chunks: Mutex<BTreeMap<Addr, u64>>,
}

impl ChunkRegistry {
    #[must_use]
    pub fn new() -> Self {
        ChunkRegistry::default()
    }

    /// Unconditional upsert of the size for a base address.
    pub fn record(&self, addr: Addr, size: u64) {
        let mut chunks = self.chunks.lock().unwrap();
        chunks.insert(addr, size);
    }

    /// Last recorded size for `addr`, or 0 when the address was never seen
    /// allocated (e.g. the chunk predates tracing).
    #[must_use]
    pub fn size_of(&self, addr: Addr) -> u64 {
        let chunks = self.chunks.lock().unwrap();
        chunks.get(&addr).copied().unwrap_or(0)
    }

    /// Drop the entry for `addr`. No-op when unknown.
    pub fn forget(&self, addr: Addr) {
        let mut chunks = self.chunks.lock().unwrap();
        chunks.remove(&addr);
    }

    /// Number of currently tracked chunks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.chunks.lock().unwrap().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_then_size_of() {
        let registry = ChunkRegistry::new();
        registry.record(Addr(0x1_0000), 64);
        assert_eq!(registry.size_of(Addr(0x1_0000)), 64);
    }

    #[test]
    fn test_unknown_address_reports_zero() {
        let registry = ChunkRegistry::new();
        assert_eq!(registry.size_of(Addr(0xdead_beef)), 0);
    }

    #[test]
    fn test_record_overwrites() {
        let registry = ChunkRegistry::new();
        registry.record(Addr(0x1_0000), 64);
        registry.record(Addr(0x1_0000), 128);
        assert_eq!(registry.size_of(Addr(0x1_0000)), 128);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_forget_clears_and_tolerates_unknown() {
        let registry = ChunkRegistry::new();
        registry.record(Addr(0x1_0000), 64);
        registry.forget(Addr(0x1_0000));
        assert_eq!(registry.size_of(Addr(0x1_0000)), 0);

        // unknown address: silently ignored
        registry.forget(Addr(0x2_0000));
        assert!(registry.is_empty());
    }
}
