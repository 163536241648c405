//! Loaded-module index for caller attribution
//!
//! Modules are registered as the platform announces image loads and are
//! never removed (unload is not tracked). Lookup is a linear scan over the
//! registered ranges, which stays cheap because module counts are in the
//! tens while lookups ride the allocation path.

use std::sync::RwLock;

use crate::domain::Addr;

/// Address range of one loaded module
///
/// Bounds are inclusive on both ends, matching how the instrumentation
/// platform reports image limits.
#[derive(Debug, Clone)]
pub struct ModuleRecord {
    pub name: String,
    pub base: Addr,
    pub end: Addr,
}

impl ModuleRecord {
    /// Check if an address falls within this module's range
    #[must_use]
    pub fn contains(&self, addr: Addr) -> bool {
        addr >= self.base && addr <= self.end
    }
}

/// Registration-ordered collection of loaded-module ranges.
///
/// Registration happens on image load, lookups on every committed
/// operation and every fault register; a reader/writer lock keeps the
/// frequent read path concurrent.
#[derive(Debug, Default)]
pub struct ModuleIndex {
    modules: RwLock<Vec<ModuleRecord>>,
}

impl ModuleIndex {
    #[must_use]
    pub fn new() -> Self {
        ModuleIndex::default()
    }

    /// Append a module range. Duplicate registrations are kept as-is; the
    /// first registration wins at lookup time.
    pub fn register(&self, name: &str, base: Addr, end: Addr) {
        let mut modules = self.modules.write().unwrap();
        modules.push(ModuleRecord { name: name.to_string(), base, end });
    }

    /// Name of the first registered module whose range contains `addr`.
    #[must_use]
    pub fn resolve(&self, addr: Addr) -> Option<String> {
        let modules = self.modules.read().unwrap();
        modules.iter().find(|m| m.contains(addr)).map(|m| m.name.clone())
    }

    /// Number of registered ranges (duplicates included).
    #[must_use]
    pub fn len(&self) -> usize {
        self.modules.read().unwrap().len()
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
    fn test_record_bounds_are_inclusive() {
        let record = ModuleRecord {
            name: "app.exe".to_string(),
            base: Addr(0x40_0000),
            end: Addr(0x45_0000),
        };

        assert!(record.contains(Addr(0x40_0000)));
        assert!(record.contains(Addr(0x42_1234)));
        assert!(record.contains(Addr(0x45_0000)));
        assert!(!record.contains(Addr(0x3F_FFFF)));
        assert!(!record.contains(Addr(0x45_0001)));
    }

    #[test]
    fn test_resolve_hits_and_misses() {
        let index = ModuleIndex::new();
        index.register("app.exe", Addr(0x40_0000), Addr(0x45_0000));
        index.register("ntdll.dll", Addr(0x7700_0000), Addr(0x7710_0000));

        assert_eq!(index.resolve(Addr(0x40_1000)).as_deref(), Some("app.exe"));
        assert_eq!(index.resolve(Addr(0x7705_0000)).as_deref(), Some("ntdll.dll"));
        assert_eq!(index.resolve(Addr(0x10_0000)), None);
    }

    #[test]
    fn test_duplicate_registration_first_wins() {
        let index = ModuleIndex::new();
        index.register("first.dll", Addr(0x1000), Addr(0x2000));
        index.register("second.dll", Addr(0x1000), Addr(0x2000));

        assert_eq!(index.len(), 2);
        assert_eq!(index.resolve(Addr(0x1500)).as_deref(), Some("first.dll"));
    }
}
