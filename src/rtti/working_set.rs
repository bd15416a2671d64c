// Wed Jan 14 2026 - Alex

use crate::memory::{Address, AddressSpace};
use ahash::{AHashMap, AHashSet};
use serde::Serialize;

/// Per-session memo of records already handled plus a string cache.
#[derive(Debug, Default)]
pub struct WorkingSet {
    type_descriptors: AHashSet<Address>,
    hierarchies: AHashSet<Address>,
    base_classes: AHashSet<Address>,
    bound_vftables: AHashSet<Address>,
    strings: AHashMap<Address, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct WorkingSetStats {
    pub type_descriptors: usize,
    pub hierarchies: usize,
    pub base_classes: usize,
    pub vftables: usize,
    pub strings: usize,
}

impl WorkingSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_type_descriptor(&self, addr: Address) -> bool {
        self.type_descriptors.contains(&addr)
    }

    /// Returns true on first insertion.
    pub fn insert_type_descriptor(&mut self, addr: Address) -> bool {
        self.type_descriptors.insert(addr)
    }

    pub fn has_hierarchy(&self, addr: Address) -> bool {
        self.hierarchies.contains(&addr)
    }

    pub fn insert_hierarchy(&mut self, addr: Address) -> bool {
        self.hierarchies.insert(addr)
    }

    pub fn has_base_class(&self, addr: Address) -> bool {
        self.base_classes.contains(&addr)
    }

    pub fn insert_base_class(&mut self, addr: Address) -> bool {
        self.base_classes.insert(addr)
    }

    pub fn is_vftable_bound(&self, addr: Address) -> bool {
        self.bound_vftables.contains(&addr)
    }

    pub fn mark_vftable_bound(&mut self, addr: Address) -> bool {
        self.bound_vftables.insert(addr)
    }

    /// Reads a C string once and serves later lookups from the cache.
    pub fn string_at<S: AddressSpace + ?Sized>(
        &mut self,
        space: &S,
        addr: Address,
        max_len: usize,
    ) -> Option<String> {
        if let Some(cached) = self.strings.get(&addr) {
            return Some(cached.clone());
        }
        let value = space.read_c_string(addr, max_len).ok()?;
        self.strings.insert(addr, value.clone());
        Some(value)
    }

    pub fn stats(&self) -> WorkingSetStats {
        WorkingSetStats {
            type_descriptors: self.type_descriptors.len(),
            hierarchies: self.hierarchies.len(),
            base_classes: self.base_classes.len(),
            vftables: self.bound_vftables.len(),
            strings: self.strings.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.stats() == WorkingSetStats::default()
    }

    pub fn clear(&mut self) {
        self.type_descriptors.clear();
        self.hierarchies.clear();
        self.base_classes.clear();
        self.bound_vftables.clear();
        self.strings.clear();
    }
}
