// Tue Jan 13 2026 - Alex

use crate::memory::Address;
use serde::Serialize;
use std::fmt;

/// Half-open address interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct MemoryRange {
    start: Address,
    end: Address,
}

impl MemoryRange {
    pub fn new(start: Address, end: Address) -> Self {
        Self { start, end: end.max(start) }
    }

    pub fn from_start_size(start: Address, size: u64) -> Self {
        Self::new(start, start + size)
    }

    pub fn start(&self) -> Address {
        self.start
    }

    pub fn end(&self) -> Address {
        self.end
    }

    pub fn size(&self) -> u64 {
        self.end.as_u64() - self.start.as_u64()
    }

    pub fn contains(&self, addr: Address) -> bool {
        addr >= self.start && addr < self.end
    }

    /// True when `len` bytes starting at `addr` fit inside the range.
    pub fn contains_span(&self, addr: Address, len: u64) -> bool {
        match addr.checked_add(len) {
            Some(end) => addr >= self.start && end <= self.end,
            None => false,
        }
    }

    pub fn overlaps(&self, other: &Self) -> bool {
        self.start < other.end && self.end > other.start
    }

    pub fn intersects(&self, other: &Self) -> Option<Self> {
        let start = self.start.max(other.start);
        let end = self.end.min(other.end);
        if start < end {
            Some(Self::new(start, end))
        } else {
            None
        }
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }
}

impl fmt::Display for MemoryRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains_span() {
        let range = MemoryRange::from_start_size(Address::new(0x1000), 0x10);
        assert!(range.contains_span(Address::new(0x1008), 8));
        assert!(!range.contains_span(Address::new(0x100C), 8));
        assert!(!range.contains_span(Address::new(u64::MAX - 2), 8));
    }

    #[test]
    fn test_intersects() {
        let a = MemoryRange::from_start_size(Address::new(0x1000), 0x100);
        let b = MemoryRange::from_start_size(Address::new(0x1080), 0x100);
        let both = a.intersects(&b).unwrap();
        assert_eq!(both.start(), Address::new(0x1080));
        assert_eq!(both.end(), Address::new(0x1100));
        assert!(a.overlaps(&b));
    }
}
