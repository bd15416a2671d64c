// Tue Jan 13 2026 - Alex

use crate::memory::{Address, MemoryRange, Protection};
use serde::Serialize;
use std::fmt;

/// Coarse classification a host assigns to a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SegmentKind {
    Code,
    Data,
    Other,
}

impl SegmentKind {
    pub fn from_protection(protection: Protection) -> Self {
        if protection.can_execute() {
            Self::Code
        } else if protection.can_read() {
            Self::Data
        } else {
            Self::Other
        }
    }
}

impl fmt::Display for SegmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Code => write!(f, "CODE"),
            Self::Data => write!(f, "DATA"),
            Self::Other => write!(f, "OTHER"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Segment {
    range: MemoryRange,
    protection: Protection,
    kind: SegmentKind,
    name: String,
    file_size: u64,
}

impl Segment {
    pub fn new(range: MemoryRange, protection: Protection, name: String) -> Self {
        Self {
            range,
            protection,
            kind: SegmentKind::from_protection(protection),
            name,
            file_size: range.size(),
        }
    }

    /// Overrides the protection-derived classification.
    pub fn with_kind(mut self, kind: SegmentKind) -> Self {
        self.kind = kind;
        self
    }

    /// Bytes past `file_size` are reserved but not loaded.
    pub fn with_file_size(mut self, size: u64) -> Self {
        self.file_size = size.min(self.range.size());
        self
    }

    pub fn range(&self) -> &MemoryRange {
        &self.range
    }

    pub fn protection(&self) -> Protection {
        self.protection
    }

    pub fn kind(&self) -> SegmentKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    pub fn start(&self) -> Address {
        self.range.start()
    }

    pub fn end(&self) -> Address {
        self.range.end()
    }

    pub fn size(&self) -> u64 {
        self.range.size()
    }

    pub fn contains(&self, addr: Address) -> bool {
        self.range.contains(addr)
    }

    pub fn is_code(&self) -> bool {
        self.kind == SegmentKind::Code
    }

    pub fn is_data(&self) -> bool {
        self.kind == SegmentKind::Data
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:<10} {} {} {}", self.name, self.range, self.protection, self.kind)
    }
}
