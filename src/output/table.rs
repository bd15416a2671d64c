// Thu Jan 15 2026 - Alex

use crate::memory::Address;
use bitflags::bitflags;

/// Size of one persisted row: pointer, three u16 fields, then the text.
pub const RECORD_CAPACITY: usize = 1024;
pub const RECORD_HEADER: usize = 8 + 3 * 2;
/// Text bytes available per row, excluding the terminating NUL.
pub const TEXT_CAPACITY: usize = RECORD_CAPACITY - RECORD_HEADER - 1;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct RowFlags: u16 {
        const MULTIPLE_INHERITANCE = 0x0001;
        const VIRTUAL_INHERITANCE = 0x0002;
        const AMBIGUOUS = 0x0004;
        const TOP_LEVEL = 0x8000;
    }
}

impl RowFlags {
    pub fn from_hierarchy_attributes(attributes: u32, top_level: bool) -> Self {
        let mut flags = Self::from_bits_retain((attributes & 0xF) as u16);
        if top_level {
            flags |= Self::TOP_LEVEL;
        }
        flags
    }

    pub fn is_top_level(self) -> bool {
        self.contains(Self::TOP_LEVEL)
    }

    pub fn labels(self) -> Vec<&'static str> {
        let mut labels = Vec::new();
        if self.contains(Self::MULTIPLE_INHERITANCE) {
            labels.push("MI");
        }
        if self.contains(Self::VIRTUAL_INHERITANCE) {
            labels.push("VI");
        }
        if self.contains(Self::AMBIGUOUS) {
            labels.push("AMBIGUOUS");
        }
        if self.contains(Self::TOP_LEVEL) {
            labels.push("TOP_LEVEL");
        }
        labels
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultRow {
    pub vftable: Address,
    pub method_count: u16,
    pub flags: RowFlags,
    text: String,
}

impl ResultRow {
    pub fn new(vftable: Address, method_count: usize, flags: RowFlags, label: &str, hierarchy: &str) -> Self {
        let mut text = format!("{}@{}", label, hierarchy);
        if text.len() > TEXT_CAPACITY {
            let mut cut = TEXT_CAPACITY;
            while !text.is_char_boundary(cut) {
                cut -= 1;
            }
            text.truncate(cut);
        }
        Self {
            vftable,
            method_count: method_count.min(u16::MAX as usize) as u16,
            flags,
            text,
        }
    }

    /// Stored text including its terminator, as the record's size field holds it.
    pub fn stored_size(&self) -> u16 {
        (self.text.len() + 1) as u16
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Splits the stored text into `(label, hierarchy)`; `None` marks an
    /// overflowed record whose separator was truncated away.
    pub fn decode(&self) -> Option<(&str, &str)> {
        self.text.split_once('@')
    }

    pub fn is_top_level(&self) -> bool {
        self.flags.is_top_level()
    }
}

/// Append-only row store; the index returned by `append` identifies a row.
pub trait ResultStore {
    fn append(&mut self, row: ResultRow) -> usize;

    fn count(&self) -> usize;

    fn get(&self, index: usize) -> Option<&ResultRow>;
}

#[derive(Debug, Clone, Default)]
pub struct ResultTable {
    rows: Vec<ResultRow>,
}

impl ResultTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rows(&self) -> &[ResultRow] {
        &self.rows
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResultRow> {
        self.rows.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl ResultStore for ResultTable {
    fn append(&mut self, row: ResultRow) -> usize {
        self.rows.push(row);
        self.rows.len() - 1
    }

    fn count(&self) -> usize {
        self.rows.len()
    }

    fn get(&self, index: usize) -> Option<&ResultRow> {
        self.rows.get(index)
    }
}
