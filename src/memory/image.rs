// Tue Jan 13 2026 - Alex

use crate::memory::{
    AddressSpace, AnnotationSink, Address, ItemKind, MemoryError, PointerWidth, Segment,
};
use crate::rtti::layout::RecordKind;
use ahash::{AHashMap, AHashSet};

struct LoadedSegment {
    segment: Segment,
    bytes: Vec<u8>,
}

#[derive(Debug, Clone, Default)]
struct CommentSlots {
    regular: Option<String>,
    repeatable: Option<String>,
}

/// Owned image bytes plus the annotation state a disassembler database
/// would normally hold.
#[derive(Default)]
pub struct ImageDatabase {
    segments: Vec<Segment>,
    loaded: Vec<LoadedSegment>,
    names: AHashMap<Address, String>,
    name_owners: AHashMap<String, Address>,
    comments: AHashMap<Address, CommentSlots>,
    leading: AHashMap<Address, Vec<String>>,
    items: AHashMap<Address, ItemKind>,
    structures: AHashMap<Address, RecordKind>,
    xrefs: AHashSet<Address>,
}

impl ImageDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a segment; `bytes` shorter than the segment leaves the tail unloaded.
    pub fn add_segment(&mut self, segment: Segment, mut bytes: Vec<u8>) {
        let loaded_len = segment.file_size().min(bytes.len() as u64) as usize;
        bytes.truncate(loaded_len);
        self.segments.push(segment.clone());
        self.loaded.push(LoadedSegment { segment, bytes });
        self.segments.sort_by_key(|s| s.start());
        self.loaded.sort_by_key(|s| s.segment.start());
    }

    pub fn add_xref(&mut self, target: Address) {
        self.xrefs.insert(target);
    }

    pub fn name_at(&self, addr: Address) -> Option<&str> {
        self.names.get(&addr).map(String::as_str)
    }

    pub fn address_of(&self, name: &str) -> Option<Address> {
        self.name_owners.get(name).copied()
    }

    pub fn comment_at(&self, addr: Address) -> Option<&str> {
        let slots = self.comments.get(&addr)?;
        slots.regular.as_deref().or(slots.repeatable.as_deref())
    }

    pub fn repeatable_comment_at(&self, addr: Address) -> Option<&str> {
        self.comments.get(&addr)?.repeatable.as_deref()
    }

    pub fn leading_comments(&self, addr: Address) -> &[String] {
        self.leading.get(&addr).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn structure_at(&self, addr: Address) -> Option<RecordKind> {
        self.structures.get(&addr).copied()
    }

    pub fn named_count(&self) -> usize {
        self.names.len()
    }

    fn slice(&self, addr: Address, len: usize) -> Result<&[u8], MemoryError> {
        let loaded = self
            .loaded
            .iter()
            .find(|s| s.segment.contains(addr))
            .ok_or(MemoryError::OutOfBounds(addr.as_u64()))?;
        let offset = (addr.as_u64() - loaded.segment.start().as_u64()) as usize;
        match offset.checked_add(len) {
            Some(end) if end <= loaded.bytes.len() => Ok(&loaded.bytes[offset..end]),
            _ => Err(MemoryError::NotLoaded(addr.as_u64())),
        }
    }
}

impl AddressSpace for ImageDatabase {
    fn read_u8(&self, addr: Address) -> Result<u8, MemoryError> {
        Ok(self.slice(addr, 1)?[0])
    }

    fn read_u32(&self, addr: Address) -> Result<u32, MemoryError> {
        let bytes = self.slice(addr, 4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn read_u64(&self, addr: Address) -> Result<u64, MemoryError> {
        let bytes = self.slice(addr, 8)?;
        let mut buf = [0u8; 8];
        buf.copy_from_slice(bytes);
        Ok(u64::from_le_bytes(buf))
    }

    fn segments(&self) -> &[Segment] {
        &self.segments
    }

    fn item_kind(&self, addr: Address) -> ItemKind {
        self.items.get(&addr).copied().unwrap_or(ItemKind::Unknown)
    }

    fn has_xref(&self, addr: Address) -> bool {
        self.xrefs.contains(&addr)
    }

    fn has_name(&self, addr: Address) -> bool {
        self.names.contains_key(&addr)
    }
}

impl AnnotationSink for ImageDatabase {
    fn declare_structure(&mut self, addr: Address, kind: RecordKind, width: PointerWidth) -> bool {
        if self.slice(addr, kind.size(width) as usize).is_err() {
            return false;
        }
        self.structures.insert(addr, kind);
        self.items.insert(addr, ItemKind::Data);
        true
    }

    fn set_name(&mut self, addr: Address, name: &str) -> bool {
        if name.is_empty() {
            return false;
        }
        match self.name_owners.get(name) {
            Some(owner) if *owner != addr => return false,
            Some(_) => return true,
            None => {}
        }
        if let Some(old) = self.names.insert(addr, name.to_string()) {
            self.name_owners.remove(&old);
        }
        self.name_owners.insert(name.to_string(), addr);
        true
    }

    fn set_comment(&mut self, addr: Address, text: &str, repeatable: bool) {
        let slots = self.comments.entry(addr).or_default();
        if repeatable {
            slots.repeatable = Some(text.to_string());
        } else {
            slots.regular = Some(text.to_string());
        }
    }

    fn has_comment(&self, addr: Address) -> bool {
        self.comments
            .get(&addr)
            .map_or(false, |s| s.regular.is_some() || s.repeatable.is_some())
    }

    fn set_leading_comment(&mut self, addr: Address, text: &str) {
        self.leading.entry(addr).or_default().push(text.to_string());
    }

    fn has_leading_comment(&self, addr: Address) -> bool {
        self.leading.get(&addr).map_or(false, |lines| !lines.is_empty())
    }

    fn clear_leading_comments(&mut self, addr: Address) {
        self.leading.remove(&addr);
    }

    fn make_pointer(&mut self, addr: Address, width: PointerWidth) {
        self.items.insert(addr, ItemKind::Pointer(width));
    }

    fn make_dword(&mut self, addr: Address) {
        self.items.insert(addr, ItemKind::Dword);
    }

    fn make_string(&mut self, addr: Address, _len: usize) {
        self.items.insert(addr, ItemKind::String);
    }

    fn make_code(&mut self, addr: Address) -> bool {
        if !self.is_loaded(addr) || self.item_kind(addr) == ItemKind::Code {
            return false;
        }
        self.items.insert(addr, ItemKind::Code);
        true
    }
}
