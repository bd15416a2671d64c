// Tue Jan 13 2026 - Alex

use crate::memory::{Address, MemoryError, PointerWidth, Segment};
use crate::rtti::layout::RecordKind;

/// How the host currently classifies the item starting at an address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemKind {
    Code,
    Pointer(PointerWidth),
    Dword,
    String,
    Data,
    Unknown,
}

/// Read-only view of a loaded image.
pub trait AddressSpace {
    fn read_u8(&self, addr: Address) -> Result<u8, MemoryError>;

    fn read_u32(&self, addr: Address) -> Result<u32, MemoryError>;

    fn read_u64(&self, addr: Address) -> Result<u64, MemoryError>;

    fn read_ptr(&self, addr: Address, width: PointerWidth) -> Result<Address, MemoryError> {
        match width {
            PointerWidth::Bits32 => self.read_u32(addr).map(|v| Address::new(v as u64)),
            PointerWidth::Bits64 => self.read_u64(addr).map(Address::new),
        }
    }

    fn read_i32(&self, addr: Address) -> Result<i32, MemoryError> {
        self.read_u32(addr).map(|v| v as i32)
    }

    /// Reads a NUL-terminated ASCII string of at most `max_len` bytes.
    fn read_c_string(&self, addr: Address, max_len: usize) -> Result<String, MemoryError> {
        let mut bytes = Vec::new();
        for i in 0..max_len as u64 {
            let byte = self.read_u8(addr + i)?;
            if byte == 0 {
                return String::from_utf8(bytes)
                    .map_err(|_| MemoryError::InvalidString(addr.as_u64()));
            }
            bytes.push(byte);
        }
        Err(MemoryError::UnterminatedString(addr.as_u64()))
    }

    fn is_loaded(&self, addr: Address) -> bool {
        self.read_u8(addr).is_ok()
    }

    fn segments(&self) -> &[Segment];

    fn segment_at(&self, addr: Address) -> Option<&Segment> {
        self.segments().iter().find(|s| s.contains(addr))
    }

    fn item_kind(&self, addr: Address) -> ItemKind;

    fn has_xref(&self, addr: Address) -> bool;

    fn has_name(&self, addr: Address) -> bool;
}

/// Mutations a host accepts while the scan annotates an image.
pub trait AnnotationSink {
    /// Places a whole record; returns false when the host refuses it.
    fn declare_structure(&mut self, addr: Address, kind: RecordKind, width: PointerWidth) -> bool;

    /// Returns false when the name is rejected or already bound elsewhere.
    fn set_name(&mut self, addr: Address, name: &str) -> bool;

    fn set_comment(&mut self, addr: Address, text: &str, repeatable: bool);

    fn has_comment(&self, addr: Address) -> bool;

    fn set_leading_comment(&mut self, addr: Address, text: &str);

    fn has_leading_comment(&self, addr: Address) -> bool;

    fn clear_leading_comments(&mut self, addr: Address);

    fn make_pointer(&mut self, addr: Address, width: PointerWidth);

    fn make_dword(&mut self, addr: Address);

    fn make_string(&mut self, addr: Address, len: usize);

    /// Returns true when the location was newly classified as code.
    fn make_code(&mut self, addr: Address) -> bool;
}

/// Anything the scan engine can both read and annotate.
pub trait Database: AddressSpace + AnnotationSink {}

impl<T: AddressSpace + AnnotationSink> Database for T {}
