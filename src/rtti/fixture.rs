// Wed Jan 14 2026 - Alex

//! Lays out RTTI record graphs in memory so scans can run without binaries.

use crate::memory::{Address, ImageDatabase, MemoryRange, PointerWidth, Protection, Segment};
use crate::rtti::addressing::AddressingMode;
use crate::rtti::layout::*;

pub const IMAGE_BASE_32: u64 = 0x0040_0000;
pub const IMAGE_BASE_64: u64 = 0x1_4000_0000;
const CODE_OFFSET: u64 = 0x1000;
const CODE_SIZE: u64 = 0x4000;
const DATA_OFFSET: u64 = 0x10000;

pub struct RttiImage {
    width: PointerWidth,
    base: Address,
    data_start: Address,
    data: Vec<u8>,
    next_method: u64,
}

impl RttiImage {
    pub fn new(width: PointerWidth) -> Self {
        let base = Address::new(match width {
            PointerWidth::Bits32 => IMAGE_BASE_32,
            PointerWidth::Bits64 => IMAGE_BASE_64,
        });
        let mut image = Self {
            width,
            base,
            data_start: base + DATA_OFFSET,
            data: Vec::new(),
            next_method: 0,
        };
        // Stand-in for `type_info::vftable`, referenced by every descriptor.
        image.alloc(0x10, 0x10);
        image
    }

    pub fn width(&self) -> PointerWidth {
        self.width
    }

    pub fn mode(&self) -> AddressingMode {
        AddressingMode::for_width(self.width)
    }

    pub fn code_start(&self) -> Address {
        self.base + CODE_OFFSET
    }

    pub fn data_end(&self) -> Address {
        self.data_start + self.data.len() as u64
    }

    pub fn alloc(&mut self, size: u64, align: u64) -> Address {
        while self.data.len() as u64 % align != 0 {
            self.data.push(0);
        }
        let addr = self.data_end();
        self.data.resize(self.data.len() + size as usize, 0);
        addr
    }

    fn offset_of(&self, addr: Address) -> usize {
        (addr.as_u64() - self.data_start.as_u64()) as usize
    }

    pub fn put_bytes(&mut self, addr: Address, bytes: &[u8]) {
        let offset = self.offset_of(addr);
        if self.data.len() < offset + bytes.len() {
            self.data.resize(offset + bytes.len(), 0);
        }
        self.data[offset..offset + bytes.len()].copy_from_slice(bytes);
    }

    pub fn put_u32(&mut self, addr: Address, value: u32) {
        self.put_bytes(addr, &value.to_le_bytes());
    }

    pub fn put_ptr(&mut self, addr: Address, value: u64) {
        match self.width {
            PointerWidth::Bits32 => self.put_u32(addr, value as u32),
            PointerWidth::Bits64 => self.put_bytes(addr, &value.to_le_bytes()),
        }
    }

    /// Writes a 32-bit reference using the image's addressing convention.
    pub fn put_ref(&mut self, addr: Address, target: Address) {
        let raw = match self.mode() {
            AddressingMode::Absolute32 => target.as_u64() as u32,
            AddressingMode::ImageRelative64 => (target.as_u64() - self.base.as_u64()) as u32,
        };
        self.put_u32(addr, raw);
    }

    pub fn next_code_address(&mut self) -> Address {
        let addr = self.code_start() + self.next_method * 0x10;
        self.next_method += 1;
        addr
    }

    pub fn type_descriptor(&mut self, name: &str) -> Address {
        let ptr = self.width.bytes();
        let td = self.alloc(2 * ptr + name.len() as u64 + 1, ptr);
        let type_info_vftable = self.data_start.as_u64();
        self.put_ptr(td, type_info_vftable);
        self.put_bytes(td + 2 * ptr, name.as_bytes());
        td
    }

    pub fn base_class(
        &mut self,
        td: Address,
        contained: u32,
        pmd: Pmd,
        attributes: u32,
        hierarchy: Option<Address>,
    ) -> Address {
        let bcd = self.alloc(0x1C, 4);
        self.put_ref(bcd + BCD_TYPE_DESCRIPTOR, td);
        self.put_u32(bcd + BCD_CONTAINED_BASES, contained);
        self.put_u32(bcd + BCD_PMD, pmd.mdisp as u32);
        self.put_u32(bcd + BCD_PMD + 4, pmd.pdisp as u32);
        self.put_u32(bcd + BCD_PMD + 8, pmd.vdisp as u32);
        let mut attributes = attributes;
        if let Some(chd) = hierarchy {
            attributes |= BcdAttributes::HAS_HIERARCHY_DESCRIPTOR.bits();
            self.put_ref(bcd + BCD_HIERARCHY, chd);
        }
        self.put_u32(bcd + BCD_ATTRIBUTES, attributes);
        bcd
    }

    pub fn hierarchy(&mut self, attributes: u32, bases: &[Address]) -> Address {
        let array = self.alloc(4 * bases.len().max(1) as u64, 4);
        for (i, bcd) in bases.iter().enumerate() {
            self.put_ref(array + 4 * i as u64, *bcd);
        }
        let chd = self.alloc(0x10, 4);
        self.put_u32(chd + CHD_ATTRIBUTES, attributes);
        self.put_u32(chd + CHD_BASE_COUNT, bases.len() as u32);
        self.put_ref(chd + CHD_BASE_ARRAY, array);
        chd
    }

    pub fn locator(&mut self, offset: u32, td: Address, chd: Address) -> Address {
        let size = RecordKind::CompleteObjectLocator.size(self.width);
        let col = self.alloc(size, 8);
        self.put_u32(col + COL_SIGNATURE, self.mode().col_signature());
        self.put_u32(col + COL_OFFSET, offset);
        self.put_ref(col + COL_TYPE_DESCRIPTOR, td);
        self.put_ref(col + COL_CLASS_DESCRIPTOR, chd);
        if self.width == PointerWidth::Bits64 {
            self.put_u32(col + COL_OBJECT_BASE, (col.as_u64() - self.base.as_u64()) as u32);
        }
        col
    }

    /// A class with no bases; returns its locator.
    pub fn simple_class(&mut self, name: &str) -> Address {
        let td = self.type_descriptor(name);
        let bcd = self.base_class(td, 0, Pmd::default(), 0, None);
        let chd = self.hierarchy(0, &[bcd]);
        self.locator(0, td, chd)
    }

    /// Emits `[col][m0]..[mN][0]` and returns the address of `m0`.
    pub fn vftable(&mut self, col: Address, methods: usize) -> Address {
        let ptr = self.width.bytes();
        let cell = self.alloc((methods as u64 + 2) * ptr, ptr);
        self.put_ptr(cell, col.as_u64());
        for i in 0..methods {
            let target = self.next_code_address();
            self.put_ptr(cell + (i as u64 + 1) * ptr, target.as_u64());
        }
        cell + ptr
    }

    pub fn database(&self) -> ImageDatabase {
        let mut db = ImageDatabase::new();
        let code = MemoryRange::from_start_size(self.code_start(), CODE_SIZE);
        db.add_segment(
            Segment::new(code, Protection::ReadExecute, ".text".to_string()),
            vec![0xCC; CODE_SIZE as usize],
        );
        let len = (self.data.len() as u64 + 0xF) & !0xF;
        let mut bytes = self.data.clone();
        bytes.resize(len as usize, 0);
        let data = MemoryRange::from_start_size(self.data_start, len);
        db.add_segment(Segment::new(data, Protection::Read, ".rdata".to_string()), bytes);
        db
    }
}
