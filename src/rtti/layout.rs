// Wed Jan 14 2026 - Alex

use crate::memory::{Address, AddressSpace, MemoryError, PointerWidth};
use crate::rtti::addressing::{Addressing, AddressingMode};
use bitflags::bitflags;
use serde::Serialize;
use std::fmt;

pub const COL_SIGNATURE: u64 = 0x00;
pub const COL_OFFSET: u64 = 0x04;
pub const COL_CD_OFFSET: u64 = 0x08;
pub const COL_TYPE_DESCRIPTOR: u64 = 0x0C;
pub const COL_CLASS_DESCRIPTOR: u64 = 0x10;
pub const COL_OBJECT_BASE: u64 = 0x14;

pub const CHD_SIGNATURE: u64 = 0x00;
pub const CHD_ATTRIBUTES: u64 = 0x04;
pub const CHD_BASE_COUNT: u64 = 0x08;
pub const CHD_BASE_ARRAY: u64 = 0x0C;

pub const BCD_TYPE_DESCRIPTOR: u64 = 0x00;
pub const BCD_CONTAINED_BASES: u64 = 0x04;
pub const BCD_PMD: u64 = 0x08;
pub const BCD_ATTRIBUTES: u64 = 0x14;
pub const BCD_HIERARCHY: u64 = 0x18;

/// Base class array cells are 32-bit in every addressing mode.
pub const BASE_ARRAY_STRIDE: u64 = 4;

/// Upper bound on base class entries walked per hierarchy.
pub const MAX_BASE_CLASSES: u32 = 0x1000;

pub const MAX_TYPE_NAME_LEN: usize = 1024;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ChdAttributes: u32 {
        const MULTIPLE_INHERITANCE = 0x01;
        const VIRTUAL_INHERITANCE = 0x02;
        const AMBIGUOUS = 0x04;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BcdAttributes: u32 {
        const NOT_VISIBLE = 0x01;
        const AMBIGUOUS = 0x02;
        const PRIVATE_OR_PROTECTED_IN_COMPLETE_OBJECT = 0x04;
        const PRIVATE_OR_PROTECTED_BASE = 0x08;
        const VIRTUAL_BASE_OF_CONTAINED_OBJECT = 0x10;
        const NON_POLYMORPHIC = 0x20;
        const HAS_HIERARCHY_DESCRIPTOR = 0x40;
    }
}

const CHD_FLAG_LABELS: [(ChdAttributes, &str); 3] = [
    (ChdAttributes::MULTIPLE_INHERITANCE, "CHD_MULTINH"),
    (ChdAttributes::VIRTUAL_INHERITANCE, "CHD_VIRTINH"),
    (ChdAttributes::AMBIGUOUS, "CHD_AMBIGUOUS"),
];

const BCD_FLAG_LABELS: [(BcdAttributes, &str); 7] = [
    (BcdAttributes::NOT_VISIBLE, "BCD_NOTVISIBLE"),
    (BcdAttributes::AMBIGUOUS, "BCD_AMBIGUOUS"),
    (BcdAttributes::PRIVATE_OR_PROTECTED_IN_COMPLETE_OBJECT, "BCD_PRIVORPROTINCOMPOBJ"),
    (BcdAttributes::PRIVATE_OR_PROTECTED_BASE, "BCD_PRIVORPROTBASE"),
    (BcdAttributes::VIRTUAL_BASE_OF_CONTAINED_OBJECT, "BCD_VBOFCONTOBJ"),
    (BcdAttributes::NON_POLYMORPHIC, "BCD_NONPOLYMORPHIC"),
    (BcdAttributes::HAS_HIERARCHY_DESCRIPTOR, "BCD_HASPCHD"),
];

fn join_labels<F: Copy>(labels: &[(F, &str)], contains: impl Fn(F) -> bool) -> String {
    labels
        .iter()
        .filter(|(flag, _)| contains(*flag))
        .map(|(_, label)| *label)
        .collect::<Vec<_>>()
        .join(" | ")
}

impl ChdAttributes {
    pub fn describe(self) -> String {
        join_labels(&CHD_FLAG_LABELS, |f| self.contains(f))
    }

    /// Short marker used in vftable comments.
    pub fn inheritance_label(self) -> &'static str {
        let multiple = self.contains(Self::MULTIPLE_INHERITANCE);
        let virt = self.contains(Self::VIRTUAL_INHERITANCE);
        match (multiple, virt) {
            (true, true) => "[MI VI]",
            (true, false) => "[MI]",
            (false, true) => "[VI]",
            (false, false) => "",
        }
    }
}

impl BcdAttributes {
    pub fn describe(self) -> String {
        join_labels(&BCD_FLAG_LABELS, |f| self.contains(f))
    }
}

/// Pointer-to-member displacement triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub struct Pmd {
    pub mdisp: i32,
    pub pdisp: i32,
    pub vdisp: i32,
}

impl Pmd {
    pub fn read<S: AddressSpace + ?Sized>(space: &S, addr: Address) -> Result<Self, MemoryError> {
        Ok(Self {
            mdisp: space.read_i32(addr)?,
            pdisp: space.read_i32(addr + 4)?,
            vdisp: space.read_i32(addr + 8)?,
        })
    }
}

impl fmt::Display for Pmd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.mdisp, self.pdisp, self.vdisp)
    }
}

/// Type descriptor field addresses; the record itself is variable length.
pub struct TypeDescriptor;

impl TypeDescriptor {
    pub fn vftable_field(td: Address) -> Address {
        td
    }

    pub fn spare_field(td: Address, width: PointerWidth) -> Address {
        td + width.bytes()
    }

    pub fn name_field(td: Address, width: PointerWidth) -> Address {
        td + 2 * width.bytes()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompleteObjectLocator {
    pub address: Address,
    pub signature: u32,
    pub offset: u32,
    pub cd_offset: u32,
    pub type_descriptor: Address,
    pub class_descriptor: Address,
    pub addressing: Addressing,
}

impl CompleteObjectLocator {
    pub fn read<S: AddressSpace + ?Sized>(
        space: &S,
        addr: Address,
        mode: AddressingMode,
    ) -> Result<Self, MemoryError> {
        let addressing = mode.locate(space, addr)?;
        Ok(Self {
            address: addr,
            signature: space.read_u32(addr + COL_SIGNATURE)?,
            offset: space.read_u32(addr + COL_OFFSET)?,
            cd_offset: space.read_u32(addr + COL_CD_OFFSET)?,
            type_descriptor: addressing.read_ref(space, addr + COL_TYPE_DESCRIPTOR)?,
            class_descriptor: addressing.read_ref(space, addr + COL_CLASS_DESCRIPTOR)?,
            addressing,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassHierarchyDescriptor {
    pub address: Address,
    pub signature: u32,
    pub attributes: ChdAttributes,
    pub base_count: u32,
    pub base_class_array: Address,
}

impl ClassHierarchyDescriptor {
    pub fn read<S: AddressSpace + ?Sized>(
        space: &S,
        addr: Address,
        addressing: Addressing,
    ) -> Result<Self, MemoryError> {
        Ok(Self {
            address: addr,
            signature: space.read_u32(addr + CHD_SIGNATURE)?,
            attributes: ChdAttributes::from_bits_retain(space.read_u32(addr + CHD_ATTRIBUTES)?),
            base_count: space.read_u32(addr + CHD_BASE_COUNT)?,
            base_class_array: addressing.read_ref(space, addr + CHD_BASE_ARRAY)?,
        })
    }

    /// Number of array entries actually walked.
    pub fn walk_count(&self) -> u32 {
        self.base_count.min(MAX_BASE_CLASSES)
    }

    pub fn cell(&self, index: u32) -> Address {
        self.base_class_array + index as u64 * BASE_ARRAY_STRIDE
    }

    pub fn base_class<S: AddressSpace + ?Sized>(
        &self,
        space: &S,
        index: u32,
        addressing: Addressing,
    ) -> Result<Address, MemoryError> {
        addressing.read_ref(space, self.cell(index))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BaseClassDescriptor {
    pub address: Address,
    pub type_descriptor: Address,
    pub contained_bases: u32,
    pub pmd: Pmd,
    pub attributes: BcdAttributes,
    pub hierarchy: Option<Address>,
}

impl BaseClassDescriptor {
    pub fn read<S: AddressSpace + ?Sized>(
        space: &S,
        addr: Address,
        addressing: Addressing,
    ) -> Result<Self, MemoryError> {
        let attributes = BcdAttributes::from_bits_retain(space.read_u32(addr + BCD_ATTRIBUTES)?);
        let hierarchy = if attributes.contains(BcdAttributes::HAS_HIERARCHY_DESCRIPTOR) {
            Some(addressing.read_ref(space, addr + BCD_HIERARCHY)?)
        } else {
            None
        };
        Ok(Self {
            address: addr,
            type_descriptor: addressing.read_ref(space, addr + BCD_TYPE_DESCRIPTOR)?,
            contained_bases: space.read_u32(addr + BCD_CONTAINED_BASES)?,
            pmd: Pmd::read(space, addr + BCD_PMD)?,
            attributes,
            hierarchy,
        })
    }

    pub fn size(&self) -> u64 {
        if self.hierarchy.is_some() {
            0x1C
        } else {
            0x18
        }
    }
}

/// How a single field of a record is typed when placed field by field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Dword,
    Pointer,
    Reference,
    String(usize),
    Displacement,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub offset: u64,
    pub kind: FieldKind,
}

const fn field(name: &'static str, offset: u64, kind: FieldKind) -> FieldSpec {
    FieldSpec { name, offset, kind }
}

/// Record shapes the annotator places.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    TypeDescriptor { name_len: usize },
    Pmd,
    BaseClassDescriptor { has_chd: bool },
    BaseClassArray { count: u32 },
    ClassHierarchyDescriptor,
    CompleteObjectLocator,
}

impl RecordKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::TypeDescriptor { .. } => "TypeDescriptor",
            Self::Pmd => "PMD",
            Self::BaseClassDescriptor { .. } => "RTTIBaseClassDescriptor",
            Self::BaseClassArray { .. } => "RTTIBaseClassArray",
            Self::ClassHierarchyDescriptor => "RTTIClassHierarchyDescriptor",
            Self::CompleteObjectLocator => "RTTICompleteObjectLocator",
        }
    }

    pub fn size(&self, width: PointerWidth) -> u64 {
        match self {
            Self::TypeDescriptor { name_len } => 2 * width.bytes() + *name_len as u64 + 1,
            Self::Pmd => 12,
            Self::BaseClassDescriptor { has_chd: true } => 0x1C,
            Self::BaseClassDescriptor { has_chd: false } => 0x18,
            Self::BaseClassArray { count } => *count as u64 * BASE_ARRAY_STRIDE,
            Self::ClassHierarchyDescriptor => 0x10,
            Self::CompleteObjectLocator => match width {
                PointerWidth::Bits32 => 0x14,
                PointerWidth::Bits64 => 0x18,
            },
        }
    }

    pub fn fields(&self, width: PointerWidth) -> Vec<FieldSpec> {
        match self {
            Self::TypeDescriptor { name_len } => vec![
                field("pVFTable", 0, FieldKind::Pointer),
                field("spare", width.bytes(), FieldKind::Pointer),
                field("name", 2 * width.bytes(), FieldKind::String(*name_len + 1)),
            ],
            Self::Pmd => vec![
                field("mdisp", 0, FieldKind::Dword),
                field("pdisp", 4, FieldKind::Dword),
                field("vdisp", 8, FieldKind::Dword),
            ],
            Self::BaseClassDescriptor { has_chd } => {
                let mut fields = vec![
                    field("pTypeDescriptor", BCD_TYPE_DESCRIPTOR, FieldKind::Reference),
                    field("numContainedBases", BCD_CONTAINED_BASES, FieldKind::Dword),
                    field("pmd", BCD_PMD, FieldKind::Displacement),
                    field("attributes", BCD_ATTRIBUTES, FieldKind::Dword),
                ];
                if *has_chd {
                    fields.push(field("pClassDescriptor", BCD_HIERARCHY, FieldKind::Reference));
                }
                fields
            }
            Self::BaseClassArray { .. } => Vec::new(),
            Self::ClassHierarchyDescriptor => vec![
                field("signature", CHD_SIGNATURE, FieldKind::Dword),
                field("attributes", CHD_ATTRIBUTES, FieldKind::Dword),
                field("numBaseClasses", CHD_BASE_COUNT, FieldKind::Dword),
                field("pBaseClassArray", CHD_BASE_ARRAY, FieldKind::Reference),
            ],
            Self::CompleteObjectLocator => {
                let mut fields = vec![
                    field("signature", COL_SIGNATURE, FieldKind::Dword),
                    field("offset", COL_OFFSET, FieldKind::Dword),
                    field("cdOffset", COL_CD_OFFSET, FieldKind::Dword),
                    field("pTypeDescriptor", COL_TYPE_DESCRIPTOR, FieldKind::Reference),
                    field("pClassDescriptor", COL_CLASS_DESCRIPTOR, FieldKind::Reference),
                ];
                if width == PointerWidth::Bits64 {
                    fields.push(field("objectBase", COL_OBJECT_BASE, FieldKind::Dword));
                }
                fields
            }
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.type_name())
    }
}
