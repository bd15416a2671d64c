// Wed Jan 14 2026 - Alex

use crate::memory::{Address, AddressSpace, MemoryError, PointerWidth};
use crate::rtti::layout::COL_OBJECT_BASE;
use serde::Serialize;
use std::fmt;

/// Reference convention for a whole session, picked once from the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum AddressingMode {
    /// 32-bit targets: every reference field is an absolute pointer.
    Absolute32,
    /// 64-bit targets: reference fields are 32-bit offsets from the image
    /// base, recovered through the locator's `objectBase` field.
    ImageRelative64,
}

impl AddressingMode {
    pub fn for_width(width: PointerWidth) -> Self {
        match width {
            PointerWidth::Bits32 => Self::Absolute32,
            PointerWidth::Bits64 => Self::ImageRelative64,
        }
    }

    pub fn width(self) -> PointerWidth {
        match self {
            Self::Absolute32 => PointerWidth::Bits32,
            Self::ImageRelative64 => PointerWidth::Bits64,
        }
    }

    pub fn pointer_size(self) -> u64 {
        self.width().bytes()
    }

    /// Expected `signature` of a complete object locator.
    pub fn col_signature(self) -> u32 {
        match self {
            Self::Absolute32 => 0,
            Self::ImageRelative64 => 1,
        }
    }

    pub fn is_relative(self) -> bool {
        self == Self::ImageRelative64
    }

    /// Resolves the per-graph convention rooted at the locator `col`.
    pub fn locate<S: AddressSpace + ?Sized>(
        self,
        space: &S,
        col: Address,
    ) -> Result<Addressing, MemoryError> {
        match self {
            Self::Absolute32 => Ok(Addressing::Absolute),
            Self::ImageRelative64 => {
                let object_base = space.read_u32(col + COL_OBJECT_BASE)? as u64;
                col.checked_sub(object_base)
                    .map(Addressing::Relative)
                    .ok_or(MemoryError::OutOfBounds(col.as_u64()))
            }
        }
    }
}

impl fmt::Display for AddressingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Absolute32 => write!(f, "absolute (32-bit)"),
            Self::ImageRelative64 => write!(f, "image-relative (64-bit)"),
        }
    }
}

/// Convention used for every reference reachable from one locator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Addressing {
    Absolute,
    Relative(Address),
}

impl Addressing {
    pub fn base(&self) -> Option<Address> {
        match self {
            Self::Absolute => None,
            Self::Relative(base) => Some(*base),
        }
    }

    /// Reads the 32-bit reference at `field` and resolves it to an address.
    pub fn read_ref<S: AddressSpace + ?Sized>(
        &self,
        space: &S,
        field: Address,
    ) -> Result<Address, MemoryError> {
        let raw = space.read_u32(field)? as u64;
        Ok(match self {
            Self::Absolute => Address::new(raw),
            Self::Relative(base) => *base + raw,
        })
    }
}
