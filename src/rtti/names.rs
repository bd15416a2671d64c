// Wed Jan 14 2026 - Alex

use crate::memory::{Address, AddressSpace, AnnotationSink};
use crate::rtti::layout::{BcdAttributes, Pmd};
use crate::symbol::Demangler;

pub const VFTABLE_PREFIX: &str = "??_7";
pub const COL_PREFIX: &str = "??_R4";

/// Encodes a 32-bit field the way MSVC encodes numbers inside RTTI names.
pub fn mangle_number(value: i32) -> String {
    if value == 0 {
        return "A@".to_string();
    }
    let sign = if value < 0 { "?" } else { "" };
    let mut magnitude = value.unsigned_abs();
    if magnitude <= 10 {
        return format!("{}{}", sign, magnitude - 1);
    }
    let mut digits = String::new();
    while magnitude > 0 {
        digits.push((b'A' + (magnitude % 16) as u8) as char);
        magnitude /= 16;
    }
    format!("{}{}@", sign, digits)
}

/// The mangled name without its `.?AV` / `.?AU` prefix.
pub fn type_tag(mangled: &str) -> &str {
    mangled.get(4..).unwrap_or("")
}

/// Class encodings carry `V` as the fourth character; anything else prints as struct.
pub fn is_class_name(mangled: &str) -> bool {
    mangled.as_bytes().get(3) == Some(&b'V')
}

pub fn vftable_name(mangled: &str) -> String {
    format!("{}{}6B@", VFTABLE_PREFIX, type_tag(mangled))
}

pub fn locator_name(mangled: &str) -> String {
    format!("{}{}6B@", COL_PREFIX, type_tag(mangled))
}

pub fn type_descriptor_name(mangled: &str) -> String {
    format!("??_R0?{}@8", mangled.get(2..).unwrap_or(""))
}

pub fn base_class_name(pmd: Pmd, attributes: BcdAttributes, mangled: &str) -> String {
    format!(
        "??_R1{}{}{}{}{}8",
        mangle_number(pmd.mdisp),
        mangle_number(pmd.pdisp),
        mangle_number(pmd.vdisp),
        mangle_number(attributes.bits() as i32),
        type_tag(mangled)
    )
}

pub fn base_class_array_name(mangled: &str) -> String {
    format!("??_R2{}8", type_tag(mangled))
}

pub fn hierarchy_name(mangled: &str) -> String {
    format!("??_R3{}8", type_tag(mangled))
}

/// Name fragment for a secondary vftable of `col_name` covering `base_name`.
pub fn combined_name(col_name: &str, base_name: &str) -> String {
    format!("{}6B{}@", type_tag(col_name), type_tag(base_name))
}

pub struct NameSynthesizer<'a> {
    demangler: &'a dyn Demangler,
    retry_limit: usize,
}

impl<'a> NameSynthesizer<'a> {
    pub fn new(demangler: &'a dyn Demangler, retry_limit: usize) -> Self {
        Self { demangler, retry_limit }
    }

    pub fn plain_name(&self, mangled: &str) -> Option<String> {
        self.demangler.demangle_type(mangled)
    }

    /// Plain name, or the raw mangled text when it does not decode.
    pub fn display_name(&self, mangled: &str) -> String {
        match self.plain_name(mangled) {
            Some(name) => name,
            None => {
                log::debug!("could not demangle \"{}\", using raw name", mangled);
                mangled.to_string()
            }
        }
    }

    /// `Name` for classes, `struct Name` otherwise.
    pub fn prefixed_name(&self, mangled: &str) -> String {
        let name = self.display_name(mangled);
        if is_class_name(mangled) {
            name
        } else {
            format!("struct {}", name)
        }
    }

    /// Binds `name` to an unnamed address; collisions retry with `_N` suffixes.
    pub fn assign<D: AddressSpace + AnnotationSink + ?Sized>(
        &self,
        db: &mut D,
        addr: Address,
        name: &str,
    ) -> bool {
        if db.has_name(addr) {
            return false;
        }
        if db.set_name(addr, name) {
            return true;
        }
        for i in 0..self.retry_limit {
            let candidate = format!("{}_{}", name, i);
            if db.set_name(addr, &candidate) {
                return true;
            }
        }
        log::debug!("giving up naming {} as \"{}\"", addr, name);
        false
    }
}
