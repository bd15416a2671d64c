// Wed Jan 14 2026 - Alex

use crate::memory::{Address, AddressSpace};
use crate::rtti::addressing::{Addressing, AddressingMode};
use crate::rtti::layout::*;
use crate::rtti::working_set::WorkingSet;
use crate::symbol::Demangler;

/// Structural predicates over candidate RTTI records.
///
/// Records already present in the working set are accepted without
/// re-reading; nothing here mutates the image.
pub struct StructureValidator<'a> {
    mode: AddressingMode,
    working: &'a mut WorkingSet,
    demangler: &'a dyn Demangler,
}

impl<'a> StructureValidator<'a> {
    pub fn new(mode: AddressingMode, working: &'a mut WorkingSet, demangler: &'a dyn Demangler) -> Self {
        Self { mode, working, demangler }
    }

    pub fn mode(&self) -> AddressingMode {
        self.mode
    }

    /// Reads the mangled name of a type descriptor through the string cache.
    pub fn type_name<S: AddressSpace + ?Sized>(&mut self, space: &S, td: Address) -> Option<String> {
        let name_ea = TypeDescriptor::name_field(td, self.mode.width());
        self.working.string_at(space, name_ea, MAX_TYPE_NAME_LEN)
    }

    pub fn is_valid_type_descriptor<S: AddressSpace + ?Sized>(&mut self, space: &S, td: Address) -> bool {
        if self.working.has_type_descriptor(td) {
            return true;
        }
        let width = self.mode.width();
        let vftable = match space.read_ptr(TypeDescriptor::vftable_field(td), width) {
            Ok(v) => v,
            Err(_) => return false,
        };
        if vftable.is_null() || vftable.is_bad(width) || !space.is_loaded(vftable) {
            return false;
        }
        match space.read_ptr(TypeDescriptor::spare_field(td, width), width) {
            Ok(spare) if spare.is_null() => {}
            _ => return false,
        }
        if space.read_u8(TypeDescriptor::name_field(td, width)).ok() != Some(b'.') {
            return false;
        }
        match self.type_name(space, td) {
            Some(name) => self.demangler.is_type_name(&name),
            None => false,
        }
    }

    pub fn is_valid_base_class_descriptor<S: AddressSpace + ?Sized>(
        &mut self,
        space: &S,
        bcd: Address,
        addressing: Addressing,
    ) -> bool {
        if self.working.has_base_class(bcd) {
            return true;
        }
        match space.read_u32(bcd + BCD_ATTRIBUTES) {
            Ok(attributes) if attributes & 0xFFFF_FF00 == 0 => {}
            _ => return false,
        }
        match addressing.read_ref(space, bcd + BCD_TYPE_DESCRIPTOR) {
            Ok(td) => self.is_valid_type_descriptor(space, td),
            Err(_) => false,
        }
    }

    pub fn is_valid_class_hierarchy_descriptor<S: AddressSpace + ?Sized>(
        &mut self,
        space: &S,
        chd: Address,
        addressing: Addressing,
    ) -> bool {
        if self.working.has_hierarchy(chd) {
            return true;
        }
        let descriptor = match ClassHierarchyDescriptor::read(space, chd, addressing) {
            Ok(d) => d,
            Err(_) => return false,
        };
        if descriptor.signature != 0
            || descriptor.attributes.bits() & 0xFFFF_FFF0 != 0
            || descriptor.base_count < 1
            || !space.is_loaded(descriptor.base_class_array)
        {
            return false;
        }
        match descriptor.base_class(space, 0, addressing) {
            Ok(first) => self.is_valid_base_class_descriptor(space, first, addressing),
            Err(_) => false,
        }
    }

    pub fn is_valid_complete_object_locator<S: AddressSpace + ?Sized>(&mut self, space: &S, col: Address) -> bool {
        match space.read_u32(col + COL_SIGNATURE) {
            Ok(signature) if signature == self.mode.col_signature() => {}
            _ => return false,
        }
        if self.mode.is_relative() {
            let fields = [COL_OBJECT_BASE, COL_TYPE_DESCRIPTOR, COL_CLASS_DESCRIPTOR];
            for field in fields {
                match space.read_u32(col + field) {
                    Ok(value) if value != 0 => {}
                    _ => return false,
                }
            }
        }
        let locator = match CompleteObjectLocator::read(space, col, self.mode) {
            Ok(l) => l,
            Err(_) => return false,
        };
        self.is_valid_type_descriptor(space, locator.type_descriptor)
            && self.is_valid_class_hierarchy_descriptor(space, locator.class_descriptor, locator.addressing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::PointerWidth;
    use crate::rtti::fixture::RttiImage;
    use crate::symbol::MsvcTypeDemangler;

    fn check_col(image: &RttiImage, col: Address) -> bool {
        let db = image.database();
        let mut ws = WorkingSet::new();
        let mut validator = StructureValidator::new(image.mode(), &mut ws, &MsvcTypeDemangler);
        validator.is_valid_complete_object_locator(&db, col)
    }

    #[test]
    fn test_valid_locator_both_modes() {
        for width in [PointerWidth::Bits32, PointerWidth::Bits64] {
            let mut image = RttiImage::new(width);
            let col = image.simple_class(".?AVWidget@@");
            assert!(check_col(&image, col), "{}", width);
        }
    }

    #[test]
    fn test_relative_locator_with_zero_object_base_is_rejected() {
        let mut image = RttiImage::new(PointerWidth::Bits64);
        let col = image.simple_class(".?AVWidget@@");
        image.put_u32(col + COL_OBJECT_BASE, 0);
        assert!(!check_col(&image, col));
    }

    #[test]
    fn test_signature_mismatch_is_rejected() {
        let mut image = RttiImage::new(PointerWidth::Bits64);
        let col = image.simple_class(".?AVWidget@@");
        image.put_u32(col + COL_SIGNATURE, 0);
        assert!(!check_col(&image, col));

        let mut image = RttiImage::new(PointerWidth::Bits32);
        let col = image.simple_class(".?AVWidget@@");
        image.put_u32(col + COL_SIGNATURE, 1);
        assert!(!check_col(&image, col));
    }

    #[test]
    fn test_type_descriptor_rules() {
        let mut image = RttiImage::new(PointerWidth::Bits32);
        let good = image.type_descriptor(".?AVWidget@@");
        let bad_name = image.type_descriptor("Widget");
        let bad_spare = image.type_descriptor(".?AVOther@@");
        image.put_ptr(TypeDescriptor::spare_field(bad_spare, PointerWidth::Bits32), 1);
        let bad_vftable = image.type_descriptor(".?AVThird@@");
        image.put_ptr(bad_vftable, 0);

        let db = image.database();
        let mut ws = WorkingSet::new();
        let mut validator = StructureValidator::new(image.mode(), &mut ws, &MsvcTypeDemangler);
        assert!(validator.is_valid_type_descriptor(&db, good));
        assert!(!validator.is_valid_type_descriptor(&db, bad_name));
        assert!(!validator.is_valid_type_descriptor(&db, bad_spare));
        assert!(!validator.is_valid_type_descriptor(&db, bad_vftable));
        assert!(!validator.is_valid_type_descriptor(&db, Address::new(0x10)));
    }

    #[test]
    fn test_base_class_attribute_high_bits_rejected() {
        let mut image = RttiImage::new(PointerWidth::Bits32);
        let td = image.type_descriptor(".?AVWidget@@");
        let bcd = image.base_class(td, 0, Pmd::default(), 0x100, None);
        let ok = image.base_class(td, 0, Pmd::default(), 0x7F, None);

        let db = image.database();
        let mut ws = WorkingSet::new();
        let mut validator = StructureValidator::new(image.mode(), &mut ws, &MsvcTypeDemangler);
        assert!(!validator.is_valid_base_class_descriptor(&db, bcd, Addressing::Absolute));
        assert!(validator.is_valid_base_class_descriptor(&db, ok, Addressing::Absolute));
    }

    #[test]
    fn test_hierarchy_rules() {
        let mut image = RttiImage::new(PointerWidth::Bits32);
        let td = image.type_descriptor(".?AVWidget@@");
        let bcd = image.base_class(td, 0, Pmd::default(), 0, None);
        let empty = image.hierarchy(0, &[]);
        let bad_attrs = image.hierarchy(0x10, &[bcd]);
        let bad_sig = image.hierarchy(0, &[bcd]);
        image.put_u32(bad_sig + CHD_SIGNATURE, 1);
        let good = image.hierarchy(0x3, &[bcd]);

        let db = image.database();
        let mut ws = WorkingSet::new();
        let mut validator = StructureValidator::new(image.mode(), &mut ws, &MsvcTypeDemangler);
        assert!(!validator.is_valid_class_hierarchy_descriptor(&db, empty, Addressing::Absolute));
        assert!(!validator.is_valid_class_hierarchy_descriptor(&db, bad_attrs, Addressing::Absolute));
        assert!(!validator.is_valid_class_hierarchy_descriptor(&db, bad_sig, Addressing::Absolute));
        assert!(validator.is_valid_class_hierarchy_descriptor(&db, good, Addressing::Absolute));
    }

    #[test]
    fn test_working_set_membership_short_circuits() {
        let mut image = RttiImage::new(PointerWidth::Bits32);
        let td = image.type_descriptor("not-a-type");
        let db = image.database();
        let mut ws = WorkingSet::new();
        ws.insert_type_descriptor(td);
        let mut validator = StructureValidator::new(image.mode(), &mut ws, &MsvcTypeDemangler);
        assert!(validator.is_valid_type_descriptor(&db, td));
    }

    #[test]
    fn test_unloaded_addresses_are_invalid() {
        let image = RttiImage::new(PointerWidth::Bits64);
        assert!(!check_col(&image, Address::new(0xDEAD_0000)));
    }
}
