// Wed Jan 14 2026 - Alex

use crate::memory::{Address, AddressSpace, MemoryError};
use crate::rtti::layout::{BaseClassDescriptor, BcdAttributes, ClassHierarchyDescriptor, CompleteObjectLocator, Pmd};
use crate::rtti::names::{is_class_name, type_tag};
use crate::rtti::validator::StructureValidator;

/// One entry of a class's flattened base list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseClassEntry {
    pub mangled: String,
    pub pmd: Pmd,
    pub attributes: BcdAttributes,
    pub descriptor: Address,
}

impl BaseClassEntry {
    pub fn tag(&self) -> &str {
        type_tag(&self.mangled)
    }

    pub fn is_class(&self) -> bool {
        is_class_name(&self.mangled)
    }
}

/// Resolves a validated locator's hierarchy into its ordered base list.
pub struct HierarchyReconstructor<'s, S: AddressSpace + ?Sized> {
    space: &'s S,
}

impl<'s, S: AddressSpace + ?Sized> HierarchyReconstructor<'s, S> {
    pub fn new(space: &'s S) -> Self {
        Self { space }
    }

    pub fn hierarchy(&self, col: &CompleteObjectLocator) -> Result<ClassHierarchyDescriptor, MemoryError> {
        ClassHierarchyDescriptor::read(self.space, col.class_descriptor, col.addressing)
    }

    /// Entries in stored order; index 0 is the class itself.
    pub fn build_base_list(
        &self,
        col: &CompleteObjectLocator,
        validator: &mut StructureValidator<'_>,
    ) -> Result<Vec<BaseClassEntry>, MemoryError> {
        let chd = self.hierarchy(col)?;
        if chd.base_count > chd.walk_count() {
            log::warn!(
                "{}: hierarchy at {} claims {} bases, walking {}",
                col.address,
                chd.address,
                chd.base_count,
                chd.walk_count()
            );
        }

        let mut entries = Vec::with_capacity(chd.walk_count() as usize);
        for index in 0..chd.walk_count() {
            let bcd_ea = chd.base_class(self.space, index, col.addressing)?;
            let bcd = BaseClassDescriptor::read(self.space, bcd_ea, col.addressing)?;
            let mangled = validator
                .type_name(self.space, bcd.type_descriptor)
                .ok_or(MemoryError::InvalidString(bcd.type_descriptor.as_u64()))?;
            entries.push(BaseClassEntry {
                mangled,
                pmd: bcd.pmd,
                attributes: bcd.attributes,
                descriptor: bcd_ea,
            });
        }
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::PointerWidth;
    use crate::rtti::fixture::RttiImage;
    use crate::rtti::working_set::WorkingSet;
    use crate::symbol::MsvcTypeDemangler;

    #[test]
    fn test_base_list_in_stored_order() {
        for width in [PointerWidth::Bits32, PointerWidth::Bits64] {
            let mut image = RttiImage::new(width);
            let td_c = image.type_descriptor(".?AVC@@");
            let td_a = image.type_descriptor(".?AUA@@");
            let td_b = image.type_descriptor(".?AVB@@");
            let bcd_c = image.base_class(td_c, 2, Pmd::default(), 0, None);
            let bcd_a = image.base_class(td_a, 0, Pmd::default(), 0, None);
            let bcd_b = image.base_class(td_b, 0, Pmd { mdisp: 8, pdisp: -1, vdisp: 0 }, 0, None);
            let chd = image.hierarchy(1, &[bcd_c, bcd_a, bcd_b]);
            let col_ea = image.locator(0, td_c, chd);

            let db = image.database();
            let mut ws = WorkingSet::new();
            let mut validator = StructureValidator::new(image.mode(), &mut ws, &MsvcTypeDemangler);
            let col = CompleteObjectLocator::read(&db, col_ea, image.mode()).unwrap();
            let list = HierarchyReconstructor::new(&db).build_base_list(&col, &mut validator).unwrap();

            let names: Vec<&str> = list.iter().map(|e| e.mangled.as_str()).collect();
            assert_eq!(names, vec![".?AVC@@", ".?AUA@@", ".?AVB@@"]);
            assert!(!list[1].is_class());
            assert_eq!(list[2].pmd.mdisp, 8);
            assert_eq!(list[2].tag(), "B@@");
            assert_eq!(list[2].descriptor, bcd_b);
        }
    }
}
