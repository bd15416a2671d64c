// Wed Jan 14 2026 - Alex

use crate::memory::{Address, Database, PointerWidth};
use crate::rtti::addressing::Addressing;
use crate::rtti::context::ScanContext;
use crate::rtti::layout::*;
use crate::rtti::names;

enum Pending {
    Hierarchy(Address),
    BaseClass(Address),
}

/// Commits record layouts, names and comments for a discovered locator
/// graph. Every record is placed at most once per session.
pub struct StructureAnnotator<'c, 'a> {
    ctx: &'c mut ScanContext<'a>,
}

fn hex(addr: Address) -> String {
    format!("0x{:016X}", addr.as_u64())
}

impl<'c, 'a> StructureAnnotator<'c, 'a> {
    pub fn new(ctx: &'c mut ScanContext<'a>) -> Self {
        Self { ctx }
    }

    fn width(&self) -> PointerWidth {
        self.ctx.mode.width()
    }

    pub fn annotate_locator<D: Database + ?Sized>(&mut self, db: &mut D, col_ea: Address) -> bool {
        let col = match CompleteObjectLocator::read(db, col_ea, self.ctx.mode) {
            Ok(col) => col,
            Err(e) => {
                log::debug!("{}: unreadable locator: {}", col_ea, e);
                return false;
            }
        };

        self.place(db, col_ea, RecordKind::CompleteObjectLocator, col.addressing);
        if col.addressing.base().is_some() {
            db.set_comment(col_ea + COL_TYPE_DESCRIPTOR, &hex(col.type_descriptor), true);
            db.set_comment(col_ea + COL_CLASS_DESCRIPTOR, &hex(col.class_descriptor), true);
        }
        self.annotate_type_descriptor(db, col.type_descriptor);

        let mut pending = vec![Pending::Hierarchy(col.class_descriptor)];
        while let Some(next) = pending.pop() {
            match next {
                Pending::Hierarchy(chd) => self.annotate_hierarchy(db, chd, col.addressing, &mut pending),
                Pending::BaseClass(bcd) => self.annotate_base_class(db, bcd, col.addressing, &mut pending),
            }
        }
        true
    }

    fn place<D: Database + ?Sized>(&mut self, db: &mut D, ea: Address, kind: RecordKind, addressing: Addressing) {
        let width = self.width();
        if self.ctx.config.place_structures && db.declare_structure(ea, kind, width) {
            return;
        }
        for field in kind.fields(width) {
            let at = ea + field.offset;
            match field.kind {
                FieldKind::Dword => db.make_dword(at),
                FieldKind::Pointer => db.make_pointer(at, width),
                FieldKind::Reference => match addressing {
                    Addressing::Absolute => db.make_pointer(at, PointerWidth::Bits32),
                    Addressing::Relative(_) => db.make_dword(at),
                },
                FieldKind::String(len) => db.make_string(at, len),
                FieldKind::Displacement => {
                    db.make_dword(at);
                    db.make_dword(at + 4);
                    db.make_dword(at + 8);
                }
            }
        }
    }

    fn annotate_type_descriptor<D: Database + ?Sized>(&mut self, db: &mut D, td: Address) {
        if !self.ctx.working.insert_type_descriptor(td) {
            return;
        }
        let name = self.ctx.validator().type_name(db, td).unwrap_or_default();
        self.place(
            db,
            td,
            RecordKind::TypeDescriptor { name_len: name.len() },
            Addressing::Absolute,
        );
        if !name.is_empty() {
            self.ctx.names().assign(db, td, &names::type_descriptor_name(&name));
        }
    }

    fn annotate_hierarchy<D: Database + ?Sized>(
        &mut self,
        db: &mut D,
        chd_ea: Address,
        addressing: Addressing,
        pending: &mut Vec<Pending>,
    ) {
        if !self.ctx.working.insert_hierarchy(chd_ea) {
            return;
        }
        let chd = match ClassHierarchyDescriptor::read(db, chd_ea, addressing) {
            Ok(chd) => chd,
            Err(e) => {
                log::debug!("{}: unreadable hierarchy descriptor: {}", chd_ea, e);
                return;
            }
        };

        self.place(db, chd_ea, RecordKind::ClassHierarchyDescriptor, addressing);
        let attributes_ea = chd_ea + CHD_ATTRIBUTES;
        if !self.ctx.config.place_structures && !chd.attributes.is_empty() && !db.has_comment(attributes_ea) {
            db.set_comment(attributes_ea, &chd.attributes.describe(), true);
        }
        if addressing.base().is_some() {
            db.set_comment(chd_ea + CHD_BASE_ARRAY, &hex(chd.base_class_array), true);
        }
        if chd.base_class_array.is_null() || chd.base_class_array.is_bad(self.ctx.mode.width()) {
            return;
        }

        let count = chd.walk_count();
        let digits = count.to_string().len();
        let mut bases = Vec::with_capacity(count as usize);
        for index in 0..count {
            let cell = chd.cell(index);
            match addressing {
                Addressing::Absolute => db.make_pointer(cell, PointerWidth::Bits32),
                Addressing::Relative(_) => db.make_dword(cell),
            }
            let bcd = match chd.base_class(db, index, addressing) {
                Ok(bcd) => bcd,
                Err(_) => break,
            };

            if !db.has_comment(cell) {
                let mut comment = if count == 1 {
                    "  BaseClass".to_string()
                } else {
                    format!("  BaseClass[{:0width$}]", index, width = digits)
                };
                if addressing.base().is_some() {
                    comment.push(' ');
                    comment.push_str(&hex(bcd));
                }
                db.set_comment(cell, &comment, false);
            }

            if index == 0 {
                self.name_hierarchy(db, &chd, bcd, addressing);
            }
            bases.push(bcd);
        }

        let trailing = chd.cell(count);
        if db.is_loaded(trailing) && db.read_u32(trailing).ok() == Some(0) {
            db.make_dword(trailing);
        }
        pending.extend(bases.into_iter().rev().map(Pending::BaseClass));
    }

    /// Names the array and descriptor after the first base, which is the class itself.
    fn name_hierarchy<D: Database + ?Sized>(
        &mut self,
        db: &mut D,
        chd: &ClassHierarchyDescriptor,
        first_bcd: Address,
        addressing: Addressing,
    ) {
        let td = match addressing.read_ref(db, first_bcd + BCD_TYPE_DESCRIPTOR) {
            Ok(td) => td,
            Err(_) => return,
        };
        let name = match self.ctx.validator().type_name(db, td) {
            Some(name) => name,
            None => return,
        };
        let synth = self.ctx.names();
        let array = chd.base_class_array;
        synth.assign(db, array, &names::base_class_array_name(&name));

        if self.ctx.config.overwrite_comments {
            db.clear_leading_comments(array);
            db.set_leading_comment(array, "");
        } else if !db.has_leading_comment(array) {
            db.set_leading_comment(array, "");
        }
        synth.assign(db, chd.address, &names::hierarchy_name(&name));
    }

    fn annotate_base_class<D: Database + ?Sized>(
        &mut self,
        db: &mut D,
        bcd_ea: Address,
        addressing: Addressing,
        pending: &mut Vec<Pending>,
    ) {
        if !self.ctx.working.insert_base_class(bcd_ea) {
            return;
        }
        let bcd = match BaseClassDescriptor::read(db, bcd_ea, addressing) {
            Ok(bcd) => bcd,
            Err(e) => {
                log::debug!("{}: unreadable base class descriptor: {}", bcd_ea, e);
                return;
            }
        };

        let kind = RecordKind::BaseClassDescriptor { has_chd: bcd.hierarchy.is_some() };
        self.place(db, bcd_ea, kind, addressing);

        if let Some(nested) = bcd.hierarchy {
            let field = bcd_ea + BCD_HIERARCHY;
            match addressing {
                Addressing::Absolute => db.make_pointer(field, PointerWidth::Bits32),
                Addressing::Relative(_) => {
                    db.make_dword(field);
                    db.set_comment(field, &hex(nested), true);
                }
            }
            if db.is_loaded(nested) {
                pending.push(Pending::Hierarchy(nested));
            } else {
                log::warn!("{}: nested hierarchy {} is not loaded", bcd_ea, nested);
            }
        }

        self.annotate_type_descriptor(db, bcd.type_descriptor);
        let name = match self.ctx.validator().type_name(db, bcd.type_descriptor) {
            Some(name) => name,
            None => return,
        };

        let attributes_ea = bcd_ea + BCD_ATTRIBUTES;
        if !self.ctx.config.place_structures && !bcd.attributes.is_empty() && !db.has_comment(attributes_ea) {
            db.set_comment(attributes_ea, &bcd.attributes.describe(), true);
        }
        self.ctx
            .names()
            .assign(db, bcd_ea, &names::base_class_name(bcd.pmd, bcd.attributes, &name));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{AddressSpace, AnnotationSink, ImageDatabase, ItemKind};
    use crate::rtti::fixture::RttiImage;
    use crate::rtti::scan::ScanConfig;
    use crate::rtti::working_set::WorkingSet;
    use crate::symbol::MsvcTypeDemangler;

    struct Graph {
        col: Address,
        td_d: Address,
        chd: Address,
        bcd_d: Address,
        bcd_b: Address,
        nested: Address,
    }

    fn graph(image: &mut RttiImage) -> Graph {
        let td_base = image.type_descriptor(".?AVBase@@");
        let bcd_base_self = image.base_class(td_base, 0, Pmd::default(), 0, None);
        let nested = image.hierarchy(0, &[bcd_base_self]);

        let td_d = image.type_descriptor(".?AVDerived@@");
        let bcd_d = image.base_class(td_d, 1, Pmd::default(), 0, None);
        let bcd_b = image.base_class(td_base, 0, Pmd { mdisp: 0, pdisp: -1, vdisp: 0 }, 0, Some(nested));
        let chd = image.hierarchy(0, &[bcd_d, bcd_b]);
        let col = image.locator(0, td_d, chd);
        Graph { col, td_d, chd, bcd_d, bcd_b, nested }
    }

    fn annotate(image: &RttiImage, config: &ScanConfig, col: Address) -> (ImageDatabase, WorkingSet) {
        let mut db = image.database();
        let mut ws = WorkingSet::new();
        {
            let mut ctx = ScanContext::new(image.mode(), config, &mut ws, &MsvcTypeDemangler);
            assert!(StructureAnnotator::new(&mut ctx).annotate_locator(&mut db, col));
        }
        (db, ws)
    }

    #[test]
    fn test_names_whole_graph() {
        for width in [PointerWidth::Bits32, PointerWidth::Bits64] {
            let mut image = RttiImage::new(width);
            let g = graph(&mut image);
            let (db, ws) = annotate(&image, &ScanConfig::default(), g.col);

            assert_eq!(db.name_at(g.td_d), Some("??_R0?AVDerived@@@8"));
            assert_eq!(db.name_at(g.chd), Some("??_R3Derived@@8"));
            assert_eq!(db.name_at(g.bcd_d), Some("??_R1A@A@A@A@Derived@@8"));
            assert_eq!(db.name_at(g.bcd_b), Some("??_R1A@?0A@AE@Base@@8"));
            assert_eq!(db.name_at(g.nested), Some("??_R3Base@@8"));
            assert_eq!(db.structure_at(g.col), Some(RecordKind::CompleteObjectLocator));
            assert!(ws.has_hierarchy(g.nested));
            assert!(ws.has_base_class(g.bcd_b));
        }
    }

    #[test]
    fn test_field_fallback_when_not_placing_structures() {
        let mut image = RttiImage::new(PointerWidth::Bits32);
        let td_a = image.type_descriptor(".?AVA@@");
        let td_b = image.type_descriptor(".?AVB@@");
        let bcd_a = image.base_class(td_a, 1, Pmd::default(), 0, None);
        let bcd_b = image.base_class(td_b, 0, Pmd::default(), 0x01, None);
        let chd = image.hierarchy(0x1, &[bcd_a, bcd_b]);
        let col = image.locator(0, td_a, chd);

        let config = ScanConfig { place_structures: false, ..ScanConfig::default() };
        let (db, _) = annotate(&image, &config, col);

        assert_eq!(db.structure_at(col), None);
        assert_eq!(db.item_kind(col + COL_SIGNATURE), ItemKind::Dword);
        assert_eq!(db.item_kind(col + COL_TYPE_DESCRIPTOR), ItemKind::Pointer(PointerWidth::Bits32));
        assert_eq!(db.repeatable_comment_at(chd + CHD_ATTRIBUTES), Some("CHD_MULTINH"));
        assert_eq!(db.repeatable_comment_at(bcd_b + BCD_ATTRIBUTES), Some("BCD_NOTVISIBLE"));
    }

    #[test]
    fn test_base_array_comments_and_separator() {
        let mut image = RttiImage::new(PointerWidth::Bits64);
        let g = graph(&mut image);
        let (db, _) = annotate(&image, &ScanConfig::default(), g.col);

        let chd = ClassHierarchyDescriptor::read(&db, g.chd, image.mode().locate(&db, g.col).unwrap()).unwrap();
        let first = db.comment_at(chd.cell(0)).unwrap();
        assert!(first.starts_with("  BaseClass[0] 0x"), "{}", first);
        assert_eq!(db.name_at(chd.base_class_array), Some("??_R2Derived@@8"));
        assert_eq!(db.leading_comments(chd.base_class_array), &["".to_string()]);
        assert_eq!(
            db.repeatable_comment_at(g.col + COL_TYPE_DESCRIPTOR),
            Some(format!("0x{:016X}", g.td_d.as_u64()).as_str())
        );
    }

    #[test]
    fn test_array_separator_respects_overwrite_mode() {
        let mut image = RttiImage::new(PointerWidth::Bits32);
        let g = graph(&mut image);
        for (overwrite, expected) in [(true, ""), (false, "; stale")] {
            let mut db = image.database();
            let array = ClassHierarchyDescriptor::read(&db, g.chd, Addressing::Absolute).unwrap().base_class_array;
            db.set_leading_comment(array, "; stale");
            let config = ScanConfig { overwrite_comments: overwrite, ..ScanConfig::default() };
            let mut ws = WorkingSet::new();
            let mut ctx = ScanContext::new(image.mode(), &config, &mut ws, &MsvcTypeDemangler);

            assert!(StructureAnnotator::new(&mut ctx).annotate_locator(&mut db, g.col));
            assert_eq!(db.leading_comments(array), &[expected.to_string()], "overwrite={}", overwrite);
        }
    }

    #[test]
    fn test_single_base_comment() {
        let mut image = RttiImage::new(PointerWidth::Bits32);
        let col = image.simple_class(".?AUPoint@@");
        let (db, _) = annotate(&image, &ScanConfig::default(), col);

        let chd = ClassHierarchyDescriptor::read(&db, Address::new(db.read_u32(col + COL_CLASS_DESCRIPTOR).unwrap() as u64), Addressing::Absolute).unwrap();
        assert_eq!(db.comment_at(chd.cell(0)), Some("  BaseClass"));
    }

    #[test]
    fn test_second_pass_is_idempotent() {
        let mut image = RttiImage::new(PointerWidth::Bits32);
        let g = graph(&mut image);
        let config = ScanConfig::default();
        let (mut db, mut ws) = annotate(&image, &config, g.col);
        let named = db.named_count();

        let mut ctx = ScanContext::new(image.mode(), &config, &mut ws, &MsvcTypeDemangler);
        StructureAnnotator::new(&mut ctx).annotate_locator(&mut db, g.col);
        assert_eq!(db.named_count(), named);
    }
}
