// Wed Jan 14 2026 - Alex

use crate::memory::{Address, AddressSpace, Database, ItemKind, PointerWidth};
use crate::output::table::{ResultRow, ResultStore, RowFlags};
use crate::rtti::context::ScanContext;
use crate::rtti::hierarchy::{BaseClassEntry, HierarchyReconstructor};
use crate::rtti::layout::{ChdAttributes, CompleteObjectLocator};
use crate::rtti::names::{self, is_class_name, NameSynthesizer, COL_PREFIX, VFTABLE_PREFIX};
use crate::rtti::validator::StructureValidator;

/// Method cells of one vftable, plus what has to be retyped afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VftableExtent {
    pub start: Address,
    pub end: Address,
    pub method_count: usize,
    pub unclassified: Vec<Address>,
    pub padding: Option<Address>,
}

impl VftableExtent {
    pub fn cells(&self, width: PointerWidth) -> impl Iterator<Item = Address> + '_ {
        let step = width.bytes();
        (0..self.method_count as u64).map(move |i| self.start + i * step)
    }
}

fn is_pointer_cell(kind: ItemKind, width: PointerWidth) -> bool {
    match kind {
        ItemKind::Unknown => true,
        ItemKind::Pointer(w) => w == width,
        ItemKind::Dword => width == PointerWidth::Bits32,
        _ => false,
    }
}

/// Walks method pointers starting at `start`. Returns `None` when not even
/// the first cell holds a plausible method.
pub fn scan_vtable_extent<S: AddressSpace + ?Sized>(
    space: &S,
    validator: &mut StructureValidator<'_>,
    start: Address,
) -> Option<VftableExtent> {
    let width = validator.mode().width();
    let step = width.bytes();
    let mut extent = VftableExtent {
        start,
        end: start,
        method_count: 0,
        unclassified: Vec::new(),
        padding: None,
    };

    let mut cell = start;
    loop {
        if !space.is_loaded(cell) || !is_pointer_cell(space.item_kind(cell), width) {
            break;
        }
        let first = extent.method_count == 0;
        if !first && space.has_xref(cell) {
            break;
        }
        let target = match space.read_ptr(cell, width) {
            Ok(target) => target,
            Err(_) => break,
        };
        if target.is_null() {
            extent.padding = Some(cell);
            break;
        }
        if target.is_bad(width) || !space.is_loaded(target) {
            break;
        }

        // Anything not yet classified as code must at least live in a code segment.
        let classified = match space.item_kind(target) {
            ItemKind::Code => true,
            _ if space.segment_at(target).map_or(false, |s| s.is_code()) => false,
            _ => break,
        };
        if !first && validator.is_valid_complete_object_locator(space, target) {
            break;
        }
        if !classified {
            extent.unclassified.push(target);
        }

        extent.method_count += 1;
        cell = match cell.checked_add(step) {
            Some(next) => next,
            None => break,
        };
    }

    if extent.method_count == 0 {
        return None;
    }
    extent.end = start + extent.method_count as u64 * step;
    Some(extent)
}

/// Which sub-object of the complete class a vftable serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    /// Offset zero in a class without multiple or virtual inheritance.
    Sole,
    Primary,
    /// `heuristic` is set when the entry was picked by `pdisp` rather
    /// than by a matching `mdisp`.
    Secondary { index: usize, heuristic: bool },
}

impl Level {
    pub fn is_top_level(self) -> bool {
        !matches!(self, Level::Secondary { .. })
    }

    pub fn start_index(self) -> usize {
        match self {
            Level::Sole | Level::Primary => 0,
            Level::Secondary { index, .. } => index,
        }
    }
}

pub fn resolve_level(offset: u32, attributes: ChdAttributes, entries: &[BaseClassEntry]) -> Option<Level> {
    if offset == 0 {
        let inherits = attributes.intersects(ChdAttributes::MULTIPLE_INHERITANCE | ChdAttributes::VIRTUAL_INHERITANCE);
        return Some(if inherits { Level::Primary } else { Level::Sole });
    }
    let offset = offset as i32;
    if let Some(index) = entries.iter().position(|e| e.pmd.mdisp == offset) {
        return Some(Level::Secondary { index, heuristic: false });
    }
    entries
        .iter()
        .position(|e| e.pmd.pdisp != -1)
        .map(|index| Level::Secondary { index, heuristic: true })
}

/// `"{first}: {b1}, {b2};"` from the level's entry onward.
pub fn hierarchy_text(names: &NameSynthesizer<'_>, level: Level, col_name: &str, entries: &[BaseClassEntry]) -> String {
    if level == Level::Sole && entries.len() <= 1 {
        return format!("{}: ", names.prefixed_name(col_name));
    }

    let mut text = String::new();
    let mut placed = 0;
    for entry in entries.iter().skip(level.start_index()) {
        text.push_str(&names.prefixed_name(&entry.mangled));
        text.push_str(if placed == 0 { ": " } else { ", " });
        placed += 1;
    }
    if placed > 1 {
        text.truncate(text.len() - 2);
        text.push(';');
    }
    text
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindOutcome {
    Bound { row: usize, top_level: bool, code_fixed: usize },
    AlreadyBound,
    NotVftable,
    /// Plausible vftable whose offset matches no base class entry. Its
    /// cells were still retyped.
    Unresolved { code_fixed: usize },
}

/// Pairs a vftable with its locator: names both, appends a result row and
/// writes the separator comment.
pub struct VftableBinder<'c, 'a> {
    ctx: &'c mut ScanContext<'a>,
}

impl<'c, 'a> VftableBinder<'c, 'a> {
    pub fn new(ctx: &'c mut ScanContext<'a>) -> Self {
        Self { ctx }
    }

    pub fn bind<D, R>(&mut self, db: &mut D, results: &mut R, vftable: Address, col_ea: Address) -> BindOutcome
    where
        D: Database + ?Sized,
        R: ResultStore + ?Sized,
    {
        if self.ctx.working.is_vftable_bound(vftable) {
            return BindOutcome::AlreadyBound;
        }
        let col = match CompleteObjectLocator::read(db, col_ea, self.ctx.mode) {
            Ok(col) => col,
            Err(e) => {
                log::debug!("{}: locator {} unreadable: {}", vftable, col_ea, e);
                return BindOutcome::NotVftable;
            }
        };
        let col_name = match self.ctx.validator().type_name(db, col.type_descriptor) {
            Some(name) => name,
            None => return BindOutcome::NotVftable,
        };
        let synth = self.ctx.names();

        let extent = match scan_vtable_extent(db, &mut self.ctx.validator(), vftable) {
            Some(extent) => extent,
            None => {
                log::warn!("{}: no vftable follows locator {} ({})", vftable, col_ea, col_name);
                synth.assign(db, col_ea, &names::locator_name(&col_name));
                return BindOutcome::NotVftable;
            }
        };
        self.ctx.working.mark_vftable_bound(vftable);
        let code_fixed = self.fix_extent(db, &extent);

        let reconstructor = HierarchyReconstructor::new(&*db);
        let chd = match reconstructor.hierarchy(&col) {
            Ok(chd) => chd,
            Err(e) => {
                log::warn!("{}: hierarchy of {} unreadable: {}", vftable, col_ea, e);
                return BindOutcome::Unresolved { code_fixed };
            }
        };
        let entries = match reconstructor.build_base_list(&col, &mut self.ctx.validator()) {
            Ok(entries) => entries,
            Err(e) => {
                log::warn!("{}: base list of {} unreadable: {}", vftable, col_ea, e);
                return BindOutcome::Unresolved { code_fixed };
            }
        };

        let level = match resolve_level(col.offset, chd.attributes, &entries) {
            Some(level) => level,
            None => {
                log::warn!(
                    "{}: no base of {} sits at offset 0x{:X}, skipping",
                    vftable,
                    col_name,
                    col.offset
                );
                return BindOutcome::Unresolved { code_fixed };
            }
        };
        if let Level::Secondary { index, heuristic: true } = level {
            log::warn!(
                "{}: offset 0x{:X} of {} matched base {} by displacement only",
                vftable,
                col.offset,
                col_name,
                index
            );
        }

        let (vftable_label, col_label) = match level {
            Level::Sole | Level::Primary => (names::vftable_name(&col_name), names::locator_name(&col_name)),
            Level::Secondary { index, .. } => {
                let combined = names::combined_name(&col_name, &entries[index].mangled);
                (format!("{}{}", VFTABLE_PREFIX, combined), format!("{}{}", COL_PREFIX, combined))
            }
        };
        synth.assign(db, vftable, &vftable_label);
        synth.assign(db, col_ea, &col_label);

        let hierarchy = hierarchy_text(&synth, level, &col_name, &entries);
        let label = synth.display_name(&col_name);
        let flags = RowFlags::from_hierarchy_attributes(chd.attributes.bits(), level.is_top_level());
        let row = results.append(ResultRow::new(vftable, extent.method_count, flags, &label, &hierarchy));

        self.write_separator(db, vftable, &col_name, &hierarchy, chd.attributes);
        log::debug!(
            "{}: {} methods, {} ({})",
            vftable,
            extent.method_count,
            label,
            if level.is_top_level() { "top level" } else { "secondary" }
        );

        BindOutcome::Bound { row, top_level: level.is_top_level(), code_fixed }
    }

    fn fix_extent<D: Database + ?Sized>(&mut self, db: &mut D, extent: &VftableExtent) -> usize {
        let width = self.ctx.mode.width();
        for cell in extent.cells(width) {
            db.make_pointer(cell, width);
        }
        let fixed = extent.unclassified.iter().filter(|target| db.make_code(**target)).count();
        if let Some(padding) = extent.padding {
            db.make_pointer(padding, width);
        }
        fixed
    }

    fn write_separator<D: Database + ?Sized>(
        &mut self,
        db: &mut D,
        vftable: Address,
        col_name: &str,
        hierarchy: &str,
        attributes: ChdAttributes,
    ) {
        let anchor = match vftable.checked_sub(self.ctx.mode.pointer_size()) {
            Some(anchor) => anchor,
            None => return,
        };
        let keyword = if is_class_name(col_name) { "class" } else { "struct" };
        let mut text = format!("\n; {} {}", keyword, hierarchy);
        let marker = attributes.inheritance_label();
        if !marker.is_empty() {
            text.push_str("  ");
            text.push_str(marker);
        }

        if self.ctx.config.overwrite_comments {
            db.clear_leading_comments(anchor);
            db.set_leading_comment(anchor, &text);
        } else if !db.has_leading_comment(anchor) {
            db.set_leading_comment(anchor, &text);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::AnnotationSink;
    use crate::output::table::ResultTable;
    use crate::rtti::fixture::RttiImage;
    use crate::memory::ImageDatabase;
    use crate::rtti::layout::{BcdAttributes, Pmd};
    use crate::rtti::scan::ScanConfig;
    use crate::rtti::working_set::WorkingSet;
    use crate::symbol::MsvcTypeDemangler;

    fn entry(mangled: &str, mdisp: i32, pdisp: i32) -> BaseClassEntry {
        BaseClassEntry {
            mangled: mangled.to_string(),
            pmd: Pmd { mdisp, pdisp, vdisp: 0 },
            attributes: BcdAttributes::empty(),
            descriptor: Address::zero(),
        }
    }

    #[test]
    fn test_extent_stops_at_zero_cell() {
        for width in [PointerWidth::Bits32, PointerWidth::Bits64] {
            let mut image = RttiImage::new(width);
            let col = image.simple_class(".?AVWidget@@");
            let vftable = image.vftable(col, 3);
            let db = image.database();
            let mut ws = WorkingSet::new();
            let mut validator = StructureValidator::new(image.mode(), &mut ws, &MsvcTypeDemangler);

            let extent = scan_vtable_extent(&db, &mut validator, vftable).unwrap();
            assert_eq!(extent.method_count, 3);
            assert_eq!(extent.unclassified.len(), 3);
            assert_eq!(extent.padding, Some(vftable + 3 * width.bytes()));
            assert_eq!(extent.end, vftable + 3 * width.bytes());
        }
    }

    #[test]
    fn test_extent_rejects_unloaded_or_typed_first_cell() {
        let mut image = RttiImage::new(PointerWidth::Bits64);
        let col = image.simple_class(".?AVWidget@@");
        let vftable = image.vftable(col, 2);
        let mut db = image.database();
        let mut ws = WorkingSet::new();
        let mut validator = StructureValidator::new(image.mode(), &mut ws, &MsvcTypeDemangler);

        assert!(scan_vtable_extent(&db, &mut validator, Address::new(0x10)).is_none());
        db.make_dword(vftable);
        assert!(scan_vtable_extent(&db, &mut validator, vftable).is_none());
    }

    #[test]
    fn test_extent_stops_at_referenced_cell() {
        let mut image = RttiImage::new(PointerWidth::Bits32);
        let col = image.simple_class(".?AVWidget@@");
        let vftable = image.vftable(col, 4);
        let mut db = image.database();
        db.add_xref(vftable + 8);
        let mut ws = WorkingSet::new();
        let mut validator = StructureValidator::new(image.mode(), &mut ws, &MsvcTypeDemangler);

        let extent = scan_vtable_extent(&db, &mut validator, vftable).unwrap();
        assert_eq!(extent.method_count, 2);
        assert_eq!(extent.padding, None);
    }

    #[test]
    fn test_extent_stops_at_data_target() {
        let mut image = RttiImage::new(PointerWidth::Bits64);
        let col = image.simple_class(".?AVWidget@@");
        let vftable = image.vftable(col, 2);
        let text = image.alloc(6, 1);
        image.put_bytes(text, b"hello\0");
        image.put_ptr(vftable + 2 * 8, text.as_u64());
        let mut db = image.database();
        let mut results = ResultTable::new();
        let mut ws = WorkingSet::new();

        assert_eq!(
            bind(&image, &mut db, &mut results, &mut ws, vftable, col),
            BindOutcome::Bound { row: 0, top_level: true, code_fixed: 2 }
        );
        assert_eq!(results.get(0).unwrap().method_count, 2);
        assert_eq!(db.item_kind(text), ItemKind::Unknown);
        assert_eq!(db.item_kind(vftable + 2 * 8), ItemKind::Unknown);
    }

    #[test]
    fn test_resolve_level() {
        let entries = vec![entry(".?AVC@@", 0, -1), entry(".?AVA@@", 0, -1), entry(".?AVB@@", 8, -1)];
        let mi = ChdAttributes::MULTIPLE_INHERITANCE;
        assert_eq!(resolve_level(0, ChdAttributes::empty(), &entries), Some(Level::Sole));
        assert_eq!(resolve_level(0, mi, &entries), Some(Level::Primary));
        assert_eq!(
            resolve_level(8, mi, &entries),
            Some(Level::Secondary { index: 2, heuristic: false })
        );
        assert_eq!(resolve_level(0x20, mi, &entries), None);

        let virtual_base = vec![entry(".?AVC@@", 0, -1), entry(".?AVV@@", 0, 4)];
        assert_eq!(
            resolve_level(0x10, ChdAttributes::VIRTUAL_INHERITANCE, &virtual_base),
            Some(Level::Secondary { index: 1, heuristic: true })
        );
    }

    #[test]
    fn test_hierarchy_text() {
        let names = NameSynthesizer::new(&MsvcTypeDemangler, 4);
        let single = vec![entry(".?AVWidget@@", 0, -1)];
        assert_eq!(hierarchy_text(&names, Level::Sole, ".?AVWidget@@", &single), "Widget: ");

        let three = vec![entry(".?AVA@@", 0, -1), entry(".?AVB@@", 0, -1), entry(".?AUC@@", 0, -1)];
        assert_eq!(hierarchy_text(&names, Level::Sole, ".?AVA@@", &three), "A: B, struct C;");
        assert_eq!(hierarchy_text(&names, Level::Primary, ".?AVA@@", &three), "A: B, struct C;");
        assert_eq!(
            hierarchy_text(&names, Level::Secondary { index: 2, heuristic: false }, ".?AVA@@", &three),
            "struct C: "
        );
        assert_eq!(
            hierarchy_text(&names, Level::Secondary { index: 1, heuristic: false }, ".?AVA@@", &three),
            "B: struct C;"
        );
    }

    fn bind(
        image: &RttiImage,
        db: &mut ImageDatabase,
        results: &mut ResultTable,
        ws: &mut WorkingSet,
        vftable: Address,
        col: Address,
    ) -> BindOutcome {
        bind_with(&ScanConfig::default(), image, db, results, ws, vftable, col)
    }

    fn bind_with(
        config: &ScanConfig,
        image: &RttiImage,
        db: &mut ImageDatabase,
        results: &mut ResultTable,
        ws: &mut WorkingSet,
        vftable: Address,
        col: Address,
    ) -> BindOutcome {
        let mut ctx = ScanContext::new(image.mode(), config, ws, &MsvcTypeDemangler);
        VftableBinder::new(&mut ctx).bind(db, results, vftable, col)
    }

    #[test]
    fn test_bind_sole_class() {
        for width in [PointerWidth::Bits32, PointerWidth::Bits64] {
            let mut image = RttiImage::new(width);
            let col = image.simple_class(".?AVWidget@@");
            let vftable = image.vftable(col, 3);
            let mut db = image.database();
            let mut results = ResultTable::new();
            let mut ws = WorkingSet::new();

            let outcome = bind(&image, &mut db, &mut results, &mut ws, vftable, col);
            assert_eq!(outcome, BindOutcome::Bound { row: 0, top_level: true, code_fixed: 3 });

            let row = results.get(0).unwrap();
            assert_eq!(row.method_count, 3);
            assert_eq!(row.decode(), Some(("Widget", "Widget: ")));
            assert_eq!(row.flags, RowFlags::TOP_LEVEL);
            assert_eq!(db.name_at(vftable), Some("??_7Widget@@6B@"));
            assert_eq!(db.name_at(col), Some("??_R4Widget@@6B@"));
            assert_eq!(db.item_kind(vftable), ItemKind::Pointer(width));
            assert_eq!(
                db.leading_comments(vftable - width.bytes()),
                &["\n; class Widget: ".to_string()]
            );
        }
    }

    #[test]
    fn test_bind_is_idempotent() {
        let mut image = RttiImage::new(PointerWidth::Bits32);
        let col = image.simple_class(".?AUPoint@@");
        let vftable = image.vftable(col, 1);
        let mut db = image.database();
        let mut results = ResultTable::new();
        let mut ws = WorkingSet::new();

        assert!(matches!(
            bind(&image, &mut db, &mut results, &mut ws, vftable, col),
            BindOutcome::Bound { .. }
        ));
        let named = db.named_count();
        assert_eq!(
            bind(&image, &mut db, &mut results, &mut ws, vftable, col),
            BindOutcome::AlreadyBound
        );
        assert_eq!(results.count(), 1);
        assert_eq!(db.named_count(), named);
    }

    #[test]
    fn test_bind_multiple_inheritance() {
        let mut image = RttiImage::new(PointerWidth::Bits64);
        let td_c = image.type_descriptor(".?AVC@@");
        let td_a = image.type_descriptor(".?AVA@@");
        let td_b = image.type_descriptor(".?AVB@@");
        let bcd_c = image.base_class(td_c, 2, Pmd::default(), 0, None);
        let bcd_a = image.base_class(td_a, 0, Pmd { mdisp: 0, pdisp: -1, vdisp: 0 }, 0, None);
        let bcd_b = image.base_class(td_b, 0, Pmd { mdisp: 8, pdisp: -1, vdisp: 0 }, 0, None);
        let chd = image.hierarchy(0x1, &[bcd_c, bcd_a, bcd_b]);
        let primary_col = image.locator(0, td_c, chd);
        let secondary_col = image.locator(8, td_c, chd);
        let primary = image.vftable(primary_col, 2);
        let secondary = image.vftable(secondary_col, 1);

        let mut db = image.database();
        let mut results = ResultTable::new();
        let mut ws = WorkingSet::new();
        bind(&image, &mut db, &mut results, &mut ws, primary, primary_col);
        bind(&image, &mut db, &mut results, &mut ws, secondary, secondary_col);

        let top = results.get(0).unwrap();
        assert_eq!(top.decode(), Some(("C", "C: A, B;")));
        assert_eq!(top.flags, RowFlags::TOP_LEVEL | RowFlags::MULTIPLE_INHERITANCE);

        let sub = results.get(1).unwrap();
        assert_eq!(sub.decode(), Some(("C", "B: ")));
        assert!(!sub.is_top_level());
        assert_eq!(db.name_at(secondary), Some("??_7C@@6BB@@@"));
        assert_eq!(db.name_at(secondary_col), Some("??_R4C@@6BB@@@"));
        assert_eq!(
            db.leading_comments(primary - 8),
            &["\n; class C: A, B;  [MI]".to_string()]
        );
    }

    #[test]
    fn test_unresolved_offset_emits_no_row() {
        let mut image = RttiImage::new(PointerWidth::Bits32);
        let td = image.type_descriptor(".?AVC@@");
        let bcd = image.base_class(td, 0, Pmd { mdisp: 0, pdisp: -1, vdisp: 0 }, 0, None);
        let chd = image.hierarchy(0x1, &[bcd]);
        let col = image.locator(0x40, td, chd);
        let vftable = image.vftable(col, 1);
        let mut db = image.database();
        let mut results = ResultTable::new();
        let mut ws = WorkingSet::new();

        assert_eq!(
            bind(&image, &mut db, &mut results, &mut ws, vftable, col),
            BindOutcome::Unresolved { code_fixed: 1 }
        );
        assert!(results.is_empty());
        assert_eq!(db.item_kind(vftable), ItemKind::Pointer(PointerWidth::Bits32));
    }

    #[test]
    fn test_separator_comment_overwrite_mode() {
        for (overwrite, expected) in [(true, "\n; class Widget: "), (false, "; stale")] {
            let mut image = RttiImage::new(PointerWidth::Bits32);
            let col = image.simple_class(".?AVWidget@@");
            let vftable = image.vftable(col, 1);
            let mut db = image.database();
            db.set_leading_comment(vftable - 4, "; stale");
            let mut results = ResultTable::new();
            let mut ws = WorkingSet::new();
            let config = ScanConfig { overwrite_comments: overwrite, ..ScanConfig::default() };

            bind_with(&config, &image, &mut db, &mut results, &mut ws, vftable, col);
            assert_eq!(db.leading_comments(vftable - 4), &[expected.to_string()], "overwrite={}", overwrite);
        }
    }

    #[test]
    fn test_failed_extent_still_names_locator() {
        let mut image = RttiImage::new(PointerWidth::Bits32);
        let col = image.simple_class(".?AVWidget@@");
        let vftable = image.vftable(col, 0);
        let mut db = image.database();
        let mut results = ResultTable::new();
        let mut ws = WorkingSet::new();

        assert_eq!(bind(&image, &mut db, &mut results, &mut ws, vftable, col), BindOutcome::NotVftable);
        assert_eq!(db.name_at(col), Some("??_R4Widget@@6B@"));
        assert!(db.name_at(vftable).is_none());
    }
}
