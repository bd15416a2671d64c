// Wed Jan 14 2026 - Alex

use crate::rtti::addressing::AddressingMode;
use crate::rtti::names::NameSynthesizer;
use crate::rtti::scan::ScanConfig;
use crate::rtti::validator::StructureValidator;
use crate::rtti::working_set::WorkingSet;
use crate::symbol::Demangler;

/// Borrowed session state shared by the annotator and the binder.
pub struct ScanContext<'a> {
    pub mode: AddressingMode,
    pub config: &'a ScanConfig,
    pub working: &'a mut WorkingSet,
    pub demangler: &'a dyn Demangler,
}

impl<'a> ScanContext<'a> {
    pub fn new(
        mode: AddressingMode,
        config: &'a ScanConfig,
        working: &'a mut WorkingSet,
        demangler: &'a dyn Demangler,
    ) -> Self {
        Self { mode, config, working, demangler }
    }

    pub fn validator(&mut self) -> StructureValidator<'_> {
        StructureValidator::new(self.mode, self.working, self.demangler)
    }

    pub fn names(&self) -> NameSynthesizer<'a> {
        NameSynthesizer::new(self.demangler, self.config.name_retry_limit)
    }
}
