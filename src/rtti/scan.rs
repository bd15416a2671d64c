// Wed Jan 14 2026 - Alex

use crate::memory::{Address, AddressSpace, Database, MemoryRange, Segment};
use crate::output::table::ResultStore;
use crate::rtti::addressing::AddressingMode;
use crate::rtti::annotate::StructureAnnotator;
use crate::rtti::context::ScanContext;
use crate::rtti::layout::RecordKind;
use crate::rtti::vftable::{BindOutcome, VftableBinder};
use crate::rtti::working_set::{WorkingSet, WorkingSetStats};
use crate::symbol::{Demangler, MsvcTypeDemangler};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Locators and vftables are only looked for at this alignment.
pub const RECORD_ALIGNMENT: u64 = 4;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentSelection {
    Named(String),
    Range { start: u64, end: u64 },
}

impl SegmentSelection {
    fn clip(&self, segment: &Segment) -> Option<MemoryRange> {
        match self {
            SegmentSelection::Named(name) if segment.name() == name => Some(*segment.range()),
            SegmentSelection::Named(_) => None,
            SegmentSelection::Range { start, end } => {
                let wanted = MemoryRange::new(Address::new(*start), Address::new(*end));
                segment.range().intersects(&wanted)
            }
        }
    }
}

impl fmt::Display for SegmentSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SegmentSelection::Named(name) => write!(f, "{}", name),
            SegmentSelection::Range { start, end } => write!(f, "0x{:X}-0x{:X}", start, end),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    pub place_structures: bool,
    pub overwrite_comments: bool,
    /// `None` scans every non-code segment.
    pub segments: Option<Vec<SegmentSelection>>,
    pub cancel_check_interval: usize,
    pub name_retry_limit: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            place_structures: true,
            overwrite_comments: false,
            segments: None,
            cancel_check_interval: 0x1000,
            name_retry_limit: 1000,
        }
    }
}

impl ScanConfig {
    /// Ranges both passes walk, in address order. Overlapping selections
    /// are merged.
    pub fn scan_ranges<S: AddressSpace + ?Sized>(&self, space: &S) -> Vec<(String, MemoryRange)> {
        let mut ranges = Vec::new();
        for segment in space.segments() {
            match &self.segments {
                None if !segment.is_code() => ranges.push((segment.name().to_string(), *segment.range())),
                None => {}
                Some(selections) => {
                    for selection in selections {
                        if let Some(range) = selection.clip(segment) {
                            ranges.push((segment.name().to_string(), range));
                        }
                    }
                }
            }
        }
        ranges.sort_by_key(|(_, range)| range.start());

        let mut merged: Vec<(String, MemoryRange)> = Vec::with_capacity(ranges.len());
        for (name, range) in ranges {
            match merged.last_mut() {
                Some((_, last)) if range.start() < last.end() => {
                    if range.end() > last.end() {
                        *last = MemoryRange::new(last.start(), range.end());
                    }
                }
                _ => merged.push((name, range)),
            }
        }
        merged
    }
}

/// Cooperative cancellation flag shared with whoever drives the scan.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanPass {
    Locators,
    Vftables,
}

impl fmt::Display for ScanPass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanPass::Locators => write!(f, "Scanning for complete object locators"),
            ScanPass::Vftables => write!(f, "Scanning for vftables"),
        }
    }
}

/// Snapshot handed to the progress callback at every checkpoint.
#[derive(Debug, Clone, Copy)]
pub struct ScanProgress<'a> {
    pub pass: ScanPass,
    pub segment: &'a str,
    pub address: Address,
    /// Locators in the first pass, bound vftables in the second.
    pub found: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanStatus {
    Completed,
    Aborted,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    pub status: ScanStatus,
    pub mode: AddressingMode,
    pub rows: usize,
    pub cols_found: Vec<Address>,
    pub matched_cols: usize,
    pub vftables_bound: usize,
    pub orphaned_cols: Vec<Address>,
    pub vftables_fixed: usize,
    pub code_locations_fixed: usize,
    pub unresolved: usize,
    pub working_set: WorkingSetStats,
    #[serde(serialize_with = "serialize_seconds")]
    pub elapsed: Duration,
}

fn serialize_seconds<S: Serializer>(elapsed: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(elapsed.as_secs_f64())
}

impl ScanReport {
    fn new(mode: AddressingMode) -> Self {
        Self {
            status: ScanStatus::Completed,
            mode,
            rows: 0,
            cols_found: Vec::new(),
            matched_cols: 0,
            vftables_bound: 0,
            orphaned_cols: Vec::new(),
            vftables_fixed: 0,
            code_locations_fixed: 0,
            unresolved: 0,
            working_set: WorkingSetStats::default(),
            elapsed: Duration::ZERO,
        }
    }

    pub fn is_aborted(&self) -> bool {
        self.status == ScanStatus::Aborted
    }
}

pub type ProgressCallback = Box<dyn FnMut(&ScanProgress<'_>)>;

struct Monitor {
    cancel: CancelToken,
    interval: usize,
    ticks: usize,
    progress: Option<ProgressCallback>,
}

impl Monitor {
    /// Returns false once the scan has to stop.
    fn checkpoint(&mut self, progress: ScanProgress<'_>) -> bool {
        self.ticks += 1;
        if self.ticks % self.interval.max(1) != 0 {
            return true;
        }
        if let Some(callback) = self.progress.as_mut() {
            callback(&progress);
        }
        !self.cancel.is_cancelled()
    }
}

/// One scan over one image. Owns the working set for the run's duration.
pub struct ScanSession {
    mode: AddressingMode,
    config: ScanConfig,
    working: WorkingSet,
    demangler: Box<dyn Demangler>,
    monitor: Monitor,
}

impl ScanSession {
    pub fn new(mode: AddressingMode, config: ScanConfig) -> Self {
        let interval = config.cancel_check_interval;
        Self {
            mode,
            config,
            working: WorkingSet::new(),
            demangler: Box::new(MsvcTypeDemangler),
            monitor: Monitor {
                cancel: CancelToken::new(),
                interval,
                ticks: 0,
                progress: None,
            },
        }
    }

    pub fn with_demangler(mut self, demangler: Box<dyn Demangler>) -> Self {
        self.demangler = demangler;
        self
    }

    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.monitor.cancel = token;
        self
    }

    pub fn with_progress<F>(mut self, callback: F) -> Self
    where
        F: FnMut(&ScanProgress<'_>) + 'static,
    {
        self.monitor.progress = Some(Box::new(callback));
        self
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.monitor.cancel.clone()
    }

    pub fn mode(&self) -> AddressingMode {
        self.mode
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    pub fn run<D, R>(&mut self, db: &mut D, results: &mut R) -> ScanReport
    where
        D: Database + ?Sized,
        R: ResultStore + ?Sized,
    {
        let started = Instant::now();
        let mut report = ScanReport::new(self.mode);
        let ranges = self.config.scan_ranges(db);
        if ranges.is_empty() {
            log::warn!("no segments selected for scanning");
        }
        self.monitor.ticks = 0;

        let completed = self.find_locators(db, &ranges, &mut report)
            && self.bind_vftables(db, results, &ranges, &mut report);
        if !completed {
            report.status = ScanStatus::Aborted;
            log::warn!("scan cancelled, keeping {} rows committed so far", report.rows);
        }

        report.working_set = self.working.stats();
        self.working.clear();
        report.elapsed = started.elapsed();
        report
    }

    fn find_locators<D: Database + ?Sized>(
        &mut self,
        db: &mut D,
        ranges: &[(String, MemoryRange)],
        report: &mut ScanReport,
    ) -> bool {
        let signature = self.mode.col_signature();
        let col_size = RecordKind::CompleteObjectLocator.size(self.mode.width());
        let mut ctx = ScanContext::new(self.mode, &self.config, &mut self.working, &*self.demangler);

        for (name, range) in ranges {
            let mut ea = range.start().align_up(RECORD_ALIGNMENT as usize);
            while range.contains_span(ea, RECORD_ALIGNMENT) {
                let progress = ScanProgress {
                    pass: ScanPass::Locators,
                    segment: name,
                    address: ea,
                    found: report.cols_found.len(),
                };
                if !self.monitor.checkpoint(progress) {
                    return false;
                }

                // Ranges are disjoint and ascending, so no address is visited twice.
                if db.read_u32(ea).ok() == Some(signature) && ctx.validator().is_valid_complete_object_locator(db, ea) {
                    report.cols_found.push(ea);
                    StructureAnnotator::new(&mut ctx).annotate_locator(db, ea);
                    ea = ea + col_size;
                } else {
                    ea = ea + RECORD_ALIGNMENT;
                }
            }
        }
        log::info!("found {} complete object locators", report.cols_found.len());
        true
    }

    fn bind_vftables<D, R>(
        &mut self,
        db: &mut D,
        results: &mut R,
        ranges: &[(String, MemoryRange)],
        report: &mut ScanReport,
    ) -> bool
    where
        D: Database + ?Sized,
        R: ResultStore + ?Sized,
    {
        let width = self.mode.width();
        let ptr = width.bytes();
        let mut hits: IndexMap<Address, u32> = report.cols_found.iter().map(|col| (*col, 0)).collect();
        let mut ctx = ScanContext::new(self.mode, &self.config, &mut self.working, &*self.demangler);

        let mut completed = true;
        'ranges: for (name, range) in ranges {
            let mut ea = range.start().align_up(RECORD_ALIGNMENT as usize);
            while range.contains_span(ea, 2 * ptr) {
                let progress = ScanProgress {
                    pass: ScanPass::Vftables,
                    segment: name,
                    address: ea,
                    found: report.vftables_bound,
                };
                if !self.monitor.checkpoint(progress) {
                    completed = false;
                    break 'ranges;
                }

                if let Ok(col) = db.read_ptr(ea, width) {
                    if hits.contains_key(&col) {
                        let vftable = ea + ptr;
                        let into_code = db
                            .read_ptr(vftable, width)
                            .ok()
                            .and_then(|first| db.segment_at(first))
                            .map_or(false, |s| s.is_code());
                        if into_code {
                            let outcome = VftableBinder::new(&mut ctx).bind(db, results, vftable, col);
                            Self::record(report, outcome);
                            if let Some(count) = hits.get_mut(&col) {
                                *count += 1;
                            }
                        }
                    }
                }
                ea = ea + RECORD_ALIGNMENT;
            }
        }

        report.matched_cols = hits.values().filter(|count| **count > 0).count();
        report.orphaned_cols = hits
            .iter()
            .filter(|(_, count)| **count == 0)
            .map(|(col, _)| *col)
            .collect();
        if completed {
            log::info!(
                "bound {} vftables, {} locators without one",
                report.vftables_bound,
                report.orphaned_cols.len()
            );
        }
        completed
    }

    fn record(report: &mut ScanReport, outcome: BindOutcome) {
        match outcome {
            BindOutcome::Bound { code_fixed, .. } => {
                report.rows += 1;
                report.vftables_bound += 1;
                Self::record_fixes(report, code_fixed);
            }
            BindOutcome::Unresolved { code_fixed } => {
                report.unresolved += 1;
                Self::record_fixes(report, code_fixed);
            }
            BindOutcome::AlreadyBound | BindOutcome::NotVftable => {}
        }
    }

    fn record_fixes(report: &mut ScanReport, code_fixed: usize) {
        if code_fixed > 0 {
            report.vftables_fixed += 1;
            report.code_locations_fixed += code_fixed;
        }
    }
}
