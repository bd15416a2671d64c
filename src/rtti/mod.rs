// Wed Jan 14 2026 - Alex

pub mod addressing;
pub mod annotate;
pub mod context;
pub mod error;
pub mod hierarchy;
pub mod layout;
pub mod names;
pub mod scan;
pub mod target;
pub mod validator;
pub mod vftable;
pub mod working_set;

#[cfg(test)]
pub mod fixture;

pub use addressing::{Addressing, AddressingMode};
pub use annotate::StructureAnnotator;
pub use context::ScanContext;
pub use error::TargetError;
pub use hierarchy::{BaseClassEntry, HierarchyReconstructor};
pub use layout::{ChdAttributes, BcdAttributes, RecordKind};
pub use names::NameSynthesizer;
pub use scan::{CancelToken, ScanConfig, ScanPass, ScanProgress, ScanReport, ScanSession, ScanStatus, SegmentSelection};
pub use target::{Compiler, TargetInfo};
pub use validator::StructureValidator;
pub use vftable::{BindOutcome, Level, VftableBinder, VftableExtent};
pub use working_set::{WorkingSet, WorkingSetStats};
