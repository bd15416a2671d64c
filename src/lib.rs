// Tue Jan 15 2026 - Alex

pub mod config;
pub mod memory;
pub mod output;
pub mod rtti;
pub mod symbol;
pub mod utils;

pub use config::Config;
pub use memory::{BinaryImage, ImageDatabase};
pub use output::{ResultTable, ResultStore};
pub use rtti::{ScanReport, ScanSession, TargetInfo};
