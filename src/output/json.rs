// Thu Jan 15 2026 - Alex

use crate::output::table::ResultRow;
use crate::output::ExportError;
use crate::rtti::{ScanReport, TargetInfo};
use serde_json::{json, to_string, to_string_pretty, Value};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

pub struct JsonSerializer {
    pretty_print: bool,
    include_orphans: bool,
    include_statistics: bool,
}

impl Default for JsonSerializer {
    fn default() -> Self {
        Self::new()
    }
}

impl JsonSerializer {
    pub fn new() -> Self {
        Self {
            pretty_print: true,
            include_orphans: true,
            include_statistics: true,
        }
    }

    pub fn with_pretty_print(mut self, pretty: bool) -> Self {
        self.pretty_print = pretty;
        self
    }

    pub fn with_orphans(mut self, include: bool) -> Self {
        self.include_orphans = include;
        self
    }

    pub fn with_statistics(mut self, include: bool) -> Self {
        self.include_statistics = include;
        self
    }

    pub fn serialize(
        &self,
        rows: &[ResultRow],
        report: &ScanReport,
        target: Option<&TargetInfo>,
    ) -> Result<String, ExportError> {
        let value = self.build_json_value(rows, report, target);
        let text = if self.pretty_print { to_string_pretty(&value) } else { to_string(&value) };
        text.map_err(ExportError::from)
    }

    pub fn serialize_to_file<P: AsRef<Path>>(
        &self,
        rows: &[ResultRow],
        report: &ScanReport,
        target: Option<&TargetInfo>,
        path: P,
    ) -> Result<(), ExportError> {
        let json_str = self.serialize(rows, report, target)?;
        let file = File::create(path.as_ref())?;
        let mut writer = BufWriter::new(file);
        writer.write_all(json_str.as_bytes())?;
        writer.flush()?;
        Ok(())
    }

    fn build_json_value(&self, rows: &[ResultRow], report: &ScanReport, target: Option<&TargetInfo>) -> Value {
        let mut root = serde_json::Map::new();

        root.insert("version".to_string(), json!(env!("CARGO_PKG_VERSION")));
        root.insert("status".to_string(), json!(report.status));
        root.insert("addressing".to_string(), json!(report.mode.to_string()));
        if let Some(target) = target {
            root.insert("target".to_string(), json!(target));
        }
        root.insert("vftables".to_string(), Value::Array(rows.iter().map(Self::serialize_row).collect()));

        if self.include_orphans {
            let orphans: Vec<Value> = report.orphaned_cols.iter().map(|col| json!(format!("0x{:X}", col.as_u64()))).collect();
            root.insert("orphaned_locators".to_string(), Value::Array(orphans));
        }
        if self.include_statistics {
            root.insert("statistics".to_string(), Self::serialize_statistics(report));
        }
        Value::Object(root)
    }

    fn serialize_row(row: &ResultRow) -> Value {
        let (label, hierarchy, overflowed) = match row.decode() {
            Some((label, hierarchy)) => (label, hierarchy, false),
            None => (row.text(), "", true),
        };
        json!({
            "address": format!("0x{:X}", row.vftable.as_u64()),
            "methods": row.method_count,
            "flags": row.flags.bits(),
            "flag_names": row.flags.labels(),
            "top_level": row.is_top_level(),
            "label": label,
            "hierarchy": hierarchy,
            "overflowed": overflowed,
        })
    }

    fn serialize_statistics(report: &ScanReport) -> Value {
        json!({
            "rows": report.rows,
            "locators_found": report.cols_found.len(),
            "locators_matched": report.matched_cols,
            "locators_orphaned": report.orphaned_cols.len(),
            "vftables_bound": report.vftables_bound,
            "vftables_fixed": report.vftables_fixed,
            "code_locations_fixed": report.code_locations_fixed,
            "unresolved": report.unresolved,
            "working_set": report.working_set,
            "elapsed_seconds": report.elapsed.as_secs_f64(),
        })
    }
}
