// Thu Jan 15 2026 - Alex

use crate::output::table::ResultRow;
use crate::output::ExportError;
use crate::rtti::{ScanReport, TargetInfo};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

const RULE: &str = "================================================================================";

pub struct ReportGenerator {
    format: ReportFormat,
    include_header: bool,
    include_summary: bool,
    include_orphans: bool,
    max_rows: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Text,
    Markdown,
}

/// Top-level rows with the secondary rows that follow them.
struct Group<'r> {
    primary: Option<&'r ResultRow>,
    secondary: Vec<&'r ResultRow>,
}

fn group_rows(rows: &[ResultRow]) -> Vec<Group<'_>> {
    let mut groups: Vec<Group<'_>> = Vec::new();
    for row in rows {
        if row.is_top_level() {
            groups.push(Group { primary: Some(row), secondary: Vec::new() });
            continue;
        }
        match groups.last_mut() {
            Some(group) if group.primary.map(|p| label_of(p) == label_of(row)).unwrap_or(true) => {
                group.secondary.push(row)
            }
            _ => groups.push(Group { primary: None, secondary: vec![row] }),
        }
    }
    groups
}

fn label_of(row: &ResultRow) -> &str {
    row.decode().map(|(label, _)| label).unwrap_or(row.text())
}

fn hierarchy_of(row: &ResultRow) -> &str {
    row.decode().map(|(_, hierarchy)| hierarchy).unwrap_or("<overflow>")
}

impl ReportGenerator {
    pub fn new(format: ReportFormat) -> Self {
        Self {
            format,
            include_header: true,
            include_summary: true,
            include_orphans: true,
            max_rows: None,
        }
    }

    pub fn with_header(mut self, include: bool) -> Self {
        self.include_header = include;
        self
    }

    pub fn with_summary(mut self, include: bool) -> Self {
        self.include_summary = include;
        self
    }

    pub fn with_orphans(mut self, include: bool) -> Self {
        self.include_orphans = include;
        self
    }

    pub fn with_max_rows(mut self, max: usize) -> Self {
        self.max_rows = Some(max);
        self
    }

    pub fn generate(&self, rows: &[ResultRow], report: &ScanReport, target: Option<&TargetInfo>) -> String {
        let rows = match self.max_rows {
            Some(max) => &rows[..rows.len().min(max)],
            None => rows,
        };
        match self.format {
            ReportFormat::Text => self.generate_text(rows, report, target),
            ReportFormat::Markdown => self.generate_markdown(rows, report),
        }
    }

    pub fn generate_to_file<P: AsRef<Path>>(
        &self,
        rows: &[ResultRow],
        report: &ScanReport,
        target: Option<&TargetInfo>,
        path: P,
    ) -> Result<(), ExportError> {
        let text = self.generate(rows, report, target);
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        writer.write_all(text.as_bytes())?;
        writer.flush()?;
        Ok(())
    }

    fn generate_text(&self, rows: &[ResultRow], report: &ScanReport, target: Option<&TargetInfo>) -> String {
        let mut text = String::new();

        if self.include_header {
            text.push_str(RULE);
            text.push('\n');
            text.push_str("                          RTTI VFTABLE REPORT\n");
            text.push_str(RULE);
            text.push('\n');
            if let Some(target) = target {
                text.push_str(&format!("Target: {}\n", target));
            }
            text.push_str(&format!("Addressing: {}\n", report.mode));
            text.push_str(RULE);
            text.push_str("\n\n");
        }

        if self.include_summary {
            text.push_str(&Self::text_summary(report));
            text.push('\n');
        }

        text.push_str("VFTABLES\n");
        text.push_str("--------\n");
        for group in group_rows(rows) {
            if let Some(primary) = group.primary {
                text.push_str(&Self::text_row(primary, 0));
            }
            for row in group.secondary {
                text.push_str(&Self::text_row(row, 4));
            }
        }

        if self.include_orphans && !report.orphaned_cols.is_empty() {
            text.push_str("\nORPHANED LOCATORS\n");
            text.push_str("-----------------\n");
            for col in &report.orphaned_cols {
                text.push_str(&format!("  0x{:016X}\n", col.as_u64()));
            }
        }
        text
    }

    fn text_row(row: &ResultRow, indent: usize) -> String {
        format!(
            "{:indent$}0x{:016X} {:>5}  {}  {}\n",
            "",
            row.vftable.as_u64(),
            row.method_count,
            label_of(row),
            hierarchy_of(row),
            indent = indent
        )
    }

    fn text_summary(report: &ScanReport) -> String {
        let mut summary = String::new();
        summary.push_str("SUMMARY\n");
        summary.push_str("-------\n");
        summary.push_str(&format!("Status:               {:>8}\n", format!("{:?}", report.status)));
        summary.push_str(&format!("Rows:                 {:>8}\n", report.rows));
        summary.push_str(&format!("Locators Found:       {:>8}\n", report.cols_found.len()));
        summary.push_str(&format!("Locators Matched:     {:>8}\n", report.matched_cols));
        summary.push_str(&format!("Locators Orphaned:    {:>8}\n", report.orphaned_cols.len()));
        summary.push_str(&format!("Vftables Fixed:       {:>8}\n", report.vftables_fixed));
        summary.push_str(&format!("Code Locations Fixed: {:>8}\n", report.code_locations_fixed));
        summary.push_str(&format!("Unresolved:           {:>8}\n", report.unresolved));
        summary.push_str(&format!("Scan Duration:        {:>8.3}s\n", report.elapsed.as_secs_f64()));
        summary
    }

    fn generate_markdown(&self, rows: &[ResultRow], report: &ScanReport) -> String {
        let mut md = String::new();
        if self.include_header {
            md.push_str("# RTTI Vftable Report\n\n");
        }
        if self.include_summary {
            md.push_str("## Summary\n\n");
            md.push_str("| Metric | Value |\n");
            md.push_str("|--------|-------|\n");
            md.push_str(&format!("| Rows | {} |\n", report.rows));
            md.push_str(&format!("| Locators found | {} |\n", report.cols_found.len()));
            md.push_str(&format!("| Locators orphaned | {} |\n", report.orphaned_cols.len()));
            md.push_str(&format!("| Vftables fixed | {} |\n", report.vftables_fixed));
            md.push_str(&format!("| Code locations fixed | {} |\n\n", report.code_locations_fixed));
        }

        md.push_str("## Vftables\n\n");
        md.push_str("| Address | Methods | Class | Hierarchy |\n");
        md.push_str("|---------|---------|-------|-----------|\n");
        for row in rows {
            let marker = if row.is_top_level() { "" } else { "↳ " };
            md.push_str(&format!(
                "| `0x{:X}` | {} | {}{} | {} |\n",
                row.vftable.as_u64(),
                row.method_count,
                marker,
                label_of(row),
                hierarchy_of(row).replace('|', "\\|")
            ));
        }
        md
    }
}
