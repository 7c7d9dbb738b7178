//! Report assembly: merging, ordering and rendering of findings.
//!
//! The report is a pure function of the findings put into it. Ordering is by
//! severity rank, then category, then subject, then message — never by the
//! completion order of concurrent probes — so identical inputs always produce
//! byte-identical reports.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use serde::Serialize;

use crate::model::{Finding, Severity};

/// Ordered, severity-ranked audit report with the pass/fail gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Report {
    findings: Vec<Finding>,

    /// `true` when the run was cut short by cancellation; the report is then
    /// partial rather than authoritative.
    pub incomplete: bool,
}

/// Per-severity counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ReportSummary {
    pub blocking: usize,
    pub warning: usize,
    pub info: usize,
    pub total: usize,
}

/// Stable machine-readable form: severity-partitioned findings plus the gate
/// verdict.
#[derive(Debug, Serialize)]
pub struct MachineReport<'a> {
    pub status: &'static str,
    pub incomplete: bool,
    pub summary: ReportSummary,
    pub findings: BTreeMap<Severity, Vec<&'a Finding>>,
}

impl Report {
    /// Findings in report order.
    pub fn findings(&self) -> &[Finding] {
        &self.findings
    }

    /// The gate: fail on any blocking finding, warnings and info pass.
    pub fn passed(&self) -> bool {
        !self
            .findings
            .iter()
            .any(|f| f.severity == Severity::Blocking)
    }

    pub fn summary(&self) -> ReportSummary {
        let mut summary = ReportSummary::default();
        for finding in &self.findings {
            match finding.severity {
                Severity::Blocking => summary.blocking += 1,
                Severity::Warning => summary.warning += 1,
                Severity::Info => summary.info += 1,
            }
        }
        summary.total = self.findings.len();
        summary
    }

    pub fn to_machine(&self) -> MachineReport<'_> {
        let mut partitioned: BTreeMap<Severity, Vec<&Finding>> = BTreeMap::new();
        for severity in [Severity::Blocking, Severity::Warning, Severity::Info] {
            partitioned.insert(severity, Vec::new());
        }
        for finding in &self.findings {
            partitioned.entry(finding.severity).or_default().push(finding);
        }
        MachineReport {
            status: if self.passed() { "pass" } else { "fail" },
            incomplete: self.incomplete,
            summary: self.summary(),
            findings: partitioned,
        }
    }

    /// Human-readable rendering with per-severity sections.
    pub fn render_text(&self) -> String {
        let summary = self.summary();
        let mut out = String::new();
        let _ = writeln!(out, "{}", "=".repeat(60));
        let _ = writeln!(out, "ECOSYSTEM AUDIT REPORT");
        let _ = writeln!(out, "{}", "=".repeat(60));
        if self.incomplete {
            let _ = writeln!(out, "NOTE: run was cancelled; report is partial");
        }
        let _ = writeln!(out);

        for severity in [Severity::Blocking, Severity::Warning, Severity::Info] {
            let section: Vec<&Finding> = self
                .findings
                .iter()
                .filter(|f| f.severity == severity)
                .collect();
            let _ = writeln!(
                out,
                "{}: {}",
                severity.as_str().to_uppercase(),
                section.len()
            );
            for finding in section {
                let _ = writeln!(out, "  - {} {}: {}", finding.category, finding.subject, finding.message);
                if let Some(hint) = &finding.remediation {
                    let _ = writeln!(out, "      hint: {hint}");
                }
            }
            let _ = writeln!(out);
        }

        let _ = writeln!(out, "{}", "-".repeat(60));
        let _ = writeln!(
            out,
            "STATUS: {} ({} blocking, {} warning, {} info)",
            if self.passed() { "PASS" } else { "FAIL" },
            summary.blocking,
            summary.warning,
            summary.info
        );
        let _ = writeln!(out, "{}", "=".repeat(60));
        out
    }
}

/// Accumulates finding lists from the loader, graph builder and checks, then
/// produces the ordered [`Report`].
#[derive(Debug, Default)]
pub struct ReportBuilder {
    findings: Vec<Finding>,
    incomplete: bool,
}

impl ReportBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, finding: Finding) {
        self.findings.push(finding);
    }

    pub fn extend(&mut self, findings: impl IntoIterator<Item = Finding>) {
        self.findings.extend(findings);
    }

    pub fn mark_incomplete(&mut self) {
        self.incomplete = true;
    }

    /// Sorts into the canonical order and seals the report.
    pub fn build(mut self) -> Report {
        self.findings
            .sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
        Report {
            findings: self.findings,
            incomplete: self.incomplete,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
