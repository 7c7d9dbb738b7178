//! # Ecosystem Auditor
//!
//! Consistency auditor for a multi-repository ecosystem described by a
//! canonical JSON index plus per-repository YAML metadata overrides.
//!
//! The audit is a pipeline of stages:
//!
//! 1. **Loader** ([`index`]) — parses the index and overrides into normalized
//!    [`model::RepositoryRecord`]s, isolating bad records as findings.
//! 2. **Graph Builder** ([`graph`]) — turns dependency declarations into a
//!    directed graph with reverse-dependency counts and cycle detection.
//! 3. **Link Prober** ([`probe`]) — checks declared URLs for liveness under a
//!    concurrency limit, per-request timeout and an overall wall-clock budget.
//! 4. **Rule Engine** ([`audit::checks`]) — five isolated, composable rules
//!    that turn the graph and probe results into findings.
//! 5. **Report Builder** ([`report`]) — deterministic, severity-ranked report
//!    with the pass/fail gate.
//!
//! Only malformed metadata aborts a run; every other anomaly becomes a
//! [`model::Finding`] in the report.
//!
//! ## Quick start
//!
//! ```ignore
//! use ecosystem_auditor::{AuditConfig, AuditInput, AuditPipeline};
//! use tokio::sync::watch;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let pipeline = AuditPipeline::new(AuditConfig::default())?;
//!     let (_cancel_tx, cancel_rx) = watch::channel(false);
//!     let input = AuditInput {
//!         index_json: std::fs::read_to_string("ecosystem-index.json")?,
//!         overrides: Vec::new(),
//!     };
//!     let outcome = pipeline.execute(&input, cancel_rx).await?;
//!     print!("{}", outcome.report.render_text());
//!     std::process::exit(if outcome.report.passed() { 0 } else { 1 });
//! }
//! ```

pub mod audit;
pub mod graph;
pub mod index;
pub mod model;
pub mod probe;
pub mod report;

pub use audit::{
    AuditCheck, AuditConfig, AuditInput, AuditOutcome, AuditPipeline, AuditStats, CheckContext,
    CheckError, CheckSet,
};
pub use graph::{DependencyEdge, EcosystemGraph, GraphBuild, GraphExport};
pub use index::{AuditError, LoadedIndex, OverrideSource};
pub use model::{
    Category, DependencyDecl, DependencyKind, Finding, Layer, RepositoryRecord, Severity, Status,
};
pub use probe::{HttpProber, ProbeConfig, ProbeOutcome, ProbeResults, UrlProber};
pub use report::{Report, ReportBuilder, ReportSummary};
