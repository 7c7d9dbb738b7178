//! Check trait and shared context for the rule engine.
//!
//! Checks are independent and isolated: each one sees the same immutable
//! [`CheckContext`] and returns its own finding list. One check failing never
//! prevents another from running — the pipeline converts a check's `Err` into
//! a warning finding about the check itself and moves on.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::audit::pipeline::AuditConfig;
use crate::graph::EcosystemGraph;
use crate::model::Finding;
use crate::probe::ProbeResults;

/// Everything a check may look at. Built once per run, shared read-only by
/// all checks, so check output is a pure function of graph and probe
/// outcomes.
pub struct CheckContext<'a> {
    pub graph: &'a EcosystemGraph,

    /// Findings the metadata loader produced (missing fields, unknown
    /// fields, overlong descriptions). Owned by the completeness check.
    pub load_findings: &'a [Finding],

    /// Findings the graph builder produced (unresolved dependencies).
    /// Owned by the dependency-validity check.
    pub graph_findings: &'a [Finding],

    /// Repository-count statistic the index header declares about itself.
    pub declared_total: Option<u64>,

    /// The run's clock. Injected so staleness checks are reproducible.
    pub now: DateTime<Utc>,

    pub config: &'a AuditConfig,

    /// Outcomes from the link prober; empty when probing was skipped.
    pub probe: &'a ProbeResults,
}

/// One composable audit rule.
pub trait AuditCheck: Send + Sync {
    /// Stable name used in logs and in the finding emitted when the check
    /// itself fails.
    fn name(&self) -> &'static str;

    /// Runs the rule over the context.
    ///
    /// # Errors
    ///
    /// Returns `Err` only when the check could not evaluate at all; findings
    /// about the audited ecosystem are results, not errors.
    fn run(&self, ctx: &CheckContext<'_>) -> Result<Vec<Finding>, CheckError>;
}

/// Failure of a check's own machinery.
#[derive(Error, Debug)]
pub enum CheckError {
    #[error("check could not evaluate: {0}")]
    Failed(String),
}
