//! Audit pipeline orchestrator.
//!
//! Coordinates the sequential audit stages (Loader → Graph Builder → Link
//! Prober → Rule Engine → Report Builder) with:
//! - Async execution via `tokio` (the prober is the only concurrent stage)
//! - External cancellation through a `watch` channel
//! - Structured logging via `tracing`
//! - Per-stage timing statistics in [`AuditStats`]
//!
//! Everything is rebuilt from the input on each run; the pipeline keeps no
//! state between executions.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::audit::checks::{
    CompletenessCheck, CycleFreedomCheck, DependencyValidityCheck, LinkLivenessCheck,
    StalenessCheck,
};
use crate::audit::traits::{AuditCheck, CheckContext};
use crate::graph::{EcosystemGraph, GraphExport};
use crate::index::{self, AuditError, OverrideSource};
use crate::model::{Category, Finding};
use crate::probe::{HttpProber, ProbeConfig, ProbeResults, UrlProber};
use crate::report::{Report, ReportBuilder};

// ============================================================================
// Configuration
// ============================================================================

/// Recognized audit options. Mirrors the external configuration object:
/// probing knobs plus rule thresholds.
#[derive(Debug, Clone)]
pub struct AuditConfig {
    /// Maximum concurrent link probes.
    pub concurrency: usize,

    /// Per-request probe timeout in milliseconds.
    pub timeout_ms: u64,

    /// Retries per URL for transient probe failures.
    pub retries: u32,

    /// Aggregate wall-clock budget for the probing stage, in milliseconds.
    pub probe_budget_ms: u64,

    /// Days without a content/status change before a repository becomes a
    /// deprecation candidate.
    pub staleness_threshold_days: i64,

    /// Hosts whose dead links downgrade from blocking to warning.
    pub best_effort_hosts: BTreeSet<String>,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            concurrency: 8,
            timeout_ms: 5_000,
            retries: 2,
            probe_budget_ms: 30_000,
            staleness_threshold_days: 90,
            best_effort_hosts: BTreeSet::new(),
        }
    }
}

impl AuditConfig {
    pub fn probe_config(&self) -> ProbeConfig {
        ProbeConfig {
            concurrency: self.concurrency,
            timeout: Duration::from_millis(self.timeout_ms),
            retries: self.retries,
            budget: Duration::from_millis(self.probe_budget_ms),
        }
    }
}

/// Which rules run. All enabled by default; the CLI narrows this down.
#[derive(Debug, Clone, Copy)]
pub struct CheckSet {
    pub completeness: bool,
    pub dependencies: bool,
    pub cycles: bool,
    pub staleness: bool,
    pub links: bool,
}

impl Default for CheckSet {
    fn default() -> Self {
        Self {
            completeness: true,
            dependencies: true,
            cycles: true,
            staleness: true,
            links: true,
        }
    }
}

impl CheckSet {
    pub fn none() -> Self {
        Self {
            completeness: false,
            dependencies: false,
            cycles: false,
            staleness: false,
            links: false,
        }
    }

    /// Builds a set from rule names, e.g. `["cycles", "links"]`.
    ///
    /// # Errors
    ///
    /// Returns the offending name when it matches no known rule.
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Result<Self, String> {
        let mut set = Self::none();
        for name in names {
            match name.as_ref() {
                "completeness" => set.completeness = true,
                "dependencies" => set.dependencies = true,
                "cycles" => set.cycles = true,
                "staleness" => set.staleness = true,
                "links" => set.links = true,
                other => return Err(format!("unknown check `{other}`")),
            }
        }
        Ok(set)
    }
}

// ============================================================================
// Input / output
// ============================================================================

/// Read-only inputs to one audit run.
#[derive(Debug, Clone)]
pub struct AuditInput {
    /// The canonical ecosystem index document (JSON text).
    pub index_json: String,

    /// Optional per-repository metadata override blocks (YAML text).
    pub overrides: Vec<OverrideSource>,
}

/// Timing and volume statistics for one run.
#[derive(Debug, Default, Clone, serde::Serialize)]
pub struct AuditStats {
    pub total_duration_ms: u64,
    pub load_duration_ms: u64,
    pub graph_duration_ms: u64,
    pub probe_duration_ms: u64,
    pub checks_duration_ms: u64,
    pub repos_audited: usize,
    pub urls_probed: usize,
}

/// Everything a run produces: the report, the regenerated graph description
/// for external visualizers, and run statistics.
#[derive(Debug)]
pub struct AuditOutcome {
    pub report: Report,
    pub graph: GraphExport,
    pub stats: AuditStats,
}

// ============================================================================
// Pipeline
// ============================================================================

/// Orchestrates one complete audit.
///
/// # Example
///
/// ```ignore
/// use ecosystem_auditor::audit::{AuditConfig, AuditInput, AuditPipeline};
/// use tokio::sync::watch;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let pipeline = AuditPipeline::new(AuditConfig::default())?;
///     let (_cancel_tx, cancel_rx) = watch::channel(false);
///     let input = AuditInput {
///         index_json: std::fs::read_to_string("ecosystem-index.json")?,
///         overrides: Vec::new(),
///     };
///     let outcome = pipeline.execute(&input, cancel_rx).await?;
///     println!("{}", outcome.report.render_text());
///     Ok(())
/// }
/// ```
pub struct AuditPipeline {
    config: AuditConfig,
    checks: CheckSet,
    prober: Arc<dyn UrlProber>,

    /// Fixed clock for reproducible runs; `None` means wall clock.
    now: Option<DateTime<Utc>>,
}

impl AuditPipeline {
    /// Creates a pipeline with the default check set and an HTTP prober.
    ///
    /// # Errors
    ///
    /// Fails only if the HTTP client cannot be constructed (TLS backend
    /// initialization).
    pub fn new(config: AuditConfig) -> Result<Self, reqwest::Error> {
        let prober = Arc::new(HttpProber::new(config.probe_config())?);
        Ok(Self {
            config,
            checks: CheckSet::default(),
            prober,
            now: None,
        })
    }

    /// Selects which rules run.
    pub fn with_checks(mut self, checks: CheckSet) -> Self {
        self.checks = checks;
        self
    }

    /// Substitutes the prober; used by tests and offline runs.
    pub fn with_prober(mut self, prober: Arc<dyn UrlProber>) -> Self {
        self.prober = prober;
        self
    }

    /// Pins the run's clock.
    pub fn with_now(mut self, now: DateTime<Utc>) -> Self {
        self.now = Some(now);
        self
    }

    /// Executes the complete audit over `input`.
    ///
    /// Sending `true` on the cancellation channel abandons in-flight probes
    /// and yields a partial report flagged incomplete, rather than hanging.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::MalformedMetadata`] when the index or an
    /// override block cannot be parsed at all; every other anomaly becomes a
    /// finding in the report.
    pub async fn execute(
        &self,
        input: &AuditInput,
        cancel: watch::Receiver<bool>,
    ) -> Result<AuditOutcome, AuditError> {
        let start = std::time::Instant::now();
        let mut stats = AuditStats::default();

        // ====================================================================
        // Stage 1: Load metadata
        // ====================================================================

        info!("loading ecosystem index");
        let load_start = std::time::Instant::now();
        let loaded = index::load(&input.index_json, &input.overrides)?;
        stats.load_duration_ms = load_start.elapsed().as_millis() as u64;
        stats.repos_audited = loaded.records.len();
        info!(
            repos = loaded.records.len(),
            duration_ms = stats.load_duration_ms,
            "index loaded"
        );

        // ====================================================================
        // Stage 2: Build the graph
        // ====================================================================

        let graph_start = std::time::Instant::now();
        let build = EcosystemGraph::build(loaded.records);
        stats.graph_duration_ms = graph_start.elapsed().as_millis() as u64;
        info!(
            edges = build.graph.edges().len(),
            duration_ms = stats.graph_duration_ms,
            "graph built"
        );

        // ====================================================================
        // Stage 3: Probe links (the only concurrent stage)
        // ====================================================================

        let probe_start = std::time::Instant::now();
        let probe_results = if self.checks.links {
            let urls = build.graph.link_targets();
            stats.urls_probed = urls.len();
            self.prober.probe_all(urls, cancel).await
        } else {
            ProbeResults::empty()
        };
        stats.probe_duration_ms = probe_start.elapsed().as_millis() as u64;

        // ====================================================================
        // Stage 4: Run the rule engine
        // ====================================================================

        let checks_start = std::time::Instant::now();
        let now = self.now.unwrap_or_else(Utc::now);
        let ctx = CheckContext {
            graph: &build.graph,
            load_findings: &loaded.findings,
            graph_findings: &build.findings,
            declared_total: loaded.declared_total,
            now,
            config: &self.config,
            probe: &probe_results,
        };

        let mut builder = ReportBuilder::new();
        for check in self.enabled_checks() {
            match check.run(&ctx) {
                Ok(findings) => {
                    info!(check = check.name(), findings = findings.len(), "check ran");
                    builder.extend(findings);
                }
                Err(error) => {
                    // Partial-failure isolation: the broken check becomes a
                    // finding, the remaining checks still run.
                    warn!(check = check.name(), error = %error, "check failed");
                    builder.push(Finding::warning(
                        Category::Metadata,
                        check.name(),
                        format!("check did not run: {error}"),
                    ));
                }
            }
        }
        stats.checks_duration_ms = checks_start.elapsed().as_millis() as u64;

        // ====================================================================
        // Stage 5: Seal the report
        // ====================================================================

        if !probe_results.complete {
            builder.mark_incomplete();
        }
        let report = builder.build();
        let graph_export = build.graph.export();
        stats.total_duration_ms = start.elapsed().as_millis() as u64;

        info!(
            passed = report.passed(),
            findings = report.findings().len(),
            duration_ms = stats.total_duration_ms,
            "audit finished"
        );

        Ok(AuditOutcome {
            report,
            graph: graph_export,
            stats,
        })
    }

    fn enabled_checks(&self) -> Vec<Box<dyn AuditCheck>> {
        let mut list: Vec<Box<dyn AuditCheck>> = Vec::new();
        if self.checks.completeness {
            list.push(Box::new(CompletenessCheck));
        }
        if self.checks.dependencies {
            list.push(Box::new(DependencyValidityCheck));
        }
        if self.checks.cycles {
            list.push(Box::new(CycleFreedomCheck));
        }
        if self.checks.staleness {
            list.push(Box::new(StalenessCheck));
        }
        if self.checks.links {
            list.push(Box::new(LinkLivenessCheck));
        }
        list
    }
}

// ============================================================================
// Tests
// ============================================================================
