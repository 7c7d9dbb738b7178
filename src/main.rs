//! `eco-audit` — command-line driver for the ecosystem auditor.
//!
//! Thin wrapper over [`AuditPipeline`]: argument parsing, file loading,
//! Ctrl-C handling and exit-code mapping live here; all audit logic lives in
//! the library.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::sync::watch;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use ecosystem_auditor::{
    AuditConfig, AuditInput, AuditPipeline, CheckSet, OverrideSource, ProbeResults, UrlProber,
};

/// Consistency auditor for an ecosystem of repositories.
///
/// Reads the canonical JSON index (and optional per-repository YAML metadata
/// overrides), audits metadata completeness, dependency validity, cycle
/// freedom, staleness and link liveness, and prints a severity-ranked report.
/// Exits 0 when the audit passes, 1 when any blocking finding exists.
#[derive(Debug, Parser)]
#[command(name = "eco-audit", version, about)]
struct Cli {
    /// Path to the ecosystem index JSON document.
    index: PathBuf,

    /// Directory of per-repository override blocks; each subdirectory's
    /// `metadata.yml` is applied on top of the index entry of the same name.
    #[arg(long)]
    overrides_dir: Option<PathBuf>,

    /// Comma-separated subset of checks to run
    /// (completeness,dependencies,cycles,staleness,links). Default: all.
    #[arg(long, value_delimiter = ',')]
    checks: Option<Vec<String>>,

    /// Skip link probing entirely (equivalent to dropping `links` from
    /// --checks).
    #[arg(long)]
    offline: bool,

    /// Emit the machine-readable JSON report instead of text.
    #[arg(long)]
    json: bool,

    /// Write the dependency-graph description (nodes, edges, depths) to this
    /// file as JSON.
    #[arg(long)]
    graph_out: Option<PathBuf>,

    /// Maximum concurrent link probes.
    #[arg(long, default_value_t = 8)]
    concurrency: usize,

    /// Per-request probe timeout in milliseconds.
    #[arg(long, default_value_t = 5000)]
    timeout_ms: u64,

    /// Retries per URL for transient probe failures.
    #[arg(long, default_value_t = 2)]
    retries: u32,

    /// Wall-clock budget for the whole probing stage, in milliseconds.
    #[arg(long, default_value_t = 30000)]
    probe_budget_ms: u64,

    /// Days without a change before a repository is flagged as a deprecation
    /// candidate.
    #[arg(long, default_value_t = 90)]
    staleness_days: i64,

    /// Host whose dead links downgrade to warnings; repeatable.
    #[arg(long = "best-effort-host")]
    best_effort_hosts: Vec<String>,
}

/// Prober used with `--offline`: reports nothing, so the links rule finds
/// nothing to judge.
struct OfflineProber;

#[async_trait::async_trait]
impl UrlProber for OfflineProber {
    async fn probe_all(
        &self,
        _urls: BTreeSet<String>,
        _cancel: watch::Receiver<bool>,
    ) -> ProbeResults {
        ProbeResults::empty()
    }
}

fn collect_overrides(dir: &PathBuf) -> anyhow::Result<Vec<OverrideSource>> {
    let mut overrides = Vec::new();
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("reading overrides directory {}", dir.display()))?;
    for entry in entries {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let candidate = entry.path().join("metadata.yml");
        if !candidate.is_file() {
            debug!(dir = %entry.path().display(), "no metadata.yml, skipping");
            continue;
        }
        let yaml = std::fs::read_to_string(&candidate)
            .with_context(|| format!("reading {}", candidate.display()))?;
        overrides.push(OverrideSource {
            location: candidate.display().to_string(),
            yaml,
        });
    }
    // read_dir order is platform-dependent; keep override application stable.
    overrides.sort_by(|a, b| a.location.cmp(&b.location));
    Ok(overrides)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut checks = match &cli.checks {
        Some(names) => CheckSet::from_names(names).map_err(anyhow::Error::msg)?,
        None => CheckSet::default(),
    };
    if cli.offline {
        checks.links = false;
    }

    let config = AuditConfig {
        concurrency: cli.concurrency,
        timeout_ms: cli.timeout_ms,
        retries: cli.retries,
        probe_budget_ms: cli.probe_budget_ms,
        staleness_threshold_days: cli.staleness_days,
        best_effort_hosts: cli.best_effort_hosts.iter().cloned().collect(),
    };

    let index_json = std::fs::read_to_string(&cli.index)
        .with_context(|| format!("reading index {}", cli.index.display()))?;
    let overrides = match &cli.overrides_dir {
        Some(dir) => collect_overrides(dir)?,
        None => Vec::new(),
    };

    let mut pipeline = AuditPipeline::new(config)
        .context("constructing HTTP client")?
        .with_checks(checks);
    if cli.offline {
        pipeline = pipeline.with_prober(Arc::new(OfflineProber));
    }

    // Ctrl-C flips the cancellation flag; the pipeline then abandons
    // in-flight probes and reports partially.
    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling audit");
            let _ = cancel_tx.send(true);
        }
    });

    let input = AuditInput {
        index_json,
        overrides,
    };
    let outcome = pipeline.execute(&input, cancel_rx).await?;

    if let Some(path) = &cli.graph_out {
        let graph_json = serde_json::to_string_pretty(&outcome.graph)?;
        std::fs::write(path, graph_json)
            .with_context(|| format!("writing graph to {}", path.display()))?;
    }

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&outcome.report.to_machine())?);
    } else {
        print!("{}", outcome.report.render_text());
    }

    if !outcome.report.passed() {
        std::process::exit(1);
    }
    Ok(())
}
