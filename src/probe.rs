//! Concurrent link prober with bounded concurrency, retries and an aggregate
//! wall-clock budget.
//!
//! Probing is the only place the auditor touches the network and the only
//! place it runs concurrently. URLs are deduplicated by the caller; each URL
//! is probed at most once per run, so the outcome map is write-once-per-key.
//!
//! The prober never blocks the audit indefinitely: once the budget elapses,
//! still-pending probes are recorded as [`ProbeOutcome::Timeout`] and the
//! prober returns. An external cancellation signal abandons in-flight probes
//! best-effort and flags the result as incomplete.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::{mpsc, watch, Semaphore};
use tokio::time::{sleep, sleep_until, timeout, Instant};
use tracing::{debug, info, warn};

/// Linear backoff step between retries: attempt `n` waits `n * this`.
const RETRY_BACKOFF: Duration = Duration::from_millis(250);

// ============================================================================
// Outcomes and configuration
// ============================================================================

/// Terminal outcome of probing one URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeOutcome {
    /// Final HTTP status (after redirects and, for 5xx, after retries).
    Status(u16),

    /// No response within the per-request timeout, or the probe was still
    /// pending when the budget or a cancellation cut it off.
    Timeout,

    /// Connection-level failure after retry exhaustion.
    ConnectionError(String),

    /// URL failed to parse; recorded immediately, never probed.
    InvalidUrl,
}

impl ProbeOutcome {
    /// Liveness rule: only 2xx/3xx counts as a live link.
    pub fn is_live(&self) -> bool {
        matches!(self, Self::Status(code) if (200..400).contains(code))
    }

    pub fn describe(&self) -> String {
        match self {
            Self::Status(code) => format!("HTTP {code}"),
            Self::Timeout => "timed out".to_string(),
            Self::ConnectionError(detail) => format!("connection error: {detail}"),
            Self::InvalidUrl => "malformed URL".to_string(),
        }
    }
}

/// Knobs for one probing run.
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    /// Maximum in-flight probes.
    pub concurrency: usize,

    /// Per-request timeout.
    pub timeout: Duration,

    /// Retries per URL for transient failures (connect errors, 5xx).
    pub retries: u32,

    /// Aggregate wall-clock budget for the whole probing run.
    pub budget: Duration,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            concurrency: 8,
            timeout: Duration::from_secs(5),
            retries: 2,
            budget: Duration::from_secs(30),
        }
    }
}

/// URL → outcome map plus whether the run was allowed to finish.
/// `complete` is `false` only when cancellation cut the run short; budget
/// exhaustion still counts as a complete (if pessimistic) run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProbeResults {
    pub outcomes: BTreeMap<String, ProbeOutcome>,
    pub complete: bool,
}

impl ProbeResults {
    /// An empty, complete result. Used when link probing is skipped.
    pub fn empty() -> Self {
        Self {
            outcomes: BTreeMap::new(),
            complete: true,
        }
    }
}

// ============================================================================
// Prober
// ============================================================================

/// Seam for the pipeline: anything that can turn a URL set into outcomes.
/// The production implementation is [`HttpProber`]; tests substitute a stub.
#[async_trait]
pub trait UrlProber: Send + Sync {
    async fn probe_all(
        &self,
        urls: BTreeSet<String>,
        cancel: watch::Receiver<bool>,
    ) -> ProbeResults;
}

/// HTTP prober backed by `reqwest`, with concurrency bounded by a semaphore.
pub struct HttpProber {
    client: reqwest::Client,
    config: ProbeConfig,
}

impl HttpProber {
    /// # Errors
    ///
    /// Returns the underlying client-construction error (TLS backend
    /// initialization) if the HTTP client cannot be built.
    pub fn new(config: ProbeConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("eco-audit/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl UrlProber for HttpProber {
    async fn probe_all(
        &self,
        urls: BTreeSet<String>,
        mut cancel: watch::Receiver<bool>,
    ) -> ProbeResults {
        let mut outcomes: BTreeMap<String, ProbeOutcome> = BTreeMap::new();
        let mut pending: BTreeSet<String> = BTreeSet::new();

        for url in &urls {
            if reqwest::Url::parse(url).is_err() {
                outcomes.insert(url.clone(), ProbeOutcome::InvalidUrl);
            } else {
                pending.insert(url.clone());
            }
        }

        info!(
            total = urls.len(),
            invalid = outcomes.len(),
            "probing links"
        );

        let semaphore = Arc::new(Semaphore::new(self.config.concurrency.max(1)));
        let (tx, mut rx) = mpsc::unbounded_channel::<(String, ProbeOutcome)>();

        for url in &pending {
            let url = url.clone();
            let semaphore = Arc::clone(&semaphore);
            let client = self.client.clone();
            let config = self.config.clone();
            let tx = tx.clone();
            tokio::spawn(async move {
                let permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return, // semaphore closed, run is over
                };
                let outcome = probe_one(&client, &url, &config).await;
                drop(permit);
                let _ = tx.send((url, outcome));
            });
        }
        drop(tx);

        let deadline = Instant::now() + self.config.budget;
        let mut complete = true;
        let mut cancellable = true;

        while !pending.is_empty() {
            tokio::select! {
                received = rx.recv() => {
                    match received {
                        Some((url, outcome)) => {
                            debug!(url = %url, outcome = %outcome.describe(), "probe finished");
                            pending.remove(&url);
                            outcomes.insert(url, outcome);
                        }
                        None => break,
                    }
                }
                _ = sleep_until(deadline) => {
                    warn!(pending = pending.len(), "probe budget exhausted");
                    for url in std::mem::take(&mut pending) {
                        outcomes.insert(url, ProbeOutcome::Timeout);
                    }
                }
                changed = cancel.changed(), if cancellable => {
                    match changed {
                        Ok(()) if *cancel.borrow() => {
                            warn!(pending = pending.len(), "probe run cancelled");
                            for url in std::mem::take(&mut pending) {
                                outcomes.insert(url, ProbeOutcome::Timeout);
                            }
                            complete = false;
                        }
                        Ok(()) => {}
                        // Sender gone; cancellation can never fire again.
                        Err(_) => cancellable = false,
                    }
                }
            }
        }

        ProbeResults { outcomes, complete }
    }
}

/// Probes one URL, retrying transient failures (connect errors, 5xx) with
/// linear backoff. A per-request timeout is terminal: retrying a URL that
/// already ate a full timeout would blow the wall-clock bound.
async fn probe_one(client: &reqwest::Client, url: &str, config: &ProbeConfig) -> ProbeOutcome {
    let mut attempt: u32 = 0;
    loop {
        match timeout(config.timeout, client.get(url).send()).await {
            Err(_) => return ProbeOutcome::Timeout,
            Ok(Ok(response)) => {
                let code = response.status().as_u16();
                if !response.status().is_server_error() || attempt >= config.retries {
                    return ProbeOutcome::Status(code);
                }
                debug!(url, code, attempt, "server error, retrying");
            }
            Ok(Err(error)) => {
                let transient = error.is_connect() || error.is_request();
                if !transient || attempt >= config.retries {
                    return ProbeOutcome::ConnectionError(error.to_string());
                }
                debug!(url, attempt, "connection error, retrying");
            }
        }
        attempt += 1;
        sleep(RETRY_BACKOFF * attempt).await;
    }
}

// ============================================================================
// Tests
// ============================================================================
