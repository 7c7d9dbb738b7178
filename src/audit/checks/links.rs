//! Link-liveness rule: maps probe outcomes onto findings.
//!
//! A non-live outcome (anything but 2xx/3xx) is blocking, unless the URL's
//! host is configured best-effort, in which case it downgrades to a warning.
//! Probe timeouts are dead links here, not errors.

use crate::audit::traits::{AuditCheck, CheckContext, CheckError};
use crate::model::{Category, Finding, Severity};

pub struct LinkLivenessCheck;

fn host_of(url: &str) -> Option<String> {
    reqwest::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
}

impl AuditCheck for LinkLivenessCheck {
    fn name(&self) -> &'static str {
        "links"
    }

    fn run(&self, ctx: &CheckContext<'_>) -> Result<Vec<Finding>, CheckError> {
        let mut findings = Vec::new();

        for record in ctx.graph.records().values() {
            let mut urls: Vec<&str> = Vec::new();
            if let Some(url) = record.url.as_deref() {
                urls.push(url);
            }
            if let Some(url) = record.docs_url.as_deref() {
                if Some(url) != record.url.as_deref() {
                    urls.push(url);
                }
            }

            for url in urls {
                // Absent outcome means probing was skipped or cut off before
                // this URL; no verdict either way.
                let Some(outcome) = ctx.probe.outcomes.get(url) else {
                    continue;
                };
                if outcome.is_live() {
                    continue;
                }
                let best_effort = host_of(url)
                    .map(|host| ctx.config.best_effort_hosts.contains(&host))
                    .unwrap_or(false);
                let severity = if best_effort {
                    Severity::Warning
                } else {
                    Severity::Blocking
                };
                findings.push(
                    Finding::new(
                        severity,
                        Category::Link,
                        url,
                        format!("{} (referenced by {})", outcome.describe(), record.name),
                    )
                    .with_remediation("fix or remove the link in the repository metadata"),
                );
            }
        }

        Ok(findings)
    }
}
