//! Cycle-freedom rule.
//!
//! Direct cycles are hard failures; cycles among conceptual, test or example
//! edges are warnings only, since those relationships may legitimately be
//! mutual. A direct cycle containing a deprecated repository downgrades to a
//! warning: the cycle is expected to dissolve as the repository is phased
//! out.

use crate::audit::traits::{AuditCheck, CheckContext, CheckError};
use crate::model::{Category, DependencyKind, Finding, Severity};

pub struct CycleFreedomCheck;

/// Rotates a cycle path so the lexicographically smallest member leads,
/// making the rendered path independent of where the traversal entered the
/// loop.
fn canonical_rotation(path: &[String]) -> Vec<String> {
    let Some(smallest) = path.iter().enumerate().min_by_key(|(_, name)| *name) else {
        return Vec::new();
    };
    let mut rotated = path.to_vec();
    rotated.rotate_left(smallest.0);
    rotated
}

fn render_path(path: &[String]) -> String {
    let mut parts: Vec<&str> = path.iter().map(String::as_str).collect();
    if let Some(first) = parts.first().copied() {
        parts.push(first);
    }
    parts.join(" -> ")
}

impl AuditCheck for CycleFreedomCheck {
    fn name(&self) -> &'static str {
        "cycles"
    }

    fn run(&self, ctx: &CheckContext<'_>) -> Result<Vec<Finding>, CheckError> {
        let mut findings = Vec::new();

        for path in ctx.graph.cycles(DependencyKind::Direct) {
            let canonical = canonical_rotation(&path);
            let has_deprecated = canonical.iter().any(|name| {
                ctx.graph
                    .record(name)
                    .map(|r| r.is_deprecated())
                    .unwrap_or(false)
            });
            let severity = if has_deprecated {
                Severity::Warning
            } else {
                Severity::Blocking
            };
            let subject = canonical.first().cloned().unwrap_or_default();
            findings.push(
                Finding::new(
                    severity,
                    Category::Dependency,
                    subject,
                    format!("direct dependency cycle: {}", render_path(&canonical)),
                )
                .with_remediation(
                    "break the cycle, or reclassify one edge as conceptual if the \
                     relationship is not a build-order dependency",
                ),
            );
        }

        for kind in [
            DependencyKind::Conceptual,
            DependencyKind::Test,
            DependencyKind::Example,
        ] {
            for path in ctx.graph.cycles(kind) {
                let canonical = canonical_rotation(&path);
                let subject = canonical.first().cloned().unwrap_or_default();
                findings.push(Finding::warning(
                    Category::Dependency,
                    subject,
                    format!("{kind} dependency cycle: {}", render_path(&canonical)),
                ));
            }
        }

        Ok(findings)
    }
}
