//! Staleness rule: published statistics that drifted from reality, repos
//! nobody has touched, and descriptive text stuck in an old year.

use chrono::Datelike;

use crate::audit::traits::{AuditCheck, CheckContext, CheckError};
use crate::model::{Category, Finding};

pub struct StalenessCheck;

/// Four-digit year mentions in free text. Only full four-digit runs count,
/// so `2026-01-02` contributes one year, not three numbers.
fn years_in(text: &str) -> Vec<i32> {
    let mut years = Vec::new();
    let mut run = String::new();
    for c in text.chars().chain(std::iter::once(' ')) {
        if c.is_ascii_digit() {
            run.push(c);
        } else {
            if run.len() == 4 {
                if let Ok(year) = run.parse::<i32>() {
                    if (1990..=2100).contains(&year) {
                        years.push(year);
                    }
                }
            }
            run.clear();
        }
    }
    years
}

impl AuditCheck for StalenessCheck {
    fn name(&self) -> &'static str {
        "staleness"
    }

    fn run(&self, ctx: &CheckContext<'_>) -> Result<Vec<Finding>, CheckError> {
        let mut findings = Vec::new();

        // Declared repository count vs. the live count of loaded records.
        if let Some(declared) = ctx.declared_total {
            let live = ctx.graph.node_count() as u64;
            if declared != live {
                findings.push(
                    Finding::warning(
                        Category::Staleness,
                        "ecosystem-index",
                        format!(
                            "declared repository count {declared} does not match live count {live}"
                        ),
                    )
                    .with_remediation("regenerate the index so total_repos matches"),
                );
            }
        }

        let threshold = chrono::Duration::days(ctx.config.staleness_threshold_days);
        let current_year = ctx.now.year();

        for record in ctx.graph.records().values() {
            if let Some(last_updated) = record.last_updated {
                let age = ctx.now.signed_duration_since(last_updated);
                if age > threshold && !record.is_deprecated() {
                    findings.push(
                        Finding::info(
                            Category::Staleness,
                            &record.name,
                            format!(
                                "untouched for {} days; candidate for deprecated status",
                                age.num_days()
                            ),
                        )
                        .with_remediation("review the repository and mark it deprecated if phased out"),
                    );
                }
            }

            if let Some(text) = &record.long_description {
                let years = years_in(text);
                let oldest_mention = years.iter().filter(|y| **y < current_year).min();
                let mentions_current = years.contains(&current_year);
                if let (Some(old), false) = (oldest_mention, mentions_current) {
                    findings.push(Finding::info(
                        Category::Staleness,
                        &record.name,
                        format!(
                            "description mentions {old} but not {current_year}; content may be stale"
                        ),
                    ));
                }
            }
        }

        Ok(findings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::pipeline::AuditConfig;
    use crate::graph::{EcosystemGraph, GraphBuild};
    use crate::model::{RepositoryRecord, Severity, Status};
    use crate::probe::ProbeResults;
    use chrono::{Duration, TimeZone, Utc};
    use std::collections::BTreeMap;

    fn build(records: Vec<RepositoryRecord>) -> GraphBuild {
        let map: BTreeMap<_, _> = records.into_iter().map(|r| (r.name.clone(), r)).collect();
        EcosystemGraph::build(map)
    }

    fn run_check(
        build: &GraphBuild,
        declared_total: Option<u64>,
        now: chrono::DateTime<Utc>,
    ) -> Vec<Finding> {
        let config = AuditConfig::default();
        let probe = ProbeResults::empty();
        let ctx = CheckContext {
            graph: &build.graph,
            load_findings: &[],
            graph_findings: &build.findings,
            declared_total,
            now,
            config: &config,
            probe: &probe,
        };
        StalenessCheck.run(&ctx).unwrap()
    }

    #[test]
    fn count_mismatch_is_a_warning_with_both_values() {
        let graph = build(vec![
            RepositoryRecord::named("a"),
            RepositoryRecord::named("b"),
        ]);
        let findings = run_check(&graph, Some(88), Utc::now());
        assert_eq!(findings.len(), 1);
        let finding = &findings[0];
        assert_eq!(finding.severity, Severity::Warning);
        assert_eq!(finding.subject, "ecosystem-index");
        assert!(finding.message.contains("88"));
        assert!(finding.message.contains("2"));
    }

    #[test]
    fn matching_count_is_silent() {
        let graph = build(vec![RepositoryRecord::named("a")]);
        assert!(run_check(&graph, Some(1), Utc::now()).is_empty());
    }

    #[test]
    fn untouched_repo_becomes_deprecation_candidate_info() {
        let now = Utc.with_ymd_and_hms(2026, 8, 30, 0, 0, 0).unwrap();
        let mut record = RepositoryRecord::named("dusty");
        record.last_updated = Some(now - Duration::days(120));
        let graph = build(vec![record]);
        let findings = run_check(&graph, None, now);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, Severity::Info);
        assert!(findings[0].message.contains("untouched for 120 days"));
    }

    #[test]
    fn deprecated_repo_is_not_a_candidate_again() {
        let now = Utc.with_ymd_and_hms(2026, 8, 30, 0, 0, 0).unwrap();
        let mut record = RepositoryRecord::named("retired");
        record.last_updated = Some(now - Duration::days(400));
        record.status = Some(Status::Deprecated);
        let graph = build(vec![record]);
        assert!(run_check(&graph, None, now).is_empty());
    }

    #[test]
    fn recently_touched_repo_is_silent() {
        let now = Utc.with_ymd_and_hms(2026, 8, 30, 0, 0, 0).unwrap();
        let mut record = RepositoryRecord::named("fresh");
        record.last_updated = Some(now - Duration::days(10));
        let graph = build(vec![record]);
        assert!(run_check(&graph, None, now).is_empty());
    }

    #[test]
    fn old_year_in_description_without_current_year_is_info() {
        let now = Utc.with_ymd_and_hms(2026, 8, 30, 0, 0, 0).unwrap();
        let mut record = RepositoryRecord::named("timeworn");
        record.long_description = Some("Launched in 2023 with 88 repos.".to_string());
        let graph = build(vec![record]);
        let findings = run_check(&graph, None, now);
        assert_eq!(findings.len(), 1);
        assert!(findings[0].message.contains("mentions 2023 but not 2026"));
    }

    #[test]
    fn current_year_mention_suppresses_stale_date() {
        let now = Utc.with_ymd_and_hms(2026, 8, 30, 0, 0, 0).unwrap();
        let mut record = RepositoryRecord::named("current");
        record.long_description = Some("Running since 2023, updated 2026.".to_string());
        let graph = build(vec![record]);
        assert!(run_check(&graph, None, now).is_empty());
    }

    #[test]
    fn years_in_ignores_short_and_long_digit_runs() {
        assert_eq!(years_in("v2 has 88 repos, since 2024-01-02"), vec![2024]);
        assert_eq!(years_in("build 123456 in 1989"), Vec::<i32>::new());
    }
}
