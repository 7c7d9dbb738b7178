//! Metadata loader for the canonical ecosystem index.
//!
//! Parses the index document (JSON) and optional per-repository override
//! blocks (YAML, the `metadata.yml` shape) into normalized
//! [`RepositoryRecord`]s.
//!
//! The loader is deliberately forgiving: the only fatal failure is
//! structurally unparsable input ([`AuditError::MalformedMetadata`]). A
//! descriptor with missing or invalid fields produces [`Finding`]s and the
//! rest of the index still loads, so one bad record never aborts an audit.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::model::{
    Category, DependencyDecl, DependencyKind, Finding, Layer, RepositoryRecord, Status,
    SHORT_DESCRIPTION_MAX,
};

/// Fields every descriptor must supply. Absence is a blocking finding.
const REQUIRED_FIELDS: [&str; 7] = [
    "name",
    "layer",
    "status",
    "short_description",
    "dependencies",
    "tags",
    "license",
];

/// The single fatal error class of the auditor.
///
/// Everything else the auditor can observe becomes a [`Finding`]; only input
/// that cannot be parsed at all aborts the run, with no partial report.
#[derive(Error, Debug)]
pub enum AuditError {
    /// Input document could not be parsed. `location` names the offending
    /// source (index or override block), `reason` the parser's diagnosis.
    #[error("malformed metadata in {location}: {reason}")]
    MalformedMetadata { location: String, reason: String },
}

// ============================================================================
// Raw (wire) shapes
// ============================================================================

/// Index header plus descriptor list, exactly as declared on disk.
#[derive(Debug, Deserialize)]
struct RawIndex {
    version: Option<String>,
    generated: Option<DateTime<Utc>>,
    /// Published repository count; compared against the live count by the
    /// staleness rule.
    total_repos: Option<u64>,
    repos: Vec<serde_json::Value>,
}

/// One descriptor block, every field optional so that absence is observed
/// here and reported as a finding rather than a parse failure. Also the
/// shape of a per-repository override block.
#[derive(Debug, Deserialize)]
struct RawDescriptor {
    name: Option<String>,
    layer: Option<String>,
    status: Option<String>,
    short_description: Option<String>,
    long_description: Option<String>,
    dependencies: Option<Vec<String>>,
    tags: Option<Vec<String>>,
    license: Option<String>,
    spec_version: Option<String>,
    url: Option<String>,
    docs_url: Option<String>,
    last_updated: Option<DateTime<Utc>>,
    deprecated: Option<bool>,

    /// Anything the closed schema does not know. Ignored for the record but
    /// logged as info findings so nothing is dropped silently.
    #[serde(flatten)]
    extra: BTreeMap<String, serde_json::Value>,
}

// ============================================================================
// Loaded output
// ============================================================================

/// Result of loading the index plus overrides: the record map, the index
/// header values the rules need, and the findings observed during loading.
#[derive(Debug)]
pub struct LoadedIndex {
    pub records: BTreeMap<String, RepositoryRecord>,

    /// Declared repository-count statistic from the index header.
    pub declared_total: Option<u64>,

    /// When the index claims it was generated.
    pub generated: Option<DateTime<Utc>>,

    pub version: Option<String>,

    /// Findings produced while loading: missing required fields, overlong
    /// descriptions, unknown extra fields, duplicate names.
    pub findings: Vec<Finding>,
}

/// One per-repository override block: YAML text plus a location string used
/// in diagnostics (typically the file path it came from).
#[derive(Debug, Clone)]
pub struct OverrideSource {
    pub location: String,
    pub yaml: String,
}

/// Loads the canonical index and applies override blocks on top.
///
/// # Errors
///
/// Returns [`AuditError::MalformedMetadata`] only when the index document or
/// an override block cannot be parsed at all.
pub fn load(index_json: &str, overrides: &[OverrideSource]) -> Result<LoadedIndex, AuditError> {
    let raw: RawIndex =
        serde_json::from_str(index_json).map_err(|e| AuditError::MalformedMetadata {
            location: "ecosystem index".to_string(),
            reason: e.to_string(),
        })?;

    let mut findings = Vec::new();
    let mut records: BTreeMap<String, RepositoryRecord> = BTreeMap::new();

    for (position, value) in raw.repos.into_iter().enumerate() {
        let slot = format!("repos[{position}]");
        let descriptor: RawDescriptor = match serde_json::from_value(value) {
            Ok(d) => d,
            Err(e) => {
                warn!(slot = %slot, error = %e, "structurally invalid descriptor skipped");
                findings.push(Finding::blocking(
                    Category::Metadata,
                    &slot,
                    format!("structurally invalid descriptor: {e}"),
                ));
                continue;
            }
        };

        let name = match descriptor.name.as_deref().map(str::trim) {
            Some(n) if !n.is_empty() => n.to_string(),
            _ => {
                findings.push(
                    Finding::blocking(Category::Metadata, &slot, "missing required field: name")
                        .with_remediation("add a unique `name` to the descriptor"),
                );
                continue;
            }
        };

        if records.contains_key(&name) {
            findings.push(Finding::blocking(
                Category::Metadata,
                &name,
                format!("duplicate repository name at {slot}; first occurrence kept"),
            ));
            continue;
        }

        let mut record = RepositoryRecord::named(&name);
        merge_descriptor(&mut record, descriptor, &name, &mut findings);
        records.insert(name, record);
    }

    for source in overrides {
        apply_override(&mut records, source, &mut findings)?;
    }

    for record in records.values() {
        check_required_fields(record, &mut findings);
    }

    debug!(
        repos = records.len(),
        load_findings = findings.len(),
        "index loaded"
    );

    Ok(LoadedIndex {
        records,
        declared_total: raw.total_repos,
        generated: raw.generated,
        version: raw.version,
        findings,
    })
}

/// Applies one YAML override block on top of an already-loaded record.
/// Override fields win over index fields; fields absent from the override
/// are left untouched.
fn apply_override(
    records: &mut BTreeMap<String, RepositoryRecord>,
    source: &OverrideSource,
    findings: &mut Vec<Finding>,
) -> Result<(), AuditError> {
    let descriptor: RawDescriptor =
        serde_yaml::from_str(&source.yaml).map_err(|e| AuditError::MalformedMetadata {
            location: source.location.clone(),
            reason: e.to_string(),
        })?;

    let name = match descriptor.name.as_deref().map(str::trim) {
        Some(n) if !n.is_empty() => n.to_string(),
        _ => {
            findings.push(Finding::warning(
                Category::Metadata,
                &source.location,
                "override block has no `name`; ignored",
            ));
            return Ok(());
        }
    };

    match records.get_mut(&name) {
        Some(record) => {
            debug!(repo = %name, source = %source.location, "applying metadata override");
            merge_descriptor(record, descriptor, &name, findings);
        }
        None => {
            findings.push(Finding::warning(
                Category::Metadata,
                &name,
                format!(
                    "override at {} names a repository absent from the index",
                    source.location
                ),
            ));
        }
    }
    Ok(())
}

/// Copies the fields present in `descriptor` into `record`, recording
/// findings for enum misuses, overlong descriptions and unknown fields.
fn merge_descriptor(
    record: &mut RepositoryRecord,
    descriptor: RawDescriptor,
    subject: &str,
    findings: &mut Vec<Finding>,
) {
    if let Some(layer) = descriptor.layer {
        record.layer = Layer::parse(&layer);
        record.declared_layer = Some(layer);
    }
    if let Some(status) = descriptor.status {
        record.status = Status::parse(&status);
        record.declared_status = Some(status);
    }
    if let Some(short) = descriptor.short_description {
        if short.trim().len() > SHORT_DESCRIPTION_MAX {
            findings.push(
                Finding::warning(
                    Category::Metadata,
                    subject,
                    format!(
                        "short_description exceeds {SHORT_DESCRIPTION_MAX} chars ({} chars)",
                        short.trim().len()
                    ),
                )
                .with_remediation("tighten the one-line description"),
            );
        }
        record.short_description = Some(short);
    }
    if let Some(long) = descriptor.long_description {
        record.long_description = Some(long);
    }
    if let Some(deps) = descriptor.dependencies {
        record.dependencies = Some(
            deps.iter()
                .map(|decl| parse_dependency(decl, subject, findings))
                .collect(),
        );
    }
    if let Some(tags) = descriptor.tags {
        record.tags = Some(tags.into_iter().collect::<BTreeSet<_>>());
    }
    if let Some(license) = descriptor.license {
        record.license = Some(license);
    }
    if let Some(spec_version) = descriptor.spec_version {
        record.spec_version = Some(spec_version);
    }
    if let Some(url) = descriptor.url {
        record.url = Some(url);
    }
    if let Some(docs_url) = descriptor.docs_url {
        record.docs_url = Some(docs_url);
    }
    if let Some(last_updated) = descriptor.last_updated {
        record.last_updated = Some(last_updated);
    }
    if let Some(deprecated) = descriptor.deprecated {
        record.deprecated = deprecated;
    }

    for key in descriptor.extra.keys() {
        findings.push(Finding::info(
            Category::Metadata,
            subject,
            format!("unknown field `{key}` ignored"),
        ));
    }
}

/// Parses a dependency declaration, `"name"` or `"name:kind"`.
fn parse_dependency(decl: &str, subject: &str, findings: &mut Vec<Finding>) -> DependencyDecl {
    match decl.split_once(':') {
        Some((name, kind_str)) => match DependencyKind::parse(kind_str) {
            Some(kind) => DependencyDecl::typed(name.trim(), kind),
            None => {
                findings.push(Finding::warning(
                    Category::Metadata,
                    subject,
                    format!("unknown dependency kind `{kind_str}` in `{decl}`; treated as direct"),
                ));
                DependencyDecl::direct(name.trim())
            }
        },
        None => DependencyDecl::direct(decl.trim()),
    }
}

/// Blocking finding per missing required field; runs after overrides so a
/// field supplied only by an override still counts as present.
fn check_required_fields(record: &RepositoryRecord, findings: &mut Vec<Finding>) {
    let mut missing: Vec<&str> = Vec::new();
    if record.declared_layer.is_none() {
        missing.push("layer");
    }
    if record.declared_status.is_none() {
        missing.push("status");
    }
    if record.short_description.is_none() {
        missing.push("short_description");
    }
    // An empty dependency list is legitimate; only the absent field is not.
    if record.dependencies.is_none() {
        missing.push("dependencies");
    }
    if record.tags.is_none() {
        missing.push("tags");
    }
    if record.license.is_none() {
        missing.push("license");
    }

    for field in missing {
        debug_assert!(REQUIRED_FIELDS.contains(&field));
        findings.push(
            Finding::blocking(
                Category::Metadata,
                &record.name,
                format!("missing required field: {field}"),
            )
            .with_remediation(format!("declare `{field}` in the descriptor or metadata.yml")),
        );
    }

    if record.spec_version.is_none() {
        findings.push(Finding::info(
            Category::Metadata,
            &record.name,
            "missing spec_version; assuming latest",
        ));
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Severity;

    fn descriptor(name: &str) -> serde_json::Value {
        serde_json::json!({
            "name": name,
            "layer": "runtime",
            "status": "stable",
            "short_description": "a repo",
            "dependencies": [],
            "tags": ["runtime"],
            "license": "Apache-2.0",
            "spec_version": "1.0"
        })
    }

    fn index_with(repos: Vec<serde_json::Value>) -> String {
        serde_json::json!({
            "version": "2026-01",
            "total_repos": repos.len(),
            "repos": repos
        })
        .to_string()
    }

    #[test]
    fn well_formed_index_loads_without_findings() {
        let json = index_with(vec![descriptor("mirror-core"), descriptor("mirror-gate")]);
        let loaded = load(&json, &[]).unwrap();
        assert_eq!(loaded.records.len(), 2);
        assert!(loaded.findings.is_empty(), "{:?}", loaded.findings);
        let core = &loaded.records["mirror-core"];
        assert_eq!(core.layer, Some(Layer::Runtime));
        assert_eq!(core.status, Some(Status::Stable));
    }

    #[test]
    fn unparsable_index_is_fatal() {
        let err = load("{not json", &[]).unwrap_err();
        let AuditError::MalformedMetadata { location, .. } = err;
        assert_eq!(location, "ecosystem index");
    }

    #[test]
    fn missing_license_is_one_blocking_finding() {
        let mut d = descriptor("mirror-shell");
        d.as_object_mut().unwrap().remove("license");
        let loaded = load(&index_with(vec![d]), &[]).unwrap();
        let license_findings: Vec<_> = loaded
            .findings
            .iter()
            .filter(|f| f.message.contains("license"))
            .collect();
        assert_eq!(license_findings.len(), 1);
        let finding = license_findings[0];
        assert_eq!(finding.severity, Severity::Blocking);
        assert_eq!(finding.category, Category::Metadata);
        assert_eq!(finding.subject, "mirror-shell");
        assert_eq!(finding.message, "missing required field: license");
    }

    #[test]
    fn absent_dependencies_field_is_blocking_but_empty_list_is_fine() {
        let mut d = descriptor("mirror-mesh");
        d.as_object_mut().unwrap().remove("dependencies");
        let loaded = load(&index_with(vec![d, descriptor("mirror-core")]), &[]).unwrap();
        assert!(loaded
            .findings
            .iter()
            .any(|f| f.subject == "mirror-mesh"
                && f.message == "missing required field: dependencies"));
        assert!(!loaded
            .findings
            .iter()
            .any(|f| f.subject == "mirror-core" && f.message.contains("dependencies")));
    }

    #[test]
    fn overlong_short_description_is_a_warning_not_a_failure() {
        let mut d = descriptor("mirror-brain");
        d["short_description"] = serde_json::Value::String("x".repeat(180));
        let loaded = load(&index_with(vec![d]), &[]).unwrap();
        assert!(loaded.records.contains_key("mirror-brain"));
        let finding = loaded
            .findings
            .iter()
            .find(|f| f.message.contains("short_description exceeds"))
            .expect("length finding");
        assert_eq!(finding.severity, Severity::Warning);
        assert!(finding.message.contains("180 chars"));
    }

    #[test]
    fn unknown_extra_field_logged_as_info() {
        let mut d = descriptor("mirror-swarm");
        d["sparkle"] = serde_json::json!(true);
        let loaded = load(&index_with(vec![d]), &[]).unwrap();
        let finding = loaded
            .findings
            .iter()
            .find(|f| f.message.contains("unknown field `sparkle`"))
            .expect("extra-field finding");
        assert_eq!(finding.severity, Severity::Info);
    }

    #[test]
    fn invalid_descriptor_does_not_abort_the_load() {
        let bad = serde_json::json!({"name": "broken", "dependencies": "not-a-list"});
        let loaded = load(&index_with(vec![bad, descriptor("mirror-core")]), &[]).unwrap();
        assert!(loaded.records.contains_key("mirror-core"));
        assert!(!loaded.records.contains_key("broken"));
        assert!(loaded
            .findings
            .iter()
            .any(|f| f.severity == Severity::Blocking
                && f.message.contains("structurally invalid descriptor")));
    }

    #[test]
    fn duplicate_name_keeps_first_and_reports_blocking() {
        let mut second = descriptor("mirror-core");
        second["license"] = serde_json::json!("MIT");
        let loaded = load(&index_with(vec![descriptor("mirror-core"), second]), &[]).unwrap();
        assert_eq!(loaded.records["mirror-core"].license.as_deref(), Some("Apache-2.0"));
        assert!(loaded
            .findings
            .iter()
            .any(|f| f.message.contains("duplicate repository name")));
    }

    #[test]
    fn dependency_kind_suffix_parses_and_unknown_kind_warns() {
        let mut d = descriptor("mirror-gate");
        d["dependencies"] = serde_json::json!(["mirror-core", "lingos:conceptual", "udtp:weird"]);
        let loaded = load(&index_with(vec![d]), &[]).unwrap();
        let deps = loaded.records["mirror-gate"].declared_dependencies();
        assert_eq!(deps[0], DependencyDecl::direct("mirror-core"));
        assert_eq!(
            deps[1],
            DependencyDecl::typed("lingos", DependencyKind::Conceptual)
        );
        assert_eq!(deps[2], DependencyDecl::direct("udtp"));
        assert!(loaded
            .findings
            .iter()
            .any(|f| f.message.contains("unknown dependency kind `weird`")));
    }

    #[test]
    fn override_fields_win_and_fill_gaps() {
        let mut d = descriptor("mirror-brain");
        d.as_object_mut().unwrap().remove("license");
        let overrides = [OverrideSource {
            location: "mirror-brain/metadata.yml".to_string(),
            yaml: "name: mirror-brain\nlicense: MIT\nstatus: beta\n".to_string(),
        }];
        let loaded = load(&index_with(vec![d]), &overrides).unwrap();
        let record = &loaded.records["mirror-brain"];
        assert_eq!(record.license.as_deref(), Some("MIT"));
        assert_eq!(record.status, Some(Status::Beta));
        // License was supplied by the override, so no missing-field finding.
        assert!(!loaded
            .findings
            .iter()
            .any(|f| f.message.contains("missing required field: license")));
    }

    #[test]
    fn unparsable_override_is_fatal() {
        let overrides = [OverrideSource {
            location: "broken/metadata.yml".to_string(),
            yaml: "name: [unclosed".to_string(),
        }];
        let err = load(&index_with(vec![descriptor("a")]), &overrides).unwrap_err();
        let AuditError::MalformedMetadata { location, .. } = err;
        assert_eq!(location, "broken/metadata.yml");
    }

    #[test]
    fn override_for_unknown_repo_is_a_warning() {
        let overrides = [OverrideSource {
            location: "ghost/metadata.yml".to_string(),
            yaml: "name: ghost\nlicense: MIT\n".to_string(),
        }];
        let loaded = load(&index_with(vec![descriptor("mirror-core")]), &overrides).unwrap();
        assert!(loaded
            .findings
            .iter()
            .any(|f| f.severity == Severity::Warning
                && f.message.contains("absent from the index")));
    }

    #[test]
    fn invalid_enum_values_load_with_raw_string_kept() {
        let mut d = descriptor("mirror-zkp");
        d["layer"] = serde_json::json!("frontend");
        d["status"] = serde_json::json!("archived");
        let loaded = load(&index_with(vec![d]), &[]).unwrap();
        let record = &loaded.records["mirror-zkp"];
        assert_eq!(record.layer, None);
        assert_eq!(record.declared_layer.as_deref(), Some("frontend"));
        assert_eq!(record.status, None);
        assert_eq!(record.declared_status.as_deref(), Some("archived"));
    }
}
