//! Core data model for the ecosystem auditor.
//!
//! The types here are the normalized, in-memory shape of the audited universe:
//! - [`RepositoryRecord`] — one repository descriptor from the canonical index
//! - [`DependencyDecl`] — a declared dependency, typed by [`DependencyKind`]
//! - [`Finding`] — one audit result with severity and category
//!
//! Records are rebuilt fresh on every audit run; nothing in this module is
//! persisted between runs.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum allowed length of a repository's `short_description`.
pub const SHORT_DESCRIPTION_MAX: usize = 150;

// ============================================================================
// Closed enumerations
// ============================================================================

/// Architectural layer a repository belongs to. Closed enumeration: a
/// declared value outside this set is a completeness violation, not a new
/// layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layer {
    Protocol,
    Language,
    Runtime,
    Application,
    Infrastructure,
    Research,
}

impl Layer {
    /// Parses a declared layer string, `None` if it is not a member of the
    /// closed enumeration.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "protocol" => Some(Self::Protocol),
            "language" => Some(Self::Language),
            "runtime" => Some(Self::Runtime),
            "application" => Some(Self::Application),
            "infrastructure" => Some(Self::Infrastructure),
            "research" => Some(Self::Research),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Protocol => "protocol",
            Self::Language => "language",
            Self::Runtime => "runtime",
            Self::Application => "application",
            Self::Infrastructure => "infrastructure",
            Self::Research => "research",
        }
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle status of a repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Alpha,
    Beta,
    Stable,
    Deprecated,
}

impl Status {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "alpha" => Some(Self::Alpha),
            "beta" => Some(Self::Beta),
            "stable" => Some(Self::Stable),
            "deprecated" => Some(Self::Deprecated),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Alpha => "alpha",
            Self::Beta => "beta",
            Self::Stable => "stable",
            Self::Deprecated => "deprecated",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Dependencies
// ============================================================================

/// Classification of a dependency edge.
///
/// Only `Direct` edges participate in the hard cycle-freedom invariant;
/// cycles among the other kinds are legitimate (conceptual relationships may
/// be mutual) and downgrade to warnings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyKind {
    Direct,
    Conceptual,
    Test,
    Example,
}

impl DependencyKind {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "direct" => Some(Self::Direct),
            "conceptual" => Some(Self::Conceptual),
            "test" => Some(Self::Test),
            "example" => Some(Self::Example),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::Conceptual => "conceptual",
            Self::Test => "test",
            Self::Example => "example",
        }
    }
}

impl fmt::Display for DependencyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One declared dependency of a repository.
///
/// Declared in the index either as a bare name (`"mirror-core"`, a direct
/// dependency) or with an explicit kind suffix (`"mirror-core:conceptual"`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyDecl {
    /// Name of the depended-upon repository.
    pub name: String,

    /// Edge classification; defaults to `Direct` for bare declarations.
    pub kind: DependencyKind,
}

impl DependencyDecl {
    pub fn direct(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: DependencyKind::Direct,
        }
    }

    pub fn typed(name: impl Into<String>, kind: DependencyKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

// ============================================================================
// Repository records
// ============================================================================

/// Normalized descriptor for one repository in the ecosystem index.
///
/// Loading is forgiving: fields that are absent or fail their closed
/// enumeration stay `None` here and are surfaced as [`Finding`]s instead of
/// aborting the run. The raw declared strings are kept alongside the parsed
/// enums so completeness checks can name the offending value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryRecord {
    /// Unique name, primary key across the whole index.
    pub name: String,

    /// Parsed layer; `None` when missing or not a valid member.
    pub layer: Option<Layer>,

    /// Raw declared layer string, if any.
    pub declared_layer: Option<String>,

    /// Parsed status; `None` when missing or not a valid member.
    pub status: Option<Status>,

    /// Raw declared status string, if any.
    pub declared_status: Option<String>,

    /// One-line description, bounded by [`SHORT_DESCRIPTION_MAX`].
    pub short_description: Option<String>,

    /// Free-form long description.
    pub long_description: Option<String>,

    /// Declared dependencies in declaration order; `None` when the field was
    /// absent entirely (an empty list is a legitimate declaration).
    pub dependencies: Option<Vec<DependencyDecl>>,

    /// Tag set; `None` when the field was absent entirely.
    pub tags: Option<BTreeSet<String>>,

    /// SPDX license identifier.
    pub license: Option<String>,

    /// Version of the metadata spec this descriptor targets.
    pub spec_version: Option<String>,

    /// Repository home URL, probed for liveness when present.
    pub url: Option<String>,

    /// Documentation URL, probed for liveness when present.
    pub docs_url: Option<String>,

    /// Last observed content/status change, drives the staleness rule.
    pub last_updated: Option<DateTime<Utc>>,

    /// Explicit deprecation flag (optional in descriptors).
    pub deprecated: bool,
}

impl RepositoryRecord {
    /// Minimal record with only the name set. Used by the loader as the
    /// starting point before field extraction, and by tests.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            layer: None,
            declared_layer: None,
            status: None,
            declared_status: None,
            short_description: None,
            long_description: None,
            dependencies: None,
            tags: None,
            license: None,
            spec_version: None,
            url: None,
            docs_url: None,
            last_updated: None,
            deprecated: false,
        }
    }

    /// Declared dependencies, empty slice when the field was absent.
    pub fn declared_dependencies(&self) -> &[DependencyDecl] {
        self.dependencies.as_deref().unwrap_or(&[])
    }

    /// A repository counts as deprecated through either the explicit flag or
    /// its status.
    pub fn is_deprecated(&self) -> bool {
        self.deprecated || self.status == Some(Status::Deprecated)
    }
}

// ============================================================================
// Findings
// ============================================================================

/// Severity of a [`Finding`]. Ordering is audit-rank order: `Blocking`
/// sorts first and is the only severity that fails the pass/fail gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Blocking,
    Warning,
    Info,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Blocking => "blocking",
            Self::Warning => "warning",
            Self::Info => "info",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Category of a [`Finding`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Metadata,
    Dependency,
    Link,
    Staleness,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Metadata => "metadata",
            Self::Dependency => "dependency",
            Self::Link => "link",
            Self::Staleness => "staleness",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One audit result. Immutable once produced; the report orders findings by
/// severity, then category, then subject, then message for deterministic
/// output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub severity: Severity,
    pub category: Category,

    /// Repository name or URL the finding is about.
    pub subject: String,

    pub message: String,

    /// Suggested remediation, when one is known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remediation: Option<String>,
}

impl Finding {
    pub fn new(
        severity: Severity,
        category: Category,
        subject: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            category,
            subject: subject.into(),
            message: message.into(),
            remediation: None,
        }
    }

    pub fn blocking(
        category: Category,
        subject: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::new(Severity::Blocking, category, subject, message)
    }

    pub fn warning(
        category: Category,
        subject: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::new(Severity::Warning, category, subject, message)
    }

    pub fn info(
        category: Category,
        subject: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::new(Severity::Info, category, subject, message)
    }

    pub fn with_remediation(mut self, remediation: impl Into<String>) -> Self {
        self.remediation = Some(remediation.into());
        self
    }

    /// Total sort key used by the report builder. Severity rank first, so
    /// blocking findings lead the report.
    pub fn sort_key(&self) -> (Severity, Category, &str, &str) {
        (self.severity, self.category, &self.subject, &self.message)
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} {}: {}",
            self.severity, self.category, self.subject, self.message
        )?;
        if let Some(hint) = &self.remediation {
            write!(f, " (hint: {})", hint)?;
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layer_parse_is_case_insensitive_and_closed() {
        assert_eq!(Layer::parse("Protocol"), Some(Layer::Protocol));
        assert_eq!(Layer::parse(" runtime "), Some(Layer::Runtime));
        assert_eq!(Layer::parse("frontend"), None);
        assert_eq!(Layer::parse(""), None);
    }

    #[test]
    fn status_parse_rejects_unknown_values() {
        assert_eq!(Status::parse("stable"), Some(Status::Stable));
        assert_eq!(Status::parse("archived"), None);
    }

    #[test]
    fn severity_ordering_puts_blocking_first() {
        let mut severities = vec![Severity::Info, Severity::Blocking, Severity::Warning];
        severities.sort();
        assert_eq!(
            severities,
            vec![Severity::Blocking, Severity::Warning, Severity::Info]
        );
    }

    #[test]
    fn finding_sort_key_orders_by_severity_then_category_then_subject() {
        let a = Finding::warning(Category::Metadata, "zeta", "m");
        let b = Finding::blocking(Category::Link, "alpha", "m");
        let c = Finding::blocking(Category::Dependency, "alpha", "m");
        let mut findings = vec![a.clone(), b.clone(), c.clone()];
        findings.sort_by(|x, y| x.sort_key().cmp(&y.sort_key()));
        assert_eq!(findings, vec![c, b, a]);
    }

    #[test]
    fn deprecated_flag_or_status_marks_record_deprecated() {
        let mut record = RepositoryRecord::named("mirror-shell");
        assert!(!record.is_deprecated());
        record.status = Some(Status::Deprecated);
        assert!(record.is_deprecated());
        let mut flagged = RepositoryRecord::named("mirror-gate");
        flagged.deprecated = true;
        assert!(flagged.is_deprecated());
    }

    #[test]
    fn finding_display_includes_remediation_hint() {
        let finding = Finding::blocking(Category::Metadata, "mirror-core", "missing field")
            .with_remediation("add the field to metadata.yml");
        let rendered = finding.to_string();
        assert!(rendered.contains("[blocking]"));
        assert!(rendered.contains("hint: add the field"));
    }

    #[test]
    fn dependency_kind_serializes_lowercase() {
        let json = serde_json::to_string(&DependencyKind::Conceptual).unwrap();
        assert_eq!(json, "\"conceptual\"");
    }
}
