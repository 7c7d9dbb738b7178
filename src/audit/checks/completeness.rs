//! Required-field and enumeration-membership rule.

use crate::audit::traits::{AuditCheck, CheckContext, CheckError};
use crate::model::{Category, Finding};

const VALID_LAYERS: &str = "protocol|language|runtime|application|infrastructure|research";
const VALID_STATUSES: &str = "alpha|beta|stable|deprecated";

/// Surfaces the loader's completeness findings and adds the residual checks
/// the loader defers: a declared layer or status that is not a member of its
/// closed enumeration.
pub struct CompletenessCheck;

impl AuditCheck for CompletenessCheck {
    fn name(&self) -> &'static str {
        "completeness"
    }

    fn run(&self, ctx: &CheckContext<'_>) -> Result<Vec<Finding>, CheckError> {
        let mut findings = ctx.load_findings.to_vec();

        for record in ctx.graph.records().values() {
            if let (Some(declared), None) = (&record.declared_layer, record.layer) {
                findings.push(
                    Finding::blocking(
                        Category::Metadata,
                        &record.name,
                        format!("invalid layer `{declared}`; must be one of {VALID_LAYERS}"),
                    )
                    .with_remediation("pick a layer from the closed enumeration"),
                );
            }
            if let (Some(declared), None) = (&record.declared_status, record.status) {
                findings.push(
                    Finding::blocking(
                        Category::Metadata,
                        &record.name,
                        format!("invalid status `{declared}`; must be one of {VALID_STATUSES}"),
                    )
                    .with_remediation("pick a status from the closed enumeration"),
                );
            }
        }

        Ok(findings)
    }
}
