//! Dependency-validity rule.

use crate::audit::traits::{AuditCheck, CheckContext, CheckError};
use crate::model::Finding;

/// Surfaces the graph builder's unresolved-dependency findings. The builder
/// already dropped the offending edges; this rule owns reporting them so the
/// category can be toggled like any other rule.
pub struct DependencyValidityCheck;

impl AuditCheck for DependencyValidityCheck {
    fn name(&self) -> &'static str {
        "dependencies"
    }

    fn run(&self, ctx: &CheckContext<'_>) -> Result<Vec<Finding>, CheckError> {
        Ok(ctx.graph_findings.to_vec())
    }
}
