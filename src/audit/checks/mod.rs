//! Built-in audit rules.
//!
//! Each rule is one [`AuditCheck`](crate::audit::AuditCheck) implementation:
//! - [`CompletenessCheck`] — required fields and closed-enumeration membership
//! - [`DependencyValidityCheck`] — no unresolved dependencies
//! - [`CycleFreedomCheck`] — no direct-edge cycles
//! - [`StalenessCheck`] — published statistics and untouched repositories
//! - [`LinkLivenessCheck`] — referenced URLs respond

pub mod completeness;
pub mod cycles;
pub mod dependencies;
pub mod links;
pub mod staleness;

pub use completeness::CompletenessCheck;
pub use cycles::CycleFreedomCheck;
pub use dependencies::DependencyValidityCheck;
pub use links::LinkLivenessCheck;
pub use staleness::StalenessCheck;
