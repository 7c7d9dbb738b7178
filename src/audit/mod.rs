//! Audit module - rule engine and pipeline orchestration.
//!
//! This module provides the composable rule layer of the auditor:
//! - **Traits**: [`AuditCheck`] and [`CheckContext`] for independent checks
//! - **Checks**: the built-in rules under [`checks`]
//! - **Pipeline**: the [`pipeline::AuditPipeline`] orchestrator running
//!   Loader → Graph Builder → Rule Engine → Report Builder

pub mod checks;
pub mod pipeline;
pub mod traits;

// Re-export commonly used types
pub use traits::{AuditCheck, CheckContext, CheckError};

pub use pipeline::{
    AuditConfig, AuditInput, AuditOutcome, AuditPipeline, AuditStats, CheckSet,
};
