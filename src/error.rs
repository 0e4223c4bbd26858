//! Errors a caller is expected to match on.
//!
//! Everything else travels as `anyhow::Error` with context attached; these variants
//! are wrapped into `anyhow::Error` too and can be recovered with `downcast_ref`.

use thiserror::Error;

use crate::{solver::DiagnosticFailure, unit::UnitId};

#[derive(Error, Debug)]
pub enum ModelError {
    /// Convergence diagnostics outside the configured thresholds; summaries must not be trusted.
    #[error("sampler did not converge: {} diagnostic(s) out of range, first: {}", .failures.len(), .failures.first().map(ToString::to_string).unwrap_or_default())]
    NonConvergence { failures: Vec<DiagnosticFailure> },

    /// Posterior draws contain a unit that is not part of the modeled set.
    #[error("posterior draws reference unit {0} which is not in the modeled set")]
    UnknownUnit(UnitId),

    /// A modeled unit has no column in the posterior draws.
    #[error("modeled unit {0} has no posterior draws")]
    MissingUnit(UnitId),

    /// Imputed draws do not line up with the covariate values missing from the model input.
    #[error("imputed draws do not match the missing covariates: {0}")]
    ImputationMismatch(String),

    /// Chains cannot be pooled (different units or covariates).
    #[error("chains cannot be pooled: {0}")]
    ChainMismatch(String),

    /// No draws were returned.
    #[error("the solver returned no posterior draws")]
    NoDraws,

    /// Configuration loading or validation error.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
