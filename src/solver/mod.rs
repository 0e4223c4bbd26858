//! Seam to the external Bayesian solver, and the checks applied to what it returns.
//!
//! The sampler itself lives outside this crate. A `SpatialRegressionSolver` receives the
//! outcome table (response, trials, covariates with gaps, adjacency keyed by unit id)
//! and the sampler settings, and returns per-chain draws. `fit_checked` pools the chains,
//! verifies that they cover exactly the modeled units and stops on non-convergence.

mod diagnostics;
mod draws;
mod file;
mod sampler;

use anyhow::{Context, Result};
use tracing::{error, info};

pub use diagnostics::{ConvergenceThresholds, DiagnosticFailure, Diagnostics, Statistic};
pub use draws::{ChainDraws, ImputedDraws, PosteriorDraws};
pub use file::DrawFiles;
pub use sampler::SamplerConfig;

use crate::{error::ModelError, outcome::OutcomeTable};

/// Everything the solver is given.
#[derive(Debug, Clone, Copy)]
pub struct SolverInput<'a> {
    pub table: &'a OutcomeTable,
    pub sampler: &'a SamplerConfig,
}

/// Everything the solver returns.
#[derive(Debug, Clone)]
pub struct SolverOutput {
    pub chains: Vec<ChainDraws>,
    pub diagnostics: Option<Diagnostics>, // reported by the sampler, merged over computed ones
}

pub trait SpatialRegressionSolver {
    /// Run the sampler to completion. Blocking; returns every chain or fails.
    fn fit(&self, input: &SolverInput<'_>) -> Result<SolverOutput>;
}

/// Pooled draws that passed the convergence checks.
#[derive(Debug, Clone)]
pub struct Posterior {
    pub draws: PosteriorDraws,
    pub diagnostics: Diagnostics,
}

/// Fit with `solver`, pool the chains and check them.
///
/// Fails with `ModelError::UnknownUnit` / `MissingUnit` when the draws and the outcome
/// table disagree on units, with `ModelError::ImputationMismatch` when imputed draws and
/// missing covariates disagree, and with `ModelError::NonConvergence` when any R-hat or
/// ESS lies outside `thresholds`.
pub fn fit_checked(
    solver: &dyn SpatialRegressionSolver,
    input: &SolverInput<'_>,
    thresholds: &ConvergenceThresholds,
) -> Result<Posterior> {
    let output = solver.fit(input).context("[solver] solver failed")?;
    let draws = PosteriorDraws::pool(&output.chains)?;
    check_units(&draws, input.table)?;

    let mut diagnostics = Diagnostics::from_chains(&output.chains);
    if let Some(reported) = output.diagnostics {
        diagnostics.merge(reported);
    }
    if let Err(err) = diagnostics.check(thresholds) {
        error!(%err, "convergence check failed; posterior summaries are not trustworthy");
        return Err(err.into());
    }

    info!(
        chains = draws.chain_count(),
        draws = draws.draw_count(),
        units = draws.units().len(),
        worst_rhat = diagnostics.worst_rhat().map_or(f64::NAN, |(_, v)| v),
        lowest_ess = diagnostics.lowest_ess().map_or(f64::NAN, |(_, v)| v),
        "posterior draws passed convergence checks"
    );
    Ok(Posterior { draws, diagnostics })
}

/// Draws must cover exactly the modeled units.
pub(crate) fn check_units(draws: &PosteriorDraws, table: &OutcomeTable) -> Result<(), ModelError> {
    let imputed_units = draws.imputed().values().flat_map(|imputed| imputed.units.iter());
    if let Some(unknown) = draws.units().iter().chain(imputed_units).find(|unit| !table.contains(unit)) {
        return Err(ModelError::UnknownUnit(unknown.clone()));
    }
    if let Some(missing) = table.records().iter().find(|record| draws.unit_draws(record.unit()).is_none()) {
        return Err(ModelError::MissingUnit(missing.unit().clone()));
    }
    check_imputed(draws, table)
}

/// Imputed draws cover exactly the missing covariate values, or are absent altogether.
fn check_imputed(draws: &PosteriorDraws, table: &OutcomeTable) -> Result<(), ModelError> {
    if draws.imputed().is_empty() {
        return Ok(());
    }
    let missing = table.missing_covariates();

    for (covariate, imputed) in draws.imputed() {
        let expected = missing.get(covariate);
        if let Some(unit) = imputed.units.iter().find(|unit| !expected.is_some_and(|ids| ids.contains(unit))) {
            return Err(ModelError::ImputationMismatch(format!("{covariate}:{unit} is not missing in the model input")));
        }
    }
    for (covariate, units) in &missing {
        let imputed = draws.imputed().get(covariate);
        if let Some(unit) = units.iter().find(|unit| !imputed.is_some_and(|draws| draws.units.contains(unit))) {
            return Err(ModelError::ImputationMismatch(format!("{covariate}:{unit} is missing but has no imputed draws")));
        }
    }
    Ok(())
}
