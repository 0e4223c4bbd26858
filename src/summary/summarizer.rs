use anyhow::{Result, ensure};
use ndarray::Array1;
use tracing::{debug, info};

use crate::{
    common::{describe, std_dev},
    error::ModelError,
    outcome::{Caveat, OutcomeTable},
    solver::{Posterior, PosteriorDraws, check_units},
};
use super::{CaveatNote, ConvergenceSummary, Estimate, ImputedSummary, Interval, StatewideSummary, Summary, UnitSummary};

/// Summarizes pooled posterior predictive draws against the outcome table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PosteriorSummarizer {
    mass: f64,
}

impl PosteriorSummarizer {
    /// `mass` is the probability mass of every highest-density interval, in (0, 1].
    pub fn new(mass: f64) -> Result<Self> {
        ensure!(mass > 0.0 && mass <= 1.0, "[summary] credible mass {mass} must lie in (0, 1]");
        Ok(Self { mass })
    }

    #[inline] pub fn mass(&self) -> f64 { self.mass }

    fn estimate(&self, values: &[f64]) -> Result<Estimate> {
        let (mean, median, lower, upper) = describe(values, self.mass).ok_or(ModelError::NoDraws)?;
        Ok(Estimate { mean, median, interval: Interval { mass: self.mass, lower, upper } })
    }

    /// Summarize checked draws, including their convergence figures.
    pub fn summarize_posterior(&self, posterior: &Posterior, table: &OutcomeTable) -> Result<Summary> {
        let mut summary = self.summarize(&posterior.draws, table)?;
        summary.convergence = Some(ConvergenceSummary {
            parameters: posterior.diagnostics.rhat.len(),
            worst_rhat: posterior.diagnostics.worst_rhat().map(|(name, v)| (name.to_string(), v)),
            lowest_ess: posterior.diagnostics.lowest_ess().map(|(name, v)| (name.to_string(), v)),
        });
        Ok(summary)
    }

    /// Summarize `draws`, joined to `table` by unit id. Callers outside the crate go
    /// through `summarize_posterior`, so only converged draws are summarized.
    ///
    /// The statewide ratio is computed inside each draw (summed predicted responses over
    /// summed trials) and only then summarized across draws.
    pub(crate) fn summarize(&self, draws: &PosteriorDraws, table: &OutcomeTable) -> Result<Summary> {
        let modeled = table.modeled_totals();
        if table.is_empty() || !(modeled.trials > 0.0) {
            return Err(ModelError::InvalidConfig("the outcome table has no modeled units to summarize".into()).into());
        }
        check_units(draws, table)?;

        let mut statewide = Array1::<f64>::zeros(draws.draw_count());
        let mut units = Vec::with_capacity(table.len());
        for record in table.records() {
            let predicted = draws.unit_draws(record.unit())
                .ok_or_else(|| ModelError::MissingUnit(record.unit().clone()))?;
            statewide += &predicted;

            let ratios = predicted.iter().map(|&y| y / record.trials()).collect::<Vec<_>>();
            let estimate = self.estimate(&ratios)?;
            debug!(unit = %record.unit(), mean = estimate.mean, lower = estimate.interval.lower, upper = estimate.interval.upper, "unit summary");
            units.push(UnitSummary {
                unit: record.unit().clone(),
                response: record.response(),
                trials: record.trials(),
                observed_ratio: record.ratio(),
                predicted_ratio: estimate,
            });
        }

        let full = table.full_totals();
        statewide /= modeled.trials;
        let predicted_ratio = self.estimate(statewide.as_slice().ok_or(ModelError::NoDraws)?)?;

        let mut imputed = Vec::new();
        for (covariate, values) in draws.imputed() {
            for (j, unit) in values.units.iter().enumerate() {
                let column = values.values.column(j).to_vec();
                let estimate = self.estimate(&column)?;
                imputed.push(ImputedSummary {
                    covariate: covariate.clone(),
                    unit: unit.clone(),
                    mean: estimate.mean,
                    std_dev: std_dev(&column).ok_or(ModelError::NoDraws)?,
                    interval: estimate.interval,
                });
            }
        }

        let mut caveats = table.caveats();
        if !imputed.is_empty() && !caveats.contains(&Caveat::ImputedCovariates) {
            caveats.push(Caveat::ImputedCovariates);
            caveats.sort();
        }

        info!(
            units = units.len(),
            draws = draws.draw_count(),
            statewide_mean = predicted_ratio.mean,
            lower = predicted_ratio.interval.lower,
            upper = predicted_ratio.interval.upper,
            "summarized posterior"
        );

        Ok(Summary {
            response: table.response_choice().to_string(),
            denominator: table.denominator(),
            chains: draws.chain_count(),
            draws: draws.draw_count(),
            units,
            statewide: StatewideSummary {
                modeled,
                modeled_ratio: modeled.ratio(),
                predicted_ratio,
                full,
                full_ratio: full.ratio(),
            },
            imputed,
            exclusions: table.exclusions().to_vec(),
            caveats: caveats.into_iter().map(CaveatNote::from).collect(),
            convergence: None,
        })
    }
}
