//! Convergence diagnostics: split R-hat and bulk effective sample size.

use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};

use crate::error::ModelError;
use super::ChainDraws;

/// Acceptable range of convergence diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConvergenceThresholds {
    pub max_rhat: f64,
    pub min_ess: f64,
}

impl Default for ConvergenceThresholds {
    fn default() -> Self {
        Self { max_rhat: 1.05, min_ess: 400.0 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Statistic {
    Rhat,
    Ess,
}

/// A single diagnostic outside its threshold.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiagnosticFailure {
    pub parameter: String,
    pub statistic: Statistic,
    pub value: f64,
    pub threshold: f64,
}

impl fmt::Display for DiagnosticFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.statistic {
            Statistic::Rhat => write!(f, "R-hat of {} is {:.3} (max {:.3})", self.parameter, self.value, self.threshold),
            Statistic::Ess => write!(f, "ESS of {} is {:.0} (min {:.0})", self.parameter, self.value, self.threshold),
        }
    }
}

/// R-hat and ESS per parameter name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Diagnostics {
    pub rhat: BTreeMap<String, f64>,
    pub ess: BTreeMap<String, f64>,
}

impl Diagnostics {
    /// Compute diagnostics for every predicted count (`y_rep[<unit>]`) and every
    /// imputed covariate value (`<covariate>[<unit>]`). Chains must share units.
    pub fn from_chains(chains: &[ChainDraws]) -> Self {
        let mut diagnostics = Self::default();
        let Some(first) = chains.first() else { return diagnostics };

        for (j, unit) in first.units.iter().enumerate() {
            let samples = chains.iter()
                .map(|chain| chain.predictions.column(j).to_vec())
                .collect::<Vec<_>>();
            diagnostics.insert(format!("y_rep[{unit}]"), &samples);
        }

        for (name, imputed) in &first.imputed {
            for (j, unit) in imputed.units.iter().enumerate() {
                let samples = chains.iter()
                    .filter_map(|chain| chain.imputed.get(name))
                    .map(|draws| draws.values.column(j).to_vec())
                    .collect::<Vec<_>>();
                diagnostics.insert(format!("{name}[{unit}]"), &samples);
            }
        }

        diagnostics
    }

    fn insert(&mut self, parameter: String, samples: &[Vec<f64>]) {
        self.rhat.insert(parameter.clone(), split_rhat(samples));
        self.ess.insert(parameter, effective_sample_size(samples));
    }

    /// Overlay diagnostics reported by the solver itself; reported values win.
    pub fn merge(&mut self, reported: Diagnostics) {
        self.rhat.extend(reported.rhat);
        self.ess.extend(reported.ess);
    }

    /// Every diagnostic outside `thresholds`. Non-finite values always fail.
    pub fn failures(&self, thresholds: &ConvergenceThresholds) -> Vec<DiagnosticFailure> {
        let rhat = self.rhat.iter()
            .filter(|&(_, &value)| !value.is_finite() || value > thresholds.max_rhat)
            .map(|(parameter, &value)| DiagnosticFailure {
                parameter: parameter.clone(),
                statistic: Statistic::Rhat,
                value,
                threshold: thresholds.max_rhat,
            });
        let ess = self.ess.iter()
            .filter(|&(_, &value)| !value.is_finite() || value < thresholds.min_ess)
            .map(|(parameter, &value)| DiagnosticFailure {
                parameter: parameter.clone(),
                statistic: Statistic::Ess,
                value,
                threshold: thresholds.min_ess,
            });
        rhat.chain(ess).collect()
    }

    /// Hard stop unless every diagnostic is inside `thresholds`.
    pub fn check(&self, thresholds: &ConvergenceThresholds) -> Result<(), ModelError> {
        let failures = self.failures(thresholds);
        if failures.is_empty() { Ok(()) } else { Err(ModelError::NonConvergence { failures }) }
    }

    /// Largest R-hat, treating non-finite values as worst.
    pub fn worst_rhat(&self) -> Option<(&str, f64)> {
        self.rhat.iter()
            .map(|(name, &value)| (name.as_str(), value))
            .max_by(|a, b| rank(a.1).total_cmp(&rank(b.1)))
    }

    /// Smallest ESS, treating non-finite values as worst.
    pub fn lowest_ess(&self) -> Option<(&str, f64)> {
        self.ess.iter()
            .map(|(name, &value)| (name.as_str(), value))
            .min_by(|a, b| (-rank(-a.1)).total_cmp(&(-rank(-b.1))))
    }
}

/// Map NaN to +inf so it sorts as the worst value.
fn rank(value: f64) -> f64 {
    if value.is_nan() { f64::INFINITY } else { value }
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn variance(values: &[f64], mu: f64) -> f64 {
    values.iter().map(|x| (x - mu).powi(2)).sum::<f64>() / (values.len() as f64 - 1.0)
}

/// Split R-hat: each chain is cut into two halves, then the Gelman-Rubin ratio is taken
/// over all halves. Chains are truncated to the shortest one. NaN with fewer than 4 draws.
pub(crate) fn split_rhat(chains: &[Vec<f64>]) -> f64 {
    let half = chains.iter().map(Vec::len).min().unwrap_or(0) / 2;
    if half < 2 { return f64::NAN }

    let halves = chains.iter()
        .flat_map(|chain| [&chain[..half], &chain[chain.len() - half..]])
        .collect::<Vec<_>>();
    let (m, n) = (halves.len() as f64, half as f64);

    let means = halves.iter().map(|h| mean(h)).collect::<Vec<_>>();
    let w = halves.iter().zip(&means).map(|(h, &mu)| variance(h, mu)).sum::<f64>() / m;
    let grand = mean(&means);
    let b = n * means.iter().map(|mu| (mu - grand).powi(2)).sum::<f64>() / (m - 1.0);

    if w == 0.0 {
        return if b == 0.0 { 1.0 } else { f64::INFINITY };
    }
    let var_plus = (n - 1.0) / n * w + b / n;
    (var_plus / w).sqrt()
}

/// Effective sample size from the multi-chain autocorrelation, truncated with
/// Geyer's initial monotone sequence. NaN with fewer than 4 draws per chain.
pub(crate) fn effective_sample_size(chains: &[Vec<f64>]) -> f64 {
    let n = chains.iter().map(Vec::len).min().unwrap_or(0);
    if n < 4 { return f64::NAN }

    let chains = chains.iter().map(|chain| &chain[..n]).collect::<Vec<_>>();
    let (m, nf) = (chains.len() as f64, n as f64);
    let total = m * nf;

    let means = chains.iter().map(|c| mean(c)).collect::<Vec<_>>();
    let w = chains.iter().zip(&means).map(|(c, &mu)| variance(c, mu)).sum::<f64>() / m;
    let b_over_n = if chains.len() > 1 { variance(&means, mean(&means)) } else { 0.0 };
    let var_plus = (nf - 1.0) / nf * w + b_over_n;
    if var_plus == 0.0 { return total }

    // Lag-t autocorrelation pooled across chains.
    let rho = |t: usize| -> f64 {
        if t == 0 { return 1.0 }
        let acov = chains.iter().zip(&means)
            .map(|(c, &mu)| (0..n - t).map(|i| (c[i] - mu) * (c[i + t] - mu)).sum::<f64>() / nf)
            .sum::<f64>() / m;
        1.0 - (w - acov) / var_plus
    };

    let mut sum = 0.0;
    let mut previous = f64::INFINITY;
    let mut t = 0;
    while t + 1 < n {
        let pair = rho(t) + rho(t + 1);
        if pair <= 0.0 { break }
        let pair = pair.min(previous);
        sum += pair;
        previous = pair;
        t += 2;
    }

    let tau = (2.0 * sum - 1.0).max(1.0 / total.log10());
    total / tau
}
