use std::{collections::BTreeMap, path::PathBuf};

use anyhow::{Context, Result, bail};
use ndarray::Axis;
use tracing::{info, warn};

use crate::{error::ModelError, io, unit::UnitId};
use super::{ChainDraws, Diagnostics, ImputedDraws, SolverInput, SolverOutput, SpatialRegressionSolver};

/// Separator between covariate name and unit id in imputed draw columns (`income:P12`).
const IMPUTED_SEPARATOR: char = ':';

/// A solver whose sampler already ran: draws are read from the files it wrote.
///
/// - `predictions`: CSV with optional `chain`/`draw` columns and one column per unit id.
/// - `imputed`: CSV with the same labels and one `<covariate>:<unit id>` column per imputed value.
/// - `diagnostics`: JSON `{"rhat": {...}, "ess": {...}}` reported by the sampler.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawFiles {
    pub predictions: PathBuf,
    pub imputed: Option<PathBuf>,
    pub diagnostics: Option<PathBuf>,
}

impl DrawFiles {
    pub fn new(predictions: impl Into<PathBuf>) -> Self {
        Self { predictions: predictions.into(), imputed: None, diagnostics: None }
    }

    pub fn with_imputed(mut self, path: impl Into<PathBuf>) -> Self {
        self.imputed = Some(path.into());
        self
    }

    pub fn with_diagnostics(mut self, path: impl Into<PathBuf>) -> Self {
        self.diagnostics = Some(path.into());
        self
    }

    /// Imputed draws per chain label, grouped by covariate.
    fn read_imputed(&self, input: &SolverInput<'_>) -> Result<BTreeMap<String, BTreeMap<String, ImputedDraws>>> {
        let Some(path) = &self.imputed else { return Ok(BTreeMap::new()) };
        let table = io::read_draw_table(path)?;

        let mut groups = BTreeMap::<String, Vec<(usize, UnitId)>>::new();
        for (j, column) in table.columns.iter().enumerate() {
            let Some((covariate, unit)) = column.split_once(IMPUTED_SEPARATOR) else {
                bail!("[solver::file] imputed column {column:?} is not named <covariate>{IMPUTED_SEPARATOR}<unit>");
            };
            let unit = UnitId::new(unit);
            if !input.table.contains(&unit) {
                return Err(ModelError::UnknownUnit(unit)).with_context(|| format!("[solver::file] imputed column {column:?}"));
            }
            groups.entry(covariate.trim().to_string()).or_default().push((j, unit));
        }

        Ok(table.chains.into_iter()
            .map(|(label, values)| {
                let per_covariate = groups.iter()
                    .map(|(covariate, columns)| {
                        let indices = columns.iter().map(|&(j, _)| j).collect::<Vec<_>>();
                        let draws = ImputedDraws {
                            units: columns.iter().map(|(_, unit)| unit.clone()).collect(),
                            values: values.select(Axis(1), &indices),
                        };
                        (covariate.clone(), draws)
                    })
                    .collect();
                (label, per_covariate)
            })
            .collect())
    }
}

impl SpatialRegressionSolver for DrawFiles {
    fn fit(&self, input: &SolverInput<'_>) -> Result<SolverOutput> {
        let predictions = io::read_draw_table(&self.predictions)?;
        let units = predictions.columns.iter().map(|column| UnitId::new(column)).collect::<Vec<_>>();
        if let Some(unknown) = units.iter().find(|unit| !input.table.contains(unit)) {
            return Err(ModelError::UnknownUnit(unknown.clone()))
                .with_context(|| format!("[solver::file] reading {}", self.predictions.display()));
        }

        let mut imputed = self.read_imputed(input)?;
        let expected = input.sampler.draws_per_chain();

        let mut chains = Vec::with_capacity(predictions.chains.len());
        for (label, values) in predictions.chains {
            if values.nrows() != expected {
                warn!(chain = %label, draws = values.nrows(), expected, "chain length differs from the sampler settings");
            }
            let mut chain = ChainDraws::new(units.clone(), values)?;
            match imputed.remove(&label) {
                Some(per_covariate) => {
                    for (covariate, draws) in per_covariate {
                        chain = chain.with_imputed(&covariate, draws)
                            .with_context(|| format!("[solver::file] chain {label}"))?;
                    }
                }
                None if self.imputed.is_some() => {
                    return Err(ModelError::ChainMismatch(format!("chain {label} has no imputed draws")).into());
                }
                None => {}
            }
            chains.push(chain);
        }
        if let Some(label) = imputed.keys().next() {
            return Err(ModelError::ChainMismatch(format!("imputed chain {label} has no predictions")).into());
        }

        let diagnostics = self.diagnostics.as_deref()
            .map(io::read_json::<Diagnostics>)
            .transpose()?;

        info!(
            chains = chains.len(),
            units = units.len(),
            imputed = chains.first().map_or(0, |chain| chain.imputed.len()),
            reported_diagnostics = diagnostics.is_some(),
            "read posterior draws"
        );
        Ok(SolverOutput { chains, diagnostics })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use ndarray::array;
    use crate::{solver::SamplerConfig, testutil::chain_table};

    fn fit(files: &DrawFiles) -> Result<SolverOutput> {
        let table = chain_table();
        files.fit(&SolverInput { table: &table, sampler: &SamplerConfig::default() })
    }

    #[test]
    fn reads_predictions_imputed_values_and_diagnostics() {
        let dir = tempfile::tempdir().unwrap();
        let predictions = dir.path().join("draws.csv");
        let imputed = dir.path().join("imputed.csv");
        let diagnostics = dir.path().join("diagnostics.json");
        fs::write(&predictions, "chain,draw,A,B,C\n1,1,10,20,5\n1,2,11,19,6\n2,1,9,21,4\n").unwrap();
        fs::write(&imputed, "chain,draw,income:B\n1,1,50\n1,2,52\n2,1,48\n").unwrap();
        fs::write(&diagnostics, r#"{"rhat": {"sigma": 1.01}}"#).unwrap();

        let output = fit(&DrawFiles::new(&predictions).with_imputed(&imputed).with_diagnostics(&diagnostics)).unwrap();

        assert_eq!(output.chains.len(), 2);
        assert_eq!(output.chains[0].predictions, array![[10.0, 20.0, 5.0], [11.0, 19.0, 6.0]]);
        assert_eq!(output.chains[1].imputed["income"].values, array![[48.0]]);
        assert_eq!(output.chains[1].imputed["income"].units, vec![UnitId::new("B")]);
        assert_eq!(output.diagnostics.unwrap().rhat["sigma"], 1.01);
    }

    #[test]
    fn unknown_unit_columns_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let predictions = dir.path().join("draws.csv");
        fs::write(&predictions, "A,B,C,Z\n1,2,3,4\n").unwrap();

        let err = fit(&DrawFiles::new(&predictions)).unwrap_err();
        assert!(matches!(err.downcast_ref::<ModelError>(), Some(ModelError::UnknownUnit(id)) if id.as_str() == "Z"));
    }

    #[test]
    fn imputed_columns_need_a_covariate_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let predictions = dir.path().join("draws.csv");
        let imputed = dir.path().join("imputed.csv");
        fs::write(&predictions, "A,B,C\n1,2,3\n").unwrap();
        fs::write(&imputed, "B\n4\n").unwrap();

        assert!(fit(&DrawFiles::new(&predictions).with_imputed(&imputed)).is_err());
    }
}
