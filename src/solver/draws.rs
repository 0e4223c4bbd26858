use std::collections::BTreeMap;

use ahash::AHashMap;
use anyhow::{Result, ensure};
use ndarray::{concatenate, Array2, ArrayView1, Axis};

use crate::{error::ModelError, unit::UnitId};

/// Imputed values of one covariate: draws × units that had a missing entry.
#[derive(Debug, Clone, PartialEq)]
pub struct ImputedDraws {
    pub units: Vec<UnitId>,
    pub values: Array2<f64>,
}

/// Output of one sampler chain.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainDraws {
    pub units: Vec<UnitId>,       // column order of `predictions`
    pub predictions: Array2<f64>, // draws × units, posterior predictive counts
    pub imputed: BTreeMap<String, ImputedDraws>,
}

impl ChainDraws {
    pub fn new(units: Vec<UnitId>, predictions: Array2<f64>) -> Result<Self> {
        ensure!(
            predictions.ncols() == units.len(),
            "[solver::draws] predictions have {} columns for {} units", predictions.ncols(), units.len()
        );
        Ok(Self { units, predictions, imputed: BTreeMap::new() })
    }

    pub fn with_imputed(mut self, covariate: &str, draws: ImputedDraws) -> Result<Self> {
        ensure!(
            draws.values.nrows() == self.predictions.nrows(),
            "[solver::draws] imputed {covariate:?} has {} draws, predictions have {}",
            draws.values.nrows(), self.predictions.nrows()
        );
        ensure!(
            draws.values.ncols() == draws.units.len(),
            "[solver::draws] imputed {covariate:?} has {} columns for {} units", draws.values.ncols(), draws.units.len()
        );
        self.imputed.insert(covariate.to_string(), draws);
        Ok(self)
    }

    #[inline] pub fn draw_count(&self) -> usize { self.predictions.nrows() }
}

/// Posterior draws pooled across chains, columns keyed by unit identifier.
#[derive(Debug, Clone)]
pub struct PosteriorDraws {
    units: Vec<UnitId>,
    index: AHashMap<UnitId, usize>,
    predictions: Array2<f64>,
    imputed: BTreeMap<String, ImputedDraws>,
    chains: usize,
}

impl PosteriorDraws {
    /// Pool chains by concatenating their draws. Chains must agree on units and imputed covariates.
    pub fn pool(chains: &[ChainDraws]) -> Result<Self> {
        let Some(first) = chains.first() else { return Err(ModelError::NoDraws.into()) };
        let units = first.units.clone();

        for (i, chain) in chains.iter().enumerate().skip(1) {
            if chain.units != units {
                return Err(ModelError::ChainMismatch(format!("chain {} has a different unit order than chain 0", i)).into());
            }
            let same_imputed = chain.imputed.len() == first.imputed.len()
                && chain.imputed.iter().all(|(name, draws)| {
                    first.imputed.get(name).is_some_and(|other| other.units == draws.units)
                });
            if !same_imputed {
                return Err(ModelError::ChainMismatch(format!("chain {} imputed different covariates than chain 0", i)).into());
            }
        }

        let predictions = concatenate(
            Axis(0),
            &chains.iter().map(|chain| chain.predictions.view()).collect::<Vec<_>>(),
        )?;
        if predictions.nrows() == 0 {
            return Err(ModelError::NoDraws.into());
        }

        let imputed = first.imputed.iter()
            .map(|(name, draws)| {
                let values = concatenate(
                    Axis(0),
                    &chains.iter().map(|chain| chain.imputed[name].values.view()).collect::<Vec<_>>(),
                )?;
                Ok((name.clone(), ImputedDraws { units: draws.units.clone(), values }))
            })
            .collect::<Result<BTreeMap<_, _>>>()?;

        Ok(Self {
            index: units.iter().enumerate().map(|(i, id)| (id.clone(), i)).collect(),
            units,
            predictions,
            imputed,
            chains: chains.len(),
        })
    }

    /// Number of pooled draws.
    #[inline] pub fn draw_count(&self) -> usize { self.predictions.nrows() }

    /// Number of chains that were pooled.
    #[inline] pub fn chain_count(&self) -> usize { self.chains }

    #[inline] pub fn units(&self) -> &[UnitId] { &self.units }

    #[inline] pub fn predictions(&self) -> &Array2<f64> { &self.predictions }

    #[inline] pub fn imputed(&self) -> &BTreeMap<String, ImputedDraws> { &self.imputed }

    /// Predictive draws of one unit.
    pub fn unit_draws(&self, id: &UnitId) -> Option<ArrayView1<'_, f64>> {
        self.index.get(id).map(|&j| self.predictions.column(j))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn ids(names: &[&str]) -> Vec<UnitId> {
        names.iter().map(|&n| UnitId::new(n)).collect()
    }

    #[test]
    fn pooling_concatenates_draws() {
        let a = ChainDraws::new(ids(&["x", "y"]), array![[1.0, 2.0], [3.0, 4.0]]).unwrap();
        let b = ChainDraws::new(ids(&["x", "y"]), array![[5.0, 6.0]]).unwrap();

        let pooled = PosteriorDraws::pool(&[a, b]).unwrap();

        assert_eq!(pooled.draw_count(), 3);
        assert_eq!(pooled.chain_count(), 2);
        assert_eq!(pooled.unit_draws(&UnitId::new("y")).unwrap().to_vec(), vec![2.0, 4.0, 6.0]);
        assert!(pooled.unit_draws(&UnitId::new("z")).is_none());
    }

    #[test]
    fn pooling_keeps_imputed_draws_aligned() {
        let imputed = |v: f64| ImputedDraws { units: ids(&["y"]), values: array![[v]] };
        let a = ChainDraws::new(ids(&["x", "y"]), array![[1.0, 2.0]]).unwrap()
            .with_imputed("income", imputed(10.0)).unwrap();
        let b = ChainDraws::new(ids(&["x", "y"]), array![[1.0, 2.0]]).unwrap()
            .with_imputed("income", imputed(20.0)).unwrap();

        let pooled = PosteriorDraws::pool(&[a, b]).unwrap();

        assert_eq!(pooled.imputed()["income"].values, array![[10.0], [20.0]]);
    }

    #[test]
    fn chains_with_different_units_cannot_pool() {
        let a = ChainDraws::new(ids(&["x", "y"]), array![[1.0, 2.0]]).unwrap();
        let b = ChainDraws::new(ids(&["y", "x"]), array![[2.0, 1.0]]).unwrap();

        let err = PosteriorDraws::pool(&[a, b]).unwrap_err();
        assert!(matches!(err.downcast_ref::<ModelError>(), Some(ModelError::ChainMismatch(_))));
    }

    #[test]
    fn empty_input_is_no_draws() {
        let err = PosteriorDraws::pool(&[]).unwrap_err();
        assert!(matches!(err.downcast_ref::<ModelError>(), Some(ModelError::NoDraws)));
    }

    #[test]
    fn mismatched_columns_are_rejected() {
        assert!(ChainDraws::new(ids(&["x"]), array![[1.0, 2.0]]).is_err());
    }
}
