//! Model-input records: one immutable row per modeled precinct.

use std::collections::BTreeMap;

use ahash::AHashMap;
use anyhow::{Context, Result};
use polars::{frame::DataFrame, prelude::Column};
use serde::Serialize;
use tracing::info;

use crate::{
    adjacency::{Exclusion, ModeledSet, WeightMatrix},
    aggregate::{Aggregated, FieldKind},
    error::ModelError,
    loader::{Denominator, ElectionResults},
    unit::UnitId,
};

/// Model input of one precinct. Built once per run and only read afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutcomeRecord {
    unit: UnitId,
    row: usize,
    response: f64,
    trials: f64,
    covariates: BTreeMap<String, Option<f64>>,
}

impl OutcomeRecord {
    #[inline] pub fn unit(&self) -> &UnitId { &self.unit }

    /// Row of the unit in the modeled weight matrix.
    #[inline] pub fn row(&self) -> usize { self.row }

    #[inline] pub fn response(&self) -> f64 { self.response }

    #[inline] pub fn trials(&self) -> f64 { self.trials }

    #[inline] pub fn covariates(&self) -> &BTreeMap<String, Option<f64>> { &self.covariates }

    pub fn covariate(&self, name: &str) -> Option<f64> {
        self.covariates.get(name).copied().flatten()
    }

    /// Observed response / trials.
    #[inline] pub fn ratio(&self) -> f64 { self.response / self.trials }
}

/// Response and trial totals over a set of units.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Totals {
    pub units: usize,
    pub response: f64,
    pub trials: f64,
}

impl Totals {
    /// Response / trials, `None` without trials.
    pub fn ratio(&self) -> Option<f64> {
        (self.trials > 0.0).then(|| self.response / self.trials)
    }

    fn add(&mut self, response: f64, trials: f64) {
        self.units += 1;
        self.response += response;
        self.trials += trials;
    }
}

/// Known limitations carried alongside every result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Caveat {
    MedianOfEstimates,
    ImputedCovariates,
    ExcludedUnits,
}

impl Caveat {
    pub fn description(&self) -> &'static str {
        match self {
            Caveat::MedianOfEstimates =>
                "rate covariates are medians of block-group estimates; their measurement error is not propagated",
            Caveat::ImputedCovariates =>
                "some covariates were missing and were imputed by the solver; their draws carry extra uncertainty",
            Caveat::ExcludedUnits =>
                "some units were excluded from the model; the modeled total differs from the full total",
        }
    }
}

/// Outcome records of the modeled set plus the adjacency they are regressed over.
#[derive(Debug, Clone)]
pub struct OutcomeTable {
    response: String,
    denominator: Denominator,
    covariates: Vec<(String, FieldKind)>,
    records: Vec<OutcomeRecord>,
    index: AHashMap<UnitId, usize>,
    weights: WeightMatrix,
    modeled: Totals,
    full: Totals,
    exclusions: Vec<Exclusion>,
}

impl OutcomeTable {
    /// Assemble one record per unit of `modeled`, in the weight matrix's row order.
    ///
    /// `response` must be a choice of the pivoted contest. The full totals cover every
    /// pivoted unit, `exclusions` included.
    pub fn build(
        results: &ElectionResults,
        response: &str,
        denominator: Denominator,
        modeled: &ModeledSet,
        covariates: Option<&Aggregated>,
        exclusions: Vec<Exclusion>,
    ) -> Result<Self> {
        if !results.choices().iter().any(|choice| choice == response) {
            return Err(ModelError::InvalidConfig(format!(
                "response choice {response:?} is not one of {:?}", results.choices()
            )).into());
        }

        let covariate_kinds = covariates
            .map(|aggregated| aggregated.fields().map(|(name, kind)| (name.to_string(), kind)).collect::<Vec<_>>())
            .unwrap_or_default();

        let mut records = Vec::with_capacity(modeled.len());
        let mut totals = Totals::default();
        for (row, id) in modeled.ids().iter().enumerate() {
            let unit = results.get(id)
                .ok_or_else(|| ModelError::MissingUnit(id.clone()))
                .context("[outcome] modeled unit has no results")?;
            let response_count = unit.votes(response);
            let trials = unit.trials(denominator)
                .filter(|&t| t > 0.0)
                .ok_or_else(|| ModelError::InvalidConfig(format!("unit {id} has no positive {denominator:?} total")))?;

            let values = covariate_kinds.iter()
                .map(|(name, _)| (name.clone(), covariates.and_then(|c| c.value(name, id))))
                .collect();

            totals.add(response_count, trials);
            records.push(OutcomeRecord { unit: id.clone(), row, response: response_count, trials, covariates: values });
        }

        let mut full = Totals::default();
        for unit in results.iter() {
            full.add(unit.votes(response), unit.trials(denominator).unwrap_or(0.0).max(0.0));
        }

        info!(
            modeled = totals.units,
            full = full.units,
            modeled_ratio = totals.ratio().unwrap_or(f64::NAN),
            full_ratio = full.ratio().unwrap_or(f64::NAN),
            "built outcome table"
        );

        Ok(Self {
            response: response.to_string(),
            denominator,
            covariates: covariate_kinds,
            index: records.iter().enumerate().map(|(i, r)| (r.unit.clone(), i)).collect(),
            records,
            weights: modeled.weights().clone(),
            modeled: totals,
            full,
            exclusions,
        })
    }

    #[inline] pub fn len(&self) -> usize { self.records.len() }

    #[inline] pub fn is_empty(&self) -> bool { self.records.is_empty() }

    #[inline] pub fn response_choice(&self) -> &str { &self.response }

    #[inline] pub fn denominator(&self) -> Denominator { self.denominator }

    /// Records in weight-matrix row order.
    #[inline] pub fn records(&self) -> &[OutcomeRecord] { &self.records }

    pub fn record(&self, id: &UnitId) -> Option<&OutcomeRecord> {
        self.index.get(id).map(|&i| &self.records[i])
    }

    #[inline] pub fn contains(&self, id: &UnitId) -> bool { self.index.contains_key(id) }

    /// Adjacency over the modeled units, keyed by the same identifiers as the records.
    #[inline] pub fn weights(&self) -> &WeightMatrix { &self.weights }

    pub fn covariate_names(&self) -> impl Iterator<Item = &str> {
        self.covariates.iter().map(|(name, _)| name.as_str())
    }

    /// Totals over the modeled units.
    #[inline] pub fn modeled_totals(&self) -> Totals { self.modeled }

    /// Totals over every unit with results, excluded units included.
    #[inline] pub fn full_totals(&self) -> Totals { self.full }

    #[inline] pub fn exclusions(&self) -> &[Exclusion] { &self.exclusions }

    /// Units with a missing value, per covariate. Only covariates with gaps appear.
    pub fn missing_covariates(&self) -> BTreeMap<String, Vec<UnitId>> {
        let mut missing = BTreeMap::<String, Vec<UnitId>>::new();
        for record in &self.records {
            for (name, value) in &record.covariates {
                if value.is_none() {
                    missing.entry(name.clone()).or_default().push(record.unit.clone());
                }
            }
        }
        missing
    }

    pub fn caveats(&self) -> Vec<Caveat> {
        let mut caveats = Vec::new();
        if self.covariates.iter().any(|(_, kind)| *kind == FieldKind::Rate) {
            caveats.push(Caveat::MedianOfEstimates);
        }
        if !self.missing_covariates().is_empty() {
            caveats.push(Caveat::ImputedCovariates);
        }
        if !self.exclusions.is_empty() {
            caveats.push(Caveat::ExcludedUnits);
        }
        caveats
    }

    /// Model input as a table: `unit`, `row`, `response`, `trials`, then one column per covariate.
    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let mut columns = vec![
            Column::new("unit".into(), self.records.iter().map(|r| r.unit.as_str()).collect::<Vec<_>>()),
            Column::new("row".into(), self.records.iter().map(|r| r.row as u32).collect::<Vec<_>>()),
            Column::new("response".into(), self.records.iter().map(|r| r.response).collect::<Vec<_>>()),
            Column::new("trials".into(), self.records.iter().map(|r| r.trials).collect::<Vec<_>>()),
        ];
        for (name, _) in &self.covariates {
            columns.push(Column::new(
                name.as_str().into(),
                self.records.iter().map(|r| r.covariate(name)).collect::<Vec<_>>(),
            ));
        }
        DataFrame::new(columns).context("[outcome] building model input table")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{adjacency::ExclusionReason, io::read_csv_string, testutil::{chain_table, vote_columns}};

    #[test]
    fn records_follow_weight_rows() {
        let table = chain_table();

        assert_eq!(table.len(), 3);
        let b = table.record(&UnitId::new("B")).unwrap();
        assert_eq!(b.row(), 1);
        assert_eq!(b.response(), 20.0);
        assert_eq!(b.trials(), 100.0);
        assert_eq!(table.weights().index_of(b.unit()), Some(b.row()));
    }

    #[test]
    fn modeled_and_full_totals_are_both_kept() {
        let table = chain_table();

        assert_eq!(table.modeled_totals(), Totals { units: 3, response: 35.0, trials: 250.0 });
        assert!((table.modeled_totals().ratio().unwrap() - 0.14).abs() < 1e-12);
        assert_eq!(table.full_totals(), Totals { units: 4, response: 38.0, trials: 290.0 });
        assert_eq!(table.exclusions()[0].reason, ExclusionReason::Isolated);
        assert_eq!(table.caveats(), vec![Caveat::ExcludedUnits]);
    }

    #[test]
    fn unknown_response_choice_is_invalid_config() {
        let results = read_csv_string("precinct,choice,votes,ballots_cast\nA,Yes,1,2\n").unwrap();
        let results = ElectionResults::pivot(&results, &vote_columns(), None).unwrap();
        let modeled = ModeledSet::select(&WeightMatrix::default(), &[]);

        let err = OutcomeTable::build(&results, "Maybe", Denominator::Ballots, &modeled, None, vec![]).unwrap_err();
        assert!(matches!(err.downcast_ref::<ModelError>(), Some(ModelError::InvalidConfig(_))));
    }

    #[test]
    fn model_input_table_has_one_row_per_record() {
        let df = chain_table().to_dataframe().unwrap();

        assert_eq!(df.height(), 3);
        assert_eq!(crate::io::f64_values(&df, "response").unwrap(), vec![Some(10.0), Some(20.0), Some(5.0)]);
    }
}
