use std::collections::BTreeMap;

use serde::Serialize;

use crate::{
    adjacency::{Exclusion, ExclusionReason},
    aggregate::CrosswalkReport,
    loader::LoadReport,
    outcome::Totals,
    summary::CaveatNote,
    unit::{AttributeJoin, UnitId},
};

/// Everything `prepare` decided, in one document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub results: LoadReport,
    pub precincts: usize,
    pub adjacency_edges: usize,
    pub isolated_precincts: Vec<UnitId>, // no rook neighbor in the full precinct layer
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_groups: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub census_join: Option<AttributeJoin>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crosswalk: Option<CrosswalkReport>,
    pub modeled_units: usize,
    pub exclusions: Vec<Exclusion>,
    pub modeled: Totals,
    pub full: Totals,
    pub missing_covariates: BTreeMap<String, Vec<UnitId>>,
    pub caveats: Vec<CaveatNote>,
}

impl RunReport {
    /// Excluded units per reason.
    pub fn excluded(&self, reason: ExclusionReason) -> usize {
        self.exclusions.iter().filter(|e| e.reason == reason).count()
    }
}

/// One exclusion per dropped unit, grouped by reason.
pub(crate) fn collect_exclusions(load: &LoadReport, isolated: &[Exclusion]) -> Vec<Exclusion> {
    fn tagged(ids: &[UnitId], reason: ExclusionReason) -> impl Iterator<Item = Exclusion> + '_ {
        ids.iter().map(move |unit| Exclusion { unit: unit.clone(), reason })
    }

    tagged(&load.missing_geometry, ExclusionReason::MissingGeometry)
        .chain(tagged(&load.missing_results, ExclusionReason::MissingResults))
        .chain(tagged(&load.non_positive_total, ExclusionReason::NonPositiveTotal))
        .chain(isolated.iter().cloned())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_dropped_unit_has_one_reason() {
        let load = LoadReport {
            missing_geometry: vec![UnitId::new("X")],
            missing_results: vec![UnitId::new("Y")],
            non_positive_total: vec![UnitId::new("Z")],
            ..Default::default()
        };
        let isolated = [Exclusion { unit: UnitId::new("D"), reason: ExclusionReason::Isolated }];

        let exclusions = collect_exclusions(&load, &isolated);

        let reasons = exclusions.iter().map(|e| (e.unit.as_str(), e.reason)).collect::<Vec<_>>();
        assert_eq!(reasons, vec![
            ("X", ExclusionReason::MissingGeometry),
            ("Y", ExclusionReason::MissingResults),
            ("Z", ExclusionReason::NonPositiveTotal),
            ("D", ExclusionReason::Isolated),
        ]);
    }
}
