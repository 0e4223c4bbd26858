use std::fmt;

use ahash::AHashSet;
use serde::Serialize;
use tracing::{debug, warn};

use crate::unit::UnitId;
use super::WeightMatrix;

/// Why a unit is not part of the modeled set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExclusionReason {
    MissingGeometry,
    MissingResults,
    NonPositiveTotal,
    Isolated,
}

impl ExclusionReason {
    pub fn to_str(&self) -> &'static str {
        match self {
            ExclusionReason::MissingGeometry => "missing_geometry",
            ExclusionReason::MissingResults => "missing_results",
            ExclusionReason::NonPositiveTotal => "non_positive_total",
            ExclusionReason::Isolated => "isolated",
        }
    }
}

impl fmt::Display for ExclusionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Exclusion {
    pub unit: UnitId,
    pub reason: ExclusionReason,
}

/// Units entering the regression, with weights restricted to them.
/// Every unit in the set has at least one neighbor inside the set.
#[derive(Debug, Clone)]
pub struct ModeledSet {
    weights: WeightMatrix,
    isolated: Vec<Exclusion>,
}

impl ModeledSet {
    /// Restrict `weights` to `eligible` units, then drop units left without neighbors,
    /// repeating until every remaining row is non-empty. Unknown identifiers are ignored.
    pub fn select(weights: &WeightMatrix, eligible: &[UnitId]) -> Self {
        let mut keep = eligible.iter()
            .filter(|id| weights.contains(id))
            .cloned()
            .collect::<AHashSet<_>>();

        let mut isolated = Vec::new();
        let mut rounds = 0;
        loop {
            let current = weights.restrict(|id| keep.contains(id));
            let newly = current.isolated();
            if newly.is_empty() {
                if !isolated.is_empty() {
                    warn!(count = isolated.len(), rounds, modeled = current.len(), "excluded isolated units");
                }
                isolated.sort_by(|a: &Exclusion, b| a.unit.cmp(&b.unit));
                return Self { weights: current, isolated };
            }

            rounds += 1;
            for unit in newly {
                debug!(unit = %unit, round = rounds, "unit has no neighbors in the modeled set");
                keep.remove(&unit);
                isolated.push(Exclusion { unit, reason: ExclusionReason::Isolated });
            }
        }
    }

    /// Weights over the modeled units; row order is ascending identifier.
    #[inline] pub fn weights(&self) -> &WeightMatrix { &self.weights }

    #[inline] pub fn ids(&self) -> &[UnitId] { self.weights.ids() }

    #[inline] pub fn len(&self) -> usize { self.weights.len() }

    #[inline] pub fn is_empty(&self) -> bool { self.weights.is_empty() }

    #[inline] pub fn contains(&self, id: &UnitId) -> bool { self.weights.contains(id) }

    /// Units removed because they had no neighbor, in identifier order.
    #[inline] pub fn isolated(&self) -> &[Exclusion] { &self.isolated }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{testutil::square_layer, unit::UnitKind};

    fn ids(names: &[&str]) -> Vec<UnitId> {
        names.iter().map(|&n| UnitId::new(n)).collect()
    }

    fn weights(units: &[(&str, f64, f64, f64)]) -> WeightMatrix {
        WeightMatrix::from_layer(&square_layer(UnitKind::Precinct, units)).unwrap()
    }

    #[test]
    fn one_isolated_unit_shrinks_the_set_by_one() {
        let weights = weights(&[
            ("A", 0.0, 0.0, 1.0), ("B", 1.0, 0.0, 1.0), ("C", 2.0, 0.0, 1.0), ("D", 10.0, 0.0, 1.0),
        ]);
        assert_eq!(weights.isolated(), ids(&["D"]));

        let modeled = ModeledSet::select(&weights, weights.ids());

        assert_eq!(modeled.len(), weights.len() - 1);
        assert_eq!(modeled.isolated(), &[Exclusion { unit: UnitId::new("D"), reason: ExclusionReason::Isolated }]);
    }

    #[test]
    fn ineligible_neighbor_isolates_unit() {
        // A - B - C with B ineligible leaves A and C without neighbors.
        let weights = weights(&[("A", 0.0, 0.0, 1.0), ("B", 1.0, 0.0, 1.0), ("C", 2.0, 0.0, 1.0), ("E", 0.0, 1.0, 1.0)]);

        let modeled = ModeledSet::select(&weights, &ids(&["A", "C", "E"]));

        assert_eq!(modeled.ids(), ids(&["A", "E"]).as_slice());
        assert_eq!(modeled.isolated().iter().map(|e| e.unit.as_str()).collect::<Vec<_>>(), vec!["C"]);
    }

    #[test]
    fn every_modeled_row_is_non_empty() {
        // Pairs A-B and C-D; only A, C and D are eligible, so A is dropped.
        let weights = weights(&[("A", 0.0, 0.0, 1.0), ("B", 1.0, 0.0, 1.0), ("C", 5.0, 0.0, 1.0), ("D", 6.0, 0.0, 1.0)]);

        let modeled = ModeledSet::select(&weights, &ids(&["A", "C", "D", "Z"]));

        assert_eq!(modeled.ids(), ids(&["C", "D"]).as_slice());
        assert!((0..modeled.len()).all(|i| modeled.weights().degree(i) > 0));
    }
}
