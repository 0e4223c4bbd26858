use std::collections::BTreeMap;

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{common::median, unit::{UnitId, UnitLayer}};
use super::Crosswalk;

/// How a measurement combines across fine units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// Weighted sum (population, households).
    Count,
    /// Median of the matched units' values (median income, median age).
    Rate,
}

/// A fine-unit attribute to carry up to coarse units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldSpec {
    pub name: String,
    pub kind: FieldKind,
}

impl FieldSpec {
    pub fn count(name: &str) -> Self { Self { name: name.into(), kind: FieldKind::Count } }

    pub fn rate(name: &str) -> Self { Self { name: name.into(), kind: FieldKind::Rate } }
}

/// Aggregated fields per coarse unit, aligned with the coarse layer's identifier order.
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregated {
    ids: Vec<UnitId>,
    fields: BTreeMap<String, (FieldKind, Vec<Option<f64>>)>,
}

impl Aggregated {
    #[inline] pub fn ids(&self) -> &[UnitId] { &self.ids }

    pub fn fields(&self) -> impl Iterator<Item = (&str, FieldKind)> {
        self.fields.iter().map(|(name, (kind, _))| (name.as_str(), *kind))
    }

    pub fn column(&self, field: &str) -> Option<&[Option<f64>]> {
        self.fields.get(field).map(|(_, values)| values.as_slice())
    }

    pub fn value(&self, field: &str, id: &UnitId) -> Option<f64> {
        let row = self.ids.binary_search(id).ok()?;
        self.column(field)?[row]
    }
}

/// Aggregate `fields` of `fine` onto `coarse` through `crosswalk`.
///
/// Counts are share-weighted sums that skip missing values; a coarse unit that received
/// no fine unit, or only missing values, stays missing. Rates are the median over fine
/// units whose primary match is the coarse unit, ignoring missing values.
pub fn aggregate(fine: &UnitLayer, coarse: &UnitLayer, crosswalk: &Crosswalk, fields: &[FieldSpec]) -> Result<Aggregated> {
    let index_of = |id: &UnitId| coarse.index_of(id);

    let mut aggregated = BTreeMap::new();
    for spec in fields {
        let Some(column) = fine.attribute(&spec.name) else {
            bail!("[aggregate] field {:?} is not an attribute of the {} layer", spec.name, fine.kind());
        };

        let values = match spec.kind {
            FieldKind::Count => {
                let mut sums: Vec<Option<f64>> = vec![None; coarse.len()];
                for m in crosswalk.matches() {
                    let Some(value) = fine.index_of(&m.fine).and_then(|i| column[i]) else { continue };
                    for (target, share) in &m.shares {
                        if let Some(j) = index_of(target) {
                            *sums[j].get_or_insert(0.0) += share * value;
                        }
                    }
                }
                sums
            }
            FieldKind::Rate => {
                let mut samples = vec![Vec::new(); coarse.len()];
                for m in crosswalk.matches() {
                    let Some(value) = fine.index_of(&m.fine).and_then(|i| column[i]) else { continue };
                    if let Some(j) = index_of(&m.primary) {
                        samples[j].push(value);
                    }
                }
                samples.iter().map(|values| median(values)).collect()
            }
        };

        let missing = values.iter().filter(|v| v.is_none()).count();
        debug!(field = %spec.name, kind = ?spec.kind, missing, "aggregated field");
        aggregated.insert(spec.name.clone(), (spec.kind, values));
    }

    Ok(Aggregated { ids: coarse.ids().to_vec(), fields: aggregated })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
    use crate::{
        aggregate::CrosswalkMode,
        testutil::{rect, square, square_layer},
        unit::{RawUnit, UnitKind},
    };

    fn precincts() -> UnitLayer {
        // p1 | p2 | p3 along the x axis, each 2 wide.
        square_layer(UnitKind::Precinct, &[("p1", 0.0, 0.0, 2.0), ("p2", 2.0, 0.0, 2.0), ("p3", 4.0, 0.0, 2.0)])
    }

    fn groups() -> Vec<RawUnit> {
        vec![
            RawUnit::new(UnitId::new("g1"), square(0.0, 0.0, 1.0)).with_attribute("pop", 100.0).with_attribute("income", 40.0),
            RawUnit::new(UnitId::new("g2"), square(1.0, 1.0, 1.0)).with_attribute("pop", 50.0).with_attribute("income", 60.0),
            RawUnit::new(UnitId::new("g3"), square(0.0, 1.0, 1.0)).with_attribute("pop", 25.0),
            RawUnit::new(UnitId::new("g4"), square(2.5, 0.5, 1.0)).with_attribute("pop", 0.0).with_attribute("income", 55.0),
        ]
    }

    fn run(units: Vec<RawUnit>, mode: CrosswalkMode) -> Aggregated {
        let fine = UnitLayer::from_units(UnitKind::BlockGroup, units);
        let coarse = precincts();
        let crosswalk = Crosswalk::build(&fine, &coarse, mode);
        aggregate(&fine, &coarse, &crosswalk, &[FieldSpec::count("pop"), FieldSpec::rate("income")]).unwrap()
    }

    #[test]
    fn counts_sum_and_rates_take_the_median() {
        let aggregated = run(groups(), CrosswalkMode::Centroid);

        assert_eq!(aggregated.value("pop", &UnitId::new("p1")), Some(175.0));
        assert_eq!(aggregated.value("income", &UnitId::new("p1")), Some(50.0));
    }

    #[test]
    fn explicit_zero_differs_from_unmatched() {
        let aggregated = run(groups(), CrosswalkMode::Centroid);

        assert_eq!(aggregated.value("pop", &UnitId::new("p2")), Some(0.0));
        assert_eq!(aggregated.value("pop", &UnitId::new("p3")), None);
        assert_eq!(aggregated.value("income", &UnitId::new("p3")), None);
    }

    #[test]
    fn all_missing_values_stay_missing() {
        let units = vec![RawUnit::new(UnitId::new("g"), square(4.0, 0.0, 1.0)).with_attribute("income", 1.0)];
        let fine = UnitLayer::from_units(UnitKind::BlockGroup, units);
        let coarse = precincts();
        let crosswalk = Crosswalk::build(&fine, &coarse, CrosswalkMode::Centroid);
        let mut fine = fine;
        fine.merge_attributes(&polars::df! { "id" => ["g"], "pop" => [None::<f64>] }.unwrap(), "id", &["pop"]).unwrap();

        let aggregated = aggregate(&fine, &coarse, &crosswalk, &[FieldSpec::count("pop")]).unwrap();

        assert_eq!(aggregated.value("pop", &UnitId::new("p3")), None);
    }

    #[test]
    fn counts_are_conserved() {
        for mode in [CrosswalkMode::Centroid, CrosswalkMode::AreaWeighted] {
            let aggregated = run(groups(), mode);
            let total = aggregated.column("pop").unwrap().iter().flatten().sum::<f64>();
            assert!((total - 175.0).abs() < 1e-9, "{mode:?}: {total}");
        }
    }

    #[test]
    fn aggregation_ignores_fine_unit_order() {
        let reference = run(groups(), CrosswalkMode::Centroid);
        let mut rng = StdRng::seed_from_u64(9);
        for _ in 0..10 {
            let mut shuffled = groups();
            shuffled.shuffle(&mut rng);
            assert_eq!(run(shuffled, CrosswalkMode::Centroid), reference);
        }
    }

    #[test]
    fn area_weighting_splits_counts() {
        let units = vec![RawUnit::new(UnitId::new("g"), rect(1.0, 0.0, 3.0, 1.0)).with_attribute("pop", 80.0).with_attribute("income", 10.0)];

        let aggregated = run(units, CrosswalkMode::AreaWeighted);

        assert_eq!(aggregated.value("pop", &UnitId::new("p1")), Some(40.0));
        assert_eq!(aggregated.value("pop", &UnitId::new("p2")), Some(40.0));
        // Equal shares: rates go to the smaller identifier.
        assert_eq!(aggregated.value("income", &UnitId::new("p1")), Some(10.0));
        assert_eq!(aggregated.value("income", &UnitId::new("p2")), None);
    }

    #[test]
    fn unknown_field_is_an_error() {
        let fine = UnitLayer::from_units(UnitKind::BlockGroup, groups());
        let coarse = precincts();
        let crosswalk = Crosswalk::build(&fine, &coarse, CrosswalkMode::Centroid);
        assert!(aggregate(&fine, &coarse, &crosswalk, &[FieldSpec::rate("age")]).is_err());
    }
}
