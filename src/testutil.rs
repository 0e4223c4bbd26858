//! Fixtures shared by unit tests.

use geo::{coord, MultiPolygon, Rect};

use crate::{
    adjacency::{ModeledSet, WeightMatrix},
    aggregate::{Aggregated, Crosswalk, CrosswalkMode, FieldSpec, aggregate},
    io::read_csv_string,
    loader::{Denominator, ElectionResults, ResultsColumns},
    outcome::OutcomeTable,
    unit::{RawUnit, UnitId, UnitLayer, UnitKind},
};

/// Axis-aligned rectangle as a one-part MultiPolygon.
pub(crate) fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> MultiPolygon<f64> {
    MultiPolygon(vec![Rect::new(coord! { x: x0, y: y0 }, coord! { x: x1, y: y1 }).to_polygon()])
}

/// Axis-aligned square as a one-part MultiPolygon.
pub(crate) fn square(x: f64, y: f64, size: f64) -> MultiPolygon<f64> {
    rect(x, y, x + size, y + size)
}

/// A layer of named squares without attributes.
pub(crate) fn square_layer(kind: UnitKind, units: &[(&str, f64, f64, f64)]) -> UnitLayer {
    UnitLayer::from_units(kind, units.iter()
        .map(|&(id, x, y, size)| RawUnit::new(UnitId::new(id), square(x, y, size)))
        .collect())
}

/// A - B - C in a row with responses [10, 20, 5] out of [100, 100, 50] ballots,
/// plus an island D (3 of 40) that is excluded.
pub(crate) fn chain_table() -> OutcomeTable {
    chain_table_with(|_| None)
}

/// `chain_table` with a median `income` covariate from block groups inside A (40) and C (60).
/// B receives no block group, so its income is missing.
pub(crate) fn income_table() -> OutcomeTable {
    chain_table_with(|precincts| {
        let groups = UnitLayer::from_units(UnitKind::BlockGroup, vec![
            RawUnit::new(UnitId::new("g1"), square(0.25, 0.25, 0.5)).with_attribute("income", 40.0),
            RawUnit::new(UnitId::new("g3"), square(2.25, 0.25, 0.5)).with_attribute("income", 60.0),
        ]);
        let crosswalk = Crosswalk::build(&groups, precincts, CrosswalkMode::Centroid);
        Some(aggregate(&groups, precincts, &crosswalk, &[FieldSpec::rate("income")]).unwrap())
    })
}

fn chain_table_with(covariates: impl FnOnce(&UnitLayer) -> Option<Aggregated>) -> OutcomeTable {
    let results = read_csv_string("\
precinct,choice,votes,ballots_cast
A,Yes,10,100
A,No,90,100
B,Yes,20,100
B,No,80,100
C,Yes,5,50
C,No,45,50
D,Yes,3,40
D,No,37,40
").unwrap();
    let results = ElectionResults::pivot(&results, &vote_columns(), None).unwrap();

    let layer = square_layer(UnitKind::Precinct, &[
        ("A", 0.0, 0.0, 1.0), ("B", 1.0, 0.0, 1.0), ("C", 2.0, 0.0, 1.0), ("D", 9.0, 9.0, 1.0),
    ]);
    let weights = WeightMatrix::from_layer(&layer).unwrap();
    let modeled = ModeledSet::select(&weights, weights.ids());
    let exclusions = modeled.isolated().to_vec();
    let covariates = covariates(&layer);

    OutcomeTable::build(&results, "Yes", Denominator::Ballots, &modeled, covariates.as_ref(), exclusions).unwrap()
}

/// Results columns for tables with a single `votes` column and no registration counts.
pub(crate) fn vote_columns() -> ResultsColumns {
    ResultsColumns { votes: Some("votes".into()), mail: None, in_person: None, registered: None, ..Default::default() }
}
