//! ESRI Shapefile reading for areal units.

use std::path::Path;

use anyhow::{Context, Result, bail};
use shapefile::{self as shp, dbase::{FieldValue, Record}, Shape};

use crate::unit::{RawUnit, UnitId};

/// Reads all polygon shapes + attribute records from a `.shp` file,
/// taking each unit's identifier from the dBase field `id_field`.
pub(crate) fn read_shapefile_units(path: &Path, id_field: &str) -> Result<Vec<RawUnit>> {
    let mut reader = shp::Reader::from_path(path)
        .with_context(|| format!("[io::shp] Failed to open shapefile: {}", path.display()))?;

    let mut units = Vec::new();
    for (i, result) in reader.iter_shapes_and_records().enumerate() {
        let (shape, record) = result
            .with_context(|| format!("[io::shp] Error reading shape+record {i} in {}", path.display()))?;

        let Some(id) = record_id(&record, id_field) else {
            bail!("[io::shp] record {i} has no {id_field:?} field in {}", path.display());
        };

        let polygon = match shape {
            Shape::Polygon(polygon) => polygon,
            Shape::PolygonM(polygon) => flatten_rings(polygon.rings(), |p| (p.x, p.y)),
            Shape::PolygonZ(polygon) => flatten_rings(polygon.rings(), |p| (p.x, p.y)),
            other => bail!("[io::shp] record {i} ({id}): unsupported shape type {:?}", other.shapetype()),
        };

        let mut unit = RawUnit::new(id, shp_to_geo(&polygon));
        for (name, value) in record.into_iter().filter(|(name, _)| name != id_field) {
            if let Some(number) = numeric_value(&value) {
                unit = unit.with_attribute(&name, number);
            }
        }
        units.push(unit);
    }

    Ok(units)
}

/// Get an identifier from a character or numeric field.
fn record_id(record: &Record, field: &str) -> Option<UnitId> {
    match record.get(field)? {
        FieldValue::Character(Some(s)) => Some(UnitId::new(s)),
        FieldValue::Numeric(Some(n)) => Some(UnitId::new(&format!("{n}"))),
        FieldValue::Integer(n) => Some(UnitId::new(&n.to_string())),
        _ => None,
    }
}

fn numeric_value(value: &FieldValue) -> Option<f64> {
    match value {
        FieldValue::Numeric(n) => *n,
        FieldValue::Float(n) => n.map(f64::from),
        FieldValue::Double(n) => Some(*n),
        FieldValue::Integer(n) => Some(f64::from(*n)),
        _ => None,
    }
}

/// Drop M/Z measures, keeping ring structure.
fn flatten_rings<P>(rings: &[shp::PolygonRing<P>], xy: impl Fn(&P) -> (f64, f64)) -> shp::Polygon {
    let points = |pts: &[P]| pts.iter().map(|p| { let (x, y) = xy(p); shp::Point { x, y } }).collect::<Vec<_>>();
    shp::Polygon::with_rings(rings.iter()
        .map(|ring| match ring {
            shp::PolygonRing::Outer(pts) => shp::PolygonRing::Outer(points(pts.as_slice())),
            shp::PolygonRing::Inner(pts) => shp::PolygonRing::Inner(points(pts.as_slice())),
        })
        .collect())
}

/// Convert shapefile::Polygon to geo::MultiPolygon<f64>
pub(crate) fn shp_to_geo(p: &shp::Polygon) -> geo::MultiPolygon<f64> {
    let mut polys: Vec<geo::Polygon<f64>> = Vec::new();
    let mut current_exterior: Option<geo::LineString<f64>> = None;
    let mut current_holes: Vec<geo::LineString<f64>> = Vec::new();

    // Shapefile stores each outer ring followed by its holes.
    for ring in p.rings() {
        let mut coords = ring.points().iter()
            .map(|pt| geo::Coord { x: pt.x, y: pt.y })
            .collect::<Vec<_>>();
        if !coords.is_empty() && coords[0] != coords[coords.len() - 1] {
            coords.push(coords[0]);
        }
        let ls = geo::LineString(coords);

        match ring {
            shp::PolygonRing::Outer(_) => {
                if let Some(ext) = current_exterior.replace(ls) {
                    polys.push(geo::Polygon::new(ext, std::mem::take(&mut current_holes)));
                }
            }
            shp::PolygonRing::Inner(_) => current_holes.push(ls),
        }
    }
    if let Some(ext) = current_exterior {
        polys.push(geo::Polygon::new(ext, current_holes));
    }

    geo::MultiPolygon(polys)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pt(x: f64, y: f64) -> shp::Point { shp::Point { x, y } }

    #[test]
    fn rings_group_into_polygons_with_holes() {
        let polygon = shp::Polygon::with_rings(vec![
            shp::PolygonRing::Outer(vec![pt(0.0, 0.0), pt(0.0, 4.0), pt(4.0, 4.0), pt(4.0, 0.0), pt(0.0, 0.0)]),
            shp::PolygonRing::Inner(vec![pt(1.0, 1.0), pt(2.0, 1.0), pt(2.0, 2.0), pt(1.0, 2.0), pt(1.0, 1.0)]),
            shp::PolygonRing::Outer(vec![pt(10.0, 0.0), pt(10.0, 1.0), pt(11.0, 1.0), pt(11.0, 0.0), pt(10.0, 0.0)]),
        ]);

        let mp = shp_to_geo(&polygon);

        assert_eq!(mp.0.len(), 2);
        assert_eq!(mp.0[0].interiors().len(), 1);
        assert!(mp.0[1].interiors().is_empty());
    }
}
