//! GeoJSON reading for areal units.

use std::{fs, path::Path};

use anyhow::{Context, Result, anyhow, bail};
use geo::{Coord, LineString, MultiPolygon, Polygon};
use serde_json::Value;

use crate::unit::{RawUnit, UnitId};

/// Read Polygon/MultiPolygon features from a GeoJSON file at `path`,
/// taking each unit's identifier from the `id_field` property.
pub(crate) fn read_geojson_units(path: &Path, id_field: &str) -> Result<Vec<RawUnit>> {
    let bytes = fs::read(path)
        .with_context(|| format!("[io::geojson] Failed to read {}", path.display()))?;
    read_geojson_units_bytes(&bytes, id_field)
        .with_context(|| format!("[io::geojson] Failed to parse {}", path.display()))
}

/// Read Polygon/MultiPolygon features from GeoJSON bytes.
/// Numeric properties other than the identifier become unit attributes.
pub(crate) fn read_geojson_units_bytes(bytes: &[u8], id_field: &str) -> Result<Vec<RawUnit>> {
    let value: Value = serde_json::from_slice(bytes).context("Failed to parse GeoJSON bytes")?;
    let features = value["features"].as_array()
        .ok_or_else(|| anyhow!("expected a FeatureCollection with a features array"))?;

    let mut units = Vec::with_capacity(features.len());
    for (i, feature) in features.iter().enumerate() {
        let properties = feature["properties"].as_object()
            .ok_or_else(|| anyhow!("feature {i} has no properties"))?;

        let id = match properties.get(id_field) {
            Some(Value::String(s)) => UnitId::new(s),
            Some(Value::Number(n)) => UnitId::new(&n.to_string()),
            _ => bail!("feature {i} has no {id_field:?} property"),
        };

        let shape = match feature["geometry"]["type"].as_str() {
            Some("Polygon") => MultiPolygon(vec![parse_polygon_coords(&feature["geometry"]["coordinates"])?]),
            Some("MultiPolygon") => feature["geometry"]["coordinates"].as_array()
                .ok_or_else(|| anyhow!("feature {i}: MultiPolygon coordinates must be an array"))?
                .iter()
                .map(parse_polygon_coords)
                .collect::<Result<Vec<_>>>()
                .map(MultiPolygon)?,
            other => bail!("feature {i} ({id}): unsupported geometry type {other:?}"),
        };

        let mut unit = RawUnit::new(id, shape);
        for (name, value) in properties.iter().filter(|(name, _)| name.as_str() != id_field) {
            if let Some(number) = value.as_f64() {
                unit = unit.with_attribute(name, number);
            }
        }
        units.push(unit);
    }

    Ok(units)
}

/// Parse GeoJSON Polygon coordinates: `[exterior, hole, hole, ...]`.
fn parse_polygon_coords(coords: &Value) -> Result<Polygon<f64>> {
    let rings = coords.as_array()
        .ok_or_else(|| anyhow!("Invalid Polygon: coordinates must be an array of rings"))?;
    let (exterior, interiors) = rings.split_first()
        .ok_or_else(|| anyhow!("Invalid Polygon: missing exterior ring"))?;

    Ok(Polygon::new(
        parse_ring_coords(exterior)?,
        interiors.iter().map(parse_ring_coords).collect::<Result<Vec<_>>>()?,
    ))
}

/// Parse a ring: `[[x, y], [x, y], ...]`, closing it if needed.
fn parse_ring_coords(coords: &Value) -> Result<LineString<f64>> {
    let mut points = coords.as_array()
        .ok_or_else(|| anyhow!("Invalid ring: must be an array of positions"))?
        .iter()
        .map(|position| {
            let x = position[0].as_f64().ok_or_else(|| anyhow!("Invalid coordinate: x must be a number"))?;
            let y = position[1].as_f64().ok_or_else(|| anyhow!("Invalid coordinate: y must be a number"))?;
            Ok(Coord { x, y })
        })
        .collect::<Result<Vec<_>>>()?;

    if !points.is_empty() && points[0] != points[points.len() - 1] {
        points.push(points[0]);
    }

    Ok(LineString(points))
}
