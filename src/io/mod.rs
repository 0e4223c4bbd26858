//! Format-specific reading and writing operations.
//!
//! - `csv` - CSV tables (results, census estimates, model input, draws)
//! - `columns` - typed column access on DataFrames
//! - `geojson` - GeoJSON unit geometry
//! - `shp` - Shapefile unit geometry
//! - `draws` - posterior draws written by an external sampler
//! - `json` - JSON documents

mod columns;
mod csv;
mod draws;
mod geojson;
mod json;
mod shp;

use std::path::Path;

use anyhow::{Result, bail};

pub(crate) use columns::*;
pub(crate) use csv::*;
pub(crate) use draws::*;
pub(crate) use geojson::*;
pub(crate) use json::*;
pub(crate) use shp::*;

use crate::unit::RawUnit;

/// Read unit geometry from a GeoJSON or Shapefile source, chosen by file extension.
pub(crate) fn read_units(path: &Path, id_field: &str) -> Result<Vec<RawUnit>> {
    match path.extension().and_then(|ext| ext.to_str()).map(str::to_ascii_lowercase).as_deref() {
        Some("geojson" | "json") => read_geojson_units(path, id_field),
        Some("shp") => read_shapefile_units(path, id_field),
        _ => bail!("[io] unsupported geometry format: {}", path.display()),
    }
}
