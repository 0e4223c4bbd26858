use std::collections::BTreeMap;

use ahash::AHashMap;
use anyhow::{Context, Result, ensure};
use geo::{BoundingRect, MultiPolygon, Point, Polygon};
use polars::frame::DataFrame;
use serde::Serialize;
use tracing::{debug, warn};

use crate::{geom::Geometries, io};
use super::{UnitId, UnitKind};

/// A unit as read from a geometry source, before identifiers are deduplicated.
#[derive(Debug, Clone)]
pub(crate) struct RawUnit {
    pub id: UnitId,
    pub shape: MultiPolygon<f64>,
    pub attributes: BTreeMap<String, f64>,
}

impl RawUnit {
    pub(crate) fn new(id: UnitId, shape: MultiPolygon<f64>) -> Self {
        Self { id, shape, attributes: BTreeMap::new() }
    }

    pub(crate) fn with_attribute(mut self, name: &str, value: f64) -> Self {
        self.attributes.insert(name.to_string(), value);
        self
    }
}

/// Outcome of joining a table onto a layer by identifier.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AttributeJoin {
    pub matched: usize,
    pub missing_in_table: Vec<UnitId>, // units in the layer without a table row
    pub missing_in_layer: Vec<UnitId>, // table rows without a unit in the layer
}

/// A set of areal units stored in ascending identifier order, with geometry and numeric attributes.
#[derive(Debug, Clone)]
pub struct UnitLayer {
    kind: UnitKind,
    ids: Vec<UnitId>,
    index: AHashMap<UnitId, usize>,
    geoms: Geometries,
    attributes: BTreeMap<String, Vec<Option<f64>>>,
}

impl UnitLayer {
    /// Build a layer from raw units. Repeated identifiers are merged into one
    /// MultiPolygon and their attributes are summed in ascending value order
    /// (split precinct rows carry partial counts).
    pub(crate) fn from_units(kind: UnitKind, units: Vec<RawUnit>) -> Self {
        let mut merged: BTreeMap<UnitId, (Vec<Polygon<f64>>, BTreeMap<String, Vec<f64>>, usize)> = BTreeMap::new();
        for unit in units {
            let entry = merged.entry(unit.id).or_default();
            entry.0.extend(unit.shape.0);
            for (name, value) in unit.attributes {
                entry.1.entry(name).or_default().push(value);
            }
            entry.2 += 1;
        }

        let names = merged.values()
            .flat_map(|(_, attributes, _)| attributes.keys().cloned())
            .collect::<std::collections::BTreeSet<_>>();

        let mut ids = Vec::with_capacity(merged.len());
        let mut shapes = Vec::with_capacity(merged.len());
        let mut attributes = names.iter()
            .map(|name| (name.clone(), Vec::with_capacity(merged.len())))
            .collect::<BTreeMap<_, _>>();

        for (id, (mut parts, mut values, count)) in merged {
            if count > 1 {
                debug!(kind = %kind, unit = %id, parts = count, "merged repeated unit identifier");
            }
            // Part order must not depend on input row order.
            parts.sort_by(|a, b| {
                let (a, b) = (a.bounding_rect(), b.bounding_rect());
                let key = |r: Option<geo::Rect<f64>>| r.map(|r| (r.min().x, r.min().y, r.max().x, r.max().y));
                match (key(a), key(b)) {
                    (Some(a), Some(b)) => a.0.total_cmp(&b.0)
                        .then(a.1.total_cmp(&b.1))
                        .then(a.2.total_cmp(&b.2))
                        .then(a.3.total_cmp(&b.3)),
                    (a, b) => a.is_some().cmp(&b.is_some()),
                }
            });
            for (name, column) in attributes.iter_mut() {
                column.push(values.get_mut(name).map(|parts| {
                    parts.sort_by(f64::total_cmp);
                    parts.iter().sum::<f64>()
                }));
            }
            shapes.push(MultiPolygon(parts));
            ids.push(id);
        }

        Self {
            kind,
            index: ids.iter().enumerate().map(|(i, id)| (id.clone(), i)).collect(),
            ids,
            geoms: Geometries::new(shapes),
            attributes,
        }
    }

    #[inline] pub fn kind(&self) -> UnitKind { self.kind }

    #[inline] pub fn len(&self) -> usize { self.ids.len() }

    #[inline] pub fn is_empty(&self) -> bool { self.ids.is_empty() }

    /// Unit identifiers in ascending order; positions match geometry and attribute rows.
    #[inline] pub fn ids(&self) -> &[UnitId] { &self.ids }

    #[inline] pub fn index_of(&self, id: &UnitId) -> Option<usize> { self.index.get(id).copied() }

    #[inline] pub fn contains(&self, id: &UnitId) -> bool { self.index.contains_key(id) }

    #[inline] pub(crate) fn geoms(&self) -> &Geometries { &self.geoms }

    pub fn geometry(&self, id: &UnitId) -> Option<&MultiPolygon<f64>> {
        self.index_of(id).map(|i| &self.geoms.shapes()[i])
    }

    pub fn centroid(&self, id: &UnitId) -> Option<Point<f64>> {
        self.index_of(id).and_then(|i| self.geoms.centroid(i))
    }

    pub fn attribute_names(&self) -> impl Iterator<Item = &str> {
        self.attributes.keys().map(String::as_str)
    }

    /// Attribute column aligned with `ids()`.
    pub fn attribute(&self, name: &str) -> Option<&[Option<f64>]> {
        self.attributes.get(name).map(Vec::as_slice)
    }

    pub fn value(&self, name: &str, id: &UnitId) -> Option<f64> {
        self.attribute(name)?.get(self.index_of(id)?).copied().flatten()
    }

    /// Join numeric `fields` of `table` onto the layer by `id_column`, replacing attributes of the same name.
    /// Units without a table row get missing values; both sides of the miss are reported.
    pub fn merge_attributes(&mut self, table: &DataFrame, id_column: &str, fields: &[&str]) -> Result<AttributeJoin> {
        let table_ids = io::str_values(table, id_column)
            .with_context(|| format!("[unit::layer] reading id column {id_column:?}"))?;

        let mut rows = AHashMap::with_capacity(table_ids.len());
        let mut missing_in_layer = Vec::new();
        for (row, id) in table_ids.into_iter().enumerate() {
            let Some(id) = id.map(UnitId::from) else { continue };
            ensure!(!rows.contains_key(&id), "[unit::layer] duplicate identifier {id} in column {id_column:?}");
            if !self.contains(&id) {
                missing_in_layer.push(id.clone());
            }
            rows.insert(id, row);
        }
        missing_in_layer.sort();

        for &field in fields {
            let values = io::f64_values(table, field)
                .with_context(|| format!("[unit::layer] reading field {field:?}"))?;
            let column = self.ids.iter()
                .map(|id| rows.get(id).and_then(|&row| values[row]))
                .collect();
            self.attributes.insert(field.to_string(), column);
        }

        let missing_in_table = self.ids.iter()
            .filter(|id| !rows.contains_key(*id))
            .cloned()
            .collect::<Vec<_>>();

        let join = AttributeJoin {
            matched: self.len() - missing_in_table.len(),
            missing_in_table,
            missing_in_layer,
        };

        if !join.missing_in_table.is_empty() || !join.missing_in_layer.is_empty() {
            warn!(
                kind = %self.kind,
                matched = join.matched,
                missing_in_table = join.missing_in_table.len(),
                missing_in_layer = join.missing_in_layer.len(),
                "attribute join dropped units"
            );
        }

        Ok(join)
    }
}
