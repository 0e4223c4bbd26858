use ahash::AHashMap;
use anyhow::{Context, Result, ensure};
use ndarray::Array2;
use polars::{frame::DataFrame, prelude::Column};

use crate::unit::{UnitId, UnitLayer};

/// Symmetric 0/1 rook-contiguity weights in compressed sparse row format, keyed by unit identifier.
#[derive(Debug, Clone, Default)]
pub struct WeightMatrix {
    ids: Vec<UnitId>,
    index: AHashMap<UnitId, usize>,
    offsets: Vec<u32>,
    neighbors: Vec<u32>,
}

impl WeightMatrix {
    /// Construct weights from sorted adjacency lists aligned with ascending `ids`.
    /// Rejects self-loops, unsorted or duplicate neighbors, and asymmetric lists.
    pub fn new(ids: Vec<UnitId>, adjacencies: &[Vec<u32>]) -> Result<Self> {
        ensure!(
            ids.len() == adjacencies.len(),
            "[adjacency::weights] {} identifiers for {} adjacency lists", ids.len(), adjacencies.len()
        );
        ensure!(ids.windows(2).all(|w| w[0] < w[1]), "[adjacency::weights] identifiers must be unique and ascending");

        for (i, list) in adjacencies.iter().enumerate() {
            ensure!(list.windows(2).all(|w| w[0] < w[1]), "[adjacency::weights] neighbors of {} are not sorted", ids[i]);
            for &j in list {
                let j = j as usize;
                ensure!(j < ids.len(), "[adjacency::weights] neighbor index {j} out of range");
                ensure!(j != i, "[adjacency::weights] {} is listed as its own neighbor", ids[i]);
                ensure!(
                    adjacencies[j].binary_search(&(i as u32)).is_ok(),
                    "[adjacency::weights] {} lists {} as a neighbor but not vice versa", ids[i], ids[j]
                );
            }
        }

        Ok(Self::from_sorted(ids, adjacencies))
    }

    fn from_sorted(ids: Vec<UnitId>, adjacencies: &[Vec<u32>]) -> Self {
        Self {
            index: ids.iter().enumerate().map(|(i, id)| (id.clone(), i)).collect(),
            ids,
            offsets: std::iter::once(0u32).chain(
                adjacencies.iter()
                    .map(|v| v.len() as u32)
                    .scan(0u32, |acc, len| { *acc += len; Some(*acc) })
            ).collect(),
            neighbors: adjacencies.iter().flatten().copied().collect(),
        }
    }

    /// Rook-contiguity weights over every unit of `layer`.
    pub fn from_layer(layer: &UnitLayer) -> Result<Self> {
        let adjacencies = layer.geoms().rook_adjacencies()
            .context("[adjacency::weights] computing rook adjacency")?;
        Self::new(layer.ids().to_vec(), &adjacencies)
    }

    #[inline] pub fn len(&self) -> usize { self.ids.len() }

    #[inline] pub fn is_empty(&self) -> bool { self.ids.is_empty() }

    /// Unit identifiers in row order (ascending).
    #[inline] pub fn ids(&self) -> &[UnitId] { &self.ids }

    #[inline] pub fn index_of(&self, id: &UnitId) -> Option<usize> { self.index.get(id).copied() }

    #[inline] pub fn contains(&self, id: &UnitId) -> bool { self.index.contains_key(id) }

    /// Number of unordered neighbor pairs.
    #[inline] pub fn edge_count(&self) -> usize { self.neighbors.len() / 2 }

    #[inline]
    fn range(&self, row: usize) -> std::ops::Range<usize> {
        self.offsets[row] as usize .. self.offsets[row + 1] as usize
    }

    /// Row indices of the neighbors of `row`, ascending.
    #[inline]
    pub fn neighbors(&self, row: usize) -> impl Iterator<Item = usize> + '_ {
        self.range(row).map(move |k| self.neighbors[k] as usize)
    }

    /// Identifiers of the neighbors of `id`, or `None` for an unknown unit.
    pub fn neighbor_ids(&self, id: &UnitId) -> Option<Vec<&UnitId>> {
        self.index_of(id).map(|row| self.neighbors(row).map(|j| &self.ids[j]).collect())
    }

    #[inline] pub fn degree(&self, row: usize) -> usize { self.range(row).len() }

    /// W[a][b]; zero when either unit is unknown.
    pub fn weight(&self, a: &UnitId, b: &UnitId) -> u8 {
        match (self.index_of(a), self.index_of(b)) {
            (Some(i), Some(j)) => self.neighbors[self.range(i)].binary_search(&(j as u32)).is_ok() as u8,
            _ => 0,
        }
    }

    /// Each unordered neighbor pair once, as `(i, j)` with `i < j`.
    pub fn edges(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        (0..self.len()).flat_map(move |i| self.neighbors(i).filter(move |&j| j > i).map(move |j| (i, j)))
    }

    /// Units with an empty neighbor row.
    pub fn isolated(&self) -> Vec<UnitId> {
        (0..self.len())
            .filter(|&i| self.degree(i) == 0)
            .map(|i| self.ids[i].clone())
            .collect()
    }

    pub fn is_symmetric(&self) -> bool {
        (0..self.len()).all(|i| self.neighbors(i).all(|j| {
            self.neighbors[self.range(j)].binary_search(&(i as u32)).is_ok()
        }))
    }

    /// Weights over the units for which `keep` holds; pairs with a dropped unit disappear.
    pub fn restrict(&self, keep: impl Fn(&UnitId) -> bool) -> Self {
        let rows = self.ids.iter().map(|id| keep(id)).collect::<Vec<_>>();
        let mut remap = vec![None; self.len()];
        let mut ids = Vec::new();
        for (i, id) in self.ids.iter().enumerate().filter(|&(i, _)| rows[i]) {
            remap[i] = Some(ids.len() as u32);
            ids.push(id.clone());
        }

        let adjacencies = (0..self.len())
            .filter(|&i| rows[i])
            .map(|i| self.neighbors(i).filter_map(|j| remap[j]).collect::<Vec<_>>())
            .collect::<Vec<_>>();

        Self::from_sorted(ids, &adjacencies)
    }

    /// Dense n × n matrix in row order.
    pub fn to_dense(&self) -> Array2<u8> {
        let mut dense = Array2::zeros((self.len(), self.len()));
        for (i, j) in self.edges() {
            dense[[i, j]] = 1;
            dense[[j, i]] = 1;
        }
        dense
    }

    /// Dense matrix as a table: a `unit` column followed by one 0/1 column per unit.
    pub fn to_dense_frame(&self) -> Result<DataFrame> {
        let dense = self.to_dense();
        let mut columns = Vec::with_capacity(self.len() + 1);
        columns.push(Column::new("unit".into(), self.ids.iter().map(UnitId::as_str).collect::<Vec<_>>()));
        for (j, id) in self.ids.iter().enumerate() {
            columns.push(Column::new(id.as_str().into(), dense.column(j).iter().map(|&w| w as i32).collect::<Vec<_>>()));
        }
        DataFrame::new(columns).context("[adjacency::weights] building dense weight table")
    }

    /// Neighbor list as a table with one `unit,neighbor` row per direction of every pair.
    pub fn to_edge_frame(&self) -> Result<DataFrame> {
        let (units, neighbors): (Vec<_>, Vec<_>) = (0..self.len())
            .flat_map(|i| self.neighbors(i).map(move |j| (i, j)))
            .map(|(i, j)| (self.ids[i].as_str(), self.ids[j].as_str()))
            .unzip();
        DataFrame::new(vec![
            Column::new("unit".into(), units),
            Column::new("neighbor".into(), neighbors),
        ]).context("[adjacency::weights] building neighbor table")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{io, testutil::square_layer, unit::UnitKind};

    fn ids(names: &[&str]) -> Vec<UnitId> {
        names.iter().map(|&n| UnitId::new(n)).collect()
    }

    /// A - B - C in a row, D detached.
    fn row_with_island() -> WeightMatrix {
        let layer = square_layer(UnitKind::Precinct, &[
            ("A", 0.0, 0.0, 1.0), ("B", 1.0, 0.0, 1.0), ("C", 2.0, 0.0, 1.0), ("D", 10.0, 10.0, 1.0),
        ]);
        WeightMatrix::from_layer(&layer).unwrap()
    }

    #[test]
    fn csr_layout_follows_adjacency_lists() {
        let weights = row_with_island();

        assert_eq!(weights.offsets, vec![0, 1, 3, 4, 4]);
        assert_eq!(weights.neighbors, vec![1, 0, 2, 1]);
        assert_eq!(weights.edge_count(), 2);
        assert_eq!(weights.edges().collect::<Vec<_>>(), vec![(0, 1), (1, 2)]);
    }

    #[test]
    fn weights_are_symmetric_with_zero_diagonal() {
        let weights = row_with_island();
        let dense = weights.to_dense();

        assert!(weights.is_symmetric());
        assert_eq!(dense, dense.t());
        assert!((0..weights.len()).all(|i| dense[[i, i]] == 0));
        assert_eq!(weights.weight(&UnitId::new("A"), &UnitId::new("B")), 1);
        assert_eq!(weights.weight(&UnitId::new("A"), &UnitId::new("C")), 0);
        assert_eq!(weights.weight(&UnitId::new("A"), &UnitId::new("Z")), 0);
    }

    #[test]
    fn isolated_units_are_flagged() {
        assert_eq!(row_with_island().isolated(), ids(&["D"]));
    }

    #[test]
    fn restriction_drops_pairs_with_removed_units() {
        let restricted = row_with_island().restrict(|id| id.as_str() != "B");

        assert_eq!(restricted.ids(), ids(&["A", "C", "D"]).as_slice());
        assert_eq!(restricted.edge_count(), 0);
        assert_eq!(restricted.isolated(), ids(&["A", "C", "D"]));
    }

    #[test]
    fn asymmetric_lists_are_rejected() {
        assert!(WeightMatrix::new(ids(&["a", "b"]), &[vec![1], vec![]]).is_err());
        assert!(WeightMatrix::new(ids(&["a", "b"]), &[vec![0], vec![]]).is_err());
        assert!(WeightMatrix::new(ids(&["b", "a"]), &[vec![1], vec![0]]).is_err());
        assert!(WeightMatrix::new(ids(&["a", "b"]), &[vec![1], vec![0]]).is_ok());
    }

    #[test]
    fn tables_are_keyed_by_identifier() {
        let weights = row_with_island();

        let dense = weights.to_dense_frame().unwrap();
        assert_eq!(dense.width(), 5);
        assert_eq!(io::f64_values(&dense, "B").unwrap(), vec![Some(1.0), Some(0.0), Some(1.0), Some(0.0)]);

        let edges = weights.to_edge_frame().unwrap();
        assert_eq!(edges.height(), 4);
        assert_eq!(io::str_values(&edges, "neighbor").unwrap()[0].as_deref(), Some("B"));
    }
}
