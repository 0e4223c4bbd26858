use geo::{BoundingRect, Centroid, MultiPolygon, Point};
use rstar::{primitives::{GeomWithData, Rectangle}, RTree, AABB};

/// R-tree entry: a bounding rectangle tagged with the index of its MultiPolygon.
type IndexedRect = GeomWithData<Rectangle<[f64; 2]>, usize>;

/// R-tree entry: a centroid tagged with the index of its MultiPolygon.
type IndexedPoint = GeomWithData<[f64; 2], usize>;

/// Geometries represents an indexed collection of MultiPolygons with spatial lookups.
#[derive(Debug, Clone)]
pub(crate) struct Geometries {
    shapes: Vec<MultiPolygon<f64>>,
    centroids: Vec<Option<Point<f64>>>,
    rtree: RTree<IndexedRect>,
    centroid_tree: RTree<IndexedPoint>,
}

impl Default for Geometries {
    fn default() -> Self { Self::new(Vec::new()) }
}

impl Geometries {
    /// Construct a Geometries object from a vector of MultiPolygons.
    /// Empty shapes are kept (so indices line up) but are never returned by spatial queries.
    pub(crate) fn new(shapes: Vec<MultiPolygon<f64>>) -> Self {
        let centroids = shapes.iter()
            .map(|shape| shape.centroid())
            .collect::<Vec<_>>();

        Self {
            rtree: RTree::bulk_load(
                shapes.iter().enumerate()
                    .filter_map(|(i, shape)| shape.bounding_rect()
                        .map(|rect| GeomWithData::new(Rectangle::from_corners(rect.min().into(), rect.max().into()), i)))
                    .collect()
            ),
            centroid_tree: RTree::bulk_load(
                centroids.iter().enumerate()
                    .filter_map(|(i, point)| point.map(|p| GeomWithData::new([p.x(), p.y()], i)))
                    .collect()
            ),
            centroids,
            shapes,
        }
    }

    /// Get the number of MultiPolygons.
    #[inline] pub(crate) fn len(&self) -> usize { self.shapes.len() }

    /// Get a reference to the list of MultiPolygons.
    #[inline] pub(crate) fn shapes(&self) -> &[MultiPolygon<f64>] { &self.shapes }

    /// Get the centroid of a MultiPolygon, `None` for empty shapes.
    #[inline] pub(crate) fn centroid(&self, idx: usize) -> Option<Point<f64>> { self.centroids[idx] }

    /// Query the R-tree for shape indices whose bounding boxes intersect the given envelope.
    #[inline]
    pub(crate) fn query(&self, envelope: &AABB<[f64; 2]>) -> impl Iterator<Item = usize> {
        self.rtree.locate_in_envelope_intersecting(envelope).map(|entry| entry.data)
    }

    /// Squared distance from `pt` to the centroid of shape `idx` (infinite for empty shapes).
    pub(crate) fn centroid_distance_2(&self, idx: usize, pt: Point<f64>) -> f64 {
        self.centroids[idx]
            .map(|c| (c.x() - pt.x()).powi(2) + (c.y() - pt.y()).powi(2))
            .unwrap_or(f64::INFINITY)
    }

    /// Index of the shape whose centroid is nearest to `pt`, ties broken by smallest index.
    pub(crate) fn nearest_centroid(&self, pt: Point<f64>) -> Option<usize> {
        let mut nearest = self.centroid_tree.nearest_neighbor_iter_with_distance_2(&[pt.x(), pt.y()]);
        let (first, best) = nearest.next()?;
        Some(nearest
            .take_while(|&(_, dist)| dist <= best)
            .map(|(entry, _)| entry.data)
            .fold(first.data, usize::min))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::square;

    #[test]
    fn centroids_follow_shape_order() {
        let geoms = Geometries::new(vec![square(0.0, 0.0, 2.0), square(2.0, 0.0, 2.0)]);

        assert_eq!(geoms.len(), 2);
        assert_eq!(geoms.centroid(0), Some(Point::new(1.0, 1.0)));
        assert_eq!(geoms.centroid(1), Some(Point::new(3.0, 1.0)));
    }

    #[test]
    fn query_returns_overlapping_boxes() {
        let geoms = Geometries::new(vec![square(0.0, 0.0, 1.0), square(5.0, 5.0, 1.0)]);
        let hits = geoms.query(&AABB::from_point([0.5, 0.5])).collect::<Vec<_>>();
        assert_eq!(hits, vec![0]);
    }

    #[test]
    fn nearest_centroid_breaks_ties_by_index() {
        // Point (2, 1) is equidistant from both centroids.
        let geoms = Geometries::new(vec![square(2.0, 0.0, 2.0), square(0.0, 0.0, 2.0)]);
        assert_eq!(geoms.nearest_centroid(Point::new(2.0, 1.0)), Some(0));
        assert_eq!(geoms.nearest_centroid(Point::new(0.1, 1.0)), Some(1));
    }

    #[test]
    fn empty_shapes_are_not_indexed() {
        let geoms = Geometries::new(vec![MultiPolygon(vec![]), square(0.0, 0.0, 1.0)]);
        assert_eq!(geoms.len(), 2);
        assert_eq!(geoms.centroid(0), None);
        assert_eq!(geoms.nearest_centroid(Point::new(10.0, 10.0)), Some(1));
        assert_eq!(geoms.centroid_distance_2(0, Point::new(0.0, 0.0)), f64::INFINITY);
    }
}
