use geo::{Area, BooleanOps, BoundingRect, Contains, Intersects, MultiPolygon, Point};
use rstar::AABB;
use serde::Serialize;

use super::Geometries;

/// How a point was matched to a containing shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    Contained, // point strictly inside the shape
    Boundary,  // point on the shape's boundary
    Nearest,   // outside every shape, nearest centroid used
}

impl Geometries {
    /// Find the shape containing `pt`.
    ///
    /// Shapes whose interior contains the point win over shapes whose boundary
    /// contains it; among several candidates of the same kind the nearest centroid
    /// wins, then the smallest index. A point outside every shape falls back to
    /// the shape with the nearest centroid. Returns `None` only when no shape has
    /// a centroid.
    pub(crate) fn locate(&self, pt: Point<f64>) -> Option<(usize, MatchKind)> {
        let candidates = self.query(&AABB::from_point([pt.x(), pt.y()])).collect::<Vec<_>>();

        let contained = candidates.iter().copied()
            .filter(|&j| self.shapes()[j].contains(&pt))
            .collect::<Vec<_>>();
        if let Some(j) = self.closest_of(&contained, pt) {
            return Some((j, MatchKind::Contained));
        }

        let on_boundary = candidates.iter().copied()
            .filter(|&j| self.shapes()[j].intersects(&pt))
            .collect::<Vec<_>>();
        if let Some(j) = self.closest_of(&on_boundary, pt) {
            return Some((j, MatchKind::Boundary));
        }

        self.nearest_centroid(pt).map(|j| (j, MatchKind::Nearest))
    }

    /// Among `candidates`, the shape whose centroid is nearest `pt`, ties by smallest index.
    fn closest_of(&self, candidates: &[usize], pt: Point<f64>) -> Option<usize> {
        candidates.iter().copied().min_by(|&a, &b| {
            self.centroid_distance_2(a, pt)
                .total_cmp(&self.centroid_distance_2(b, pt))
                .then(a.cmp(&b))
        })
    }

    /// Share of `shape`'s area falling inside each overlapping shape, sorted by index.
    /// Shares sum to one over the covered part; empty when nothing overlaps with positive area.
    pub(crate) fn overlap_shares(&self, shape: &MultiPolygon<f64>) -> Vec<(usize, f64)> {
        let Some(rect) = shape.bounding_rect() else { return Vec::new() };
        let search = AABB::from_corners(rect.min().into(), rect.max().into());

        let mut overlaps = self.query(&search)
            .map(|j| (j, shape.intersection(&self.shapes()[j]).unsigned_area()))
            .filter(|&(_, area)| area > 0.0)
            .collect::<Vec<_>>();
        overlaps.sort_unstable_by_key(|&(j, _)| j);

        let covered = overlaps.iter().map(|&(_, area)| area).sum::<f64>();
        overlaps.into_iter()
            .map(|(j, area)| (j, area / covered))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{rect, square};

    fn strip() -> Geometries {
        Geometries::new(vec![square(0.0, 0.0, 2.0), square(2.0, 0.0, 2.0)])
    }

    #[test]
    fn interior_points_are_contained() {
        assert_eq!(strip().locate(Point::new(0.5, 0.5)), Some((0, MatchKind::Contained)));
        assert_eq!(strip().locate(Point::new(3.5, 1.0)), Some((1, MatchKind::Contained)));
    }

    #[test]
    fn boundary_points_resolve_deterministically() {
        // (2, 1) lies on the shared edge and is equidistant from both centroids.
        let geoms = strip();
        let first = geoms.locate(Point::new(2.0, 1.0));
        assert_eq!(first, Some((0, MatchKind::Boundary)));
        for _ in 0..10 {
            assert_eq!(geoms.locate(Point::new(2.0, 1.0)), first);
        }
    }

    #[test]
    fn boundary_points_prefer_nearest_centroid() {
        // Right square is smaller, so its centroid is closer to the shared edge point.
        let geoms = Geometries::new(vec![square(0.0, 0.0, 4.0), square(4.0, 1.0, 1.0)]);
        assert_eq!(geoms.locate(Point::new(4.0, 1.5)), Some((1, MatchKind::Boundary)));
    }

    #[test]
    fn outside_points_fall_back_to_nearest_centroid() {
        assert_eq!(strip().locate(Point::new(5.0, 1.0)), Some((1, MatchKind::Nearest)));
        assert_eq!(strip().locate(Point::new(-3.0, 1.0)), Some((0, MatchKind::Nearest)));
    }

    #[test]
    fn no_shapes_means_no_match() {
        assert_eq!(Geometries::new(vec![]).locate(Point::new(0.0, 0.0)), None);
    }

    #[test]
    fn overlap_shares_split_by_area() {
        // A 2x1 rectangle straddling the shared edge, three quarters on the left.
        let shares = strip().overlap_shares(&rect(0.5, 0.0, 2.5, 1.0));

        assert_eq!(shares.len(), 2);
        assert_eq!(shares[0].0, 0);
        assert!((shares[0].1 - 0.75).abs() < 1e-9);
        assert!((shares[1].1 - 0.25).abs() < 1e-9);
    }

    #[test]
    fn overlap_shares_ignore_uncovered_area() {
        // Half of the shape lies outside every shape; the covered half is all in shape 1.
        let shares = strip().overlap_shares(&square(3.0, 0.0, 2.0));
        assert_eq!(shares.len(), 1);
        assert_eq!(shares[0].0, 1);
        assert!((shares[0].1 - 1.0).abs() < 1e-9);
    }

    #[test]
    fn overlap_shares_empty_when_disjoint() {
        assert!(strip().overlap_shares(&square(10.0, 10.0, 1.0)).is_empty());
    }
}
