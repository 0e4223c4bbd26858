use anyhow::Result;
use geo::{BoundingRect, Relate};
use rstar::AABB;

use super::Geometries;

impl Geometries {
    /// Rook contiguity (shared edge with positive length) as sorted adjacency lists.
    /// Uses the DE-9IM matrix: require `touches` AND boundary∩boundary has dimension 1,
    /// so shapes meeting only at a corner are not neighbors.
    pub(crate) fn rook_adjacencies(&self) -> Result<Vec<Vec<u32>>> {
        let mut adjacencies = vec![Vec::new(); self.len()];

        for (i, shape) in self.shapes().iter().enumerate() {
            let Some(rect) = shape.bounding_rect() else { continue };
            let search = AABB::from_corners(rect.min().into(), rect.max().into());

            for j in self.query(&search) {
                if j <= i { continue } // check each unordered pair once

                let im = shape.relate(&self.shapes()[j]);

                // In the 9-char DE-9IM string, index 4 is Boundary/Boundary.
                if im.is_touches() && im.matches("****1****")? {
                    adjacencies[i].push(j as u32);
                    adjacencies[j].push(i as u32);
                }
            }
        }

        adjacencies.iter_mut().for_each(|neighbors| neighbors.sort_unstable());
        Ok(adjacencies)
    }
}
