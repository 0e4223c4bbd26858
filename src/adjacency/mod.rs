//! Shared-border weights over precincts and selection of the modeled set.

mod selection;
mod weights;

pub use selection::{Exclusion, ExclusionReason, ModeledSet};
pub use weights::WeightMatrix;
