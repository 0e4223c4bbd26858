//! Block-group to precinct crosswalk and aggregation of block-group measurements.

mod crosswalk;
mod fields;

pub use crosswalk::{Crosswalk, CrosswalkMode, CrosswalkReport, FineMatch, MatchMethod};
pub use fields::{Aggregated, FieldKind, FieldSpec, aggregate};
