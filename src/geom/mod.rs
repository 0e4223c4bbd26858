mod adjacency;
mod crosswalk;
mod geom;

pub use crosswalk::MatchKind;
pub(crate) use geom::Geometries;
