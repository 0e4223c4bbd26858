mod layer;
mod unit_id;
mod unit_kind;

pub use layer::{AttributeJoin, UnitLayer};
pub(crate) use layer::RawUnit;
pub use unit_id::UnitId;
pub use unit_kind::UnitKind;
