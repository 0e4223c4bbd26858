mod fs;
mod stats;

pub(crate) use fs::*;
pub(crate) use stats::*;
