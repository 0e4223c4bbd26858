#![doc = "Areal-unit preparation and posterior summaries for spatial CAR models of precinct election results"]
mod common;
mod geom;
mod io;

pub mod adjacency;
pub mod aggregate;
pub mod config;
pub mod error;
pub mod loader;
pub mod outcome;
pub mod pipeline;
pub mod solver;
pub mod summary;
pub mod unit;

#[cfg(test)]
mod testutil;

#[doc(inline)]
pub use config::PipelineConfig;

#[doc(inline)]
pub use error::ModelError;

#[doc(inline)]
pub use outcome::{OutcomeRecord, OutcomeTable};

#[doc(inline)]
pub use pipeline::{Pipeline, PreparedModel, RunManifest, RunReport};

#[doc(inline)]
pub use solver::{DrawFiles, Posterior, SpatialRegressionSolver};

#[doc(inline)]
pub use summary::Summary;

#[doc(inline)]
pub use unit::{UnitId, UnitKind};
