//! Pipeline configuration, read from a JSON document.

use std::{
    collections::BTreeSet,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::{
    aggregate::{CrosswalkMode, FieldSpec},
    error::ModelError,
    io,
    loader::{Denominator, ResultsColumns},
    solver::{ConvergenceThresholds, SamplerConfig},
};

/// Long-format election results table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResultsSource {
    pub path: PathBuf,
    #[serde(default)]
    pub columns: ResultsColumns,
    #[serde(default)]
    pub contest: Option<String>, // keep only rows of this contest
}

/// Polygon layer (GeoJSON or Shapefile) with its identifier field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GeometrySource {
    pub path: PathBuf,
    pub id_field: String,
}

/// Census estimates keyed by block-group identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CensusSource {
    pub path: PathBuf,
    pub id_column: String,
}

fn default_credible_mass() -> f64 { 0.94 }

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    pub results: ResultsSource,
    pub precincts: GeometrySource,
    #[serde(default)]
    pub block_groups: Option<GeometrySource>,
    #[serde(default)]
    pub census: Option<CensusSource>,

    /// Choice whose votes are the response count.
    pub response: String,
    #[serde(default)]
    pub denominator: Denominator,
    #[serde(default)]
    pub covariates: Vec<FieldSpec>,
    #[serde(default)]
    pub crosswalk: CrosswalkMode,

    #[serde(default)]
    pub sampler: SamplerConfig,
    #[serde(default)]
    pub convergence: ConvergenceThresholds,
    #[serde(default = "default_credible_mass")]
    pub credible_mass: f64,
}

impl PipelineConfig {
    /// Read and validate a configuration file. Relative input paths resolve against its directory.
    pub fn from_path(path: &Path) -> Result<Self> {
        let mut config: Self = io::read_json(path)?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        config.resolve_paths(base);
        config.validate()
            .with_context(|| format!("[config] validating {}", path.display()))?;
        Ok(config)
    }

    /// Make relative input paths relative to `base`.
    pub fn resolve_paths(&mut self, base: &Path) {
        let resolve = |path: &mut PathBuf| {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        };
        resolve(&mut self.results.path);
        resolve(&mut self.precincts.path);
        if let Some(source) = self.block_groups.as_mut() { resolve(&mut source.path) }
        if let Some(source) = self.census.as_mut() { resolve(&mut source.path) }
    }

    /// Reject settings that cannot produce a valid run.
    pub fn validate(&self) -> Result<(), ModelError> {
        let invalid = |message: String| Err(ModelError::InvalidConfig(message));

        if self.response.trim().is_empty() {
            return invalid("response must name a choice".into());
        }
        if let Some(problem) = self.sampler.problem() {
            return invalid(problem);
        }
        if !(self.convergence.max_rhat >= 1.0) {
            return invalid(format!("convergence.max_rhat ({}) must be at least 1", self.convergence.max_rhat));
        }
        if !(self.convergence.min_ess > 0.0) {
            return invalid(format!("convergence.min_ess ({}) must be positive", self.convergence.min_ess));
        }
        if !(self.credible_mass > 0.0 && self.credible_mass <= 1.0) {
            return invalid(format!("credible_mass ({}) must lie in (0, 1]", self.credible_mass));
        }
        if !self.covariates.is_empty() && self.block_groups.is_none() {
            return invalid("covariates require a block_groups geometry source".into());
        }
        if self.census.is_some() && self.block_groups.is_none() {
            return invalid("census estimates require a block_groups geometry source".into());
        }

        let mut names = BTreeSet::new();
        for spec in &self.covariates {
            if !names.insert(spec.name.as_str()) {
                return invalid(format!("covariate {:?} is listed twice", spec.name));
            }
        }
        Ok(())
    }

    /// Every input file, labeled by role.
    pub fn inputs(&self) -> Vec<(&'static str, &Path)> {
        let mut inputs = vec![("results", self.results.path.as_path()), ("precincts", self.precincts.path.as_path())];
        if let Some(source) = &self.block_groups { inputs.push(("block_groups", source.path.as_path())) }
        if let Some(source) = &self.census { inputs.push(("census", source.path.as_path())) }
        inputs
    }
}
