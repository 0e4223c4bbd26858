//! End-to-end orchestration: geometry and results in, model input out, then
//! (after the external solver has run) posterior summaries.
//!
//! `prepare` -> `write_prepared` -> solver -> `fit` -> `summarize`

mod manifest;
mod report;

use std::{collections::BTreeMap, path::Path};

use anyhow::{Context, Result, ensure};
use tracing::{debug, info};

pub use manifest::{FileHash, RunManifest};
pub use report::RunReport;

use crate::{
    adjacency::{ModeledSet, WeightMatrix},
    aggregate::{Aggregated, Crosswalk, CrosswalkReport, aggregate},
    common::{ensure_dir_exists, require_file_exists},
    config::{GeometrySource, PipelineConfig},
    io,
    loader::load_results,
    outcome::OutcomeTable,
    solver::{Posterior, SolverInput, SpatialRegressionSolver, fit_checked},
    summary::{PosteriorSummarizer, Summary},
    unit::{AttributeJoin, UnitKind, UnitLayer},
};

pub const MODEL_INPUT_FILE: &str = "model_input.csv";
pub const ADJACENCY_FILE: &str = "adjacency.csv";
pub const NEIGHBORS_FILE: &str = "neighbors.csv";
pub const REPORT_FILE: &str = "report.json";
pub const MANIFEST_FILE: &str = "manifest.json";
pub const SUMMARY_FILE: &str = "summary.json";

/// Model input ready to be handed to a solver.
#[derive(Debug, Clone)]
pub struct PreparedModel {
    pub table: OutcomeTable,
    pub report: RunReport,
}

#[derive(Debug, Default)]
struct Covariates {
    aggregated: Option<Aggregated>,
    block_groups: Option<usize>,
    census_join: Option<AttributeJoin>,
    crosswalk: Option<CrosswalkReport>,
}

#[derive(Debug, Clone)]
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn from_config_path(path: &Path) -> Result<Self> {
        Ok(Self { config: PipelineConfig::from_path(path)? })
    }

    #[inline] pub fn config(&self) -> &PipelineConfig { &self.config }

    /// Load every input and build the outcome table over the modeled precincts.
    pub fn prepare(&self) -> Result<PreparedModel> {
        let config = &self.config;
        for (role, path) in config.inputs() {
            require_file_exists(path).with_context(|| format!("[pipeline] {role} input"))?;
        }

        let precincts = load_layer(UnitKind::Precinct, &config.precincts)?;
        let results = io::read_csv(&config.results.path)?;
        let loaded = load_results(
            &results,
            &config.results.columns,
            config.results.contest.as_deref(),
            config.denominator,
            &precincts,
        )?;

        let weights = WeightMatrix::from_layer(&precincts)?;
        let isolated_precincts = weights.isolated();
        info!(
            precincts = weights.len(),
            edges = weights.edge_count(),
            isolated = isolated_precincts.len(),
            "built precinct adjacency"
        );

        let modeled = ModeledSet::select(&weights, &loaded.eligible);
        ensure!(!modeled.is_empty(), "[pipeline] no precinct survived the results join and the adjacency check");

        let covariates = self.aggregate_covariates(&precincts)?;
        let exclusions = report::collect_exclusions(&loaded.report, modeled.isolated());
        let table = OutcomeTable::build(
            &loaded.results,
            &config.response,
            config.denominator,
            &modeled,
            covariates.aggregated.as_ref(),
            exclusions,
        )?;

        let report = RunReport {
            results: loaded.report,
            precincts: precincts.len(),
            adjacency_edges: weights.edge_count(),
            isolated_precincts,
            block_groups: covariates.block_groups,
            census_join: covariates.census_join,
            crosswalk: covariates.crosswalk,
            modeled_units: table.len(),
            exclusions: table.exclusions().to_vec(),
            modeled: table.modeled_totals(),
            full: table.full_totals(),
            missing_covariates: table.missing_covariates(),
            caveats: table.caveats().into_iter().map(Into::into).collect(),
        };

        Ok(PreparedModel { table, report })
    }

    /// Block-group covariates aggregated onto `precincts`, when any are configured.
    fn aggregate_covariates(&self, precincts: &UnitLayer) -> Result<Covariates> {
        let config = &self.config;
        let Some(source) = &config.block_groups else { return Ok(Covariates::default()) };
        if config.covariates.is_empty() {
            debug!("block groups configured without covariates; skipping aggregation");
            return Ok(Covariates::default());
        }

        let mut groups = load_layer(UnitKind::BlockGroup, source)?;
        let census_join = match &config.census {
            Some(census) => {
                let table = io::read_csv(&census.path)?;
                let fields = config.covariates.iter().map(|spec| spec.name.as_str()).collect::<Vec<_>>();
                Some(groups.merge_attributes(&table, &census.id_column, &fields)?)
            }
            None => None,
        };

        let crosswalk = Crosswalk::build(&groups, precincts, config.crosswalk);
        let aggregated = aggregate(&groups, precincts, &crosswalk, &config.covariates)?;

        Ok(Covariates {
            aggregated: Some(aggregated),
            block_groups: Some(groups.len()),
            census_join,
            crosswalk: Some(crosswalk.report().clone()),
        })
    }

    /// Write the model input, adjacency, report and manifest under `dir`.
    pub fn write_prepared(&self, prepared: &PreparedModel, dir: &Path) -> Result<RunManifest> {
        ensure_dir_exists(dir)?;
        let table = &prepared.table;

        io::write_csv(&mut table.to_dataframe()?, &dir.join(MODEL_INPUT_FILE))?;
        io::write_csv(&mut table.weights().to_dense_frame()?, &dir.join(ADJACENCY_FILE))?;
        io::write_csv(&mut table.weights().to_edge_frame()?, &dir.join(NEIGHBORS_FILE))?;
        io::write_json(&prepared.report, &dir.join(REPORT_FILE))?;

        let counts = BTreeMap::from([
            ("modeled_units".to_string(), table.len()),
            ("adjacency_edges".to_string(), table.weights().edge_count()),
            ("excluded_units".to_string(), table.exclusions().len()),
            ("covariates".to_string(), table.covariate_names().count()),
        ]);
        let mut manifest = RunManifest::new(&self.config.inputs(), counts)?;
        for name in [MODEL_INPUT_FILE, ADJACENCY_FILE, NEIGHBORS_FILE, REPORT_FILE] {
            manifest.add_file(dir, name)?;
        }
        io::write_json(&manifest, &dir.join(MANIFEST_FILE))?;

        info!(dir = %dir.display(), units = table.len(), "wrote model input");
        Ok(manifest)
    }

    /// Run `solver` on the prepared table; fails on non-convergence.
    pub fn fit(&self, prepared: &PreparedModel, solver: &dyn SpatialRegressionSolver) -> Result<Posterior> {
        let input = SolverInput { table: &prepared.table, sampler: &self.config.sampler };
        fit_checked(solver, &input, &self.config.convergence)
    }

    pub fn summarize(&self, prepared: &PreparedModel, posterior: &Posterior) -> Result<Summary> {
        PosteriorSummarizer::new(self.config.credible_mass)?.summarize_posterior(posterior, &prepared.table)
    }

    /// `prepare`, write the model input, fit and summarize. The summary is written next to the input.
    pub fn run(&self, solver: &dyn SpatialRegressionSolver, dir: &Path) -> Result<Summary> {
        let prepared = self.prepare()?;
        self.write_prepared(&prepared, dir)?;
        let posterior = self.fit(&prepared, solver)?;
        let summary = self.summarize(&prepared, &posterior)?;
        write_summary(&summary, &dir.join(SUMMARY_FILE))?;
        Ok(summary)
    }
}

pub fn write_summary(summary: &Summary, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        ensure_dir_exists(parent)?;
    }
    io::write_json(summary, path)
}

fn load_layer(kind: UnitKind, source: &GeometrySource) -> Result<UnitLayer> {
    let units = io::read_units(&source.path, &source.id_field)?;
    ensure!(!units.is_empty(), "[pipeline] {} contains no {kind} polygons", source.path.display());

    let layer = UnitLayer::from_units(kind, units);
    info!(kind = %kind, units = layer.len(), path = %source.path.display(), "loaded geometry");
    Ok(layer)
}
