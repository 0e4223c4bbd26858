use std::path::PathBuf;

/// Spatial CAR model preparation and posterior summaries for precinct results
#[derive(clap::Parser, Debug)]
#[command(name = "precinct-car", version, about, propagate_version = true)]
pub struct Cli {
    /// Increase output verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(clap::Subcommand, Debug)]
pub enum Commands {
    /// Build the model input (outcome table, adjacency, report, manifest)
    Prepare(PrepareArgs),

    /// Check sampler draws for convergence and summarize them
    Summarize(SummarizeArgs),
}

#[derive(clap::Args, Debug)]
pub struct PrepareArgs {
    /// Pipeline configuration (JSON)
    #[arg(value_hint = clap::ValueHint::FilePath)]
    pub config: PathBuf,

    /// Output directory, defaults to "./model"
    #[arg(short, long, value_hint = clap::ValueHint::DirPath)]
    pub output: Option<PathBuf>,
}

#[derive(clap::Args, Debug)]
pub struct SummarizeArgs {
    /// Pipeline configuration (JSON)
    #[arg(value_hint = clap::ValueHint::FilePath)]
    pub config: PathBuf,

    /// Predicted response draws (CSV: chain, draw, one column per unit)
    #[arg(long, value_hint = clap::ValueHint::FilePath)]
    pub draws: PathBuf,

    /// Imputed covariate draws (CSV: chain, draw, one `covariate:unit` column each)
    #[arg(long, value_hint = clap::ValueHint::FilePath)]
    pub imputed: Option<PathBuf>,

    /// Diagnostics reported by the sampler (JSON: rhat, ess)
    #[arg(long, value_hint = clap::ValueHint::FilePath)]
    pub diagnostics: Option<PathBuf>,

    /// Output summary file, defaults to "./summary.json"
    #[arg(short, long, value_hint = clap::ValueHint::FilePath)]
    pub output: Option<PathBuf>,
}
