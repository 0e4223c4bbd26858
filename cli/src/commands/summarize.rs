use std::path::PathBuf;

use anyhow::Result;
use precinct_car::{DrawFiles, Pipeline, pipeline::write_summary};
use tracing::info;

pub fn run(_cli: &crate::cli::Cli, args: &crate::cli::SummarizeArgs) -> Result<()> {
    let out_path = args.output.clone().unwrap_or_else(|| PathBuf::from("./summary.json"));

    info!("[summarize] loading configuration from {}", args.config.display());
    let pipeline = Pipeline::from_config_path(&args.config)?;
    let prepared = pipeline.prepare()?;

    let mut solver = DrawFiles::new(&args.draws);
    if let Some(path) = &args.imputed { solver = solver.with_imputed(path) }
    if let Some(path) = &args.diagnostics { solver = solver.with_diagnostics(path) }

    let posterior = pipeline.fit(&prepared, &solver)?;
    let summary = pipeline.summarize(&prepared, &posterior)?;
    write_summary(&summary, &out_path)?;

    let statewide = &summary.statewide;
    println!(
        "[summarize] statewide {} ratio {:.4} ({:.0}% interval {:.4} to {:.4}), observed {:.4} over {} modeled units",
        summary.response,
        statewide.predicted_ratio.median,
        statewide.predicted_ratio.interval.mass * 100.0,
        statewide.predicted_ratio.interval.lower,
        statewide.predicted_ratio.interval.upper,
        statewide.modeled_ratio.unwrap_or(f64::NAN),
        statewide.modeled.units,
    );
    println!("[summarize] wrote {}", out_path.display());

    Ok(())
}
