use std::path::PathBuf;

use anyhow::Result;
use precinct_car::Pipeline;
use tracing::info;

pub fn run(_cli: &crate::cli::Cli, args: &crate::cli::PrepareArgs) -> Result<()> {
    let out_dir = args.output.clone().unwrap_or_else(|| PathBuf::from("./model"));

    info!("[prepare] loading configuration from {}", args.config.display());
    let pipeline = Pipeline::from_config_path(&args.config)?;

    let prepared = pipeline.prepare()?;
    let manifest = pipeline.write_prepared(&prepared, &out_dir)?;

    let report = &prepared.report;
    println!(
        "[prepare] {} of {} precincts modeled, {} excluded, {} files written to {}",
        report.modeled_units,
        report.precincts,
        report.exclusions.len(),
        manifest.files.len(),
        out_dir.display(),
    );
    for caveat in &report.caveats {
        println!("[prepare] caveat: {}", caveat.description);
    }

    Ok(())
}
