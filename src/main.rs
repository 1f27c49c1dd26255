use clap::Parser;
use env_logger::Env;
use log::info;

use patch_mosaic::cli::Args;
use patch_mosaic::{pipeline, Result};

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logger
    let log_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level)).init();

    info!("=== GeoTIFF Patch Mosaic ===");

    let config = args.into_config()?;
    info!("Input: {}", config.input);

    let summary = pipeline::run(&config)?;
    info!(
        "Mosaicked {} patches, max label {}, written as {}",
        summary.geometry.patch_count(),
        summary.max_label,
        summary.encoding.gdal_name()
    );

    info!("=== Done! ===");
    Ok(())
}
