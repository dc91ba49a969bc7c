mod config;
mod error;
mod extract;
mod kml;
mod node;
mod osm;
mod pipeline;

use std::path::PathBuf;
use std::time::Instant;

use clap::Parser;

use crate::config::{Settings, ZeroCapacity};

#[derive(Parser)]
#[command(
    name = "kml2osm",
    about = "Convert air-defense shelter placemarks from KML files into one OSM XML file"
)]
struct Cli {
    /// Directory with the input files (not searched recursively)
    input_dir: PathBuf,
    /// Output .osm file
    output: PathBuf,
    /// Id of the first emitted node; later nodes count down from it
    #[arg(long, allow_negative_numbers = true)]
    start_id: Option<i64>,
    /// Whether a zero capacity still adds "(0)" to the node name
    #[arg(long, value_enum)]
    zero_capacity: Option<ZeroCapacity>,
    /// Optional TOML settings file (KML2OSM_* env vars override it)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let mut settings = Settings::load(cli.config.as_deref())?;
    if let Some(start_id) = cli.start_id {
        settings.start_id = start_id;
    }
    if let Some(zero) = cli.zero_capacity {
        settings.zero_capacity_suffix = zero;
    }

    let summary = pipeline::convert(&cli.input_dir, &cli.output, &settings)?;
    summary.print();
    println!("Output: {}", cli.output.display());

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }
    Ok(())
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else {
        format!("{}m {}s", secs / 60, secs % 60)
    }
}
