//! One-shot lookup: drawn regions in, communes grouped by district out.

use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use wardmap::config::Config;
use wardmap::engine::parse_drawings;
use wardmap::export::ExportWriter;
use wardmap::{BoundaryLayer, Outcome, RegionQueryEngine};

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[derive(Parser, Debug)]
#[command(name = "resolve")]
#[command(about = "List the communes intersecting drawn regions")]
struct Args {
    /// GeoJSON file with the drawn regions
    #[arg(short, long)]
    drawings: PathBuf,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Boundary dataset (overrides the config file)
    #[arg(long)]
    boundary: Option<PathBuf>,

    /// Unit name field (overrides the config file)
    #[arg(long)]
    unit_field: Option<String>,

    /// Parent name field (overrides the config file)
    #[arg(long)]
    parent_field: Option<String>,

    /// PROJ.4 definition of the boundary dataset CRS
    #[arg(long)]
    source_proj: Option<String>,

    /// Write the export sheet here
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Export template (overrides the config file)
    #[arg(long)]
    template: Option<PathBuf>,
}

fn main() -> Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();

    let mut config = Config::load_or_default(args.config.as_deref())?;
    if let Some(path) = args.boundary {
        config.boundary.path = path;
    }
    if let Some(field) = args.unit_field {
        config.boundary.unit_field = field;
    }
    if let Some(field) = args.parent_field {
        config.boundary.parent_field = field;
    }
    if args.source_proj.is_some() {
        config.boundary.source_proj = args.source_proj;
    }
    if let Some(path) = args.template {
        config.export.template = Some(path);
    }

    let boundary = BoundaryLayer::shared(&config.boundary.source()).with_context(|| {
        format!(
            "Failed to load boundary dataset {:?}",
            config.boundary.path
        )
    })?;

    let payload = fs::read_to_string(&args.drawings)
        .with_context(|| format!("Failed to read drawings {:?}", args.drawings))?;

    let engine = RegionQueryEngine::new(boundary);
    let outcome = match parse_drawings(&payload) {
        Ok(regions) => {
            info!("{} regions drawn", regions.len());
            engine.query(&regions)
        }
        Err(e) => Outcome::Failed(e),
    };

    let result = match outcome {
        Outcome::Found(result) => result,
        Outcome::Failed(e) => bail!("Could not process the drawn regions: {e}"),
        other => {
            warn!("{}", other.message());
            return Ok(());
        }
    };

    info!(
        "Found {} communes in {} districts",
        result.matched_count(),
        result.len()
    );
    for row in RegionQueryEngine::to_export_rows(&result) {
        println!("**{}**: {}", row.parent, row.units);
    }

    if let Some(output) = args.output {
        let rows = RegionQueryEngine::to_export_rows(&result);
        match ExportWriter::from_config(&config.export).write(&rows) {
            Ok(bytes) => {
                fs::write(&output, bytes)
                    .with_context(|| format!("Failed to write export {:?}", output))?;
                info!("Export written to {:?}", output);
            }
            Err(e) => warn!("No export written: {}", e),
        }
    }

    Ok(())
}
