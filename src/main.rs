mod db;
mod enrich;
mod model;
mod parser;
mod pipeline;
mod region;

use std::path::PathBuf;
use std::time::Instant;

use clap::{Parser, Subcommand};

use model::{Source, Technology};
use region::{RegionIndex, RegionLookup};

#[derive(Parser)]
#[command(name = "netlive", about = "Cross-source cell configuration normalizer")]
struct Cli {
    /// Path to the sqlite database
    #[arg(long, env = "NETLIVE_DB", default_value = "data/netlive.sqlite", global = true)]
    db: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the database schema
    Init,
    /// Load planning-tool placement exports into the database
    Import {
        #[arg(value_enum)]
        technology: Technology,
        /// CSV of cell_name, azimuth, height, longitude, latitude
        #[arg(long)]
        cells: Option<PathBuf>,
        /// CSV of site_name, longitude, latitude
        #[arg(long)]
        sites: Option<PathBuf>,
    },
    /// Update a single (source, technology) partition
    Update {
        #[arg(value_enum)]
        source: Source,
        #[arg(value_enum)]
        technology: Technology,
        /// Directory with this source's exported documents
        input: PathBuf,
        /// GeoJSON file with administrative-region polygons
        #[arg(long)]
        regions: Option<PathBuf>,
    },
    /// Update every partition from a root directory, one subdirectory per source
    Run {
        root: PathBuf,
        /// GeoJSON file with administrative-region polygons
        #[arg(long)]
        regions: Option<PathBuf>,
    },
    /// Show per-partition record counts
    Stats,
}

fn load_regions(path: Option<&PathBuf>) -> anyhow::Result<Option<RegionIndex>> {
    path.map(|p| RegionIndex::from_file(p)).transpose()
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
    let conn = db::connect(&cli.db)?;
    db::init_schema(&conn)?;

    match cli.command {
        Commands::Init => {
            println!("Schema ready at {}", cli.db.display());
        }
        Commands::Import {
            technology,
            cells,
            sites,
        } => {
            if cells.is_none() && sites.is_none() {
                anyhow::bail!("nothing to import: pass --cells and/or --sites");
            }
            if let Some(path) = cells {
                let n = db::import_atoll_cells(&conn, technology, &path)?;
                println!("Imported {n} {technology} cell placements");
            }
            if let Some(path) = sites {
                let n = db::import_atoll_sites(&conn, &path)?;
                println!("Imported {n} site coordinates");
            }
        }
        Commands::Update {
            source,
            technology,
            input,
            regions,
        } => {
            let index = load_regions(regions.as_ref())?;
            let lookup = index.as_ref().map(|i| i as &dyn RegionLookup);
            let report = pipeline::run_partition(&conn, source, technology, &input, lookup)?;
            println!(
                "{} {}: {} inserted, {} dropped, {} duplicates",
                report.source,
                report.technology,
                report.inserted,
                report.dropped,
                report.duplicates,
            );
        }
        Commands::Run { root, regions } => {
            let index = load_regions(regions.as_ref())?;
            let lookup = index.as_ref().map(|i| i as &dyn RegionLookup);
            let reports = pipeline::run_all(&conn, &root, lookup)?;
            for report in &reports {
                println!(
                    "{:<16} {:<6} {:>7} inserted {:>5} dropped {:>5} duplicates",
                    report.source.label(),
                    report.technology.as_str(),
                    report.inserted,
                    report.dropped,
                    report.duplicates,
                );
            }
            let failed = pipeline::PARTITIONS.len() - reports.len();
            if failed > 0 {
                println!("{failed} partitions failed and kept their previous rows");
            }
        }
        Commands::Stats => {
            let stats = db::get_stats(&conn)?;
            if stats.per_partition.is_empty() {
                println!("No partitions loaded yet. Run 'update' or 'run' first.");
            }
            for (oss, technology, count) in &stats.per_partition {
                println!("{oss:<16} {technology:<6} {count:>7}");
            }
            println!("Placement rows: {} cells, {} sites", stats.atoll_cells, stats.atoll_sites);
        }
    }

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {:.1}s", elapsed.as_secs_f64());
    }
    Ok(())
}
