#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Parking availability map tool.
//!
//! Loads the lot isochrones and the status time series, then either answers
//! a one-off question (`regions`, `lots`, `inspect`, `range`), re-keys raw
//! fetcher output (`parse-records`), or with no subcommand starts an
//! interactive session that steps through time and writes the map layers
//! as `GeoJSON`.

mod config;
mod interactive;
mod view_spec;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Local;
use clap::{Args, Parser, Subcommand};
use geojson::FeatureCollection;
use parking_map_compositor::compose_catalog;
use parking_map_lots::{LotCatalog, lot_points, status_map};
use parking_map_records::{RawStatusRecords, TemporalIndex, slot_key};
use parking_map_records_models::ViewDate;

use crate::config::{DEFAULT_CONFIG_FILE, FileConfig, Overrides, Settings};

#[derive(Parser)]
#[command(name = "parking_map", about = "Parking availability map tool")]
struct Cli {
    /// Config file (defaults to `parking_map.toml` if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Lot isochrones `GeoJSON`
    #[arg(long, global = true)]
    isochrones: Option<PathBuf>,

    /// Status records JSON (raw or parsed)
    #[arg(long, global = true)]
    records: Option<PathBuf>,

    /// Directory for written `GeoJSON` layers
    #[arg(long, global = true)]
    output_dir: Option<PathBuf>,

    /// Quiet period before recomputing regions, in milliseconds
    #[arg(long, global = true)]
    debounce_ms: Option<u64>,

    /// Offset of the records' local time from UTC, in minutes
    #[arg(long, global = true, allow_hyphen_values = true)]
    utc_offset_minutes: Option<i32>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the recorded time range and which days are complete
    Range,
    /// Compose status regions for a view date
    Regions {
        #[command(flatten)]
        view: ViewArgs,
        /// Output file (defaults to `<output-dir>/regions.geojson`)
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Write lot point features for a view date
    Lots {
        #[command(flatten)]
        view: ViewArgs,
        /// Output file (defaults to `<output-dir>/lots.geojson`)
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// List the lots within walking distance of a point
    Inspect {
        #[command(flatten)]
        view: ViewArgs,
        #[arg(long, allow_hyphen_values = true)]
        lng: f64,
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
    },
    /// Re-key raw fetcher output onto half-hour slots
    ParseRecords {
        /// Raw records keyed by epoch seconds
        #[arg(long)]
        input: PathBuf,
        /// Where to write the slotted records
        #[arg(long)]
        output: PathBuf,
    },
}

#[derive(Args)]
struct ViewArgs {
    /// `YYYY-MM-DD HH:MM`, or a day group
    /// (allDays, weekdays, weekends, fridays, saturdays)
    #[arg(long)]
    at: String,

    /// Time of day for day groups (`HH:MM`)
    #[arg(long)]
    time: Option<String>,
}

impl ViewArgs {
    fn view_date(&self) -> Result<ViewDate, view_spec::ViewSpecError> {
        view_spec::parse_view_date(&self.at, self.time.as_deref())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init_custom_env("RUST_LOG");
    let cli = Cli::parse();

    let file = match &cli.config {
        Some(path) => FileConfig::load(path, true)?,
        None => FileConfig::load(Path::new(DEFAULT_CONFIG_FILE), false)?,
    };
    let settings = Settings::resolve(
        file,
        |name| std::env::var(name).ok(),
        Overrides {
            isochrones_path: cli.isochrones,
            records_path: cli.records,
            output_dir: cli.output_dir,
            debounce_ms: cli.debounce_ms,
            utc_offset_minutes: cli.utc_offset_minutes,
        },
    )?;

    match cli.command {
        Some(Commands::Range) => print_range(&load_index(&settings)?),
        Some(Commands::Regions { view, out }) => {
            let view = view.view_date()?;
            let (index, catalog) = (load_index(&settings)?, load_catalog(&settings)?);
            write_regions(&index, &catalog, &view, &output_path(&settings, out, "regions"))?;
        }
        Some(Commands::Lots { view, out }) => {
            let view = view.view_date()?;
            let (index, catalog) = (load_index(&settings)?, load_catalog(&settings)?);
            let summaries = catalog.summaries(&index.statuses_for_view_date(&view));
            let path = output_path(&settings, out, "lots");
            write_geojson(&path, &lot_points(&catalog, &summaries))?;
            println!("Wrote {} lots for {view} to {}", summaries.len(), path.display());
        }
        Some(Commands::Inspect { view, lng, lat }) => {
            let view = view.view_date()?;
            let (index, catalog) = (load_index(&settings)?, load_catalog(&settings)?);
            inspect(&index, &catalog, &view, lng, lat);
        }
        Some(Commands::ParseRecords { input, output }) => {
            parse_records(&settings, &input, &output)?;
        }
        None => {
            let index = Arc::new(load_index(&settings)?);
            let catalog = Arc::new(load_catalog(&settings)?);
            interactive::run(&settings, index, catalog).await?;
        }
    }

    Ok(())
}

/// Loads the status records, placing timestamps in the configured zone.
fn load_records(
    settings: &Settings,
    path: &Path,
) -> Result<RawStatusRecords, Box<dyn std::error::Error>> {
    let records = match settings.utc_offset {
        Some(offset) => RawStatusRecords::load(path, &offset)?,
        None => RawStatusRecords::load(path, &Local)?,
    };
    Ok(records)
}

fn load_index(settings: &Settings) -> Result<TemporalIndex, Box<dyn std::error::Error>> {
    let records = load_records(settings, &settings.records_path)?;
    Ok(TemporalIndex::new(records))
}

fn load_catalog(settings: &Settings) -> Result<LotCatalog, Box<dyn std::error::Error>> {
    Ok(LotCatalog::load(&settings.isochrones_path)?)
}

fn output_path(settings: &Settings, out: Option<PathBuf>, layer: &str) -> PathBuf {
    out.unwrap_or_else(|| settings.output_dir.join(format!("{layer}.geojson")))
}

/// Writes a `FeatureCollection`, creating parent directories as needed.
fn write_geojson(
    path: &Path,
    collection: &FeatureCollection,
) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_string(collection)?)?;
    log::debug!("Wrote {}", path.display());
    Ok(())
}

fn print_range(index: &TemporalIndex) {
    let (Some(earliest), Some(latest)) = (index.earliest(), index.latest()) else {
        println!("No status records");
        return;
    };

    println!("Earliest: {}", slot_key(earliest));
    println!("Latest:   {}", slot_key(latest));
    println!();
    for day in index.observed_days() {
        let mark = if index.is_day_complete(*day) {
            "complete"
        } else {
            "incomplete"
        };
        println!("  {} {mark}", day.format("%a %Y-%m-%d"));
    }
}

fn write_regions(
    index: &TemporalIndex,
    catalog: &LotCatalog,
    view: &ViewDate,
    path: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let resolved = index.resolve_timestamps(view);
    if resolved.is_empty() {
        log::warn!("{view} matches no observed day; every lot is unknown");
    }

    let summaries = catalog.summaries(&index.statuses_for_view_date(view));
    let composition = compose_catalog(catalog, &status_map(&summaries));
    write_geojson(path, &composition.to_feature_collection())?;

    let statuses: Vec<String> = composition
        .regions
        .iter()
        .map(|region| region.status.to_string())
        .collect();
    println!(
        "Wrote regions [{}] for {view} ({} slots) to {}",
        statuses.join(", "),
        resolved.len(),
        path.display()
    );
    if !composition.errors.is_empty() {
        println!("{} lot polygons were skipped:", composition.errors.len());
        for error in &composition.errors {
            println!("  {error}");
        }
    }
    Ok(())
}

fn inspect(index: &TemporalIndex, catalog: &LotCatalog, view: &ViewDate, lng: f64, lat: f64) {
    let covering = catalog.lots_covering(lng, lat);
    if covering.is_empty() {
        println!("No lot within walking distance of ({lng}, {lat})");
        return;
    }

    let summaries = catalog.summaries(&index.statuses_for_view_date(view));
    let by_lot: BTreeMap<_, _> = summaries
        .iter()
        .map(|summary| (summary.lot_id, summary))
        .collect();
    println!("{} lots within walking distance at {view}:", covering.len());
    for lot in covering {
        let Some(summary) = by_lot.get(&lot.id) else {
            continue;
        };
        println!(
            "  #{} {} ({}): {} grade {:.2} [available {}, full {}, unknown {}]",
            lot.id,
            lot.name.as_deref().unwrap_or("unnamed"),
            lot.address.as_deref().unwrap_or("no address"),
            summary.status(),
            summary.grade,
            summary.counts.available,
            summary.counts.full,
            summary.counts.unknown,
        );
    }
}

fn parse_records(
    settings: &Settings,
    input: &Path,
    output: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let records = load_records(settings, input)?;
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(output, records.to_slot_json()?)?;
    println!(
        "Wrote {} half-hour slots to {}",
        records.len(),
        output.display()
    );
    Ok(())
}
