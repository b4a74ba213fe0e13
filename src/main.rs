//! # Tide Predictor Entry Point
//!
//! Command-line front end over the library:
//!
//! - `build`: turn a DTU ASCII atlas into a constituent database
//! - `predict`: a height series for one location, optionally referenced to LAT
//! - `datums`: LAT / HAT / MSL for one location over the configured window
//!
//! Settings come from `tide-predictor.toml` (see [`Config`]); flags override them.
//! Logs go to stderr and honour `RUST_LOG`, so stdout carries only results.

#[cfg(test)]
mod tests;

use anyhow::{bail, Context};
use chrono::{DateTime, Duration, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tide_predictor_lib::config::Config;
use tide_predictor_lib::constituent::{AmplitudeUnit, PhaseUnit};
use tide_predictor_lib::datums::{self, CancelToken, ScanWindow, TideDatums};
use tide_predictor_lib::dtu_ascii::DtuAsciiReader;
use tide_predictor_lib::ephemeris::{self, MoonPhase};
use tide_predictor_lib::grid::GridValueKind;
use tide_predictor_lib::ingest::{self, BuildUnits, GridProducer};
use tide_predictor_lib::mss::{GridMeanSeaSurface, MeanSeaSurface};
use tide_predictor_lib::{DataKind, LocationHarmonics, OpenMode, Solver, TideDataDb, TideSeries};
use tracing::info;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, registry, EnvFilter};

/// Harmonic ocean tide prediction from gridded constituent atlases.
#[derive(Parser)]
#[command(name = "tide-predictor")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file.
    #[arg(long, global = true, default_value = tide_predictor_lib::config::CONFIG_FILE)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a constituent database from an atlas file.
    Build {
        /// Atlas file with amplitude/phase grid pairs.
        input: PathBuf,

        /// Database file to create or extend.
        output: PathBuf,

        /// Atlas file format.
        #[arg(long, default_value = "dtu16ascii")]
        format: AtlasFormat,

        /// Unit of the amplitude grids (cm, m, ft).
        #[arg(long, default_value = "m")]
        amplitude_unit: AmplitudeUnit,
    },

    /// Predict tide heights at a location.
    Predict {
        /// Location as "LAT,LON" in degrees.
        #[arg(allow_hyphen_values = true, value_parser = parse_location)]
        location: (f64, f64),

        /// Constituent database (overrides the config file).
        #[arg(long)]
        db: Option<PathBuf>,

        /// First instant, RFC 3339 (default: now).
        #[arg(long, value_parser = parse_time)]
        start: Option<DateTime<Utc>>,

        /// End of the series, exclusive, RFC 3339 (default: start + 24h).
        #[arg(long, value_parser = parse_time)]
        end: Option<DateTime<Utc>>,

        /// Sampling step in seconds.
        #[arg(long, default_value = "600")]
        step_seconds: i64,

        /// Solver name (overrides the config file).
        #[arg(long)]
        solver: Option<Solver>,

        /// Also scan the datum window and print heights above LAT.
        #[arg(long)]
        datums: bool,

        /// Mean sea surface grid (DTU ASCII) to sample at the location.
        #[arg(long)]
        mss: Option<PathBuf>,

        /// Unit of the mean sea surface grid.
        #[arg(long, default_value = "m")]
        mss_unit: AmplitudeUnit,

        /// Emit JSON instead of a table.
        #[arg(long)]
        json: bool,
    },

    /// Scan LAT / HAT / MSL at a location.
    Datums {
        /// Location as "LAT,LON" in degrees.
        #[arg(allow_hyphen_values = true, value_parser = parse_location)]
        location: (f64, f64),

        /// Constituent database (overrides the config file).
        #[arg(long)]
        db: Option<PathBuf>,

        /// Solver name (overrides the config file).
        #[arg(long)]
        solver: Option<Solver>,

        #[arg(long)]
        start_year: Option<i32>,

        #[arg(long)]
        end_year: Option<i32>,

        #[arg(long)]
        step_minutes: Option<i64>,

        /// Emit JSON instead of a table.
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum AtlasFormat {
    /// DTU10 / DTU16 fixed-format ASCII grids
    #[value(name = "dtu16ascii", alias = "dtu10ascii")]
    Dtu16Ascii,
}

#[derive(Serialize)]
struct PredictionReport {
    series: TideSeries,
    moon_phase: MoonPhase,
    #[serde(skip_serializing_if = "Option::is_none")]
    datums: Option<TideDatums>,
    #[serde(skip_serializing_if = "Option::is_none")]
    mean_sea_surface_cm: Option<f64>,
}

/// Parse "LAT,LON" into degrees.
fn parse_location(text: &str) -> Result<(f64, f64), String> {
    let (lat, lon) = text
        .split_once(',')
        .ok_or_else(|| format!("expected LAT,LON, got {text:?}"))?;
    let lat: f64 = lat.trim().parse().map_err(|e| format!("bad latitude {lat:?}: {e}"))?;
    let lon: f64 = lon.trim().parse().map_err(|e| format!("bad longitude {lon:?}: {e}"))?;
    if !(-90.0..=90.0).contains(&lat) {
        return Err(format!("latitude {lat} outside -90..90"));
    }
    if !lon.is_finite() {
        return Err(format!("longitude {lon} is not finite"));
    }
    Ok((lat, lon))
}

fn parse_time(text: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(text)
        .map(|time| time.with_timezone(&Utc))
        .map_err(|e| format!("bad RFC 3339 time {text:?}: {e}"))
}

fn open_database(path: &Path) -> anyhow::Result<TideDataDb> {
    TideDataDb::open(path, DataKind::Constituent, OpenMode::ReadOnly)
        .with_context(|| format!("open constituent database {}", path.display()))
}

fn location_harmonics(
    db: &TideDataDb,
    solver: Solver,
    (lat, lon): (f64, f64),
) -> anyhow::Result<LocationHarmonics> {
    solver
        .harmonics(db, lat, lon)
        .with_context(|| format!("load {solver} harmonics at {lat},{lon}"))
}

/// Cancel token tripped by Ctrl-C.
fn cancel_on_interrupt() -> anyhow::Result<CancelToken> {
    let cancel = CancelToken::new();
    let handler = cancel.clone();
    ctrlc::set_handler(move || {
        info!("Got control-c, cancelling scan");
        handler.cancel();
    })
    .context("install Ctrl-C handler")?;
    Ok(cancel)
}

fn build(input: &Path, output: &Path, format: AtlasFormat, amplitude_unit: AmplitudeUnit) -> anyhow::Result<()> {
    let mut reader: Box<dyn GridProducer> = match format {
        AtlasFormat::Dtu16Ascii => Box::new(
            DtuAsciiReader::open(input).with_context(|| format!("open atlas {}", input.display()))?,
        ),
    };
    let db = TideDataDb::open(output, DataKind::Constituent, OpenMode::ReadWrite)
        .with_context(|| format!("open database {}", output.display()))?;
    let units = BuildUnits {
        amplitude: amplitude_unit,
        phase: PhaseUnit::Degree,
    };
    let written = ingest::build_database(reader.as_mut(), &db, units)
        .with_context(|| format!("build {} from {}", output.display(), input.display()))?;
    db.sync().context("flush database")?;

    let names: Vec<&str> = written.iter().map(|c| c.name()).collect();
    println!("{}: {} constituents ({})", output.display(), written.len(), names.join(" "));
    Ok(())
}

fn mean_sea_surface(path: &Path, unit: AmplitudeUnit, (lat, lon): (f64, f64)) -> anyhow::Result<f64> {
    let mut reader = DtuAsciiReader::open(path).with_context(|| format!("open {}", path.display()))?;
    let grid = loop {
        match reader.read_grid()? {
            Some(grid) if grid.kind == GridValueKind::SeaSurface => break grid,
            Some(_) => continue,
            None => bail!("{} holds no mean sea surface grid", path.display()),
        }
    };
    let surface = GridMeanSeaSurface::new(grid, unit)?;
    surface
        .height_at(lat, lon)
        .with_context(|| format!("sample mean sea surface at {lat},{lon}"))
}

fn print_datums(datums: &TideDatums) {
    println!("LAT: {:9.2} cm", datums.lowest);
    println!("MSL: {:9.2} cm", datums.mean);
    println!("HAT: {:9.2} cm", datums.highest);
}

fn main() -> anyhow::Result<()> {
    registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = Config::load_from_path(&cli.config);

    match cli.command {
        Commands::Build {
            input,
            output,
            format,
            amplitude_unit,
        } => build(&input, &output, format, amplitude_unit),

        Commands::Predict {
            location,
            db,
            start,
            end,
            step_seconds,
            solver,
            datums,
            mss,
            mss_unit,
            json,
        } => {
            let start = start.unwrap_or_else(Utc::now);
            let end = match end {
                Some(end) => end,
                None => start
                    .checked_add_signed(Duration::hours(24))
                    .context("no day of prediction fits after the start time")?,
            };
            let window = ScanWindow::with_step_seconds(start, end, step_seconds)?;
            let db = open_database(db.as_deref().unwrap_or(config.database.path.as_path()))?;
            let solver = solver.unwrap_or(config.solver.name);
            let options = config.solver.options();
            let harmonics = location_harmonics(&db, solver, location)?;

            let cancel = cancel_on_interrupt()?;
            let datums = if datums {
                let window = config.datums.window()?;
                Some(datums::scan_datums(&harmonics, &window, &options, &cancel)?)
            } else {
                None
            };
            let mean_sea_surface_cm = match mss {
                Some(path) => Some(mean_sea_surface(&path, mss_unit, location)?),
                None => None,
            };
            let series = datums::predict_series(&harmonics, &window, &options, &cancel)?;
            let report = PredictionReport {
                moon_phase: ephemeris::moon_phase(start),
                series,
                datums,
                mean_sea_surface_cm,
            };

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
                return Ok(());
            }

            println!("{} at {},{} ({})", solver, location.0, location.1, report.moon_phase);
            if let Some(msl) = report.mean_sea_surface_cm {
                println!("MSS: {msl:9.2} cm");
            }
            if let Some(datums) = &report.datums {
                print_datums(datums);
            }
            for sample in &report.series.samples {
                let stamp = sample.time.format("%Y-%m-%dT%H:%M:%SZ");
                match &report.datums {
                    Some(d) => println!("{stamp}  {:9.2}  {:9.2}", sample.height_cm - d.lowest, sample.height_cm),
                    None => println!("{stamp}  {:9.2}", sample.height_cm),
                }
            }
            Ok(())
        }

        Commands::Datums {
            location,
            db,
            solver,
            start_year,
            end_year,
            step_minutes,
            json,
        } => {
            let mut window_config = config.datums.clone();
            window_config.start_year = start_year.unwrap_or(window_config.start_year);
            window_config.end_year = end_year.unwrap_or(window_config.end_year);
            window_config.step_minutes = step_minutes.unwrap_or(window_config.step_minutes);
            let window = window_config.window()?;

            let db = open_database(db.as_deref().unwrap_or(config.database.path.as_path()))?;
            let solver = solver.unwrap_or(config.solver.name);
            let harmonics = location_harmonics(&db, solver, location)?;
            let cancel = cancel_on_interrupt()?;
            let datums = datums::scan_datums(&harmonics, &window, &config.solver.options(), &cancel)
                .context("datum scan")?;

            if json {
                println!("{}", serde_json::to_string_pretty(&datums)?);
            } else {
                print_datums(&datums);
            }
            Ok(())
        }
    }
}
