//! Tile Scan CLI
//!
//! Usage:
//!   tile-scan grid --radius-m 1000000 --faces 6 --geojson --output grid.geojson
//!   tile-scan scan --tle data/stations.tle --lat 5 --lon 5 --within-km 1500 \
//!                  --start 2020-12-09T19:09:00Z --hours 1 --step-seconds 5
//!   tile-scan track --tle data/stations.tle --start 2020-12-09T19:09:00Z --minutes 90
//!   tile-scan map --tle data/stations.tle --radius-m 1000000 --within-km 800
//!   tile-scan horizon --tle data/stations.tle --at 2020-12-09T19:09:00Z
//!   tile-scan timestep --altitude-km 420 --radius-m 10000

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use clap::{Args, Parser, Subcommand};
use orbital_mechanics::{Propagator, Sgp4Propagator};
use std::path::PathBuf;
use std::sync::Arc;
use tile_grid::TileGrid;
use tile_scan::{loader, output, request, LocationRequest, DEFAULT_LOG_FILTER};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use visibility::{
    calculate_optimal_timestep, compute_satellite_horizon, map_satellite_to_tiles,
    step_from_seconds, CancelToken, Containment, EngineConfig, TimestepPolicy,
    DEFAULT_HORIZON_POINTS,
};

#[derive(Parser, Debug)]
#[command(
    name = "tile-scan",
    about = "Quadkey tile grids and satellite visibility windows"
)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate the whole-globe tile grid
    Grid {
        #[command(flatten)]
        tiles: TileArgs,

        /// Write GeoJSON polygons instead of the tile summary
        #[arg(long)]
        geojson: bool,

        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Scan TLE satellites against the tiles around a location
    Scan {
        #[command(flatten)]
        engine: EngineArgs,

        #[command(flatten)]
        range: RangeArgs,

        /// TLE catalogue (two- or three-line format)
        #[arg(long)]
        tle: PathBuf,

        /// Location latitude in degrees
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,

        /// Location longitude in degrees
        #[arg(long, allow_hyphen_values = true)]
        lon: f64,

        /// Search radius around the location in km
        #[arg(long, default_value_t = 100.0)]
        within_km: f64,

        /// Abort unfinished scans after this many seconds
        #[arg(long)]
        timeout_secs: Option<u64>,

        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Propagate TLE satellites over a time range
    Track {
        #[command(flatten)]
        range: RangeArgs,

        #[arg(long)]
        tle: PathBuf,

        /// Sampling interval in seconds
        #[arg(long, default_value_t = 60.0)]
        step_seconds: f64,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Map TLE satellites onto the grid tiles beneath them
    Map {
        #[command(flatten)]
        tiles: TileArgs,

        #[command(flatten)]
        range: RangeArgs,

        #[arg(long)]
        tle: PathBuf,

        /// Sampling interval in seconds
        #[arg(long, default_value_t = 60.0)]
        step_seconds: f64,

        /// Tiles whose centre is within this distance of the sub-point
        #[arg(long, default_value_t = 500.0)]
        within_km: f64,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Visible footprint of TLE satellites at one instant
    Horizon {
        #[command(flatten)]
        tiles: TileArgs,

        #[arg(long)]
        tle: PathBuf,

        /// Instant, RFC 3339 (now when omitted)
        #[arg(long)]
        at: Option<DateTime<Utc>>,

        /// Vertices on the horizon ring
        #[arg(long, default_value_t = DEFAULT_HORIZON_POINTS)]
        points: usize,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print the derived scan interval
    Timestep {
        #[arg(long)]
        altitude_km: f64,

        #[arg(long)]
        radius_m: f64,
    },
}

#[derive(Args, Debug)]
struct TileArgs {
    /// Tile radius in metres
    #[arg(long, default_value_t = 1_000_000.0)]
    radius_m: f64,

    /// Tile polygon face count
    #[arg(long, default_value_t = 6)]
    faces: usize,
}

#[derive(Args, Debug)]
struct EngineArgs {
    /// JSON engine configuration; overrides the flags below
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(flatten)]
    tiles: TileArgs,

    /// Fixed scan step in seconds (derived from altitude when omitted)
    #[arg(long)]
    step_seconds: Option<f64>,

    /// Maximum concurrent pair scans
    #[arg(long)]
    max_concurrency: Option<usize>,

    /// Test containment against the tile polygon instead of its radius
    #[arg(long)]
    polygon: bool,
}

impl EngineArgs {
    fn resolve(&self) -> Result<EngineConfig> {
        if let Some(path) = &self.config {
            return Ok(loader::load_engine_config(path)?);
        }

        let timestep = match self.step_seconds {
            Some(seconds) => TimestepPolicy::Fixed { seconds },
            None => TimestepPolicy::Derived,
        };
        let mut config = EngineConfig::new(self.tiles.radius_m, self.tiles.faces, timestep)?;
        if let Some(n) = self.max_concurrency {
            config = config.with_max_concurrency(n)?;
        }
        if self.polygon {
            config = config.with_containment(Containment::Polygon);
        }
        Ok(config)
    }
}

#[derive(Args, Debug)]
struct RangeArgs {
    /// Range start, RFC 3339 (now when omitted)
    #[arg(long)]
    start: Option<DateTime<Utc>>,

    /// Range length in hours
    #[arg(long, default_value_t = 1.0, conflicts_with = "minutes")]
    hours: f64,

    /// Range length in minutes
    #[arg(long)]
    minutes: Option<f64>,
}

impl RangeArgs {
    fn resolve(&self) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
        let start = self.start.unwrap_or_else(Utc::now);
        let minutes = self.minutes.unwrap_or(self.hours * 60.0);
        anyhow::ensure!(
            minutes.is_finite() && minutes >= 0.0,
            "range length must be non-negative"
        );
        let ms = (minutes * 60_000.0).round();
        let end = (ms < i64::MAX as f64)
            .then(|| Duration::try_milliseconds(ms as i64))
            .flatten()
            .and_then(|length| start.checked_add_signed(length))
            .with_context(|| {
                format!("{} minutes from {} is past the last instant", minutes, start)
            })?;
        Ok((start, end))
    }
}

fn seconds_to_duration(seconds: f64) -> Result<Duration> {
    step_from_seconds(seconds).context("invalid --step-seconds")
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        DEFAULT_LOG_FILTER.replace("=info", "=debug")
    } else {
        DEFAULT_LOG_FILTER.to_string()
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Command::Grid {
            tiles,
            geojson,
            output,
        } => {
            let grid = TileGrid::generate(tiles.radius_m, tiles.faces)?;
            let value = if geojson {
                grid.to_geojson()
            } else {
                output::grid_summary(&grid)
            };
            output::write_json(output.as_deref(), &value)?;
        }

        Command::Scan {
            engine,
            range,
            tle,
            lat,
            lon,
            within_km,
            timeout_secs,
            output,
        } => {
            let config = engine.resolve()?;
            let satellites = loader::load_tles(&tle)?;
            let request = LocationRequest::new(lat, lon, within_km)?;
            let cancel = match timeout_secs {
                Some(secs) => CancelToken::with_timeout(std::time::Duration::from_secs(secs)),
                None => CancelToken::new(),
            };

            let result = request::run_location_scan(
                request,
                &satellites,
                &config,
                Arc::new(Sgp4Propagator::new()),
                range.resolve()?,
                cancel,
            )
            .await?;

            info!(
                "{} windows over {} tiles ({} failed, {} cancelled, {} panicked)",
                result.windows.len(),
                result.tiles.len(),
                result.failures.len(),
                result.cancelled,
                result.panicked
            );
            output::write_json(output.as_deref(), &result)?;
        }

        Command::Track {
            range,
            tle,
            step_seconds,
            output,
        } => {
            let satellites = loader::load_tles(&tle)?;
            let (start, end) = range.resolve()?;
            let step = seconds_to_duration(step_seconds)?;
            let propagator = Sgp4Propagator::new();

            let mut tracks = Vec::with_capacity(satellites.len());
            for sat in &satellites {
                let snapshots = propagator
                    .propagate_range(sat, start, end, step)
                    .with_context(|| format!("propagating {} ({})", sat.name, sat.norad_id))?;
                tracks.push(serde_json::json!({
                    "norad_id": sat.norad_id,
                    "name": sat.name,
                    "snapshots": snapshots,
                }));
            }
            output::write_json(output.as_deref(), &tracks)?;
        }

        Command::Map {
            tiles,
            range,
            tle,
            step_seconds,
            within_km,
            output,
        } => {
            let satellites = loader::load_tles(&tle)?;
            let grid = TileGrid::generate(tiles.radius_m, tiles.faces)?;
            let (start, end) = range.resolve()?;
            let step = seconds_to_duration(step_seconds)?;
            let propagator = Sgp4Propagator::new();

            let mut mappings = Vec::new();
            for sat in &satellites {
                mappings.extend(map_satellite_to_tiles(
                    &propagator,
                    sat,
                    &grid,
                    start,
                    end,
                    step,
                    within_km,
                )?);
            }
            info!("{} satellite/tile mappings", mappings.len());
            output::write_json(output.as_deref(), &mappings)?;
        }

        Command::Horizon {
            tiles,
            tle,
            at,
            points,
            output,
        } => {
            let satellites = loader::load_tles(&tle)?;
            let at = at.unwrap_or_else(Utc::now);
            let grid = TileGrid::generate(tiles.radius_m, tiles.faces)?;
            let propagator = Sgp4Propagator::new();

            let mut footprints = Vec::with_capacity(satellites.len());
            for sat in &satellites {
                let horizon = compute_satellite_horizon(&propagator, sat, at, points)
                    .with_context(|| format!("horizon of {} ({})", sat.name, sat.norad_id))?;
                let covered: Vec<String> = horizon.tiles(&grid).iter().map(|t| t.id()).collect();
                footprints.push(serde_json::json!({
                    "name": sat.name,
                    "horizon": horizon,
                    "tiles": covered,
                }));
            }
            output::write_json(output.as_deref(), &footprints)?;
        }

        Command::Timestep {
            altitude_km,
            radius_m,
        } => {
            let step = calculate_optimal_timestep(altitude_km, radius_m)?;
            println!("{:.3}", step.num_milliseconds() as f64 / 1000.0);
        }
    }

    Ok(())
}
