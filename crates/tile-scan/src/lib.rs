//! Tile Scan
//!
//! Command-line surface of the tile visibility engine:
//!
//! | Command | Does |
//! |---------|------|
//! | `grid` | generate a tile grid and write it as JSON or GeoJSON |
//! | `scan` | scan TLE satellites against the tiles around a location |
//! | `track` | propagate TLE satellites over a time range |
//! | `map` | map TLE satellites onto the tiles beneath them |
//! | `timestep` | print the derived scan interval for an altitude and tile radius |
//!
//! The engine crates never read files or the environment; everything they
//! need is loaded and validated here first.

use thiserror::Error;

pub mod loader;
pub mod output;
pub mod request;

pub use request::LocationRequest;

/// Default tracing filter when `RUST_LOG` is unset
pub const DEFAULT_LOG_FILTER: &str = "tile_scan=info,visibility=info,tile_grid=info";

#[derive(Error, Debug)]
pub enum ScanCliError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("No usable TLE sets in {0}")]
    NoSatellites(String),
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error(transparent)]
    Grid(#[from] tile_grid::GridError),
    #[error(transparent)]
    Visibility(#[from] visibility::VisibilityError),
    #[error(transparent)]
    Orbital(#[from] orbital_mechanics::OrbitalError),
}

pub type Result<T> = std::result::Result<T, ScanCliError>;
