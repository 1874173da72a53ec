//! Visibility Window Detection
//!
//! Time-stepped scans of a satellite against quadkey tiles, producing
//! acquisition (AOS), loss (LOS) and peak elevation for every pass.
//!
//! The engine holds no global state. Callers hand in an [`EngineConfig`], a
//! [`Propagator`](orbital_mechanics::Propagator) and a [`VisibilitySink`];
//! windows flow out through the sink as they complete.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod cancel;
pub mod config;
pub mod detector;
pub mod horizon;
pub mod mapping;
pub mod scheduler;
pub mod sink;
pub mod timestep;

pub use cancel::CancelToken;
pub use config::{Containment, EngineConfig, RawEngineConfig, TimestepPolicy};
pub use detector::{ScanSummary, VisibilityScanner};
pub use horizon::{
    compute_satellite_horizon, horizon_ground_range_km, SatelliteHorizon, DEFAULT_HORIZON_POINTS,
};
pub use mapping::{map_satellite_to_tiles, TileSatelliteMapping};
pub use scheduler::{ScanFailure, ScanJob, ScanReport, ScanScheduler};
pub use sink::{MemorySink, VisibilitySink};
pub use timestep::{calculate_optimal_timestep, step_from_seconds, MIN_TIMESTEP_MS};

#[derive(Error, Debug)]
pub enum VisibilityError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Propagation failed for satellite {satellite_id} at {at}: {source}")]
    PropagationFailure {
        satellite_id: u32,
        at: DateTime<Utc>,
        #[source]
        source: orbital_mechanics::OrbitalError,
    },

    #[error("Scan of satellite {satellite_id} over tile {tile_id} cancelled at {at}")]
    Cancelled {
        satellite_id: u32,
        tile_id: String,
        at: DateTime<Utc>,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Grid(#[from] tile_grid::GridError),
}

pub type Result<T> = std::result::Result<T, VisibilityError>;

/// One pass of a satellite over a tile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisibilityWindow {
    pub satellite_id: u32,
    pub tile_id: String,
    pub aos: DateTime<Utc>,
    /// Unset when the satellite was still over the tile at the end of the scan
    pub los: Option<DateTime<Utc>>,
    pub max_elevation_deg: f64,
}

impl VisibilityWindow {
    pub fn is_open(&self) -> bool {
        self.los.is_none()
    }

    pub fn duration(&self) -> Option<chrono::Duration> {
        self.los.map(|los| los - self.aos)
    }
}

/// First acquisition found in a scan. `aos` is unset and the elevation zero
/// when the satellite never reaches the tile.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AosResult {
    pub aos: Option<DateTime<Utc>>,
    pub max_elevation_deg: f64,
}
