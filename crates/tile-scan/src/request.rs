//! Location visibility requests: which satellites pass over the tiles
//! around a point, and when.

use crate::{Result, ScanCliError};
use chrono::{DateTime, Utc};
use orbital_mechanics::{Propagator, Satellite};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tile_grid::{tiles_around, GeoPoint, Tile};
use tracing::info;
use visibility::{
    CancelToken, EngineConfig, MemorySink, ScanJob, ScanReport, ScanScheduler, VisibilityWindow,
};

fn is_valid_latitude(lat: f64) -> bool {
    (-90.0..=90.0).contains(&lat) && lat.is_finite()
}

fn is_valid_longitude(lon: f64) -> bool {
    (-180.0..=180.0).contains(&lon) && lon.is_finite()
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocationRequest {
    pub latitude: f64,
    pub longitude: f64,
    /// Search radius around the location
    pub radius_km: f64,
}

impl LocationRequest {
    pub fn new(latitude: f64, longitude: f64, radius_km: f64) -> Result<Self> {
        let request = Self {
            latitude,
            longitude,
            radius_km,
        };
        request.validate()?;
        Ok(request)
    }

    pub fn validate(&self) -> Result<()> {
        if !is_valid_latitude(self.latitude) {
            return Err(ScanCliError::InvalidRequest(format!(
                "latitude {} outside [-90, 90]",
                self.latitude
            )));
        }
        if !is_valid_longitude(self.longitude) {
            return Err(ScanCliError::InvalidRequest(format!(
                "longitude {} outside [-180, 180]",
                self.longitude
            )));
        }
        if !(self.radius_km.is_finite() && self.radius_km > 0.0) {
            return Err(ScanCliError::InvalidRequest(format!(
                "radius {} km must be positive",
                self.radius_km
            )));
        }
        Ok(())
    }

    pub fn point(&self) -> GeoPoint {
        GeoPoint::new(self.latitude, self.longitude)
    }

    /// Tiles of the configured grid whose centre lies within the search radius
    pub fn tiles(&self, config: &EngineConfig) -> Result<Vec<Tile>> {
        Ok(tiles_around(
            self.point(),
            self.radius_km,
            config.tile_radius_m,
            config.face_count,
        )?)
    }
}

/// A pair that failed, flattened for output
#[derive(Debug, Clone, Serialize)]
pub struct FailureRecord {
    pub satellite_id: u32,
    pub tile_id: String,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LocationScanResult {
    pub request: LocationRequest,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub satellites: usize,
    pub tiles: Vec<String>,
    pub windows: Vec<VisibilityWindow>,
    pub failures: Vec<FailureRecord>,
    /// Pairs stopped by the timeout, including those never started
    pub cancelled: usize,
    /// Pairs whose scan task crashed; rerun them
    pub panicked: usize,
}

impl LocationScanResult {
    fn from_report(
        request: LocationRequest,
        (start, end): (DateTime<Utc>, DateTime<Utc>),
        satellites: usize,
        tiles: &[Tile],
        windows: Vec<VisibilityWindow>,
        report: ScanReport,
    ) -> Self {
        Self {
            request,
            start,
            end,
            satellites,
            tiles: tiles.iter().map(Tile::id).collect(),
            windows,
            failures: report
                .failures
                .into_iter()
                .map(|f| FailureRecord {
                    satellite_id: f.satellite_id,
                    tile_id: f.tile_id,
                    error: f.error.to_string(),
                })
                .collect(),
            cancelled: report.cancelled,
            panicked: report.panicked,
        }
    }
}

/// Scan every satellite against every tile around the requested location
pub async fn run_location_scan(
    request: LocationRequest,
    satellites: &[Satellite],
    config: &EngineConfig,
    propagator: Arc<dyn Propagator>,
    (start, end): (DateTime<Utc>, DateTime<Utc>),
    cancel: CancelToken,
) -> Result<LocationScanResult> {
    request.validate()?;
    if end < start {
        return Err(ScanCliError::InvalidRequest(format!(
            "end {} precedes start {}",
            end, start
        )));
    }

    let tiles = request.tiles(config)?;
    info!(
        "Scanning {} satellites over {} tiles around ({:.4}, {:.4})",
        satellites.len(),
        tiles.len(),
        request.latitude,
        request.longitude
    );

    let scheduler = ScanScheduler::from_config(propagator, config)?;
    let sink = Arc::new(MemorySink::new());
    let report = scheduler
        .run(
            ScanJob::cross(satellites, &tiles),
            start,
            end,
            sink.clone(),
            cancel,
        )
        .await;

    Ok(LocationScanResult::from_report(
        request,
        (start, end),
        satellites.len(),
        &tiles,
        sink.windows(),
        report,
    ))
}
