//! Visible footprint of a satellite: the ground circle inside which it sits
//! above the local horizon.

use crate::{Result, VisibilityError};
use chrono::{DateTime, Utc};
use orbital_mechanics::{Propagator, Satellite};
use serde::Serialize;
use std::f64::consts::TAU;
use tile_grid::constants::EARTH_RADIUS_KM;
use tile_grid::geometry::destination_point;
use tile_grid::{GeoPoint, Tile, TileGrid};
use tracing::debug;

/// Ring resolution used by the CLI
pub const DEFAULT_HORIZON_POINTS: usize = 36;

#[derive(Debug, Clone, Serialize)]
pub struct SatelliteHorizon {
    pub norad_id: u32,
    pub at: DateTime<Utc>,
    pub sub_point: GeoPoint,
    pub altitude_km: f64,
    /// Great-circle distance from the sub-point to the horizon circle
    pub ground_range_km: f64,
    /// Horizon circle, clockwise from due north
    pub ring: Vec<GeoPoint>,
}

impl SatelliteHorizon {
    /// Whether a ground point sees the satellite at or above the horizon
    pub fn covers(&self, point: GeoPoint) -> bool {
        self.sub_point.distance_km(&point) <= self.ground_range_km
    }

    /// Grid tiles whose centre lies inside the footprint, nearest first
    pub fn tiles<'a>(&self, grid: &'a TileGrid) -> Vec<&'a Tile> {
        grid.tiles_within(self.sub_point, self.ground_range_km)
    }
}

/// Ground range to the horizon for a satellite at `altitude_km`
pub fn horizon_ground_range_km(altitude_km: f64) -> f64 {
    if altitude_km <= 0.0 {
        return 0.0;
    }
    EARTH_RADIUS_KM * (EARTH_RADIUS_KM / (EARTH_RADIUS_KM + altitude_km)).acos()
}

pub fn compute_satellite_horizon(
    propagator: &dyn Propagator,
    satellite: &Satellite,
    at: DateTime<Utc>,
    points: usize,
) -> Result<SatelliteHorizon> {
    if points < 3 {
        return Err(VisibilityError::InvalidInput(format!(
            "horizon ring needs at least 3 points, got {}",
            points
        )));
    }

    let position = propagator
        .propagate(&satellite.tle, at)
        .map_err(|source| VisibilityError::PropagationFailure {
            satellite_id: satellite.norad_id,
            at,
            source,
        })?;
    let sub_point = GeoPoint::new(position.latitude, position.longitude);
    let ground_range_km = horizon_ground_range_km(position.altitude_km);

    let ring = (0..points)
        .map(|i| {
            let bearing = TAU * i as f64 / points as f64;
            destination_point(sub_point, bearing, ground_range_km)
        })
        .collect();

    debug!(
        norad_id = satellite.norad_id,
        ground_range_km,
        "satellite horizon computed"
    );

    Ok(SatelliteHorizon {
        norad_id: satellite.norad_id,
        at,
        sub_point,
        altitude_km: position.altitude_km,
        ground_range_km,
        ring,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::tests::{satellite, slow_track, t0};
    use tile_grid::integrated_elevation;

    #[test]
    fn test_ground_range() {
        assert_eq!(horizon_ground_range_km(0.0), 0.0);
        // ISS-like altitude sees roughly 2200 km in every direction
        let leo = horizon_ground_range_km(420.0);
        assert!((leo - 2252.0).abs() < 5.0, "{}", leo);
        assert!(horizon_ground_range_km(35_786.0) > 8_000.0);
    }

    #[test]
    fn test_ring_on_horizon() {
        let horizon = compute_satellite_horizon(&slow_track(), &satellite(), t0(), 36).unwrap();
        assert_eq!(horizon.ring.len(), 36);
        assert_eq!(horizon.sub_point, GeoPoint::new(0.0, -10.0));

        for p in &horizon.ring {
            assert!(p.is_valid());
            let d = horizon.sub_point.distance_km(p);
            assert!((d - horizon.ground_range_km).abs() < 1e-3, "{}", d);
            let el = integrated_elevation(horizon.sub_point, horizon.altitude_km, *p);
            assert!(el < 0.5, "elevation {} at the ring", el);
        }
        // first vertex due north
        assert!(horizon.ring[0].latitude > 0.0);
        assert!((horizon.ring[0].longitude + 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_tiles_inside_footprint() {
        let grid = TileGrid::generate(1_000_000.0, 6).unwrap();
        let horizon = compute_satellite_horizon(&slow_track(), &satellite(), t0(), 36).unwrap();

        let tiles = horizon.tiles(&grid);
        assert!(!tiles.is_empty());
        assert!(tiles.iter().all(|t| horizon.covers(t.center)));
        assert!(!horizon.covers(GeoPoint::new(0.0, 170.0)));
    }

    #[test]
    fn test_rejects_degenerate_ring() {
        let err = compute_satellite_horizon(&slow_track(), &satellite(), t0(), 2).unwrap_err();
        assert!(matches!(err, VisibilityError::InvalidInput(_)));
    }
}
