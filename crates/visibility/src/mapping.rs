//! Satellite to tile mapping over a time range.

use crate::{Result, VisibilityError};
use chrono::{DateTime, Duration, Utc};
use orbital_mechanics::{Propagator, Satellite};
use serde::{Deserialize, Serialize};
use tile_grid::{GeoPoint, TileGrid};
use tracing::debug;

/// A tile lying under a satellite at one instant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileSatelliteMapping {
    pub norad_id: u32,
    pub tile_id: String,
    pub at: DateTime<Utc>,
    pub altitude_km: f64,
    pub distance_km: f64,
}

/// Every tile whose centre lies within `radius_km` of the sub-point, at each
/// step from `start` to `end` inclusive.
pub fn map_satellite_to_tiles(
    propagator: &dyn Propagator,
    satellite: &Satellite,
    grid: &TileGrid,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    step: Duration,
    radius_km: f64,
) -> Result<Vec<TileSatelliteMapping>> {
    if step <= Duration::zero() {
        return Err(VisibilityError::InvalidInput(
            "mapping step must be positive".to_string(),
        ));
    }
    if !(radius_km.is_finite() && radius_km >= 0.0) {
        return Err(VisibilityError::InvalidInput(format!(
            "mapping radius must be non-negative, got {} km",
            radius_km
        )));
    }
    if end < start {
        return Err(VisibilityError::InvalidInput(format!(
            "mapping end {} precedes start {}",
            end, start
        )));
    }

    let mut mappings = Vec::new();
    let mut t = start;
    while t <= end {
        let snapshot = satellite
            .snapshot(propagator, t)
            .map_err(|source| VisibilityError::PropagationFailure {
                satellite_id: satellite.norad_id,
                at: t,
                source,
            })?;
        let sub_point = GeoPoint::new(snapshot.position.latitude, snapshot.position.longitude);

        for tile in grid.tiles_within(sub_point, radius_km) {
            mappings.push(TileSatelliteMapping {
                norad_id: snapshot.norad_id,
                tile_id: tile.id(),
                at: snapshot.timestamp,
                altitude_km: snapshot.position.altitude_km,
                distance_km: tile.quadkey.distance_to(sub_point),
            });
        }
        t = match t.checked_add_signed(step) {
            Some(next) => next,
            None => break,
        };
    }

    debug!(
        norad_id = satellite.norad_id,
        mappings = mappings.len(),
        "satellite mapped to tiles"
    );

    Ok(mappings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::tests::{minutes, satellite, slow_track, t0};

    #[test]
    fn test_maps_track_to_tiles() {
        // zoom 5: tiles about 11.25 degrees wide
        let grid = TileGrid::generate(1_000_000.0, 6).unwrap();
        let mappings = map_satellite_to_tiles(
            &slow_track(),
            &satellite(),
            &grid,
            t0(),
            minutes(10.0),
            Duration::minutes(5),
            1000.0,
        )
        .unwrap();

        assert!(!mappings.is_empty());
        assert!(mappings.iter().all(|m| m.norad_id == 42 && m.altitude_km == 500.0));
        assert!(mappings.iter().all(|m| m.distance_km <= 1000.0));
        for m in &mappings {
            assert!(grid.get(&m.tile_id).is_some());
        }

        let instants: Vec<_> = mappings.iter().map(|m| m.at).collect();
        assert!(instants.contains(&t0()));
        assert!(instants.contains(&minutes(10.0)));
    }

    #[test]
    fn test_zero_radius_maps_nothing() {
        let grid = TileGrid::generate(1_000_000.0, 6).unwrap();
        let mappings = map_satellite_to_tiles(
            &slow_track(),
            &satellite(),
            &grid,
            t0(),
            minutes(10.0),
            Duration::minutes(1),
            0.0,
        )
        .unwrap();
        assert!(mappings.is_empty());
    }

    #[test]
    fn test_step_past_calendar_end() {
        let grid = TileGrid::generate(1_000_000.0, 6).unwrap();
        let mappings = map_satellite_to_tiles(
            &slow_track(),
            &satellite(),
            &grid,
            t0(),
            minutes(60.0),
            Duration::days(100_000_000),
            1000.0,
        )
        .unwrap();
        assert!(mappings.iter().all(|m| m.at == t0()));
        assert!(!mappings.is_empty());
    }

    #[test]
    fn test_rejects_invalid_step() {
        let grid = TileGrid::generate(1_000_000.0, 6).unwrap();
        let err = map_satellite_to_tiles(
            &slow_track(),
            &satellite(),
            &grid,
            t0(),
            minutes(10.0),
            Duration::zero(),
            100.0,
        )
        .unwrap_err();
        assert!(matches!(err, VisibilityError::InvalidInput(_)));
    }
}
