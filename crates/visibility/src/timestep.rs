//! Scan interval selection from orbital speed and tile size.

use crate::{Result, VisibilityError};
use chrono::Duration;

/// Standard gravitational parameter of Earth (m^3/s^2)
pub const GM: f64 = 3.986e14;
/// Equatorial radius (m)
pub const EARTH_RADIUS_M: f64 = 6_378_137.0;
/// Smallest interval ever returned
pub const MIN_TIMESTEP_MS: i64 = 100;

const LEO_CEILING_KM: f64 = 200.0;
const MEO_CEILING_KM: f64 = 3578.0;

/// Share of the tile crossing time used as the step, by orbit regime
fn regime_fraction(altitude_km: f64) -> f64 {
    if altitude_km < LEO_CEILING_KM {
        0.01
    } else if altitude_km < MEO_CEILING_KM {
        0.05
    } else {
        0.10
    }
}

/// Fixed interval of `seconds`, rounded to the millisecond
pub fn step_from_seconds(seconds: f64) -> Result<Duration> {
    let ms = (seconds * 1000.0).round();
    if !(ms.is_finite() && ms >= 1.0 && ms < i64::MAX as f64) {
        return Err(VisibilityError::InvalidInput(format!(
            "scan step must be between 1ms and {}ms, got {}s",
            i64::MAX,
            seconds
        )));
    }
    Duration::try_milliseconds(ms as i64).ok_or_else(|| {
        VisibilityError::InvalidInput(format!("scan step of {}s is out of range", seconds))
    })
}

/// Interval that samples a tile of `tile_radius_m` finely enough to catch a
/// pass of a circular orbit at `altitude_km`. Never below [`MIN_TIMESTEP_MS`].
pub fn calculate_optimal_timestep(altitude_km: f64, tile_radius_m: f64) -> Result<Duration> {
    if !(altitude_km.is_finite() && altitude_km >= 0.0) {
        return Err(VisibilityError::InvalidInput(format!(
            "altitude must be non-negative, got {} km",
            altitude_km
        )));
    }
    if !(tile_radius_m.is_finite() && tile_radius_m > 0.0) {
        return Err(VisibilityError::InvalidInput(format!(
            "tile radius must be positive, got {} m",
            tile_radius_m
        )));
    }

    let velocity = (GM / (EARTH_RADIUS_M + altitude_km * 1000.0)).sqrt();
    let crossing_secs = tile_radius_m / velocity;
    let step_ms = (crossing_secs * regime_fraction(altitude_km) * 1000.0).round() as i64;

    Ok(Duration::milliseconds(step_ms.max(MIN_TIMESTEP_MS)))
}
