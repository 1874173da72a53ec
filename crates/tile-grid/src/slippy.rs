//! Web-Mercator slippy tile addressing.
//!
//! Tile edge length halves with each zoom increment, starting from the whole
//! equatorial circumference at zoom 0.

use crate::constants::{EARTH_CIRCUMFERENCE_M, MAX_MERCATOR_LATITUDE};
use crate::geometry::{degrees_to_radians, radians_to_degrees, GeoPoint};
use crate::{validate_radius_m, Result};
use std::f64::consts::PI;

pub const MIN_ZOOM_LEVEL: u8 = 1;
pub const MAX_ZOOM_LEVEL: u8 = 21;

/// Number of tiles along one axis at `zoom`
pub fn tiles_per_axis(zoom: u8) -> u32 {
    1u32 << zoom
}

/// Half the slippy tile edge at `zoom`, in metres
pub fn tile_radius_for_zoom(zoom: u8) -> f64 {
    EARTH_CIRCUMFERENCE_M / f64::from(tiles_per_axis(zoom)) / 2.0
}

/// Smallest zoom whose half tile edge fits within `radius_m`, clamped to
/// [`MIN_ZOOM_LEVEL`, `MAX_ZOOM_LEVEL`].
///
/// A radius smaller than the finest tile resolves to the finest zoom.
pub fn zoom_level_for_radius(radius_m: f64) -> Result<u8> {
    let radius_m = validate_radius_m(radius_m)?;

    let zoom = (0..=MAX_ZOOM_LEVEL)
        .find(|&z| tile_radius_for_zoom(z) <= radius_m)
        .unwrap_or(MAX_ZOOM_LEVEL);

    Ok(zoom.clamp(MIN_ZOOM_LEVEL, MAX_ZOOM_LEVEL))
}

/// North-west corner of tile (x, y). Fractional tile coordinates address
/// points inside a tile.
pub fn tile_xy_to_lat_lon(x: f64, y: f64, zoom: u8) -> GeoPoint {
    let n = f64::from(tiles_per_axis(zoom));
    let longitude = x / n * 360.0 - 180.0;
    let latitude = radians_to_degrees((PI * (1.0 - 2.0 * y / n)).sinh().atan());
    GeoPoint::new(latitude, longitude)
}

/// Geometric centre of tile (x, y)
pub fn tile_center(x: u32, y: u32, zoom: u8) -> GeoPoint {
    tile_xy_to_lat_lon(f64::from(x) + 0.5, f64::from(y) + 0.5, zoom)
}

/// Tile containing (lat, lon). Latitude is clamped to the Mercator range and
/// indices to the tile matrix, so poles and the antimeridian map to edge tiles.
pub fn lat_lon_to_tile_xy(latitude: f64, longitude: f64, zoom: u8) -> (u32, u32) {
    let n = f64::from(tiles_per_axis(zoom));
    let lat_rad = degrees_to_radians(latitude.clamp(-MAX_MERCATOR_LATITUDE, MAX_MERCATOR_LATITUDE));

    let x = ((longitude + 180.0) / 360.0 * n).floor();
    let y = ((1.0 - (lat_rad.tan() + 1.0 / lat_rad.cos()).ln() / PI) / 2.0 * n).floor();

    let max_index = n - 1.0;
    (x.clamp(0.0, max_index) as u32, y.clamp(0.0, max_index) as u32)
}
