//! Tile Grid Library
//!
//! Geodetic primitives and the quadkey-indexed tiling of the globe used by the
//! visibility engine.
//!
//! # Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`geometry`] | angle conversion, Cartesian transform, haversine, elevation, intersects |
//! | [`slippy`] | Web-Mercator slippy tile addressing and zoom selection |
//! | [`quadkey`] | tile identity and its stable string key |
//! | [`polygon`] | regular N-gon tiles |
//! | [`grid`] | whole-globe grid generation and lookups |
//!
//! All geometry assumes a spherical Earth of radius 6371 km. That is an
//! approximation good enough for visibility, not geodetic grade.

use thiserror::Error;

pub mod geometry;
pub mod grid;
pub mod polygon;
pub mod quadkey;
pub mod slippy;

pub use geometry::{
    haversine_distance, integrated_elevation, intersects, point_in_polygon, Coordinate, GeoPoint,
    GeoPoint3D,
};
pub use grid::{generate_all_tiles_for_radius, tiles_around, TileGrid};
pub use polygon::{Edge, Tile};
pub use quadkey::Quadkey;
pub use slippy::{zoom_level_for_radius, MAX_ZOOM_LEVEL, MIN_ZOOM_LEVEL};

/// Earth constants
pub mod constants {
    /// Mean Earth radius (km)
    pub const EARTH_RADIUS_KM: f64 = 6371.0;
    /// Equatorial circumference used by the slippy tile scale (m)
    pub const EARTH_CIRCUMFERENCE_M: f64 = 40_075_016.686;
    /// Direct-overhead tolerance on unit vectors
    pub const EPSILON: f64 = 1e-6;
    /// Web-Mercator latitude limit (degrees)
    pub const MAX_MERCATOR_LATITUDE: f64 = 85.05112878;
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GridError {
    #[error("Invalid tile radius: {0} m (must be finite, > 0 and <= Earth circumference)")]
    InvalidRadius(f64),
    #[error("Invalid face count: {0} (a tile polygon needs at least 3 faces)")]
    InvalidFaceCount(usize),
    #[error("Invalid coordinate: lat {lat}, lon {lon}")]
    InvalidCoordinate { lat: f64, lon: f64 },
}

pub type Result<T> = std::result::Result<T, GridError>;

/// Check a tile radius (metres) before any zoom arithmetic
pub fn validate_radius_m(radius_m: f64) -> Result<f64> {
    if radius_m.is_finite() && radius_m > 0.0 && radius_m <= constants::EARTH_CIRCUMFERENCE_M {
        Ok(radius_m)
    } else {
        Err(GridError::InvalidRadius(radius_m))
    }
}

pub fn validate_face_count(face_count: usize) -> Result<usize> {
    if face_count >= 3 {
        Ok(face_count)
    } else {
        Err(GridError::InvalidFaceCount(face_count))
    }
}
