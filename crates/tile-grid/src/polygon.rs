//! Regular N-gon tiles.

use crate::geometry::{destination_point, point_in_polygon, GeoPoint};
use crate::quadkey::Quadkey;
use crate::{validate_face_count, validate_radius_m, Result};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// One coverage cell. Immutable once built by [`Tile::new`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tile {
    pub quadkey: Quadkey,
    pub center: GeoPoint,
    pub radius_m: f64,
    pub zoom: u8,
    pub face_count: usize,
    pub boundaries: Vec<GeoPoint>,
}

/// One side of a tile boundary
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub start: GeoPoint,
    pub end: GeoPoint,
}

impl Tile {
    pub fn new(face_count: usize, center: GeoPoint, zoom: u8, radius_m: f64) -> Result<Self> {
        let face_count = validate_face_count(face_count)?;
        let radius_m = validate_radius_m(radius_m)?;
        let center = GeoPoint::try_new(center.latitude, center.longitude)?;

        Ok(Self {
            quadkey: Quadkey::new(center.latitude, center.longitude, zoom),
            center,
            radius_m,
            zoom,
            face_count,
            boundaries: generate_boundaries(face_count, center, radius_m / 1000.0),
        })
    }

    pub fn id(&self) -> String {
        self.quadkey.key()
    }

    pub fn radius_km(&self) -> f64 {
        self.radius_m / 1000.0
    }

    /// Closed boundary as consecutive edges, last vertex back to the first
    pub fn edges(&self) -> Vec<Edge> {
        let n = self.boundaries.len();
        (0..n)
            .map(|i| Edge {
                start: self.boundaries[i],
                end: self.boundaries[(i + 1) % n],
            })
            .collect()
    }

    pub fn contains(&self, point: GeoPoint) -> bool {
        point_in_polygon(point, &self.boundaries)
    }
}

/// `face_count` points evenly spaced by bearing around `center`, each at
/// great-circle distance `radius_km`. The first vertex is due north.
pub fn generate_boundaries(face_count: usize, center: GeoPoint, radius_km: f64) -> Vec<GeoPoint> {
    let step = 2.0 * PI / face_count as f64;
    (0..face_count)
        .map(|i| destination_point(center, step * i as f64, radius_km))
        .collect()
}
