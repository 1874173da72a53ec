//! Quadkey tile identity.
//!
//! The string key is `"<zoom>-<lat>-<lon>"` with six decimal places. It is
//! used as a persisted identifier, so the format must not change.

use crate::geometry::{haversine_distance, GeoPoint};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Quadkey {
    pub level: u8,
    pub latitude: f64,
    pub longitude: f64,
}

impl Quadkey {
    pub fn new(latitude: f64, longitude: f64, level: u8) -> Self {
        // -0.0 and 0.0 must share a key
        Self {
            level,
            latitude: latitude + 0.0,
            longitude: longitude + 0.0,
        }
    }

    pub fn point(&self) -> GeoPoint {
        GeoPoint::new(self.latitude, self.longitude)
    }

    pub fn key(&self) -> String {
        format!("{}-{:.6}-{:.6}", self.level, self.latitude, self.longitude)
    }

    /// Great-circle distance (km) from this quadkey's point
    pub fn distance_to(&self, point: GeoPoint) -> f64 {
        haversine_distance(self.latitude, self.longitude, point.latitude, point.longitude)
    }
}

impl fmt::Display for Quadkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

// Equality follows the key so that equal quadkeys hash identically.
impl PartialEq for Quadkey {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Quadkey {}

impl Hash for Quadkey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_key_format() {
        assert_eq!(Quadkey::new(12.5, -45.25, 7).key(), "7-12.500000--45.250000");
        assert_eq!(Quadkey::new(0.0, 0.0, 1).to_string(), "1-0.000000-0.000000");
    }

    #[test]
    fn test_negative_zero_shares_key() {
        let a = Quadkey::new(-0.0, -0.0, 3);
        let b = Quadkey::new(0.0, 0.0, 3);
        assert_eq!(a.key(), b.key());
        assert_eq!(a, b);
    }

    #[test]
    fn test_equality_and_hash() {
        let mut set = HashSet::new();
        set.insert(Quadkey::new(10.0, 20.0, 5));
        set.insert(Quadkey::new(10.0, 20.0, 5));
        set.insert(Quadkey::new(10.0, 20.0, 6));
        set.insert(Quadkey::new(10.000001, 20.0, 5));
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn test_distance_to() {
        let q = Quadkey::new(0.0, 0.0, 4);
        assert_eq!(q.distance_to(GeoPoint::new(0.0, 0.0)), 0.0);
        assert!((q.distance_to(GeoPoint::new(0.0, 90.0)) - 10007.54).abs() < 0.01);
    }
}
