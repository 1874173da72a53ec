//! Geometry Primitives
//!
//! Pure functions over degrees, spherical Cartesian vectors and great-circle
//! distances. The Earth is a 6371 km sphere here.

use crate::constants::{EARTH_RADIUS_KM, EPSILON};
use crate::{GridError, Result};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

const PI_DIVIDE_BY_180: f64 = PI / 180.0;
const I180_DIVIDE_BY_PI: f64 = 180.0 / PI;

pub fn degrees_to_radians(degrees: f64) -> f64 {
    degrees * PI_DIVIDE_BY_180
}

pub fn radians_to_degrees(radians: f64) -> f64 {
    radians * I180_DIVIDE_BY_PI
}

/// A single angular value in degrees
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Coordinate(pub f64);

impl Coordinate {
    pub fn from_radians(radians: f64) -> Self {
        Self(radians_to_degrees(radians))
    }

    pub fn degrees(self) -> f64 {
        self.0
    }

    pub fn radians(self) -> f64 {
        degrees_to_radians(self.0)
    }
}

/// Latitude/longitude pair in degrees.
///
/// [`GeoPoint::new`] trusts the caller to have normalized the values;
/// [`GeoPoint::try_new`] checks the ranges.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    pub fn try_new(latitude: f64, longitude: f64) -> Result<Self> {
        let point = Self::new(latitude, longitude);
        if point.is_valid() {
            Ok(point)
        } else {
            Err(GridError::InvalidCoordinate {
                lat: latitude,
                lon: longitude,
            })
        }
    }

    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.latitude) && (-180.0..=180.0).contains(&self.longitude)
    }

    pub fn lat(&self) -> Coordinate {
        Coordinate(self.latitude)
    }

    pub fn lon(&self) -> Coordinate {
        Coordinate(self.longitude)
    }

    pub fn distance_km(&self, other: &GeoPoint) -> f64 {
        haversine_distance(self.latitude, self.longitude, other.latitude, other.longitude)
    }
}

/// Satellite sub-point with altitude
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint3D {
    pub point: GeoPoint,
    pub altitude_km: f64,
}

impl GeoPoint3D {
    pub const fn new(latitude: f64, longitude: f64, altitude_km: f64) -> Self {
        Self {
            point: GeoPoint::new(latitude, longitude),
            altitude_km,
        }
    }
}

/// Spherical to Cartesian (km), radial distance = Earth radius + altitude
pub fn lat_lon_to_cartesian(latitude: f64, longitude: f64, altitude_km: f64) -> Vector3<f64> {
    let lat_rad = degrees_to_radians(latitude);
    let lon_rad = degrees_to_radians(longitude);
    let r = EARTH_RADIUS_KM + altitude_km;

    Vector3::new(
        r * lat_rad.cos() * lon_rad.cos(),
        r * lat_rad.cos() * lon_rad.sin(),
        r * lat_rad.sin(),
    )
}

/// Unit vector. The zero vector has no direction and yields NaN components.
pub fn normalize(v: Vector3<f64>) -> Vector3<f64> {
    v / v.norm()
}

pub fn dot_product(a: &Vector3<f64>, b: &Vector3<f64>) -> f64 {
    a.dot(b)
}

/// Great-circle distance (km) by the haversine formula
pub fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = degrees_to_radians(lat2 - lat1);
    let d_lon = degrees_to_radians(lon2 - lon1);
    let lat1_rad = degrees_to_radians(lat1);
    let lat2_rad = degrees_to_radians(lat2);

    let a = (d_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_KM * c
}

/// Elevation (degrees, in [0, 90]) of a satellite above the local horizon of
/// `ground_point`.
///
/// The angle between the line of sight and the ground-to-centre direction is
/// 180° at zenith and 90° on the horizon; elevation is that angle less 90°.
/// Anything below the horizon reports 0.
pub fn integrated_elevation(
    satellite_pos: GeoPoint,
    satellite_alt_km: f64,
    ground_point: GeoPoint,
) -> f64 {
    let ground = lat_lon_to_cartesian(ground_point.latitude, ground_point.longitude, 0.0);
    let satellite = lat_lon_to_cartesian(
        satellite_pos.latitude,
        satellite_pos.longitude,
        satellite_alt_km,
    );

    let line_of_sight = satellite - ground;
    if line_of_sight.norm() < EPSILON {
        // satellite sits on the ground point itself
        return 90.0;
    }

    let to_center = normalize(-ground);
    let line_of_sight = normalize(line_of_sight);

    // zenith: line of sight is exactly opposite the centre direction
    let up = -to_center;
    if (line_of_sight - up).iter().all(|d| d.abs() < EPSILON) {
        return 90.0;
    }

    let cos_angle = dot_product(&line_of_sight, &to_center).clamp(-1.0, 1.0);
    let nadir_angle = radians_to_degrees(cos_angle.acos());

    (nadir_angle - 90.0).clamp(0.0, 90.0)
}

/// Radius threshold test against the tile centre.
///
/// Not a point-in-polygon test: the tile boundary is ignored and altitude
/// plays no part. Inclusive at exactly `tile_radius_km`.
pub fn intersects(
    tile_center: GeoPoint,
    satellite_pos: GeoPoint,
    tile_radius_km: f64,
    _altitude_km: f64,
) -> bool {
    let center_distance = satellite_pos.distance_km(&tile_center);
    center_distance <= tile_radius_km
}

/// Ray casting containment of `point` in a closed lat/lon ring
pub fn point_in_polygon(point: GeoPoint, polygon: &[GeoPoint]) -> bool {
    let n = polygon.len();
    if n < 3 {
        return false;
    }

    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let (pi, pj) = (polygon[i], polygon[j]);
        if (pi.latitude > point.latitude) != (pj.latitude > point.latitude) {
            let lon_at_lat = (pj.longitude - pi.longitude) * (point.latitude - pi.latitude)
                / (pj.latitude - pi.latitude)
                + pi.longitude;
            if point.longitude < lon_at_lat {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

/// Point reached from `origin` after `distance_km` along the great circle
/// leaving at `bearing_rad` (clockwise from north). Longitude wrapped to
/// [-180, 180], latitude kept in [-90, 90].
pub fn destination_point(origin: GeoPoint, bearing_rad: f64, distance_km: f64) -> GeoPoint {
    let delta = distance_km / EARTH_RADIUS_KM;
    let lat1 = degrees_to_radians(origin.latitude);
    let lon1 = degrees_to_radians(origin.longitude);

    let sin_lat2 = (lat1.sin() * delta.cos() + lat1.cos() * delta.sin() * bearing_rad.cos())
        .clamp(-1.0, 1.0);
    let lat2 = sin_lat2.asin();
    let lon2 = lon1
        + (bearing_rad.sin() * delta.sin() * lat1.cos()).atan2(delta.cos() - lat1.sin() * sin_lat2);

    GeoPoint::new(
        radians_to_degrees(lat2).clamp(-90.0, 90.0),
        wrap_longitude(radians_to_degrees(lon2)),
    )
}

/// Wrap any longitude into [-180, 180]
pub fn wrap_longitude(longitude: f64) -> f64 {
    if (-180.0..=180.0).contains(&longitude) {
        return longitude;
    }
    let wrapped = (longitude + 180.0).rem_euclid(360.0) - 180.0;
    if wrapped == -180.0 && longitude > 0.0 {
        180.0
    } else {
        wrapped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fuzz_harness::prelude::*;

    #[test]
    fn test_haversine_known_distances() {
        let cases = [
            (0.0, 0.0, 0.0, 0.0, 0.0),
            (0.0, 0.0, 0.0, 90.0, 10007.54),
            (0.0, 0.0, 90.0, 0.0, 10007.54),
            (52.2296756, 21.0122287, 52.406374, 16.9251681, 278.546),
            (90.0, 0.0, -90.0, 0.0, 20015.09),
        ];
        for (lat1, lon1, lat2, lon2, expected) in cases {
            let d = haversine_distance(lat1, lon1, lat2, lon2);
            assert!((d - expected).abs() < 1.0, "{} != {}", d, expected);
        }
    }

    #[test]
    fn test_cartesian_radius() {
        let v = lat_lon_to_cartesian(45.0, 45.0, 420.0);
        assert!((v.norm() - (EARTH_RADIUS_KM + 420.0)).abs() < 1e-9);

        let equator = lat_lon_to_cartesian(0.0, 0.0, 0.0);
        assert!((equator.x - EARTH_RADIUS_KM).abs() < 1e-9);
        assert!(equator.y.abs() < 1e-9 && equator.z.abs() < 1e-9);
    }

    #[test]
    fn test_normalize_and_dot() {
        let v = normalize(Vector3::new(3.0, 0.0, 4.0));
        assert!((v.norm() - 1.0).abs() < 1e-12);
        assert!((dot_product(&v, &Vector3::new(0.0, 0.0, 1.0)) - 0.8).abs() < 1e-12);

        // zero vector has no direction
        assert!(normalize(Vector3::zeros()).x.is_nan());
    }

    #[test]
    fn test_elevation_directly_overhead() {
        let p = GeoPoint::new(0.0, 0.0);
        assert_eq!(integrated_elevation(p, 500.0, p), 90.0);

        let p = GeoPoint::new(-33.9, 151.2);
        assert_eq!(integrated_elevation(p, 35786.0, p), 90.0);
    }

    #[test]
    fn test_elevation_drops_with_distance() {
        let ground = GeoPoint::new(10.0, 20.0);
        let near = integrated_elevation(GeoPoint::new(10.0, 18.0), 500.0, ground);
        let far = integrated_elevation(GeoPoint::new(10.0, 10.0), 500.0, ground);
        assert!(near > far, "{} <= {}", near, far);
        assert!(near > 0.0 && near < 90.0);
    }

    #[test]
    fn test_elevation_below_horizon_is_zero() {
        let elevation =
            integrated_elevation(GeoPoint::new(45.0, 45.0), 1000.0, GeoPoint::new(-45.0, -45.0));
        assert_eq!(elevation, 0.0);
    }

    #[test]
    fn test_intersects_boundary_inclusive() {
        let center = GeoPoint::new(0.0, 0.0);
        let sat = GeoPoint::new(0.5, 0.5);
        let exact = sat.distance_km(&center);

        assert!(intersects(center, sat, exact, 420.0));
        assert!(!intersects(center, sat, exact - 1e-9, 420.0));
        assert!(intersects(center, center, 1.0, 0.0));
        assert!(!intersects(GeoPoint::new(0.5, 0.5), GeoPoint::new(2.0, 2.0), 1.0, 0.0));
    }

    #[test]
    fn test_point_in_polygon() {
        let square = [
            GeoPoint::new(0.0, 0.0),
            GeoPoint::new(0.0, 10.0),
            GeoPoint::new(10.0, 10.0),
            GeoPoint::new(10.0, 0.0),
        ];
        assert!(point_in_polygon(GeoPoint::new(5.0, 5.0), &square));
        assert!(!point_in_polygon(GeoPoint::new(15.0, 5.0), &square));
        assert!(!point_in_polygon(GeoPoint::new(5.0, -1.0), &square));
        assert!(!point_in_polygon(GeoPoint::new(5.0, 5.0), &square[..2]));
    }

    #[test]
    fn test_destination_point_distance() {
        let origin = GeoPoint::new(40.7128, -74.0060);
        let dest = destination_point(origin, 1.0, 250.0);
        assert!((dest.distance_km(&origin) - 250.0).abs() < 1e-6);
    }

    #[test]
    fn test_wrap_longitude() {
        assert_eq!(wrap_longitude(190.0), -170.0);
        assert_eq!(wrap_longitude(-190.0), 170.0);
        assert_eq!(wrap_longitude(180.0), 180.0);
        assert_eq!(wrap_longitude(540.0), 180.0);
        assert_eq!(wrap_longitude(12.5), 12.5);
    }

    #[test]
    fn test_try_new_rejects_out_of_range() {
        assert!(GeoPoint::try_new(91.0, 0.0).is_err());
        assert!(GeoPoint::try_new(0.0, -180.5).is_err());
        assert!(GeoPoint::try_new(-90.0, 180.0).is_ok());
    }

    proptest! {
        #[test]
        fn test_try_new_rejects_any_out_of_range(
            bad in out_of_range_deg(),
            lon in longitude_deg(),
        ) {
            prop_assert!(GeoPoint::try_new(bad, lon).is_err());
            prop_assert!(GeoPoint::try_new(0.0, bad).is_err());
            prop_assert!(!GeoPoint::new(bad, lon).is_valid());
        }

        #[test]
        fn test_degree_radian_roundtrip(deg in latitude_deg()) {
            let back = Coordinate::from_radians(Coordinate(deg).radians()).degrees();
            prop_assert!((back - deg).abs() < 1e-9);
        }

        #[test]
        fn test_haversine_zero_for_same_point(p in geo_point()) {
            prop_assert_eq!(haversine_distance(p.0, p.1, p.0, p.1), 0.0);
        }

        #[test]
        fn test_haversine_symmetric(a in geo_point(), b in geo_point()) {
            let ab = haversine_distance(a.0, a.1, b.0, b.1);
            let ba = haversine_distance(b.0, b.1, a.0, a.1);
            prop_assert!((ab - ba).abs() < 1e-9);
        }

        #[test]
        fn test_elevation_in_range(
            sat in geo_point(),
            alt in altitude_km(),
            ground in geo_point(),
        ) {
            let el = integrated_elevation(
                GeoPoint::new(sat.0, sat.1),
                alt,
                GeoPoint::new(ground.0, ground.1),
            );
            prop_assert!((0.0..=90.0).contains(&el));
        }

        #[test]
        fn test_overhead_is_ninety(p in geo_point(), alt in altitude_km()) {
            let point = GeoPoint::new(p.0, p.1);
            prop_assert_eq!(integrated_elevation(point, alt, point), 90.0);
        }
    }
}
