//! Geo and orbital generators for property-based testing

use chrono::{DateTime, Duration, TimeZone, Utc};
use proptest::prelude::*;

// ============================================================================
// Angle Generators
// ============================================================================

/// Latitude in degrees [-90, 90]
pub fn latitude_deg() -> impl Strategy<Value = f64> {
    -90.0f64..=90.0
}

/// Longitude in degrees [-180, 180]
pub fn longitude_deg() -> impl Strategy<Value = f64> {
    -180.0f64..=180.0
}

/// Latitude inside the Web-Mercator band
pub fn mercator_latitude_deg() -> impl Strategy<Value = f64> {
    -85.0f64..=85.0
}

/// (latitude, longitude) in degrees
pub fn geo_point() -> impl Strategy<Value = (f64, f64)> {
    (latitude_deg(), longitude_deg())
}

/// Angle that is out of range for both latitude and longitude
pub fn out_of_range_deg() -> impl Strategy<Value = f64> {
    prop_oneof![-1000.0f64..-180.001, 180.001f64..1000.0]
}

// ============================================================================
// Orbital Domain Generators
// ============================================================================

/// Altitude in km (LEO to GEO range)
pub fn altitude_km() -> impl Strategy<Value = f64> {
    160.0f64..=42_000.0
}

/// Low orbit altitude in km
pub fn altitude_leo() -> impl Strategy<Value = f64> {
    160.0f64..2_000.0
}

/// Geostationary-like altitude in km
pub fn altitude_geo() -> impl Strategy<Value = f64> {
    35_000.0f64..=36_500.0
}

/// NORAD ID (5-digit range)
pub fn norad_id() -> impl Strategy<Value = u32> {
    10000u32..99999u32
}

// ============================================================================
// Tile Generators
// ============================================================================

/// Tile radius in metres, street block to continent
pub fn radius_m() -> impl Strategy<Value = f64> {
    100.0f64..=2_000_000.0
}

/// Polygon face count
pub fn face_count() -> impl Strategy<Value = usize> {
    3usize..=12
}

/// Zoom level for slippy addressing
pub fn zoom_level() -> impl Strategy<Value = u8> {
    1u8..=21
}

// ============================================================================
// Time Generators
// ============================================================================

/// Instant within a year after 2020-01-01, at whole-second resolution
pub fn timestamp_2020() -> impl Strategy<Value = DateTime<Utc>> {
    (0i64..31_536_000).prop_map(|secs| {
        Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0)
            .single()
            .unwrap_or_default()
            + Duration::seconds(secs)
    })
}

/// Fixed scan step in seconds
pub fn step_seconds() -> impl Strategy<Value = f64> {
    0.5f64..=300.0
}
