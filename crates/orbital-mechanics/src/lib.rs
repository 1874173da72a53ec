//! Orbital Mechanics Library
//!
//! The Orbit Propagator boundary of the tile visibility engine: TLE handling,
//! SGP4 propagation and TEME to geodetic transforms.
//!
//! The engine only consumes the [`Propagator`] contract. [`Sgp4Propagator`] is
//! the production implementation; tests swap in deterministic ground tracks.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum OrbitalError {
    #[error("Invalid TLE format: {0}")]
    InvalidTle(String),
    #[error("Propagation failed [{code}]: {message}")]
    PropagationFailed { code: &'static str, message: String },
    #[error("Invalid coordinates: {0}")]
    InvalidCoordinates(String),
}

impl OrbitalError {
    /// Stable error code, suitable for logs and cross-service payloads.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidTle(_) => "invalid_tle",
            Self::PropagationFailed { code, .. } => code,
            Self::InvalidCoordinates(_) => "invalid_coordinates",
        }
    }
}

pub type Result<T> = std::result::Result<T, OrbitalError>;

/// Raw two-line element set
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TwoLineElements {
    pub line1: String,
    pub line2: String,
}

impl TwoLineElements {
    pub fn new(line1: impl Into<String>, line2: impl Into<String>) -> Self {
        Self {
            line1: line1.into(),
            line2: line2.into(),
        }
    }

    /// NORAD catalog number from columns 3-7 of line 1
    pub fn norad_id(&self) -> Result<u32> {
        self.line1
            .get(2..7)
            .map(str::trim)
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| {
                OrbitalError::InvalidTle(format!("no catalog number in {:?}", self.line1))
            })
    }

    /// Mean motion in revolutions per day from columns 53-63 of line 2
    pub fn mean_motion_rev_per_day(&self) -> Result<f64> {
        self.line2
            .get(52..63)
            .map(str::trim)
            .and_then(|s| s.parse::<f64>().ok())
            .filter(|n| *n > 0.0)
            .ok_or_else(|| OrbitalError::InvalidTle(format!("no mean motion in {:?}", self.line2)))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Satellite {
    pub norad_id: u32,
    pub name: String,
    pub tle: TwoLineElements,
}

impl Satellite {
    pub fn new(norad_id: u32, name: impl Into<String>, tle: TwoLineElements) -> Self {
        Self {
            norad_id,
            name: name.into(),
            tle,
        }
    }

    /// Build a satellite whose catalog number is read from the TLE itself
    pub fn from_tle(name: Option<String>, line1: &str, line2: &str) -> Result<Self> {
        let tle = TwoLineElements::new(line1.trim_end(), line2.trim_end());
        let norad_id = tle.norad_id()?;
        Ok(Self {
            norad_id,
            name: name.unwrap_or_else(|| norad_id.to_string()),
            tle,
        })
    }

    pub fn ground_track(
        &self,
        propagator: &dyn Propagator,
        time: DateTime<Utc>,
    ) -> Result<GeodeticPosition> {
        propagator.propagate(&self.tle, time)
    }

    pub fn snapshot(
        &self,
        propagator: &dyn Propagator,
        time: DateTime<Utc>,
    ) -> Result<SatelliteSnapshot> {
        Ok(SatelliteSnapshot {
            norad_id: self.norad_id,
            timestamp: time,
            position: self.ground_track(propagator, time)?,
        })
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct StateVector {
    pub position_x: f64,
    pub position_y: f64,
    pub position_z: f64,
    pub velocity_x: f64,
    pub velocity_y: f64,
    pub velocity_z: f64,
    pub epoch: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct GeodeticPosition {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude_km: f64,
}

/// One propagated instant. Produced and consumed within a single scan step.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SatelliteSnapshot {
    pub norad_id: u32,
    pub timestamp: DateTime<Utc>,
    pub position: GeodeticPosition,
}

/// Orbit Propagator contract.
///
/// Implementations must be safe to call from several scan workers at once,
/// either by being stateless or by serializing internally. The engine never
/// holds a lock across a call.
pub trait Propagator: Send + Sync {
    /// Geodetic sub-point (degrees) and altitude (km) of the TLE at `at`
    fn propagate(&self, tle: &TwoLineElements, at: DateTime<Utc>) -> Result<GeodeticPosition>;

    /// Snapshots from `start` to `end` inclusive every `step`.
    /// The first failing instant aborts the range.
    fn propagate_range(
        &self,
        satellite: &Satellite,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        step: Duration,
    ) -> Result<Vec<SatelliteSnapshot>> {
        if step <= Duration::zero() {
            return Err(OrbitalError::InvalidCoordinates(format!(
                "propagation step must be positive, got {}ms",
                step.num_milliseconds()
            )));
        }

        let mut snapshots = Vec::new();
        let mut current = start;
        while current <= end {
            let position = self.propagate(&satellite.tle, current).map_err(|e| {
                OrbitalError::PropagationFailed {
                    code: e.code(),
                    message: format!("at {}: {}", current.to_rfc3339(), e),
                }
            })?;
            snapshots.push(SatelliteSnapshot {
                norad_id: satellite.norad_id,
                timestamp: current,
                position,
            });
            current = match current.checked_add_signed(step) {
                Some(next) => next,
                None => break,
            };
        }
        Ok(snapshots)
    }
}

/// SGP4 backed propagator. Stateless, so concurrent calls are safe.
#[derive(Debug, Default, Clone, Copy)]
pub struct Sgp4Propagator;

impl Sgp4Propagator {
    pub fn new() -> Self {
        Self
    }
}

impl Propagator for Sgp4Propagator {
    fn propagate(&self, tle: &TwoLineElements, at: DateTime<Utc>) -> Result<GeodeticPosition> {
        let state = propagation::sgp4_propagate(&tle.line1, &tle.line2, at)?;
        transforms::teme_to_geodetic(state.position_x, state.position_y, state.position_z, at)
    }
}

pub mod propagation {
    use super::*;

    pub fn sgp4_propagate(
        tle_line1: &str,
        tle_line2: &str,
        time: DateTime<Utc>,
    ) -> Result<StateVector> {
        let elements = sgp4::Elements::from_tle(
            None,
            tle_line1.as_bytes(),
            tle_line2.as_bytes(),
        ).map_err(|e| {
            debug!(error = ?e, "TLE rejected by sgp4");
            OrbitalError::InvalidTle(format!("{:?}", e))
        })?;

        let constants = sgp4::Constants::from_elements(&elements)
            .map_err(|e| OrbitalError::PropagationFailed {
                code: "elements_rejected",
                message: format!("{:?}", e),
            })?;

        let epoch_utc = DateTime::<Utc>::from_naive_utc_and_offset(elements.datetime, Utc);
        let minutes_since_epoch = minutes_since_epoch(time, epoch_utc);

        let prediction = constants.propagate(minutes_since_epoch)
            .map_err(|e| {
                debug!(error = ?e, minutes_since_epoch, "sgp4 propagation diverged");
                OrbitalError::PropagationFailed {
                    code: "sgp4_diverged",
                    message: format!("{:?}", e),
                }
            })?;

        Ok(StateVector {
            position_x: prediction.position[0],
            position_y: prediction.position[1],
            position_z: prediction.position[2],
            velocity_x: prediction.velocity[0],
            velocity_y: prediction.velocity[1],
            velocity_z: prediction.velocity[2],
            epoch: time,
        })
    }

    pub fn minutes_since_epoch(time: DateTime<Utc>, epoch: DateTime<Utc>) -> f64 {
        let delta = time.signed_duration_since(epoch);
        delta.num_milliseconds() as f64 / 60_000.0
    }
}

pub mod transforms {
    use super::*;
    use std::f64::consts::TAU;

    pub const EARTH_RADIUS_KM: f64 = 6378.137;
    const EARTH_FLATTENING: f64 = 1.0 / 298.257223563;
    const UNIX_EPOCH_JD: f64 = 2440587.5;
    const J2000_JD: f64 = 2451545.0;
    const SECONDS_PER_DAY: f64 = 86400.0;

    pub fn julian_date(t: DateTime<Utc>) -> f64 {
        t.timestamp_millis() as f64 / 1000.0 / SECONDS_PER_DAY + UNIX_EPOCH_JD
    }

    /// Greenwich Mean Sidereal Time (IAU 1982), radians in [0, 2π).
    /// UT1 is taken as UTC.
    pub fn gmst_rad(t: DateTime<Utc>) -> f64 {
        let t_cent = (julian_date(t) - J2000_JD) / 36525.0;
        let gmst_sec = 67310.54841
            + (876600.0 * 3600.0 + 8640184.812866) * t_cent
            + 0.093104 * t_cent * t_cent
            - 6.2e-6 * t_cent * t_cent * t_cent;

        gmst_sec.rem_euclid(SECONDS_PER_DAY) * (TAU / SECONDS_PER_DAY)
    }

    /// Rotate a TEME position into the Earth-fixed frame
    pub fn teme_to_ecef(x: f64, y: f64, z: f64, gmst: f64) -> (f64, f64, f64) {
        let (s, c) = gmst.sin_cos();
        (c * x + s * y, -s * x + c * y, z)
    }

    /// WGS84 geodetic coordinates from an Earth-fixed position (km)
    pub fn ecef_to_geodetic(x: f64, y: f64, z: f64) -> Result<GeodeticPosition> {
        if !(x.is_finite() && y.is_finite() && z.is_finite()) {
            return Err(OrbitalError::InvalidCoordinates(format!(
                "non-finite position ({}, {}, {})",
                x, y, z
            )));
        }

        let e2 = EARTH_FLATTENING * (2.0 - EARTH_FLATTENING);
        let r = (x * x + y * y).sqrt();
        let longitude = y.atan2(x);

        let mut latitude = z.atan2(r);
        let mut n = EARTH_RADIUS_KM;
        for _ in 0..5 {
            let sin_lat = latitude.sin();
            n = EARTH_RADIUS_KM / (1.0 - e2 * sin_lat * sin_lat).sqrt();
            latitude = (z + n * e2 * sin_lat).atan2(r);
        }

        let altitude_km = if latitude.cos().abs() > 1e-10 {
            r / latitude.cos() - n
        } else {
            z.abs() - n * (1.0 - e2)
        };

        Ok(GeodeticPosition {
            latitude: latitude.to_degrees(),
            longitude: longitude.to_degrees(),
            altitude_km,
        })
    }

    pub fn teme_to_geodetic(x: f64, y: f64, z: f64, at: DateTime<Utc>) -> Result<GeodeticPosition> {
        let (xe, ye, ze) = teme_to_ecef(x, y, z, gmst_rad(at));
        ecef_to_geodetic(xe, ye, ze)
    }

    pub fn geodetic_to_ecef(pos: &GeodeticPosition) -> Result<(f64, f64, f64)> {
        if !(-90.0..=90.0).contains(&pos.latitude) || !(-180.0..=180.0).contains(&pos.longitude) {
            return Err(OrbitalError::InvalidCoordinates(format!(
                "lat {} / lon {} out of range",
                pos.latitude, pos.longitude
            )));
        }

        let lat_rad = pos.latitude.to_radians();
        let lon_rad = pos.longitude.to_radians();
        let alt = pos.altitude_km;

        let e2 = EARTH_FLATTENING * (2.0 - EARTH_FLATTENING);
        let n = EARTH_RADIUS_KM / (1.0 - e2 * lat_rad.sin().powi(2)).sqrt();

        let x = (n + alt) * lat_rad.cos() * lon_rad.cos();
        let y = (n + alt) * lat_rad.cos() * lon_rad.sin();
        let z = (n * (1.0 - e2) + alt) * lat_rad.sin();

        Ok((x, y, z))
    }
}

pub mod orbit {
    use super::*;

    /// Mean Earth radius used by the visibility geometry (km)
    pub const MEAN_EARTH_RADIUS_KM: f64 = 6371.0;
    /// Earth gravitational parameter (km³/s²)
    const MU_KM3_S2: f64 = 398600.4418;

    /// Mean orbital radius from apogee and perigee altitudes (km)
    pub fn average_orbit_radius_km(apogee_km: f64, perigee_km: f64) -> f64 {
        let apogee = apogee_km + MEAN_EARTH_RADIUS_KM;
        let perigee = perigee_km + MEAN_EARTH_RADIUS_KM;
        (apogee + perigee) / 2.0
    }

    /// Mean altitude (km) implied by the TLE mean motion
    pub fn mean_altitude_km(tle: &TwoLineElements) -> Result<f64> {
        let n_rad_s = tle.mean_motion_rev_per_day()? * std::f64::consts::TAU / 86400.0;
        let semi_major_km = (MU_KM3_S2 / (n_rad_s * n_rad_s)).cbrt();
        Ok(semi_major_km - MEAN_EARTH_RADIUS_KM)
    }
}
