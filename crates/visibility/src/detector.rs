//! Visibility Window Detector
//!
//! Time-stepped scan of one (satellite, tile) pair. Each step propagates the
//! satellite, tests the sub-point against the tile and drives a two-state
//! machine:
//!
//! ```text
//!   idle ──inside──▶ tracking ──outside──▶ idle   (window closed, LOS = t)
//!                       │
//!                       └──end of range──▶ window left open (LOS unset)
//! ```
//!
//! AOS is the first instant found inside, the running peak elevation starts
//! from the elevation at AOS. Every scan owns its own state.

use crate::cancel::CancelToken;
use crate::config::{Containment, EngineConfig, TimestepPolicy};
use crate::timestep::{calculate_optimal_timestep, step_from_seconds};
use crate::{AosResult, Result, VisibilityError, VisibilityWindow};
use chrono::{DateTime, Duration, Utc};
use orbital_mechanics::{Propagator, Satellite};
use std::ops::ControlFlow;
use std::sync::Arc;
use tile_grid::{integrated_elevation, intersects, GeoPoint, Tile};
use tracing::{debug, info, trace};

/// Counters for one completed scan
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScanSummary {
    pub steps: u64,
    pub windows: usize,
    pub step: Duration,
}

#[derive(Clone)]
pub struct VisibilityScanner {
    propagator: Arc<dyn Propagator>,
    timestep: TimestepPolicy,
    containment: Containment,
}

impl VisibilityScanner {
    pub fn new(propagator: Arc<dyn Propagator>, config: &EngineConfig) -> Self {
        Self::with_policy(propagator, config.timestep, config.containment)
    }

    pub fn with_policy(
        propagator: Arc<dyn Propagator>,
        timestep: TimestepPolicy,
        containment: Containment,
    ) -> Self {
        Self {
            propagator,
            timestep,
            containment,
        }
    }

    pub fn propagator(&self) -> &Arc<dyn Propagator> {
        &self.propagator
    }

    /// Scan interval for this pair. A derived step uses the altitude at `start`.
    pub fn resolve_timestep(
        &self,
        satellite: &Satellite,
        tile: &Tile,
        start: DateTime<Utc>,
    ) -> Result<Duration> {
        let step = match self.timestep {
            TimestepPolicy::Fixed { seconds } => step_from_seconds(seconds)?,
            TimestepPolicy::Derived => {
                let position = self.propagate(satellite, start)?;
                calculate_optimal_timestep(position.altitude_km, tile.radius_m)?
            }
        };

        if step <= Duration::zero() {
            return Err(VisibilityError::InvalidInput(format!(
                "scan step must be positive, got {}ms",
                step.num_milliseconds()
            )));
        }
        Ok(step)
    }

    /// Whether a sub-point counts as over the tile
    pub fn is_over(&self, tile: &Tile, sub_point: GeoPoint, altitude_km: f64) -> bool {
        match self.containment {
            Containment::RadiusThreshold => {
                intersects(tile.center, sub_point, tile.radius_km(), altitude_km)
            }
            Containment::Polygon => tile.contains(sub_point),
        }
    }

    /// Full scan of `[start, end]`, handing each window to `on_window` as it
    /// completes. Windows emitted before a failure or cancellation stay valid.
    pub fn scan(
        &self,
        satellite: &Satellite,
        tile: &Tile,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        cancel: &CancelToken,
        mut on_window: impl FnMut(VisibilityWindow),
    ) -> Result<ScanSummary> {
        self.run(satellite, tile, start, end, cancel, &mut |window| {
            on_window(window);
            ControlFlow::Continue(())
        })
    }

    /// Every AOS/LOS/peak triple for the pair over `[start, end]`
    pub fn compute_visibility_window(
        &self,
        satellite: &Satellite,
        tile: &Tile,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<VisibilityWindow>> {
        let mut windows = Vec::new();
        self.scan(satellite, tile, start, end, &CancelToken::new(), |w| windows.push(w))?;
        Ok(windows)
    }

    /// First acquisition and the peak elevation of that pass
    pub fn compute_aos(
        &self,
        satellite: &Satellite,
        tile: &Tile,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<AosResult> {
        let mut first = AosResult::default();
        self.run(satellite, tile, start, end, &CancelToken::new(), &mut |window| {
            first = AosResult {
                aos: Some(window.aos),
                max_elevation_deg: window.max_elevation_deg,
            };
            ControlFlow::Break(())
        })?;
        Ok(first)
    }

    fn propagate(
        &self,
        satellite: &Satellite,
        at: DateTime<Utc>,
    ) -> Result<orbital_mechanics::GeodeticPosition> {
        self.propagator
            .propagate(&satellite.tle, at)
            .map_err(|source| VisibilityError::PropagationFailure {
                satellite_id: satellite.norad_id,
                at,
                source,
            })
    }

    fn run(
        &self,
        satellite: &Satellite,
        tile: &Tile,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        cancel: &CancelToken,
        on_window: &mut dyn FnMut(VisibilityWindow) -> ControlFlow<()>,
    ) -> Result<ScanSummary> {
        if end < start {
            return Err(VisibilityError::InvalidInput(format!(
                "scan end {} precedes start {}",
                end, start
            )));
        }

        let step = self.resolve_timestep(satellite, tile, start)?;
        let tile_id = tile.id();

        debug!(
            satellite_id = satellite.norad_id,
            tile_id = %tile_id,
            step_ms = step.num_milliseconds(),
            "scan started"
        );

        let mut summary = ScanSummary {
            steps: 0,
            windows: 0,
            step,
        };
        // (AOS, running peak elevation)
        let mut tracking: Option<(DateTime<Utc>, f64)> = None;
        let mut t = start;

        while t <= end {
            if cancel.is_cancelled() {
                return Err(VisibilityError::Cancelled {
                    satellite_id: satellite.norad_id,
                    tile_id,
                    at: t,
                });
            }

            let position = self.propagate(satellite, t)?;
            let sub_point = GeoPoint::new(position.latitude, position.longitude);
            let inside = self.is_over(tile, sub_point, position.altitude_km);
            summary.steps += 1;

            trace!(
                at = %t,
                lat = position.latitude,
                lon = position.longitude,
                alt_km = position.altitude_km,
                inside,
                "scan step"
            );

            tracking = match (inside, tracking) {
                (true, None) => {
                    let elevation =
                        integrated_elevation(sub_point, position.altitude_km, tile.center);
                    Some((t, elevation))
                }
                (true, Some((aos, peak))) => {
                    let elevation =
                        integrated_elevation(sub_point, position.altitude_km, tile.center);
                    Some((aos, peak.max(elevation)))
                }
                (false, Some((aos, peak))) => {
                    let window = VisibilityWindow {
                        satellite_id: satellite.norad_id,
                        tile_id: tile_id.clone(),
                        aos,
                        los: Some(t),
                        max_elevation_deg: peak,
                    };
                    info!(
                        satellite_id = window.satellite_id,
                        tile_id = %window.tile_id,
                        aos = %aos,
                        los = %t,
                        max_elevation_deg = peak,
                        "visibility window closed"
                    );
                    summary.windows += 1;
                    if on_window(window).is_break() {
                        return Ok(summary);
                    }
                    None
                }
                (false, None) => None,
            };

            // past the last representable instant means past `end` too
            t = match t.checked_add_signed(step) {
                Some(next) => next,
                None => break,
            };
        }

        if let Some((aos, peak)) = tracking {
            info!(
                satellite_id = satellite.norad_id,
                tile_id = %tile_id,
                aos = %aos,
                max_elevation_deg = peak,
                "visibility window open at end of scan"
            );
            summary.windows += 1;
            // nothing left to scan, so a break changes nothing here
            let _ = on_window(VisibilityWindow {
                satellite_id: satellite.norad_id,
                tile_id,
                aos,
                los: None,
                max_elevation_deg: peak,
            });
        }

        Ok(summary)
    }
}
