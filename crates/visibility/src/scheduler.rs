//! Bounded scan worker pool.
//!
//! Every (satellite, tile) pair runs on the blocking pool, at most
//! `max_concurrency` at a time. A failed or cancelled pair never aborts its
//! siblings; windows already delivered to the sink stay delivered.

use crate::cancel::CancelToken;
use crate::config::EngineConfig;
use crate::detector::VisibilityScanner;
use crate::sink::VisibilitySink;
use crate::{Result, VisibilityError};
use chrono::{DateTime, Utc};
use orbital_mechanics::{Propagator, Satellite};
use std::sync::Arc;
use tile_grid::Tile;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// One pair to scan
#[derive(Debug, Clone)]
pub struct ScanJob {
    pub satellite: Satellite,
    pub tile: Tile,
}

impl ScanJob {
    pub fn new(satellite: Satellite, tile: Tile) -> Self {
        Self { satellite, tile }
    }

    /// Every satellite against every tile
    pub fn cross<'a>(
        satellites: &[Satellite],
        tiles: impl IntoIterator<Item = &'a Tile>,
    ) -> Vec<Self> {
        let tiles: Vec<&Tile> = tiles.into_iter().collect();
        satellites
            .iter()
            .flat_map(|sat| tiles.iter().map(move |tile| Self::new(sat.clone(), (*tile).clone())))
            .collect()
    }
}

/// A pair that ended in error, with enough context to retry or skip it
#[derive(Debug)]
pub struct ScanFailure {
    pub satellite_id: u32,
    pub tile_id: String,
    pub error: VisibilityError,
}

#[derive(Debug, Default)]
pub struct ScanReport {
    pub completed: usize,
    pub windows: usize,
    pub failures: Vec<ScanFailure>,
    /// Pairs stopped by the token, including those never started
    pub cancelled: usize,
    pub panicked: usize,
}

impl ScanReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && self.cancelled == 0 && self.panicked == 0
    }
}

pub struct ScanScheduler {
    scanner: VisibilityScanner,
    max_concurrency: usize,
}

impl ScanScheduler {
    pub fn new(scanner: VisibilityScanner, max_concurrency: usize) -> Result<Self> {
        if max_concurrency == 0 {
            return Err(VisibilityError::Config(
                "max_concurrency must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            scanner,
            max_concurrency,
        })
    }

    pub fn from_config(propagator: Arc<dyn Propagator>, config: &EngineConfig) -> Result<Self> {
        Self::new(VisibilityScanner::new(propagator, config), config.max_concurrency)
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    pub async fn run(
        &self,
        jobs: Vec<ScanJob>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        sink: Arc<dyn VisibilitySink>,
        cancel: CancelToken,
    ) -> ScanReport {
        let total = jobs.len();
        info!(pairs = total, max_concurrency = self.max_concurrency, "scan batch started");

        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let mut set = JoinSet::new();
        let mut report = ScanReport::default();

        for job in jobs {
            if cancel.is_cancelled() {
                report.cancelled += 1;
                continue;
            }

            let permit = match semaphore.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    report.cancelled += 1;
                    continue;
                }
            };

            let scanner = self.scanner.clone();
            let sink = Arc::clone(&sink);
            let cancel = cancel.clone();

            set.spawn_blocking(move || {
                let _permit = permit;
                let ScanJob { satellite, tile } = job;
                let outcome = scanner.scan(&satellite, &tile, start, end, &cancel, |window| {
                    sink.accept(window)
                });
                (satellite.norad_id, tile.id(), outcome)
            });
        }

        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((_, _, Ok(summary))) => {
                    report.completed += 1;
                    report.windows += summary.windows;
                }
                Ok((satellite_id, tile_id, Err(VisibilityError::Cancelled { .. }))) => {
                    debug!(satellite_id, tile_id = %tile_id, "scan cancelled");
                    report.cancelled += 1;
                }
                Ok((satellite_id, tile_id, Err(error))) => {
                    warn!(satellite_id, tile_id = %tile_id, error = %error, "scan failed");
                    report.failures.push(ScanFailure {
                        satellite_id,
                        tile_id,
                        error,
                    });
                }
                Err(e) => {
                    warn!(error = %e, "scan task panicked");
                    report.panicked += 1;
                }
            }
        }

        info!(
            pairs = total,
            completed = report.completed,
            windows = report.windows,
            failed = report.failures.len(),
            cancelled = report.cancelled,
            panicked = report.panicked,
            "scan batch finished"
        );

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Containment, TimestepPolicy};
    use crate::detector::tests::{equator_tile, minutes, satellite, slow_track, t0, EquatorialTrack};
    use crate::sink::MemorySink;
    use crate::VisibilityWindow;
    use orbital_mechanics::{GeodeticPosition, OrbitalError, TwoLineElements};
    use tile_grid::GeoPoint;
    use tokio::sync::mpsc;

    /// Rejects any TLE whose first line is "bad"
    struct RejectsBadTle(EquatorialTrack);

    impl Propagator for RejectsBadTle {
        fn propagate(
            &self,
            tle: &TwoLineElements,
            at: DateTime<Utc>,
        ) -> orbital_mechanics::Result<GeodeticPosition> {
            if tle.line1 == "bad" {
                return Err(OrbitalError::InvalidTle("bad".to_string()));
            }
            self.0.propagate(tle, at)
        }
    }

    /// Stores windows and fires the token on the first one
    struct CancelOnFirstWindow {
        windows: MemorySink,
        token: CancelToken,
    }

    impl VisibilitySink for CancelOnFirstWindow {
        fn accept(&self, window: VisibilityWindow) {
            self.windows.accept(window);
            self.token.cancel();
        }
    }

    fn scheduler(propagator: impl Propagator + 'static, max_concurrency: usize) -> ScanScheduler {
        let scanner = VisibilityScanner::with_policy(
            Arc::new(propagator),
            TimestepPolicy::Fixed { seconds: 60.0 },
            Containment::RadiusThreshold,
        );
        ScanScheduler::new(scanner, max_concurrency).unwrap()
    }

    fn tiles() -> Vec<Tile> {
        vec![
            equator_tile(250_000.0),
            Tile::new(6, GeoPoint::new(0.0, 5.0), 6, 250_000.0).unwrap(),
            Tile::new(6, GeoPoint::new(0.0, 90.0), 6, 250_000.0).unwrap(),
        ]
    }

    #[tokio::test]
    async fn test_batch_collects_windows() {
        let tiles = tiles();
        let jobs = ScanJob::cross(&[satellite()], &tiles);
        assert_eq!(jobs.len(), 3);

        let sink = Arc::new(MemorySink::new());
        let report = scheduler(slow_track(), 2)
            .run(jobs, t0(), minutes(20.0), sink.clone(), CancelToken::new())
            .await;

        assert!(report.is_clean());
        assert_eq!(report.completed, 3);
        assert_eq!(report.windows, 2);

        let windows = Arc::try_unwrap(sink).unwrap().into_windows();
        assert_eq!(windows.len(), 2);
        assert_eq!(windows[0].aos, minutes(8.0));
        assert_eq!(windows[1].aos, minutes(13.0));
        assert_eq!(windows[1].tile_id, tiles[1].id());
    }

    #[tokio::test]
    async fn test_failure_isolated_to_pair() {
        let good = satellite();
        let bad = Satellite::new(99, "BAD", TwoLineElements::new("bad", "bad"));
        let jobs = ScanJob::cross(&[good, bad], &tiles()[..1]);

        let sink = Arc::new(MemorySink::new());
        let report = scheduler(RejectsBadTle(slow_track()), 4)
            .run(jobs, t0(), minutes(20.0), sink.clone(), CancelToken::new())
            .await;

        assert_eq!(report.completed, 1);
        assert_eq!(report.failures.len(), 1);
        let failure = &report.failures[0];
        assert_eq!(failure.satellite_id, 99);
        assert!(matches!(
            &failure.error,
            VisibilityError::PropagationFailure { at, .. } if *at == t0()
        ));
        assert_eq!(sink.len(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_batch() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let report = scheduler(slow_track(), 1)
            .run(
                ScanJob::cross(&[satellite()], &tiles()),
                t0(),
                minutes(20.0),
                Arc::new(MemorySink::new()),
                cancel,
            )
            .await;

        assert_eq!(report.completed, 0);
        assert_eq!(report.cancelled, 3);
        assert!(!report.is_clean());
    }

    #[tokio::test]
    async fn test_cancel_mid_batch() {
        let tiles = tiles();
        // the never-visible tile finishes first, then the equator tile fires the token
        let ordered = [tiles[2].clone(), tiles[0].clone(), tiles[1].clone()];
        let cancel = CancelToken::new();
        let sink = Arc::new(CancelOnFirstWindow {
            windows: MemorySink::new(),
            token: cancel.clone(),
        });

        let report = scheduler(slow_track(), 1)
            .run(
                ScanJob::cross(&[satellite()], &ordered),
                t0(),
                minutes(20.0),
                sink.clone(),
                cancel,
            )
            .await;

        assert_eq!(report.completed, 1);
        assert_eq!(report.cancelled, 2);
        assert!(report.failures.is_empty());
        assert_eq!(report.panicked, 0);

        let kept = sink.windows.windows();
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].tile_id, tiles[0].id());
        assert_eq!(kept[0].los, Some(minutes(13.0)));
    }

    #[tokio::test]
    async fn test_channel_sink_receives_windows() {
        let (tx, mut rx) = mpsc::unbounded_channel::<VisibilityWindow>();
        let report = scheduler(slow_track(), 1)
            .run(
                ScanJob::cross(&[satellite()], &tiles()),
                t0(),
                minutes(20.0),
                Arc::new(tx),
                CancelToken::new(),
            )
            .await;

        assert_eq!(report.windows, 2);
        let mut received = Vec::new();
        while let Ok(w) = rx.try_recv() {
            received.push(w);
        }
        assert_eq!(received.len(), 2);
    }

    #[test]
    fn test_rejects_zero_concurrency() {
        let scanner = VisibilityScanner::with_policy(
            Arc::new(slow_track()),
            TimestepPolicy::Derived,
            Containment::RadiusThreshold,
        );
        assert!(matches!(
            ScanScheduler::new(scanner, 0),
            Err(VisibilityError::Config(_))
        ));
    }
}
