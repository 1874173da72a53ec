//! Destinations for completed windows.
//!
//! Sinks are shared by every concurrent scan and must accept windows from
//! several threads at once.

use crate::VisibilityWindow;
use std::sync::Mutex;
use tokio::sync::mpsc;
use tracing::warn;

pub trait VisibilitySink: Send + Sync {
    fn accept(&self, window: VisibilityWindow);
}

/// Channel fan-out; a closed receiver drops the window with a warning
impl VisibilitySink for mpsc::UnboundedSender<VisibilityWindow> {
    fn accept(&self, window: VisibilityWindow) {
        if let Err(e) = self.send(window) {
            warn!(
                satellite_id = e.0.satellite_id,
                tile_id = %e.0.tile_id,
                "visibility sink closed, window dropped"
            );
        }
    }
}

/// Collects windows in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    windows: Mutex<Vec<VisibilityWindow>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.windows.lock().map(|w| w.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of the windows so far, ordered by AOS then satellite and tile
    pub fn windows(&self) -> Vec<VisibilityWindow> {
        let mut windows = match self.windows.lock() {
            Ok(windows) => windows.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        sort_windows(&mut windows);
        windows
    }

    pub fn into_windows(self) -> Vec<VisibilityWindow> {
        let mut windows = self
            .windows
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        sort_windows(&mut windows);
        windows
    }
}

fn sort_windows(windows: &mut [VisibilityWindow]) {
    windows.sort_by(|a, b| {
        a.aos
            .cmp(&b.aos)
            .then(a.satellite_id.cmp(&b.satellite_id))
            .then_with(|| a.tile_id.cmp(&b.tile_id))
    });
}

impl VisibilitySink for MemorySink {
    fn accept(&self, window: VisibilityWindow) {
        match self.windows.lock() {
            Ok(mut windows) => windows.push(window),
            Err(poisoned) => poisoned.into_inner().push(window),
        }
    }
}
