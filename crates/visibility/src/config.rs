//! Engine configuration.
//!
//! Built either through [`EngineConfig::new`] or deserialized as a
//! [`RawEngineConfig`] of optional fields and converted with `TryFrom`, which
//! names every missing or invalid field.

use crate::timestep::step_from_seconds;
use crate::{Result, VisibilityError};
use serde::{Deserialize, Serialize};

/// How the scan interval is chosen
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum TimestepPolicy {
    Fixed { seconds: f64 },
    /// Derived from the satellite altitude at scan start and the tile radius
    Derived,
}

/// How a sub-point is tested against a tile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Containment {
    /// Great-circle distance to the tile centre within the tile radius
    #[default]
    RadiusThreshold,
    /// Ray casting against the tile's boundary polygon
    Polygon,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineConfig {
    pub tile_radius_m: f64,
    pub face_count: usize,
    pub timestep: TimestepPolicy,
    pub max_concurrency: usize,
    pub containment: Containment,
}

fn default_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

impl EngineConfig {
    pub fn new(tile_radius_m: f64, face_count: usize, timestep: TimestepPolicy) -> Result<Self> {
        let config = Self {
            tile_radius_m,
            face_count,
            timestep,
            max_concurrency: default_concurrency(),
            containment: Containment::default(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Result<Self> {
        self.max_concurrency = max_concurrency;
        self.validate()?;
        Ok(self)
    }

    pub fn with_containment(mut self, containment: Containment) -> Self {
        self.containment = containment;
        self
    }

    pub fn tile_radius_km(&self) -> f64 {
        self.tile_radius_m / 1000.0
    }

    pub fn validate(&self) -> Result<()> {
        tile_grid::validate_radius_m(self.tile_radius_m)
            .map_err(|e| VisibilityError::Config(format!("tile_radius_m: {}", e)))?;
        tile_grid::validate_face_count(self.face_count)
            .map_err(|e| VisibilityError::Config(format!("face_count: {}", e)))?;

        if let TimestepPolicy::Fixed { seconds } = self.timestep {
            if !(seconds.is_finite() && seconds > 0.0) {
                return Err(VisibilityError::Config(format!(
                    "timestep.seconds must be positive, got {}",
                    seconds
                )));
            }
            step_from_seconds(seconds)
                .map_err(|e| VisibilityError::Config(format!("timestep.seconds: {}", e)))?;
        }

        if self.max_concurrency == 0 {
            return Err(VisibilityError::Config(
                "max_concurrency must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}

/// Configuration as it arrives from JSON
#[derive(Debug, Default, Deserialize)]
pub struct RawEngineConfig {
    pub tile_radius_m: Option<f64>,
    pub face_count: Option<usize>,
    pub timestep: Option<TimestepPolicy>,
    pub max_concurrency: Option<usize>,
    pub containment: Option<Containment>,
}

impl RawEngineConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| VisibilityError::Config(e.to_string()))
    }
}

impl TryFrom<RawEngineConfig> for EngineConfig {
    type Error = VisibilityError;

    fn try_from(raw: RawEngineConfig) -> Result<Self> {
        let mut missing = Vec::new();
        if raw.tile_radius_m.is_none() {
            missing.push("tile_radius_m");
        }
        if raw.face_count.is_none() {
            missing.push("face_count");
        }
        if raw.timestep.is_none() {
            missing.push("timestep");
        }

        match (raw.tile_radius_m, raw.face_count, raw.timestep) {
            (Some(tile_radius_m), Some(face_count), Some(timestep)) => {
                let config = Self {
                    tile_radius_m,
                    face_count,
                    timestep,
                    max_concurrency: raw.max_concurrency.unwrap_or_else(default_concurrency),
                    containment: raw.containment.unwrap_or_default(),
                };
                config.validate()?;
                Ok(config)
            }
            _ => Err(VisibilityError::Config(format!(
                "missing required fields: {}",
                missing.join(", ")
            ))),
        }
    }
}
