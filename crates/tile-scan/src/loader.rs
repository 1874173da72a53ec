//! Loading TLE catalogues and engine configuration from files

use crate::{Result, ScanCliError};
use orbital_mechanics::Satellite;
use std::fs;
use std::path::Path;
use tracing::{debug, info};
use visibility::{EngineConfig, RawEngineConfig};

fn is_line1(line: &str) -> bool {
    line.starts_with("1 ") && line.len() >= 69
}

fn is_line2(line: &str) -> bool {
    line.starts_with("2 ") && line.len() >= 69
}

/// Parse two- or three-line element text. A name line (optionally prefixed
/// with `0 `) applies to the pair that follows it. Unusable sets are skipped.
pub fn parse_tles(text: &str) -> (Vec<Satellite>, usize) {
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim_end)
        .filter(|l| !l.trim().is_empty())
        .collect();

    let mut satellites = Vec::new();
    let mut skipped = 0;
    let mut name: Option<String> = None;
    let mut i = 0;

    while i < lines.len() {
        let line = lines[i];

        if is_line1(line) {
            match lines.get(i + 1) {
                Some(next) if is_line2(next) => {
                    match Satellite::from_tle(name.take(), line, next) {
                        Ok(sat) if sat.tle.mean_motion_rev_per_day().is_ok() => {
                            satellites.push(sat)
                        }
                        Ok(sat) => {
                            debug!(norad_id = sat.norad_id, "TLE without mean motion skipped");
                            skipped += 1;
                        }
                        Err(e) => {
                            debug!(error = %e, "TLE skipped");
                            skipped += 1;
                        }
                    }
                    i += 2;
                }
                _ => {
                    skipped += 1;
                    name = None;
                    i += 1;
                }
            }
            continue;
        }

        if line.starts_with("2 ") {
            // orphaned second line
            skipped += 1;
            name = None;
        } else {
            let trimmed = line.trim();
            let trimmed = trimmed.strip_prefix("0 ").unwrap_or(trimmed);
            name = Some(trimmed.to_string());
        }
        i += 1;
    }

    (satellites, skipped)
}

/// Load a TLE catalogue. Fails when no usable set remains.
pub fn load_tles(path: impl AsRef<Path>) -> Result<Vec<Satellite>> {
    let path = path.as_ref();
    info!("Loading TLEs from {:?}", path);

    let text = fs::read_to_string(path)?;
    let (satellites, skipped) = parse_tles(&text);

    info!("Loaded {} satellites ({} TLE sets skipped)", satellites.len(), skipped);

    if satellites.is_empty() {
        return Err(ScanCliError::NoSatellites(path.display().to_string()));
    }
    Ok(satellites)
}

/// Load and validate an engine configuration from JSON
pub fn load_engine_config(path: impl AsRef<Path>) -> Result<EngineConfig> {
    let path = path.as_ref();
    info!("Loading engine config from {:?}", path);

    let text = fs::read_to_string(path)?;
    let raw: RawEngineConfig = serde_json::from_str(&text)?;
    Ok(EngineConfig::try_from(raw)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;
    use visibility::{Containment, TimestepPolicy};

    const ISS_LINE1: &str = "1 25544U 98067A   20344.54791435  .00001234  00000-0  29746-4 0  9993";
    const ISS_LINE2: &str = "2 25544  51.6456 212.9669 0001235 341.2074 106.3520 15.48921140255673";

    #[test]
    fn test_parse_three_line() {
        let text = format!("ISS (ZARYA)\n{}\n{}\n", ISS_LINE1, ISS_LINE2);
        let (sats, skipped) = parse_tles(&text);
        assert_eq!(skipped, 0);
        assert_eq!(sats.len(), 1);
        assert_eq!(sats[0].norad_id, 25544);
        assert_eq!(sats[0].name, "ISS (ZARYA)");
    }

    #[test]
    fn test_parse_two_line_and_zero_prefix() {
        let text = format!(
            "{}\n{}\n\n0 ISS DUP\n{}\n{}\n",
            ISS_LINE1, ISS_LINE2, ISS_LINE1, ISS_LINE2
        );
        let (sats, skipped) = parse_tles(&text);
        assert_eq!(skipped, 0);
        assert_eq!(sats.len(), 2);
        assert_eq!(sats[0].name, "25544");
        assert_eq!(sats[1].name, "ISS DUP");
    }

    #[test]
    fn test_parse_skips_broken_sets() {
        let text = format!(
            "BROKEN\n{}\nNEXT\n{}\n{}\n{}\n",
            ISS_LINE1, ISS_LINE1, ISS_LINE2, ISS_LINE2
        );
        let (sats, skipped) = parse_tles(&text);
        assert_eq!(sats.len(), 1);
        assert_eq!(sats[0].name, "NEXT");
        assert_eq!(skipped, 2);
    }

    #[test]
    fn test_load_tles() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "ISS (ZARYA)\n{}\n{}", ISS_LINE1, ISS_LINE2).unwrap();

        let sats = load_tles(file.path()).unwrap();
        assert_eq!(sats.len(), 1);
    }

    #[test]
    fn test_load_tles_empty() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "nothing useful").unwrap();
        assert!(matches!(load_tles(file.path()), Err(ScanCliError::NoSatellites(_))));
    }

    #[test]
    fn test_load_engine_config() {
        let json = r#"{
            "tile_radius_m": 50000.0,
            "face_count": 8,
            "timestep": { "mode": "derived" },
            "containment": "radius_threshold"
        }"#;
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(json.as_bytes()).unwrap();

        let config = load_engine_config(file.path()).unwrap();
        assert_eq!(config.face_count, 8);
        assert_eq!(config.timestep, TimestepPolicy::Derived);
        assert_eq!(config.containment, Containment::RadiusThreshold);
    }

    #[test]
    fn test_load_engine_config_missing_fields() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(br#"{ "face_count": 8 }"#).unwrap();
        assert!(matches!(
            load_engine_config(file.path()),
            Err(ScanCliError::Visibility(_))
        ));
    }
}
