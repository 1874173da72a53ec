//! Whole-globe tile grid.
//!
//! Generation fans out over tile columns with rayon; the columns are then
//! inserted into the map by a single writer. Any tile failure fails the
//! whole pass, so callers never see a partially populated grid.

use crate::constants::EARTH_RADIUS_KM;
use crate::geometry::{degrees_to_radians, radians_to_degrees, GeoPoint};
use crate::polygon::Tile;
use crate::slippy::{lat_lon_to_tile_xy, tile_center, tiles_per_axis, zoom_level_for_radius};
use crate::{validate_face_count, validate_radius_m, GridError, Result};
use rayon::prelude::*;
use std::collections::HashMap;
use tracing::{debug, info};

/// Quadkey string to tile, for one (radius, zoom, face count) configuration
#[derive(Debug, Clone)]
pub struct TileGrid {
    radius_m: f64,
    zoom: u8,
    face_count: usize,
    tiles: HashMap<String, Tile>,
}

impl TileGrid {
    /// Build every tile of the slippy matrix at the zoom derived from `radius_m`
    pub fn generate(radius_m: f64, face_count: usize) -> Result<Self> {
        let radius_m = validate_radius_m(radius_m)?;
        let face_count = validate_face_count(face_count)?;
        let zoom = zoom_level_for_radius(radius_m)?;
        let n = tiles_per_axis(zoom);

        debug!(radius_m, zoom, face_count, "generating tile columns");

        let columns = (0..n)
            .into_par_iter()
            .map(|x| {
                (0..n)
                    .map(|y| Tile::new(face_count, tile_center(x, y, zoom), zoom, radius_m))
                    .collect::<Result<Vec<_>>>()
            })
            .collect::<Result<Vec<_>>>()?;

        let mut tiles = HashMap::with_capacity((n as usize) * (n as usize));
        for tile in columns.into_iter().flatten() {
            tiles.insert(tile.id(), tile);
        }

        info!(tiles = tiles.len(), zoom, radius_m, "tile grid generated");

        Ok(Self {
            radius_m,
            zoom,
            face_count,
            tiles,
        })
    }

    pub fn radius_m(&self) -> f64 {
        self.radius_m
    }

    pub fn zoom(&self) -> u8 {
        self.zoom
    }

    pub fn face_count(&self) -> usize {
        self.face_count
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&Tile> {
        self.tiles.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Tile)> {
        self.tiles.iter()
    }

    pub fn tiles(&self) -> impl Iterator<Item = &Tile> {
        self.tiles.values()
    }

    /// Tile whose slippy cell contains (lat, lon)
    pub fn tile_at(&self, latitude: f64, longitude: f64) -> Option<&Tile> {
        let (x, y) = lat_lon_to_tile_xy(latitude, longitude, self.zoom);
        let center = tile_center(x, y, self.zoom);
        let key = crate::Quadkey::new(center.latitude, center.longitude, self.zoom).key();
        self.tiles.get(&key)
    }

    /// Tiles whose centre lies within `radius_km` of `point`, nearest first
    pub fn tiles_within(&self, point: GeoPoint, radius_km: f64) -> Vec<&Tile> {
        let mut found: Vec<(f64, &Tile)> = self
            .tiles
            .par_iter()
            .filter_map(|(_, tile)| {
                let d = tile.quadkey.distance_to(point);
                (d <= radius_km).then_some((d, tile))
            })
            .collect();

        found.sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.id().cmp(&b.1.id())));
        found.into_iter().map(|(_, tile)| tile).collect()
    }

    /// Export tiles as a GeoJSON FeatureCollection of polygons
    pub fn to_geojson(&self) -> serde_json::Value {
        tiles_to_geojson(self.tiles.values())
    }
}

/// Free-function form of [`TileGrid::generate`] returning the bare map
pub fn generate_all_tiles_for_radius(
    radius_m: f64,
    face_count: usize,
) -> Result<HashMap<String, Tile>> {
    TileGrid::generate(radius_m, face_count).map(|grid| grid.tiles)
}

/// Tiles of the (radius, face count) grid whose centre lies within
/// `within_km` of `center`, nearest first.
///
/// Only the slippy cells under the bounding box of the search circle are
/// built, so this works at zoom levels where the full grid would not fit in
/// memory.
pub fn tiles_around(
    center: GeoPoint,
    within_km: f64,
    radius_m: f64,
    face_count: usize,
) -> Result<Vec<Tile>> {
    let radius_m = validate_radius_m(radius_m)?;
    let face_count = validate_face_count(face_count)?;
    let center = GeoPoint::try_new(center.latitude, center.longitude)?;
    if !(within_km.is_finite() && within_km >= 0.0) {
        return Err(GridError::InvalidRadius(within_km * 1000.0));
    }

    let zoom = zoom_level_for_radius(radius_m)?;
    let n = tiles_per_axis(zoom);

    let d_lat = radians_to_degrees(within_km / EARTH_RADIUS_KM);
    let north = (center.latitude + d_lat).min(90.0);
    let south = (center.latitude - d_lat).max(-90.0);
    let (_, y_min) = lat_lon_to_tile_xy(north, center.longitude, zoom);
    let (_, y_max) = lat_lon_to_tile_xy(south, center.longitude, zoom);

    let widest_lat = north.abs().max(south.abs());
    let columns: Vec<u32> = if widest_lat >= 90.0 || d_lat >= 90.0 {
        (0..n).collect()
    } else {
        let d_lon = d_lat / degrees_to_radians(widest_lat).cos();
        if d_lon >= 180.0 {
            (0..n).collect()
        } else {
            let to_column = |lon: f64| ((lon + 180.0) / 360.0 * f64::from(n)).floor() as i64;
            let west = to_column(center.longitude - d_lon);
            let east = to_column(center.longitude + d_lon);
            let mut columns: Vec<u32> = (west..=east)
                .map(|i| i.rem_euclid(i64::from(n)) as u32)
                .collect();
            columns.sort_unstable();
            columns.dedup();
            columns
        }
    };

    let mut found: Vec<(f64, Tile)> = Vec::new();
    for &x in &columns {
        for y in y_min..=y_max {
            let tile_centre = tile_center(x, y, zoom);
            let d = tile_centre.distance_km(&center);
            if d <= within_km {
                found.push((d, Tile::new(face_count, tile_centre, zoom, radius_m)?));
            }
        }
    }

    debug!(zoom, columns = columns.len(), tiles = found.len(), "tiles around location");

    found.sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.id().cmp(&b.1.id())));
    Ok(found.into_iter().map(|(_, tile)| tile).collect())
}

pub fn tiles_to_geojson<'a>(tiles: impl IntoIterator<Item = &'a Tile>) -> serde_json::Value {
    let features: Vec<serde_json::Value> = tiles
        .into_iter()
        .map(|tile| {
            let mut ring: Vec<[f64; 2]> = tile
                .boundaries
                .iter()
                .map(|p| [p.longitude, p.latitude])
                .collect();
            if let Some(first) = ring.first().copied() {
                ring.push(first);
            }

            serde_json::json!({
                "type": "Feature",
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [ring]
                },
                "properties": {
                    "id": tile.id(),
                    "zoom": tile.zoom,
                    "radius_m": tile.radius_m,
                    "center": [tile.center.longitude, tile.center.latitude]
                }
            })
        })
        .collect();

    serde_json::json!({
        "type": "FeatureCollection",
        "features": features
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::GridError;

    fn coarse_grid() -> TileGrid {
        // zoom 5, 1024 tiles
        TileGrid::generate(1_000_000.0, 6).unwrap()
    }

    #[test]
    fn test_generate_covers_matrix() {
        let grid = coarse_grid();
        assert_eq!(grid.zoom(), 5);
        assert_eq!(grid.len(), 32 * 32);

        for (key, tile) in grid.iter() {
            assert_eq!(key, &tile.id());
            assert_eq!(tile.boundaries.len(), 6);
            assert!(tile.boundaries.iter().all(GeoPoint::is_valid));
            assert!(tile.center.is_valid());
        }
    }

    #[test]
    #[ignore = "allocates the full zoom-11 grid (about 4.2M tiles)"]
    fn test_generate_all_tiles_for_10km() {
        let tiles = generate_all_tiles_for_radius(10_000.0, 6).unwrap();
        assert!(!tiles.is_empty());
        for tile in tiles.values() {
            assert_eq!(tile.boundaries.len(), 6);
            assert!(tile.boundaries.iter().all(GeoPoint::is_valid));
        }
    }

    #[test]
    fn test_generate_rejects_invalid_radius() {
        assert_eq!(TileGrid::generate(0.0, 6).unwrap_err(), GridError::InvalidRadius(0.0));
        assert!(TileGrid::generate(-1.0, 6).is_err());
        assert!(generate_all_tiles_for_radius(f64::NAN, 6).is_err());
        assert_eq!(TileGrid::generate(1_000_000.0, 1).unwrap_err(), GridError::InvalidFaceCount(1));
    }

    #[test]
    fn test_tile_at_every_point_has_a_tile() {
        let grid = coarse_grid();
        let points = [
            (0.0, 0.0),
            (89.9, 179.9),
            (-89.9, -180.0),
            (51.5, -0.12),
            (-33.9, 151.2),
        ];
        for (lat, lon) in points {
            let tile = grid.tile_at(lat, lon);
            assert!(tile.is_some(), "no tile at ({}, {})", lat, lon);
        }
    }

    #[test]
    fn test_tile_at_contains_point() {
        let grid = coarse_grid();
        let tile = grid.tile_at(10.0, 10.0).unwrap();
        // zoom 5 tiles span 11.25 degrees of longitude
        assert!((tile.center.longitude - 10.0).abs() <= 11.25 / 2.0);
    }

    #[test]
    fn test_tiles_within_sorted() {
        let grid = coarse_grid();
        let point = GeoPoint::new(5.0, 5.0);
        let found = grid.tiles_within(point, 2000.0);

        assert!(!found.is_empty());
        let distances: Vec<f64> = found.iter().map(|t| t.center.distance_km(&point)).collect();
        assert!(distances.windows(2).all(|w| w[0] <= w[1]));
        assert!(distances.iter().all(|d| *d <= 2000.0));

        assert!(grid.tiles_within(point, 0.0).is_empty());
    }

    #[test]
    fn test_geojson_rings_closed() {
        let grid = coarse_grid();
        let geojson = grid.to_geojson();
        let features = geojson["features"].as_array().unwrap();
        assert_eq!(features.len(), grid.len());

        let ring = features[0]["geometry"]["coordinates"][0].as_array().unwrap();
        assert_eq!(ring.len(), 7);
        assert_eq!(ring.first(), ring.last());
    }

    #[test]
    fn test_tiles_around_matches_full_grid() {
        let grid = coarse_grid();
        let searches = [
            (5.0, 5.0, 2000.0),
            (0.0, 179.0, 1500.0),
            (80.0, 0.0, 1500.0),
            (-45.0, -120.0, 900.0),
        ];
        for (lat, lon, within) in searches {
            let point = GeoPoint::new(lat, lon);
            let expected: Vec<String> = grid
                .tiles_within(point, within)
                .iter()
                .map(|t| t.id())
                .collect();
            let around: Vec<String> = tiles_around(point, within, 1_000_000.0, 6)
                .unwrap()
                .iter()
                .map(Tile::id)
                .collect();
            assert_eq!(around, expected, "around ({}, {})", lat, lon);
        }
    }

    #[test]
    fn test_tiles_around_fine_zoom() {
        // zoom 16 grid is far too large to build whole
        let tiles = tiles_around(GeoPoint::new(48.8566, 2.3522), 2.0, 500.0, 6).unwrap();
        assert!(!tiles.is_empty());
        assert!(tiles.iter().all(|t| t.zoom == 16));
        assert!(tiles.iter().all(|t| t.center.distance_km(&GeoPoint::new(48.8566, 2.3522)) <= 2.0));
    }

    #[test]
    fn test_tiles_around_rejects_bad_input() {
        let p = GeoPoint::new(0.0, 0.0);
        assert!(tiles_around(p, -1.0, 1000.0, 6).is_err());
        assert!(tiles_around(p, 10.0, 0.0, 6).is_err());
        assert!(tiles_around(GeoPoint::new(100.0, 0.0), 10.0, 1000.0, 6).is_err());
    }
}
