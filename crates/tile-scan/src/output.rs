//! JSON and GeoJSON output

use crate::Result;
use serde::Serialize;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use tile_grid::{Tile, TileGrid};
use tracing::info;

/// Pretty JSON to `path`, or to stdout when no path is given
pub fn write_json<T: Serialize>(path: Option<&Path>, value: &T) -> Result<()> {
    match path {
        Some(path) => {
            info!("Writing output to {:?}", path);
            let file = File::create(path)?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer_pretty(&mut writer, value)?;
            writer.flush()?;
        }
        None => {
            let stdout = io::stdout();
            let mut writer = stdout.lock();
            serde_json::to_writer_pretty(&mut writer, value)?;
            writeln!(writer)?;
        }
    }
    Ok(())
}

/// Grid summary without boundaries, one entry per tile
pub fn grid_summary(grid: &TileGrid) -> serde_json::Value {
    let mut tiles: Vec<&Tile> = grid.tiles().collect();
    tiles.sort_by(|a, b| a.id().cmp(&b.id()));

    serde_json::json!({
        "radius_m": grid.radius_m(),
        "zoom": grid.zoom(),
        "face_count": grid.face_count(),
        "tile_count": grid.len(),
        "tiles": tiles
            .iter()
            .map(|t| serde_json::json!({
                "id": t.id(),
                "center": [t.center.latitude, t.center.longitude]
            }))
            .collect::<Vec<_>>()
    })
}
