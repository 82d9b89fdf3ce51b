//! JSON artifacts consumed by the map front end.
//!
//! Every write replaces the whole file; parent directories are created.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use log::info;
use serde::Serialize;

use crate::error::GeoResult;
use crate::models::{DetectionRecord, GeoDetection, RunSummary, TileRecord};

/// File name of the tile manifest inside the tiles directory
pub const TILE_MANIFEST: &str = "tiles.json";

/// Serialize `value` as 2-space indented JSON into `path`
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> GeoResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let mut body = serde_json::to_vec_pretty(value)?;
    body.push(b'\n');
    let mut file = fs::File::create(path)?;
    file.write_all(&body)?;
    Ok(())
}

/// Write the tile manifest into `tiles_dir`; returns the manifest path
pub fn write_tile_manifest(tiles_dir: &Path, records: &[TileRecord]) -> GeoResult<PathBuf> {
    let path = tiles_dir.join(TILE_MANIFEST);
    write_json(&path, records)?;
    info!("Exported {} tile(s) to {}", records.len(), path.display());
    Ok(path)
}

/// Write detections to `primary` and the same content to `mirror`
pub fn write_detections(primary: &Path, mirror: &Path, detections: &[GeoDetection]) -> GeoResult<()> {
    let records: Vec<DetectionRecord> = detections.iter().map(DetectionRecord::from).collect();
    write_json(primary, &records)?;
    info!("Saved {} detection(s) to {}", records.len(), primary.display());

    write_json(mirror, &records)?;
    info!("Mirrored detections to {}", mirror.display());
    Ok(())
}

pub fn write_summary(path: &Path, summary: &RunSummary) -> GeoResult<()> {
    write_json(path, summary)?;
    info!("Saved run metrics to {}", path.display());
    Ok(())
}
