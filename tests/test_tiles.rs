mod common;

use anyhow::Result;
use common::*;
use geotiles::raster::RGB_BANDS;
use geotiles::{Crs, Pipeline, PipelineConfig, ProjReprojector, Reprojector, TileRecord, open_raster};

const BLOCK: u32 = 10;

fn corner_block(x: u32, y: u32) -> [u8; 3] {
    if x < BLOCK && y < BLOCK { [0, 0, 0] } else { textured(x, y) }
}

#[test]
fn test_nodata_block_becomes_transparent() -> Result<()> {
    let ws = Workspace::new()?;
    SyntheticTiff::wgs84(64, 48, 0.001)
        .with_nodata("0")
        .write(&ws.scene("scene_01.tif"), corner_block)?;

    let report = Pipeline::new(ws.config()).run_tiles()?;
    assert_eq!(report.processed.len(), 1);
    assert_eq!(report.tiles.len(), 1);

    let png = image::open(ws.output.join("tiles/scene_01.png"))?.to_rgba8();
    assert_eq!(png.dimensions(), (64, 48));
    for (x, y, pixel) in png.enumerate_pixels() {
        let expected = if x < BLOCK && y < BLOCK { 0 } else { 255 };
        assert_eq!(pixel.0[3], expected, "alpha at ({x}, {y})");
    }
    Ok(())
}

#[test]
fn test_manifest_bounds() -> Result<()> {
    let ws = Workspace::new()?;
    SyntheticTiff::wgs84(64, 48, 0.001).write(&ws.scene("scene_01.tif"), textured)?;

    Pipeline::new(ws.config()).run_tiles()?;

    let raw = std::fs::read_to_string(ws.output.join("tiles/tiles.json"))?;
    let records: Vec<TileRecord> = serde_json::from_str(&raw)?;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].file, "scene_01.png");

    let [[south, west], [north, east]] = records[0].bounds;
    assert!((west - 4.0).abs() < 1e-9);
    assert!((east - 4.064).abs() < 1e-9);
    assert!((north - 52.0).abs() < 1e-9);
    assert!((south - 51.952).abs() < 1e-9);
    Ok(())
}

#[test]
fn test_stretch_uses_full_range() -> Result<()> {
    let ws = Workspace::new()?;
    SyntheticTiff::wgs84(50, 50, 0.001).write(&ws.scene("gradient.tif"), |x, _| {
        let v = 20 + x as u8 * 2;
        [v, v, v]
    })?;

    Pipeline::new(ws.config()).run_tiles()?;

    let png = image::open(ws.output.join("tiles/gradient.png"))?.to_rgba8();
    let first = png.get_pixel(0, 0).0[0];
    let last = png.get_pixel(49, 0).0[0];
    assert_eq!(first, 0);
    assert_eq!(last, 255);
    Ok(())
}

#[test]
fn test_manifest_follows_sorted_batch() -> Result<()> {
    let ws = Workspace::new()?;
    for name in ["b.tif", "a.tif", "c.tiff"] {
        SyntheticTiff::wgs84(8, 8, 0.001).write(&ws.scene(name), textured)?;
    }

    let config = PipelineConfig {
        batch_limit: Some(2),
        ..ws.config()
    };
    let report = Pipeline::new(config).run_tiles()?;

    let files: Vec<&str> = report.tiles.iter().map(|t| t.file.as_str()).collect();
    assert_eq!(files, vec!["a.png", "b.png"]);
    assert!(!ws.output.join("tiles/c.png").exists());
    Ok(())
}

#[test]
fn test_utm_scene_reprojected_to_lon_lat() -> Result<()> {
    let ws = Workspace::new()?;
    let scene = ws.scene("utm.tif");
    SyntheticTiff {
        origin: (590_000.0, 5_754_000.0),
        epsg: Some(32631),
        ..SyntheticTiff::wgs84(40, 40, 10.0)
    }
    .with_nodata("0")
    .write(&scene, textured)?;

    let report = Pipeline::new(ws.config()).run_tiles()?;
    let [[south, west], [north, east]] = report.tiles[0].bounds;
    assert!(west > 4.0 && east < 4.5 && west < east);
    assert!(south > 51.8 && north < 52.0 && south < north);

    // Same warp outside the pipeline: transparency follows its nodata mask
    let grid = ProjReprojector.reproject(&open_raster(&scene, &RGB_BANDS)?, Crs::WGS84)?;
    let mask = grid.nodata_mask();
    let png = image::open(ws.output.join("tiles/utm.png"))?.to_rgba8();
    assert_eq!(png.dimensions(), (grid.width as u32, grid.height as u32));

    let mut transparent = 0;
    for (x, y, pixel) in png.enumerate_pixels() {
        let masked = mask.is_nodata(x as usize, y as usize);
        assert_eq!(pixel.0[3], if masked { 0 } else { 255 }, "alpha at ({x}, {y})");
        transparent += masked as usize;
    }
    // The rotated footprint leaves nodata wedges in the corners
    assert!(transparent > 0);
    assert!(transparent < png.pixels().len());
    Ok(())
}
