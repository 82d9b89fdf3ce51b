use std::path::{Path, PathBuf};

use image::{ImageFormat, RgbImage, RgbaImage};

use crate::error::{GeoError, GeoResult};
use crate::geometry::GeoBounds;
use crate::models::TileRecord;
use crate::raster::NodataMask;

/// Compose RGB + nodata mask into RGBA (alpha 0 on nodata, 255 elsewhere)
pub fn compose_rgba(rgb: &RgbImage, mask: &NodataMask) -> GeoResult<RgbaImage> {
    let (width, height) = rgb.dimensions();
    if width as usize != mask.width || height as usize != mask.height {
        return Err(GeoError::Format(format!(
            "mask is {}x{} but image is {width}x{height}",
            mask.width, mask.height
        )));
    }

    Ok(RgbaImage::from_fn(width, height, |x, y| {
        let [r, g, b] = rgb.get_pixel(x, y).0;
        let alpha = if mask.is_nodata(x as usize, y as usize) { 0 } else { 255 };
        image::Rgba([r, g, b, alpha])
    }))
}

/// PNG name for a source raster ("scene_01.tif" -> "scene_01.png")
pub fn tile_file_name(source: &Path) -> String {
    png_file_name(source, "")
}

/// PNG name with `suffix` appended to the source stem
pub fn png_file_name(source: &Path, suffix: &str) -> String {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "tile".to_string());
    format!("{stem}{suffix}.png")
}

/// Writes RGBA tiles into one directory and collects their manifest records
#[derive(Debug)]
pub struct TileRasterizer {
    out_dir: PathBuf,
    records: Vec<TileRecord>,
}

impl TileRasterizer {
    pub fn new<P: Into<PathBuf>>(out_dir: P) -> GeoResult<Self> {
        let out_dir = out_dir.into();
        std::fs::create_dir_all(&out_dir)?;
        Ok(Self {
            out_dir,
            records: Vec::new(),
        })
    }

    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    /// Encode one tile as PNG and append its record; returns the written path
    pub fn write_tile(
        &mut self,
        source: &Path,
        rgb: &RgbImage,
        mask: &NodataMask,
        bounds: GeoBounds,
    ) -> GeoResult<PathBuf> {
        let rgba = compose_rgba(rgb, mask)?;
        let file = tile_file_name(source);
        let path = self.out_dir.join(&file);
        rgba.save_with_format(&path, ImageFormat::Png)?;

        self.records.push(TileRecord::new(file, bounds));
        Ok(path)
    }

    pub fn records(&self) -> &[TileRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<TileRecord> {
        self.records
    }
}
