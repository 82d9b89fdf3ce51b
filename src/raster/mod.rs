//! Raster loading.

pub mod geotiff;
pub mod nodata;

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use crate::error::{GeoError, GeoResult};
use crate::geometry::{Crs, GeoTransform};

pub use nodata::{NodataMask, NodataStrategy};

/// 1-based band indices of the visible channels
pub const RGB_BANDS: [usize; 3] = [1, 2, 3];

/// Pixel grid read from a georeferenced raster file
#[derive(Debug, Clone)]
pub struct RasterTile {
    pub path: PathBuf,
    pub width: usize,
    pub height: usize,
    /// One row-major plane per selected band
    pub bands: Vec<Vec<f32>>,
    pub transform: GeoTransform,
    pub crs: Option<Crs>,
    pub nodata: Option<f64>,
}

impl RasterTile {
    pub fn band_count(&self) -> usize {
        self.bands.len()
    }

    /// File name without its directory (used to tag exports)
    pub fn file_name(&self) -> String {
        file_name(&self.path)
    }

    pub fn nodata_strategy(&self) -> NodataStrategy {
        NodataStrategy::for_sentinel(self.nodata)
    }

    /// Nodata mask of the raw grid (no reprojection)
    pub fn nodata_mask(&self) -> NodataMask {
        NodataMask::compute(&self.bands, self.width, self.height, self.nodata_strategy())
    }
}

/// Last component of `path` as a string, empty if there is none
pub fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Open a GeoTIFF and read the requested bands (1-based indices).
///
/// The file handle lives only for the duration of this call.
pub fn open_raster<P: AsRef<Path>>(path: P, bands: &[usize]) -> GeoResult<RasterTile> {
    let path = path.as_ref();
    let decoded = {
        let file = File::open(path)?;
        geotiff::decode(BufReader::new(file))?
    };

    let available = decoded.planes.len();
    if let Some(&bad) = bands.iter().find(|&&b| b == 0 || b > available) {
        return Err(GeoError::Format(format!(
            "{}: band {bad} requested but raster has {available} band(s)",
            path.display()
        )));
    }

    let selected = bands.iter().map(|&b| decoded.planes[b - 1].clone()).collect();

    let meta = decoded.metadata;
    Ok(RasterTile {
        path: path.to_path_buf(),
        width: meta.width,
        height: meta.height,
        bands: selected,
        transform: meta.transform,
        crs: meta.crs,
        nodata: meta.nodata,
    })
}
