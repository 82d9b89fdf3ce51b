//! Error types for raster loading, reprojection and export.

use std::path::PathBuf;

use crate::geometry::Crs;

#[derive(Debug)]
pub enum GeoError {
    /// File could not be opened, read or written
    Io(std::io::Error),
    /// TIFF container could not be decoded
    Tiff(String),
    /// Raster is readable but not usable (missing georeferencing, too few bands, ...)
    Format(String),
    /// Coordinate transformation failed
    Projection(String),
    /// Detection batch carried no CRS (empty batch or ungeoreferenced inputs)
    NoCrs,
    /// A file in the batch declared a different CRS than the batch
    CrsMismatch {
        file: PathBuf,
        expected: Crs,
        found: Crs,
    },
    /// Image encoding failed
    Image(String),
    /// JSON serialization failed
    Json(String),
}

impl std::fmt::Display for GeoError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GeoError::Io(e) => write!(f, "I/O error: {e}"),
            GeoError::Tiff(msg) => write!(f, "TIFF error: {msg}"),
            GeoError::Format(msg) => write!(f, "Format error: {msg}"),
            GeoError::Projection(msg) => write!(f, "Projection error: {msg}"),
            GeoError::NoCrs => write!(f, "No CRS detected, did you have any valid images?"),
            GeoError::CrsMismatch { file, expected, found } => write!(
                f,
                "CRS mismatch in {}: batch uses {expected}, file declares {found}",
                file.display()
            ),
            GeoError::Image(msg) => write!(f, "Image error: {msg}"),
            GeoError::Json(msg) => write!(f, "JSON error: {msg}"),
        }
    }
}

impl std::error::Error for GeoError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GeoError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for GeoError {
    fn from(err: std::io::Error) -> Self {
        GeoError::Io(err)
    }
}

impl From<tiff::TiffError> for GeoError {
    fn from(err: tiff::TiffError) -> Self {
        match err {
            tiff::TiffError::IoError(e) => GeoError::Io(e),
            other => GeoError::Tiff(other.to_string()),
        }
    }
}

impl From<image::ImageError> for GeoError {
    fn from(err: image::ImageError) -> Self {
        GeoError::Image(err.to_string())
    }
}

impl From<serde_json::Error> for GeoError {
    fn from(err: serde_json::Error) -> Self {
        GeoError::Json(err.to_string())
    }
}

pub type GeoResult<T> = Result<T, GeoError>;
