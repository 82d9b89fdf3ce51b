//! Six-parameter affine transform between pixel space and CRS coordinates.
//!
//! Uses the rasterio/affine parameter order:
//!
//! ```text
//! x = a * col + b * row + c
//! y = d * col + e * row + f
//! ```

use super::GeoBounds;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoTransform {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl GeoTransform {
    pub fn new(a: f64, b: f64, c: f64, d: f64, e: f64, f: f64) -> Self {
        Self { a, b, c, d, e, f }
    }

    /// North-up transform with the top-left corner at (`origin_x`, `origin_y`)
    pub fn from_origin(origin_x: f64, origin_y: f64, pixel_width: f64, pixel_height: f64) -> Self {
        Self::new(pixel_width, 0.0, origin_x, 0.0, -pixel_height, origin_y)
    }

    /// Transform from a GeoTIFF tiepoint + pixel scale pair.
    ///
    /// The tiepoint ties raster (i, j) to model (x, y); scale Y is positive for
    /// north-up rasters, so the row axis is negated.
    pub fn from_tiepoint(tiepoint: &[f64], scale: &[f64]) -> Option<Self> {
        if tiepoint.len() < 6 || scale.len() < 2 {
            return None;
        }
        let (i, j, x, y) = (tiepoint[0], tiepoint[1], tiepoint[3], tiepoint[4]);
        let (sx, sy) = (scale[0], scale[1]);
        Some(Self::new(sx, 0.0, x - i * sx, 0.0, -sy, y + j * sy))
    }

    /// Transform from a GeoTIFF ModelTransformation 4x4 matrix (row-major)
    pub fn from_model_transformation(matrix: &[f64]) -> Option<Self> {
        if matrix.len() < 16 {
            return None;
        }
        Some(Self::new(matrix[0], matrix[1], matrix[3], matrix[4], matrix[5], matrix[7]))
    }

    /// Map pixel coordinates (col, row) to CRS coordinates
    #[inline]
    pub fn apply(&self, col: f64, row: f64) -> (f64, f64) {
        (
            self.a * col + self.b * row + self.c,
            self.d * col + self.e * row + self.f,
        )
    }

    /// Same grid with its origin moved by (`cols`, `rows`) pixels
    pub fn offset_pixels(&self, cols: f64, rows: f64) -> Self {
        let (c, f) = self.apply(cols, rows);
        Self { c, f, ..*self }
    }

    pub fn determinant(&self) -> f64 {
        self.a * self.e - self.b * self.d
    }

    /// Inverse transform (CRS → pixel), `None` if degenerate
    pub fn inverse(&self) -> Option<Self> {
        let det = self.determinant();
        if det == 0.0 || !det.is_finite() {
            return None;
        }
        let inv = 1.0 / det;
        let a = self.e * inv;
        let b = -self.b * inv;
        let d = -self.d * inv;
        let e = self.a * inv;
        Some(Self::new(a, b, -a * self.c - b * self.f, d, e, -d * self.c - e * self.f))
    }

    /// Bounds of a `width` x `height` grid, ordered on both axes
    pub fn array_bounds(&self, width: usize, height: usize) -> GeoBounds {
        let (w, h) = (width as f64, height as f64);
        let mut bounds = GeoBounds::from_corners(self.apply(0.0, 0.0), self.apply(w, h));
        for (x, y) in [self.apply(w, 0.0), self.apply(0.0, h)] {
            bounds.west = bounds.west.min(x);
            bounds.south = bounds.south.min(y);
            bounds.east = bounds.east.max(x);
            bounds.north = bounds.north.max(y);
        }
        bounds
    }
}

impl Default for GeoTransform {
    fn default() -> Self {
        Self::new(1.0, 0.0, 0.0, 0.0, 1.0, 0.0)
    }
}
