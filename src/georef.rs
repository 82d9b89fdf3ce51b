//! Placing pixel-space detections on the map.
//!
//! Boxes are first mapped through each raster's affine transform into that
//! raster's CRS, collected into a [`DetectionBatch`], then reprojected in one
//! pass to the target CRS (normally WGS84 longitude/latitude).

use std::path::PathBuf;

use log::{debug, warn};

use crate::error::{GeoError, GeoResult};
use crate::geometry::{Crs, GeoBounds, GeoTransform};
use crate::models::{Detection, GeoDetection, round_score};
use crate::reproject::Reprojector;

/// A detection rectangle in its source raster's CRS
#[derive(Debug, Clone, PartialEq)]
pub struct SourceRect {
    pub file: String,
    pub label: String,
    pub score: f64,
    pub bounds: GeoBounds,
}

impl SourceRect {
    /// Corners in ring order starting at south-west
    pub fn corners(&self) -> [(f64, f64); 4] {
        let b = &self.bounds;
        [(b.west, b.south), (b.east, b.south), (b.east, b.north), (b.west, b.north)]
    }
}

/// Map a pixel box through `transform`, ordering each axis afterwards.
///
/// North-up rasters have a negative row scale, so the box's top edge lands on
/// the larger y; min/max correction keeps the rectangle well formed either way.
pub fn pixel_box_to_crs(transform: &GeoTransform, det: &Detection) -> GeoBounds {
    let a = transform.apply(det.minx, det.miny);
    let b = transform.apply(det.maxx, det.maxy);
    GeoBounds::from_corners(a, b)
}

/// Area-weighted centroid of a simple polygon (shoelace formula).
///
/// Degenerate rings fall back to the vertex mean.
pub fn polygon_centroid(ring: &[(f64, f64)]) -> (f64, f64) {
    let n = ring.len();
    if n == 0 {
        return (f64::NAN, f64::NAN);
    }

    // Shift to the first vertex to keep the cross products well conditioned
    let (ox, oy) = ring[0];
    let mut area2 = 0.0;
    let mut cx = 0.0;
    let mut cy = 0.0;
    for i in 0..n {
        let (x0, y0) = (ring[i].0 - ox, ring[i].1 - oy);
        let (x1, y1) = (ring[(i + 1) % n].0 - ox, ring[(i + 1) % n].1 - oy);
        let cross = x0 * y1 - x1 * y0;
        area2 += cross;
        cx += (x0 + x1) * cross;
        cy += (y0 + y1) * cross;
    }

    if area2.abs() < f64::EPSILON * 1e3 {
        let sx: f64 = ring.iter().map(|p| p.0).sum();
        let sy: f64 = ring.iter().map(|p| p.1).sum();
        return (sx / n as f64, sy / n as f64);
    }

    (ox + cx / (3.0 * area2), oy + cy / (3.0 * area2))
}

/// Detections of a whole batch of rasters, pending reprojection
#[derive(Debug, Default)]
pub struct DetectionBatch {
    crs: Option<Crs>,
    rects: Vec<SourceRect>,
}

impl DetectionBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// CRS shared by every georeferenced file added so far
    pub fn crs(&self) -> Option<Crs> {
        self.crs
    }

    pub fn len(&self) -> usize {
        self.rects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rects.is_empty()
    }

    pub fn rects(&self) -> &[SourceRect] {
        &self.rects
    }

    /// Add one raster's detections.
    ///
    /// The first CRS seen becomes the batch CRS. A later file in another CRS
    /// is rejected and leaves the batch untouched.
    pub fn add_file(
        &mut self,
        file: &str,
        crs: Option<Crs>,
        transform: &GeoTransform,
        detections: &[Detection],
    ) -> GeoResult<()> {
        match (self.crs, crs) {
            (Some(expected), Some(found)) if expected != found => {
                return Err(GeoError::CrsMismatch {
                    file: PathBuf::from(file),
                    expected,
                    found,
                });
            }
            (None, Some(found)) => self.crs = Some(found),
            (_, None) => warn!("{file} carries no CRS, assuming the batch CRS"),
            _ => {}
        }

        self.rects.extend(detections.iter().map(|det| SourceRect {
            file: file.to_string(),
            label: det.label.clone(),
            score: round_score(det.score),
            bounds: pixel_box_to_crs(transform, det),
        }));
        debug!("{file}: {} detection(s) queued", detections.len());
        Ok(())
    }

    /// Reproject every rectangle into `target`.
    ///
    /// All corners go through the reprojector in a single call. Output order
    /// matches insertion order.
    pub fn project<R: Reprojector + ?Sized>(&self, target: Crs, reprojector: &R) -> GeoResult<Vec<GeoDetection>> {
        let src = self.crs.ok_or(GeoError::NoCrs)?;

        let mut points: Vec<(f64, f64)> = self.rects.iter().flat_map(|r| r.corners()).collect();
        reprojector.transform_points(src, target, &mut points)?;

        self.rects
            .iter()
            .zip(points.chunks_exact(4))
            .map(|(rect, ring)| {
                if ring.iter().any(|(x, y)| !x.is_finite() || !y.is_finite()) {
                    return Err(GeoError::Projection(format!(
                        "{} detection in {} cannot be projected from {src} to {target}",
                        rect.label, rect.file
                    )));
                }
                let bounds = GeoBounds::enclosing(ring)
                    .ok_or_else(|| GeoError::Projection("empty detection ring".to_string()))?;
                Ok(GeoDetection {
                    file: rect.file.clone(),
                    label: rect.label.clone(),
                    score: rect.score,
                    bounds,
                    center: polygon_centroid(ring),
                })
            })
            .collect()
    }
}
