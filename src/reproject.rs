//! Raster reprojection.
//!
//! The [`Reprojector`] trait is the seam between the pipeline and the
//! coordinate library: it only needs to move points between two CRSs, and the
//! default [`Reprojector::reproject`] builds a destination grid and resamples
//! bilinearly on top of that. [`ProjReprojector`] is backed by proj4rs;
//! [`IdentityReprojector`] leaves coordinates untouched.

use log::debug;

use crate::error::{GeoError, GeoResult};
use crate::geometry::projection::CoordTransformer;
use crate::geometry::{Crs, GeoBounds, GeoTransform};
use crate::raster::{NodataMask, NodataStrategy, RasterTile};

/// Points sampled along each source edge when estimating the output extent
const EDGE_SAMPLES: usize = 21;

/// A raster resampled onto a grid in another CRS
#[derive(Debug, Clone)]
pub struct ReprojectedGrid {
    pub width: usize,
    pub height: usize,
    pub bands: Vec<Vec<f32>>,
    pub transform: GeoTransform,
    pub crs: Crs,
    pub nodata: Option<f64>,
}

impl ReprojectedGrid {
    /// Nodata mask on the destination grid.
    ///
    /// Sentinel rasters compare against the sentinel; others fall back to the
    /// all-zero RGB heuristic.
    pub fn nodata_mask(&self) -> NodataMask {
        NodataMask::compute(
            &self.bands,
            self.width,
            self.height,
            NodataStrategy::for_sentinel(self.nodata),
        )
    }

    pub fn bounds(&self) -> GeoBounds {
        self.transform.array_bounds(self.width, self.height)
    }
}

/// Coordinate reprojection capability
pub trait Reprojector {
    /// Transform points in place from `src` to `dst`.
    ///
    /// Points that cannot be transformed are set to NaN; an error means the
    /// CRS pair itself is unusable.
    fn transform_points(&self, src: Crs, dst: Crs, points: &mut [(f64, f64)]) -> GeoResult<()>;

    /// Resample a raster into `dst`
    fn reproject(&self, tile: &RasterTile, dst: Crs) -> GeoResult<ReprojectedGrid> {
        warp_bilinear(self, tile, dst)
    }
}

/// proj4rs-backed reprojection
#[derive(Debug, Default, Clone, Copy)]
pub struct ProjReprojector;

impl Reprojector for ProjReprojector {
    fn transform_points(&self, src: Crs, dst: Crs, points: &mut [(f64, f64)]) -> GeoResult<()> {
        if src == dst {
            return Ok(());
        }
        let transformer = CoordTransformer::new(src.epsg(), dst.epsg()).map_err(GeoError::Projection)?;
        for p in points.iter_mut() {
            *p = transformer.transform(p.0, p.1).unwrap_or((f64::NAN, f64::NAN));
        }
        Ok(())
    }

    fn reproject(&self, tile: &RasterTile, dst: Crs) -> GeoResult<ReprojectedGrid> {
        if tile.crs == Some(dst) {
            return Ok(IdentityReprojector.copy_grid(tile, dst));
        }
        warp_bilinear(self, tile, dst)
    }
}

/// Treats every CRS as the same coordinate space
#[derive(Debug, Default, Clone, Copy)]
pub struct IdentityReprojector;

impl IdentityReprojector {
    fn copy_grid(&self, tile: &RasterTile, dst: Crs) -> ReprojectedGrid {
        ReprojectedGrid {
            width: tile.width,
            height: tile.height,
            bands: tile.bands.clone(),
            transform: tile.transform,
            crs: dst,
            nodata: tile.nodata,
        }
    }
}

impl Reprojector for IdentityReprojector {
    fn transform_points(&self, _src: Crs, _dst: Crs, _points: &mut [(f64, f64)]) -> GeoResult<()> {
        Ok(())
    }

    fn reproject(&self, tile: &RasterTile, dst: Crs) -> GeoResult<ReprojectedGrid> {
        Ok(self.copy_grid(tile, dst))
    }
}

/// Destination transform and size covering the source extent in `dst`.
///
/// The extent comes from points sampled along the source edges. Pixels are
/// square, sized so the destination diagonal holds as many pixels as the
/// source diagonal.
pub fn default_transform<R: Reprojector + ?Sized>(
    reprojector: &R,
    src: Crs,
    dst: Crs,
    src_transform: &GeoTransform,
    width: usize,
    height: usize,
) -> GeoResult<(GeoTransform, usize, usize)> {
    if width == 0 || height == 0 {
        return Err(GeoError::Format("cannot reproject an empty raster".to_string()));
    }

    let (w, h) = (width as f64, height as f64);
    let mut points = Vec::with_capacity(EDGE_SAMPLES * 4);
    for i in 0..EDGE_SAMPLES {
        let t = i as f64 / (EDGE_SAMPLES - 1) as f64;
        points.push(src_transform.apply(t * w, 0.0));
        points.push(src_transform.apply(t * w, h));
        points.push(src_transform.apply(0.0, t * h));
        points.push(src_transform.apply(w, t * h));
    }
    reprojector.transform_points(src, dst, &mut points)?;
    points.retain(|(x, y)| x.is_finite() && y.is_finite());

    let bounds = GeoBounds::enclosing(&points)
        .ok_or_else(|| GeoError::Projection(format!("raster extent cannot be projected from {src} to {dst}")))?;

    let dst_diagonal = bounds.width().hypot(bounds.height());
    let src_diagonal = w.hypot(h);
    let pixel_size = dst_diagonal / src_diagonal;
    if !(pixel_size > 0.0) {
        return Err(GeoError::Projection(format!("degenerate extent after projecting to {dst}")));
    }

    let dst_width = ((bounds.width() / pixel_size + 0.5) as usize).max(1);
    let dst_height = ((bounds.height() / pixel_size + 0.5) as usize).max(1);
    let transform = GeoTransform::from_origin(bounds.west, bounds.north, pixel_size, pixel_size);

    Ok((transform, dst_width, dst_height))
}

/// Sample one band at fractional pixel position, skipping invalid neighbours.
///
/// `fx`/`fy` are in pixel-centre space (0.0 is the centre of the first pixel).
fn sample_bilinear(
    plane: &[f32],
    invalid: Option<&NodataMask>,
    width: usize,
    height: usize,
    fx: f64,
    fy: f64,
) -> Option<f32> {
    let x0 = fx.floor();
    let y0 = fy.floor();
    let wx = fx - x0;
    let wy = fy - y0;

    let clamp_x = |x: f64| (x.max(0.0) as usize).min(width - 1);
    let clamp_y = |y: f64| (y.max(0.0) as usize).min(height - 1);
    let (xa, xb) = (clamp_x(x0), clamp_x(x0 + 1.0));
    let (ya, yb) = (clamp_y(y0), clamp_y(y0 + 1.0));

    let neighbours = [
        (xa, ya, (1.0 - wx) * (1.0 - wy)),
        (xb, ya, wx * (1.0 - wy)),
        (xa, yb, (1.0 - wx) * wy),
        (xb, yb, wx * wy),
    ];

    let mut sum = 0.0;
    let mut weight = 0.0;
    for (x, y, w) in neighbours {
        if w <= 0.0 {
            continue;
        }
        if invalid.is_some_and(|mask| mask.is_nodata(x, y)) {
            continue;
        }
        sum += plane[y * width + x] as f64 * w;
        weight += w;
    }

    if weight > 1e-9 {
        Some((sum / weight) as f32)
    } else {
        None
    }
}

/// Bilinear warp of every band onto the default destination grid
pub fn warp_bilinear<R: Reprojector + ?Sized>(
    reprojector: &R,
    tile: &RasterTile,
    dst: Crs,
) -> GeoResult<ReprojectedGrid> {
    let src = tile
        .crs
        .ok_or_else(|| GeoError::Format(format!("{} has no CRS, cannot reproject", tile.path.display())))?;
    let src_inverse = tile
        .transform
        .inverse()
        .ok_or_else(|| GeoError::Format(format!("{} has a degenerate transform", tile.path.display())))?;

    let (dst_transform, dst_width, dst_height) =
        default_transform(reprojector, src, dst, &tile.transform, tile.width, tile.height)?;
    debug!(
        "Warping {} ({}x{}, {src}) -> {dst_width}x{dst_height} {dst}",
        tile.file_name(),
        tile.width,
        tile.height
    );

    // Only a declared sentinel excludes source pixels from the blend
    let invalid = tile.nodata.map(|_| tile.nodata_mask());
    let fill = tile.nodata.unwrap_or(0.0) as f32;

    let mut bands = vec![vec![fill; dst_width * dst_height]; tile.band_count()];
    let (w, h) = (tile.width as f64, tile.height as f64);
    let mut row = Vec::with_capacity(dst_width);

    for y in 0..dst_height {
        row.clear();
        row.extend((0..dst_width).map(|x| dst_transform.apply(x as f64 + 0.5, y as f64 + 0.5)));
        reprojector.transform_points(dst, src, &mut row)?;

        for (x, &(sx, sy)) in row.iter().enumerate() {
            if !sx.is_finite() || !sy.is_finite() {
                continue;
            }
            let (col, line) = src_inverse.apply(sx, sy);
            if col < 0.0 || line < 0.0 || col > w || line > h {
                continue;
            }
            let idx = y * dst_width + x;
            for (band, out) in tile.bands.iter().zip(bands.iter_mut()) {
                if let Some(value) =
                    sample_bilinear(band, invalid.as_ref(), tile.width, tile.height, col - 0.5, line - 0.5)
                {
                    out[idx] = value;
                }
            }
        }
    }

    Ok(ReprojectedGrid {
        width: dst_width,
        height: dst_height,
        bands,
        transform: dst_transform,
        crs: dst,
        nodata: tile.nodata,
    })
}
