use image::RgbImage;

use crate::error::{GeoError, GeoResult};
use crate::raster::NodataMask;

/// Percentile contrast stretch to the 8-bit display range
#[derive(Debug, Clone, Copy)]
pub struct ToneNormalizer {
    pub low_percentile: f64,
    pub high_percentile: f64,
}

impl Default for ToneNormalizer {
    fn default() -> Self {
        Self {
            low_percentile: 2.0,
            high_percentile: 98.0,
        }
    }
}

/// Linear-interpolated percentile (numpy's default method).
///
/// Reorders `values`; returns `None` when empty.
pub fn percentile(values: &mut [f32], q: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let rank = (q / 100.0).clamp(0.0, 1.0) * (values.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let frac = rank - lo as f64;

    let (_, lo_value, upper) = values.select_nth_unstable_by(lo, f32::total_cmp);
    let lo_value = *lo_value as f64;
    if frac == 0.0 || upper.is_empty() {
        return Some(lo_value);
    }
    let hi_value = upper.iter().copied().fold(f32::INFINITY, f32::min) as f64;
    Some(lo_value + (hi_value - lo_value) * frac)
}

impl ToneNormalizer {
    /// (low, high) percentiles over every valid pixel of the first three bands
    pub fn valid_range(&self, bands: &[Vec<f32>], mask: &NodataMask) -> Option<(f64, f64)> {
        if bands.len() < 3 {
            return None;
        }
        let mut values: Vec<f32> = Vec::with_capacity(mask.valid_count() * 3);
        for (i, &nodata) in mask.as_slice().iter().enumerate() {
            if nodata {
                continue;
            }
            values.extend(bands[..3].iter().map(|band| band[i]).filter(|v| v.is_finite()));
        }
        let low = percentile(&mut values, self.low_percentile)?;
        let high = percentile(&mut values, self.high_percentile)?;
        Some((low, high))
    }

    /// Stretch the first three bands into an 8-bit RGB image.
    ///
    /// Every pixel is rescaled, nodata included; only the statistics skip
    /// nodata. Without valid pixels (or with a flat range) values are clipped
    /// to [0, 255] unscaled.
    pub fn normalize(&self, bands: &[Vec<f32>], mask: &NodataMask) -> GeoResult<RgbImage> {
        let (width, height) = (mask.width, mask.height);
        if bands.len() < 3 {
            return Err(GeoError::Format(format!("expected 3 bands, got {}", bands.len())));
        }
        if bands[..3].iter().any(|b| b.len() != width * height) {
            return Err(GeoError::Format("band size does not match mask".to_string()));
        }

        let (offset, factor) = match self.valid_range(bands, mask) {
            Some((low, high)) if high > low => (low, 255.0 / (high - low)),
            _ => (0.0, 1.0),
        };

        let mut buf = Vec::with_capacity(width * height * 3);
        for i in 0..width * height {
            for band in &bands[..3] {
                // Truncating cast, NaN becomes 0
                let scaled = (band[i] as f64 - offset) * factor;
                buf.push(scaled.clamp(0.0, 255.0) as u8);
            }
        }

        RgbImage::from_raw(width as u32, height as u32, buf)
            .ok_or_else(|| GeoError::Image("RGB buffer size mismatch".to_string()))
    }
}
