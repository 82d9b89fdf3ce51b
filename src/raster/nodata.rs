//! Nodata masks.
//!
//! A pixel is nodata either because it equals a declared sentinel, or, when
//! the raster declares none, because of the all-zero RGB heuristic. The
//! heuristic is an approximation (true black pixels are dropped too) and is
//! kept as its own strategy so callers can tell the two apart.

/// How nodata pixels are recognised
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NodataStrategy {
    /// Pixels whose first band equals the declared sentinel
    Sentinel(f64),
    /// Fallback: pixels where the first three bands are all exactly zero
    ZeroRgb,
}

impl NodataStrategy {
    /// Sentinel strategy if one is declared, the zero-RGB fallback otherwise
    pub fn for_sentinel(nodata: Option<f64>) -> Self {
        match nodata {
            Some(value) => NodataStrategy::Sentinel(value),
            None => NodataStrategy::ZeroRgb,
        }
    }
}

/// Boolean grid, `true` where a pixel is nodata
#[derive(Debug, Clone, PartialEq)]
pub struct NodataMask {
    pub width: usize,
    pub height: usize,
    data: Vec<bool>,
}

impl NodataMask {
    /// Mask with every pixel valid
    pub fn all_valid(width: usize, height: usize) -> Self {
        Self { width, height, data: vec![false; width * height] }
    }

    pub fn from_vec(width: usize, height: usize, data: Vec<bool>) -> Self {
        assert_eq!(data.len(), width * height, "mask length must match grid size");
        Self { width, height, data }
    }

    /// Compute a mask from band planes (each `width * height` long)
    pub fn compute(bands: &[Vec<f32>], width: usize, height: usize, strategy: NodataStrategy) -> Self {
        let len = width * height;
        let data = match strategy {
            NodataStrategy::Sentinel(value) => {
                let sentinel = value as f32;
                match bands.first() {
                    Some(first) if sentinel.is_nan() => first.iter().take(len).map(|v| v.is_nan()).collect(),
                    Some(first) => first.iter().take(len).map(|&v| v == sentinel).collect(),
                    None => vec![false; len],
                }
            }
            NodataStrategy::ZeroRgb => {
                if bands.len() < 3 {
                    vec![false; len]
                } else {
                    (0..len)
                        .map(|i| bands[0][i] == 0.0 && bands[1][i] == 0.0 && bands[2][i] == 0.0)
                        .collect()
                }
            }
        };
        Self { width, height, data }
    }

    #[inline]
    pub fn is_nodata(&self, x: usize, y: usize) -> bool {
        self.data[y * self.width + x]
    }

    pub fn as_slice(&self) -> &[bool] {
        &self.data
    }

    pub fn nodata_count(&self) -> usize {
        self.data.iter().filter(|&&m| m).count()
    }

    pub fn valid_count(&self) -> usize {
        self.data.len() - self.nodata_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinel_uses_first_band() {
        let bands = vec![vec![0.0, 5.0, 0.0, 9.0], vec![1.0, 0.0, 0.0, 0.0], vec![1.0, 1.0, 0.0, 0.0]];
        let mask = NodataMask::compute(&bands, 2, 2, NodataStrategy::Sentinel(0.0));
        assert_eq!(mask.as_slice(), &[true, false, true, false]);
        assert!(mask.is_nodata(0, 1));
        assert_eq!(mask.valid_count(), 2);
    }

    #[test]
    fn test_zero_rgb_requires_all_three_bands() {
        let bands = vec![vec![0.0, 5.0, 0.0, 0.0], vec![1.0, 0.0, 0.0, 0.0], vec![0.0, 1.0, 0.0, 3.0]];
        let mask = NodataMask::compute(&bands, 4, 1, NodataStrategy::ZeroRgb);
        assert_eq!(mask.as_slice(), &[false, false, true, false]);
    }

    #[test]
    fn test_strategy_selection() {
        assert_eq!(NodataStrategy::for_sentinel(Some(255.0)), NodataStrategy::Sentinel(255.0));
        assert_eq!(NodataStrategy::for_sentinel(None), NodataStrategy::ZeroRgb);
    }
}
