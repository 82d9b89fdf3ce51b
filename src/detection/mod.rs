pub mod slicing;
pub mod yolo;

use anyhow::Result;
use image::RgbImage;
use log::debug;

use crate::models::Detection;
use slicing::{SliceWindow, greedy_merge, slice_windows};

/// Object detector over a full normalized image.
///
/// Returned boxes are in the image's pixel coordinates.
pub trait Detector {
    fn detect(&self, image: &RgbImage) -> Result<Vec<Detection>>;

    /// Human-readable name (used in logs)
    fn name(&self) -> &str;
}

/// A model that predicts on one window-sized image at a time
pub trait SliceModel {
    /// Detections in the slice's own pixel coordinates
    fn predict(&self, slice: &RgbImage) -> Result<Vec<Detection>>;

    fn name(&self) -> &str;
}

/// Sliding-window parameters
#[derive(Debug, Clone, Copy)]
pub struct SliceConfig {
    pub slice_width: u32,
    pub slice_height: u32,
    pub overlap_width_ratio: f32,
    pub overlap_height_ratio: f32,
    /// Detections below this confidence are dropped
    pub confidence_threshold: f32,
    /// Intersection-over-smaller at which cross-slice boxes are merged
    pub match_threshold: f64,
    /// Also predict on the whole image when it spans several windows,
    /// so objects larger than a slice are still found
    pub full_image_pass: bool,
}

impl Default for SliceConfig {
    fn default() -> Self {
        Self {
            slice_width: 512,
            slice_height: 512,
            overlap_width_ratio: 0.1,
            overlap_height_ratio: 0.1,
            confidence_threshold: 0.4,
            match_threshold: 0.5,
            full_image_pass: true,
        }
    }
}

/// Runs a [`SliceModel`] over overlapping windows and stitches the results
pub struct SlicedDetector<M> {
    model: M,
    config: SliceConfig,
}

impl<M: SliceModel> SlicedDetector<M> {
    pub fn new(model: M, config: SliceConfig) -> Self {
        Self { model, config }
    }

    pub fn config(&self) -> &SliceConfig {
        &self.config
    }

    pub fn windows(&self, image: &RgbImage) -> Vec<SliceWindow> {
        slice_windows(
            image.width(),
            image.height(),
            self.config.slice_width,
            self.config.slice_height,
            self.config.overlap_width_ratio,
            self.config.overlap_height_ratio,
        )
    }
}

impl<M: SliceModel> SlicedDetector<M> {
    fn confident(&self, found: Vec<Detection>) -> impl Iterator<Item = Detection> {
        let threshold = self.config.confidence_threshold;
        found.into_iter().filter(move |d| d.score >= threshold)
    }
}

impl<M: SliceModel> Detector for SlicedDetector<M> {
    fn detect(&self, image: &RgbImage) -> Result<Vec<Detection>> {
        let windows = self.windows(image);
        let mut all = Vec::new();

        for window in &windows {
            let slice = image::imageops::crop_imm(image, window.x, window.y, window.width, window.height).to_image();
            let found = self.model.predict(&slice)?;
            all.extend(
                self.confident(found)
                    .map(|d| d.shifted(window.x as f64, window.y as f64)),
            );
        }

        // A single window already is the whole image
        if self.config.full_image_pass && windows.len() > 1 {
            let found = self.model.predict(image)?;
            all.extend(self.confident(found));
        }

        let before = all.len();
        let merged = greedy_merge(all, self.config.match_threshold);
        debug!(
            "{}: {} windows, {} raw detections, {} after merging",
            self.model.name(),
            windows.len(),
            before,
            merged.len()
        );
        Ok(merged)
    }

    fn name(&self) -> &str {
        self.model.name()
    }
}
