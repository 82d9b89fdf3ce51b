//! YOLOv8 slice model on the rten runtime.
//!
//! Expects the standard single-output export: `[1, 4 + classes, anchors]`
//! with (cx, cy, w, h) in input pixels followed by per-class scores.

use std::path::Path;

use anyhow::{Context, Result, bail};
use image::RgbImage;
use image::imageops::FilterType;
use rten::Model;
use rten_tensor::NdTensor;
use rten_tensor::prelude::*;

use super::slicing::nms;
use super::{SliceConfig, SliceModel, SlicedDetector};
use crate::models::Detection;

/// Class names of the DIOR remote-sensing dataset, in training order
pub const DIOR_CLASSES: [&str; 20] = [
    "airplane",
    "airport",
    "baseballfield",
    "basketballcourt",
    "bridge",
    "chimney",
    "dam",
    "Expressway-Service-area",
    "Expressway-toll-station",
    "golffield",
    "groundtrackfield",
    "harbor",
    "overpass",
    "ship",
    "stadium",
    "storagetank",
    "tenniscourt",
    "trainstation",
    "vehicle",
    "windmill",
];

const PAD_VALUE: f32 = 114.0 / 255.0;

/// Sliced YOLOv8 inference over full tiles
pub type YoloDetector = SlicedDetector<YoloModel>;

/// Placement of a slice inside the square model input
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Letterbox {
    pub scale: f64,
    pub pad_x: f64,
    pub pad_y: f64,
}

impl Letterbox {
    pub fn compute(width: u32, height: u32, input_size: u32) -> Self {
        let target = input_size as f64;
        let scale = (target / width as f64).min(target / height as f64);
        let new_w = (width as f64 * scale).round();
        let new_h = (height as f64 * scale).round();
        Self {
            scale,
            pad_x: ((target - new_w) / 2.0).floor(),
            pad_y: ((target - new_h) / 2.0).floor(),
        }
    }

    /// Map a coordinate from model input space back to slice pixels
    pub fn unmap(&self, x: f64, y: f64) -> (f64, f64) {
        ((x - self.pad_x) / self.scale, (y - self.pad_y) / self.scale)
    }
}

/// Resize + centre-pad a slice into a `[1, 3, size, size]` tensor in [0, 1]
pub fn letterbox(slice: &RgbImage, input_size: u32) -> (NdTensor<f32, 4>, Letterbox) {
    let lb = Letterbox::compute(slice.width(), slice.height(), input_size);
    let new_w = ((slice.width() as f64 * lb.scale).round() as u32).clamp(1, input_size);
    let new_h = ((slice.height() as f64 * lb.scale).round() as u32).clamp(1, input_size);
    let resized = image::imageops::resize(slice, new_w, new_h, FilterType::Triangle);

    let size = input_size as usize;
    let plane = size * size;
    let mut data = vec![PAD_VALUE; 3 * plane];
    let (ox, oy) = (lb.pad_x as usize, lb.pad_y as usize);
    for (x, y, pixel) in resized.enumerate_pixels() {
        let idx = (y as usize + oy) * size + x as usize + ox;
        for c in 0..3 {
            data[c * plane + idx] = pixel.0[c] as f32 / 255.0;
        }
    }

    (NdTensor::from_data([1, 3, size, size], data), lb)
}

pub struct YoloModel {
    model: Model,
    input_size: u32,
    labels: Vec<String>,
    /// Pre-NMS candidate threshold
    score_threshold: f32,
    iou_threshold: f64,
}

impl YoloModel {
    /// Load a YOLOv8 model in a format rten understands
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            bail!("Detector model not found: {}", path.display());
        }
        let model = Model::load_file(path)
            .with_context(|| format!("Failed to load detector model {}", path.display()))?;

        Ok(Self {
            model,
            input_size: 640,
            labels: DIOR_CLASSES.iter().map(|s| s.to_string()).collect(),
            score_threshold: 0.25,
            iou_threshold: 0.7,
        })
    }

    pub fn with_input_size(mut self, input_size: u32) -> Self {
        self.input_size = input_size;
        self
    }

    pub fn with_labels(mut self, labels: Vec<String>) -> Self {
        self.labels = labels;
        self
    }

    pub fn with_score_threshold(mut self, threshold: f32) -> Self {
        self.score_threshold = threshold;
        self
    }

    fn label(&self, class: usize) -> String {
        self.labels
            .get(class)
            .cloned()
            .unwrap_or_else(|| format!("class_{class}"))
    }
}

impl YoloDetector {
    /// Load a model and wrap it in the sliding-window driver
    pub fn from_model_file<P: AsRef<Path>>(path: P, config: SliceConfig) -> Result<Self> {
        Ok(SlicedDetector::new(YoloModel::load(path)?, config))
    }
}

impl SliceModel for YoloModel {
    fn predict(&self, slice: &RgbImage) -> Result<Vec<Detection>> {
        let (input, lb) = letterbox(slice, self.input_size);
        let output: NdTensor<f32, 3> = self
            .model
            .run_one(input.view().into(), None)
            .context("Detector inference failed")?
            .try_into()
            .context("Unexpected detector output type")?;

        let [_batch, attrs, anchors] = output.shape();
        if attrs < 5 {
            bail!("Unexpected detector output shape: [{_batch}, {attrs}, {anchors}]");
        }

        let (max_x, max_y) = (slice.width() as f64, slice.height() as f64);
        let mut candidates = Vec::new();
        for i in 0..anchors {
            let (class, score) = (4..attrs)
                .map(|a| (a - 4, output[[0, a, i]]))
                .fold((0, f32::MIN), |best, cur| if cur.1 > best.1 { cur } else { best });
            if score < self.score_threshold {
                continue;
            }

            let (cx, cy) = (output[[0, 0, i]] as f64, output[[0, 1, i]] as f64);
            let (w, h) = (output[[0, 2, i]] as f64, output[[0, 3, i]] as f64);
            let (x1, y1) = lb.unmap(cx - w / 2.0, cy - h / 2.0);
            let (x2, y2) = lb.unmap(cx + w / 2.0, cy + h / 2.0);

            candidates.push(Detection::new(
                x1.clamp(0.0, max_x),
                y1.clamp(0.0, max_y),
                x2.clamp(0.0, max_x),
                y2.clamp(0.0, max_y),
                self.label(class),
                score,
            ));
        }

        Ok(nms(candidates, self.iou_threshold))
    }

    fn name(&self) -> &str {
        "YOLOv8"
    }
}
