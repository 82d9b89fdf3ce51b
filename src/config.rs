use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use crate::detection::SliceConfig;
use crate::geometry::Crs;

/// Run configuration.
///
/// Loaded from a JSON file where every field is optional, then overridden by
/// command line flags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Directory scanned for `.tif` / `.tiff` inputs
    pub input_dir: PathBuf,
    /// Root of every generated artifact
    pub output_dir: PathBuf,
    /// Detector model file
    pub model_path: Option<PathBuf>,
    pub slice_size: u32,
    pub overlap_ratio: f32,
    pub confidence_threshold: f32,
    /// Intersection-over-smaller at which cross-slice boxes merge
    pub match_threshold: f64,
    /// Whole-image prediction on top of the slices
    pub full_image_pass: bool,
    /// Only the first N inputs (sorted by name) are processed
    pub batch_limit: Option<usize>,
    pub target_epsg: u32,
    /// Second location receiving a copy of the detections JSON.
    /// Defaults to `front/public/detections/` next to `output_dir`.
    pub detections_mirror: Option<PathBuf>,
    /// Log and skip unreadable rasters instead of aborting the run
    pub skip_invalid: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("raw_tifs"),
            output_dir: PathBuf::from("output"),
            model_path: None,
            slice_size: 512,
            overlap_ratio: 0.1,
            confidence_threshold: 0.4,
            match_threshold: 0.5,
            full_image_pass: true,
            batch_limit: Some(100),
            target_epsg: 4326,
            detections_mirror: None,
            skip_invalid: false,
        }
    }
}

impl PipelineConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Self =
            serde_json::from_str(&raw).with_context(|| format!("Invalid config {}", path.display()))?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.slice_size == 0 {
            bail!("slice_size must be positive");
        }
        if !(0.0..1.0).contains(&self.overlap_ratio) {
            bail!("overlap_ratio must be in [0, 1), got {}", self.overlap_ratio);
        }
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            bail!("confidence_threshold must be in [0, 1], got {}", self.confidence_threshold);
        }
        if self.batch_limit == Some(0) {
            bail!("batch_limit must be at least 1");
        }
        Ok(())
    }

    pub fn target_crs(&self) -> Crs {
        Crs(self.target_epsg)
    }

    pub fn tiles_dir(&self) -> PathBuf {
        self.output_dir.join("tiles")
    }

    pub fn detections_path(&self) -> PathBuf {
        self.output_dir.join("detections.json")
    }

    /// Where the front end picks up detections
    pub fn detections_mirror_path(&self) -> PathBuf {
        match &self.detections_mirror {
            Some(path) => path.clone(),
            None => self
                .output_dir
                .parent()
                .unwrap_or(&self.output_dir)
                .join("front/public/detections/detections.json"),
        }
    }

    pub fn metrics_path(&self) -> PathBuf {
        self.output_dir.join("metrics.json")
    }

    pub fn slice_config(&self) -> SliceConfig {
        SliceConfig {
            slice_width: self.slice_size,
            slice_height: self.slice_size,
            overlap_width_ratio: self.overlap_ratio,
            overlap_height_ratio: self.overlap_ratio,
            confidence_threshold: self.confidence_threshold,
            match_threshold: self.match_threshold,
            full_image_pass: self.full_image_pass,
        }
    }
}
