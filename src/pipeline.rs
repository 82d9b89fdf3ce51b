//! Batch orchestration.
//!
//! A run takes the first N rasters of the input directory (sorted by name) and
//! pushes each one, in turn, through the tile export path
//! (reproject, normalize, PNG) and/or the detection path
//! (normalize, sliced detection, georeference). Outputs are written once the
//! whole batch is done.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow};
use image::{Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info, warn};

use crate::config::PipelineConfig;
use crate::detection::Detector;
use crate::export;
use crate::georef::DetectionBatch;
use crate::models::{Detection, GeoDetection, RunSummary, TileRecord};
use crate::raster::{self, RGB_BANDS, RasterTile, open_raster};
use crate::render::{TileRasterizer, ToneNormalizer, png_file_name};
use crate::reproject::{ProjReprojector, Reprojector};

/// Debug configuration for pipeline execution
#[derive(Clone, Debug)]
pub struct DebugConfig {
    /// Root directory for debug outputs
    pub output_dir: PathBuf,
}

/// Settings shared by every stage of a run
#[derive(Clone, Debug, Default)]
pub struct PipelineContext {
    pub verbose: bool,
    pub debug: Option<DebugConfig>,
}

/// Which output paths a run produces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stages {
    Tiles,
    Detections,
    All,
}

impl Stages {
    fn tiles(self) -> bool {
        matches!(self, Stages::Tiles | Stages::All)
    }

    fn detections(self) -> bool {
        matches!(self, Stages::Detections | Stages::All)
    }
}

/// What a run produced
#[derive(Debug, Default)]
pub struct RunReport {
    /// Rasters that went through the pipeline, in processing order
    pub processed: Vec<PathBuf>,
    /// Rasters skipped as unreadable (only with `skip_invalid`)
    pub skipped: Vec<PathBuf>,
    pub tiles: Vec<TileRecord>,
    pub detections: Vec<GeoDetection>,
    pub summary: Option<RunSummary>,
}

/// Composable pipeline builder
pub struct Pipeline {
    config: PipelineConfig,
    reprojector: Box<dyn Reprojector>,
    detector: Option<Box<dyn Detector>>,
    normalizer: ToneNormalizer,
    context: PipelineContext,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            reprojector: Box::new(ProjReprojector),
            detector: None,
            normalizer: ToneNormalizer::default(),
            context: PipelineContext::default(),
        }
    }

    /// Enable verbose output
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.context.verbose = verbose;
        self
    }

    /// Enable debug previews in `output_dir`.
    /// The directory must be empty or non-existent.
    pub fn with_debug(mut self, output_dir: PathBuf) -> Result<Self> {
        if output_dir.exists() {
            let entries = std::fs::read_dir(&output_dir)?;
            if entries.count() > 0 {
                return Err(anyhow!("Debug directory is not empty: {}", output_dir.display()));
            }
        } else {
            std::fs::create_dir_all(&output_dir)?;
        }

        self.context.debug = Some(DebugConfig { output_dir });
        Ok(self)
    }

    pub fn with_reprojector(mut self, reprojector: Box<dyn Reprojector>) -> Self {
        self.reprojector = reprojector;
        self
    }

    pub fn with_detector(mut self, detector: Box<dyn Detector>) -> Self {
        self.detector = Some(detector);
        self
    }

    pub fn with_normalizer(mut self, normalizer: ToneNormalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Sorted `.tif`/`.tiff` files of the input directory, capped at the batch limit
    pub fn discover_inputs(&self) -> Result<Vec<PathBuf>> {
        let dir = &self.config.input_dir;
        if !dir.is_dir() {
            return Err(anyhow!("Input directory not found: {}", dir.display()));
        }

        let escaped = glob::Pattern::escape(&dir.to_string_lossy());
        let mut files = Vec::new();
        for ext in ["tif", "tiff"] {
            let pattern = format!("{escaped}/*.{ext}");
            for entry in glob::glob(&pattern)? {
                files.push(entry?);
            }
        }
        files.sort();
        files.dedup();

        if let Some(limit) = self.config.batch_limit {
            files.truncate(limit);
        }
        debug!("Found {} input raster(s) in {}", files.len(), dir.display());
        Ok(files)
    }

    pub fn run_tiles(&self) -> Result<RunReport> {
        self.run_stages(Stages::Tiles)
    }

    pub fn run_detections(&self) -> Result<RunReport> {
        self.run_stages(Stages::Detections)
    }

    /// Both output paths, reading each raster once
    pub fn run(&self) -> Result<RunReport> {
        self.run_stages(Stages::All)
    }

    pub fn run_stages(&self, stages: Stages) -> Result<RunReport> {
        let files = self.discover_inputs()?;
        self.run_files(&files, stages)
    }

    /// Process an explicit list of rasters
    pub fn run_files(&self, files: &[PathBuf], stages: Stages) -> Result<RunReport> {
        self.config.validate()?;
        let detector = if stages.detections() {
            Some(
                self.detector
                    .as_deref()
                    .ok_or_else(|| anyhow!("Detection requested but no detector is configured"))?,
            )
        } else {
            None
        };

        let mut rasterizer = if stages.tiles() {
            Some(TileRasterizer::new(self.config.tiles_dir())?)
        } else {
            None
        };

        info!("Starting on {} raster(s)...", files.len());
        let pb = progress_bar(files.len())?;

        let mut report = RunReport::default();
        let mut batch = DetectionBatch::new();
        let mut detect_time = Duration::ZERO;
        let mut num_raw = 0usize;

        for path in files {
            pb.set_message(raster::file_name(path));
            let started = Instant::now();
            let Some(tile) = self.open(path)? else {
                report.skipped.push(path.clone());
                pb.inc(1);
                continue;
            };
            let read_time = started.elapsed();

            if let Some(rasterizer) = rasterizer.as_mut() {
                let written = self
                    .export_tile(&tile, rasterizer)
                    .with_context(|| format!("Tile export failed for {}", path.display()))?;
                debug!("Wrote {}", written.display());
            }

            if let Some(detector) = detector {
                let started = Instant::now();
                let found = self
                    .detect_tile(detector, &tile)
                    .with_context(|| format!("Detection failed for {}", path.display()))?;
                num_raw += found.len();
                batch.add_file(&tile.file_name(), tile.crs, &tile.transform, &found)?;
                detect_time += read_time + started.elapsed();
            }

            report.processed.push(path.clone());
            pb.inc(1);
        }
        pb.finish_and_clear();

        // A batch that cannot be georeferenced writes no JSON at all
        let detections = if detector.is_some() {
            info!("Done! {} detection(s) from {} image(s)", num_raw, report.processed.len());
            info!("Total inference time: {:.2} seconds", detect_time.as_secs_f64());
            Some(
                batch
                    .project(self.config.target_crs(), self.reprojector.as_ref())
                    .context("Failed to georeference detections")?,
            )
        } else {
            None
        };

        if let Some(rasterizer) = rasterizer {
            export::write_tile_manifest(rasterizer.out_dir(), rasterizer.records())?;
            report.tiles = rasterizer.into_records();
        }

        if let Some(detections) = detections {
            export::write_detections(
                &self.config.detections_path(),
                &self.config.detections_mirror_path(),
                &detections,
            )?;

            let total_seconds = detect_time.as_secs_f64();
            let summary = RunSummary::new(report.processed.len(), detections.len(), total_seconds);
            export::write_summary(&self.config.metrics_path(), &summary)?;
            report.detections = detections;
            report.summary = Some(summary);
        }

        if !report.skipped.is_empty() {
            warn!("Skipped {} unreadable raster(s)", report.skipped.len());
        }
        Ok(report)
    }

    /// Read the visible bands, honouring `skip_invalid`
    fn open(&self, path: &Path) -> Result<Option<RasterTile>> {
        match open_raster(path, &RGB_BANDS) {
            Ok(tile) => {
                if self.context.verbose {
                    info!(
                        "Loaded {} ({}x{}, {})",
                        tile.file_name(),
                        tile.width,
                        tile.height,
                        tile.crs.map(|c| c.to_string()).unwrap_or_else(|| "no CRS".to_string())
                    );
                }
                Ok(Some(tile))
            }
            Err(err) if self.config.skip_invalid => {
                warn!("Skipping {}: {err}", path.display());
                Ok(None)
            }
            Err(err) => Err(anyhow::Error::new(err).context(format!("Failed to read {}", path.display()))),
        }
    }

    /// Reproject, stretch and write one RGBA tile
    pub fn export_tile(&self, tile: &RasterTile, rasterizer: &mut TileRasterizer) -> Result<PathBuf> {
        let grid = self.reprojector.reproject(tile, self.config.target_crs())?;
        let mask = grid.nodata_mask();
        let rgb = self.normalizer.normalize(&grid.bands, &mask)?;
        Ok(rasterizer.write_tile(&tile.path, &rgb, &mask, grid.bounds())?)
    }

    /// Stretch the raw grid and run the detector over it
    pub fn detect_tile(&self, detector: &dyn Detector, tile: &RasterTile) -> Result<Vec<Detection>> {
        let mask = tile.nodata_mask();
        let rgb = self.normalizer.normalize(&tile.bands, &mask)?;
        let found = detector.detect(&rgb)?;

        if self.context.verbose {
            info!("{}: {} detection(s) by {}", tile.file_name(), found.len(), detector.name());
        }
        if let Some(debug) = &self.context.debug {
            let out = debug.output_dir.join(png_file_name(&tile.path, "_detections"));
            draw_preview(&rgb, &found)
                .save(&out)
                .map_err(|e| anyhow!("Failed to save debug preview: {}", e))?;
            if self.context.verbose {
                info!("  Debug: saved {}", out.display());
            }
        }

        Ok(found)
    }
}

fn progress_bar(len: usize) -> Result<ProgressBar> {
    let style = ProgressStyle::default_bar()
        .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")?
        .progress_chars("#>-");
    let pb = ProgressBar::new(len as u64);
    pb.set_style(style);
    Ok(pb)
}

/// Normalized image with detection outlines, for eyeballing results
pub fn draw_preview(rgb: &RgbImage, detections: &[Detection]) -> RgbImage {
    let mut canvas = rgb.clone();
    for det in detections {
        let w = det.width().round() as u32;
        let h = det.height().round() as u32;
        if w == 0 || h == 0 {
            continue;
        }
        let rect = Rect::at(det.minx.round() as i32, det.miny.round() as i32).of_size(w, h);
        draw_hollow_rect_mut(&mut canvas, rect, Rgb([255, 0, 0]));
    }
    canvas
}
