use std::path::PathBuf;

use anyhow::{Context, anyhow};
use clap::{Parser, Subcommand};
use env_logger::{Builder, Env};

use geotiles::detection::yolo::YoloDetector;
use geotiles::{Pipeline, PipelineConfig, RunReport, Stages};

#[derive(Parser)]
#[command(name = "geotiles")]
#[command(about = "Export map tiles and georeferenced detections from GeoTIFF scenes")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// JSON configuration file (flags below override it)
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Directory containing .tif/.tiff scenes
    #[arg(long, value_name = "DIR", global = true)]
    input: Option<PathBuf>,

    /// Directory receiving tiles/, detections.json and metrics.json
    #[arg(long, value_name = "DIR", global = true)]
    output: Option<PathBuf>,

    /// Detector model file
    #[arg(long, value_name = "FILE", global = true)]
    model: Option<PathBuf>,

    /// Process only the first N scenes
    #[arg(long, value_name = "N", global = true)]
    limit: Option<usize>,

    /// Square slice size in pixels
    #[arg(long, value_name = "PX", global = true)]
    slice_size: Option<u32>,

    /// Overlap between neighbouring slices, as a ratio of the slice size
    #[arg(long, value_name = "RATIO", global = true)]
    overlap: Option<f32>,

    /// Minimum detection confidence
    #[arg(long, value_name = "SCORE", global = true)]
    confidence: Option<f32>,

    /// EPSG code of the output coordinates
    #[arg(long, value_name = "CODE", global = true)]
    target_epsg: Option<u32>,

    /// Second copy of the detections (default: front/public/detections/ beside the output)
    #[arg(long, value_name = "FILE", global = true)]
    mirror: Option<PathBuf>,

    /// Skip the extra whole-image prediction on multi-slice scenes
    #[arg(long, global = true)]
    no_full_image: bool,

    /// Save detection previews to directory (must be empty)
    #[arg(long, value_name = "DIR", global = true)]
    debug_out: Option<PathBuf>,

    /// Log and skip unreadable scenes instead of stopping
    #[arg(long, global = true)]
    skip_invalid: bool,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Clone, Copy)]
enum Command {
    /// Reproject scenes and export RGBA PNG tiles with a manifest
    Tiles,
    /// Run sliced detection and export georeferenced detections
    Detect,
    /// Both of the above, reading each scene once
    Run,
}

impl Cli {
    fn pipeline_config(&self) -> anyhow::Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::load(path)?,
            None => PipelineConfig::default(),
        };

        if let Some(input) = &self.input {
            config.input_dir = input.clone();
        }
        if let Some(output) = &self.output {
            config.output_dir = output.clone();
        }
        if let Some(model) = &self.model {
            config.model_path = Some(model.clone());
        }
        if let Some(limit) = self.limit {
            config.batch_limit = Some(limit);
        }
        if let Some(size) = self.slice_size {
            config.slice_size = size;
        }
        if let Some(overlap) = self.overlap {
            config.overlap_ratio = overlap;
        }
        if let Some(confidence) = self.confidence {
            config.confidence_threshold = confidence;
        }
        if let Some(epsg) = self.target_epsg {
            config.target_epsg = epsg;
        }
        if let Some(mirror) = &self.mirror {
            config.detections_mirror = Some(mirror.clone());
        }
        config.skip_invalid |= self.skip_invalid;
        if self.no_full_image {
            config.full_image_pass = false;
        }

        config.validate()?;
        Ok(config)
    }
}

fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    let default_filter = if args.verbose { "debug" } else { "info" };
    let mut builder = Builder::from_env(Env::default().default_filter_or(default_filter));
    builder.format_timestamp_secs();
    builder.init();

    let config = args.pipeline_config()?;
    let stages = match args.command {
        Command::Tiles => Stages::Tiles,
        Command::Detect => Stages::Detections,
        Command::Run => Stages::All,
    };

    let mut pipeline = Pipeline::new(config.clone()).with_verbose(args.verbose);

    if stages != Stages::Tiles {
        let model_path = config
            .model_path
            .as_ref()
            .ok_or_else(|| anyhow!("A detector model is required (--model or model_path)"))?;
        let detector = YoloDetector::from_model_file(model_path, config.slice_config())
            .with_context(|| format!("Failed to set up detector from {}", model_path.display()))?;
        pipeline = pipeline.with_detector(Box::new(detector));
    }

    if let Some(debug_dir) = args.debug_out {
        pipeline = pipeline.with_debug(debug_dir)?;
    }

    let report = pipeline.run_stages(stages)?;
    print_report(&config, &report);

    Ok(())
}

fn print_report(config: &PipelineConfig, report: &RunReport) {
    println!("\n=== Run Results ===");
    println!("Images processed: {}", report.processed.len());
    if !report.skipped.is_empty() {
        println!("Images skipped: {}", report.skipped.len());
    }

    if !report.tiles.is_empty() {
        println!("Tiles exported: {} ({})", report.tiles.len(), config.tiles_dir().display());
    }

    if let Some(summary) = &report.summary {
        println!("Detections: {} ({})", summary.num_detections, config.detections_path().display());
        match summary.avg_seconds_per_image {
            Some(avg) => println!("Inference: {:.2}s total, {:.2}s per image", summary.total_seconds, avg),
            None => println!("Inference: {:.2}s total", summary.total_seconds),
        }
    }
}
