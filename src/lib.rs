pub mod config;
pub mod detection;
pub mod error;
pub mod export;
pub mod geometry;
pub mod georef;
pub mod models;
pub mod pipeline;
pub mod raster;
pub mod render;
pub mod reproject;

pub use config::PipelineConfig;
pub use detection::{Detector, SliceConfig, SliceModel, SlicedDetector};
pub use error::{GeoError, GeoResult};
pub use geometry::{Crs, GeoBounds, GeoTransform};
pub use georef::DetectionBatch;
pub use models::{Detection, DetectionRecord, GeoDetection, RunSummary, TileRecord};
pub use pipeline::{DebugConfig, Pipeline, PipelineContext, RunReport, Stages};
pub use raster::{RasterTile, open_raster};
pub use reproject::{IdentityReprojector, ProjReprojector, ReprojectedGrid, Reprojector};
