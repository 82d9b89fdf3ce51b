use serde::{Deserialize, Serialize};

use crate::geometry::GeoBounds;

/// A single detector output in full-image pixel coordinates
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub minx: f64,
    pub miny: f64,
    pub maxx: f64,
    pub maxy: f64,
    pub label: String,
    /// Confidence in [0, 1]
    pub score: f32,
}

impl Detection {
    pub fn new(minx: f64, miny: f64, maxx: f64, maxy: f64, label: impl Into<String>, score: f32) -> Self {
        Self {
            minx,
            miny,
            maxx,
            maxy,
            label: label.into(),
            score,
        }
    }

    pub fn width(&self) -> f64 {
        (self.maxx - self.minx).max(0.0)
    }

    pub fn height(&self) -> f64 {
        (self.maxy - self.miny).max(0.0)
    }

    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    pub fn center(&self) -> (f64, f64) {
        ((self.minx + self.maxx) / 2.0, (self.miny + self.maxy) / 2.0)
    }

    /// Same box moved by (`dx`, `dy`) pixels
    pub fn shifted(&self, dx: f64, dy: f64) -> Self {
        Self {
            minx: self.minx + dx,
            miny: self.miny + dy,
            maxx: self.maxx + dx,
            maxy: self.maxy + dy,
            ..self.clone()
        }
    }

    pub fn intersection(&self, other: &Detection) -> f64 {
        let w = self.maxx.min(other.maxx) - self.minx.max(other.minx);
        let h = self.maxy.min(other.maxy) - self.miny.max(other.miny);
        if w <= 0.0 || h <= 0.0 { 0.0 } else { w * h }
    }

    /// Intersection over union
    pub fn iou(&self, other: &Detection) -> f64 {
        let inter = self.intersection(other);
        let union = self.area() + other.area() - inter;
        if union <= 0.0 { 0.0 } else { inter / union }
    }

    /// Intersection over the smaller of the two areas
    pub fn ios(&self, other: &Detection) -> f64 {
        let smaller = self.area().min(other.area());
        if smaller <= 0.0 { 0.0 } else { self.intersection(other) / smaller }
    }
}

/// Round a confidence to two decimals for export
pub fn round_score(score: f32) -> f64 {
    (score as f64 * 100.0).round() / 100.0
}

/// A detection placed on the map in longitude/latitude
#[derive(Debug, Clone, PartialEq)]
pub struct GeoDetection {
    /// Source raster file name
    pub file: String,
    pub label: String,
    /// Rounded to two decimals
    pub score: f64,
    pub bounds: GeoBounds,
    /// Centroid (lon, lat)
    pub center: (f64, f64),
}

/// One exported tile: PNG name plus `[[south, west], [north, east]]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileRecord {
    pub file: String,
    pub bounds: [[f64; 2]; 2],
}

impl TileRecord {
    pub fn new(file: impl Into<String>, bounds: GeoBounds) -> Self {
        Self {
            file: file.into(),
            bounds: bounds.to_corner_pairs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BBoxRecord {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CenterRecord {
    pub lon: f64,
    pub lat: f64,
}

/// Flattened JSON shape of a [`GeoDetection`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionRecord {
    pub file: String,
    pub label: String,
    pub score: f64,
    pub bbox: BBoxRecord,
    pub center: CenterRecord,
}

impl From<&GeoDetection> for DetectionRecord {
    fn from(det: &GeoDetection) -> Self {
        Self {
            file: det.file.clone(),
            label: det.label.clone(),
            score: det.score,
            bbox: BBoxRecord {
                min_lon: det.bounds.west,
                min_lat: det.bounds.south,
                max_lon: det.bounds.east,
                max_lat: det.bounds.north,
            },
            center: CenterRecord {
                lon: det.center.0,
                lat: det.center.1,
            },
        }
    }
}

/// Run metrics shown by the front end
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub num_images: usize,
    pub num_detections: usize,
    pub total_seconds: f64,
    pub avg_seconds_per_image: Option<f64>,
}

impl RunSummary {
    pub fn new(num_images: usize, num_detections: usize, total_seconds: f64) -> Self {
        let avg_seconds_per_image = if num_images == 0 {
            None
        } else {
            Some(total_seconds / num_images as f64)
        };
        Self {
            num_images,
            num_detections,
            total_seconds,
            avg_seconds_per_image,
        }
    }
}
