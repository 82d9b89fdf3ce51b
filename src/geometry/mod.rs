//! Coordinate reference systems, affine transforms and geographic bounds.

pub mod projection;
pub mod transform;

use serde::{Deserialize, Serialize};

pub use transform::GeoTransform;

/// Coordinate reference system identified by its EPSG code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Crs(pub u32);

impl Crs {
    /// WGS84 longitude/latitude
    pub const WGS84: Crs = Crs(4326);

    pub fn epsg(&self) -> u32 {
        self.0
    }

    /// True if coordinates in this CRS are degrees of longitude/latitude
    pub fn is_geographic(&self) -> bool {
        projection::is_geographic_crs(self.0)
    }
}

impl Default for Crs {
    fn default() -> Self {
        Crs::WGS84
    }
}

impl std::fmt::Display for Crs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "EPSG:{}", self.0)
    }
}

/// Axis-aligned rectangle in a CRS (west/south/east/north when geographic)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoBounds {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl GeoBounds {
    /// Build bounds from two arbitrary corners, ordering each axis
    pub fn from_corners(a: (f64, f64), b: (f64, f64)) -> Self {
        Self {
            west: a.0.min(b.0),
            south: a.1.min(b.1),
            east: a.0.max(b.0),
            north: a.1.max(b.1),
        }
    }

    /// Smallest bounds containing every point
    pub fn enclosing(points: &[(f64, f64)]) -> Option<Self> {
        let (first, rest) = points.split_first()?;
        let mut bounds = Self::from_corners(*first, *first);
        for &(x, y) in rest {
            bounds.west = bounds.west.min(x);
            bounds.south = bounds.south.min(y);
            bounds.east = bounds.east.max(x);
            bounds.north = bounds.north.max(y);
        }
        Some(bounds)
    }

    pub fn width(&self) -> f64 {
        self.east - self.west
    }

    pub fn height(&self) -> f64 {
        self.north - self.south
    }

    /// Leaflet-style `[[south, west], [north, east]]` corner pairs
    pub fn to_corner_pairs(&self) -> [[f64; 2]; 2] {
        [[self.south, self.west], [self.north, self.east]]
    }
}
