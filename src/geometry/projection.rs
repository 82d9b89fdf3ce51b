/// Get PROJ4 string for an EPSG code using the crs-definitions database
#[inline]
pub fn get_proj_string(epsg: u32) -> Option<&'static str> {
    u16::try_from(epsg).ok()
        .and_then(crs_definitions::from_code)
        .map(|def| def.proj4)
}

/// Check if an EPSG code represents a geographic (lon/lat) CRS
#[inline]
#[must_use]
pub fn is_geographic_crs(epsg: u32) -> bool {
    if let Some(proj_str) = get_proj_string(epsg) {
        proj_str.contains("+proj=longlat")
    } else {
        // Fallback: 4326 and similar are geographic
        epsg == 4326 || (4000..5000).contains(&epsg)
    }
}

/// Point transformer between two EPSG codes using proj4rs (pure Rust)
pub struct CoordTransformer {
    source_proj: proj4rs::proj::Proj,
    target_proj: proj4rs::proj::Proj,
    /// True if source uses degrees (needs radian conversion)
    source_is_geographic: bool,
    /// True if target uses degrees (needs radian conversion)
    target_is_geographic: bool,
}

impl CoordTransformer {
    pub fn new(source_epsg: u32, target_epsg: u32) -> Result<Self, String> {
        use proj4rs::proj::Proj;

        let source_str = get_proj_string(source_epsg)
            .ok_or_else(|| format!("EPSG:{source_epsg} is not in the crs-definitions database"))?;
        let target_str = get_proj_string(target_epsg)
            .ok_or_else(|| format!("EPSG:{target_epsg} is not in the crs-definitions database"))?;

        let source_proj = Proj::from_proj_string(source_str)
            .map_err(|e| format!("Invalid source projection EPSG:{source_epsg}: {e:?}"))?;
        let target_proj = Proj::from_proj_string(target_str)
            .map_err(|e| format!("Invalid target projection EPSG:{target_epsg}: {e:?}"))?;

        Ok(Self {
            source_proj,
            target_proj,
            source_is_geographic: is_geographic_crs(source_epsg),
            target_is_geographic: is_geographic_crs(target_epsg),
        })
    }

    /// Transform a single coordinate pair
    pub fn transform(&self, x: f64, y: f64) -> Result<(f64, f64), String> {
        // proj4rs uses radians for geographic coordinates
        let mut point = if self.source_is_geographic {
            (x.to_radians(), y.to_radians(), 0.0)
        } else {
            (x, y, 0.0)
        };

        proj4rs::transform::transform(&self.source_proj, &self.target_proj, &mut point)
            .map_err(|e| format!("Transform failed: {e:?}"))?;

        if self.target_is_geographic {
            Ok((point.0.to_degrees(), point.1.to_degrees()))
        } else {
            Ok((point.0, point.1))
        }
    }
}

/// Project a point from one EPSG code to another.
///
/// No-op when both codes are equal.
pub fn project_point(source_epsg: u32, target_epsg: u32, x: f64, y: f64) -> Result<(f64, f64), String> {
    if source_epsg == target_epsg {
        return Ok((x, y));
    }
    CoordTransformer::new(source_epsg, target_epsg)?.transform(x, y)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() < tol
    }

    #[test]
    fn test_epsg_proj_strings() {
        assert!(get_proj_string(4326).is_some());
        assert!(get_proj_string(32631).is_some());
        assert!(get_proj_string(99999).is_none());
    }

    #[test]
    fn test_project_point_same_crs() {
        let (x, y) = project_point(4326, 4326, 10.0, 51.5).unwrap();
        assert_eq!((x, y), (10.0, 51.5));
    }

    #[test]
    fn test_utm_roundtrip() {
        // Rotterdam, UTM zone 31N
        let (e, n) = project_point(4326, 32631, 4.47, 51.92).unwrap();
        assert!(e > 500_000.0 && e < 700_000.0, "easting: {e}");
        assert!(n > 5_700_000.0 && n < 5_800_000.0, "northing: {n}");

        let (lon, lat) = project_point(32631, 4326, e, n).unwrap();
        assert!(approx_eq(lon, 4.47, 1e-6), "lon: {lon}");
        assert!(approx_eq(lat, 51.92, 1e-6), "lat: {lat}");
    }

    #[test]
    fn test_unknown_epsg() {
        assert!(CoordTransformer::new(99999, 4326).is_err());
    }
}
