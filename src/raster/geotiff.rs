//! GeoTIFF decoding on top of the `tiff` crate.
//!
//! Only the tags needed to georeference a raster are interpreted: the model
//! transformation (or tiepoint + pixel scale), the EPSG code and raster type
//! from the GeoKeyDirectory, and GDAL's ASCII nodata tag.

use std::io::{Read, Seek};

use tiff::decoder::{ChunkType, Decoder, DecodingResult, Limits};
use tiff::tags::Tag;

use crate::error::{GeoError, GeoResult};
use crate::geometry::{Crs, GeoTransform};

// GeoTIFF / GDAL tag IDs
const MODEL_PIXEL_SCALE: u16 = 33550;
const MODEL_TIEPOINT: u16 = 33922;
const MODEL_TRANSFORMATION: u16 = 34264;
const GEO_KEY_DIRECTORY: u16 = 34735;
const GDAL_NODATA: u16 = 42113;

// GeoKey IDs
const GT_RASTER_TYPE_GEO_KEY: u16 = 1025;
const GEOGRAPHIC_TYPE_GEO_KEY: u16 = 2048;
const PROJECTED_CS_TYPE_GEO_KEY: u16 = 3072;
const USER_DEFINED: u16 = 32767;
const RASTER_PIXEL_IS_POINT: u16 = 2;

/// Georeferencing read from a GeoTIFF header
#[derive(Debug, Clone, PartialEq)]
pub struct GeoTiffMetadata {
    pub width: usize,
    pub height: usize,
    pub transform: GeoTransform,
    pub crs: Option<Crs>,
    pub nodata: Option<f64>,
    pub samples_per_pixel: usize,
    /// Samples stored band-sequential instead of pixel-interleaved
    pub planar: bool,
}

/// Decoded pixel data, one f32 plane per band
#[derive(Debug, Clone)]
pub struct DecodedBands {
    pub metadata: GeoTiffMetadata,
    pub planes: Vec<Vec<f32>>,
}

fn tag(code: u16) -> Tag {
    Tag::from_u16_exhaustive(code)
}

fn find_f64_vec<R: Read + Seek>(decoder: &mut Decoder<R>, code: u16) -> GeoResult<Option<Vec<f64>>> {
    match decoder.find_tag(tag(code))? {
        Some(value) => Ok(Some(value.into_f64_vec()?)),
        None => Ok(None),
    }
}

fn find_u16_vec<R: Read + Seek>(decoder: &mut Decoder<R>, code: u16) -> GeoResult<Option<Vec<u16>>> {
    match decoder.find_tag(tag(code))? {
        Some(value) => Ok(Some(value.into_u16_vec()?)),
        None => Ok(None),
    }
}

/// Inline `(key_id, value)` pairs of a GeoKeyDirectory.
///
/// Layout: a 4-entry header `[version, revision, minor, count]` followed by
/// `count` entries of `[key_id, location, count, value]`. Keys stored in other
/// tags (location != 0) are skipped.
fn inline_geokeys(keys: &[u16]) -> impl Iterator<Item = (u16, u16)> + '_ {
    let count = keys.get(3).copied().unwrap_or(0) as usize;
    keys.get(4..)
        .unwrap_or_default()
        .chunks_exact(4)
        .take(count)
        .filter(|entry| entry[1] == 0)
        .map(|entry| (entry[0], entry[3]))
}

/// Extract the EPSG code from a GeoKeyDirectory
pub fn crs_from_geokeys(keys: &[u16]) -> GeoResult<Option<Crs>> {
    let mut projected = None;
    let mut geographic = None;

    for (key_id, value) in inline_geokeys(keys) {
        match key_id {
            PROJECTED_CS_TYPE_GEO_KEY => projected = Some(value),
            GEOGRAPHIC_TYPE_GEO_KEY => geographic = Some(value),
            _ => {}
        }
    }

    // A projected CRS wins over its underlying geographic datum
    match projected.or(geographic) {
        Some(USER_DEFINED) => Err(GeoError::Format(
            "user-defined coordinate systems are not supported".to_string(),
        )),
        Some(code) => Ok(Some(Crs(code as u32))),
        None => Ok(None),
    }
}

/// True when GTRasterTypeGeoKey marks the tiepoint as a pixel centre
pub fn is_pixel_is_point(keys: &[u16]) -> bool {
    inline_geokeys(keys)
        .any(|(key_id, value)| key_id == GT_RASTER_TYPE_GEO_KEY && value == RASTER_PIXEL_IS_POINT)
}

/// Parse GDAL's nodata string ("0", "-9999", "nan", ...)
pub fn parse_nodata(raw: &str) -> Option<f64> {
    let trimmed = raw.trim_matches(|c: char| c == '\0' || c.is_whitespace());
    trimmed.parse::<f64>().ok()
}

fn read_metadata<R: Read + Seek>(decoder: &mut Decoder<R>) -> GeoResult<GeoTiffMetadata> {
    let (width, height) = decoder.dimensions()?;

    let mut transform = match find_f64_vec(decoder, MODEL_TRANSFORMATION)? {
        Some(matrix) => GeoTransform::from_model_transformation(&matrix),
        None => {
            let tiepoint = find_f64_vec(decoder, MODEL_TIEPOINT)?;
            let scale = find_f64_vec(decoder, MODEL_PIXEL_SCALE)?;
            match (tiepoint, scale) {
                (Some(t), Some(s)) => GeoTransform::from_tiepoint(&t, &s),
                _ => None,
            }
        }
    }
    .ok_or_else(|| GeoError::Format("raster has no usable georeferencing tags".to_string()))?;

    let geokeys = find_u16_vec(decoder, GEO_KEY_DIRECTORY)?.unwrap_or_default();
    let crs = crs_from_geokeys(&geokeys)?;
    // PixelIsPoint georeferences pixel centres; shift to the corner convention
    if is_pixel_is_point(&geokeys) {
        transform = transform.offset_pixels(-0.5, -0.5);
    }

    let nodata = match decoder.find_tag(tag(GDAL_NODATA))? {
        Some(value) => parse_nodata(&value.into_string()?),
        None => None,
    };

    let samples_per_pixel = match decoder.find_tag(Tag::SamplesPerPixel)? {
        Some(value) => value.into_u16()? as usize,
        None => 1,
    };

    let planar = match decoder.find_tag(Tag::PlanarConfiguration)? {
        Some(value) => value.into_u16()? == 2,
        None => false,
    };

    Ok(GeoTiffMetadata {
        width: width as usize,
        height: height as usize,
        transform,
        crs,
        nodata,
        samples_per_pixel,
        planar,
    })
}

fn to_f32(result: DecodingResult) -> GeoResult<Vec<f32>> {
    let data = match result {
        DecodingResult::U8(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::U16(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::U32(v) => v.into_iter().map(|x| x as f32).collect(),
        DecodingResult::I8(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::I16(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::I32(v) => v.into_iter().map(|x| x as f32).collect(),
        DecodingResult::F32(v) => v,
        DecodingResult::F64(v) => v.into_iter().map(|x| x as f32).collect(),
        _ => return Err(GeoError::Format("unsupported sample format".to_string())),
    };
    Ok(data)
}

/// Read a band-sequential image chunk by chunk into one plane per sample
fn read_planar<R: Read + Seek>(
    decoder: &mut Decoder<R>,
    metadata: &GeoTiffMetadata,
) -> GeoResult<Vec<Vec<f32>>> {
    let (width, height) = (metadata.width, metadata.height);
    let bands = metadata.samples_per_pixel;
    let chunk_count = match decoder.get_chunk_type() {
        ChunkType::Strip => decoder.strip_count()?,
        ChunkType::Tile => decoder.tile_count()?,
    } as usize;
    if bands == 0 || chunk_count == 0 || chunk_count % bands != 0 {
        return Err(GeoError::Format(format!(
            "{chunk_count} chunk(s) cannot be split into {bands} band(s)"
        )));
    }

    let per_band = chunk_count / bands;
    let (chunk_width, chunk_height) = decoder.chunk_dimensions();
    let (chunk_width, chunk_height) = (chunk_width as usize, chunk_height as usize);
    let across = width.div_ceil(chunk_width);

    let mut planes = vec![vec![0.0f32; width * height]; bands];
    for index in 0..chunk_count {
        let (band, local) = (index / per_band, index % per_band);
        let x0 = (local % across) * chunk_width;
        let y0 = (local / across) * chunk_height;
        let (data_width, _) = decoder.chunk_data_dimensions(index as u32);
        let data = to_f32(decoder.read_chunk(index as u32)?)?;

        let data_width = data_width as usize;
        let copy = data_width.min(width.saturating_sub(x0));
        let plane = &mut planes[band];
        for (row, line) in data.chunks_exact(data_width).enumerate() {
            let y = y0 + row;
            if y >= height {
                break;
            }
            let start = y * width + x0;
            plane[start..start + copy].copy_from_slice(&line[..copy]);
        }
    }
    Ok(planes)
}

/// Decode a GeoTIFF from any seekable reader
pub fn decode<R: Read + Seek>(reader: R) -> GeoResult<DecodedBands> {
    let mut decoder = Decoder::new(reader)?.with_limits(Limits::unlimited());
    let metadata = read_metadata(&mut decoder)?;
    let pixels = metadata.width * metadata.height;
    if pixels == 0 {
        return Err(GeoError::Format("raster has no pixels".to_string()));
    }

    if metadata.planar && metadata.samples_per_pixel > 1 {
        let planes = read_planar(&mut decoder, &metadata)?;
        return Ok(DecodedBands { metadata, planes });
    }

    let samples = to_f32(decoder.read_image()?)?;
    if samples.len() % pixels != 0 {
        return Err(GeoError::Format(format!(
            "data length mismatch: got {}, expected a multiple of {}",
            samples.len(),
            pixels
        )));
    }
    let band_count = samples.len() / pixels;

    let planes = if band_count == 1 {
        vec![samples]
    } else {
        let mut planes = vec![Vec::with_capacity(pixels); band_count];
        for pixel in samples.chunks_exact(band_count) {
            for (plane, &value) in planes.iter_mut().zip(pixel) {
                plane.push(value);
            }
        }
        planes
    };

    Ok(DecodedBands { metadata, planes })
}
