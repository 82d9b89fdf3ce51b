use std::fs::File;
use std::io::{BufWriter, Seek, Write};
use std::path::{Path, PathBuf};

use anyhow::Result;
use geotiles::{Detection, Detector, PipelineConfig};
use image::RgbImage;
use tiff::encoder::{DirectoryEncoder, TiffEncoder, TiffKind, colortype};
use tiff::tags::Tag;

const MODEL_PIXEL_SCALE: u16 = 33550;
const MODEL_TIEPOINT: u16 = 33922;
const GEO_KEY_DIRECTORY: u16 = 34735;
const GDAL_NODATA: u16 = 42113;
const PIXEL_IS_POINT: u16 = 2;

/// Description of a synthetic north-up GeoTIFF
pub struct SyntheticTiff {
    pub width: u32,
    pub height: u32,
    pub origin: (f64, f64),
    pub pixel_size: f64,
    pub epsg: Option<u16>,
    pub nodata: Option<&'static str>,
    /// Tiepoint marks the centre of the top-left pixel
    pub pixel_is_point: bool,
}

impl SyntheticTiff {
    /// WGS84 tile with its top-left corner at (4.0, 52.0)
    pub fn wgs84(width: u32, height: u32, pixel_size: f64) -> Self {
        Self {
            width,
            height,
            origin: (4.0, 52.0),
            pixel_size,
            epsg: Some(4326),
            nodata: None,
            pixel_is_point: false,
        }
    }

    pub fn with_nodata(mut self, nodata: &'static str) -> Self {
        self.nodata = Some(nodata);
        self
    }

    pub fn with_epsg(mut self, epsg: Option<u16>) -> Self {
        self.epsg = epsg;
        self
    }

    pub fn with_pixel_is_point(mut self) -> Self {
        self.pixel_is_point = true;
        self
    }

    fn geokeys(&self, epsg: u16) -> Vec<u16> {
        let key = if epsg == 4326 || (4000..5000).contains(&epsg) { 2048 } else { 3072 };
        let mut entries = vec![];
        if self.pixel_is_point {
            entries.extend([1025, 0, 1, PIXEL_IS_POINT]);
        }
        entries.extend([key, 0, 1, epsg]);
        let mut keys = vec![1, 1, 0, (entries.len() / 4) as u16];
        keys.extend(entries);
        keys
    }

    fn write_geo_tags<W, K>(&self, dir: &mut DirectoryEncoder<'_, W, K>) -> Result<()>
    where
        W: Write + Seek,
        K: TiffKind,
    {
        dir.write_tag(
            Tag::Unknown(MODEL_PIXEL_SCALE),
            [self.pixel_size, self.pixel_size, 0.0].as_slice(),
        )?;
        dir.write_tag(
            Tag::Unknown(MODEL_TIEPOINT),
            [0.0, 0.0, 0.0, self.origin.0, self.origin.1, 0.0].as_slice(),
        )?;
        if let Some(epsg) = self.epsg {
            dir.write_tag(Tag::Unknown(GEO_KEY_DIRECTORY), self.geokeys(epsg).as_slice())?;
        }
        if let Some(nodata) = self.nodata {
            dir.write_tag(Tag::Unknown(GDAL_NODATA), nodata)?;
        }
        Ok(())
    }

    /// Write an 8-bit RGB GeoTIFF whose pixels come from `pixel(x, y)`
    pub fn write<F>(&self, path: &Path, pixel: F) -> Result<()>
    where
        F: Fn(u32, u32) -> [u8; 3],
    {
        let mut data = Vec::with_capacity((self.width * self.height * 3) as usize);
        for y in 0..self.height {
            for x in 0..self.width {
                data.extend_from_slice(&pixel(x, y));
            }
        }

        let mut encoder = TiffEncoder::new(BufWriter::new(File::create(path)?))?;
        let mut image = encoder.new_image::<colortype::RGB8>(self.width, self.height)?;
        self.write_geo_tags(image.encoder())?;
        image.write_data(&data)?;
        Ok(())
    }

    /// Write an uncompressed band-sequential (PlanarConfiguration=2) RGB
    /// GeoTIFF, one strip per band
    pub fn write_planar<F>(&self, path: &Path, pixel: F) -> Result<()>
    where
        F: Fn(u32, u32) -> [u8; 3],
    {
        let mut planes = vec![Vec::with_capacity((self.width * self.height) as usize); 3];
        for y in 0..self.height {
            for x in 0..self.width {
                for (plane, value) in planes.iter_mut().zip(pixel(x, y)) {
                    plane.push(value);
                }
            }
        }

        let mut encoder = TiffEncoder::new(BufWriter::new(File::create(path)?))?;
        let mut dir = encoder.image_directory()?;
        let mut offsets = Vec::with_capacity(3);
        for plane in &planes {
            offsets.push(dir.write_data(plane.as_slice())? as u32);
        }
        let byte_counts = vec![self.width * self.height; 3];

        dir.write_tag(Tag::ImageWidth, self.width)?;
        dir.write_tag(Tag::ImageLength, self.height)?;
        dir.write_tag(Tag::BitsPerSample, [8u16, 8, 8].as_slice())?;
        dir.write_tag(Tag::Compression, 1u16)?;
        dir.write_tag(Tag::PhotometricInterpretation, 2u16)?;
        dir.write_tag(Tag::StripOffsets, offsets.as_slice())?;
        dir.write_tag(Tag::SamplesPerPixel, 3u16)?;
        dir.write_tag(Tag::RowsPerStrip, self.height)?;
        dir.write_tag(Tag::StripByteCounts, byte_counts.as_slice())?;
        dir.write_tag(Tag::PlanarConfiguration, 2u16)?;
        self.write_geo_tags(&mut dir)?;
        dir.finish()?;
        Ok(())
    }
}

/// Mid-grey texture, never zero
pub fn textured(x: u32, y: u32) -> [u8; 3] {
    let v = 40 + ((x * 7 + y * 13) % 160) as u8;
    [v, v.saturating_add(10), v.saturating_sub(10).max(1)]
}

/// Single-band 8-bit GeoTIFF (too few bands for RGB reads)
pub fn write_gray_tiff(path: &Path, width: u32, height: u32) -> Result<()> {
    let mut encoder = TiffEncoder::new(BufWriter::new(File::create(path)?))?;
    let mut image = encoder.new_image::<colortype::Gray8>(width, height)?;
    let dir = image.encoder();
    dir.write_tag(Tag::Unknown(MODEL_PIXEL_SCALE), [1.0, 1.0, 0.0].as_slice())?;
    dir.write_tag(
        Tag::Unknown(MODEL_TIEPOINT),
        [0.0, 0.0, 0.0, 0.0, height as f64, 0.0].as_slice(),
    )?;
    image.write_data(&vec![128u8; (width * height) as usize])?;
    Ok(())
}

/// Detector that reports the same pixel boxes on every image
pub struct FakeDetector {
    pub boxes: Vec<Detection>,
}

impl FakeDetector {
    pub fn single(minx: f64, miny: f64, maxx: f64, maxy: f64, label: &str, score: f32) -> Self {
        Self {
            boxes: vec![Detection::new(minx, miny, maxx, maxy, label, score)],
        }
    }
}

impl Detector for FakeDetector {
    fn detect(&self, _image: &RgbImage) -> Result<Vec<Detection>> {
        Ok(self.boxes.clone())
    }

    fn name(&self) -> &str {
        "fake"
    }
}

/// Input and output directories inside one temp dir (keep the guard alive)
pub struct Workspace {
    pub dir: tempfile::TempDir,
    pub input: PathBuf,
    pub output: PathBuf,
}

impl Workspace {
    pub fn new() -> Result<Self> {
        let dir = tempfile::tempdir()?;
        let input = dir.path().join("raw_tifs");
        let output = dir.path().join("out");
        std::fs::create_dir_all(&input)?;
        Ok(Self { dir, input, output })
    }

    pub fn config(&self) -> PipelineConfig {
        PipelineConfig {
            input_dir: self.input.clone(),
            output_dir: self.output.clone(),
            ..Default::default()
        }
    }

    pub fn scene(&self, name: &str) -> PathBuf {
        self.input.join(name)
    }
}
