use std::{
    fs::{self, File},
    io::{BufWriter, Write},
    path::PathBuf,
};

use image::{codecs::jpeg::JpegEncoder, GrayImage, ImageEncoder};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

const PIXEL_RANGE: f64 = 255.0;
const JPEG_QUALITY: u8 = 75;

/// How normalized intensities are turned into grayscale bytes.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelMapping {
    /// `round(255 * px)` with `px` clamped to `[0, 1]`.
    #[default]
    Standard,
    /// `255 * clamp(px, 0.01, 0.99) - 255`, wrapped into a byte. Every input lands
    /// near 255, which reproduces images rendered by earlier versions of this tool.
    Legacy,
}

/// Map one intensity to a grayscale byte, in double precision for both mappings.
pub fn encode_pixel(px: f64, mapping: PixelMapping) -> u8 {
    match mapping {
        PixelMapping::Standard => (px.clamp(0.0, 1.0) * PIXEL_RANGE).round() as u8,
        PixelMapping::Legacy => {
            let shifted = PIXEL_RANGE * px.clamp(0.01, 0.99) - PIXEL_RANGE;
            // Truncate toward zero, then wrap: -127.5 becomes 129.
            (shifted as i32) as u8
        }
    }
}

/// Inverse of [`PixelMapping::Standard`].
pub fn decode_pixel(byte: u8) -> f64 {
    f64::from(byte) / PIXEL_RANGE
}

/// Lay out a flat vector as a `side x side` grayscale image, row-major.
pub fn render_square(values: &[f64], mapping: PixelMapping) -> Result<GrayImage> {
    let len = values.len();
    let side = (len as f64).sqrt() as usize;
    if len == 0 || side * side != len {
        return Err(Error::Render { len });
    }

    let pixels = values.iter().map(|&px| encode_pixel(px, mapping)).collect();
    GrayImage::from_raw(side as u32, side as u32, pixels).ok_or(Error::Render { len })
}

/// Writes rendered rows as JPEG files into one directory.
#[derive(Clone, Debug)]
pub struct ImageWriter {
    dir: PathBuf,
    mapping: PixelMapping,
}

impl ImageWriter {
    pub fn new(dir: impl Into<PathBuf>, mapping: PixelMapping) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|err| Error::persistence(&dir, err))?;
        Ok(Self { dir, mapping })
    }

    pub fn write(&self, name: &str, values: &[f64]) -> Result<PathBuf> {
        let image = render_square(values, self.mapping)?;
        let path = self.dir.join(name);

        let file = File::create(&path).map_err(|err| Error::persistence(&path, err))?;
        let mut writer = BufWriter::new(file);
        JpegEncoder::new_with_quality(&mut writer, JPEG_QUALITY)
            .write_image(
                image.as_raw(),
                image.width(),
                image.height(),
                image::ColorType::L8,
            )
            .map_err(|err| Error::persistence(&path, err))?;
        writer
            .flush()
            .map_err(|err| Error::persistence(&path, err))?;

        Ok(path)
    }
}

pub fn training_snapshot_name(example: usize, batch: usize, epoch: usize) -> String {
    format!("{example} - {batch} - {epoch} training.jpg")
}

pub fn evaluation_input_name(batch: usize, example: usize) -> String {
    format!("{batch} - {example} input.jpg")
}

pub fn evaluation_output_name(batch: usize, example: usize) -> String {
    format!("{batch} - {example} output.jpg")
}
