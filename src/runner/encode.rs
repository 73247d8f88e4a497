//! Final frame encoding.
//!
//! The output node declares `format` (`png | jpeg | webp`) and `quality`
//! (0..1). PNG is lossless and ignores quality. JPEG maps quality onto the
//! encoder's 1–100 scale and drops the alpha channel. WebP uses the
//! lossless encoder; quality is accepted but has no effect there.

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::codecs::webp::WebPEncoder;
use image::{DynamicImage, ExtendedColorType, ImageEncoder};

use crate::errors::Result;
use crate::frame::ImageFrame;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OutputFormat {
    Png,
    Jpeg,
    WebP,
}

impl OutputFormat {
    pub(crate) fn parse(value: Option<&str>) -> Self {
        match value {
            Some("jpeg" | "jpg") => OutputFormat::Jpeg,
            Some("webp") => OutputFormat::WebP,
            Some("png") | None => OutputFormat::Png,
            Some(other) => {
                log::warn!("unknown output format {other:?}, falling back to png");
                OutputFormat::Png
            }
        }
    }
}

pub(crate) fn encode_frame(frame: &ImageFrame, format: OutputFormat, quality: f32) -> Result<Vec<u8>> {
    let bitmap = frame.bitmap();
    let (width, height) = bitmap.dimensions();
    let mut blob = Vec::new();

    match format {
        OutputFormat::Png => {
            PngEncoder::new(Cursor::new(&mut blob)).write_image(
                bitmap.as_raw(),
                width,
                height,
                ExtendedColorType::Rgba8,
            )?;
        }
        OutputFormat::Jpeg => {
            let rgb = DynamicImage::ImageRgba8(bitmap.clone()).into_rgb8();
            let q = (quality.clamp(0.0, 1.0) * 100.0).round().clamp(1.0, 100.0) as u8;
            JpegEncoder::new_with_quality(Cursor::new(&mut blob), q).write_image(
                rgb.as_raw(),
                width,
                height,
                ExtendedColorType::Rgb8,
            )?;
        }
        OutputFormat::WebP => {
            WebPEncoder::new_lossless(Cursor::new(&mut blob)).write_image(
                bitmap.as_raw(),
                width,
                height,
                ExtendedColorType::Rgba8,
            )?;
        }
    }

    Ok(blob)
}
