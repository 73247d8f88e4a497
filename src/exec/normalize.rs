//! Normalize executor.
//!
//! Crops the input to the tightest bounding box of visible alpha and draws
//! the cropped region centered into a square canvas, scaled to leave a
//! `padding` margin on the limiting axis. An image with no visible alpha
//! yields a fully transparent canvas.

use image::imageops::{self, FilterType};
use image::RgbaImage;

use crate::errors::ExecError;
use crate::frame::ImageFrame;
use crate::pipeline::NodeKind;

use super::{ExecutionContext, NodeExecutor};

const DEFAULT_SIZE: u32 = 1024;
const DEFAULT_PADDING: u32 = 32;

/// Alpha counts as visible above this 8-bit level (10/255).
const ALPHA_VISIBLE: u8 = 10;

pub struct NormalizeExecutor;

impl NodeExecutor for NormalizeExecutor {
    fn kind(&self) -> NodeKind {
        NodeKind::Normalize
    }

    fn execute(&self, ctx: &ExecutionContext<'_>) -> Result<ImageFrame, ExecError> {
        let input = ctx.first_input()?;
        let size = ctx.param_f64("size").map_or(DEFAULT_SIZE, |n| n.max(1.0) as u32);
        let padding = ctx.param_f64("padding").map_or(DEFAULT_PADDING, |n| n.max(0.0) as u32);

        ctx.progress(0.1);

        let Some(bbox) = alpha_bbox(input.bitmap()) else {
            // Nothing visible: emit a fully transparent canvas.
            ctx.progress(1.0);
            return Ok(ImageFrame::new(RgbaImage::new(size, size)));
        };
        ctx.progress(0.3);
        ctx.check_abort()?;

        let (bx, by, bw, bh) = bbox;
        let usable = size.saturating_sub(2 * padding).max(1);
        let scale = (f64::from(usable) / f64::from(bw)).min(f64::from(usable) / f64::from(bh));

        let scaled_w = ((f64::from(bw) * scale).round() as u32).max(1);
        let scaled_h = ((f64::from(bh) * scale).round() as u32).max(1);

        let cropped = imageops::crop_imm(input.bitmap(), bx, by, bw, bh).to_image();
        let scaled = imageops::resize(&cropped, scaled_w, scaled_h, FilterType::Triangle);
        ctx.progress(0.8);
        ctx.check_abort()?;

        let mut canvas = RgbaImage::new(size, size);
        let offset_x = ((f64::from(size) - f64::from(scaled_w)) / 2.0).round() as i64;
        let offset_y = ((f64::from(size) - f64::from(scaled_h)) / 2.0).round() as i64;
        imageops::overlay(&mut canvas, &scaled, offset_x, offset_y);

        ctx.progress(1.0);
        Ok(ImageFrame::new(canvas))
    }
}

/// Tightest bounding box `(x, y, w, h)` of pixels with visible alpha, or
/// `None` when every pixel is transparent.
fn alpha_bbox(bitmap: &RgbaImage) -> Option<(u32, u32, u32, u32)> {
    let (width, height) = bitmap.dimensions();
    let mut min_x = width;
    let mut min_y = height;
    let mut max_x = 0u32;
    let mut max_y = 0u32;
    let mut found = false;

    for (x, y, pixel) in bitmap.enumerate_pixels() {
        if pixel.0[3] > ALPHA_VISIBLE {
            found = true;
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }
    }

    found.then(|| (min_x, min_y, max_x - min_x + 1, max_y - min_y + 1))
}
