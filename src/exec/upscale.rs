//! Upscale executor.
//!
//! Stitches together two independent 2× passes: the installed
//! [`SuperResolver`](crate::capability::SuperResolver) renders the RGB
//! channels, and the alpha channel — which the learned network does not
//! model — is upscaled separately with bilinear resampling. The two results
//! are merged per pixel: RGB from the network, alpha from the resampled
//! channel.

use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};

use crate::capability::{self, SrContentType, SrKey, SrModel};
use crate::errors::ExecError;
use crate::frame::ImageFrame;
use crate::pipeline::NodeKind;

use super::{DeviceUsed, ExecutionContext, NodeExecutor};

pub struct UpscaleExecutor;

impl NodeExecutor for UpscaleExecutor {
    fn kind(&self) -> NodeKind {
        NodeKind::Upscale
    }

    fn execute(&self, ctx: &ExecutionContext<'_>) -> Result<ImageFrame, ExecError> {
        let input = ctx.first_input()?;
        let key = SrKey {
            model: parse_model(ctx.param_str("model")),
            content_type: parse_content_type(ctx.param_str("contentType")),
        };

        // The learned pass needs a live device; fail fast with a clear error
        // instead of letting the provider trip over a missing context.
        if capability::super_resolver_requires_gpu() == Some(true) && ctx.gpu().is_none() {
            return Err(ExecError::failed(
                "Upscale requires a GPU device and none is available",
            ));
        }

        ctx.progress(0.1);
        ctx.status_message(Some("Loading upscale model"));

        ctx.check_abort()?;
        let sr = capability::with_super_resolver(key, ctx, |sr| sr.render(input.bitmap()))?;
        if capability::super_resolver_requires_gpu() == Some(true) {
            ctx.mark_device(DeviceUsed::Gpu);
        } else {
            ctx.mark_device(DeviceUsed::Cpu);
        }
        ctx.status_message(None);
        ctx.progress(0.6);
        ctx.check_abort()?;

        let out_w = input.width() * 2;
        let out_h = input.height() * 2;
        if sr.dimensions() != (out_w, out_h) {
            return Err(ExecError::failed(format!(
                "Super-resolution returned {}x{}, expected {out_w}x{out_h}",
                sr.width(),
                sr.height()
            )));
        }

        let alpha2x = upscale_alpha(input.bitmap(), out_w, out_h);
        ctx.progress(0.85);
        ctx.check_abort()?;

        // Merge: RGB from the network, alpha from the resampled channel.
        let mut merged = RgbaImage::new(out_w, out_h);
        for (out, (sr_pixel, alpha_pixel)) in merged
            .pixels_mut()
            .zip(sr.pixels().zip(alpha2x.pixels()))
        {
            out.0 = [sr_pixel.0[0], sr_pixel.0[1], sr_pixel.0[2], alpha_pixel.0[0]];
        }

        ctx.progress(1.0);
        Ok(ImageFrame::new(merged))
    }
}

/// Expands the alpha channel into a grayscale image (R=G=B=alpha, A=255)
/// and bilinearly resamples it to the target size.
fn upscale_alpha(bitmap: &RgbaImage, out_w: u32, out_h: u32) -> RgbaImage {
    let mut gray = RgbaImage::new(bitmap.width(), bitmap.height());
    for (out, pixel) in gray.pixels_mut().zip(bitmap.pixels()) {
        let a = pixel.0[3];
        *out = Rgba([a, a, a, 255]);
    }
    imageops::resize(&gray, out_w, out_h, FilterType::Triangle)
}

fn parse_model(value: Option<&str>) -> SrModel {
    match value {
        Some("cnn-2x-s") => SrModel::Cnn2xS,
        Some("cnn-2x-l") => SrModel::Cnn2xL,
        _ => SrModel::Cnn2xM,
    }
}

fn parse_content_type(value: Option<&str>) -> SrContentType {
    match value {
        Some("an") => SrContentType::An,
        Some("3d") => SrContentType::ThreeD,
        _ => SrContentType::Rl,
    }
}
