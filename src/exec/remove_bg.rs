//! Background-removal executor.
//!
//! Delegates segmentation to the installed [`Segmenter`] capability and
//! composites the returned mask into the input's alpha channel, preserving
//! RGB. The `device` parameter selects the inference backend; `auto`
//! resolves to the GPU when a device is present. A GPU-backend failure is
//! recovered by retrying once on the CPU backend.

use image::GrayImage;

use crate::capability::{self, SegmenterBackend, SegmenterConfig, SegmenterDtype};
use crate::errors::ExecError;
use crate::frame::ImageFrame;
use crate::pipeline::NodeKind;

use super::{ExecutionContext, NodeExecutor};

const DEFAULT_THRESHOLD: f32 = 0.5;

pub struct RemoveBgExecutor;

impl NodeExecutor for RemoveBgExecutor {
    fn kind(&self) -> NodeKind {
        NodeKind::RemoveBg
    }

    fn execute(&self, ctx: &ExecutionContext<'_>) -> Result<ImageFrame, ExecError> {
        let input = ctx.first_input()?;
        let threshold = ctx.param_f32("threshold").unwrap_or(DEFAULT_THRESHOLD);
        let dtype = parse_dtype(ctx.param_str("dtype"));

        let backend = match ctx.param_str("device").unwrap_or("auto") {
            "gpu" | "webgpu" => SegmenterBackend::Gpu,
            "cpu" | "wasm" => SegmenterBackend::Cpu,
            _ => {
                if ctx.gpu().is_some() {
                    SegmenterBackend::Gpu
                } else {
                    SegmenterBackend::Cpu
                }
            }
        };

        ctx.progress(0.1);
        ctx.status_message(Some("Loading segmentation model"));

        let mask = segment_with_retry(ctx, input, threshold, backend, dtype)?;

        ctx.status_message(None);
        ctx.progress(0.8);
        ctx.check_abort()?;

        if mask.dimensions() != (input.width(), input.height()) {
            return Err(ExecError::failed(format!(
                "Segmentation mask is {}x{}, expected {}x{}",
                mask.width(),
                mask.height(),
                input.width(),
                input.height()
            )));
        }

        // Replace alpha, preserve RGB.
        let mut bitmap = input.bitmap().clone();
        for (pixel, mask_pixel) in bitmap.pixels_mut().zip(mask.pixels()) {
            pixel.0[3] = mask_pixel.0[0];
        }

        ctx.progress(1.0);
        Ok(ImageFrame::new(bitmap))
    }
}

fn segment_with_retry(
    ctx: &ExecutionContext<'_>,
    input: &ImageFrame,
    threshold: f32,
    backend: SegmenterBackend,
    dtype: SegmenterDtype,
) -> Result<GrayImage, ExecError> {
    let config = SegmenterConfig { backend, dtype };
    ctx.check_abort()?;

    let first = capability::with_segmenter(config, ctx, |seg| seg.segment(input.bitmap(), threshold));
    match first {
        Ok(mask) => Ok(mask),
        Err(err) if backend == SegmenterBackend::Gpu => {
            log::warn!("GPU segmentation failed, retrying on CPU: {err}");
            ctx.check_abort()?;
            let cpu = SegmenterConfig {
                backend: SegmenterBackend::Cpu,
                dtype,
            };
            capability::with_segmenter(cpu, ctx, |seg| seg.segment(input.bitmap(), threshold))
                .map_err(ExecError::from)
        }
        Err(err) => Err(err.into()),
    }
}

fn parse_dtype(value: Option<&str>) -> SegmenterDtype {
    match value {
        Some("fp16") => SegmenterDtype::Fp16,
        Some("q8") => SegmenterDtype::Q8,
        _ => SegmenterDtype::Fp32,
    }
}
