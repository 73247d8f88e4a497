//! Outline executor.
//!
//! Composes an outline band of configurable thickness, color, opacity, and
//! position around the non-transparent region of the input.
//!
//! Two independent implementations exist. The GPU path builds a signed
//! distance field with the Jump Flooding Algorithm (seed → log₂(max(W,H))
//! flood steps → distance → composite); the CPU path computes two-pass
//! chamfer distances. The CPU path is the authoritative oracle: any GPU
//! failure falls back to it within the same node invocation, and only a CPU
//! failure is reported.

pub mod cpu;
pub mod gpu;

use parking_lot::Mutex;

use crate::errors::ExecError;
use crate::frame::ImageFrame;
use crate::pipeline::NodeKind;

use super::{DeviceUsed, ExecutionContext, NodeExecutor};

/// Resolved outline parameters shared by both paths.
#[derive(Debug, Clone, Copy)]
pub(crate) struct OutlineParams {
    pub thickness: f32,
    /// Outline color, straight RGBA in `[0, 1]`.
    pub color: [f32; 4],
    pub opacity: f32,
    /// `outside` → 1.0, `center` → 0.5, `inside` → 0.0.
    pub position_value: f32,
    /// Signed pixel offset applied to the signed distance.
    pub threshold: f32,
}

/// Alpha above this is considered part of the silhouette.
pub(crate) const ALPHA_EDGE: f32 = 0.1;

pub struct OutlineExecutor {
    pipelines: Mutex<Option<gpu::OutlinePipelines>>,
}

impl OutlineExecutor {
    #[must_use]
    pub fn new() -> Self {
        Self {
            pipelines: Mutex::new(None),
        }
    }
}

impl Default for OutlineExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeExecutor for OutlineExecutor {
    fn kind(&self) -> NodeKind {
        NodeKind::Outline
    }

    fn execute(&self, ctx: &ExecutionContext<'_>) -> Result<ImageFrame, ExecError> {
        let input = ctx.first_input()?;
        let params = resolve_params(ctx);

        // `quality` is accepted but the flood schedule is fixed.
        if let Some(quality) = ctx.param_str("quality") {
            log::debug!("outline quality={quality} (advisory)");
        }

        // Zero thickness is the identity.
        if params.thickness <= 0.0 {
            ctx.progress(1.0);
            return Ok(input.clone());
        }

        if let Some(gpu_ctx) = ctx.gpu() {
            match gpu::run(&self.pipelines, gpu_ctx, ctx, input.bitmap(), &params) {
                Ok(bitmap) => {
                    ctx.mark_device(DeviceUsed::Gpu);
                    return Ok(ImageFrame::new(bitmap));
                }
                Err(ExecError::Aborted) => return Err(ExecError::Aborted),
                Err(err) => {
                    log::warn!("outline GPU path failed, falling back to CPU: {err}");
                }
            }
        }

        ctx.mark_device(DeviceUsed::Cpu);
        let bitmap = cpu::run(ctx, input.bitmap(), &params)?;
        ctx.progress(1.0);
        Ok(ImageFrame::new(bitmap))
    }
}

fn resolve_params(ctx: &ExecutionContext<'_>) -> OutlineParams {
    let position_value = match ctx.param_str("position").unwrap_or("outside") {
        "inside" => 0.0,
        "center" => 0.5,
        _ => 1.0,
    };

    let rgb = ctx
        .param_str("color")
        .and_then(parse_hex_color)
        .unwrap_or([0.0, 0.0, 0.0]);

    OutlineParams {
        thickness: ctx.param_f32("thickness").unwrap_or(4.0).max(0.0),
        color: [rgb[0], rgb[1], rgb[2], 1.0],
        opacity: ctx.param_f32("opacity").unwrap_or(1.0).clamp(0.0, 1.0),
        position_value,
        threshold: ctx.param_f32("threshold").unwrap_or(0.0),
    }
}

/// Parses `#rrggbb` into normalized RGB.
fn parse_hex_color(value: &str) -> Option<[f32; 3]> {
    let hex = value.strip_prefix('#')?;
    if hex.len() != 6 {
        return None;
    }
    let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
    let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
    let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
    Some([
        f32::from(r) / 255.0,
        f32::from(g) / 255.0,
        f32::from(b) / 255.0,
    ])
}

/// Hermite step used by the band composite, identical on both paths.
#[inline]
pub(crate) fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// Band coverage for one pixel given its signed distance.
#[inline]
pub(crate) fn band_coverage(signed_dist: f32, params: &OutlineParams) -> f32 {
    let inner_edge = params.thickness * params.position_value;
    let outer_edge = params.thickness * (1.0 - params.position_value);
    smoothstep(-outer_edge - 0.5, -outer_edge + 0.5, signed_dist)
        * (1.0 - smoothstep(inner_edge - 0.5, inner_edge + 0.5, signed_dist))
}
