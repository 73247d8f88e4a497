//! CPU outline path: two-pass chamfer distance transform.
//!
//! Distances are computed forward then backward over both the
//! foreground-seed and background-seed masks with weights 1.0 (orthogonal)
//! and 1.414 (diagonal). Border rows and columns keep their initialized
//! value; the interior still reaches finite distances through the sweeps
//! when at least one seed exists.

use image::RgbaImage;

use crate::errors::ExecError;
use crate::exec::ExecutionContext;

use super::{ALPHA_EDGE, OutlineParams, band_coverage};

const INF: f32 = 1e20;
const ORTHO: f32 = 1.0;
const DIAG: f32 = 1.414;

pub(super) fn run(
    ctx: &ExecutionContext<'_>,
    bitmap: &RgbaImage,
    params: &OutlineParams,
) -> Result<RgbaImage, ExecError> {
    let width = bitmap.width() as usize;
    let height = bitmap.height() as usize;

    let foreground: Vec<bool> = bitmap
        .pixels()
        .map(|p| f32::from(p.0[3]) / 255.0 > ALPHA_EDGE)
        .collect();
    ctx.progress(0.2);
    ctx.check_abort()?;

    // Outer distance: how far each pixel is from the silhouette.
    let outer = chamfer(&foreground, width, height);
    ctx.progress(0.5);
    ctx.check_abort()?;

    // Inner distance: how far each silhouette pixel is from the background.
    let background: Vec<bool> = foreground.iter().map(|&fg| !fg).collect();
    let inner = chamfer(&background, width, height);
    ctx.progress(0.8);
    ctx.check_abort()?;

    let mut out = RgbaImage::new(bitmap.width(), bitmap.height());
    for (i, (src, dst)) in bitmap.pixels().zip(out.pixels_mut()).enumerate() {
        let alpha = f32::from(src.0[3]) / 255.0;
        let inside = alpha > ALPHA_EDGE;
        let signed_dist = if inside { -inner[i] } else { outer[i] } + params.threshold;

        let coverage = band_coverage(signed_dist, params) * params.opacity;
        let rgb = [
            mix(f32::from(src.0[0]) / 255.0, params.color[0], coverage),
            mix(f32::from(src.0[1]) / 255.0, params.color[1], coverage),
            mix(f32::from(src.0[2]) / 255.0, params.color[2], coverage),
        ];
        let out_alpha = alpha.max(coverage * params.color[3]);

        dst.0 = [
            to_byte(rgb[0]),
            to_byte(rgb[1]),
            to_byte(rgb[2]),
            to_byte(out_alpha),
        ];
    }
    ctx.progress(0.95);

    Ok(out)
}

/// Two-pass chamfer distance to the nearest seed pixel.
fn chamfer(seeds: &[bool], width: usize, height: usize) -> Vec<f32> {
    let mut dist: Vec<f32> = seeds.iter().map(|&s| if s { 0.0 } else { INF }).collect();

    // Forward sweep (top-left to bottom-right), interior pixels only.
    for y in 1..height.saturating_sub(1) {
        for x in 1..width.saturating_sub(1) {
            let i = y * width + x;
            let d = dist[i]
                .min(dist[i - 1] + ORTHO)
                .min(dist[i - width] + ORTHO)
                .min(dist[i - width - 1] + DIAG)
                .min(dist[i - width + 1] + DIAG);
            dist[i] = d;
        }
    }

    // Backward sweep (bottom-right to top-left).
    for y in (1..height.saturating_sub(1)).rev() {
        for x in (1..width.saturating_sub(1)).rev() {
            let i = y * width + x;
            let d = dist[i]
                .min(dist[i + 1] + ORTHO)
                .min(dist[i + width] + ORTHO)
                .min(dist[i + width + 1] + DIAG)
                .min(dist[i + width - 1] + DIAG);
            dist[i] = d;
        }
    }

    dist
}

#[inline]
fn mix(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

#[inline]
fn to_byte(value: f32) -> u8 {
    (value.clamp(0.0, 1.0) * 255.0).round() as u8
}
