//! Outline Executor Tests (CPU path)
//!
//! The CPU chamfer path is the authoritative oracle for outline behavior.
//! Tests for:
//! - zero thickness identity
//! - fully transparent fixpoint
//! - outside band placement, color, and interior preservation
//! - border-touching silhouettes still reaching finite interior distances
//! - fully opaque images producing no outline

use image::{Rgba, RgbaImage};

use pipemagic::exec::outline::OutlineExecutor;
use pipemagic::exec::{ExecutionContext, NodeExecutor};
use pipemagic::frame::ImageFrame;
use pipemagic::pipeline::{ParamValue, Params};

const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);
const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);

fn outline_params(thickness: f64) -> Params {
    let mut params = Params::new();
    params.insert("thickness".into(), ParamValue::Number(thickness));
    params.insert("color".into(), ParamValue::Text("#ff0000".into()));
    params.insert("opacity".into(), ParamValue::Number(1.0));
    params.insert("position".into(), ParamValue::Text("outside".into()));
    params.insert("threshold".into(), ParamValue::Number(0.0));
    params
}

fn run_outline(bitmap: RgbaImage, params: &Params) -> ImageFrame {
    let inputs = vec![ImageFrame::new(bitmap)];
    let ctx = ExecutionContext::new("outline", params, &inputs, None, None, None);
    OutlineExecutor::new().execute(&ctx).unwrap()
}

/// 64x64 transparent canvas with an opaque white square at [x0, x1) × [y0, y1).
fn square_canvas(x0: u32, x1: u32, y0: u32, y1: u32) -> RgbaImage {
    RgbaImage::from_fn(64, 64, |x, y| {
        if x >= x0 && x < x1 && y >= y0 && y < y1 {
            WHITE
        } else {
            TRANSPARENT
        }
    })
}

// ============================================================================
// Identity cases
// ============================================================================

#[test]
fn zero_thickness_is_a_no_op() {
    let bitmap = square_canvas(16, 48, 16, 48);
    let expected = bitmap.clone();

    let out = run_outline(bitmap, &outline_params(0.0));
    assert_eq!(out.bitmap().as_raw(), expected.as_raw());
}

#[test]
fn fully_transparent_input_stays_transparent() {
    let bitmap = RgbaImage::new(64, 64);
    let out = run_outline(bitmap, &outline_params(2.0));

    assert!(
        out.bitmap().pixels().all(|p| p.0[3] == 0),
        "no seed exists, so the outline must be empty"
    );
}

#[test]
fn fully_opaque_input_gets_no_outline() {
    // No background seeds: the inner distance stays infinite and the band
    // never activates.
    let bitmap = RgbaImage::from_pixel(64, 64, WHITE);
    let out = run_outline(bitmap.clone(), &outline_params(2.0));

    assert_eq!(out.bitmap().as_raw(), bitmap.as_raw());
}

// ============================================================================
// Band placement
// ============================================================================

#[test]
fn outside_band_draws_red_ring_and_preserves_interior() {
    let out = run_outline(square_canvas(16, 48, 16, 48), &outline_params(2.0));
    let bitmap = out.bitmap();

    // Center stays white.
    assert_eq!(*bitmap.get_pixel(32, 32), WHITE);
    // Just inside the silhouette edge: untouched.
    assert_eq!(*bitmap.get_pixel(16, 32), WHITE);
    // Distance 1 outside the edge: fully red.
    assert_eq!(*bitmap.get_pixel(15, 32), RED);
    // Distance 3 outside: beyond the band, still transparent.
    assert_eq!(bitmap.get_pixel(13, 32).0[3], 0);
    // Far corner untouched.
    assert_eq!(bitmap.get_pixel(0, 0).0[3], 0);
}

#[test]
fn band_edge_is_antialiased() {
    let out = run_outline(square_canvas(16, 48, 16, 48), &outline_params(2.0));
    let pixel = out.bitmap().get_pixel(14, 32);

    // Distance 2 sits on the smoothstep edge: half coverage.
    assert!(pixel.0[3] > 64 && pixel.0[3] < 192, "alpha was {}", pixel.0[3]);
}

#[test]
fn inside_position_draws_band_within_silhouette() {
    let mut params = outline_params(2.0);
    params.insert("position".into(), ParamValue::Text("inside".into()));

    let out = run_outline(square_canvas(16, 48, 16, 48), &params);
    let bitmap = out.bitmap();

    // One pixel inside the edge carries outline color.
    let edge = bitmap.get_pixel(16, 32);
    assert!(edge.0[0] > 200 && edge.0[1] < 64, "expected red-ish, got {edge:?}");
    // Outside stays clear.
    assert_eq!(bitmap.get_pixel(14, 32).0[3], 0);
    // Deep interior stays white.
    assert_eq!(*bitmap.get_pixel(32, 32), WHITE);
}

#[test]
fn opacity_scales_band_alpha() {
    let mut params = outline_params(2.0);
    params.insert("opacity".into(), ParamValue::Number(0.5));

    let out = run_outline(square_canvas(16, 48, 16, 48), &params);
    let pixel = out.bitmap().get_pixel(15, 32);

    assert!(
        pixel.0[3] > 100 && pixel.0[3] < 160,
        "half opacity expected, alpha was {}",
        pixel.0[3]
    );
}

// ============================================================================
// Border-touching content
// ============================================================================

#[test]
fn border_touching_silhouette_still_outlines_the_interior_side() {
    // Square flush against the left border; the band must appear on the
    // right side where the two-pass sweep reaches finite distances.
    let out = run_outline(square_canvas(0, 32, 16, 48), &outline_params(2.0));
    let bitmap = out.bitmap();

    assert_eq!(*bitmap.get_pixel(32, 32), RED);
    assert_eq!(*bitmap.get_pixel(16, 32), WHITE);
}

// ============================================================================
// GPU/CPU parity (runs only when a device is available)
// ============================================================================

#[test]
fn gpu_and_cpu_agree_on_fully_transparent_input() {
    let Some(gpu) = pipemagic::init_gpu() else {
        return;
    };

    let params = outline_params(2.0);
    let inputs = vec![ImageFrame::new(RgbaImage::new(32, 32))];
    let ctx = ExecutionContext::new("outline", &params, &inputs, Some(gpu), None, None);
    let out = OutlineExecutor::new().execute(&ctx).unwrap();

    assert!(out.bitmap().pixels().all(|p| p.0[3] == 0));
}
