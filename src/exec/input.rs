//! Input executor.
//!
//! Wraps the run's source image. With no parameters the source frame passes
//! through untouched (same bitmap, same revision) so downstream cache keys
//! stay stable across runs. A `maxSize` parameter downscales the source to
//! fit; `fit` selects the scaling rule.

use image::imageops::{self, FilterType};

use crate::errors::ExecError;
use crate::frame::ImageFrame;
use crate::pipeline::NodeKind;

use super::{ExecutionContext, NodeExecutor};

pub struct InputExecutor;

impl NodeExecutor for InputExecutor {
    fn kind(&self) -> NodeKind {
        NodeKind::Input
    }

    fn execute(&self, ctx: &ExecutionContext<'_>) -> Result<ImageFrame, ExecError> {
        let source = ctx.first_input()?;
        ctx.progress(0.1);

        let Some(max_size) = ctx.param_f64("maxSize") else {
            ctx.progress(1.0);
            return Ok(source.clone());
        };
        let max_size = max_size.max(1.0) as u32;

        let (w, h) = (source.width(), source.height());
        let fit = ctx.param_str("fit").unwrap_or("contain");
        let scale = match fit {
            // Shorter side reaches max_size.
            "cover" => f64::from(max_size) / f64::from(w.min(h)),
            // Both dimensions within max_size, aspect preserved.
            _ => f64::from(max_size) / f64::from(w.max(h)),
        };

        if scale >= 1.0 {
            ctx.progress(1.0);
            return Ok(source.clone());
        }

        let new_w = ((f64::from(w) * scale).round() as u32).max(1);
        let new_h = ((f64::from(h) * scale).round() as u32).max(1);
        ctx.check_abort()?;

        let resized = imageops::resize(source.bitmap(), new_w, new_h, FilterType::Triangle);
        ctx.progress(1.0);
        Ok(ImageFrame::new(resized))
    }
}
