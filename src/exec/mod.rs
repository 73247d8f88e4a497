//! Node executors.
//!
//! One executor per [`NodeKind`]. Executors are stateless with respect to a
//! run — everything they need arrives through the [`ExecutionContext`] — but
//! they may lazily build and reuse expensive resources (GPU pipelines,
//! capability instances) across runs behind interior mutability.
//!
//! The two non-trivial executors are [`outline`] (jump-flooding signed
//! distance field with a CPU chamfer fallback) and [`upscale`] (learned 2×
//! RGB super-resolution stitched with a bilinearly upscaled alpha channel).

pub mod context;
pub mod input;
pub mod normalize;
pub mod outline;
pub mod output;
pub mod remove_bg;
pub mod upscale;

pub use context::{DeviceUsed, ExecutionContext};

use crate::errors::ExecError;
use crate::frame::ImageFrame;
use crate::pipeline::NodeKind;

/// A typed processing stage. Produces exactly one output frame.
pub trait NodeExecutor {
    /// The node kind this executor serves.
    fn kind(&self) -> NodeKind;

    /// Runs the node. Returns the produced frame, a failure captured into
    /// the node state, or [`ExecError::Aborted`] which cancels the run.
    fn execute(&self, ctx: &ExecutionContext<'_>) -> Result<ImageFrame, ExecError>;
}

/// The full executor set, owned by the runner and reused across runs so
/// that lazily created GPU state survives.
pub struct ExecutorSet {
    input: input::InputExecutor,
    output: output::OutputExecutor,
    remove_bg: remove_bg::RemoveBgExecutor,
    normalize: normalize::NormalizeExecutor,
    outline: outline::OutlineExecutor,
    upscale: upscale::UpscaleExecutor,
}

impl ExecutorSet {
    #[must_use]
    pub fn new() -> Self {
        Self {
            input: input::InputExecutor,
            output: output::OutputExecutor,
            remove_bg: remove_bg::RemoveBgExecutor,
            normalize: normalize::NormalizeExecutor,
            outline: outline::OutlineExecutor::new(),
            upscale: upscale::UpscaleExecutor,
        }
    }

    #[must_use]
    pub fn for_kind(&self, kind: NodeKind) -> &dyn NodeExecutor {
        match kind {
            NodeKind::Input => &self.input,
            NodeKind::Output => &self.output,
            NodeKind::RemoveBg => &self.remove_bg,
            NodeKind::Normalize => &self.normalize,
            NodeKind::Outline => &self.outline,
            NodeKind::Upscale => &self.upscale,
        }
    }
}

impl Default for ExecutorSet {
    fn default() -> Self {
        Self::new()
    }
}
