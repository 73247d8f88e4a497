//! Output executor.
//!
//! Passthrough of the single upstream frame. The `format` and `quality`
//! parameters declared on this node are consumed by the runner when it
//! encodes the final blob.

use crate::errors::ExecError;
use crate::frame::ImageFrame;
use crate::pipeline::NodeKind;

use super::{ExecutionContext, NodeExecutor};

pub struct OutputExecutor;

impl NodeExecutor for OutputExecutor {
    fn kind(&self) -> NodeKind {
        NodeKind::Output
    }

    fn execute(&self, ctx: &ExecutionContext<'_>) -> Result<ImageFrame, ExecError> {
        let input = ctx.first_input()?;
        ctx.progress(1.0);
        Ok(input.clone())
    }
}
