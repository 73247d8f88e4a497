//! Error Types
//!
//! This module defines the error types used throughout the engine.
//!
//! # Overview
//!
//! Two layers of errors exist:
//!
//! - [`PipelineError`] — run-level failures returned by
//!   [`Runner::run`](crate::runner::Runner::run): validation, cancellation,
//!   missing output, encoding.
//! - [`ExecError`] — node-level failures inside an executor. A
//!   [`ExecError::Failed`] is captured into the offending node's state and
//!   the run continues; [`ExecError::Aborted`] always propagates to the
//!   caller as [`PipelineError::Aborted`].
//!
//! All public APIs return [`Result<T>`] which is an alias for
//! `std::result::Result<T, PipelineError>`.

use thiserror::Error;

/// A single structural problem reported by pipeline validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    /// The offending node, when the problem is attributable to one.
    pub node_id: Option<String>,
    /// Human-readable description.
    pub message: String,
}

impl ValidationIssue {
    #[must_use]
    pub fn pipeline(message: impl Into<String>) -> Self {
        Self {
            node_id: None,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn node(node_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            node_id: Some(node_id.into()),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.node_id {
            Some(id) => write!(f, "{id}: {}", self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

/// The pipeline graph contains a cycle.
///
/// Surfaced by [`topo_sort`](crate::graph::topo_sort); folded into the
/// validation issue list by [`validate_pipeline`](crate::graph::validate_pipeline).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Pipeline contains a cycle")]
pub struct CycleError {
    /// Nodes that could not be ordered (each participates in or depends on a cycle).
    pub remaining: Vec<String>,
}

/// Run-level error type.
#[derive(Error, Debug)]
pub enum PipelineError {
    // ========================================================================
    // Structural Errors
    // ========================================================================
    /// Structural problems found before any execution; carries the full list.
    #[error("Pipeline validation failed: {}", format_issues(.0))]
    Validation(Vec<ValidationIssue>),

    /// The pipeline graph contains a cycle.
    #[error(transparent)]
    Cycle(#[from] CycleError),

    // ========================================================================
    // Execution Errors
    // ========================================================================
    /// The run was cancelled cooperatively.
    #[error("Run aborted")]
    Aborted,

    /// The output node did not produce a frame.
    #[error("Pipeline produced no output")]
    EmptyOutput,

    /// The final frame could not be encoded to the requested container.
    #[error("Output encode error: {0}")]
    Encode(String),

    // ========================================================================
    // Input Errors
    // ========================================================================
    /// The source container could not be decoded into a bitmap.
    #[error("Input decode error: {0}")]
    Decode(String),
}

/// Node-level executor error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecError {
    /// Cancellation observed at a suspension point.
    #[error("Node aborted")]
    Aborted,

    /// Any other executor failure (missing input, GPU failure not recoverable
    /// by fallback, external capability failure).
    #[error("{0}")]
    Failed(String),
}

impl ExecError {
    #[must_use]
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

/// Failure in the GPU substrate (device acquisition, transfer, compute).
///
/// Executors with a CPU fallback treat this as a signal to fall back; others
/// surface it as [`ExecError::Failed`].
#[derive(Error, Debug, Clone)]
#[error("GPU error: {0}")]
pub struct GpuError(pub String);

impl GpuError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl From<GpuError> for ExecError {
    fn from(err: GpuError) -> Self {
        ExecError::Failed(err.to_string())
    }
}

/// Failure inside an external capability (segmentation, super-resolution).
#[derive(Error, Debug, Clone)]
#[error("{0}")]
pub struct CapabilityError(pub String);

impl From<CapabilityError> for ExecError {
    fn from(err: CapabilityError) -> Self {
        ExecError::Failed(err.0)
    }
}

impl From<image::ImageError> for PipelineError {
    fn from(err: image::ImageError) -> Self {
        PipelineError::Encode(err.to_string())
    }
}

fn format_issues(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Alias for `Result<T, PipelineError>`.
pub type Result<T> = std::result::Result<T, PipelineError>;
