//! Per-node scheduler state.

use crate::exec::DeviceUsed;
use crate::frame::ImageFrame;

/// Observable node lifecycle.
///
/// `idle → pending → running → (done | error)`, or `idle → cached` on a
/// warm hit. An abort returns the interrupted node to `idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NodeStatus {
    #[default]
    Idle,
    Pending,
    Running,
    Done,
    Error,
    Cached,
}

/// Scheduler-owned state, one per node. Persisted across runs: `output` and
/// `cache_key` survive so an unchanged node warm-hits on the next run.
#[derive(Debug, Clone, Default)]
pub struct NodeState {
    pub status: NodeStatus,
    pub progress: f32,
    pub status_message: Option<String>,
    pub download_progress: Option<f32>,
    pub error: Option<String>,
    pub output: Option<ImageFrame>,
    pub cache_key: Option<String>,
    pub device_used: Option<DeviceUsed>,
}

impl NodeState {
    /// Clears the transient per-run fields, keeping the memoized output and
    /// its cache key.
    pub(crate) fn reset_for_run(&mut self) {
        self.status = NodeStatus::Pending;
        self.progress = 0.0;
        self.status_message = None;
        self.download_progress = None;
        self.error = None;
        self.device_used = None;
    }

    /// Drops the memoized output entirely.
    pub(crate) fn clear_cache(&mut self) {
        self.status = NodeStatus::Idle;
        self.progress = 0.0;
        self.error = None;
        self.output = None;
        self.cache_key = None;
    }
}
