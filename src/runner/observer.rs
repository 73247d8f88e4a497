//! Run event observation.
//!
//! The observer sees every node transition of a run but never mutates
//! scheduler state. For any two nodes A before B in the topological order,
//! all of A's callbacks are delivered before any of B's; progress within a
//! node is monotone non-decreasing. Status messages and download progress
//! are best-effort and carry no ordering guarantee relative to progress.

use super::state::NodeStatus;

/// Callbacks surfaced during a run. All methods default to no-ops so
/// implementors override only what they need.
pub trait RunObserver {
    /// Node progress in `[0, 1]`, monotone non-decreasing within one node
    /// run. May be called many times.
    fn node_progress(&self, _node_id: &str, _progress: f32) {}

    /// Fired on node status transitions during execution.
    fn node_status(&self, _node_id: &str, _status: NodeStatus, _error: Option<&str>) {}

    /// Free-form user-facing progress text; `None` clears it.
    fn node_status_message(&self, _node_id: &str, _message: Option<&str>) {}

    /// Weight/model download ratio while a capability loads; `None` when
    /// the download phase ends.
    fn node_download_progress(&self, _node_id: &str, _ratio: Option<f32>) {}
}

/// Observer that ignores everything.
pub struct NullObserver;

impl RunObserver for NullObserver {}
