//! Pipeline scheduler.
//!
//! [`Runner`] drives a validated pipeline node by node in topological order:
//! gather upstream frames, consult the per-node memo, dispatch the executor
//! under a per-node [`ExecutionContext`], and finally encode the output
//! node's frame into a blob.
//!
//! # Memoization
//!
//! Each completed node records a cache key derived from `(node id, params,
//! upstream revisions)` together with its output frame. On the next run the
//! node warm-hits when the recomputed key matches — so a parameter edit
//! invalidates the node itself, and the resulting fresh output revision
//! cascades the invalidation downstream without any bookkeeping.
//!
//! # Failure policy
//!
//! Executor failures are captured into the offending node's state and the
//! run continues; downstream nodes starve and fail with "No input image" on
//! their own. Only validation errors, cancellation, and a missing output
//! frame abort the run as a whole.
//!
//! # Concurrency
//!
//! Scheduling is single-threaded and cooperative; `run` takes `&mut self`,
//! so exactly one run per runner is in flight at a time. Nodes execute
//! strictly sequentially, which keeps GPU resource accounting and event
//! ordering trivial.

pub mod encode;
pub mod observer;
pub mod state;

pub use observer::{NullObserver, RunObserver};
pub use state::{NodeState, NodeStatus};

use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::cache::cache_key;
use crate::cancel::CancelToken;
use crate::errors::{ExecError, PipelineError, Result};
use crate::exec::{ExecutionContext, ExecutorSet};
use crate::frame::ImageFrame;
use crate::gpu::GpuContext;
use crate::graph::{downstream_nodes, topo_sort, upstream_nodes, validate_pipeline};
use crate::pipeline::{EdgeDef, NodeDef, NodeKind, PipelineDefinition};

/// Default encode quality when the output node does not declare one,
/// matching the common canvas `toBlob` default.
const DEFAULT_QUALITY: f32 = 0.92;

/// Options recognized by [`Runner::run`].
#[derive(Default)]
pub struct RunOptions<'a> {
    /// Cooperative cancellation source. Checked between nodes and at every
    /// executor suspension point.
    pub signal: Option<&'a CancelToken>,
    /// Event sink for node transitions, progress, status text, and download
    /// ratios.
    pub observer: Option<&'a dyn RunObserver>,
}

/// Result of a completed run.
#[derive(Debug)]
pub struct RunOutput {
    /// The output node's frame encoded per its `format`/`quality` params.
    pub blob: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Output frames of every node that completed, by node id.
    pub node_outputs: FxHashMap<String, ImageFrame>,
}

/// The pipeline scheduler. Owns per-node state across runs so unchanged
/// nodes warm-hit, and owns the executor set so lazily built GPU resources
/// are reused.
pub struct Runner {
    states: FxHashMap<String, NodeState>,
    executors: ExecutorSet,
}

impl Runner {
    #[must_use]
    pub fn new() -> Self {
        Self {
            states: FxHashMap::default(),
            executors: ExecutorSet::new(),
        }
    }

    /// Read access to a node's state (for editors rendering per-node UI).
    #[must_use]
    pub fn node_state(&self, node_id: &str) -> Option<&NodeState> {
        self.states.get(node_id)
    }

    /// A completed node's output frame, if any.
    #[must_use]
    pub fn node_output(&self, node_id: &str) -> Option<&ImageFrame> {
        self.states.get(node_id).and_then(|s| s.output.as_ref())
    }

    /// Drops the memoized output of `node_id` and of every node downstream
    /// of it. Editors call this after mutating a node's params.
    pub fn invalidate(&mut self, node_id: &str, edges: &[EdgeDef]) {
        if let Some(state) = self.states.get_mut(node_id) {
            state.clear_cache();
        }
        for id in downstream_nodes(node_id, edges) {
            if let Some(state) = self.states.get_mut(&id) {
                state.clear_cache();
            }
        }
    }

    /// Decodes an encoded container (PNG/JPEG/WebP/… blob) and runs the
    /// pipeline against it. Every call stamps a fresh source revision, so
    /// prefer [`Runner::run`] with a long-lived frame when re-running the
    /// same image.
    pub fn run_blob(
        &mut self,
        pipeline: &PipelineDefinition,
        encoded: &[u8],
        gpu: Option<Arc<GpuContext>>,
        options: &RunOptions<'_>,
    ) -> Result<RunOutput> {
        let decoded = image::load_from_memory(encoded)
            .map_err(|e| PipelineError::Decode(e.to_string()))?
            .to_rgba8();
        let source = ImageFrame::new(decoded);
        self.run(pipeline, &source, gpu, options)
    }

    /// Runs the pipeline against `source`.
    ///
    /// The same `source` frame (same revision) must be passed on subsequent
    /// runs for warm-cache behavior; wrapping a new bitmap bumps the
    /// revision and invalidates every node, which is exactly the contract
    /// for "the input image changed".
    pub fn run(
        &mut self,
        pipeline: &PipelineDefinition,
        source: &ImageFrame,
        gpu: Option<Arc<GpuContext>>,
        options: &RunOptions<'_>,
    ) -> Result<RunOutput> {
        let issues = validate_pipeline(&pipeline.nodes, &pipeline.edges);
        if !issues.is_empty() {
            return Err(PipelineError::Validation(issues));
        }
        let order = topo_sort(&pipeline.nodes, &pipeline.edges)?;

        self.prepare_states(&pipeline.nodes);

        let node_map: FxHashMap<&str, &NodeDef> = pipeline
            .nodes
            .iter()
            .map(|n| (n.id.as_str(), n))
            .collect();

        for id in &order {
            if options.signal.is_some_and(CancelToken::is_cancelled) {
                return Err(PipelineError::Aborted);
            }

            let node = node_map[id.as_str()];
            let (inputs, revisions) = self.gather_inputs(node, source, &pipeline.edges);
            let key = cache_key(id, &node.params, &revisions);

            // Warm hit: same params, same upstream pixels.
            let hit = self
                .states
                .get(id)
                .is_some_and(|s| s.cache_key.as_deref() == Some(key.as_str()) && s.output.is_some());
            if hit {
                let state = self.states.get_mut(id).expect("state exists for every node");
                state.status = NodeStatus::Cached;
                state.progress = 1.0;
                notify_status(options, id, NodeStatus::Cached, None);
                log::debug!("node {id} served from cache");
                continue;
            }

            {
                let state = self.states.get_mut(id).expect("state exists for every node");
                state.status = NodeStatus::Running;
                state.progress = 0.0;
            }
            notify_status(options, id, NodeStatus::Running, None);

            let ctx = ExecutionContext::new(
                id,
                &node.params,
                &inputs,
                gpu.clone(),
                options.signal,
                options.observer,
            );
            let result = self.executors.for_kind(node.kind).execute(&ctx);
            let device_used = ctx.device_used();
            let status_message = ctx.last_status_message();
            let download_progress = ctx.last_download_progress();
            drop(ctx);

            let state = self.states.get_mut(id).expect("state exists for every node");
            state.status_message = status_message;
            state.download_progress = download_progress;
            match result {
                Ok(frame) => {
                    state.status = NodeStatus::Done;
                    state.progress = 1.0;
                    state.output = Some(frame);
                    state.cache_key = Some(key);
                    state.device_used = device_used;
                    notify_status(options, id, NodeStatus::Done, None);
                }
                Err(ExecError::Aborted) => {
                    // The node did not complete; leave no node in `running`.
                    state.status = NodeStatus::Idle;
                    state.progress = 0.0;
                    notify_status(options, id, NodeStatus::Idle, None);
                    return Err(PipelineError::Aborted);
                }
                Err(ExecError::Failed(message)) => {
                    log::warn!("node {id} failed: {message}");
                    state.status = NodeStatus::Error;
                    state.error = Some(message.clone());
                    state.output = None;
                    state.cache_key = None;
                    notify_status(options, id, NodeStatus::Error, Some(&message));
                    // Do NOT abort: downstream nodes starve and report
                    // "No input image" themselves.
                }
            }
        }

        self.finalize(pipeline, options)
    }

    // ── Internals ──────────────────────────────────────────────────────────

    /// Creates/resets per-node states, dropping states of removed nodes.
    fn prepare_states(&mut self, nodes: &[NodeDef]) {
        let ids: FxHashSet<&str> = nodes.iter().map(|n| n.id.as_str()).collect();
        self.states.retain(|id, _| ids.contains(id.as_str()));
        for node in nodes {
            self.states.entry(node.id.clone()).or_default().reset_for_run();
        }
    }

    /// Upstream frames (in edge insertion order) and their revisions. Input
    /// nodes draw from the run's source frame.
    fn gather_inputs(
        &self,
        node: &NodeDef,
        source: &ImageFrame,
        edges: &[EdgeDef],
    ) -> (Vec<ImageFrame>, Vec<u64>) {
        let inputs: Vec<ImageFrame> = if node.kind == NodeKind::Input {
            vec![source.clone()]
        } else {
            upstream_nodes(&node.id, edges)
                .iter()
                .filter_map(|u| self.states.get(u).and_then(|s| s.output.clone()))
                .collect()
        };
        let revisions = inputs.iter().map(ImageFrame::revision).collect();
        (inputs, revisions)
    }

    /// Encodes the output node's frame. The encode is a suspension point,
    /// so it is preceded by an abort check.
    fn finalize(
        &self,
        pipeline: &PipelineDefinition,
        options: &RunOptions<'_>,
    ) -> Result<RunOutput> {
        let output_node = pipeline
            .nodes
            .iter()
            .find(|n| n.kind == NodeKind::Output)
            .ok_or(PipelineError::EmptyOutput)?;

        let frame = self
            .states
            .get(&output_node.id)
            .filter(|s| matches!(s.status, NodeStatus::Done | NodeStatus::Cached))
            .and_then(|s| s.output.clone())
            .ok_or(PipelineError::EmptyOutput)?;

        if options.signal.is_some_and(CancelToken::is_cancelled) {
            return Err(PipelineError::Aborted);
        }

        let format = encode::OutputFormat::parse(
            output_node.params.get("format").and_then(crate::pipeline::ParamValue::as_str),
        );
        let quality = output_node
            .params
            .get("quality")
            .and_then(crate::pipeline::ParamValue::as_f64)
            .map_or(DEFAULT_QUALITY, |q| q as f32);

        let blob = encode::encode_frame(&frame, format, quality)?;

        let node_outputs = self
            .states
            .iter()
            .filter_map(|(id, s)| s.output.clone().map(|f| (id.clone(), f)))
            .collect();

        Ok(RunOutput {
            blob,
            width: frame.width(),
            height: frame.height(),
            node_outputs,
        })
    }
}

impl Default for Runner {
    fn default() -> Self {
        Self::new()
    }
}

fn notify_status(options: &RunOptions<'_>, node_id: &str, status: NodeStatus, error: Option<&str>) {
    if let Some(observer) = options.observer {
        observer.node_status(node_id, status, error);
    }
}
