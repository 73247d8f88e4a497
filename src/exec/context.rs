//! Per-node execution context.
//!
//! Executors are anonymous: they report progress, status text, and download
//! ratios without knowing which node they run as. The scheduler builds one
//! [`ExecutionContext`] per node invocation, and the context rewrites every
//! event onto the owning node id before handing it to the run observer.

use std::cell::{Cell, RefCell};
use std::sync::Arc;

use crate::cancel::CancelToken;
use crate::capability::CapabilityEvents;
use crate::errors::ExecError;
use crate::frame::ImageFrame;
use crate::gpu::GpuContext;
use crate::pipeline::Params;
use crate::runner::RunObserver;

/// Which compute path a node ended up using.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceUsed {
    Gpu,
    Cpu,
}

pub struct ExecutionContext<'a> {
    node_id: &'a str,
    params: &'a Params,
    inputs: &'a [ImageFrame],
    gpu: Option<Arc<GpuContext>>,
    signal: Option<&'a CancelToken>,
    observer: Option<&'a dyn RunObserver>,
    last_progress: Cell<f32>,
    last_status_message: RefCell<Option<String>>,
    last_download_progress: Cell<Option<f32>>,
    device_used: Cell<Option<DeviceUsed>>,
}

impl<'a> ExecutionContext<'a> {
    #[must_use]
    pub fn new(
        node_id: &'a str,
        params: &'a Params,
        inputs: &'a [ImageFrame],
        gpu: Option<Arc<GpuContext>>,
        signal: Option<&'a CancelToken>,
        observer: Option<&'a dyn RunObserver>,
    ) -> Self {
        Self {
            node_id,
            params,
            inputs,
            gpu,
            signal,
            observer,
            last_progress: Cell::new(0.0),
            last_status_message: RefCell::new(None),
            last_download_progress: Cell::new(None),
            device_used: Cell::new(None),
        }
    }

    #[must_use]
    #[inline]
    pub fn node_id(&self) -> &str {
        self.node_id
    }

    #[must_use]
    #[inline]
    pub fn inputs(&self) -> &[ImageFrame] {
        self.inputs
    }

    /// The first upstream frame, or the canonical "No input image" failure.
    pub fn first_input(&self) -> Result<&ImageFrame, ExecError> {
        self.inputs
            .first()
            .ok_or_else(|| ExecError::failed("No input image"))
    }

    #[must_use]
    #[inline]
    pub fn gpu(&self) -> Option<&Arc<GpuContext>> {
        self.gpu.as_ref()
    }

    /// Abort check. Executors call this at every suspension point.
    pub fn check_abort(&self) -> Result<(), ExecError> {
        if self.signal.is_some_and(CancelToken::is_cancelled) {
            Err(ExecError::Aborted)
        } else {
            Ok(())
        }
    }

    // ── Event rewriting ────────────────────────────────────────────────────

    /// Reports node progress in `[0, 1]`. Clamped to be monotone
    /// non-decreasing within this node invocation.
    pub fn progress(&self, progress: f32) {
        let clamped = progress.clamp(self.last_progress.get(), 1.0);
        self.last_progress.set(clamped);
        if let Some(observer) = self.observer {
            observer.node_progress(self.node_id, clamped);
        }
    }

    /// Free-form user-facing status text; `None` clears it.
    pub fn status_message(&self, message: Option<&str>) {
        *self.last_status_message.borrow_mut() = message.map(ToString::to_string);
        if let Some(observer) = self.observer {
            observer.node_status_message(self.node_id, message);
        }
    }

    /// The most recent status text, for the scheduler's state record.
    #[must_use]
    pub fn last_status_message(&self) -> Option<String> {
        self.last_status_message.borrow().clone()
    }

    /// The most recent download ratio, for the scheduler's state record.
    #[must_use]
    pub fn last_download_progress(&self) -> Option<f32> {
        self.last_download_progress.get()
    }

    /// Records which compute path served this node.
    pub fn mark_device(&self, device: DeviceUsed) {
        self.device_used.set(Some(device));
    }

    #[must_use]
    pub fn device_used(&self) -> Option<DeviceUsed> {
        self.device_used.get()
    }

    // ── Parameter access ───────────────────────────────────────────────────

    #[must_use]
    pub fn param_f64(&self, key: &str) -> Option<f64> {
        self.params.get(key).and_then(crate::pipeline::ParamValue::as_f64)
    }

    #[must_use]
    pub fn param_f32(&self, key: &str) -> Option<f32> {
        self.param_f64(key).map(|n| n as f32)
    }

    #[must_use]
    pub fn param_str(&self, key: &str) -> Option<&str> {
        self.params.get(key).and_then(crate::pipeline::ParamValue::as_str)
    }

    #[must_use]
    pub fn param_bool(&self, key: &str) -> Option<bool> {
        self.params.get(key).and_then(crate::pipeline::ParamValue::as_bool)
    }
}

impl CapabilityEvents for ExecutionContext<'_> {
    fn download_progress(&self, ratio: Option<f32>) {
        self.last_download_progress.set(ratio);
        if let Some(observer) = self.observer {
            observer.node_download_progress(self.node_id, ratio);
        }
    }

    fn status(&self, message: &str) {
        self.status_message(Some(message));
    }
}
