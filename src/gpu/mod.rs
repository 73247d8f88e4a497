//! GPU device acquisition and lifecycle.
//!
//! The engine holds at most one GPU device per process. [`init_gpu`]
//! performs the (blocking) adapter and device request once and caches the
//! outcome — including a failed outcome — behind a single initialization
//! guard. The device-lost callback clears the cache, so after a loss
//! [`gpu_device`] returns `None` until [`init_gpu`] is called again.
//!
//! All callers must tolerate `None`: the outline executor falls back to its
//! CPU path, background removal resolves its `auto` backend to the CPU, and
//! upscaling fails fast with a clear error.

pub mod transfer;

use std::sync::Arc;

use parking_lot::Mutex;

use crate::errors::GpuError;

pub use transfer::{bitmap_to_texture, texture_to_bitmap};

/// Compute-capable device and queue. No surface: the engine renders into
/// textures and reads them back; presentation belongs to the editor.
pub struct GpuContext {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    /// Distinguishes successive devices across lost/re-init cycles, so
    /// cached per-device resources (compute pipelines) know when to rebuild.
    id: u64,
}

static NEXT_CONTEXT_ID: std::sync::atomic::AtomicU64 = std::sync::atomic::AtomicU64::new(1);

impl GpuContext {
    /// Requests an adapter and device suitable for compute work.
    pub async fn request() -> Result<Self, GpuError> {
        let instance = wgpu::Instance::default();

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .map_err(|e| GpuError::new(format!("adapter request failed: {e}")))?;

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("PipeMagic Device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: wgpu::MemoryHints::Performance,
                ..Default::default()
            })
            .await
            .map_err(|e| GpuError::new(format!("device request failed: {e}")))?;

        Ok(Self {
            device,
            queue,
            id: NEXT_CONTEXT_ID.fetch_add(1, std::sync::atomic::Ordering::Relaxed),
        })
    }

    #[must_use]
    #[inline]
    pub fn id(&self) -> u64 {
        self.id
    }
}

struct GpuSlot {
    attempted: bool,
    context: Option<Arc<GpuContext>>,
}

static GPU: Mutex<GpuSlot> = Mutex::new(GpuSlot {
    attempted: false,
    context: None,
});

/// Attempts to obtain the process-wide GPU device.
///
/// The first call performs the actual acquisition; subsequent calls return
/// the cached result (even a failed one) until the device is lost or
/// [`reset_gpu`] is called.
#[must_use]
pub fn init_gpu() -> Option<Arc<GpuContext>> {
    let mut slot = GPU.lock();
    if slot.attempted {
        return slot.context.clone();
    }
    slot.attempted = true;

    match pollster::block_on(GpuContext::request()) {
        Ok(ctx) => {
            ctx.device
                .set_device_lost_callback(|reason, message| {
                    log::warn!("GPU device lost ({reason:?}): {message}");
                    reset_gpu();
                });
            let ctx = Arc::new(ctx);
            slot.context = Some(ctx.clone());
            log::debug!("GPU device acquired");
            Some(ctx)
        }
        Err(e) => {
            log::warn!("GPU unavailable, CPU paths will be used: {e}");
            None
        }
    }
}

/// Returns the cached GPU device, or `None` when none has been acquired
/// (or it has been lost).
#[must_use]
pub fn gpu_device() -> Option<Arc<GpuContext>> {
    GPU.lock().context.clone()
}

/// Clears the cached device so the next [`init_gpu`] re-acquires.
/// Called from the device-lost callback.
pub fn reset_gpu() {
    let mut slot = GPU.lock();
    slot.attempted = false;
    slot.context = None;
}
