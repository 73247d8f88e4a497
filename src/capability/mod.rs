//! External capabilities.
//!
//! Background removal and super-resolution are *capabilities*: narrow
//! interfaces whose implementations (the actual ML providers) are injected
//! by the host application. This keeps the scheduler free of model-framework
//! coupling and makes CPU-only testing possible with deterministic stubs.
//!
//! Providers are process-wide singletons keyed by their configuration tuple.
//! On first use an instance is built and its weights fetched; subsequent
//! calls with the same key reuse it; a different key reconfigures the same
//! instance in place (avoids rebuilding GPU state).

use image::{GrayImage, RgbaImage};
use parking_lot::Mutex;

use crate::errors::CapabilityError;

// ─── Progress Events ──────────────────────────────────────────────────────────

/// Sink for capability lifecycle events. Implemented by the per-node
/// execution context, which rewrites them onto the owning node.
pub trait CapabilityEvents {
    /// Weight/model download progress, `loaded/total` of the largest file
    /// observed. `None` signals the end of the download phase.
    fn download_progress(&self, ratio: Option<f32>);

    /// Free-form user-facing progress text.
    fn status(&self, message: &str);
}

/// Event sink that discards everything.
pub struct NullEvents;

impl CapabilityEvents for NullEvents {
    fn download_progress(&self, _ratio: Option<f32>) {}
    fn status(&self, _message: &str) {}
}

// ─── Super-Resolution ─────────────────────────────────────────────────────────

/// Weights-table address of a super-resolution network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SrKey {
    pub model: SrModel,
    pub content_type: SrContentType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SrModel {
    Cnn2xS,
    Cnn2xM,
    Cnn2xL,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SrContentType {
    /// Real-life photography.
    Rl,
    /// Anime / illustration.
    An,
    /// 3D renders.
    ThreeD,
}

/// Learned 2× RGB super-resolution. The capability operates on RGB only;
/// the upscale executor handles alpha separately.
pub trait SuperResolver: Send {
    /// Loads or switches to the network addressed by `key`. Called before
    /// every render with the currently requested key; implementations only
    /// do work when the key changed.
    fn prepare(&mut self, key: SrKey, events: &dyn CapabilityEvents) -> Result<(), CapabilityError>;

    /// Renders the 2× upscaled bitmap. The alpha channel of the result is
    /// unspecified.
    fn render(&mut self, bitmap: &RgbaImage) -> Result<RgbaImage, CapabilityError>;

    /// Whether this provider needs a live GPU device. Deterministic test
    /// stubs override this to `false`.
    fn requires_gpu(&self) -> bool {
        true
    }
}

struct SrSlot {
    provider: Box<dyn SuperResolver>,
    active: Option<SrKey>,
}

static SUPER_RESOLVER: Mutex<Option<SrSlot>> = Mutex::new(None);

/// Installs the process-wide super-resolution provider.
pub fn install_super_resolver(provider: Box<dyn SuperResolver>) {
    *SUPER_RESOLVER.lock() = Some(SrSlot {
        provider,
        active: None,
    });
}

/// Runs `f` against the installed provider after ensuring it is prepared
/// for `key`. Returns an error when no provider is installed.
pub fn with_super_resolver<R>(
    key: SrKey,
    events: &dyn CapabilityEvents,
    f: impl FnOnce(&mut dyn SuperResolver) -> Result<R, CapabilityError>,
) -> Result<R, CapabilityError> {
    let mut guard = SUPER_RESOLVER.lock();
    let slot = guard
        .as_mut()
        .ok_or_else(|| CapabilityError("No super-resolution provider installed".to_string()))?;

    if slot.active != Some(key) {
        log::debug!("switching super-resolution network to {key:?}");
        slot.provider.prepare(key, events)?;
        slot.active = Some(key);
    }

    f(slot.provider.as_mut())
}

/// Whether the installed super-resolution provider needs a GPU device.
/// `None` when no provider is installed.
#[must_use]
pub fn super_resolver_requires_gpu() -> Option<bool> {
    SUPER_RESOLVER
        .lock()
        .as_ref()
        .map(|slot| slot.provider.requires_gpu())
}

// ─── Segmentation ─────────────────────────────────────────────────────────────

/// Resolved inference backend. The `auto` pipeline parameter is resolved by
/// the remove-bg executor before the capability sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SegmenterBackend {
    Gpu,
    Cpu,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SegmenterDtype {
    Fp32,
    Fp16,
    Q8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SegmenterConfig {
    pub backend: SegmenterBackend,
    pub dtype: SegmenterDtype,
}

/// Foreground segmentation: produces an alpha mask for the input image.
pub trait Segmenter: Send {
    /// Loads or reconfigures the model for `config`.
    fn prepare(
        &mut self,
        config: SegmenterConfig,
        events: &dyn CapabilityEvents,
    ) -> Result<(), CapabilityError>;

    /// Segments the image; the returned mask has the input's dimensions.
    fn segment(&mut self, bitmap: &RgbaImage, threshold: f32)
    -> Result<GrayImage, CapabilityError>;
}

struct SegSlot {
    provider: Box<dyn Segmenter>,
    active: Option<SegmenterConfig>,
}

static SEGMENTER: Mutex<Option<SegSlot>> = Mutex::new(None);

/// Installs the process-wide segmentation provider.
pub fn install_segmenter(provider: Box<dyn Segmenter>) {
    *SEGMENTER.lock() = Some(SegSlot {
        provider,
        active: None,
    });
}

/// Runs `f` against the installed segmenter after ensuring it is prepared
/// for `config`.
pub fn with_segmenter<R>(
    config: SegmenterConfig,
    events: &dyn CapabilityEvents,
    f: impl FnOnce(&mut dyn Segmenter) -> Result<R, CapabilityError>,
) -> Result<R, CapabilityError> {
    let mut guard = SEGMENTER.lock();
    let slot = guard
        .as_mut()
        .ok_or_else(|| CapabilityError("No segmentation provider installed".to_string()))?;

    if slot.active != Some(config) {
        log::debug!("reconfiguring segmenter for {config:?}");
        slot.provider.prepare(config, events)?;
        slot.active = Some(config);
    }

    f(slot.provider.as_mut())
}
