//! Immutable image frames.
//!
//! An [`ImageFrame`] is the value flowing along pipeline edges: an RGBA
//! bitmap plus a monotonically increasing `revision` tag stamped at
//! construction. The revision is the ONLY pixel fingerprint that enters
//! cache keys — executors never hash upstream bitmaps. Any change that could
//! alter pixels must therefore produce a *new* frame (and with it a new
//! revision); frames are never mutated in place.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use image::RgbaImage;

// Process-wide revision clock. Starts at 1 so 0 can never collide with a
// stamped frame.
static NEXT_REVISION: AtomicU64 = AtomicU64::new(1);

/// Immutable RGBA image value with width, height, and monotonic revision.
#[derive(Debug, Clone)]
pub struct ImageFrame {
    bitmap: Arc<RgbaImage>,
    width: u32,
    height: u32,
    revision: u64,
}

impl ImageFrame {
    /// Wraps a bitmap into a frame, stamping the next revision.
    #[must_use]
    pub fn new(bitmap: RgbaImage) -> Self {
        let width = bitmap.width();
        let height = bitmap.height();
        Self {
            bitmap: Arc::new(bitmap),
            width,
            height,
            revision: NEXT_REVISION.fetch_add(1, Ordering::Relaxed),
        }
    }

    #[must_use]
    #[inline]
    pub fn bitmap(&self) -> &RgbaImage {
        &self.bitmap
    }

    #[must_use]
    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[must_use]
    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Monotonic tag assigned when the frame was produced.
    #[must_use]
    #[inline]
    pub fn revision(&self) -> u64 {
        self.revision
    }
}
