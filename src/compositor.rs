//! Mask-driven alpha compositing
//!
//! The mask weights the subject against the background per pixel. Where the
//! mask says background, the background's color is laid over the subject
//! with alpha `backgroundAlpha * (1 - m)`; where it says foreground, the
//! overlay is fully transparent and the subject shows through. The result is
//! combined with the standard "over" operator:
//!
//! ```text
//! overlayAlpha   = bgA * (1 - m)
//! compositeAlpha = (1 - overlayAlpha) * sA + overlayAlpha
//! channel        = ((1 - overlayAlpha) * sA * s + overlayAlpha * bg * (1 - m)) / compositeAlpha
//! ```
//!
//! with every value normalized to `[0, 1]` and channels set to 0 when
//! `compositeAlpha` is within `f32::EPSILON` of zero.
//!
//! Only the blue, green and red bytes of the subject are rewritten. The
//! subject's alpha byte survives compositing unchanged, and callers rely on
//! that.

use crate::config::CompositeConfig;
use crate::error::{CompositeError, Result};
use crate::types::{Mask, PixelBuffer, PixelFormat, BYTES_PER_PIXEL};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::sync::Arc;
use tracing::{debug, instrument};

/// Blends a background into a subject buffer in place
///
/// Clones share the dedicated thread pool, if one was configured.
#[derive(Clone)]
pub struct AlphaCompositor {
    parallel: bool,
    pool: Option<Arc<ThreadPool>>,
}

impl Default for AlphaCompositor {
    fn default() -> Self {
        Self {
            parallel: true,
            pool: None,
        }
    }
}

impl std::fmt::Debug for AlphaCompositor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlphaCompositor")
            .field("parallel", &self.parallel)
            .field("pool_threads", &self.pool.as_ref().map(|pool| pool.current_num_threads()))
            .finish()
    }
}

impl AlphaCompositor {
    /// Row-parallel compositor on the global rayon pool
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Single-threaded compositor
    #[must_use]
    pub fn serial() -> Self {
        Self {
            parallel: false,
            pool: None,
        }
    }

    /// Build a compositor from configuration
    ///
    /// A non-zero `num_threads` on a parallel configuration builds a
    /// dedicated pool once; every later `composite` call reuses it.
    ///
    /// # Errors
    /// - `Internal` if the thread pool cannot be created
    pub fn from_config(config: &CompositeConfig) -> Result<Self> {
        let pool = if config.parallel && config.num_threads > 0 {
            let pool = ThreadPoolBuilder::new()
                .num_threads(config.num_threads)
                .thread_name(|index| format!("bgreplace-composite-{index}"))
                .build()
                .map_err(|e| CompositeError::internal(format!("Failed to build compositing thread pool: {}", e)))?;
            debug!(threads = config.num_threads, "Built dedicated compositing pool");
            Some(Arc::new(pool))
        } else {
            None
        };

        Ok(Self {
            parallel: config.parallel,
            pool,
        })
    }

    /// Threads in the dedicated pool, if one was configured
    #[must_use]
    pub fn pool_threads(&self) -> Option<usize> {
        self.pool.as_ref().map(|pool| pool.current_num_threads())
    }

    /// Composite `background` into `subject` using `mask` as foreground weight
    ///
    /// `background` is addressed in the subject's coordinate space starting
    /// at its top-left corner, so it is normally pre-cropped to the subject's
    /// size. Every buffer's own stride is honoured.
    ///
    /// All preconditions are checked before the first byte is written; a
    /// failing call leaves `subject` untouched.
    ///
    /// # Errors
    /// - `FormatError` if either buffer is not BGRA8
    /// - `FormatError` if the mask size differs from the subject size
    /// - `FormatError` if the background is smaller than the subject
    #[instrument(skip_all, fields(width = subject.width(), height = subject.height(), parallel = self.parallel))]
    pub fn composite(&self, subject: &mut PixelBuffer, background: &PixelBuffer, mask: &Mask) -> Result<()> {
        Self::check_preconditions(subject, background, mask)?;

        let width = subject.width() as usize;
        let stride = subject.bytes_per_row();
        let rows = subject.rows_region_mut();

        if !self.parallel {
            for (y, row) in rows.chunks_mut(stride).enumerate() {
                blend_row(row, y as u32, width, background, mask);
            }
            return Ok(());
        }

        let run = |rows: &mut [u8]| {
            rows.par_chunks_mut(stride)
                .enumerate()
                .for_each(|(y, row)| blend_row(row, y as u32, width, background, mask));
        };

        match &self.pool {
            Some(pool) => pool.install(|| run(rows)),
            None => run(rows),
        }

        Ok(())
    }

    fn check_preconditions(subject: &PixelBuffer, background: &PixelBuffer, mask: &Mask) -> Result<()> {
        for (role, buffer) in [("subject", subject), ("background", background)] {
            if buffer.format() != PixelFormat::Bgra8 {
                return Err(CompositeError::format(format!(
                    "{} buffer must be BGRA8, got {}",
                    role,
                    buffer.format()
                )));
            }
        }

        if mask.dimensions() != subject.dimensions() {
            return Err(CompositeError::format(format!(
                "Mask {}x{} does not match subject {}x{}",
                mask.width(),
                mask.height(),
                subject.width(),
                subject.height()
            )));
        }

        if background.width() < subject.width() || background.height() < subject.height() {
            return Err(CompositeError::format(format!(
                "Background {}x{} is smaller than subject {}x{}",
                background.width(),
                background.height(),
                subject.width(),
                subject.height()
            )));
        }

        Ok(())
    }
}

/// Blend one subject row; `row` may carry trailing padding, which is skipped
fn blend_row(row: &mut [u8], y: u32, width: usize, background: &PixelBuffer, mask: &Mask) {
    let (Some(background_row), Some(mask_row)) = (background.row(y), mask.row(y)) else {
        return;
    };

    row.chunks_exact_mut(BYTES_PER_PIXEL)
        .take(width)
        .zip(background_row.chunks_exact(BYTES_PER_PIXEL))
        .zip(mask_row)
        .for_each(|((pixel, background_pixel), &weight)| blend_pixel(pixel, background_pixel, weight));
}

#[inline]
fn blend_pixel(pixel: &mut [u8], background: &[u8], weight: f32) {
    let ([b, g, r, a], [bg_b, bg_g, bg_r, bg_a]) = (pixel, background) else {
        return;
    };

    let background_ratio = 1.0 - weight;
    let subject_alpha = unit(*a);
    let overlay_alpha = unit(*bg_a) * background_ratio;
    let composite_alpha = (1.0 - overlay_alpha) * subject_alpha + overlay_alpha;

    if composite_alpha.abs() <= f32::EPSILON {
        *b = 0;
        *g = 0;
        *r = 0;
        return;
    }

    let base_weight = (1.0 - overlay_alpha) * subject_alpha;
    for (channel, overlay) in [(b, bg_b), (g, bg_g), (r, bg_r)] {
        let overlay_channel = unit(*overlay) * background_ratio;
        let blended = (base_weight * unit(*channel) + overlay_alpha * overlay_channel) / composite_alpha;
        *channel = to_byte(blended);
    }
}

#[inline]
fn unit(byte: u8) -> f32 {
    f32::from(byte) / 255.0
}

#[inline]
fn to_byte(value: f32) -> u8 {
    (value * 255.0).round().clamp(0.0, 255.0) as u8
}
