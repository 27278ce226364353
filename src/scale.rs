//! Proxy scale detection and mip-level downsampling
//!
//! **Why**: Interactive work renders at a fraction of full resolution.
//! When a proxy file exists its scale relative to the original is
//! detected once and cached; when the requested resolution is coarser
//! than what was decoded, the decoded window is reduced by repeated
//! 2x2 box averaging (one mip level per halving).
//!
//! The 2x box filter is the only resampler here. It is deterministic,
//! cheap, and composes: n levels of halving equal one n-level reduction.
//!
//! **Used by**: Reader (proxy path of the render flow).

use log::warn;
use serde::{Deserialize, Serialize};

use crate::buffer::{BitDepth, PixelBuffer};
use crate::convert;
use crate::error::ConvertError;
use crate::geom::{self, RectI};

/// Per-axis ratio of a proxy file's resolution to the original's.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProxyScale {
    pub x: f64,
    pub y: f64,
}

impl ProxyScale {
    pub const IDENTITY: ProxyScale = ProxyScale { x: 1.0, y: 1.0 };

    /// Mip level corresponding to the smaller axis ratio. Logs a
    /// precision warning (non-fatal) when the ratio is not an exact
    /// power of two; alignment is then clamped to pixel boundaries.
    pub fn mip_level(&self) -> u32 {
        let s = self.x.min(self.y);
        let (level, exact) = geom::mip_level_for_scale(s);
        if !exact {
            warn!(
                "proxy scale ({:.4}, {:.4}) is not a power of two; clamping to mip level {}",
                self.x, self.y, level
            );
        }
        level
    }
}

/// Detect the geometric ratio between a proxy file's extent and the
/// original's declared extent. Pure; cached by the caller per file
/// selection. Degenerate extents detect as identity.
pub fn detect_scale(original: &RectI, proxy: &RectI) -> ProxyScale {
    if original.is_empty() || proxy.is_empty() {
        warn!("cannot detect proxy scale from degenerate bounds; assuming 1:1");
        return ProxyScale::IDENTITY;
    }
    ProxyScale {
        x: proxy.width() as f64 / original.width() as f64,
        y: proxy.height() as f64 / original.height() as f64,
    }
}

/// One 2x2 box-average reduction of `src` into `dst`, in mip
/// coordinates: dst pixel (x, y) averages src pixels (2x, 2y) through
/// (2x+1, 2y+1), counting only samples inside the src bounds so edge
/// pixels of odd extents stay correct.
fn halve_window(src: &PixelBuffer, dst: &mut PixelBuffer) {
    let channels = src.layout().channels();
    let src_bounds = src.bounds();
    let r = dst.bounds();
    for y in r.y1..r.y2 {
        let rows = [2 * y, 2 * y + 1];
        for x in r.x1..r.x2 {
            let cols = [2 * x, 2 * x + 1];
            for c in 0..channels {
                let mut sum = 0.0f32;
                let mut count = 0u32;
                for sy in rows {
                    if sy < src_bounds.y1 || sy >= src_bounds.y2 {
                        continue;
                    }
                    for sx in cols {
                        if sx < src_bounds.x1 || sx >= src_bounds.x2 {
                            continue;
                        }
                        sum += src.sample(sx, sy, c);
                        count += 1;
                    }
                }
                let v = if count > 0 { sum / count as f32 } else { 0.0 };
                dst.set_sample(x, y, c, v);
            }
        }
    }
}

/// Box-downsample `src` by `levels` mip levels into `dst`, writing the
/// overlap of the reduced bounds with `dst`'s bounds. `levels == 0` is
/// a straight copy. Layouts must match; intermediate levels are F32.
pub fn downsample(src: &PixelBuffer, levels: u32, dst: &mut PixelBuffer) -> Result<(), ConvertError> {
    if src.layout() != dst.layout() {
        return Err(ConvertError::ComponentMismatch {
            src: src.layout().name(),
            dst: dst.layout().name(),
        });
    }
    if levels == 0 {
        let region = src.bounds().intersect(&dst.bounds());
        return convert::convert(src, dst, &region);
    }

    // Reduce level by level; the last halving lands in a buffer whose
    // bounds are already in the destination's mip space.
    let mut reduced = halve_once(src);
    for _ in 1..levels {
        reduced = halve_once(&reduced);
    }
    let region = reduced.bounds().intersect(&dst.bounds());
    convert::convert(&reduced, dst, &region)
}

fn halve_once(src: &PixelBuffer) -> PixelBuffer {
    let next_bounds = src.bounds().downscale_po2_enclosing(1);
    let mut next = PixelBuffer::new(next_bounds, src.layout(), BitDepth::F32, src.premult());
    halve_window(src, &mut next);
    next
}
