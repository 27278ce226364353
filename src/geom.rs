//! Integer pixel rectangles
//!
//! **Why**: Render requests, frame bounds and decode windows are all
//! axis-aligned integer rects. Half-open convention: `x1..x2`, `y1..y2`.
//!
//! **Used by**: Buffer windows, the reader's decode-window math, proxy
//! mip-level arithmetic.

use serde::{Deserialize, Serialize};

/// Axis-aligned integer rectangle, half-open on both axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RectI {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl RectI {
    pub fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Rectangle anchored at the origin with the given extent.
    pub fn from_extent(width: i32, height: i32) -> Self {
        Self { x1: 0, y1: 0, x2: width, y2: height }
    }

    pub fn width(&self) -> i32 {
        (self.x2 - self.x1).max(0)
    }

    pub fn height(&self) -> i32 {
        (self.y2 - self.y1).max(0)
    }

    pub fn is_empty(&self) -> bool {
        self.x2 <= self.x1 || self.y2 <= self.y1
    }

    /// Pixel count (0 when empty).
    pub fn area(&self) -> usize {
        self.width() as usize * self.height() as usize
    }

    pub fn contains(&self, other: &RectI) -> bool {
        other.is_empty()
            || (self.x1 <= other.x1
                && self.y1 <= other.y1
                && self.x2 >= other.x2
                && self.y2 >= other.y2)
    }

    /// Intersection; empty rect (zeroed) when the rects don't overlap.
    pub fn intersect(&self, other: &RectI) -> RectI {
        let r = RectI {
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
            x2: self.x2.min(other.x2),
            y2: self.y2.min(other.y2),
        };
        if r.is_empty() { RectI::new(0, 0, 0, 0) } else { r }
    }

    /// Smallest rect enclosing `self` after downscaling by `levels`
    /// power-of-two mip levels.
    pub fn downscale_po2_enclosing(&self, levels: u32) -> RectI {
        let s = 1i64 << levels;
        RectI {
            x1: (self.x1 as i64).div_euclid(s) as i32,
            y1: (self.y1 as i64).div_euclid(s) as i32,
            x2: ((self.x2 as i64) + s - 1).div_euclid(s) as i32,
            y2: ((self.y2 as i64) + s - 1).div_euclid(s) as i32,
        }
    }

    /// Upscale by `levels` power-of-two mip levels.
    pub fn upscale_po2(&self, levels: u32) -> RectI {
        RectI {
            x1: self.x1 << levels,
            y1: self.y1 << levels,
            x2: self.x2 << levels,
            y2: self.y2 << levels,
        }
    }
}

/// Mip level whose power-of-two factor best matches `scale` (0.5 -> 1,
/// 0.25 -> 2). Returns the level and whether the scale was an exact
/// power of two; callers log a precision warning on inexact scales.
pub fn mip_level_for_scale(scale: f64) -> (u32, bool) {
    if scale >= 1.0 {
        return (0, scale == 1.0);
    }
    let level = (-scale.log2()).round().max(0.0) as u32;
    let exact = (2f64.powi(-(level as i32)) - scale).abs() < 1e-9;
    (level, exact)
}
