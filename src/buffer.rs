//! Pixel buffers with explicit bounds, stride, layout and depth
//!
//! **Why**: Decode targets, host destination images and conversion temps
//! all carry different precision levels and channel counts:
//! - U8/U16: integer LDR depths (PNG, DPX-style sources)
//! - F16: half-precision HDR (EXR HALF)
//! - F32: full-precision HDR (EXR FLOAT), the working depth
//!
//! **Used by**: The converter (reshaping), the scaler (mip levels), both
//! orchestrators (decode targets and pass-through copies).
//!
//! # Normalization
//!
//! Integer sample value `v` at depth `d` maps to float `v / (2^d - 1)`;
//! the reverse maps with round-to-nearest and clamping to the
//! representable range. All cross-depth traffic goes through f32.
//!
//! # Ownership
//!
//! Buffers are caller-allocated. Orchestrators never free buffers they
//! did not allocate; temporaries they allocate are dropped within the
//! same render call.

use half::f16;
use serde::{Deserialize, Serialize};

use crate::geom::RectI;

/// Sample bit depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BitDepth {
    U8,
    U16,
    F16,
    F32,
}

impl BitDepth {
    pub fn bytes(&self) -> usize {
        match self {
            BitDepth::U8 => 1,
            BitDepth::U16 => 2,
            BitDepth::F16 => 2,
            BitDepth::F32 => 4,
        }
    }
}

/// Component layout of a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PixelLayout {
    Rgba,
    Rgb,
    Alpha,
}

impl PixelLayout {
    pub fn channels(&self) -> usize {
        match self {
            PixelLayout::Rgba => 4,
            PixelLayout::Rgb => 3,
            PixelLayout::Alpha => 1,
        }
    }

    /// Channel index of alpha, if the layout has one.
    pub fn alpha_channel(&self) -> Option<usize> {
        match self {
            PixelLayout::Rgba => Some(3),
            PixelLayout::Rgb => None,
            PixelLayout::Alpha => Some(0),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            PixelLayout::Rgba => "RGBA",
            PixelLayout::Rgb => "RGB",
            PixelLayout::Alpha => "Alpha",
        }
    }
}

/// Premultiplication state of color channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PremultState {
    Premultiplied,
    Unpremultiplied,
    Unknown,
}

/// Backing storage, one variant per depth.
#[derive(Debug, Clone)]
pub enum PixelData {
    U8(Vec<u8>),
    U16(Vec<u16>),
    F16(Vec<f16>),
    F32(Vec<f32>),
}

impl PixelData {
    fn zeroed(depth: BitDepth, samples: usize) -> Self {
        match depth {
            BitDepth::U8 => PixelData::U8(vec![0; samples]),
            BitDepth::U16 => PixelData::U16(vec![0; samples]),
            BitDepth::F16 => PixelData::F16(vec![f16::ZERO; samples]),
            BitDepth::F32 => PixelData::F32(vec![0.0; samples]),
        }
    }

    fn len(&self) -> usize {
        match self {
            PixelData::U8(v) => v.len(),
            PixelData::U16(v) => v.len(),
            PixelData::F16(v) => v.len(),
            PixelData::F32(v) => v.len(),
        }
    }
}

/// Integer sample -> normalized float, depth `bits`.
#[inline]
pub fn int_to_float(v: u32, bits: u32) -> f32 {
    let max = ((1u64 << bits) - 1) as f32;
    v as f32 / max
}

/// Normalized float -> integer sample, round-to-nearest, clamped.
#[inline]
pub fn float_to_int(f: f32, bits: u32) -> u32 {
    let max = ((1u64 << bits) - 1) as f32;
    (f * max + 0.5).floor().clamp(0.0, max) as u32
}

/// Rectangular window of samples with explicit bounds and row stride.
#[derive(Debug, Clone)]
pub struct PixelBuffer {
    data: PixelData,
    bounds: RectI,
    /// Samples (not pixels) per row.
    row_stride: usize,
    layout: PixelLayout,
    premult: PremultState,
}

impl PixelBuffer {
    /// Allocate a zero-filled buffer covering `bounds`.
    pub fn new(bounds: RectI, layout: PixelLayout, depth: BitDepth, premult: PremultState) -> Self {
        let row_stride = bounds.width() as usize * layout.channels();
        let samples = row_stride * bounds.height() as usize;
        Self {
            data: PixelData::zeroed(depth, samples),
            bounds,
            row_stride,
            layout,
            premult,
        }
    }

    /// Wrap existing storage. `data.len()` must cover
    /// `row_stride * bounds.height()` samples.
    pub fn from_data(
        data: PixelData,
        bounds: RectI,
        row_stride: usize,
        layout: PixelLayout,
        premult: PremultState,
    ) -> Self {
        assert!(data.len() >= row_stride * bounds.height() as usize);
        Self { data, bounds, row_stride, layout, premult }
    }

    pub fn bounds(&self) -> RectI {
        self.bounds
    }

    pub fn layout(&self) -> PixelLayout {
        self.layout
    }

    pub fn depth(&self) -> BitDepth {
        match self.data {
            PixelData::U8(_) => BitDepth::U8,
            PixelData::U16(_) => BitDepth::U16,
            PixelData::F16(_) => BitDepth::F16,
            PixelData::F32(_) => BitDepth::F32,
        }
    }

    pub fn premult(&self) -> PremultState {
        self.premult
    }

    pub fn set_premult(&mut self, premult: PremultState) {
        self.premult = premult;
    }

    pub fn row_stride(&self) -> usize {
        self.row_stride
    }

    pub fn data(&self) -> &PixelData {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut PixelData {
        &mut self.data
    }

    /// Memory size in bytes.
    pub fn mem(&self) -> usize {
        self.data.len() * self.depth().bytes()
    }

    #[inline]
    fn sample_index(&self, x: i32, y: i32, c: usize) -> usize {
        debug_assert!(x >= self.bounds.x1 && x < self.bounds.x2);
        debug_assert!(y >= self.bounds.y1 && y < self.bounds.y2);
        debug_assert!(c < self.layout.channels());
        (y - self.bounds.y1) as usize * self.row_stride
            + (x - self.bounds.x1) as usize * self.layout.channels()
            + c
    }

    /// Read one sample as a normalized f32.
    #[inline]
    pub fn sample(&self, x: i32, y: i32, c: usize) -> f32 {
        let i = self.sample_index(x, y, c);
        match &self.data {
            PixelData::U8(v) => int_to_float(v[i] as u32, 8),
            PixelData::U16(v) => int_to_float(v[i] as u32, 16),
            PixelData::F16(v) => v[i].to_f32(),
            PixelData::F32(v) => v[i],
        }
    }

    /// Write one sample from a normalized f32 (round-to-nearest and
    /// clamped for integer depths).
    #[inline]
    pub fn set_sample(&mut self, x: i32, y: i32, c: usize, f: f32) {
        let i = self.sample_index(x, y, c);
        match &mut self.data {
            PixelData::U8(v) => v[i] = float_to_int(f, 8) as u8,
            PixelData::U16(v) => v[i] = float_to_int(f, 16) as u16,
            PixelData::F16(v) => v[i] = f16::from_f32(f),
            PixelData::F32(v) => v[i] = f,
        }
    }

    /// Zero-fill the intersection of `region` with this buffer's bounds.
    /// Samples outside the region are left untouched.
    pub fn fill_black(&mut self, region: &RectI) {
        let r = self.bounds.intersect(region);
        if r.is_empty() {
            return;
        }
        let channels = self.layout.channels();
        for y in r.y1..r.y2 {
            let start = self.sample_index(r.x1, y, 0);
            let end = start + r.width() as usize * channels;
            match &mut self.data {
                PixelData::U8(v) => v[start..end].fill(0),
                PixelData::U16(v) => v[start..end].fill(0),
                PixelData::F16(v) => v[start..end].fill(f16::ZERO),
                PixelData::F32(v) => v[start..end].fill(0.0),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Every representable integer value must round-trip through the
    /// normalized float mapping (round-to-nearest, clamped).
    #[test]
    fn test_int_float_roundtrip() {
        for v in 0..=255u32 {
            assert_eq!(float_to_int(int_to_float(v, 8), 8), v);
        }
        for v in (0..=65535u32).step_by(7) {
            assert_eq!(float_to_int(int_to_float(v, 16), 16), v);
        }
    }

    /// Concrete scenario: 8-bit 128 -> ~0.50196 -> 128.
    #[test]
    fn test_midpoint_value() {
        let f = int_to_float(128, 8);
        assert!((f - 0.50196).abs() < 1e-4);
        assert_eq!(float_to_int(f, 8), 128);
    }

    #[test]
    fn test_float_to_int_clamps() {
        assert_eq!(float_to_int(-0.5, 8), 0);
        assert_eq!(float_to_int(1.5, 8), 255);
    }

    #[test]
    fn test_sample_accessors() {
        let bounds = RectI::new(2, 3, 6, 7);
        let mut buf = PixelBuffer::new(bounds, PixelLayout::Rgba, BitDepth::U8, PremultState::Unknown);
        buf.set_sample(4, 5, 2, 0.5);
        assert!((buf.sample(4, 5, 2) - int_to_float(128, 8)).abs() < 1e-6);
        assert_eq!(buf.sample(2, 3, 0), 0.0);
    }

    /// Black-fill must only touch the requested region (tiled rendering).
    #[test]
    fn test_fill_black_region_bounded() {
        let bounds = RectI::new(0, 0, 4, 4);
        let mut buf = PixelBuffer::new(bounds, PixelLayout::Alpha, BitDepth::F32, PremultState::Unknown);
        for y in 0..4 {
            for x in 0..4 {
                buf.set_sample(x, y, 0, 1.0);
            }
        }
        buf.fill_black(&RectI::new(1, 1, 3, 3));
        assert_eq!(buf.sample(0, 0, 0), 1.0);
        assert_eq!(buf.sample(1, 1, 0), 0.0);
        assert_eq!(buf.sample(2, 2, 0), 0.0);
        assert_eq!(buf.sample(3, 3, 0), 1.0);
    }
}
