//! Pixel format conversion between two buffer layouts
//!
//! **Why**: Decoded pixels rarely match what the host asked for. This
//! module reshapes bit depth, component count and premultiplication
//! state between two arbitrary buffers, bounded to a region so tiled
//! rendering leaves surrounding pixels untouched.
//!
//! **Used by**: Reader (native layout -> host layout), writer (host
//! layout -> encoder's declared layout).
//!
//! # Component mapping
//!
//! - widening RGB -> RGBA sets alpha to full opacity
//! - widening Alpha -> RGBA keeps the value in A, RGB zero-filled
//! - narrowing drops channels; RGBA -> Alpha takes the alpha channel
//! - RGB -> Alpha and Alpha -> RGB have no lossless mapping and fail
//!
//! # Premultiplication
//!
//! `premultiply`: rgb *= a. `unpremultiply`: rgb /= a, with a == 0
//! producing exactly 0 (never NaN). Conversion between states happens
//! only when both states are known; `Unknown` on either side passes
//! color through unchanged.

use rayon::prelude::*;

use crate::buffer::{PixelBuffer, PixelLayout, PremultState};
use crate::error::ConvertError;
use crate::geom::RectI;

/// Map one source pixel (normalized f32 channels) onto the destination
/// layout. `src` holds `src_layout.channels()` values.
#[inline]
fn map_components(src: &[f32], src_layout: PixelLayout, dst_layout: PixelLayout, dst: &mut [f32]) {
    match (src_layout, dst_layout) {
        (PixelLayout::Rgba, PixelLayout::Rgba)
        | (PixelLayout::Rgb, PixelLayout::Rgb)
        | (PixelLayout::Alpha, PixelLayout::Alpha) => dst.copy_from_slice(src),
        (PixelLayout::Rgba, PixelLayout::Rgb) => dst.copy_from_slice(&src[..3]),
        (PixelLayout::Rgba, PixelLayout::Alpha) => dst[0] = src[3],
        (PixelLayout::Rgb, PixelLayout::Rgba) => {
            dst[..3].copy_from_slice(src);
            dst[3] = 1.0;
        }
        (PixelLayout::Alpha, PixelLayout::Rgba) => {
            dst[0] = 0.0;
            dst[1] = 0.0;
            dst[2] = 0.0;
            dst[3] = src[0];
        }
        // checked in supported_mapping before any write
        (PixelLayout::Rgb, PixelLayout::Alpha) | (PixelLayout::Alpha, PixelLayout::Rgb) => {
            unreachable!()
        }
    }
}

fn supported_mapping(src: PixelLayout, dst: PixelLayout) -> Result<(), ConvertError> {
    match (src, dst) {
        (PixelLayout::Rgb, PixelLayout::Alpha) | (PixelLayout::Alpha, PixelLayout::Rgb) => {
            Err(ConvertError::ComponentMismatch { src: src.name(), dst: dst.name() })
        }
        _ => Ok(()),
    }
}

/// Premult adjustment to apply to an RGBA pixel, decided once per call.
#[derive(Clone, Copy, PartialEq)]
enum PremultOp {
    None,
    Premultiply,
    Unpremultiply,
}

fn premult_op(src: PremultState, dst: PremultState, layout: PixelLayout) -> PremultOp {
    if layout != PixelLayout::Rgba {
        // RGB is opaque, Alpha has no color channels; nothing to adjust
        return PremultOp::None;
    }
    match (src, dst) {
        (PremultState::Unpremultiplied, PremultState::Premultiplied) => PremultOp::Premultiply,
        (PremultState::Premultiplied, PremultState::Unpremultiplied) => PremultOp::Unpremultiply,
        _ => PremultOp::None,
    }
}

#[inline]
fn apply_premult_op(px: &mut [f32; 4], op: PremultOp) {
    match op {
        PremultOp::None => {}
        PremultOp::Premultiply => {
            let a = px[3];
            px[0] *= a;
            px[1] *= a;
            px[2] *= a;
        }
        PremultOp::Unpremultiply => {
            let a = px[3];
            if a == 0.0 {
                px[0] = 0.0;
                px[1] = 0.0;
                px[2] = 0.0;
            } else {
                px[0] /= a;
                px[1] /= a;
                px[2] /= a;
            }
        }
    }
}

/// Convert `src` into `dst` over `region`: bit depth, component count
/// and premultiplication in one pass. Pixels of `dst` outside the
/// region (or outside either buffer's bounds) are left untouched.
///
/// Unsupported layout pairs fail before any sample is written.
pub fn convert(src: &PixelBuffer, dst: &mut PixelBuffer, region: &RectI) -> Result<(), ConvertError> {
    supported_mapping(src.layout(), dst.layout())?;

    let r = region.intersect(&src.bounds()).intersect(&dst.bounds());
    if r.is_empty() {
        return Ok(());
    }

    let src_layout = src.layout();
    let dst_layout = dst.layout();
    let src_ch = src_layout.channels();
    let dst_ch = dst_layout.channels();
    let op = premult_op(src.premult(), dst.premult(), dst_layout);
    let width = r.width() as usize;

    // Normalize and reshape rows in parallel, then store at the
    // destination depth sequentially.
    let rows: Vec<Vec<f32>> = (r.y1..r.y2)
        .into_par_iter()
        .map(|y| {
            let mut row = vec![0.0f32; width * dst_ch];
            let mut src_px = [0.0f32; 4];
            for (xi, x) in (r.x1..r.x2).enumerate() {
                for (c, v) in src_px.iter_mut().enumerate().take(src_ch) {
                    *v = src.sample(x, y, c);
                }
                let out = &mut row[xi * dst_ch..(xi + 1) * dst_ch];
                map_components(&src_px[..src_ch], src_layout, dst_layout, out);
                if op != PremultOp::None && dst_ch == 4 {
                    let mut px = [out[0], out[1], out[2], out[3]];
                    apply_premult_op(&mut px, op);
                    out.copy_from_slice(&px);
                }
            }
            row
        })
        .collect();

    for (yi, row) in rows.iter().enumerate() {
        let y = r.y1 + yi as i32;
        for (xi, x) in (r.x1..r.x2).enumerate() {
            for c in 0..dst_ch {
                dst.set_sample(x, y, c, row[xi * dst_ch + c]);
            }
        }
    }
    Ok(())
}

/// In-place `rgb *= a` over `region`. RGBA only.
pub fn premultiply(buf: &mut PixelBuffer, region: &RectI) -> Result<(), ConvertError> {
    premult_in_place(buf, region, PremultOp::Premultiply)?;
    buf.set_premult(PremultState::Premultiplied);
    Ok(())
}

/// In-place `rgb /= a` over `region`, zero alpha producing zero. RGBA only.
pub fn unpremultiply(buf: &mut PixelBuffer, region: &RectI) -> Result<(), ConvertError> {
    premult_in_place(buf, region, PremultOp::Unpremultiply)?;
    buf.set_premult(PremultState::Unpremultiplied);
    Ok(())
}

fn premult_in_place(buf: &mut PixelBuffer, region: &RectI, op: PremultOp) -> Result<(), ConvertError> {
    if buf.layout() != PixelLayout::Rgba {
        return Err(ConvertError::NoAlpha { layout: buf.layout().name() });
    }
    let r = region.intersect(&buf.bounds());
    for y in r.y1..r.y2 {
        for x in r.x1..r.x2 {
            let mut px = [
                buf.sample(x, y, 0),
                buf.sample(x, y, 1),
                buf.sample(x, y, 2),
                buf.sample(x, y, 3),
            ];
            apply_premult_op(&mut px, op);
            for (c, v) in px.iter().enumerate() {
                buf.set_sample(x, y, c, *v);
            }
        }
    }
    Ok(())
}
