//! Error taxonomy for the pipeline core
//!
//! Four families: resolution (time -> file mapping), decode/encode
//! (format callbacks), conversion (pixel reshaping). Precision issues
//! with non-integer proxy scales are warnings, not errors; they are
//! logged at the point of clamping and never surface here.

use thiserror::Error;

/// Time-to-file resolution failures. Reported per frame; the render
/// for that call aborts, other calls are unaffected.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ResolveError {
    #[error("time {time} is outside the frame range [{first}, {last}]")]
    OutOfRange { time: f64, first: i32, last: i32 },

    #[error("no file on disk for frame {frame}")]
    MissingFrame { frame: i32 },

    #[error("no input file selected")]
    NoInput,

    #[error("frame range discovery failed: {0}")]
    Discovery(String),
}

/// Pixel-layout reshaping failures. Always fatal for the call, never
/// silently approximated; no partial write is made to the destination.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConvertError {
    #[error("cannot map {src} components to {dst} components")]
    ComponentMismatch { src: &'static str, dst: &'static str },

    #[error("premultiply requires an alpha channel ({layout} has none)")]
    NoAlpha { layout: &'static str },
}

/// Failure reported by a format decode/encode callback. Carries only a
/// human-readable message; the orchestrators attach the filename.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("{0}")]
pub struct CodecError(pub String);

impl CodecError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Render-call outcome for the reader orchestrator.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Convert(#[from] ConvertError),

    #[error("{filename}: cannot load frame: {message}")]
    Decode { filename: String, message: String },

    #[error("proxy decoded at {decoded_levels} mip levels cannot supply a request at {requested_levels} levels")]
    ProxyUpscale { decoded_levels: u32, requested_levels: u32 },

    #[error("render window {0:?} is outside the destination bounds")]
    WindowOutOfBounds(crate::geom::RectI),
}

/// Encode-call outcome for the writer orchestrator.
#[derive(Debug, Error)]
pub enum WriteError {
    #[error("no output file selected")]
    NoOutput,

    #[error("unsupported file extension: .{0}")]
    UnsupportedExtension(String),

    #[error(transparent)]
    Convert(#[from] ConvertError),

    #[error("{filename}: cannot write frame: {message}")]
    Encode { filename: String, message: String },
}
