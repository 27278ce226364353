//! SEQPIPE - Decode/encode pipeline core for image-sequence plugins
//!
//! Shared machinery behind input and output plugins in a compositing
//! host: time-to-file resolution, pixel layout/depth/premult
//! conversion, proxy mip-scaling, frame-range caching and the render
//! orchestration around format-specific decode/encode callbacks.

// Pixel plumbing
pub mod buffer;
pub mod convert;
pub mod geom;
pub mod scale;

// Sequence bookkeeping
pub mod range_cache;
pub mod resolve;
pub mod sequence;

// Orchestration
pub mod error;
pub mod params;
pub mod reader;
pub mod writer;

// Re-export the types plugins touch on every call
pub use buffer::{BitDepth, PixelBuffer, PixelData, PixelLayout, PremultState};
pub use error::{CodecError, ConvertError, RenderError, ResolveError, WriteError};
pub use geom::RectI;
pub use params::{ReaderParams, WriterParams};
pub use range_cache::FrameRangeCache;
pub use reader::{
    ColorTransform, FrameDecoder, FrameHeader, IdentityTransform, ParamChange, Reader,
    RenderRequest,
};
pub use resolve::{BoundaryPolicy, FrameMode, FrameRange, Resolved, TimeResolver};
pub use scale::ProxyScale;
pub use sequence::{MissingFramePolicy, SequencePattern};
pub use writer::{FrameEncoder, Writer};
