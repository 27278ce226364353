//! Persisted plugin parameters
//!
//! **Why**: Hosts save effect instances into project files and restore
//! them later. Everything the user can set lives here as one
//! serde-serializable block, so persistence is a single
//! `serde_json::to_string` / `from_str` pair.
//!
//! Defaults mirror fresh-instance behavior: hold at both boundaries,
//! error on missing frames, zero time offset, automatic proxy scale.

use serde::{Deserialize, Serialize};

use crate::buffer::{PixelLayout, PremultState};
use crate::resolve::{BoundaryPolicy, FrameMode, TimeResolver};
use crate::scale::ProxyScale;
use crate::sequence::MissingFramePolicy;

/// Parameters of a reader instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderParams {
    /// Sequence filename or pattern.
    pub filename: String,
    /// Optional proxy sequence used at reduced resolution.
    pub proxy_filename: String,
    /// Render the proxy when the requested scale is at or below this
    /// threshold (the detected proxy scale by default).
    pub proxy_threshold: Option<ProxyScale>,
    /// Custom threshold overrides the detected one.
    pub custom_proxy_threshold: bool,
    /// User override of the discovered range; None means discovered.
    pub first_frame: Option<i32>,
    pub last_frame: Option<i32>,
    pub frame_mode: FrameMode,
    pub before: BoundaryPolicy,
    pub after: BoundaryPolicy,
    pub missing_frame: MissingFramePolicy,
    /// Layout delivered to the host.
    pub output_layout: PixelLayout,
    /// Premultiplication state the source files claim; Unknown defers
    /// to the decoder.
    pub source_premult: PremultState,
}

impl Default for ReaderParams {
    fn default() -> Self {
        Self {
            filename: String::new(),
            proxy_filename: String::new(),
            proxy_threshold: None,
            custom_proxy_threshold: false,
            first_frame: None,
            last_frame: None,
            frame_mode: FrameMode::TimeOffset { offset: 0.0 },
            before: BoundaryPolicy::Hold,
            after: BoundaryPolicy::Hold,
            missing_frame: MissingFramePolicy::Error,
            output_layout: PixelLayout::Rgba,
            source_premult: PremultState::Unknown,
        }
    }
}

impl ReaderParams {
    pub fn resolver(&self) -> TimeResolver {
        TimeResolver { mode: self.frame_mode, before: self.before, after: self.after }
    }
}

/// Parameters of a writer instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WriterParams {
    /// Output filename or pattern.
    pub filename: String,
    /// First/last frame of the render job.
    pub first_frame: i32,
    pub last_frame: i32,
    /// Premultiplication state of the incoming image.
    pub input_premult: PremultState,
}

impl Default for WriterParams {
    fn default() -> Self {
        Self {
            filename: String::new(),
            first_frame: 1,
            last_frame: 1,
            input_premult: PremultState::Premultiplied,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Parameters survive a project save/load round trip.
    #[test]
    fn test_reader_params_json_roundtrip() {
        let params = ReaderParams {
            filename: "shot.%04d.exr".into(),
            first_frame: Some(101),
            after: BoundaryPolicy::Black,
            missing_frame: MissingFramePolicy::HoldNearest,
            frame_mode: FrameMode::TimeOffset { offset: 5.0 },
            ..Default::default()
        };
        let json = serde_json::to_string(&params).unwrap();
        let back: ReaderParams = serde_json::from_str(&json).unwrap();
        assert_eq!(back, params);
    }

    /// Older project files missing newer fields load with defaults.
    #[test]
    fn test_reader_params_partial_json() {
        let back: ReaderParams =
            serde_json::from_str(r#"{"filename": "a.*.png"}"#).unwrap();
        assert_eq!(back.filename, "a.*.png");
        assert_eq!(back.before, BoundaryPolicy::Hold);
        assert_eq!(back.output_layout, PixelLayout::Rgba);
    }

    #[test]
    fn test_writer_params_roundtrip() {
        let params = WriterParams {
            filename: "out.%04d.png".into(),
            first_frame: 1,
            last_frame: 48,
            input_premult: PremultState::Unpremultiplied,
        };
        let json = serde_json::to_string(&params).unwrap();
        let back: WriterParams = serde_json::from_str(&json).unwrap();
        assert_eq!(back, params);
    }
}
