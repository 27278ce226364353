//! Encode orchestration
//!
//! **Why**: Output plugins share one skeleton: validate the target
//! extension, hand the upstream image through to the next effect
//! untouched, reshape a copy into whatever the format wants, encode.
//! `Writer` owns that skeleton; format plugins supply a
//! [`FrameEncoder`].
//!
//! The pass-through copy happens before any conversion or encoding, so
//! a failed encode never corrupts what downstream effects see.
//!
//! **Used by**: Format plugins (PNG, EXR, ...) via `Writer::new` with
//! their encoder.

use std::path::Path;
use std::sync::RwLock;

use log::{debug, info};

use crate::buffer::{BitDepth, PixelBuffer, PixelLayout, PremultState};
use crate::convert;
use crate::error::{CodecError, WriteError};
use crate::params::WriterParams;
use crate::reader::ColorTransform;
use crate::resolve::round_frame;
use crate::sequence::SequencePattern;

/// Format-specific encode callback. Declares the shape it wants its
/// input in; the orchestrator converts before calling `encode`.
pub trait FrameEncoder: Send + Sync {
    /// File extensions this format writes, lowercase, no dot.
    fn extensions(&self) -> &[&'static str];

    fn expected_layout(&self) -> PixelLayout;

    fn expected_depth(&self) -> BitDepth;

    /// Premultiplication state the format stores.
    fn expected_premult(&self) -> PremultState;

    /// Encode `src` to `path`. `src` matches the declared layout,
    /// depth and premultiplication.
    fn encode(&self, path: &Path, frame: i32, src: &PixelBuffer) -> Result<(), CodecError>;
}

/// Encode orchestrator for one effect instance.
pub struct Writer {
    encoder: Box<dyn FrameEncoder>,
    transform: Box<dyn ColorTransform>,
    params: RwLock<WriterParams>,
    pattern: RwLock<Option<SequencePattern>>,
}

impl Writer {
    pub fn new(encoder: Box<dyn FrameEncoder>, transform: Box<dyn ColorTransform>) -> Self {
        Self {
            encoder,
            transform,
            params: RwLock::new(WriterParams::default()),
            pattern: RwLock::new(None),
        }
    }

    pub fn params(&self) -> WriterParams {
        self.params.read().map(|p| p.clone()).unwrap_or_default()
    }

    /// Apply a new parameter block (control thread). The filename is
    /// validated against the encoder's extensions before it sticks.
    pub fn set_params(&self, new: WriterParams) -> Result<(), WriteError> {
        let pattern = if new.filename.is_empty() {
            None
        } else {
            self.validate_extension(&new.filename)?;
            Some(SequencePattern::parse(&new.filename).map_err(|_| WriteError::NoOutput)?)
        };
        if let Ok(mut guard) = self.params.write() {
            *guard = new;
        }
        if let Ok(mut guard) = self.pattern.write() {
            *guard = pattern;
        }
        Ok(())
    }

    /// Check `filename`'s extension against the encoder's list.
    pub fn validate_extension(&self, filename: &str) -> Result<(), WriteError> {
        let ext = Path::new(filename)
            .extension()
            .and_then(|s| s.to_str())
            .map(|s| s.to_lowercase())
            .unwrap_or_default();
        if self.encoder.extensions().contains(&ext.as_str()) {
            Ok(())
        } else {
            Err(WriteError::UnsupportedExtension(ext))
        }
    }

    /// Render one frame: copy `src` into `pass_through` first, then
    /// convert a temp to the encoder's declared shape and encode it.
    pub fn render(
        &self,
        time: f64,
        src: &PixelBuffer,
        pass_through: &mut PixelBuffer,
    ) -> Result<(), WriteError> {
        let region = src.bounds().intersect(&pass_through.bounds());
        convert::convert(src, pass_through, &region)?;
        self.encode(time, src)
    }

    /// Encode `src` at `time` without a pass-through destination.
    pub fn encode(&self, time: f64, src: &PixelBuffer) -> Result<(), WriteError> {
        let frame = round_frame(time);
        let params = self.params();
        if frame < params.first_frame || frame > params.last_frame {
            debug!("frame {} outside render job [{}, {}], skipped",
                frame, params.first_frame, params.last_frame);
            return Ok(());
        }
        let path = match self.pattern.read() {
            Ok(guard) => match guard.as_ref() {
                Some(p) => p.frame_path(frame),
                None => return Err(WriteError::NoOutput),
            },
            Err(_) => return Err(WriteError::NoOutput),
        };

        let shaped = self.shape_for_encoder(src, params.input_premult)?;
        self.encoder.encode(&path, frame, &shaped).map_err(|e| WriteError::Encode {
            filename: path.to_string_lossy().to_string(),
            message: e.to_string(),
        })?;
        info!("wrote frame {} to {}", frame, path.display());
        Ok(())
    }

    /// Reshape `src` into the encoder's declared layout, depth and
    /// premultiplication, with the color transform applied on straight
    /// alpha.
    fn shape_for_encoder(
        &self,
        src: &PixelBuffer,
        input_premult: PremultState,
    ) -> Result<PixelBuffer, WriteError> {
        let bounds = src.bounds();
        let mut working =
            PixelBuffer::new(bounds, src.layout(), BitDepth::F32, input_premult);
        convert::convert(src, &mut working, &bounds)?;

        let premultiplied = input_premult == PremultState::Premultiplied
            && working.layout().alpha_channel().is_some();
        if premultiplied {
            convert::unpremultiply(&mut working, &bounds)?;
        }
        self.transform.apply(&mut working, &bounds);
        if self.encoder.expected_premult() == PremultState::Premultiplied
            && working.layout().alpha_channel().is_some()
        {
            convert::premultiply(&mut working, &bounds)?;
        }

        let mut shaped = PixelBuffer::new(
            bounds,
            self.encoder.expected_layout(),
            self.encoder.expected_depth(),
            self.encoder.expected_premult(),
        );
        convert::convert(&working, &mut shaped, &bounds)?;
        Ok(shaped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::RectI;
    use crate::reader::IdentityTransform;
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex};

    type CallLog = Arc<Mutex<Vec<(PathBuf, i32, PixelLayout, BitDepth)>>>;

    /// Records what it is asked to encode instead of touching disk.
    struct RecordingEncoder {
        fail: bool,
        calls: CallLog,
    }

    impl RecordingEncoder {
        fn new(fail: bool) -> (Self, CallLog) {
            let calls = CallLog::default();
            (Self { fail, calls: calls.clone() }, calls)
        }
    }

    impl FrameEncoder for RecordingEncoder {
        fn extensions(&self) -> &[&'static str] {
            &["png"]
        }

        fn expected_layout(&self) -> PixelLayout {
            PixelLayout::Rgba
        }

        fn expected_depth(&self) -> BitDepth {
            BitDepth::U8
        }

        fn expected_premult(&self) -> PremultState {
            PremultState::Unpremultiplied
        }

        fn encode(&self, path: &Path, frame: i32, src: &PixelBuffer) -> Result<(), CodecError> {
            if self.fail {
                return Err(CodecError::new("disk full"));
            }
            self.calls.lock().unwrap().push((
                path.to_path_buf(),
                frame,
                src.layout(),
                src.depth(),
            ));
            Ok(())
        }
    }

    fn writer(fail: bool) -> (Writer, CallLog) {
        let (encoder, calls) = RecordingEncoder::new(fail);
        let w = Writer::new(Box::new(encoder), Box::new(IdentityTransform));
        w.set_params(WriterParams {
            filename: "/out/comp.%04d.png".into(),
            first_frame: 1,
            last_frame: 10,
            input_premult: PremultState::Unpremultiplied,
        })
        .unwrap();
        (w, calls)
    }

    fn rgba_f32(bounds: RectI) -> PixelBuffer {
        PixelBuffer::new(bounds, PixelLayout::Rgba, BitDepth::F32, PremultState::Unpremultiplied)
    }

    #[test]
    fn test_extension_validation() {
        let (encoder, _) = RecordingEncoder::new(false);
        let w = Writer::new(Box::new(encoder), Box::new(IdentityTransform));
        assert!(w.validate_extension("out.0001.png").is_ok());
        assert!(matches!(
            w.validate_extension("out.0001.tiff"),
            Err(WriteError::UnsupportedExtension(e)) if e == "tiff"
        ));
        assert!(matches!(
            w.set_params(WriterParams { filename: "out.%04d.jpg".into(), ..Default::default() }),
            Err(WriteError::UnsupportedExtension(_))
        ));
    }

    /// The encoder receives the declared shape at the path for the
    /// rounded frame number.
    #[test]
    fn test_encode_shapes_input() {
        let (w, calls) = writer(false);
        let bounds = RectI::from_extent(2, 2);
        let mut src = rgba_f32(bounds);
        src.set_sample(0, 0, 0, 0.5);
        src.set_sample(0, 0, 3, 1.0);
        w.encode(3.4, &src).unwrap();

        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        let (path, frame, layout, depth) = &calls[0];
        assert_eq!(path, &PathBuf::from("/out/comp.0003.png"));
        assert_eq!(*frame, 3);
        assert_eq!(*layout, PixelLayout::Rgba);
        assert_eq!(*depth, BitDepth::U8);
    }

    /// Pass-through is written before encoding, so an encode failure
    /// leaves it intact.
    #[test]
    fn test_pass_through_survives_encode_failure() {
        let (w, _) = writer(true);
        let bounds = RectI::from_extent(2, 2);
        let mut src = rgba_f32(bounds);
        src.set_sample(1, 1, 1, 0.25);
        let mut pass = rgba_f32(bounds);
        let err = w.render(2.0, &src, &mut pass);
        assert!(matches!(err, Err(WriteError::Encode { .. })));
        assert!((pass.sample(1, 1, 1) - 0.25).abs() < 1e-6);
    }

    /// Frames outside the job range are skipped, not errors.
    #[test]
    fn test_out_of_job_range_skipped() {
        let (w, calls) = writer(false);
        let src = rgba_f32(RectI::from_extent(2, 2));
        w.encode(99.0, &src).unwrap();
        assert!(calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_no_output_configured() {
        let (encoder, _) = RecordingEncoder::new(false);
        let w = Writer::new(Box::new(encoder), Box::new(IdentityTransform));
        let src = rgba_f32(RectI::from_extent(2, 2));
        assert!(matches!(w.encode(1.0, &src), Err(WriteError::NoOutput)));
    }
}
