//! Decode orchestration
//!
//! **Why**: Every input plugin repeats the same render skeleton: map
//! the requested time to a file, decode a window, fix premultiplication,
//! run the color transform, reduce to the requested proxy level and
//! reshape into the host's buffer. `Reader` owns that skeleton; format
//! plugins supply only a [`FrameDecoder`].
//!
//! **Used by**: Format plugins (EXR, PNG, ...) via `Reader::new` with
//! their decoder.
//!
//! # Render flow
//!
//! 1. resolve the effect time against the cached frame range
//! 2. black result: zero-fill the region, no decode
//! 3. locate the frame file (missing-frame policy may substitute)
//! 4. decode the window intersected with the file's declared bounds,
//!    black outside
//! 5. unpremultiply if needed, color transform, re-premultiply
//! 6. box-downsample when the decoded level is finer than requested
//! 7. convert into the destination layout/depth/premult
//!
//! Concurrent render calls are safe; parameter changes arrive on the
//! host's control thread and run through an ordered handler list.

use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};

use log::{debug, info, warn};

use crate::buffer::{BitDepth, PixelBuffer, PixelLayout, PremultState};
use crate::convert;
use crate::error::{CodecError, RenderError, ResolveError};
use crate::geom::{self, RectI};
use crate::params::ReaderParams;
use crate::range_cache::FrameRangeCache;
use crate::resolve::{FrameRange, Resolved};
use crate::scale::{self, ProxyScale};
use crate::sequence::{Located, SequencePattern};

/// Per-file properties a decoder reports before (or while) decoding.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameHeader {
    /// Declared pixel bounds at the file's own resolution.
    pub bounds: RectI,
    pub layout: PixelLayout,
    pub depth: BitDepth,
    pub premult: PremultState,
}

/// Format-specific decode callback. One implementation per file
/// format; instances are shared across concurrent render calls.
pub trait FrameDecoder: Send + Sync {
    /// File properties. When [`header_only_bounds`](Self::header_only_bounds)
    /// is true this must not decode pixel data.
    fn read_header(&self, path: &Path) -> Result<FrameHeader, CodecError>;

    /// Whether `read_header` works from the file header alone. False
    /// means a bounds query costs a full decode.
    fn header_only_bounds(&self) -> bool {
        true
    }

    /// Decode `region` of `frame` into `dst`. `region` is in the
    /// file's own pixel space and is always inside the declared
    /// bounds; `dst` covers exactly `region` in the file's layout.
    fn decode(
        &self,
        path: &Path,
        frame: i32,
        region: &RectI,
        dst: &mut PixelBuffer,
    ) -> Result<(), CodecError>;

    /// Container formats resolve times inside one file; their frame
    /// range comes from the stream, not from sibling files.
    fn is_stream(&self) -> bool {
        false
    }

    /// Frame range of a container stream. Only called when
    /// [`is_stream`](Self::is_stream) is true.
    fn stream_frame_range(&self, _path: &Path) -> Result<FrameRange, CodecError> {
        Err(CodecError::new("not a container format"))
    }
}

/// Opaque color-space transform applied between decode and delivery.
/// Owned by the reader for its whole lifetime.
pub trait ColorTransform: Send + Sync {
    /// Transform `region` of `buf` in place. `buf` is unpremultiplied
    /// F32 in the file's layout.
    fn apply(&self, buf: &mut PixelBuffer, region: &RectI);
}

/// Transform that leaves pixels untouched.
pub struct IdentityTransform;

impl ColorTransform for IdentityTransform {
    fn apply(&self, _buf: &mut PixelBuffer, _region: &RectI) {}
}

/// One render request from the host.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderRequest {
    pub time: f64,
    /// Region of interest, in pixels at the requested scale.
    pub region: RectI,
    /// Requested proxy scale; 1.0 is full resolution.
    pub render_scale: f64,
}

/// Which parameter a control-thread edit touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamChange {
    Filename,
    ProxyFilename,
    ProxyThreshold,
    FirstFrame,
    LastFrame,
    FrameMode,
    Boundaries,
    MissingFrame,
    OutputLayout,
    SourcePremult,
}

struct SequenceState {
    pattern: Option<SequencePattern>,
    proxy_pattern: Option<SequencePattern>,
    proxy_scale: ProxyScale,
}

/// Decode orchestrator for one effect instance.
pub struct Reader {
    decoder: Box<dyn FrameDecoder>,
    transform: Box<dyn ColorTransform>,
    params: RwLock<ReaderParams>,
    state: RwLock<SequenceState>,
    range_cache: FrameRangeCache,
    time_domain_edited: AtomicBool,
}

type Handler = fn(&Reader, &[ParamChange]) -> Result<(), RenderError>;

/// Parameter-change handlers, run in this order for every edit batch.
/// Order matters: the filename handler rebuilds the pattern the proxy
/// handler measures against.
const PARAM_HANDLERS: &[(&str, Handler)] = &[
    ("filename", Reader::on_filename_changed),
    ("proxy", Reader::on_proxy_changed),
    ("time-domain", Reader::on_time_domain_edited),
];

impl Reader {
    pub fn new(decoder: Box<dyn FrameDecoder>, transform: Box<dyn ColorTransform>) -> Self {
        Self {
            decoder,
            transform,
            params: RwLock::new(ReaderParams::default()),
            state: RwLock::new(SequenceState {
                pattern: None,
                proxy_pattern: None,
                proxy_scale: ProxyScale::IDENTITY,
            }),
            range_cache: FrameRangeCache::new(),
            time_domain_edited: AtomicBool::new(false),
        }
    }

    pub fn params(&self) -> ReaderParams {
        self.params.read().map(|p| p.clone()).unwrap_or_default()
    }

    /// Apply a new parameter block (control thread). Changed fields
    /// are diffed against the current block and the change handlers
    /// run in their declared order.
    pub fn set_params(&self, new: ReaderParams) -> Result<(), RenderError> {
        let changes = {
            let mut guard = self
                .params
                .write()
                .map_err(|_| ResolveError::Discovery("parameter lock poisoned".into()))
                .map_err(RenderError::Resolve)?;
            let changes = diff_params(&guard, &new);
            *guard = new;
            changes
        };
        if changes.is_empty() {
            return Ok(());
        }
        debug!("parameter changes: {:?}", changes);
        for (name, handler) in PARAM_HANDLERS {
            if let Err(e) = handler(self, &changes) {
                warn!("{} change handler failed: {}", name, e);
                return Err(e);
            }
        }
        Ok(())
    }

    fn on_filename_changed(&self, changes: &[ParamChange]) -> Result<(), RenderError> {
        if !changes.contains(&ParamChange::Filename) {
            return Ok(());
        }
        let filename = self.params().filename;
        let pattern = if filename.is_empty() {
            None
        } else {
            Some(SequencePattern::parse(&filename).map_err(RenderError::Resolve)?)
        };
        if let Ok(mut state) = self.state.write() {
            state.pattern = pattern;
        }
        self.range_cache.invalidate();
        Ok(())
    }

    fn on_proxy_changed(&self, changes: &[ParamChange]) -> Result<(), RenderError> {
        if !changes.contains(&ParamChange::ProxyFilename)
            && !changes.contains(&ParamChange::Filename)
        {
            return Ok(());
        }
        let proxy_filename = self.params().proxy_filename;
        let proxy_pattern = if proxy_filename.is_empty() {
            None
        } else {
            Some(SequencePattern::parse(&proxy_filename).map_err(RenderError::Resolve)?)
        };
        let base_pattern = match self.state.read() {
            Ok(state) => state.pattern.clone(),
            Err(_) => None,
        };

        // Measure the proxy against the original. Header failures keep
        // the identity scale; the proxy simply goes unused.
        let mut detected = ProxyScale::IDENTITY;
        if let (Some(proxy), Some(pattern)) = (&proxy_pattern, &base_pattern) {
            match self.measure_proxy(pattern, proxy) {
                Ok(scale) => {
                    info!("proxy scale detected: ({:.4}, {:.4})", scale.x, scale.y);
                    detected = scale;
                }
                Err(e) => warn!("proxy scale detection failed: {}", e),
            }
        }
        if let Ok(mut state) = self.state.write() {
            state.proxy_pattern = proxy_pattern;
            state.proxy_scale = detected;
        }
        Ok(())
    }

    fn on_time_domain_edited(&self, changes: &[ParamChange]) -> Result<(), RenderError> {
        let edits = [ParamChange::FirstFrame, ParamChange::LastFrame, ParamChange::FrameMode];
        if changes.iter().any(|c| edits.contains(c)) {
            self.time_domain_edited.store(true, Ordering::Release);
        }
        Ok(())
    }

    /// Whether the user edited the range/mode parameters since the
    /// last filename change. Hosts use this to avoid clobbering user
    /// edits when refreshing defaults.
    pub fn time_domain_edited(&self) -> bool {
        self.time_domain_edited.load(Ordering::Acquire)
    }

    fn measure_proxy(
        &self,
        original: &SequencePattern,
        proxy: &SequencePattern,
    ) -> Result<ProxyScale, RenderError> {
        let first = self.frame_range()?.first;
        let original_path = original.frame_path(first);
        let proxy_path = proxy.frame_path(first);
        let original_header = self.header(&original_path)?;
        let proxy_header = self.header(&proxy_path)?;
        Ok(scale::detect_scale(&original_header.bounds, &proxy_header.bounds))
    }

    fn header(&self, path: &Path) -> Result<FrameHeader, RenderError> {
        self.decoder.read_header(path).map_err(|e| RenderError::Decode {
            filename: path.to_string_lossy().to_string(),
            message: e.to_string(),
        })
    }

    /// Effective frame range: stream domain for container formats,
    /// sibling discovery otherwise, clipped by user overrides. Cached
    /// until a filename change invalidates it.
    pub fn frame_range(&self) -> Result<FrameRange, RenderError> {
        let discovered = self
            .range_cache
            .get_or_compute(|| self.discover_range())
            .map_err(RenderError::Resolve)?;
        let params = self.params();
        let first = params.first_frame.unwrap_or(discovered.first).max(discovered.first);
        let last = params.last_frame.unwrap_or(discovered.last).min(discovered.last);
        Ok(FrameRange::new(first, last))
    }

    fn discover_range(&self) -> Result<FrameRange, ResolveError> {
        let mut state = self
            .state
            .write()
            .map_err(|_| ResolveError::Discovery("sequence lock poisoned".into()))?;
        let pattern = state.pattern.as_mut().ok_or(ResolveError::NoInput)?;
        if self.decoder.is_stream() {
            let path = pattern.frame_path(0);
            return self
                .decoder
                .stream_frame_range(&path)
                .map_err(|e| ResolveError::Discovery(e.to_string()));
        }
        pattern.discover()
    }

    /// Time domain presented to the host, in effect time.
    pub fn time_domain(&self) -> Result<(f64, f64), RenderError> {
        let range = self.frame_range()?;
        let resolver = self.params().resolver();
        // Invert the file-time mapping at both endpoints.
        let at = |frame: i32| {
            let base = resolver.file_time(0.0, &range);
            frame as f64 - base
        };
        Ok((at(range.first), at(range.last)))
    }

    /// Full-resolution bounds of the frame at `time`. Costs a header
    /// read, or a full decode for formats whose headers do not carry
    /// bounds (see [`FrameDecoder::header_only_bounds`]).
    pub fn region_of_definition(&self, time: f64) -> Result<RectI, RenderError> {
        let range = self.frame_range()?;
        let resolver = self.params().resolver();
        let resolved = resolver.resolve(time, &range).map_err(RenderError::Resolve)?;
        let frame = match resolved.frame() {
            Some(f) => f,
            None => return Ok(RectI::new(0, 0, 0, 0)),
        };
        let pattern = self
            .state
            .read()
            .ok()
            .and_then(|s| s.pattern.clone())
            .ok_or(RenderError::Resolve(ResolveError::NoInput))?;
        let located = self.locate(&pattern, frame, &range)?;
        match located {
            Located::Black => Ok(RectI::new(0, 0, 0, 0)),
            Located::File { path, .. } => {
                if !self.decoder.header_only_bounds() {
                    debug!("bounds query requires a full decode: {}", path.display());
                }
                Ok(self.header(&path)?.bounds)
            }
        }
    }

    fn locate(
        &self,
        pattern: &SequencePattern,
        frame: i32,
        range: &FrameRange,
    ) -> Result<Located, RenderError> {
        if self.decoder.is_stream() {
            // Streams have no per-frame files to go missing.
            return Ok(Located::File { frame, path: pattern.frame_path(frame) });
        }
        let policy = self.params().missing_frame;
        pattern.locate(frame, policy, range).map_err(RenderError::Resolve)
    }

    /// Pick the source pattern and its decoded mip level for the
    /// requested scale.
    fn select_source(&self, render_scale: f64) -> Result<(SequencePattern, u32), RenderError> {
        let params = self.params();
        let state = self
            .state
            .read()
            .map_err(|_| RenderError::Resolve(ResolveError::Discovery("lock poisoned".into())))?;
        let pattern = state.pattern.as_ref().ok_or(RenderError::Resolve(ResolveError::NoInput))?;

        if let Some(proxy) = &state.proxy_pattern {
            let threshold = if params.custom_proxy_threshold {
                params.proxy_threshold.unwrap_or(state.proxy_scale)
            } else {
                state.proxy_scale
            };
            if render_scale <= threshold.x.min(threshold.y) + 1e-9 {
                let level = state.proxy_scale.mip_level();
                debug!("using proxy source at mip level {}", level);
                return Ok((proxy.clone(), level));
            }
        }
        Ok((pattern.clone(), 0))
    }

    /// Render `req` into `dst`. `dst` must cover `req.region`.
    pub fn render(&self, req: &RenderRequest, dst: &mut PixelBuffer) -> Result<(), RenderError> {
        if !dst.bounds().contains(&req.region) {
            return Err(RenderError::WindowOutOfBounds(req.region));
        }
        let range = self.frame_range()?;
        let resolver = self.params().resolver();
        let resolved = resolver.resolve(req.time, &range).map_err(RenderError::Resolve)?;
        let frame = match resolved {
            Resolved::Black => {
                dst.fill_black(&req.region);
                return Ok(());
            }
            Resolved::Within(f) | Resolved::Before(f) | Resolved::After(f) => f,
        };

        let (requested_level, exact) = geom::mip_level_for_scale(req.render_scale);
        if !exact {
            warn!(
                "render scale {:.4} is not a power of two; rendering mip level {}",
                req.render_scale, requested_level
            );
        }
        let (source, decoded_level) = self.select_source(req.render_scale)?;
        if requested_level < decoded_level {
            return Err(RenderError::ProxyUpscale {
                decoded_levels: decoded_level,
                requested_levels: requested_level,
            });
        }
        let downsample_levels = requested_level - decoded_level;

        let (path, source_frame) = match self.locate(&source, frame, &range)? {
            Located::Black => {
                dst.fill_black(&req.region);
                return Ok(());
            }
            Located::File { frame, path } => (path, frame),
        };
        self.render_file(&path, source_frame, req, downsample_levels, dst)
    }

    fn render_file(
        &self,
        path: &PathBuf,
        frame: i32,
        req: &RenderRequest,
        downsample_levels: u32,
        dst: &mut PixelBuffer,
    ) -> Result<(), RenderError> {
        let header = self.header(path)?;
        let params = self.params();

        // Decode window in the file's space, clipped to its bounds.
        let wanted = req.region.upscale_po2(downsample_levels);
        let window = wanted.intersect(&header.bounds);
        let covered = window.downscale_po2_enclosing(downsample_levels).intersect(&req.region);
        if covered != req.region {
            // Parts of the request fall outside the file.
            dst.fill_black(&req.region);
        }
        if window.is_empty() {
            return Ok(());
        }

        let source_premult = match params.source_premult {
            PremultState::Unknown => header.premult,
            declared => declared,
        };
        let mut decoded =
            PixelBuffer::new(window, header.layout, BitDepth::F32, source_premult);
        self.decoder.decode(path, frame, &window, &mut decoded).map_err(|e| {
            RenderError::Decode {
                filename: path.to_string_lossy().to_string(),
                message: e.to_string(),
            }
        })?;

        // Color management runs on straight alpha.
        let premultiplied = decoded.premult() == PremultState::Premultiplied
            && decoded.layout().alpha_channel().is_some();
        if premultiplied {
            convert::unpremultiply(&mut decoded, &window).map_err(RenderError::Convert)?;
        }
        self.transform.apply(&mut decoded, &window);
        if premultiplied {
            convert::premultiply(&mut decoded, &window).map_err(RenderError::Convert)?;
        }

        if downsample_levels == 0 {
            let region = window.intersect(&req.region);
            convert::convert(&decoded, dst, &region).map_err(RenderError::Convert)?;
        } else {
            let reduced_bounds = window.downscale_po2_enclosing(downsample_levels);
            let mut reduced = PixelBuffer::new(
                reduced_bounds,
                decoded.layout(),
                BitDepth::F32,
                decoded.premult(),
            );
            scale::downsample(&decoded, downsample_levels, &mut reduced)
                .map_err(RenderError::Convert)?;
            let region = reduced_bounds.intersect(&req.region);
            convert::convert(&reduced, dst, &region).map_err(RenderError::Convert)?;
        }
        Ok(())
    }
}

fn diff_params(old: &ReaderParams, new: &ReaderParams) -> Vec<ParamChange> {
    let mut changes = Vec::new();
    if old.filename != new.filename {
        changes.push(ParamChange::Filename);
    }
    if old.proxy_filename != new.proxy_filename {
        changes.push(ParamChange::ProxyFilename);
    }
    if old.proxy_threshold != new.proxy_threshold
        || old.custom_proxy_threshold != new.custom_proxy_threshold
    {
        changes.push(ParamChange::ProxyThreshold);
    }
    if old.first_frame != new.first_frame {
        changes.push(ParamChange::FirstFrame);
    }
    if old.last_frame != new.last_frame {
        changes.push(ParamChange::LastFrame);
    }
    if old.frame_mode != new.frame_mode {
        changes.push(ParamChange::FrameMode);
    }
    if old.before != new.before || old.after != new.after {
        changes.push(ParamChange::Boundaries);
    }
    if old.missing_frame != new.missing_frame {
        changes.push(ParamChange::MissingFrame);
    }
    if old.output_layout != new.output_layout {
        changes.push(ParamChange::OutputLayout);
    }
    if old.source_premult != new.source_premult {
        changes.push(ParamChange::SourcePremult);
    }
    changes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolve::{BoundaryPolicy, FrameMode};
    use std::fs;

    /// Synthetic decoder: every frame is a constant-gray WxH RGBA
    /// image whose value encodes the frame number.
    struct GrayDecoder {
        bounds: RectI,
    }

    impl FrameDecoder for GrayDecoder {
        fn read_header(&self, _path: &Path) -> Result<FrameHeader, CodecError> {
            Ok(FrameHeader {
                bounds: self.bounds,
                layout: PixelLayout::Rgba,
                depth: BitDepth::F32,
                premult: PremultState::Unpremultiplied,
            })
        }

        fn decode(
            &self,
            _path: &Path,
            frame: i32,
            region: &RectI,
            dst: &mut PixelBuffer,
        ) -> Result<(), CodecError> {
            let v = frame as f32 / 100.0;
            for y in region.y1..region.y2 {
                for x in region.x1..region.x2 {
                    for c in 0..3 {
                        dst.set_sample(x, y, c, v);
                    }
                    dst.set_sample(x, y, 3, 1.0);
                }
            }
            Ok(())
        }
    }

    fn temp_sequence(name: &str, frames: &[i32]) -> PathBuf {
        let _ = env_logger::builder().is_test(true).try_init();
        let dir =
            std::env::temp_dir().join(format!("seqpipe-rd-{}-{}", name, std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        for f in frames {
            fs::write(dir.join(format!("shot.{:04}.exr", f)), b"x").unwrap();
        }
        dir
    }

    fn reader_for(dir: &Path, extent: RectI) -> Reader {
        let reader = Reader::new(
            Box::new(GrayDecoder { bounds: extent }),
            Box::new(IdentityTransform),
        );
        let params = ReaderParams {
            filename: dir.join("shot.%04d.exr").to_string_lossy().to_string(),
            ..Default::default()
        };
        reader.set_params(params).unwrap();
        reader
    }

    fn full_res(time: f64, region: RectI) -> RenderRequest {
        RenderRequest { time, region, render_scale: 1.0 }
    }

    #[test]
    fn test_render_within_range() {
        let dir = temp_sequence("within", &[1, 2, 3]);
        let reader = reader_for(&dir, RectI::from_extent(4, 4));
        let region = RectI::from_extent(4, 4);
        let mut dst =
            PixelBuffer::new(region, PixelLayout::Rgba, BitDepth::F32, PremultState::Unknown);
        reader.render(&full_res(2.0, region), &mut dst).unwrap();
        assert!((dst.sample(0, 0, 0) - 0.02).abs() < 1e-6);
        fs::remove_dir_all(&dir).unwrap();
    }

    /// Concrete scenario: frames 1..10, time offset 5, after-range
    /// policy black. Rendering t = 20 produces black without decoding.
    #[test]
    fn test_offset_black_after_range() {
        let dir = temp_sequence("offblack", &(1..=10).collect::<Vec<_>>());
        let reader = reader_for(&dir, RectI::from_extent(2, 2));
        let mut params = reader.params();
        params.frame_mode = FrameMode::TimeOffset { offset: 5.0 };
        params.after = BoundaryPolicy::Black;
        reader.set_params(params).unwrap();

        let region = RectI::from_extent(2, 2);
        let mut dst =
            PixelBuffer::new(region, PixelLayout::Rgba, BitDepth::F32, PremultState::Unknown);
        // Seed non-zero so the black fill is observable.
        dst.set_sample(0, 0, 0, 0.9);
        reader.render(&full_res(20.0, region), &mut dst).unwrap();
        assert_eq!(dst.sample(0, 0, 0), 0.0);
        // In-range time still decodes: t = 12 -> frame 7.
        reader.render(&full_res(12.0, region), &mut dst).unwrap();
        assert!((dst.sample(0, 0, 0) - 0.07).abs() < 1e-6);
        fs::remove_dir_all(&dir).unwrap();
    }

    /// The area of the request outside the file's declared bounds is
    /// black; the inside decodes normally.
    #[test]
    fn test_render_pads_outside_bounds() {
        let dir = temp_sequence("pad", &[1]);
        let reader = reader_for(&dir, RectI::from_extent(2, 2));
        let region = RectI::from_extent(4, 4);
        let mut dst =
            PixelBuffer::new(region, PixelLayout::Rgba, BitDepth::F32, PremultState::Unknown);
        reader.render(&full_res(1.0, region), &mut dst).unwrap();
        assert!((dst.sample(0, 0, 0) - 0.01).abs() < 1e-6);
        assert_eq!(dst.sample(3, 3, 0), 0.0);
        assert_eq!(dst.sample(3, 3, 3), 0.0);
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_render_window_must_fit_destination() {
        let dir = temp_sequence("fit", &[1]);
        let reader = reader_for(&dir, RectI::from_extent(4, 4));
        let mut dst = PixelBuffer::new(
            RectI::from_extent(2, 2),
            PixelLayout::Rgba,
            BitDepth::F32,
            PremultState::Unknown,
        );
        let req = full_res(1.0, RectI::from_extent(4, 4));
        assert!(matches!(reader.render(&req, &mut dst), Err(RenderError::WindowOutOfBounds(_))));
        fs::remove_dir_all(&dir).unwrap();
    }

    /// Concrete scenario: only a half-resolution proxy is decoded; a
    /// full-resolution request must fail rather than upscale.
    #[test]
    fn test_proxy_cannot_upscale() {
        let dir = temp_sequence("proxy", &[1]);
        let proxy_dir = temp_sequence("proxy-half", &[1]);
        let reader = Reader::new(
            Box::new(GrayDecoder { bounds: RectI::from_extent(1920, 1080) }),
            Box::new(IdentityTransform),
        );
        let params = ReaderParams {
            filename: dir.join("shot.%04d.exr").to_string_lossy().to_string(),
            proxy_filename: proxy_dir.join("shot.%04d.exr").to_string_lossy().to_string(),
            proxy_threshold: Some(ProxyScale { x: 1.0, y: 1.0 }),
            custom_proxy_threshold: true,
            ..Default::default()
        };
        reader.set_params(params).unwrap();
        // Force the detected scale to half resolution.
        reader.state.write().unwrap().proxy_scale = ProxyScale { x: 0.5, y: 0.5 };

        let region = RectI::from_extent(8, 8);
        let mut dst =
            PixelBuffer::new(region, PixelLayout::Rgba, BitDepth::F32, PremultState::Unknown);
        let err = reader.render(&full_res(1.0, region), &mut dst);
        assert!(matches!(
            err,
            Err(RenderError::ProxyUpscale { decoded_levels: 1, requested_levels: 0 })
        ));
        // A half-resolution request is served from the proxy.
        let req = RenderRequest { time: 1.0, region, render_scale: 0.5 };
        reader.render(&req, &mut dst).unwrap();
        fs::remove_dir_all(&dir).unwrap();
        fs::remove_dir_all(&proxy_dir).unwrap();
    }

    #[test]
    fn test_time_domain_follows_offset() {
        let dir = temp_sequence("domain", &[1, 2, 3, 4, 5]);
        let reader = reader_for(&dir, RectI::from_extent(2, 2));
        let mut params = reader.params();
        params.frame_mode = FrameMode::TimeOffset { offset: 10.0 };
        reader.set_params(params).unwrap();
        assert_eq!(reader.time_domain().unwrap(), (11.0, 15.0));
        fs::remove_dir_all(&dir).unwrap();
    }

    /// Range/mode edits set the user-edited flag; filename edits alone
    /// do not.
    #[test]
    fn test_time_domain_edit_flag() {
        let dir = temp_sequence("editflag", &[1, 2]);
        let reader = reader_for(&dir, RectI::from_extent(2, 2));
        assert!(!reader.time_domain_edited());
        let mut params = reader.params();
        params.first_frame = Some(2);
        reader.set_params(params).unwrap();
        assert!(reader.time_domain_edited());
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_region_of_definition() {
        let dir = temp_sequence("rod", &[1]);
        let extent = RectI::from_extent(640, 480);
        let reader = reader_for(&dir, extent);
        assert_eq!(reader.region_of_definition(1.0).unwrap(), extent);
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_no_input_fails() {
        let reader = Reader::new(
            Box::new(GrayDecoder { bounds: RectI::from_extent(2, 2) }),
            Box::new(IdentityTransform),
        );
        assert!(matches!(
            reader.frame_range(),
            Err(RenderError::Resolve(ResolveError::NoInput))
        ));
    }
}
