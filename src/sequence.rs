//! Sequence filename patterns and sibling discovery
//!
//! **Why**: Plugins receive a single filename (render.0001.exr,
//! render.%04d.exr or render.*.exr) and must map frame numbers to
//! paths, discover the on-disk range from sibling files, and decide
//! what to do when a frame in the middle of the range is missing.
//!
//! **Used by**: Reader (range discovery via the cache, per-frame path
//! lookup at render time).
//!
//! # Pattern Forms
//!
//! - printf-style: `frame.%04d.exr` (explicit padding)
//! - glob-style: `frame.*.exr` (padding detected from siblings)
//! - concrete file: `frame.0001.exr` (last digit group becomes the
//!   frame number; padding is its width)
//! - no digits: a static single image, range [0, 0]

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use log::{debug, info};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ResolveError;
use crate::resolve::FrameRange;

/// How far `locate` searches for a substitute when a frame file is
/// missing inside the range.
pub const MISSING_FRAME_SEARCH_RADIUS: i32 = 100;

/// What to substitute for a frame whose file does not exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MissingFramePolicy {
    /// Fail the render call.
    Error,
    /// Render black.
    Black,
    /// Nearest existing frame on either side, earlier wins a tie.
    HoldNearest,
    /// Nearest existing earlier frame only.
    HoldPrevious,
    /// Nearest existing later frame only.
    LoadNext,
}

/// Outcome of locating a frame file on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Located {
    /// The file to decode and the frame it belongs to (differs from
    /// the requested frame when a hold policy substituted a neighbor).
    File { frame: i32, path: PathBuf },
    /// Render black in place of the missing frame.
    Black,
}

/// A parsed filename pattern mapping frame numbers to paths.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequencePattern {
    /// Normalized pattern with a single `*` standing for the frame
    /// number, or a literal path for static images.
    pattern: String,
    padding: usize,
    is_sequence: bool,
}

impl SequencePattern {
    /// Parse a filename into a pattern. Pure; no filesystem access.
    pub fn parse(filename: &str) -> Result<Self, ResolveError> {
        if filename.is_empty() {
            return Err(ResolveError::NoInput);
        }
        let printf = Regex::new(r"%0?(\d*)d")
            .map_err(|e| ResolveError::Discovery(format!("regex error: {e}")))?;

        if let Some(caps) = printf.captures(filename) {
            let padding = caps
                .get(1)
                .map(|m| m.as_str().parse::<usize>().unwrap_or(1))
                .unwrap_or(1)
                .max(1);
            let pattern = printf.replace(filename, "*").to_string();
            return Ok(Self { pattern, padding, is_sequence: true });
        }
        if filename.contains('*') {
            // Padding unknown until discovery sees a sibling.
            return Ok(Self { pattern: filename.to_string(), padding: 1, is_sequence: true });
        }

        // Concrete file: the last digit group in the stem is the frame.
        let path = Path::new(filename);
        let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("");
        let digits = Regex::new(r"\d+")
            .map_err(|e| ResolveError::Discovery(format!("regex error: {e}")))?;
        if let Some(m) = digits.find_iter(stem).last() {
            let padding = m.as_str().len();
            let wild_stem = format!("{}*{}", &stem[..m.start()], &stem[m.end()..]);
            let mut name = wild_stem;
            if let Some(ext) = path.extension().and_then(|s| s.to_str()) {
                name = format!("{name}.{ext}");
            }
            let pattern = match path.parent() {
                Some(dir) if !dir.as_os_str().is_empty() => {
                    dir.join(name).to_string_lossy().to_string()
                }
                _ => name,
            };
            Ok(Self { pattern, padding, is_sequence: true })
        } else {
            Ok(Self { pattern: filename.to_string(), padding: 0, is_sequence: false })
        }
    }

    pub fn is_sequence(&self) -> bool {
        self.is_sequence
    }

    pub fn padding(&self) -> usize {
        self.padding
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Path for `frame`. Static images return their literal path for
    /// any frame.
    pub fn frame_path(&self, frame: i32) -> PathBuf {
        if !self.is_sequence {
            return PathBuf::from(&self.pattern);
        }
        let number = if frame < 0 {
            format!("-{:0width$}", -(frame as i64), width = self.padding)
        } else {
            format!("{:0width$}", frame, width = self.padding)
        };
        PathBuf::from(self.pattern.replacen('*', &number, 1))
    }

    /// Scan siblings matching the pattern, adopt their padding, and
    /// return the discovered range. Static images are [0, 0].
    pub fn discover(&mut self) -> Result<FrameRange, ResolveError> {
        if !self.is_sequence {
            return Ok(FrameRange::new(0, 0));
        }
        let frames = self.scan_siblings()?;
        let (first, last) = match (frames.keys().next(), frames.keys().next_back()) {
            (Some(first), Some(last)) => (*first, *last),
            _ => {
                return Err(ResolveError::Discovery(format!(
                    "no files match pattern: {}",
                    self.pattern
                )));
            }
        };
        info!(
            "discovered {} file(s) for {}: range [{}, {}], padding {}",
            frames.len(),
            self.pattern,
            first,
            last,
            self.padding
        );
        Ok(FrameRange::new(first, last))
    }

    /// Find the file to decode for `frame`, applying `policy` when it
    /// is missing. The search stays inside `range` and within
    /// [`MISSING_FRAME_SEARCH_RADIUS`] frames of the request.
    pub fn locate(
        &self,
        frame: i32,
        policy: MissingFramePolicy,
        range: &FrameRange,
    ) -> Result<Located, ResolveError> {
        let path = self.frame_path(frame);
        if path.exists() {
            return Ok(Located::File { frame, path });
        }
        debug!("frame {} missing on disk ({})", frame, path.display());

        let (search_prev, search_next) = match policy {
            MissingFramePolicy::Error => return Err(ResolveError::MissingFrame { frame }),
            MissingFramePolicy::Black => return Ok(Located::Black),
            MissingFramePolicy::HoldNearest => (true, true),
            MissingFramePolicy::HoldPrevious => (true, false),
            MissingFramePolicy::LoadNext => (false, true),
        };
        for offset in 1..=MISSING_FRAME_SEARCH_RADIUS {
            if search_prev {
                let f = frame - offset;
                if range.contains(f) {
                    let path = self.frame_path(f);
                    if path.exists() {
                        return Ok(Located::File { frame: f, path });
                    }
                }
            }
            if search_next {
                let f = frame + offset;
                if range.contains(f) {
                    let path = self.frame_path(f);
                    if path.exists() {
                        return Ok(Located::File { frame: f, path });
                    }
                }
            }
        }
        Err(ResolveError::MissingFrame { frame })
    }

    /// Glob siblings and index them by frame number (last digit group
    /// of the stem). Also detects padding from the first match.
    fn scan_siblings(&mut self) -> Result<BTreeMap<i32, PathBuf>, ResolveError> {
        let paths = glob::glob(&self.pattern)
            .map_err(|e| ResolveError::Discovery(format!("glob error: {e}")))?;
        let digits = Regex::new(r"\d+")
            .map_err(|e| ResolveError::Discovery(format!("regex error: {e}")))?;

        let mut frames = BTreeMap::new();
        for path in paths.filter_map(Result::ok) {
            let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("");
            if let Some(m) = digits.find_iter(stem).last() {
                if let Ok(num) = m.as_str().parse::<i32>() {
                    if !frames.contains_key(&num) {
                        self.padding = m.as_str().len();
                    }
                    frames.insert(num, path);
                }
            }
        }
        Ok(frames)
    }
}
