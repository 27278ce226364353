//! Effect-time to file-time resolution
//!
//! **Why**: The host asks for an arbitrary time T; the sequence on disk
//! covers a frame range [first, last] and may be shifted by a time
//! offset or pinned to an absolute starting time. Resolution maps T to
//! a concrete frame number, applying a boundary policy on each side
//! when T falls outside the range.
//!
//! **Used by**: Reader (every render and region-of-definition call).

use serde::{Deserialize, Serialize};

use crate::error::ResolveError;

/// Inclusive frame range of a sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameRange {
    pub first: i32,
    pub last: i32,
}

impl FrameRange {
    pub fn new(first: i32, last: i32) -> Self {
        Self { first, last: last.max(first) }
    }

    pub fn len(&self) -> i64 {
        (self.last as i64 - self.first as i64) + 1
    }

    pub fn contains(&self, frame: i32) -> bool {
        frame >= self.first && frame <= self.last
    }
}

/// How effect time maps to file time before boundary handling.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum FrameMode {
    /// file_time = effect_time - offset.
    TimeOffset { offset: f64 },
    /// file_time = effect_time - starting_time + first_frame. The
    /// sequence plays from `starting_time` regardless of its on-disk
    /// numbering.
    StartingTime { starting_time: f64 },
}

/// What to substitute when the resolved frame is strictly outside the
/// range. Applied independently per side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BoundaryPolicy {
    /// Clamp to the nearest in-range frame.
    Hold,
    /// Wrap around the range.
    Loop,
    /// Reflect back and forth across the range.
    Bounce,
    /// Render black, no decode.
    Black,
    /// Fail the render call.
    Error,
}

/// Outcome of resolution. `Before`/`After` carry the substituted frame
/// so callers can log which side of the range was hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolved {
    Within(i32),
    Before(i32),
    After(i32),
    Black,
}

impl Resolved {
    /// The frame to decode, if any.
    pub fn frame(&self) -> Option<i32> {
        match self {
            Resolved::Within(f) | Resolved::Before(f) | Resolved::After(f) => Some(*f),
            Resolved::Black => None,
        }
    }
}

/// Round a fractional file time to a frame number: nearest integer,
/// ties toward negative infinity (2.5 resolves to 2).
#[inline]
pub fn round_frame(t: f64) -> i32 {
    (t - 0.5).ceil() as i32
}

/// Time resolver for one sequence instance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeResolver {
    pub mode: FrameMode,
    pub before: BoundaryPolicy,
    pub after: BoundaryPolicy,
}

impl Default for TimeResolver {
    fn default() -> Self {
        Self {
            mode: FrameMode::TimeOffset { offset: 0.0 },
            before: BoundaryPolicy::Hold,
            after: BoundaryPolicy::Hold,
        }
    }
}

impl TimeResolver {
    /// Fractional file time for `effect_time` against `range`, before
    /// rounding or boundary handling.
    pub fn file_time(&self, effect_time: f64, range: &FrameRange) -> f64 {
        match self.mode {
            FrameMode::TimeOffset { offset } => effect_time - offset,
            FrameMode::StartingTime { starting_time } => {
                effect_time - starting_time + range.first as f64
            }
        }
    }

    /// Resolve `effect_time` to a decodable frame (or Black) under the
    /// configured boundary policies.
    pub fn resolve(&self, effect_time: f64, range: &FrameRange) -> Result<Resolved, ResolveError> {
        let t = self.file_time(effect_time, range);
        let frame = round_frame(t);
        if range.contains(frame) {
            return Ok(Resolved::Within(frame));
        }
        let policy = if frame < range.first { self.before } else { self.after };
        let mapped = match policy {
            BoundaryPolicy::Hold => frame.clamp(range.first, range.last),
            BoundaryPolicy::Loop => wrap_loop(frame, range),
            BoundaryPolicy::Bounce => wrap_bounce(frame, range),
            BoundaryPolicy::Black => return Ok(Resolved::Black),
            BoundaryPolicy::Error => {
                return Err(ResolveError::OutOfRange {
                    time: effect_time,
                    first: range.first,
                    last: range.last,
                });
            }
        };
        if frame < range.first {
            Ok(Resolved::Before(mapped))
        } else {
            Ok(Resolved::After(mapped))
        }
    }
}

fn wrap_loop(frame: i32, range: &FrameRange) -> i32 {
    let n = range.len();
    let rel = (frame as i64 - range.first as i64).rem_euclid(n);
    (range.first as i64 + rel) as i32
}

fn wrap_bounce(frame: i32, range: &FrameRange) -> i32 {
    let n = range.len();
    if n == 1 {
        return range.first;
    }
    // Reflection has period 2 * (n - 1); the second half mirrors back.
    let period = 2 * (n - 1);
    let rel = (frame as i64 - range.first as i64).rem_euclid(period);
    let rel = if rel >= n { period - rel } else { rel };
    (range.first as i64 + rel) as i32
}
