//! Memoized frame-range snapshot
//!
//! **Why**: Discovering a sequence's [first, last] range means touching
//! the filesystem (or a stream header); render calls need it on every
//! invocation. The range is computed once, published as an `Arc`
//! snapshot, and recomputed only after an explicit invalidation.
//!
//! A generation counter marks staleness instead of clearing the slot,
//! so a failed recompute leaves the previous snapshot readable and
//! concurrent readers always observe a complete old or complete new
//! pair, never a torn one.
//!
//! **Used by**: Reader (time domain queries, render resolution).

use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use log::debug;

use crate::error::ResolveError;
use crate::resolve::FrameRange;

struct Slot {
    range: Arc<FrameRange>,
    generation: u64,
}

pub struct FrameRangeCache {
    slot: RwLock<Option<Slot>>,
    generation: AtomicU64,
}

impl Default for FrameRangeCache {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameRangeCache {
    pub fn new() -> Self {
        Self { slot: RwLock::new(None), generation: AtomicU64::new(0) }
    }

    /// Last published snapshot, current or stale. None before the
    /// first successful compute.
    pub fn get(&self) -> Option<Arc<FrameRange>> {
        self.slot.read().ok()?.as_ref().map(|s| s.range.clone())
    }

    /// Current snapshot, computing it via `compute` when none is
    /// published for the current generation. A failing `compute`
    /// surfaces its error and keeps the previous snapshot intact.
    pub fn get_or_compute<F>(&self, compute: F) -> Result<Arc<FrameRange>, ResolveError>
    where
        F: FnOnce() -> Result<FrameRange, ResolveError>,
    {
        let wanted = self.generation.load(Ordering::Acquire);
        if let Ok(guard) = self.slot.read() {
            if let Some(slot) = guard.as_ref() {
                if slot.generation == wanted {
                    return Ok(slot.range.clone());
                }
            }
        }

        let range = compute()?;
        debug!("frame range recomputed: [{}, {}] (gen {})", range.first, range.last, wanted);
        let published = Arc::new(range);
        if let Ok(mut guard) = self.slot.write() {
            // A racing recompute for the same generation may have won;
            // either result is valid for that generation.
            *guard = Some(Slot { range: published.clone(), generation: wanted });
        }
        Ok(published)
    }

    /// Mark the snapshot stale; the next `get_or_compute` recomputes.
    pub fn invalidate(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::thread;

    #[test]
    fn test_memoizes_until_invalidated() {
        let cache = FrameRangeCache::new();
        let calls = AtomicUsize::new(0);
        let compute = || {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(FrameRange::new(1, 10))
        };
        assert_eq!(*cache.get_or_compute(compute).unwrap(), FrameRange::new(1, 10));
        assert_eq!(*cache.get_or_compute(compute).unwrap(), FrameRange::new(1, 10));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        cache.invalidate();
        let _ = cache.get_or_compute(|| Ok(FrameRange::new(1, 20))).unwrap();
        assert_eq!(*cache.get().unwrap(), FrameRange::new(1, 20));
    }

    /// A failed recompute must not poison the cache: the previous
    /// snapshot stays readable and a later recompute succeeds.
    #[test]
    fn test_failed_recompute_keeps_previous() {
        let cache = FrameRangeCache::new();
        let _ = cache.get_or_compute(|| Ok(FrameRange::new(5, 15))).unwrap();
        cache.invalidate();

        let err = cache.get_or_compute(|| Err(ResolveError::Discovery("no files".into())));
        assert!(err.is_err());
        assert_eq!(*cache.get().unwrap(), FrameRange::new(5, 15));

        let r = cache.get_or_compute(|| Ok(FrameRange::new(5, 30))).unwrap();
        assert_eq!(*r, FrameRange::new(5, 30));
    }

    /// Concrete scenario: invalidation during concurrent reads. Every
    /// reader sees either the full old pair or the full new pair.
    #[test]
    fn test_concurrent_readers_see_whole_pairs() {
        let cache = Arc::new(FrameRangeCache::new());
        let _ = cache.get_or_compute(|| Ok(FrameRange::new(1, 100))).unwrap();

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let cache = cache.clone();
                thread::spawn(move || {
                    for _ in 0..1000 {
                        let r = cache.get_or_compute(|| Ok(FrameRange::new(200, 300))).unwrap();
                        assert!(
                            *r == FrameRange::new(1, 100) || *r == FrameRange::new(200, 300),
                            "torn range observed: {:?}",
                            r
                        );
                    }
                })
            })
            .collect();

        cache.invalidate();
        for h in readers {
            h.join().unwrap();
        }
        let r = cache.get_or_compute(|| Ok(FrameRange::new(200, 300))).unwrap();
        assert_eq!(*r, FrameRange::new(200, 300));
    }
}
