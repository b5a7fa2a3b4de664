//! Bounded cache for computed reference frames.
//!
//! Several joints measured against the same pose share the same
//! global/thorax frames; the cache avoids rebuilding them per joint.
//! Keys quantize landmark positions to two decimals so sub-jitter
//! variations of the same pose hit the same entry. Expiry compares
//! *frame timestamps*, not wall clock, so replaying a recorded video
//! is deterministic regardless of processing speed.

use std::num::NonZeroUsize;

use lru::LruCache;

use crate::frames::{FrameError, FrameType, ReferenceFrame};
use crate::math::Vec3;

/// Cache tuning.
#[derive(Debug, Clone, Copy)]
pub struct CacheConfig {
    pub enabled: bool,
    pub capacity: usize,
    /// Stream-time lifetime of an entry in seconds. The default covers
    /// one frame at 60 fps.
    pub ttl_s: f64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            enabled: true,
            capacity: 60,
            ttl_s: 0.016,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct FrameKey {
    frame_type: FrameType,
    positions: Vec<[i64; 3]>,
}

fn quantize(v: &Vec3) -> [i64; 3] {
    [
        (v.x * 100.0).round() as i64,
        (v.y * 100.0).round() as i64,
        (v.z * 100.0).round() as i64,
    ]
}

struct Entry {
    frame: ReferenceFrame,
    stored_at_s: f64,
}

/// LRU frame cache with stream-time TTL.
pub struct FrameCache {
    config: CacheConfig,
    entries: Option<LruCache<FrameKey, Entry>>,
    hits: u64,
    misses: u64,
}

impl std::fmt::Debug for FrameCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameCache")
            .field("config", &self.config)
            .field("len", &self.entries.as_ref().map_or(0, |e| e.len()))
            .field("hits", &self.hits)
            .field("misses", &self.misses)
            .finish()
    }
}

impl FrameCache {
    pub fn new(config: CacheConfig) -> Self {
        let entries = if config.enabled {
            NonZeroUsize::new(config.capacity).map(LruCache::new)
        } else {
            None
        };
        FrameCache {
            config,
            entries,
            hits: 0,
            misses: 0,
        }
    }

    /// Fetch the frame for `(frame_type, positions)` at stream time
    /// `t_s`, computing and storing it on miss or expiry.
    ///
    /// The cached and freshly computed paths return identical frames
    /// for identical input; the cache is purely a latency optimization.
    pub fn get_or_compute<F>(
        &mut self,
        frame_type: FrameType,
        positions: &[Vec3],
        t_s: f64,
        compute: F,
    ) -> Result<ReferenceFrame, FrameError>
    where
        F: FnOnce() -> Result<ReferenceFrame, FrameError>,
    {
        let Some(entries) = self.entries.as_mut() else {
            return compute();
        };

        let key = FrameKey {
            frame_type,
            positions: positions.iter().map(quantize).collect(),
        };

        if let Some(entry) = entries.get(&key) {
            if (t_s - entry.stored_at_s).abs() <= self.config.ttl_s {
                self.hits += 1;
                return Ok(entry.frame);
            }
        }

        self.misses += 1;
        let frame = compute()?;
        entries.put(
            key,
            Entry {
                frame,
                stored_at_s: t_s,
            },
        );
        Ok(frame)
    }

    pub fn clear(&mut self) {
        if let Some(entries) = self.entries.as_mut() {
            entries.clear();
        }
        self.hits = 0;
        self.misses = 0;
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }

    pub fn len(&self) -> usize {
        self.entries.as_ref().map_or(0, |e| e.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frames::global_frame;
    use crate::schema::mediapipe_33;
    use crate::test_utils::standing_frame;

    fn positions(frame: &crate::pose::PoseFrame) -> Vec<Vec3> {
        frame.landmarks.iter().map(|l| l.position).collect()
    }

    #[test]
    fn second_lookup_within_ttl_hits() {
        let mut cache = FrameCache::new(CacheConfig::default());
        let frame = standing_frame(0.0);
        let schema = mediapipe_33();
        let pos = positions(&frame);

        let a = cache
            .get_or_compute(FrameType::Global, &pos, 0.0, || {
                global_frame(&frame, &schema)
            })
            .unwrap();
        let b = cache
            .get_or_compute(FrameType::Global, &pos, 0.01, || {
                panic!("should not recompute within ttl")
            })
            .unwrap();
        assert_eq!(a, b);
        assert_eq!(cache.hits(), 1);
        assert_eq!(cache.misses(), 1);
    }

    #[test]
    fn expired_entry_recomputes() {
        let mut cache = FrameCache::new(CacheConfig::default());
        let frame = standing_frame(0.0);
        let schema = mediapipe_33();
        let pos = positions(&frame);

        cache
            .get_or_compute(FrameType::Global, &pos, 0.0, || {
                global_frame(&frame, &schema)
            })
            .unwrap();
        cache
            .get_or_compute(FrameType::Global, &pos, 1.0, || {
                global_frame(&frame, &schema)
            })
            .unwrap();
        assert_eq!(cache.misses(), 2);
    }

    #[test]
    fn sub_quantum_jitter_shares_an_entry() {
        let mut cache = FrameCache::new(CacheConfig::default());
        let frame = standing_frame(0.0);
        let schema = mediapipe_33();
        let mut jittered = positions(&frame);
        cache
            .get_or_compute(FrameType::Global, &jittered, 0.0, || {
                global_frame(&frame, &schema)
            })
            .unwrap();
        for p in &mut jittered {
            p.x += 0.0004;
        }
        cache
            .get_or_compute(FrameType::Global, &jittered, 0.005, || {
                panic!("jitter below the quantum must hit")
            })
            .unwrap();
        assert_eq!(cache.hits(), 1);
    }

    #[test]
    fn frame_types_do_not_collide() {
        let mut cache = FrameCache::new(CacheConfig::default());
        let frame = standing_frame(0.0);
        let schema = mediapipe_33();
        let pos = positions(&frame);

        let g = cache
            .get_or_compute(FrameType::Global, &pos, 0.0, || {
                global_frame(&frame, &schema)
            })
            .unwrap();
        let t = cache
            .get_or_compute(FrameType::Thorax, &pos, 0.0, || {
                crate::frames::thorax_frame(&frame, &schema)
            })
            .unwrap();
        assert_ne!(g.frame_type, t.frame_type);
        assert_eq!(cache.misses(), 2);
    }

    #[test]
    fn disabled_cache_is_transparent() {
        let config = CacheConfig {
            enabled: false,
            ..CacheConfig::default()
        };
        let mut disabled = FrameCache::new(config);
        let mut enabled = FrameCache::new(CacheConfig::default());
        let frame = standing_frame(0.0);
        let schema = mediapipe_33();
        let pos = positions(&frame);

        let a = disabled
            .get_or_compute(FrameType::Global, &pos, 0.0, || {
                global_frame(&frame, &schema)
            })
            .unwrap();
        let b = enabled
            .get_or_compute(FrameType::Global, &pos, 0.0, || {
                global_frame(&frame, &schema)
            })
            .unwrap();
        assert_eq!(a, b);
        assert_eq!(disabled.len(), 0);
    }

    #[test]
    fn capacity_is_bounded() {
        let config = CacheConfig {
            capacity: 4,
            ttl_s: 1000.0,
            ..CacheConfig::default()
        };
        let mut cache = FrameCache::new(config);
        let schema = mediapipe_33();
        for i in 0..20 {
            let mut frame = standing_frame(0.0);
            for lm in &mut frame.landmarks {
                lm.position.x += i as f64;
            }
            let pos = positions(&frame);
            cache
                .get_or_compute(FrameType::Global, &pos, 0.0, || {
                    global_frame(&frame, &schema)
                })
                .unwrap();
        }
        assert!(cache.len() <= 4);
    }

    #[test]
    fn clear_resets_entries_and_counters() {
        let mut cache = FrameCache::new(CacheConfig::default());
        let frame = standing_frame(0.0);
        let schema = mediapipe_33();
        let pos = positions(&frame);
        cache
            .get_or_compute(FrameType::Global, &pos, 0.0, || {
                global_frame(&frame, &schema)
            })
            .unwrap();
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.misses(), 0);
    }
}
