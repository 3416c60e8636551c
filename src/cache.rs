// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License in the LICENSE-APACHE file or at:
//     https://www.apache.org/licenses/LICENSE-2.0

//! Glyph-mask cache
//!
//! Rendered glyph masks are stored under a 64-bit *fingerprint* covering
//! everything that influenced rasterization: font identity, rasterizer
//! configuration digest, scaled size, glyph index and the sub-pixel fraction
//! of the pen position. A cache never returns a mask the current
//! configuration would not reproduce; that property is what makes cached
//! and uncached drawing pixel-identical.
//!
//! One [`GlyphCache`] may serve many renderers; each renderer owns one
//! [`CacheHandle`] which receives configuration-change notifications and
//! keeps the invariant parts of the fingerprint pre-mixed, so hashing per
//! glyph only folds in the glyph index and sub-pixel fraction.

use crate::font::GlyphId;
use crate::fract::Fract;
use crate::raster::{ChangeObserver, GlyphMask, Rasterizer};
use std::cell::Cell;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::Hasher;
use std::rc::Rc;
use std::sync::{Arc, LazyLock, Mutex};

/// Entries sampled per eviction round
const EVICTION_SAMPLE: usize = 3;

/// Byte budget of the shared process-wide cache
pub const SHARED_CACHE_BYTES: usize = 8 * 1024 * 1024;

/// Scores cache entries for eviction; the lowest score goes first
///
/// The default policy is plain least-recently-used. The cache only promises
/// to respect its byte budget, not to evict optimally, so policies are free
/// to use any scoring they like.
pub trait EvictionPolicy: Send + Sync {
    fn score(&self, bytes: usize, last_access: u64, now: u64) -> u64;
}

/// Least-recently-used scoring
pub struct LruPolicy;

impl EvictionPolicy for LruPolicy {
    fn score(&self, _bytes: usize, last_access: u64, _now: u64) -> u64 {
        last_access
    }
}

struct Entry {
    mask: Arc<GlyphMask>,
    bytes: usize,
    stamp: u64,
    slot: usize,
}

#[derive(Default)]
struct CacheState {
    map: HashMap<u64, Entry>,
    // Dense key list for O(1) random sampling; each entry records its slot.
    keys: Vec<u64>,
    bytes: usize,
    tick: u64,
    rng: u64,
}

impl CacheState {
    fn next_random(&mut self) -> u64 {
        // xorshift64; seeded non-zero at construction
        let mut x = self.rng;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.rng = x;
        x
    }
}

/// A byte-bounded fingerprint → mask store
///
/// Internal state is guarded by a mutex so one cache may be shared by
/// several renderers (each through its own [`CacheHandle`]).
pub struct GlyphCache {
    capacity: usize,
    policy: Box<dyn EvictionPolicy>,
    state: Mutex<CacheState>,
}

impl GlyphCache {
    /// Construct with a byte budget and LRU eviction
    pub fn new(capacity: usize) -> Self {
        Self::with_policy(capacity, Box::new(LruPolicy))
    }

    /// Construct with a byte budget and a custom eviction policy
    pub fn with_policy(capacity: usize, policy: Box<dyn EvictionPolicy>) -> Self {
        GlyphCache {
            capacity,
            policy,
            state: Mutex::new(CacheState {
                rng: 0x9E37_79B9_7F4A_7C15,
                ..Default::default()
            }),
        }
    }

    /// The shared process-wide cache (8 MiB), created on first request
    pub fn shared() -> Arc<GlyphCache> {
        static SHARED: LazyLock<Arc<GlyphCache>> =
            LazyLock::new(|| Arc::new(GlyphCache::new(SHARED_CACHE_BYTES)));
        SHARED.clone()
    }

    /// The configured byte budget
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Bytes currently stored
    pub fn stored_bytes(&self) -> usize {
        self.state.lock().unwrap().bytes
    }

    /// Number of stored masks
    pub fn len(&self) -> usize {
        self.state.lock().unwrap().map.len()
    }

    /// Look up a mask, refreshing its access stamp
    pub fn get(&self, fingerprint: u64) -> Option<Arc<GlyphMask>> {
        let mut state = self.state.lock().unwrap();
        state.tick += 1;
        let tick = state.tick;
        let entry = state.map.get_mut(&fingerprint)?;
        entry.stamp = tick;
        Some(entry.mask.clone())
    }

    /// Store a mask, evicting as needed to stay within budget
    ///
    /// A mask larger than the whole budget is not stored. Re-inserting an
    /// existing fingerprint only refreshes its access stamp: equal
    /// fingerprints denote equal masks.
    pub fn insert(&self, fingerprint: u64, mask: Arc<GlyphMask>, bytes: usize) {
        if bytes > self.capacity {
            log::debug!("glyph mask of {bytes} bytes exceeds whole cache budget; not stored");
            return;
        }

        let mut state = self.state.lock().unwrap();
        state.tick += 1;
        let tick = state.tick;
        if let Some(entry) = state.map.get_mut(&fingerprint) {
            entry.stamp = tick;
            return;
        }

        while state.bytes + bytes > self.capacity {
            self.evict_one(&mut state);
        }

        let slot = state.keys.len();
        state.keys.push(fingerprint);
        state.bytes += bytes;
        state.map.insert(
            fingerprint,
            Entry {
                mask,
                bytes,
                stamp: tick,
                slot,
            },
        );
    }

    /// Evict the lowest-scoring of a few randomly sampled entries
    fn evict_one(&self, state: &mut CacheState) {
        debug_assert!(!state.keys.is_empty());
        let now = state.tick;
        let mut victim: Option<(u64, u64)> = None; // (score, key)
        for _ in 0..EVICTION_SAMPLE.min(state.keys.len()) {
            let i = (state.next_random() % state.keys.len() as u64) as usize;
            let key = state.keys[i];
            let entry = &state.map[&key];
            let score = self.policy.score(entry.bytes, entry.stamp, now);
            if victim.map(|(s, _)| score < s).unwrap_or(true) {
                victim = Some((score, key));
            }
        }

        let (_, key) = victim.unwrap();
        let entry = state.map.remove(&key).unwrap();
        state.bytes -= entry.bytes;
        state.keys.swap_remove(entry.slot);
        if entry.slot < state.keys.len() {
            let moved = state.keys[entry.slot];
            state.map.get_mut(&moved).unwrap().slot = entry.slot;
        }
        log::debug!("evicted glyph mask ({} bytes)", entry.bytes);
    }
}

/// A renderer's private door into a shared [`GlyphCache`]
///
/// The handle receives the renderer's configuration-change notifications
/// and maintains a partially-fed hasher over the stable fingerprint parts
/// (font, rasterizer signature, scaled size). Handles are not transferable
/// between renderers.
pub struct CacheHandle {
    cache: Arc<GlyphCache>,
    dirty: ChangeObserver,
    font_id: u64,
    rast_sig: u64,
    size_bits: i32,
    fract: (u8, u8),
    base: DefaultHasher,
}

impl CacheHandle {
    /// Construct over a cache
    pub fn new(cache: Arc<GlyphCache>) -> Self {
        let mut handle = CacheHandle {
            cache,
            dirty: Rc::new(Cell::new(false)),
            font_id: 0,
            rast_sig: 0,
            size_bits: 0,
            fract: (0, 0),
            base: DefaultHasher::new(),
        };
        handle.rebuild_base();
        handle
    }

    /// Construct over the shared process-wide cache
    pub fn shared() -> Self {
        Self::new(GlyphCache::shared())
    }

    /// The underlying cache
    pub fn cache(&self) -> &Arc<GlyphCache> {
        &self.cache
    }

    /// The observer flag to install into a rasterizer
    pub fn observer(&self) -> ChangeObserver {
        self.dirty.clone()
    }

    /// The active font changed
    pub fn notify_font_change(&mut self, font_id: u64) {
        if self.font_id != font_id {
            self.font_id = font_id;
            self.rebuild_base();
        }
    }

    /// The scaled size changed
    pub fn notify_size_change(&mut self, size: Fract) {
        if self.size_bits != size.to_bits() {
            self.size_bits = size.to_bits();
            self.rebuild_base();
        }
    }

    /// A different rasterizer was attached, or its configuration changed
    pub fn notify_rasterizer_change(&mut self, signature: u64) {
        self.dirty.set(false);
        if self.rast_sig != signature {
            self.rast_sig = signature;
            self.rebuild_base();
        }
    }

    /// The sub-pixel fraction of the pen moved
    pub fn notify_fract_shift(&mut self, fract: (u8, u8)) {
        self.fract = fract;
    }

    /// Re-digest the rasterizer if its observer flag was raised
    pub(crate) fn refresh(&mut self, rasterizer: &dyn Rasterizer) {
        if self.dirty.get() {
            self.notify_rasterizer_change(rasterizer.signature());
        }
    }

    fn rebuild_base(&mut self) {
        let mut hasher = DefaultHasher::new();
        hasher.write_u64(self.font_id);
        hasher.write_u64(self.rast_sig);
        hasher.write_i32(self.size_bits);
        self.base = hasher;
    }

    /// The full fingerprint for one glyph at the current configuration
    pub fn fingerprint(&self, glyph: GlyphId) -> u64 {
        let mut hasher = self.base.clone();
        hasher.write_u16(glyph.0);
        hasher.write_u8(self.fract.0);
        hasher.write_u8(self.fract.1);
        hasher.finish()
    }

    /// Look up the mask for `fingerprint`
    pub fn get(&self, fingerprint: u64) -> Option<Arc<GlyphMask>> {
        self.cache.get(fingerprint)
    }

    /// Store a mask under `fingerprint`
    pub fn insert(&self, fingerprint: u64, mask: Arc<GlyphMask>) {
        let bytes = mask.byte_cost();
        self.cache.insert(fingerprint, mask, bytes);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn mask(bytes: usize) -> Arc<GlyphMask> {
        Arc::new(GlyphMask {
            size: (bytes as u32, 1),
            offset: (0, 0),
            data: vec![0; bytes],
        })
    }

    #[test]
    fn budget_is_respected() {
        let cache = GlyphCache::new(1000);
        for key in 0..100u64 {
            cache.insert(key, mask(64), 100);
            assert!(cache.stored_bytes() <= 1000);
        }
        assert_eq!(cache.len(), 10);
    }

    #[test]
    fn oversized_mask_not_stored() {
        let cache = GlyphCache::new(100);
        cache.insert(1, mask(64), 200);
        assert_eq!(cache.len(), 0);
        assert!(cache.get(1).is_none());
    }

    #[test]
    fn reinsert_refreshes_instead_of_duplicating() {
        let cache = GlyphCache::new(1000);
        cache.insert(7, mask(8), 100);
        cache.insert(7, mask(8), 100);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.stored_bytes(), 100);
    }

    #[test]
    fn get_refreshes_lru_stamp() {
        let cache = GlyphCache::new(300);
        cache.insert(1, mask(8), 100);
        cache.insert(2, mask(8), 100);
        cache.insert(3, mask(8), 100);
        // Touch 1 so it is the most recently used.
        assert!(cache.get(1).is_some());
        // Overflow forces evictions; after several inserts, 1 should have
        // had the best survival odds. We only assert the budget here: the
        // sampling policy does not promise strict LRU.
        for key in 10..20u64 {
            cache.insert(key, mask(8), 100);
            assert!(cache.stored_bytes() <= 300);
        }
    }

    #[test]
    fn fingerprint_stability() {
        let mut handle = CacheHandle::new(Arc::new(GlyphCache::new(1024)));
        handle.notify_font_change(11);
        handle.notify_size_change(Fract::from(16));
        handle.notify_rasterizer_change(99);
        handle.notify_fract_shift((32, 0));
        let a = handle.fingerprint(GlyphId(5));
        let b = handle.fingerprint(GlyphId(5));
        assert_eq!(a, b);

        // Any component change must move the fingerprint.
        handle.notify_size_change(Fract::from(17));
        assert_ne!(handle.fingerprint(GlyphId(5)), a);
        handle.notify_size_change(Fract::from(16));
        assert_eq!(handle.fingerprint(GlyphId(5)), a);
        handle.notify_fract_shift((33, 0));
        assert_ne!(handle.fingerprint(GlyphId(5)), a);
        handle.notify_fract_shift((32, 0));
        handle.notify_font_change(12);
        assert_ne!(handle.fingerprint(GlyphId(5)), a);
    }
}
