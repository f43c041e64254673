//! Engine pool
//!
//! Cache of idle, initialized engines keyed by (canonical style URL,
//! locale). Pooling whole engines amortizes style and locale parsing
//! across requests sharing a style+locale. Each key holds a store of
//! instances because several requests for the same key may be in flight at
//! once; removal from the pool is the only way to obtain an instance, so
//! an engine is never shared while bound to a request.
//!
//! Eviction is LRU at style+locale granularity: a key is retained or
//! dropped as one unit, regardless of how many idle instances it holds.

use std::collections::HashMap;

use parking_lot::Mutex;

use super::FormatEngine;

/// Pool cache key: canonical style URL plus locale code.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub style_uri: String,
    pub locale: String,
}

impl CacheKey {
    pub fn new(style_uri: impl Into<String>, locale: impl Into<String>) -> Self {
        Self {
            style_uri: style_uri.into(),
            locale: locale.into(),
        }
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.style_uri, self.locale)
    }
}

struct PoolEntry {
    /// Idle instances; always a collection, never a single-slot shape.
    store: Vec<Box<dyn FormatEngine>>,
    /// Recency stamp from `PoolState::tick`.
    used: u64,
}

#[derive(Default)]
struct PoolState {
    entries: HashMap<CacheKey, PoolEntry>,
    /// Monotonic recency clock, bumped on every save.
    tick: u64,
    /// Saves since the last eviction pass.
    save_count: u64,
}

/// Engine cache with LRU eviction at style+locale granularity.
///
/// All operations are synchronous under one lock that is never held across
/// an await point, so no two requests can interleave inside a load or save.
pub struct EnginePool {
    state: Mutex<PoolState>,
    /// Maximum number of distinct keys retained.
    cache_size: usize,
    /// Run eviction every this many saves.
    clean_interval: u64,
}

impl EnginePool {
    pub fn new(cache_size: usize, clean_interval: u64) -> Self {
        Self {
            state: Mutex::new(PoolState::default()),
            cache_size,
            clean_interval: clean_interval.max(1),
        }
    }

    /// Remove and return one idle engine for `key`, if any.
    ///
    /// The returned engine has its item binding cleared and processor
    /// state reset. The entry is removed once its store drains. A miss is
    /// a normal outcome; the pipeline builds a new engine instead.
    pub fn load(&self, key: &CacheKey) -> Option<Box<dyn FormatEngine>> {
        let mut engine = {
            let mut state = self.state.lock();
            let entry = state.entries.get_mut(key)?;
            let engine = entry.store.pop()?;
            if entry.store.is_empty() {
                state.entries.remove(key);
            }
            engine
        };
        reset_engine(engine.as_mut());
        Some(engine)
    }

    /// Return an idle engine to the pool under `key`.
    ///
    /// The engine's item binding and processor state are cleared before it
    /// becomes loadable again.
    pub fn save(&self, mut engine: Box<dyn FormatEngine>, key: CacheKey) {
        reset_engine(engine.as_mut());

        let mut state = self.state.lock();
        state.tick += 1;
        let used = state.tick;
        let entry = state.entries.entry(key).or_insert_with(|| PoolEntry {
            store: Vec::new(),
            used,
        });
        entry.store.push(engine);
        entry.used = used;

        state.save_count += 1;
        if state.save_count >= self.clean_interval {
            state.save_count = 0;
            Self::evict(&mut state, self.cache_size);
        }
    }

    /// Drop the least-recently-used keys beyond `cache_size`.
    fn evict(state: &mut PoolState, cache_size: usize) {
        if state.entries.len() <= cache_size {
            return;
        }
        let mut ranked: Vec<(CacheKey, u64)> = state
            .entries
            .iter()
            .map(|(key, entry)| (key.clone(), entry.used))
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1));
        for (key, _) in ranked.into_iter().skip(cache_size) {
            tracing::debug!("evicting pooled engines for {}", key);
            state.entries.remove(&key);
        }
    }

    /// Number of distinct keys currently pooled.
    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().entries.is_empty()
    }

    /// Idle instance count for one key.
    pub fn idle_count(&self, key: &CacheKey) -> usize {
        self.state
            .lock()
            .entries
            .get(key)
            .map_or(0, |entry| entry.store.len())
    }
}

fn reset_engine(engine: &mut dyn FormatEngine) {
    engine.clear_items();
    engine.update_items(&[]);
    engine.restore_processor_state();
}
