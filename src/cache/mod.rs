//! Bounded, recency-ordered cache of compiled units.
//!
//! Entries hold a `Weak` reference to the unit, so the cache never keeps a
//! unit alive on its own. Every entry also remembers the digest of the
//! content it was compiled from; a lookup only hits when the digest of the
//! content being loaded right now is identical.
//!
//! When the last strong reference to a cached unit is dropped, the unit
//! posts its key on a reclamation channel. Lookups drain that channel before
//! touching the map, so dead entries are cleaned up lazily. A `get` still
//! re-checks liveness itself, because a unit can die between the drain and
//! the upgrade.
use std::{
    fmt,
    ops::Deref,
    sync::{
        Arc, Mutex, MutexGuard, OnceLock, PoisonError, Weak,
        mpsc::{self, Receiver, Sender},
    },
};

use indexmap::IndexMap;

use crate::{
    engine::{ExecutionMode, SecurityDomain},
    fingerprint::ContentDigest,
};

/// Cache identity: the location a unit was loaded from, plus everything
/// that decided how it was compiled (engine mode, compile profile and the
/// security domain).
///
/// Units capture their domain at compile time, so a unit compiled for one
/// domain must never be handed to a request made under another.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    path: String,
    mode: ExecutionMode,
    profile: String,
    domain: Option<SecurityDomain>,
}

impl CacheKey {
    pub fn new(path: impl Into<String>, mode: ExecutionMode) -> Self {
        Self {
            path: path.into(),
            mode,
            profile: String::new(),
            domain: None,
        }
    }

    pub fn with_profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = profile.into();
        self
    }

    pub fn in_domain(mut self, domain: Option<&SecurityDomain>) -> Self {
        self.domain = domain.cloned();
        self
    }

    pub fn domain(&self) -> Option<&SecurityDomain> {
        self.domain.as_ref()
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.path, self.mode)?;
        if !self.profile.is_empty() {
            write!(f, "/{}", self.profile)?;
        }
        if let Some(domain) = &self.domain {
            write!(f, "@{}", domain)?;
        }
        Ok(())
    }
}

struct ReclaimHook {
    key: CacheKey,
    sender: Sender<CacheKey>,
}

/// A compiled unit as handed out by the pipeline.
///
/// Owned through `Arc`. Once the unit has been stored in a cache, dropping
/// the last `Arc` notifies that cache.
pub struct CompiledUnit<U> {
    unit: U,
    reclaim: OnceLock<ReclaimHook>,
}

impl<U> CompiledUnit<U> {
    pub fn new(unit: U) -> Self {
        Self {
            unit,
            reclaim: OnceLock::new(),
        }
    }

    pub fn unit(&self) -> &U {
        &self.unit
    }
}

impl<U> Deref for CompiledUnit<U> {
    type Target = U;

    fn deref(&self) -> &U {
        &self.unit
    }
}

impl<U: fmt::Debug> fmt::Debug for CompiledUnit<U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CompiledUnit").field(&self.unit).finish()
    }
}

impl<U> Drop for CompiledUnit<U> {
    fn drop(&mut self) {
        if let Some(hook) = self.reclaim.get() {
            // The cache may already be gone.
            let _ = hook.sender.send(hook.key.clone());
        }
    }
}

struct CacheEntry<U> {
    digest: ContentDigest,
    unit: Weak<CompiledUnit<U>>,
}

/// Counters describing cache behaviour since construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub stale: u64,
    pub evictions: u64,
    pub reclaimed: u64,
    pub len: usize,
    pub capacity: usize,
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CacheStats(hits={}, misses={}, stale={}, evictions={}, reclaimed={}, size={}/{})",
            self.hits,
            self.misses,
            self.stale,
            self.evictions,
            self.reclaimed,
            self.len,
            self.capacity
        )
    }
}

struct CacheState<U> {
    /// Front is least recently used.
    entries: IndexMap<CacheKey, CacheEntry<U>>,
    sender: Sender<CacheKey>,
    reclaimed: Receiver<CacheKey>,
    stats: CacheStats,
}

impl<U> CacheState<U> {
    fn drain_reclaimed(&mut self) {
        while let Ok(key) = self.reclaimed.try_recv() {
            // A newer live unit may have replaced the one that died.
            let dead = self
                .entries
                .get(&key)
                .is_some_and(|entry| entry.unit.strong_count() == 0);
            if dead {
                self.entries.shift_remove(&key);
                self.stats.reclaimed += 1;
                log::debug!("cache: reclaimed {}", key);
            }
        }
    }
}

pub struct ScriptCache<U> {
    capacity: usize,
    state: Mutex<CacheState<U>>,
}

impl<U> ScriptCache<U> {
    pub fn new(capacity: usize) -> Self {
        let (sender, reclaimed) = mpsc::channel();
        Self {
            capacity,
            state: Mutex::new(CacheState {
                entries: IndexMap::with_capacity(capacity + 1),
                sender,
                reclaimed,
                stats: CacheStats {
                    capacity,
                    ..CacheStats::default()
                },
            }),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains_key(&self, key: &CacheKey) -> bool {
        self.lock().entries.contains_key(key)
    }

    /// Returns the live unit cached under `key` if it was compiled from
    /// content with exactly `digest`. Stale and reclaimed entries are removed.
    pub fn get(&self, key: &CacheKey, digest: &ContentDigest) -> Option<Arc<CompiledUnit<U>>> {
        let mut state = self.lock();
        state.drain_reclaimed();

        let Some(index) = state.entries.get_index_of(key) else {
            state.stats.misses += 1;
            return None;
        };

        if state.entries[index].digest != *digest {
            state.entries.shift_remove_index(index);
            state.stats.stale += 1;
            state.stats.misses += 1;
            log::debug!("cache: stale {} (content changed)", key);
            return None;
        }

        let live = state.entries[index].unit.upgrade();
        match live {
            Some(unit) => {
                let last = state.entries.len() - 1;
                state.entries.move_index(index, last);
                state.stats.hits += 1;
                Some(unit)
            }
            None => {
                state.entries.shift_remove_index(index);
                state.stats.reclaimed += 1;
                state.stats.misses += 1;
                log::debug!("cache: reclaimed {} (found dead on lookup)", key);
                None
            }
        }
    }

    /// Stores a weak reference to `unit` under `key`, replacing any previous
    /// entry, and evicts least recently used entries beyond capacity.
    pub fn put(&self, key: CacheKey, digest: ContentDigest, unit: &Arc<CompiledUnit<U>>) {
        let mut state = self.lock();
        // First registration wins; a unit only ever lives under one key.
        let _ = unit.reclaim.set(ReclaimHook {
            key: key.clone(),
            sender: state.sender.clone(),
        });

        state.entries.shift_remove(&key);
        log::debug!("cache: stored {} ({:?})", key, digest);
        state.entries.insert(
            key,
            CacheEntry {
                digest,
                unit: Arc::downgrade(unit),
            },
        );

        while state.entries.len() > self.capacity {
            if let Some((evicted, _)) = state.entries.shift_remove_index(0) {
                state.stats.evictions += 1;
                log::debug!("cache: evicted {}", evicted);
            }
        }
    }

    pub fn remove(&self, key: &CacheKey) -> bool {
        self.lock().entries.shift_remove(key).is_some()
    }

    pub fn clear(&self) {
        self.lock().entries.clear();
    }

    /// Keys from least to most recently used.
    pub fn keys(&self) -> Vec<CacheKey> {
        self.lock().entries.keys().cloned().collect()
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.lock();
        CacheStats {
            len: state.entries.len(),
            ..state.stats
        }
    }

    fn lock(&self) -> MutexGuard<'_, CacheState<U>> {
        // Every mutation leaves the map consistent, so a panic elsewhere
        // while holding the lock does not invalidate the state.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<U> fmt::Debug for ScriptCache<U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptCache")
            .field("capacity", &self.capacity)
            .field("stats", &self.stats())
            .finish()
    }
}
