//! Inline caching for virtual dispatch
//!
//! Each `invokevirtual` site owns a small cache mapping the receiver types it
//! has seen to the method they resolved to. Entries are filled lazily on a
//! miss; when all ways are taken the entry with the fewest hits is evicted.

use arrayvec::ArrayVec;

/// Number of entries per call site
pub const CACHE_WAYS: usize = 4;

/// Call site identifier (absolute bytecode offset of the call instruction)
pub type CallSiteId = u32;

/// One cached resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheEntry {
    /// Concrete receiver type
    pub type_id: u32,
    /// Method the type resolved to
    pub method_index: u16,
    /// Lookups answered by this entry
    pub hit_count: u32,
}

/// Observed polymorphism of a call site
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheState {
    /// Nothing cached yet
    Uninitialized,
    /// Exactly one receiver type seen
    Monomorphic,
    /// Two or more receiver types cached
    Polymorphic,
}

/// Per-call-site cache of up to [`CACHE_WAYS`] receiver types.
///
/// # Examples
///
/// ```
/// use type_registry::InlineCache;
///
/// let mut cache = InlineCache::new();
/// assert_eq!(cache.lookup(7), None);
/// cache.insert(7, 3);
/// assert_eq!(cache.lookup(7), Some(3));
/// assert_eq!(cache.entries()[0].hit_count, 1);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InlineCache {
    entries: ArrayVec<CacheEntry, CACHE_WAYS>,
}

impl InlineCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a receiver type, counting a hit when found.
    pub fn lookup(&mut self, type_id: u32) -> Option<u16> {
        let entry = self.entries.iter_mut().find(|e| e.type_id == type_id)?;
        entry.hit_count = entry.hit_count.saturating_add(1);
        Some(entry.method_index)
    }

    /// Record a resolution, evicting the least-hit entry when full.
    pub fn insert(&mut self, type_id: u32, method_index: u16) {
        let entry = CacheEntry {
            type_id,
            method_index,
            hit_count: 0,
        };

        if let Some(existing) = self.entries.iter_mut().find(|e| e.type_id == type_id) {
            existing.method_index = method_index;
            return;
        }
        if let Err(overflow) = self.entries.try_push(entry) {
            // first minimum wins, so ties evict the oldest way
            if let Some(victim) = self.entries.iter_mut().min_by_key(|e| e.hit_count) {
                *victim = overflow.element();
            }
        }
    }

    /// Cached entries in way order
    pub fn entries(&self) -> &[CacheEntry] {
        &self.entries
    }

    /// Number of occupied ways
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is cached
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Current polymorphism state
    pub fn state(&self) -> CacheState {
        match self.entries.len() {
            0 => CacheState::Uninitialized,
            1 => CacheState::Monomorphic,
            _ => CacheState::Polymorphic,
        }
    }
}
