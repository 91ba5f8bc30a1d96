//! Typed object pool for per-event documents.
//!
//! A best-effort cache: [`Pool::acquire`] hands back a previously released
//! instance when one is available and allocates a fresh one otherwise. The
//! pool performs no reset; callers overwrite every field before use.
//!
//! Thread-safe: can be shared across workers via `Arc<Pool<T>>`.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

/// Unbounded pool of reusable `T` instances.
pub struct Pool<T> {
    free: Mutex<Vec<T>>,
    acquired: AtomicU64,
    released: AtomicU64,
    allocated: AtomicU64,
}

impl<T: Default> Pool<T> {
    /// Create an empty pool.
    pub fn new() -> Self {
        Self {
            free: Mutex::new(Vec::new()),
            acquired: AtomicU64::new(0),
            released: AtomicU64::new(0),
            allocated: AtomicU64::new(0),
        }
    }

    /// Take an instance from the pool.
    ///
    /// The returned value is in whatever state its previous user left it.
    /// If another thread holds the free list, a fresh instance is allocated
    /// instead of waiting.
    pub fn acquire(&self) -> T {
        self.acquired.fetch_add(1, Ordering::Relaxed);

        if let Some(mut free) = self.free.try_lock() {
            if let Some(item) = free.pop() {
                return item;
            }
        }

        self.allocated.fetch_add(1, Ordering::Relaxed);
        T::default()
    }

    /// Return an instance for future reuse.
    pub fn release(&self, item: T) {
        self.released.fetch_add(1, Ordering::Relaxed);
        self.free.lock().push(item);
    }

    /// Return many instances under a single lock acquisition.
    pub fn release_all<I: IntoIterator<Item = T>>(&self, items: I) {
        let mut free = self.free.lock();
        let before = free.len();
        free.extend(items);
        let returned = (free.len() - before) as u64;
        drop(free);
        self.released.fetch_add(returned, Ordering::Relaxed);
    }

    /// Number of idle instances currently cached.
    pub fn idle(&self) -> usize {
        self.free.lock().len()
    }

    /// Get statistics about the pool.
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            acquired: self.acquired.load(Ordering::Relaxed),
            released: self.released.load(Ordering::Relaxed),
            allocated: self.allocated.load(Ordering::Relaxed),
        }
    }
}

impl<T: Default> Default for Pool<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Statistics about a [`Pool`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Calls to `acquire`.
    pub acquired: u64,

    /// Instances handed back through `release`/`release_all`.
    pub released: u64,

    /// Instances created because the free list was empty or contended.
    pub allocated: u64,
}

impl PoolStats {
    /// Acquisitions satisfied from the free list.
    pub fn reused(&self) -> u64 {
        self.acquired - self.allocated
    }
}
