//! Mutex-guarded strategy: the cursor update runs under an exclusive
//! lock.

use core::fmt;
use core::marker::PhantomData;
use core::mem;
use core::ptr::NonNull;

use parking_lot::Mutex;

use super::{PoolAllocate, PoolConfig, PoolCore, byte_len};
use crate::error::Result;
use crate::registry::SlotId;

/// Mutex-guarded bump pool.
///
/// Multiple threads may share one region; every allocation takes an
/// exclusive lock around the cursor decrement. Simpler than
/// [`LockFreePool`](super::LockFreePool), at the cost of throughput under
/// contention.
pub struct LockedPool<T> {
    core: PoolCore,
    cursor: Mutex<usize>,
    _elements: PhantomData<T>,
}

// SAFETY: the mutex serializes every cursor update, so concurrent
// allocate calls claim disjoint ranges; the region itself is immutable
// shared state.
unsafe impl<T: Send> Send for LockedPool<T> {}
unsafe impl<T: Send> Sync for LockedPool<T> {}

impl<T> LockedPool<T> {
    /// Creates a pool backed by the default-sized reservation.
    pub fn new() -> Result<Self> {
        Self::with_config(PoolConfig::new())
    }

    /// Creates a pool sized for `count` expected elements.
    pub fn with_expected_elements(count: usize) -> Result<Self> {
        Self::with_config(PoolConfig::new().with_expected_elements(count))
    }

    /// Creates a pool with the given configuration.
    ///
    /// # Errors
    /// Same contract as [`Pool::with_config`](super::Pool::with_config):
    /// reservation and registration succeed or fail together.
    pub fn with_config(config: PoolConfig) -> Result<Self> {
        let core = PoolCore::create(config, mem::size_of::<T>())?;
        let cursor = Mutex::new(core.region().end_addr());
        Ok(Self {
            core,
            cursor,
            _elements: PhantomData,
        })
    }

    /// Total reserved bytes, guard page included.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.core.region().len()
    }

    /// Bytes carved off so far.
    #[inline]
    pub fn used(&self) -> usize {
        self.core.region().end_addr() - *self.cursor.lock()
    }

    /// Bytes still allocatable before the cursor reaches the guard page.
    #[inline]
    pub fn available(&self) -> usize {
        self.cursor.lock().saturating_sub(self.core.region().floor_addr())
    }

    /// Registry slot naming this pool in fault reports.
    #[inline]
    pub fn registry_slot(&self) -> SlotId {
        self.core.slot()
    }

    /// Base address of the reservation (the guard page).
    #[inline]
    pub fn region_base(&self) -> usize {
        self.core.region().base_addr()
    }
}

impl<T> fmt::Debug for LockedPool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockedPool")
            .field("slot", &self.registry_slot().index())
            .field("capacity", &self.capacity())
            .field("used", &self.used())
            .finish()
    }
}

// SAFETY: the lock makes the decrement the sole linearization point for
// claiming a byte range; no two holders ever observe overlapping
// [next, cursor) windows. The region stays mapped for the life of
// `core`.
unsafe impl<T> PoolAllocate<T> for LockedPool<T> {
    unsafe fn allocate(&self, count: usize) -> NonNull<T> {
        let mut cursor = self.cursor.lock();
        let next = cursor.wrapping_sub(byte_len::<T>(count));
        *cursor = next;
        // SAFETY: next derives from a non-null mapping top; the guard
        // page polices over-allocation.
        unsafe { NonNull::new_unchecked(next as *mut T) }
    }
}
