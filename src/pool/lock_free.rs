//! Lock-free strategy: the cursor is an atomic updated with a single
//! fetch-and-subtract.

use core::fmt;
use core::marker::PhantomData;
use core::mem;
use core::ptr::NonNull;
use core::sync::atomic::{AtomicUsize, Ordering};

use super::{PoolAllocate, PoolConfig, PoolCore, byte_len};
use crate::error::Result;
use crate::registry::SlotId;

/// Lock-free bump pool.
///
/// Multiple threads share one region; each allocation claims its byte
/// range with one `fetch_sub`, so there is no lock to contend on and no
/// retry loop; the subtraction itself is the claim.
pub struct LockFreePool<T> {
    core: PoolCore,
    cursor: AtomicUsize,
    _elements: PhantomData<T>,
}

// SAFETY: the atomic fetch_sub hands every caller a disjoint
// [top - bytes, top) window; the region is immutable shared state.
unsafe impl<T: Send> Send for LockFreePool<T> {}
unsafe impl<T: Send> Sync for LockFreePool<T> {}

impl<T> LockFreePool<T> {
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
        let cursor = AtomicUsize::new(core.region().end_addr());
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
        self.core.region().end_addr() - self.cursor.load(Ordering::Relaxed)
    }

    /// Bytes still allocatable before the cursor reaches the guard page.
    #[inline]
    pub fn available(&self) -> usize {
        self.cursor
            .load(Ordering::Relaxed)
            .saturating_sub(self.core.region().floor_addr())
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

impl<T> fmt::Debug for LockFreePool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockFreePool")
            .field("slot", &self.registry_slot().index())
            .field("capacity", &self.capacity())
            .field("used", &self.used())
            .finish()
    }
}

// SAFETY: fetch_sub is the sole linearization point for claiming a byte
// range; concurrent callers observe distinct pre-subtraction tops and
// therefore receive disjoint windows. Relaxed ordering suffices: the
// returned memory is freshly reserved and no data is published through
// the cursor. The region stays mapped for the life of `core`.
unsafe impl<T> PoolAllocate<T> for LockFreePool<T> {
    unsafe fn allocate(&self, count: usize) -> NonNull<T> {
        let bytes = byte_len::<T>(count);
        let top = self.cursor.fetch_sub(bytes, Ordering::Relaxed);
        // SAFETY: top - bytes derives from a non-null mapping top; the
        // guard page polices over-allocation.
        unsafe { NonNull::new_unchecked(top.wrapping_sub(bytes) as *mut T) }
    }
}
