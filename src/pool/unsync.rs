//! Uncoordinated strategy: a plain `Cell` cursor, no synchronization.

use core::cell::Cell;
use core::fmt;
use core::marker::PhantomData;
use core::mem;
use core::ptr::NonNull;

use super::{PoolAllocate, PoolConfig, PoolCore, byte_len};
use crate::error::Result;
use crate::registry::SlotId;

/// Uncoordinated bump pool.
///
/// The fastest strategy: a cursor decrement with no synchronization at
/// all. It is `!Sync` by construction, so single-writer access is
/// enforced at compile time rather than by caller discipline. For
/// contention-free parallel workloads, give each thread its own `Pool`
/// (the thread-local deployment mode).
pub struct Pool<T> {
    core: PoolCore,
    cursor: Cell<usize>,
    _elements: PhantomData<T>,
}

// SAFETY: moving a Pool to another thread moves the whole region with
// it. The Cell cursor is only touched through &self, and the missing
// Sync impl keeps all of those on one thread at a time.
unsafe impl<T: Send> Send for Pool<T> {}

impl<T> Pool<T> {
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
    /// Reserves the region, installs the fault handler if this is the
    /// first pool in the process, and claims a registry slot.
    ///
    /// # Errors
    /// [`MemoryError::OutOfMemory`](crate::MemoryError::OutOfMemory) if
    /// the reservation fails,
    /// [`MemoryError::TooManyAllocators`](crate::MemoryError::TooManyAllocators)
    /// if the registry is full. Either way nothing stays mapped or
    /// registered.
    pub fn with_config(config: PoolConfig) -> Result<Self> {
        let core = PoolCore::create(config, mem::size_of::<T>())?;
        let cursor = Cell::new(core.region().end_addr());
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
        self.core.region().end_addr() - self.cursor.get()
    }

    /// Bytes still allocatable before the cursor reaches the guard page.
    #[inline]
    pub fn available(&self) -> usize {
        self.cursor.get().saturating_sub(self.core.region().floor_addr())
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

impl<T> fmt::Debug for Pool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("slot", &self.registry_slot().index())
            .field("capacity", &self.capacity())
            .field("used", &self.used())
            .finish()
    }
}

// SAFETY: the cursor decrement is unobservable by any other thread
// (Pool is !Sync), so each call returns a disjoint [next, cursor) range.
// The region stays mapped for the life of `core`.
unsafe impl<T> PoolAllocate<T> for Pool<T> {
    unsafe fn allocate(&self, count: usize) -> NonNull<T> {
        let next = self.cursor.get().wrapping_sub(byte_len::<T>(count));
        self.cursor.set(next);
        // SAFETY: next derives from a non-null mapping top; the guard
        // page, not a null check, polices over-allocation.
        unsafe { NonNull::new_unchecked(next as *mut T) }
    }
}
