//! The bump-pool allocator family
//!
//! Three interchangeable strategies carve fixed-size slices off the top
//! of one reserved region; they differ only in how the shared cursor is
//! updated under concurrency:
//!
//! - [`Pool`]: uncoordinated `Cell` cursor. Fastest; `!Sync`, so sharing
//!   across threads is rejected at compile time.
//! - [`LockedPool`]: mutex-serialized cursor. Simplicity over throughput
//!   when multiple threads share one region.
//! - [`LockFreePool`]: atomic fetch-and-subtract cursor. Throughput under
//!   contention.
//!
//! All three satisfy [`PoolAllocate`], the four-operation capability set
//! `{allocate, deallocate, construct, destroy}` any container-style
//! consumer needs. Call sites know the strategy statically; no virtual
//! dispatch is involved.
//!
//! A fourth deployment mode needs no type of its own: constructing one
//! [`Pool`] per thread eliminates contention entirely at the cost of one
//! reservation per thread.
//!
//! # Exhaustion
//!
//! No strategy checks whether the cursor has crossed into the guard page.
//! Allocation is O(1) with no branch; a workload that over-allocates
//! corrupts nothing (the guard page is mapped but inaccessible) and is
//! terminated by the fault handler with a report naming the offending
//! pool.
//!
//! # Example
//!
//! ```no_run
//! use pagepool::{Pool, PoolAllocate};
//!
//! let pool = Pool::<u64>::with_expected_elements(1024)?;
//! unsafe {
//!     let slot = pool.allocate(1);
//!     pool.construct(slot, 42);
//!     assert_eq!(*slot.as_ptr(), 42);
//!     pool.destroy(slot);
//!     pool.deallocate(slot, 1);
//! }
//! # Ok::<(), pagepool::MemoryError>(())
//! ```

mod lock_free;
mod locked;
mod unsync;

pub use lock_free::LockFreePool;
pub use locked::LockedPool;
pub use unsync::Pool;

use core::mem;
use core::ptr::{self, NonNull};

use crate::error::Result;
use crate::fault;
use crate::region::{Region, region_size};
use crate::registry::{self, SlotId};

/// Construction options shared by every pool strategy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolConfig {
    /// Expected number of live elements. Zero means "unknown", which
    /// falls back to the fixed default reservation. The hint affects
    /// region sizing only, never correctness.
    pub expected_elements: usize,
}

impl PoolConfig {
    /// Creates a config with no element-count hint.
    pub fn new() -> Self {
        Self {
            expected_elements: 0,
        }
    }

    /// Sizes the region for `count` expected elements plus the guard
    /// page.
    #[must_use = "builder methods must be chained or built"]
    pub fn with_expected_elements(mut self, count: usize) -> Self {
        self.expected_elements = count;
        self
    }
}

/// Region plus registry slot, shared by all three strategies.
///
/// Owns the rollback story: if registration fails the region is unmapped
/// before the error returns, so a failed constructor never leaves a
/// half-registered pool. On drop the slot is cleared before the region
/// goes away, so a fault is never attributed to a dead pool.
pub(crate) struct PoolCore {
    region: Region,
    slot: SlotId,
}

impl PoolCore {
    pub(crate) fn create(config: PoolConfig, elem_size: usize) -> Result<Self> {
        fault::install();
        let region = Region::reserve(region_size(config.expected_elements, elem_size))?;
        // `?` drops `region` here, unmapping it: reservation and
        // registration succeed or fail together.
        let slot = registry::global().register(region.base_addr())?;
        Ok(Self { region, slot })
    }

    #[inline]
    pub(crate) fn region(&self) -> &Region {
        &self.region
    }

    #[inline]
    pub(crate) fn slot(&self) -> SlotId {
        self.slot
    }
}

impl Drop for PoolCore {
    fn drop(&mut self) {
        // Fields drop after this body runs, so the slot is released
        // before the region is unmapped.
        registry::global().deregister(self.slot);
    }
}

/// The capability set every pool strategy exposes to its consumers.
///
/// # Safety
///
/// Implementors must hand out pairwise non-overlapping slices for
/// successful `allocate` calls, regardless of concurrency, and must keep
/// the backing region mapped until the pool is dropped.
pub unsafe trait PoolAllocate<T> {
    /// Carves `count * size_of::<T>()` contiguous bytes off the top of
    /// the region, strictly decreasing the cursor, and returns the new
    /// top.
    ///
    /// There is deliberately no bounds check on this path: a cursor that
    /// crosses into the guard page traps on first write, and the fault
    /// handler attributes the trap to this pool.
    ///
    /// # Safety
    /// The returned memory is uninitialized: it must be written (e.g.
    /// via [`construct`](Self::construct)) before it is read, and it must
    /// not be used after the pool is dropped.
    unsafe fn allocate(&self, count: usize) -> NonNull<T>;

    /// Intentionally a no-op: freed memory is never reclaimed
    /// individually, the whole region is the reclaim unit.
    ///
    /// # Safety
    /// `ptr` must have come from [`allocate`](Self::allocate) on this
    /// pool with the same `count`.
    unsafe fn deallocate(&self, _ptr: NonNull<T>, _count: usize) {}

    /// Placement-initializes one element in allocated storage.
    ///
    /// # Safety
    /// `slot` must point into storage allocated from this pool that is
    /// currently uninitialized or destroyed.
    unsafe fn construct(&self, slot: NonNull<T>, value: T) {
        // SAFETY: caller guarantees slot is valid for a write of T.
        unsafe { slot.as_ptr().write(value) }
    }

    /// Runs the element's destructor in place without reclaiming its
    /// storage.
    ///
    /// # Safety
    /// `slot` must point at a constructed element that has not already
    /// been destroyed.
    unsafe fn destroy(&self, slot: NonNull<T>) {
        // SAFETY: caller guarantees slot holds a live T.
        unsafe { ptr::drop_in_place(slot.as_ptr()) }
    }
}

/// Byte length of `count` elements. Wrapping keeps the hot path
/// branch-free; an absurd count lands the cursor in unmapped or guarded
/// space and traps exactly like any other over-allocation.
#[inline(always)]
pub(crate) const fn byte_len<T>(count: usize) -> usize {
    mem::size_of::<T>().wrapping_mul(count)
}
