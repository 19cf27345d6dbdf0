//! Process-wide table of live regions, used for fault attribution
//!
//! Every pool claims one slot for the lifetime of its region. The table
//! is a fixed-capacity array of per-slot atomic base addresses: claim is
//! a compare-and-swap, release is a plain store, lookup is a benign
//! lock-free read. No lock is taken anywhere, which is what makes
//! [`Registry::lookup`] safe to run inside a signal handler.

use core::sync::atomic::{AtomicUsize, Ordering};

use crate::error::{MemoryError, Result};
use crate::region::PAGE_SIZE;
use crate::utils::align_down;

/// Upper bound on simultaneously live pools in one process.
pub const MAX_ALLOCATORS: usize = 20;

/// Sentinel stored in an unclaimed slot. Never a valid region base: a
/// regular process cannot map page zero.
const EMPTY: usize = 0;

/// Identity of a registered pool. The index is what the fault handler
/// prints when attributing a guard-page violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotId(pub(crate) usize);

impl SlotId {
    /// Position of this pool in the registry table.
    #[inline]
    pub fn index(self) -> usize {
        self.0
    }
}

/// Fixed-capacity set of live region base addresses.
///
/// Pools register against the process-wide instance; standalone
/// instances exist so the claim/release/lookup protocol can be tested
/// without interfering with live pools.
pub struct Registry {
    slots: [AtomicUsize; MAX_ALLOCATORS],
}

impl Registry {
    /// Creates an empty registry.
    pub const fn new() -> Self {
        Self {
            slots: [const { AtomicUsize::new(EMPTY) }; MAX_ALLOCATORS],
        }
    }

    /// Claims the first free slot for `base`.
    ///
    /// Constructors racing for the same slot are resolved by the CAS:
    /// the loser simply moves on to the next slot. Relaxed ordering is
    /// sufficient because the only other reader is the fault handler,
    /// which runs on fault, not on a hot path, and needs only eventual
    /// visibility.
    ///
    /// # Errors
    /// Returns [`MemoryError::TooManyAllocators`] when every slot is
    /// claimed. This must surface as a hard construction failure.
    pub fn register(&self, base: usize) -> Result<SlotId> {
        debug_assert_ne!(base, EMPTY, "region base cannot be the empty sentinel");
        for (index, slot) in self.slots.iter().enumerate() {
            if slot
                .compare_exchange(EMPTY, base, Ordering::Relaxed, Ordering::Relaxed)
                .is_ok()
            {
                tracing::debug!(slot = index, base, "registered region");
                return Ok(SlotId(index));
            }
        }
        Err(MemoryError::TooManyAllocators {
            capacity: MAX_ALLOCATORS,
        })
    }

    /// Releases a slot, making it claimable again.
    ///
    /// Must happen before the region is unmapped so a fault can never be
    /// attributed to a pool that no longer owns its pages.
    pub fn deregister(&self, slot: SlotId) {
        self.slots[slot.0].store(EMPTY, Ordering::Relaxed);
        tracing::debug!(slot = slot.0, "deregistered region");
    }

    /// Resolves a faulting address to the pool owning the struck guard
    /// page, or `None` if the fault is unrelated to any tracked region.
    ///
    /// Only the page-aligned floor of `addr` is compared: the registry
    /// tracks region bases, and every address inside a guard page shares
    /// the guard page's floor. Empty slots are skipped so a wild write
    /// near the null page does not match the sentinel.
    pub fn lookup(&self, addr: usize) -> Option<SlotId> {
        let floor = align_down(addr, PAGE_SIZE);
        for (index, slot) in self.slots.iter().enumerate() {
            let base = slot.load(Ordering::Relaxed);
            if base != EMPTY && base == floor {
                return Some(SlotId(index));
            }
        }
        None
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

/// The process-wide registry every pool registers with.
pub(crate) fn global() -> &'static Registry {
    static GLOBAL: Registry = Registry::new();
    &GLOBAL
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_claims_slots_in_order() {
        let registry = Registry::new();
        let a = registry.register(0x1000).unwrap();
        let b = registry.register(0x5000).unwrap();
        assert_eq!(a.index(), 0);
        assert_eq!(b.index(), 1);
    }

    #[test]
    fn register_fails_when_table_is_full() {
        let registry = Registry::new();
        for i in 0..MAX_ALLOCATORS {
            registry.register((i + 1) * PAGE_SIZE).unwrap();
        }
        let err = registry.register(0xdead_0000).unwrap_err();
        assert_eq!(
            err,
            MemoryError::TooManyAllocators {
                capacity: MAX_ALLOCATORS
            }
        );
    }

    #[test]
    fn deregister_frees_the_slot_for_reuse() {
        let registry = Registry::new();
        let a = registry.register(0x1000).unwrap();
        let _b = registry.register(0x5000).unwrap();

        registry.deregister(a);
        let c = registry.register(0x9000).unwrap();
        assert_eq!(c.index(), a.index());
    }

    #[test]
    fn lookup_matches_any_address_inside_the_guard_page() {
        let registry = Registry::new();
        let slot = registry.register(0x7000).unwrap();

        assert_eq!(registry.lookup(0x7000), Some(slot));
        assert_eq!(registry.lookup(0x7abc), Some(slot));
        assert_eq!(registry.lookup(0x7fff), Some(slot));
        // One page above the guard is the pool's own data, not a fault
        // we can attribute to the guard page.
        assert_eq!(registry.lookup(0x8000), None);
    }

    #[test]
    fn lookup_ignores_empty_slots_and_stale_entries() {
        let registry = Registry::new();
        // A wild write near the null page must not match the sentinel.
        assert_eq!(registry.lookup(0x10), None);

        let slot = registry.register(0x3000).unwrap();
        registry.deregister(slot);
        assert_eq!(registry.lookup(0x3004), None);
    }
}
