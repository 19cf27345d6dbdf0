//! Virtual-memory region reservation and the sizing policy
//!
//! A [`Region`] is a single contiguous anonymous mapping whose first page
//! is demoted to `PROT_NONE`. Pools carve allocations downward from the
//! top of the region; a cursor that is bumped into the guard page turns
//! the first write into an attributable fault instead of silently
//! corrupting whatever the kernel placed below the mapping.
//!
//! The region keeps no cursor of its own. Each pool strategy owns the
//! cursor in the representation its concurrency model needs (`Cell`,
//! mutex or atomic); the region only owns the mapping.

use core::fmt;
use core::ptr::NonNull;

use crate::error::{MemoryError, Result};
use crate::utils::align_up;

/// Page size assumed by the sizing policy, the guard page and fault
/// attribution.
pub const PAGE_SIZE: usize = 4096;

/// Reservation length used when no element-count hint is given: 128 Ki
/// pages, 512 MiB of address space on 4 KiB pages. The mapping is lazy,
/// so the resident cost is only what the workload actually touches.
pub const DEFAULT_REGION_SIZE: usize = 128 * 1024 * PAGE_SIZE;

/// Rounds `len` up to the next multiple of [`PAGE_SIZE`].
#[inline]
pub const fn round_to_page(len: usize) -> usize {
    align_up(len, PAGE_SIZE)
}

/// Computes the reservation length for a pool of `elem_size`-byte
/// elements.
///
/// A zero hint means "unknown working set" and falls back to
/// [`DEFAULT_REGION_SIZE`]. Otherwise one extra page is added on top of
/// the payload to pay for the guard page, and the total is rounded up to
/// the page size.
///
/// # Examples
/// ```
/// use pagepool::region::{DEFAULT_REGION_SIZE, region_size};
///
/// assert_eq!(region_size(0, 16), DEFAULT_REGION_SIZE);
/// assert_eq!(region_size(1_000_000, 16), 16_007_168);
/// ```
pub fn region_size(expected_elements: usize, elem_size: usize) -> usize {
    if expected_elements == 0 {
        return DEFAULT_REGION_SIZE;
    }
    let payload = expected_elements.saturating_mul(elem_size);
    // Guard page plus at least one data page, even for degenerate hints.
    round_to_page(payload.saturating_add(PAGE_SIZE)).max(2 * PAGE_SIZE)
}

/// A contiguous anonymous reservation with a no-access guard page at its
/// low end.
///
/// The whole region is the reclaim unit: dropping the `Region` unmaps it
/// and invalidates every allocation carved from it. Callers must not
/// dereference previously returned slices after that point.
pub struct Region {
    base: NonNull<u8>,
    len: usize,
}

// SAFETY: Region has no interior mutability; base and len never change
// after reservation. Concurrent access to the mapped bytes is coordinated
// by the pool cursors, not by the region itself.
unsafe impl Send for Region {}
unsafe impl Sync for Region {}

impl Region {
    /// Reserves `len` bytes of zero-initialized anonymous memory,
    /// readable and writable, and demotes the first page to `PROT_NONE`.
    ///
    /// # Errors
    /// Returns [`MemoryError::OutOfMemory`] if the kernel refuses the
    /// reservation. The failure is propagated, never retried.
    pub fn reserve(len: usize) -> Result<Self> {
        debug_assert!(
            len >= 2 * PAGE_SIZE,
            "region must hold the guard page and at least one data page"
        );
        // SAFETY: private anonymous mapping at a kernel-chosen address,
        // no file descriptor involved.
        let base = unsafe {
            libc::mmap(
                core::ptr::null_mut(),
                len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
                -1,
                0,
            )
        };
        if base == libc::MAP_FAILED {
            return Err(MemoryError::OutOfMemory { requested: len });
        }

        // SAFETY: [base, base + PAGE_SIZE) lies inside the mapping
        // created above and is page-aligned.
        if unsafe { libc::mprotect(base, PAGE_SIZE, libc::PROT_NONE) } != 0 {
            // SAFETY: unmapping the mapping we just created.
            unsafe {
                libc::munmap(base, len);
            }
            return Err(MemoryError::OutOfMemory { requested: len });
        }

        tracing::debug!(base = base as usize, len, "reserved region");

        // SAFETY: mmap succeeded, so base is a valid non-null pointer.
        let base = unsafe { NonNull::new_unchecked(base.cast::<u8>()) };
        Ok(Self { base, len })
    }

    /// Base address of the reservation. This is also the address the
    /// registry tracks and the page the guard occupies.
    #[inline]
    pub fn base_addr(&self) -> usize {
        self.base.as_ptr() as usize
    }

    /// One past the highest mapped byte; the initial cursor position.
    #[inline]
    pub fn end_addr(&self) -> usize {
        self.base_addr() + self.len
    }

    /// Lowest address valid for allocation: the first byte above the
    /// guard page.
    #[inline]
    pub fn floor_addr(&self) -> usize {
        self.base_addr() + PAGE_SIZE
    }

    /// Total reserved length in bytes, guard page included.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the reservation is zero-length. `reserve` never yields
    /// one; this exists to pair with [`len`](Self::len).
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl fmt::Debug for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Region")
            .field("base", &format_args!("{:#x}", self.base_addr()))
            .field("len", &self.len)
            .finish()
    }
}

impl Drop for Region {
    fn drop(&mut self) {
        tracing::debug!(base = self.base_addr(), len = self.len, "releasing region");
        // SAFETY: base and len describe the mapping made in `reserve`;
        // nothing touches the region after this point.
        let ret = unsafe { libc::munmap(self.base.as_ptr().cast(), self.len) };
        debug_assert_eq!(ret, 0, "munmap failed on a region we mapped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::is_aligned;

    #[test]
    fn sizing_uses_default_for_zero_hint() {
        assert_eq!(region_size(0, 1), DEFAULT_REGION_SIZE);
        assert_eq!(region_size(0, 4096), DEFAULT_REGION_SIZE);
    }

    #[test]
    fn sizing_rounds_hint_up_to_page() {
        // 1_000_000 * 16 + 4096 = 16_004_096, next page multiple is
        // 3908 * 4096.
        assert_eq!(region_size(1_000_000, 16), 16_007_168);
        assert_eq!(region_size(1, 8), 2 * PAGE_SIZE);
        // Exactly page-sized payload still gets its own guard page.
        assert_eq!(region_size(4096, 1), 2 * PAGE_SIZE);
        assert_eq!(region_size(4097, 1), 3 * PAGE_SIZE);
    }

    #[test]
    fn reserve_returns_page_aligned_writable_region() {
        let region = Region::reserve(region_size(1024, 8)).expect("reserve failed");
        assert!(is_aligned(region.base_addr(), PAGE_SIZE));
        assert_eq!(region.end_addr() - region.base_addr(), region.len());
        assert!(region.floor_addr() > region.base_addr());

        // The top of the region must be usable immediately.
        let top = (region.end_addr() - core::mem::size_of::<u64>()) as *mut u64;
        unsafe {
            top.write(0xDEAD_BEEF_CAFE_F00D);
            assert_eq!(top.read(), 0xDEAD_BEEF_CAFE_F00D);
        }
    }

    #[test]
    fn debug_output_names_the_mapping() {
        let region = Region::reserve(region_size(16, 8)).expect("reserve failed");
        let rendered = format!("{region:?}");
        assert!(rendered.starts_with("Region"), "got: {rendered}");
        assert!(rendered.contains("base: 0x"));
        assert!(rendered.contains(&format!("len: {}", region.len())));
    }

    #[test]
    fn reserve_rejects_absurd_length() {
        // More address space than the hardware can map.
        let err = Region::reserve(usize::MAX & !(PAGE_SIZE - 1)).unwrap_err();
        assert!(matches!(err, MemoryError::OutOfMemory { .. }));
    }
}
