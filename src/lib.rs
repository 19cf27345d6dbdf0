//! Guard-page bump-pool allocators with fault attribution
//!
//! This crate provides a family of bump-pointer allocators built on a
//! single upfront virtual-memory reservation:
//!
//! - [`Pool`]: uncoordinated, fastest, `!Sync`
//! - [`LockedPool`]: mutex-guarded, for threads sharing one region
//! - [`LockFreePool`]: atomic fetch-and-subtract, throughput under
//!   contention
//!
//! All three carve slices downward from the top of one region and share
//! the [`PoolAllocate`] capability set. Individual deallocation is a
//! no-op by design; the whole region is reclaimed at once when the pool
//! is dropped.
//!
//! Each region's first page is a no-access guard page, and every live
//! region is tracked in a process-wide registry. A workload that
//! over-allocates writes into the guard page, and the installed
//! SIGSEGV/SIGBUS handler reports which pool owns the violated page
//! before the process terminates. Exhaustion is diagnosed, not survived.
//!
//! # Example
//!
//! ```no_run
//! use pagepool::{LockFreePool, PoolAllocate};
//! use std::sync::Arc;
//!
//! let pool = Arc::new(LockFreePool::<u64>::with_expected_elements(1 << 20)?);
//! let worker = {
//!     let pool = Arc::clone(&pool);
//!     std::thread::spawn(move || unsafe {
//!         let slot = pool.allocate(1);
//!         pool.construct(slot, 7);
//!     })
//! };
//! worker.join().unwrap();
//! # Ok::<(), pagepool::MemoryError>(())
//! ```

#![warn(missing_docs)]

#[cfg(not(unix))]
compile_error!("pagepool requires a Unix virtual-memory and signal API");

pub mod error;
pub mod fault;
pub mod pool;
pub mod region;
pub mod registry;
pub mod utils;

pub use error::{MemoryError, Result};
pub use pool::{LockFreePool, LockedPool, Pool, PoolAllocate, PoolConfig};
pub use region::{DEFAULT_REGION_SIZE, PAGE_SIZE, Region, region_size};
pub use registry::{MAX_ALLOCATORS, Registry, SlotId};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
