//! Heap census through the global allocator.
//!
//! [`HeapTracker`] wraps the system allocator and keeps one live-block counter per
//! power-of-two size class. A program opts in once, next to its entry point:
//!
//! ```no_run
//! use memtrail_tracker::HeapTracker;
//!
//! #[global_allocator]
//! static ALLOCATOR: HeapTracker = HeapTracker;
//!
//! fn main() {}
//! ```
//!
//! Nothing else in the workload changes. Censuses taken while it is installed
//! include a `heap <= N` entry for every size class holding live blocks.
//!
//! The counters are plain atomics so the allocation path never allocates itself.

#![allow(unsafe_code)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

use std::alloc::{GlobalAlloc, Layout, System};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use memtrail_core::Result;

use crate::census::{Census, CensusEntry};
use crate::config::validate_census_threshold;

/// Size classes cover every `usize` block size: class `k` holds sizes in `(2^(k-1), 2^k]`
const SIZE_CLASSES: usize = usize::BITS as usize + 1;

static INSTALLED: AtomicBool = AtomicBool::new(false);
static LIVE_BLOCKS: [AtomicU64; SIZE_CLASSES] = [const { AtomicU64::new(0) }; SIZE_CLASSES];
static LIVE_BYTES: [AtomicU64; SIZE_CLASSES] = [const { AtomicU64::new(0) }; SIZE_CLASSES];

/// Global allocator that counts live heap blocks by size class
#[derive(Debug, Clone, Copy, Default)]
pub struct HeapTracker;

impl HeapTracker {
    /// Whether a `HeapTracker` is serving this process's allocations
    #[must_use]
    pub fn is_installed() -> bool {
        INSTALLED.load(Ordering::Relaxed)
    }

    /// Number of live blocks across all size classes
    #[must_use]
    pub fn live_blocks() -> u64 {
        LIVE_BLOCKS
            .iter()
            .map(|count| count.load(Ordering::Relaxed))
            .sum()
    }
}

// SAFETY: every call is forwarded unchanged to `System`; the counters only observe sizes.
unsafe impl GlobalAlloc for HeapTracker {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        // SAFETY: same contract as the caller's
        let ptr = unsafe { System.alloc(layout) };
        if !ptr.is_null() {
            record_alloc(layout.size());
        }
        ptr
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        // SAFETY: same contract as the caller's
        let ptr = unsafe { System.alloc_zeroed(layout) };
        if !ptr.is_null() {
            record_alloc(layout.size());
        }
        ptr
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        // SAFETY: `ptr` came from `System` through this allocator with `layout`
        unsafe { System.dealloc(ptr, layout) };
        record_free(layout.size());
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        // SAFETY: `ptr` came from `System` through this allocator with `layout`
        let new_ptr = unsafe { System.realloc(ptr, layout, new_size) };
        if !new_ptr.is_null() {
            record_free(layout.size());
            record_alloc(new_size);
        }
        new_ptr
    }
}

/// Smallest `k` with `size <= 2^k`
fn size_class(size: usize) -> usize {
    let bits = usize::BITS - size.saturating_sub(1).leading_zeros();
    usize::try_from(bits).unwrap_or(SIZE_CLASSES - 1)
}

fn record_alloc(size: usize) {
    INSTALLED.store(true, Ordering::Relaxed);
    let class = size_class(size);
    if let (Some(blocks), Some(bytes)) = (LIVE_BLOCKS.get(class), LIVE_BYTES.get(class)) {
        blocks.fetch_add(1, Ordering::Relaxed);
        bytes.fetch_add(size as u64, Ordering::Relaxed);
    }
}

fn record_free(size: usize) {
    let class = size_class(size);
    if let (Some(blocks), Some(bytes)) = (LIVE_BLOCKS.get(class), LIVE_BYTES.get(class)) {
        blocks.fetch_sub(1, Ordering::Relaxed);
        bytes.fetch_sub(size as u64, Ordering::Relaxed);
    }
}

/// Label for a size class, e.g. `heap <= 1 MiB`
fn class_label(class: usize) -> String {
    const UNITS: [&str; 7] = ["B", "KiB", "MiB", "GiB", "TiB", "PiB", "EiB"];
    let unit = (class / 10).min(UNITS.len() - 1);
    let value = 1_u128 << class.saturating_sub(unit * 10);
    let name = UNITS.get(unit).copied().unwrap_or("B");
    format!("heap <= {value} {name}")
}

/// Live heap blocks grouped by size class, keeping classes above a size threshold.
///
/// Empty unless a [`HeapTracker`] is the global allocator. Sizes are the requested
/// layout sizes, so allocator padding is not counted.
///
/// # Errors
///
/// Returns `InvalidArgument` if `min_size_kb` is negative or NaN
pub fn heap_census(min_size_kb: f64) -> Result<Census> {
    validate_census_threshold(min_size_kb)?;

    Ok(LIVE_BLOCKS
        .iter()
        .zip(LIVE_BYTES.iter())
        .enumerate()
        .filter_map(|(class, (blocks, bytes))| {
            let count = blocks.load(Ordering::Relaxed);
            let size_kb = bytes.load(Ordering::Relaxed) as f64 / 1024.0;
            (count > 0 && size_kb > min_size_kb).then(|| {
                (
                    class_label(class),
                    CensusEntry {
                        count,
                        total_size_kb: (size_kb * 100.0).round() / 100.0,
                    },
                )
            })
        })
        .collect())
}
