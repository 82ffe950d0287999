//! Live-object census.
//!
//! Two sources feed a census. With [`HeapTracker`](crate::HeapTracker) installed as the
//! global allocator, every live heap block is counted by size class without touching
//! the workload. On top of that, a [`Tracked`] value or a manual [`Registration`] tags
//! a live object with its type name and size in a [`LiveRegistry`], and removes the
//! tag when dropped. [`ProcessCensus`] merges both.
//!
//! Registry sizes are shallow: a `Tracked<Vec<u8>>` counts the vector header, not its
//! buffer. Use [`LiveRegistry::register`] with an explicit size to account for heap blocks.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

use std::collections::BTreeMap;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, LazyLock};

use dashmap::DashMap;
use memtrail_core::Result;
use serde::{Deserialize, Serialize};

use crate::config::validate_census_threshold;
use crate::heap::{HeapTracker, heap_census};

static GLOBAL_REGISTRY: LazyLock<Arc<LiveRegistry>> = LazyLock::new(|| Arc::new(LiveRegistry::new()));

/// Per-type aggregate produced by a census
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CensusEntry {
    /// Number of live objects of this type
    pub count: u64,
    /// Accumulated shallow size in kilobytes, rounded to two decimals
    pub total_size_kb: f64,
}

/// Census result keyed by type name or heap size class
pub type Census = BTreeMap<String, CensusEntry>;

/// Anything that can enumerate live objects for a census
pub trait CensusSource: Send + Sync {
    /// Group live objects and keep groups whose size strictly exceeds `min_size_kb`
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if `min_size_kb` is negative or NaN; other
    /// sources may fail for their own reasons
    fn census(&self, min_size_kb: f64) -> Result<Census>;
}

/// Tagged objects of one registry plus the allocator's heap blocks
#[derive(Debug, Clone)]
pub struct ProcessCensus {
    registry: Arc<LiveRegistry>,
}

impl ProcessCensus {
    /// Census over `registry` and, when installed, the [`HeapTracker`]
    #[must_use]
    pub const fn new(registry: Arc<LiveRegistry>) -> Self {
        Self { registry }
    }

    /// Census over the global registry
    #[must_use]
    pub fn global() -> Self {
        Self::new(LiveRegistry::global())
    }
}

impl CensusSource for ProcessCensus {
    fn census(&self, min_size_kb: f64) -> Result<Census> {
        let mut census = self.registry.census(min_size_kb)?;
        if HeapTracker::is_installed() {
            census.extend(heap_census(min_size_kb)?);
        }
        Ok(census)
    }
}

#[derive(Debug, Clone, Copy)]
struct ObjectRecord {
    type_name: &'static str,
    size_bytes: usize,
}

/// Registry of live, tagged objects
#[derive(Debug, Default)]
pub struct LiveRegistry {
    objects: DashMap<u64, ObjectRecord>,
    next_id: AtomicU64,
}

impl CensusSource for LiveRegistry {
    fn census(&self, min_size_kb: f64) -> Result<Census> {
        Self::census(self, min_size_kb)
    }
}

impl LiveRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide registry used when no other is configured
    #[must_use]
    pub fn global() -> Arc<Self> {
        Arc::clone(&GLOBAL_REGISTRY)
    }

    /// Tag a live block; the tag is removed when the returned guard drops
    #[must_use = "the block is untracked as soon as the registration is dropped"]
    pub fn register(self: &Arc<Self>, type_name: &'static str, size_bytes: usize) -> Registration {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.objects.insert(
            id,
            ObjectRecord {
                type_name,
                size_bytes,
            },
        );
        Registration {
            registry: Arc::clone(self),
            id,
        }
    }

    /// Wrap a value so it is counted while alive
    pub fn track<T>(self: &Arc<Self>, value: T) -> Tracked<T> {
        let registration = self.register(std::any::type_name::<T>(), std::mem::size_of::<T>());
        Tracked {
            value,
            registration,
        }
    }

    /// Number of tagged objects currently alive
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.objects.len()
    }

    /// Group every live object by type and keep types above a size threshold.
    ///
    /// Only types whose accumulated size strictly exceeds `min_size_kb` are returned.
    /// Objects released while the walk is running are skipped. The walk is
    /// O(live objects); treat it as an occasional diagnostic, not a hot-path call.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if `min_size_kb` is negative or NaN
    pub fn census(&self, min_size_kb: f64) -> Result<Census> {
        validate_census_threshold(min_size_kb)?;

        let mut totals: BTreeMap<&'static str, (u64, usize)> = BTreeMap::new();
        for entry in &self.objects {
            let record = *entry.value();
            let slot = totals.entry(record.type_name).or_insert((0, 0));
            slot.0 = slot.0.saturating_add(1);
            slot.1 = slot.1.saturating_add(record.size_bytes);
        }

        Ok(totals
            .into_iter()
            .filter_map(|(type_name, (count, bytes))| {
                let size_kb = bytes as f64 / 1024.0;
                (size_kb > min_size_kb).then(|| {
                    (
                        type_name.to_string(),
                        CensusEntry {
                            count,
                            total_size_kb: (size_kb * 100.0).round() / 100.0,
                        },
                    )
                })
            })
            .collect())
    }

    fn release(&self, id: u64) {
        self.objects.remove(&id);
    }
}

/// Census of the global registry and, when installed, the heap allocator
///
/// # Errors
///
/// Returns `InvalidArgument` if `min_size_kb` is negative or NaN
pub fn analyze_live_objects(min_size_kb: f64) -> Result<Census> {
    ProcessCensus::global().census(min_size_kb)
}

/// Guard keeping one block tagged in a registry
#[derive(Debug)]
pub struct Registration {
    registry: Arc<LiveRegistry>,
    id: u64,
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.registry.release(self.id);
    }
}

/// A value counted by a [`LiveRegistry`] for as long as it lives
#[derive(Debug)]
pub struct Tracked<T> {
    value: T,
    registration: Registration,
}

impl<T> Tracked<T> {
    /// Track a value in the global registry
    pub fn new(value: T) -> Self {
        GLOBAL_REGISTRY.track(value)
    }

    /// Stop tracking and return the value
    pub fn into_inner(self) -> T {
        let Self {
            value,
            registration,
        } = self;
        drop(registration);
        value
    }
}

impl<T> Deref for Tracked<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

impl<T> DerefMut for Tracked<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.value
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use memtrail_core::Error;

    struct Block([u8; 4096]);

    #[test]
    fn test_groups_by_type() {
        let registry = Arc::new(LiveRegistry::new());
        let blocks: Vec<_> = (0..3).map(|_| registry.track(Block([0; 4096]))).collect();
        let _small = registry.track(7_u32);

        let census = registry.census(0.0).unwrap();
        let entry = census
            .iter()
            .find(|(name, _)| name.ends_with("Block"))
            .map(|(_, entry)| *entry)
            .unwrap();

        assert_eq!(entry.count, 3);
        assert!((entry.total_size_kb - 12.0).abs() < f64::EPSILON);
        assert!(census.contains_key("u32"));
        drop(blocks);
    }

    #[test]
    fn test_threshold_is_strict() {
        let registry = Arc::new(LiveRegistry::new());
        let _exact = registry.register("exact", 2048);
        let _above = registry.register("above", 2049);

        let census = registry.census(2.0).unwrap();

        assert!(!census.contains_key("exact"));
        assert!(census.contains_key("above"));
    }

    #[test]
    fn test_dropped_objects_disappear() {
        let registry = Arc::new(LiveRegistry::new());
        let tracked = registry.track([0_u64; 512]);
        assert_eq!(registry.live_count(), 1);

        let inner = tracked.into_inner();
        assert_eq!(inner.len(), 512);
        assert_eq!(registry.live_count(), 0);
        assert!(registry.census(0.0).unwrap().is_empty());
    }

    #[test]
    fn test_negative_threshold_rejected() {
        let registry = Arc::new(LiveRegistry::new());
        assert!(matches!(
            registry.census(-1.0),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            registry.census(f64::NAN),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_deref_reaches_value() {
        let registry = Arc::new(LiveRegistry::new());
        let mut tracked = registry.track(vec![1, 2, 3]);
        tracked.push(4);
        assert_eq!(tracked.len(), 4);
    }

    #[test]
    fn test_process_census_without_heap_tracker_is_registry_census() {
        let registry = Arc::new(LiveRegistry::new());
        let _r = registry.register("block", 4096);

        let census = ProcessCensus::new(Arc::clone(&registry)).census(1.0).unwrap();

        assert_eq!(census, registry.census(1.0).unwrap());
    }

    #[test]
    fn test_census_entry_serializes_as_object() {
        let entry = CensusEntry {
            count: 3,
            total_size_kb: 12.5,
        };

        let json = serde_json::to_value(entry).unwrap();

        assert_eq!(json, serde_json::json!({"count": 3, "total_size_kb": 12.5}));
        let back: CensusEntry = serde_json::from_value(json).unwrap();
        assert_eq!(back, entry);
    }

    #[test]
    fn test_size_rounded_to_two_decimals() {
        let registry = Arc::new(LiveRegistry::new());
        let _r = registry.register("odd", 1000);

        let census = registry.census(0.0).unwrap();
        let entry = census.get("odd").unwrap();
        assert!((entry.total_size_kb - 0.98).abs() < f64::EPSILON);
    }
}
