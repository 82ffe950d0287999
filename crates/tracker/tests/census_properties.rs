//! Property-based tests for the live-object census using proptest.
//!
//! Properties verified:
//! - Raising the threshold never adds a type to the census
//! - With a zero threshold every live object is counted exactly once
//! - Released objects are never counted

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]

use std::sync::Arc;

use memtrail_tracker::LiveRegistry;
use proptest::prelude::*;

const TYPE_NAMES: [&str; 4] = ["alpha", "beta", "gamma", "delta"];

fn arb_objects() -> impl Strategy<Value = Vec<(usize, usize)>> {
    prop::collection::vec((0..TYPE_NAMES.len(), 1_usize..200_000), 0..64)
}

proptest! {
    /// Property: a lower threshold yields a superset of types.
    #[test]
    fn prop_lower_threshold_is_superset(
        objects in arb_objects(),
        low in 0.0f64..500.0,
        extra in 0.0f64..500.0,
    ) {
        let registry = Arc::new(LiveRegistry::new());
        let _live: Vec<_> = objects
            .iter()
            .map(|&(name, size)| registry.register(TYPE_NAMES[name], size))
            .collect();

        let broad = registry.census(low).unwrap();
        let narrow = registry.census(low + extra).unwrap();

        for (name, entry) in &narrow {
            prop_assert_eq!(broad.get(name), Some(entry));
        }
    }

    /// Property: with no threshold the counts add up to the live objects.
    #[test]
    fn prop_zero_threshold_counts_everything(objects in arb_objects()) {
        let registry = Arc::new(LiveRegistry::new());
        let _live: Vec<_> = objects
            .iter()
            .map(|&(name, size)| registry.register(TYPE_NAMES[name], size))
            .collect();

        let census = registry.census(0.0).unwrap();
        let counted: u64 = census.values().map(|entry| entry.count).sum();

        prop_assert_eq!(counted, objects.len() as u64);
        prop_assert_eq!(registry.live_count(), objects.len());
    }

    /// Property: dropping half of the registrations removes them from the census.
    #[test]
    fn prop_released_objects_are_not_counted(objects in arb_objects()) {
        let registry = Arc::new(LiveRegistry::new());
        let mut live: Vec<_> = objects
            .iter()
            .map(|&(name, size)| registry.register(TYPE_NAMES[name], size))
            .collect();
        let kept = live.len() / 2;
        live.truncate(kept);

        let census = registry.census(0.0).unwrap();
        let counted: u64 = census.values().map(|entry| entry.count).sum();

        prop_assert_eq!(counted, kept as u64);
    }
}
