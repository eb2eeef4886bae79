//! # Collection Policy Configuration
//!
//! Compile-time thresholds driving when mark steps and collections run.

/// Bytes allocated since the last collection before an allocation performs
/// one incremental mark step.
pub const INCREMENTAL_MARK_BYTES: u64 = 256 * 1024;

/// Every this many successful allocations, the allocation entry point runs
/// a collection.
pub const ALLOCATION_COLLECT_INTERVAL: u64 = 1000;

/// Every this many cycles, the allocation-triggered collection is forced
/// major.
pub const FULL_COLLECTION_INTERVAL: u64 = 10;

/// A cycle whose counter is not a multiple of this runs minor; see the
/// root-cursor rules in [`crate::Gc::collect`].
pub const MINOR_COLLECTION_INTERVAL: u64 = 10;

/// Lower bound on objects processed per incremental mark step; each step
/// drains `max(worklist/2, this)` objects.
pub const INCREMENTAL_DRAIN_MIN: usize = 128;

const _: () = {
    assert!(INCREMENTAL_MARK_BYTES > 0);
    assert!(ALLOCATION_COLLECT_INTERVAL > 0);
    assert!(FULL_COLLECTION_INTERVAL > 0);
    assert!(MINOR_COLLECTION_INTERVAL > 0);
    assert!(INCREMENTAL_DRAIN_MIN > 0);
};
