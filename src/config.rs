//! Tuning constants for forest construction and arena growth.
//!
//! These are compile-time constants; per-index knobs (tree count, search
//! budget) are passed to `build` and the query methods directly.

/// Number of sampling iterations for the two-means split heuristic.
///
/// Each iteration draws one candidate point and moves the nearer of the two
/// centroids toward it, weighted by cluster size to keep partitions balanced.
pub const TWO_MEANS_ITERATIONS: usize = 200;

/// Arena over-allocation factor.
///
/// When a requested capacity exceeds the current one, the arena grows to
/// `max(requested, ceil((capacity + 1) * ARENA_GROWTH_FACTOR))` nodes, so
/// repeated single-node appends amortize to O(1).
pub const ARENA_GROWTH_FACTOR: f64 = 1.3;

/// Node budget multiplier for auto mode (`build(None)`).
///
/// Tree construction stops once the arena holds `AUTO_BUILD_NODE_FACTOR`
/// times as many nodes as there are items, bounding the index at roughly
/// that multiple of the raw vector data.
pub const AUTO_BUILD_NODE_FACTOR: i32 = 2;
