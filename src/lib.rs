//! # rpforest
//!
//! Approximate nearest neighbor search over dense `f32` vectors, using a
//! forest of random-projection trees persisted as a single memory-mapped
//! file.
//!
//! An index is populated item by item, built offline into a fixed number
//! of trees (or a size-bounded automatic count), and saved as a headerless
//! run of packed node records. Consumers memory-map the file read-only and
//! query it concurrently without copying. The three supported metrics
//! ([`Angular`], [`Euclidean`], [`Manhattan`]) are chosen statically, since
//! the metric determines the record layout and thereby the file format.
//!
//! ```
//! use rpforest::{Euclidean, ForestIndex};
//!
//! let mut index = ForestIndex::<Euclidean>::new(3);
//! index.add_item(0, &[1.0, 0.0, 0.0]).unwrap();
//! index.add_item(1, &[0.0, 1.0, 0.0]).unwrap();
//! index.add_item(2, &[0.9, 0.1, 0.0]).unwrap();
//! index.build(Some(2)).unwrap();
//!
//! let nns = index.get_nns_by_vector(&[1.0, 0.0, 0.0], 2, None);
//! assert_eq!(nns[0].0, 0);
//! ```

/// Tuning constants for forest construction and arena growth.
pub mod config;
/// Error type shared by all fallible index operations.
pub mod error;
/// The forest index: records, arena, build, search, persistence.
pub mod forest;
/// Deterministic KISS64 random source for tree construction.
pub mod rng;

pub use error::ForestError;
pub use forest::distance::{Angular, Euclidean, Manhattan, Metric};
pub use forest::ForestIndex;
