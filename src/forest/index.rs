//! The index type: item storage and per-item accessors.
//!
//! A [`ForestIndex`] moves through a fixed lifecycle. Freshly created it is
//! empty; `add_item` grows the arena and writes leaf records; `build`
//! appends split and bucket nodes plus the root-copy tail; `save` flushes
//! the arena to disk and transitions the instance to the memory-mapped
//! state, in which only queries (and `unload`) are permitted.

use std::marker::PhantomData;

use crate::error::ForestError;
use crate::forest::arena::NodeArena;
use crate::forest::distance::Metric;
use crate::forest::node::{self, NodeMut, NodeRef};
use crate::rng::Kiss64Random;

/// Random-projection-forest approximate nearest neighbor index over dense
/// `f32` vectors of a fixed dimension.
///
/// The metric is a type parameter so every distance, margin and side
/// computation is monomorphized; it also fixes the node record layout and
/// thereby the on-disk format. Files are not portable across metrics,
/// dimensions, or host endianness.
///
/// Mutation requires `&mut self`; queries take `&self`, so a loaded index
/// can serve readers from many threads at once.
pub struct ForestIndex<M: Metric> {
    pub(crate) dimension: usize,
    pub(crate) node_size: usize,
    pub(crate) max_bucket: usize,
    pub(crate) n_items: i32,
    pub(crate) n_nodes: i32,
    pub(crate) arena: NodeArena,
    pub(crate) roots: Vec<i32>,
    pub(crate) rng: Kiss64Random,
    pub(crate) loaded: bool,
    pub(crate) verbose: bool,
    _metric: PhantomData<M>,
}

impl<M: Metric> ForestIndex<M> {
    /// Empty index for vectors of the given dimension.
    pub fn new(dimension: usize) -> Self {
        let node_size = node::node_size::<M>(dimension);
        Self {
            dimension,
            node_size,
            max_bucket: node::max_bucket::<M>(node_size),
            n_items: 0,
            n_nodes: 0,
            arena: NodeArena::new(node_size),
            roots: Vec::new(),
            rng: Kiss64Random::new(),
            loaded: false,
            verbose: false,
            _metric: PhantomData,
        }
    }

    /// Store `vector` as item `item`, growing the id space to cover it.
    /// Ids need not arrive densely or in order; records between the highest
    /// id seen and `item` stay zeroed until written.
    pub fn add_item(&mut self, item: i32, vector: &[f32]) -> Result<(), ForestError> {
        if self.loaded {
            tracing::warn!("cannot add items to a loaded index");
            return Err(ForestError::IndexLoaded);
        }
        if vector.len() != self.dimension {
            return Err(ForestError::DimensionMismatch {
                expected: self.dimension,
                got: vector.len(),
            });
        }

        self.arena.reserve(item as usize + 1);
        let mut leaf = NodeMut::<M>::new(self.arena.node_bytes_mut(item));
        leaf.set_n_descendants(1);
        leaf.set_child(0, 0);
        leaf.set_child(1, 0);
        leaf.vector_mut().copy_from_slice(vector);

        if item >= self.n_items {
            self.n_items = item + 1;
        }
        Ok(())
    }

    pub(crate) fn node(&self, id: i32) -> NodeRef<'_, M> {
        NodeRef::new(self.arena.node_bytes(id))
    }

    /// Stored vector of `item`. The id must be in `[0, n_items)`.
    pub fn get_item(&self, item: i32) -> &[f32] {
        self.node(item).vector()
    }

    /// User-facing distance between two stored items.
    pub fn get_distance(&self, i: i32, j: i32) -> f32 {
        M::normalized_distance(M::distance(self.node(i).vector(), self.node(j).vector()))
    }

    /// Number of items (one past the highest id added, or recovered on load).
    pub fn n_items(&self) -> i32 {
        self.n_items
    }

    /// Total node records, including the root-copy tail after a build.
    pub fn n_nodes(&self) -> i32 {
        self.n_nodes
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Whether the index is backed by a read-only memory mapping.
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Reseed the build-time random source. Builds with identical items,
    /// insertion order and seed produce byte-identical files.
    pub fn set_seed(&mut self, seed: u64) {
        self.rng.set_seed(seed);
    }

    /// Toggle advisory progress messages (emitted through `tracing`).
    pub fn set_verbose(&mut self, verbose: bool) {
        self.verbose = verbose;
    }
}
